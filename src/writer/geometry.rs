//! Emission of the geometry part
//!
//! All volumes of an object are concatenated into one indexed triangle
//! set. Instance IDs are assigned 1-based across the flat list of all
//! instances of all objects: the first instance of an object carries
//! the mesh, every further instance is an alias object holding a
//! single component reference to the first. Vertices are written in
//! the volume's world frame (local mesh multiplied by the volume
//! matrix); the reader reverses this with the sidecar's `matrix`
//! metadata.

use super::{emit, BuildItem, Exporter, ObjectData, ObjectDataMap, VolumeOffsets};
use crate::error::Result;
use crate::opc;
use crate::scene::{Scene, SceneObject};
use crate::transform::{transform_point_f32, transform_to_attribute};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

impl Exporter {
    /// Serialize the geometry part, returning its bytes and the
    /// per-object offsets the sidecar writer needs
    pub(super) fn write_geometry_part(
        &mut self,
        scene: &Scene,
    ) -> Result<(Vec<u8>, ObjectDataMap)> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);

        emit(
            &mut writer,
            Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
            "XML declaration",
        )?;

        let mut model = BytesStart::new("model");
        model.push_attribute(("unit", "millimeter"));
        model.push_attribute(("xml:lang", "en-US"));
        model.push_attribute(("xmlns", opc::CORE_NAMESPACE));
        model.push_attribute(("xmlns:slic3rpe", opc::SLIC3RPE_NAMESPACE));
        emit(&mut writer, Event::Start(model), "model element")?;

        let mut version = BytesStart::new("metadata");
        version.push_attribute(("name", opc::VERSION_METADATA_NAME));
        emit(&mut writer, Event::Start(version), "version metadata")?;
        emit(
            &mut writer,
            Event::Text(BytesText::new(&opc::FORMAT_VERSION.to_string())),
            "version value",
        )?;
        emit(
            &mut writer,
            Event::End(BytesEnd::new("metadata")),
            "version metadata",
        )?;

        emit(
            &mut writer,
            Event::Start(BytesStart::new("resources")),
            "resources element",
        )?;

        // IDs are a 1-based linear numbering of all instances of all
        // objects, so the list is not necessarily continuous per object
        let mut build_items: Vec<BuildItem> = Vec::new();
        let mut objects_data = ObjectDataMap::new();
        let mut next_object_id: u32 = 1;

        for (object_index, object) in scene.objects.iter().enumerate() {
            if object.instances.is_empty() {
                let message = format!(
                    "Skipping object '{}' with no instances",
                    object.name
                );
                log::warn!("{}", message);
                self.errors.push(message);
                continue;
            }

            let first_id = next_object_id;
            let mut data = ObjectData {
                object_index,
                offsets: Vec::new(),
            };

            for (i, instance) in object.instances.iter().enumerate() {
                let instance_id = first_id + i as u32;

                let mut elem = BytesStart::new("object");
                elem.push_attribute(("id", instance_id.to_string().as_str()));
                elem.push_attribute(("type", "model"));
                emit(&mut writer, Event::Start(elem), "object element")?;

                if i == 0 {
                    self.write_mesh(&mut writer, object, &mut data.offsets)?;
                } else {
                    emit(
                        &mut writer,
                        Event::Start(BytesStart::new("components")),
                        "components element",
                    )?;
                    let mut component = BytesStart::new("component");
                    component.push_attribute(("objectid", first_id.to_string().as_str()));
                    emit(&mut writer, Event::Empty(component), "component element")?;
                    emit(
                        &mut writer,
                        Event::End(BytesEnd::new("components")),
                        "components element",
                    )?;
                }

                emit(
                    &mut writer,
                    Event::End(BytesEnd::new("object")),
                    "object element",
                )?;

                build_items.push(BuildItem {
                    id: instance_id,
                    transform: instance.transform,
                    printable: instance.printable,
                });
            }

            next_object_id += object.instances.len() as u32;
            objects_data.insert(first_id, data);
        }

        emit(
            &mut writer,
            Event::End(BytesEnd::new("resources")),
            "resources element",
        )?;

        self.write_build(&mut writer, &build_items)?;

        emit(
            &mut writer,
            Event::End(BytesEnd::new("model")),
            "model element",
        )?;

        Ok((writer.into_inner(), objects_data))
    }

    /// Emit one object's mesh, concatenating its volumes and recording
    /// their vertex and triangle offsets
    fn write_mesh(
        &mut self,
        writer: &mut Writer<Vec<u8>>,
        object: &SceneObject,
        offsets: &mut Vec<VolumeOffsets>,
    ) -> Result<()> {
        emit(writer, Event::Start(BytesStart::new("mesh")), "mesh element")?;
        emit(
            writer,
            Event::Start(BytesStart::new("vertices")),
            "vertices element",
        )?;

        let mut vertices_count: u32 = 0;
        for volume in &object.volumes {
            if volume.mesh.is_empty() {
                return Err(self.fatal("Found invalid mesh"));
            }

            offsets.push(VolumeOffsets {
                first_vertex_id: vertices_count,
                first_triangle_id: 0,
                last_triangle_id: 0,
            });
            vertices_count += volume.mesh.vertices.len() as u32;

            for vertex in &volume.mesh.vertices {
                // stored in the volume's world frame
                let world = transform_point_f32(&volume.matrix, vertex);
                let mut elem = BytesStart::new("vertex");
                elem.push_attribute(("x", world.x.to_string().as_str()));
                elem.push_attribute(("y", world.y.to_string().as_str()));
                elem.push_attribute(("z", world.z.to_string().as_str()));
                emit(writer, Event::Empty(elem), "vertex element")?;
            }
        }

        emit(
            writer,
            Event::End(BytesEnd::new("vertices")),
            "vertices element",
        )?;
        emit(
            writer,
            Event::Start(BytesStart::new("triangles")),
            "triangles element",
        )?;

        let mut triangles_count: usize = 0;
        for (volume, offset) in object.volumes.iter().zip(offsets.iter_mut()) {
            offset.first_triangle_id = triangles_count;
            triangles_count += volume.mesh.indices.len();
            offset.last_triangle_id = triangles_count - 1;

            for triangle in &volume.mesh.indices {
                let mut elem = BytesStart::new("triangle");
                elem.push_attribute((
                    "v1",
                    (triangle[0] + offset.first_vertex_id).to_string().as_str(),
                ));
                elem.push_attribute((
                    "v2",
                    (triangle[1] + offset.first_vertex_id).to_string().as_str(),
                ));
                elem.push_attribute((
                    "v3",
                    (triangle[2] + offset.first_vertex_id).to_string().as_str(),
                ));
                emit(writer, Event::Empty(elem), "triangle element")?;
            }
        }

        emit(
            writer,
            Event::End(BytesEnd::new("triangles")),
            "triangles element",
        )?;
        emit(writer, Event::End(BytesEnd::new("mesh")), "mesh element")?;

        Ok(())
    }

    /// Emit the build section, one item per assigned instance ID
    fn write_build(
        &mut self,
        writer: &mut Writer<Vec<u8>>,
        build_items: &[BuildItem],
    ) -> Result<()> {
        if build_items.is_empty() {
            return Err(self.fatal("No build item found"));
        }

        emit(
            writer,
            Event::Start(BytesStart::new("build")),
            "build element",
        )?;

        for item in build_items {
            let mut elem = BytesStart::new("item");
            elem.push_attribute(("objectid", item.id.to_string().as_str()));
            elem.push_attribute((
                "transform",
                transform_to_attribute(&item.transform).as_str(),
            ));
            elem.push_attribute(("printable", if item.printable { "1" } else { "0" }));
            emit(writer, Event::Empty(elem), "item element")?;
        }

        emit(writer, Event::End(BytesEnd::new("build")), "build element")?;
        Ok(())
    }
}
