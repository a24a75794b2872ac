//! SAX state machine for the geometry part
//!
//! One `read_event_into` loop dispatches on raw element names;
//! namespace prefixes are not resolved, matching how existing slicers
//! emit and read this part. `Empty` events run the start handler and
//! then the end handler so self-closing elements behave like paired
//! ones.

use super::{
    attr_bool, attr_f32, attr_string, attr_u32, parse_attributes, qname_to_string, AttributeMap,
    Component, Importer, PendingInstance, XML_BUFFER_CAPACITY,
};
use crate::error::{Error, Result};
use crate::opc;
use crate::scene::{Instance, Scene, SceneObject};
use crate::transform::{has_zero_scale, transform_from_attribute, unit_factor, Transform3d};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Bound on alias expansion depth; the build item itself counts as 1
const MAX_RECURSIONS: u32 = 10;

/// An object type attribute is accepted when empty (defaults to
/// "model") or explicitly "model"; all other types are skipped
fn is_valid_object_type(object_type: &str) -> bool {
    object_type.is_empty() || object_type == "model"
}

impl Importer {
    /// Parse one geometry part into the scene
    pub(super) fn parse_geometry_part(&mut self, xml: &str, scene: &mut Scene) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    let attrs = parse_attributes(e)?;
                    self.handle_geometry_start(&name, &attrs, scene)?;
                }
                Ok(Event::Empty(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    let attrs = parse_attributes(e)?;
                    self.handle_geometry_start(&name, &attrs, scene)?;
                    self.handle_geometry_end(&name, scene)?;
                }
                Ok(Event::End(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    self.handle_geometry_end(&name, scene)?;
                }
                Ok(Event::Text(ref t)) => {
                    let text = t
                        .unescape()
                        .map_err(|error| Error::InvalidXml(error.to_string()))?;
                    self.curr_characters.push_str(&text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(error) => {
                    self.errors
                        .push(format!("Error while parsing the geometry part: {}", error));
                    return Err(Error::Xml(error));
                }
            }
            buf.clear();
        }

        Ok(())
    }

    fn handle_geometry_start(
        &mut self,
        name: &str,
        attrs: &AttributeMap,
        scene: &mut Scene,
    ) -> Result<()> {
        match name {
            "model" => {
                self.unit_factor = unit_factor(&attr_string(attrs, "unit"));
                Ok(())
            }
            "object" => self.handle_start_object(attrs, scene),
            "mesh" => {
                self.curr_object.geometry.reset();
                Ok(())
            }
            "vertices" => {
                self.curr_object.geometry.vertices.clear();
                Ok(())
            }
            "vertex" => {
                // missing coordinates default to zero
                let geometry = &mut self.curr_object.geometry;
                geometry.vertices.push(self.unit_factor * attr_f32(attrs, "x"));
                geometry.vertices.push(self.unit_factor * attr_f32(attrs, "y"));
                geometry.vertices.push(self.unit_factor * attr_f32(attrs, "z"));
                Ok(())
            }
            "triangles" => {
                self.curr_object.geometry.triangles.clear();
                Ok(())
            }
            "triangle" => {
                // p1/p2/p3/pid material attributes are ignored;
                // missing indices default to zero
                let geometry = &mut self.curr_object.geometry;
                geometry.triangles.push(attr_u32(attrs, "v1"));
                geometry.triangles.push(attr_u32(attrs, "v2"));
                geometry.triangles.push(attr_u32(attrs, "v3"));
                Ok(())
            }
            "components" => {
                self.curr_object.components.clear();
                Ok(())
            }
            "component" => self.handle_start_component(attrs),
            "item" => self.handle_start_item(attrs, scene),
            "metadata" => {
                self.curr_characters.clear();
                let metadata_name = attr_string(attrs, "name");
                if !metadata_name.is_empty() {
                    self.curr_metadata_name = metadata_name;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_geometry_end(&mut self, name: &str, scene: &mut Scene) -> Result<()> {
        match name {
            "model" => self.handle_end_model(scene),
            "object" => self.handle_end_object(scene),
            "metadata" => self.handle_end_metadata(),
            _ => Ok(()),
        }
    }

    fn handle_start_object(&mut self, attrs: &AttributeMap, scene: &mut Scene) -> Result<()> {
        self.curr_object.reset();

        let object_type = attr_string(attrs, "type");
        if is_valid_object_type(&object_type) {
            // the object may be removed again if no instance ever
            // references it
            self.curr_object.object_idx = Some(scene.objects.len());

            let mut object = SceneObject::new();
            object.name = attr_string(attrs, "name");
            if object.name.is_empty() {
                object.name = format!("{}_{}", self.archive_stem, scene.objects.len() + 1);
            }
            scene.objects.push(object);

            self.curr_object.id = attr_u32(attrs, "id");
        } else {
            log::debug!("skipping object of type '{}'", object_type);
        }

        Ok(())
    }

    fn handle_end_object(&mut self, scene: &mut Scene) -> Result<()> {
        let Some(object_idx) = self.curr_object.object_idx.take() else {
            return Ok(());
        };
        let id = self.curr_object.id;

        if self.curr_object.geometry.is_empty() {
            // no mesh of its own; the scene object created at the
            // start tag goes away again (it is still the last one)
            scene.objects.pop();

            if self.curr_object.components.is_empty() {
                // neither mesh nor components: forget the id entirely
                self.objects.remove(&id);
                self.aliases.remove(&id);
            } else {
                self.aliases
                    .insert(id, std::mem::take(&mut self.curr_object.components));
            }
        } else {
            if self.objects.contains_key(&id) {
                return Err(self.fatal("Found object with duplicate id"));
            }
            self.geometries
                .insert(id, std::mem::take(&mut self.curr_object.geometry));
            self.objects.insert(id, object_idx);
            // a leaf object aliases itself
            self.aliases.insert(
                id,
                vec![Component {
                    object_id: id,
                    transform: Transform3d::identity(),
                }],
            );
        }

        Ok(())
    }

    fn handle_start_component(&mut self, attrs: &AttributeMap) -> Result<()> {
        let object_id = attr_u32(attrs, "objectid");
        let transform = transform_from_attribute(&attr_string(attrs, "transform"));

        // forward references are not accepted; the referenced object
        // must already be registered as geometry or as an alias
        if !self.objects.contains_key(&object_id) && !self.aliases.contains_key(&object_id) {
            return Err(self.fatal("Found component with invalid object id"));
        }

        self.curr_object.components.push(Component {
            object_id,
            transform,
        });
        Ok(())
    }

    fn handle_start_item(&mut self, attrs: &AttributeMap, scene: &mut Scene) -> Result<()> {
        let object_id = attr_u32(attrs, "objectid");
        let transform = transform_from_attribute(&attr_string(attrs, "transform"));
        let printable = attr_bool(attrs, "printable");

        self.create_object_instance(scene, object_id, transform, printable, 1)
    }

    fn handle_end_metadata(&mut self) -> Result<()> {
        if self.curr_metadata_name == opc::VERSION_METADATA_NAME {
            self.version = self.curr_characters.trim().parse().unwrap_or(0);

            if self.check_version && self.version > opc::FORMAT_VERSION {
                return Err(Error::VersionMismatch {
                    found: self.version,
                    supported: opc::FORMAT_VERSION,
                });
            }
        }
        Ok(())
    }

    fn handle_end_model(&mut self, scene: &mut Scene) -> Result<()> {
        // place the pending instances; zero-scale transforms are
        // rejected and the instance keeps identity
        for pending in self.instances.drain(..) {
            if let Some(instance) = scene
                .objects
                .get_mut(pending.object_idx)
                .and_then(|object| object.instances.get_mut(pending.instance_idx))
            {
                if !has_zero_scale(&pending.transform) {
                    instance.transform = pending.transform;
                }
            }
        }

        // drop objects that never received an instance, remapping the
        // id-to-index bookkeeping to the compacted vector
        let mut new_index = vec![usize::MAX; scene.objects.len()];
        let mut kept = 0usize;
        for (i, object) in scene.objects.iter().enumerate() {
            if !object.instances.is_empty() {
                new_index[i] = kept;
                kept += 1;
            }
        }
        if kept != scene.objects.len() {
            scene.objects.retain(|object| !object.instances.is_empty());
            self.objects.retain(|_, idx| {
                let mapped = new_index[*idx];
                *idx = mapped;
                mapped != usize::MAX
            });
        }

        Ok(())
    }

    /// Recursively expand a build item through the alias map
    fn create_object_instance(
        &mut self,
        scene: &mut Scene,
        object_id: u32,
        transform: Transform3d,
        printable: bool,
        recursion_depth: u32,
    ) -> Result<()> {
        if recursion_depth > MAX_RECURSIONS {
            return Err(self.fatal("Too many recursions"));
        }

        let Some(components) = self.aliases.get(&object_id).cloned() else {
            return Err(self.fatal("Found item with invalid object id"));
        };

        if components.len() == 1 && components[0].object_id == object_id {
            // aliasing to itself: attach a real instance
            let Some(&object_idx) = self.objects.get(&object_id) else {
                return Err(self.fatal("Found invalid object"));
            };
            let Some(object) = scene.objects.get_mut(object_idx) else {
                return Err(self.fatal("Found invalid object"));
            };

            let mut instance = Instance::new();
            instance.printable = printable;
            let instance_idx = object.instances.len();
            object.instances.push(instance);

            self.instances.push(PendingInstance {
                object_idx,
                instance_idx,
                transform,
            });
        } else {
            for component in &components {
                self.create_object_instance(
                    scene,
                    component.object_id,
                    transform * component.transform,
                    printable,
                    recursion_depth + 1,
                )?;
            }
        }

        Ok(())
    }
}
