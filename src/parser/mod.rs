//! Archive reading
//!
//! Reading happens in two passes over the ZIP entries. The first pass
//! consumes every geometry part (`3D/*.model`), because the format
//! version recorded there governs how the sidecar's volume matrices
//! are interpreted. The second pass routes the sidecar, profile,
//! support-point, range and print-config parts. Reconciliation then
//! joins the two halves by archive object ID and slices each object's
//! triangle pool into volumes.

mod auxiliary;
mod config;
mod geometry;

use crate::config::PrintConfig;
use crate::error::{Error, Result};
use crate::mesh::TriangleMesh;
use crate::opc;
use crate::scene::{LayerConfigRange, Scene, SceneObject, SupportPoint, Volume, VolumeKind};
use crate::transform::{matrix_from_metadata, Transform3d};
use nalgebra::Point3;
use quick_xml::events::BytesStart;
use quick_xml::name::QName;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// Buffer capacity for XML event parsing
const XML_BUFFER_CAPACITY: usize = 4096;

/// Load an archive into a scene and print configuration
///
/// Convenience wrapper around [`Importer`]; recoverable problems are
/// reported through [`log`] and the importer's error list is dropped.
///
/// # Example
///
/// ```no_run
/// use slicer3mf::{load_3mf, PrintConfig, Scene};
///
/// # fn main() -> slicer3mf::Result<()> {
/// let mut scene = Scene::new();
/// let mut config = PrintConfig::new();
/// load_3mf("model.3mf", &mut scene, &mut config, true)?;
/// println!("loaded {} objects", scene.objects.len());
/// # Ok(())
/// # }
/// ```
pub fn load_3mf(
    path: impl AsRef<Path>,
    scene: &mut Scene,
    config: &mut PrintConfig,
    check_version: bool,
) -> Result<()> {
    let mut importer = Importer::new();
    importer.load_model_from_file(path.as_ref(), scene, config, check_version)
}

/// A component reference inside a composite object
#[derive(Debug, Clone)]
pub(crate) struct Component {
    pub(crate) object_id: u32,
    pub(crate) transform: Transform3d,
}

/// Raw geometry of one archive object: a flat vertex pool and flat
/// triangle index list, shared by all of the object's volumes
#[derive(Debug, Default)]
pub(crate) struct Geometry {
    pub(crate) vertices: Vec<f32>,
    pub(crate) triangles: Vec<u32>,
}

impl Geometry {
    pub(crate) fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.triangles.is_empty()
    }

    pub(crate) fn reset(&mut self) {
        self.vertices.clear();
        self.triangles.clear();
    }
}

/// The object currently being assembled by the geometry parser
#[derive(Debug, Default)]
struct CurrentObject {
    /// Archive object ID
    id: u32,
    /// Index of the scene object created for it, if the type was
    /// accepted
    object_idx: Option<usize>,
    geometry: Geometry,
    components: Vec<Component>,
}

impl CurrentObject {
    fn reset(&mut self) {
        self.id = 0;
        self.object_idx = None;
        self.geometry.reset();
        self.components.clear();
    }
}

/// Sidecar cursor: which object/volume metadata currently applies to
#[derive(Debug, Default)]
struct CurrentConfig {
    object_id: Option<u32>,
    volume_id: usize,
}

/// One sidecar volume entry: a triangle range plus its metadata pairs
#[derive(Debug, Clone)]
pub(crate) struct VolumeMetadata {
    pub(crate) first_triangle_id: usize,
    pub(crate) last_triangle_id: usize,
    pub(crate) metadata: Vec<(String, String)>,
}

impl VolumeMetadata {
    pub(crate) fn new(first_triangle_id: usize, last_triangle_id: usize) -> Self {
        Self {
            first_triangle_id,
            last_triangle_id,
            metadata: Vec::new(),
        }
    }
}

/// Sidecar metadata of one archive object
#[derive(Debug, Default)]
pub(crate) struct ObjectMetadata {
    pub(crate) metadata: Vec<(String, String)>,
    pub(crate) volumes: Vec<VolumeMetadata>,
}

/// A build-item placement waiting for `</model>` to be applied
#[derive(Debug)]
struct PendingInstance {
    object_idx: usize,
    instance_idx: usize,
    transform: Transform3d,
}

/// Reads an archive into a caller-supplied [`Scene`]
///
/// The importer owns no long-lived state across calls; accumulated
/// error messages from the previous load are available until the next
/// one starts.
pub struct Importer {
    version: u32,
    check_version: bool,
    unit_factor: f32,
    archive_stem: String,
    curr_object: CurrentObject,
    /// Archive object ID to scene object index
    objects: BTreeMap<u32, usize>,
    /// Archive object ID to component expansion; leaf objects alias
    /// themselves with a single identity entry
    aliases: BTreeMap<u32, Vec<Component>>,
    geometries: BTreeMap<u32, Geometry>,
    instances: Vec<PendingInstance>,
    curr_config: CurrentConfig,
    objects_metadata: BTreeMap<u32, ObjectMetadata>,
    /// Keyed by 1-based scene object index, not archive ID
    layer_heights_profiles: BTreeMap<usize, Vec<f64>>,
    layer_config_ranges: BTreeMap<usize, Vec<LayerConfigRange>>,
    sla_support_points: BTreeMap<usize, Vec<SupportPoint>>,
    curr_metadata_name: String,
    curr_characters: String,
    errors: Vec<String>,
}

impl Importer {
    /// Create a new importer
    pub fn new() -> Self {
        Self {
            version: 0,
            check_version: false,
            unit_factor: 1.0,
            archive_stem: String::new(),
            curr_object: CurrentObject::default(),
            objects: BTreeMap::new(),
            aliases: BTreeMap::new(),
            geometries: BTreeMap::new(),
            instances: Vec::new(),
            curr_config: CurrentConfig::default(),
            objects_metadata: BTreeMap::new(),
            layer_heights_profiles: BTreeMap::new(),
            layer_config_ranges: BTreeMap::new(),
            sla_support_points: BTreeMap::new(),
            curr_metadata_name: String::new(),
            curr_characters: String::new(),
            errors: Vec::new(),
        }
    }

    /// Error messages accumulated during the last load
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Write the accumulated error messages to a sink, one per line
    pub fn log_errors(&self, sink: &mut impl std::io::Write) -> std::io::Result<()> {
        for error in &self.errors {
            writeln!(sink, "{}", error)?;
        }
        Ok(())
    }

    /// Load an archive into `scene` and `config`
    ///
    /// With `check_version` set, an archive recorded with a newer
    /// format version than [`opc::FORMAT_VERSION`] fails with
    /// [`Error::VersionMismatch`].
    pub fn load_model_from_file(
        &mut self,
        path: &Path,
        scene: &mut Scene,
        config: &mut PrintConfig,
        check_version: bool,
    ) -> Result<()> {
        self.reset();
        self.check_version = check_version;
        self.archive_stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = File::open(path).map_err(|error| {
            self.errors.push("Unable to open the file".to_string());
            Error::Io(error)
        })?;
        let mut archive = ZipArchive::new(file)?;

        let mut entry_names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let entry = archive.by_index(index)?;
            entry_names.push(entry.name().replace('\\', "/"));
        }

        // first pass: geometry parts only, so the archive version is
        // known before any sidecar is interpreted
        for (index, name) in entry_names.iter().enumerate() {
            if opc::is_geometry_part(name) {
                log::debug!("parsing geometry part '{}'", name);
                let xml = read_entry_to_string(&mut archive, index)?;
                if xml.is_empty() {
                    return Err(self.fatal("Found invalid size"));
                }
                self.parse_geometry_part(&xml, scene)?;
            }
        }

        // second pass: everything keyed off the geometry
        for (index, name) in entry_names.iter().enumerate() {
            if name.eq_ignore_ascii_case(opc::LAYER_HEIGHTS_PROFILE_FILE) {
                let text = read_entry_to_string(&mut archive, index)?;
                self.parse_layer_heights_profiles(&text);
            } else if name.eq_ignore_ascii_case(opc::LAYER_CONFIG_RANGES_FILE) {
                let xml = read_entry_to_string(&mut archive, index)?;
                self.parse_layer_config_ranges(&xml);
            } else if name.eq_ignore_ascii_case(opc::SLA_SUPPORT_POINTS_FILE) {
                let text = read_entry_to_string(&mut archive, index)?;
                self.parse_sla_support_points(&text);
            } else if name.eq_ignore_ascii_case(opc::PRINT_CONFIG_FILE) {
                let text = read_entry_to_string(&mut archive, index)?;
                config.load_from_comments(&text);
            } else if name.eq_ignore_ascii_case(opc::MODEL_CONFIG_FILE) {
                let xml = read_entry_to_string(&mut archive, index)?;
                if xml.is_empty() {
                    return Err(self.fatal("Found invalid size"));
                }
                self.parse_sidecar_part(&xml)?;
            }
        }

        self.reconcile(scene)?;
        scene.adjust_min_z();
        Ok(())
    }

    fn reset(&mut self) {
        self.version = 0;
        self.check_version = false;
        self.unit_factor = 1.0;
        self.archive_stem.clear();
        self.curr_object.reset();
        self.objects.clear();
        self.aliases.clear();
        self.geometries.clear();
        self.instances.clear();
        self.curr_config = CurrentConfig::default();
        self.objects_metadata.clear();
        self.layer_heights_profiles.clear();
        self.layer_config_ranges.clear();
        self.sla_support_points.clear();
        self.curr_metadata_name.clear();
        self.curr_characters.clear();
        self.errors.clear();
    }

    /// Record a fatal message and build the error that aborts the part
    fn fatal(&mut self, message: &str) -> Error {
        self.errors.push(message.to_string());
        Error::InvalidModel(message.to_string())
    }

    /// Record a recoverable problem and continue
    fn soft_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.errors.push(message);
    }

    /// Join geometry and sidecar data into the final scene objects
    fn reconcile(&mut self, scene: &mut Scene) -> Result<()> {
        let entries: Vec<(u32, usize)> = self.objects.iter().map(|(&id, &idx)| (id, idx)).collect();
        for (id, object_idx) in entries {
            let geometry = match self.geometries.remove(&id) {
                Some(geometry) => geometry,
                None => return Err(self.fatal("Unable to find object geometry")),
            };

            // the text sidecars address objects by 1-based scene
            // position, not by archive object ID
            let scene_idx = object_idx + 1;
            if let Some(profile) = self.layer_heights_profiles.remove(&scene_idx) {
                scene.objects[object_idx].layer_height_profile = profile;
            }
            if let Some(ranges) = self.layer_config_ranges.remove(&scene_idx) {
                scene.objects[object_idx].layer_config_ranges = ranges;
            }
            if let Some(points) = self.sla_support_points.remove(&scene_idx) {
                if !points.is_empty() {
                    scene.objects[object_idx].sla_support_points = points;
                }
            }

            let volumes = match self.objects_metadata.remove(&id) {
                Some(meta) => {
                    // sidecar present: this archive was written by a
                    // slicer, apply its object metadata
                    let object = &mut scene.objects[object_idx];
                    for (key, value) in &meta.metadata {
                        if key == opc::NAME_KEY {
                            object.name = value.clone();
                        } else {
                            object.config.set(key, value);
                        }
                    }
                    meta.volumes
                }
                // no sidecar: the whole triangle pool becomes one volume
                None => vec![VolumeMetadata::new(0, geometry.triangles.len() / 3 - 1)],
            };

            self.generate_volumes(&mut scene.objects[object_idx], &geometry, &volumes)?;
        }
        Ok(())
    }

    /// Slice an object's triangle pool into volumes
    fn generate_volumes(
        &mut self,
        object: &mut SceneObject,
        geometry: &Geometry,
        volumes: &[VolumeMetadata],
    ) -> Result<()> {
        if !object.volumes.is_empty() {
            return Err(self.fatal("Found invalid volumes count"));
        }

        let triangle_count = geometry.triangles.len() / 3;

        for volume_data in volumes {
            if volume_data.first_triangle_id >= triangle_count
                || volume_data.last_triangle_id >= triangle_count
                || volume_data.last_triangle_id < volume_data.first_triangle_id
            {
                return Err(self.fatal("Found invalid triangle id"));
            }

            let mut matrix = Transform3d::identity();
            if self.version > 1 {
                if let Some((_, value)) = volume_data
                    .metadata
                    .iter()
                    .find(|(key, _)| key == opc::MATRIX_KEY)
                {
                    matrix = matrix_from_metadata(value);
                }
            }
            let inv_matrix = matrix.try_inverse().unwrap_or_else(Transform3d::identity);

            // slice the range out of the shared pool, compacting the
            // vertex set and renumbering indices per volume
            let mut mesh = TriangleMesh::new();
            let mut index_map: HashMap<u32, u32> = HashMap::new();
            for triangle in volume_data.first_triangle_id..=volume_data.last_triangle_id {
                let mut indices = [0u32; 3];
                for v in 0..3 {
                    let src = geometry.triangles[triangle * 3 + v];
                    let base = src as usize * 3;
                    if base + 2 >= geometry.vertices.len() {
                        return Err(self.fatal("Found invalid vertex id"));
                    }
                    let mapped = match index_map.get(&src) {
                        Some(&mapped) => mapped,
                        None => {
                            let mut point = Point3::new(
                                f64::from(geometry.vertices[base]),
                                f64::from(geometry.vertices[base + 1]),
                                f64::from(geometry.vertices[base + 2]),
                            );
                            if self.version > 1 {
                                // revert to the volume's local frame
                                point = inv_matrix.transform_point(&point);
                            }
                            let next = mesh.vertices.len() as u32;
                            mesh.vertices.push(Point3::new(
                                point.x as f32,
                                point.y as f32,
                                point.z as f32,
                            ));
                            index_map.insert(src, next);
                            next
                        }
                    };
                    indices[v] = mapped;
                }
                mesh.indices.push(indices);
            }
            mesh.repair();

            let mut volume = Volume::new(mesh);
            if self.version > 1 {
                volume.matrix = matrix;
            }
            volume.calculate_convex_hull();

            for (key, value) in &volume_data.metadata {
                match key.as_str() {
                    opc::NAME_KEY => volume.name = value.clone(),
                    opc::MODIFIER_KEY if value == "1" => {
                        volume.kind = VolumeKind::ParameterModifier
                    }
                    opc::VOLUME_TYPE_KEY => match VolumeKind::from_type_string(value) {
                        Some(kind) => volume.kind = kind,
                        None => self.soft_error(format!("Found unknown volume type '{}'", value)),
                    },
                    // consumed when the local frame was extracted
                    opc::MATRIX_KEY => {}
                    opc::SOURCE_FILE_KEY => volume.source.input_file = value.clone(),
                    opc::SOURCE_OBJECT_ID_KEY => {
                        volume.source.object_idx = value.parse().unwrap_or(0)
                    }
                    opc::SOURCE_VOLUME_ID_KEY => {
                        volume.source.volume_idx = value.parse().unwrap_or(0)
                    }
                    opc::SOURCE_OFFSET_X_KEY => {
                        volume.source.mesh_offset[0] = value.parse().unwrap_or(0.0)
                    }
                    opc::SOURCE_OFFSET_Y_KEY => {
                        volume.source.mesh_offset[1] = value.parse().unwrap_or(0.0)
                    }
                    opc::SOURCE_OFFSET_Z_KEY => {
                        volume.source.mesh_offset[2] = value.parse().unwrap_or(0.0)
                    }
                    _ => volume.config.set(key, value),
                }
            }

            object.volumes.push(volume);
        }

        Ok(())
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one ZIP entry fully into a string
fn read_entry_to_string<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> Result<String> {
    let mut entry = archive.by_index(index)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}

/// Convert an element name to an owned string
pub(crate) fn qname_to_string(name: QName) -> Result<String> {
    std::str::from_utf8(name.as_ref())
        .map(str::to_string)
        .map_err(|error| Error::InvalidXml(error.to_string()))
}

/// Attribute map of one element, values XML-unescaped
pub(crate) type AttributeMap = HashMap<String, String>;

/// Collect an element's attributes into a map
pub(crate) fn parse_attributes(e: &BytesStart) -> Result<AttributeMap> {
    let mut attrs = HashMap::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|error| Error::InvalidXml(error.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|error| Error::InvalidXml(error.to_string()))?
            .into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

/// String attribute, empty when missing
pub(crate) fn attr_string(attrs: &AttributeMap, key: &str) -> String {
    attrs.get(key).cloned().unwrap_or_default()
}

/// Float attribute, 0 when missing or malformed
pub(crate) fn attr_f32(attrs: &AttributeMap, key: &str) -> f32 {
    attrs
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0.0)
}

/// Double attribute, 0 when missing or malformed
pub(crate) fn attr_f64(attrs: &AttributeMap, key: &str) -> f64 {
    attrs
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0.0)
}

/// Unsigned attribute, 0 when missing or malformed
pub(crate) fn attr_u32(attrs: &AttributeMap, key: &str) -> u32 {
    attrs
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Index attribute, 0 when missing or malformed
pub(crate) fn attr_usize(attrs: &AttributeMap, key: &str) -> usize {
    attrs
        .get(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Boolean attribute, `true` when missing, numeric otherwise
pub(crate) fn attr_bool(attrs: &AttributeMap, key: &str) -> bool {
    attrs
        .get(key)
        .map(|value| value.trim().parse::<i32>().unwrap_or(0) != 0)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE_MODEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xml:lang="en-US" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02" xmlns:slic3rpe="http://schemas.slic3r.org/3mf/2017/06">
 <metadata name="slic3rpe:Version3mf">2</metadata>
 <resources>
  <object id="1" type="model" name="cube">
   <mesh>
    <vertices>
     <vertex x="0" y="0" z="0" />
     <vertex x="10" y="0" z="0" />
     <vertex x="10" y="10" z="0" />
     <vertex x="0" y="10" z="0" />
     <vertex x="0" y="0" z="10" />
     <vertex x="10" y="0" z="10" />
     <vertex x="10" y="10" z="10" />
     <vertex x="0" y="10" z="10" />
    </vertices>
    <triangles>
     <triangle v1="0" v2="2" v3="1" />
     <triangle v1="0" v2="3" v3="2" />
     <triangle v1="4" v2="5" v3="6" />
     <triangle v1="4" v2="6" v3="7" />
     <triangle v1="0" v2="1" v3="5" />
     <triangle v1="0" v2="5" v3="4" />
     <triangle v1="1" v2="2" v3="6" />
     <triangle v1="1" v2="6" v3="5" />
     <triangle v1="2" v2="3" v3="7" />
     <triangle v1="2" v2="7" v3="6" />
     <triangle v1="3" v2="0" v3="4" />
     <triangle v1="3" v2="4" v3="7" />
    </triangles>
   </mesh>
  </object>
 </resources>
 <build>
  <item objectid="1" transform="1 0 0 0 1 0 0 0 1 0 0 0" printable="1" />
 </build>
</model>"#;

    fn load_geometry(xml: &str) -> (Importer, Scene) {
        let mut importer = Importer::new();
        let mut scene = Scene::new();
        importer
            .parse_geometry_part(xml, &mut scene)
            .expect("geometry parse failed");
        (importer, scene)
    }

    #[test]
    fn test_cube_geometry_parse() {
        let (mut importer, mut scene) = load_geometry(CUBE_MODEL);
        assert_eq!(importer.version, 2);
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name, "cube");
        assert_eq!(scene.objects[0].instances.len(), 1);

        importer.reconcile(&mut scene).expect("reconcile failed");
        let object = &scene.objects[0];
        assert_eq!(object.volumes.len(), 1);
        assert_eq!(object.volumes[0].mesh.vertices.len(), 8);
        assert_eq!(object.volumes[0].mesh.indices.len(), 12);
    }

    #[test]
    fn test_unit_scaling_inch() {
        let xml = r#"<model unit="inch"><resources><object id="1" type="model">
            <mesh><vertices><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/><vertex x="0" y="0" z="1"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh>
            </object></resources><build><item objectid="1"/></build></model>"#;
        let (mut importer, mut scene) = load_geometry(xml);
        importer.reconcile(&mut scene).unwrap();
        let mesh = &scene.objects[0].volumes[0].mesh;
        assert_eq!(mesh.vertices[0].x, 25.4);
        assert_eq!(mesh.vertices[1].y, 25.4);
        assert_eq!(mesh.vertices[2].z, 25.4);
    }

    #[test]
    fn test_missing_vertex_coordinates_default_to_zero() {
        let xml = r#"<model><resources><object id="1">
            <mesh><vertices><vertex x="5"/><vertex y="5"/><vertex z="5"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh>
            </object></resources><build><item objectid="1"/></build></model>"#;
        let (mut importer, mut scene) = load_geometry(xml);
        importer.reconcile(&mut scene).unwrap();
        let mesh = &scene.objects[0].volumes[0].mesh;
        assert_eq!(mesh.vertices[0], Point3::new(5.0, 0.0, 0.0));
        assert_eq!(mesh.vertices[1], Point3::new(0.0, 5.0, 0.0));
        assert_eq!(mesh.vertices[2], Point3::new(0.0, 0.0, 5.0));
    }

    #[test]
    fn test_skipped_object_types() {
        for object_type in ["support", "solidsupport", "surface", "other"] {
            let xml = format!(
                r#"<model><resources><object id="1" type="{}">
                <mesh><vertices><vertex x="1" y="1" z="1"/></vertices>
                <triangles><triangle v1="0" v2="0" v3="0"/></triangles></mesh>
                </object></resources><build/></model>"#,
                object_type
            );
            let (importer, scene) = load_geometry(&xml);
            assert!(scene.objects.is_empty(), "type '{}' kept", object_type);
            assert!(importer.objects.is_empty());
        }
    }

    #[test]
    fn test_duplicate_object_id_is_fatal() {
        let xml = r#"<model><resources>
            <object id="7"><mesh><vertices><vertex x="1" y="0" z="0"/></vertices>
             <triangles><triangle v1="0" v2="0" v3="0"/></triangles></mesh></object>
            <object id="7"><mesh><vertices><vertex x="1" y="0" z="0"/></vertices>
             <triangles><triangle v1="0" v2="0" v3="0"/></triangles></mesh></object>
            </resources><build/></model>"#;
        let mut importer = Importer::new();
        let mut scene = Scene::new();
        let result = importer.parse_geometry_part(xml, &mut scene);
        assert!(matches!(result, Err(Error::InvalidModel(_))));
        assert!(importer
            .errors()
            .iter()
            .any(|e| e.contains("duplicate id")));
    }

    #[test]
    fn test_forward_component_reference_is_fatal() {
        let xml = r#"<model><resources>
            <object id="2"><components><component objectid="1"/></components></object>
            </resources><build/></model>"#;
        let mut importer = Importer::new();
        let mut scene = Scene::new();
        assert!(importer.parse_geometry_part(xml, &mut scene).is_err());
        assert!(importer
            .errors()
            .iter()
            .any(|e| e.contains("invalid object id")));
    }

    #[test]
    fn test_component_alias_expansion() {
        let xml = r#"<model><resources>
            <object id="1" type="model"><mesh>
             <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
             <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object>
            <object id="2"><components><component objectid="1" transform="1 0 0 0 1 0 0 0 1 10 0 0"/></components></object>
            </resources>
            <build><item objectid="2"/></build></model>"#;
        let (mut importer, mut scene) = load_geometry(xml);
        importer.reconcile(&mut scene).unwrap();
        assert_eq!(scene.objects.len(), 1);
        let object = &scene.objects[0];
        assert_eq!(object.instances.len(), 1);
        assert_eq!(object.instances[0].transform[(0, 3)], 10.0);
    }

    #[test]
    fn test_uninstanced_object_is_dropped() {
        let xml = r#"<model><resources>
            <object id="1"><mesh><vertices><vertex x="1" y="0" z="0"/></vertices>
             <triangles><triangle v1="0" v2="0" v3="0"/></triangles></mesh></object>
            <object id="2"><mesh><vertices><vertex x="2" y="0" z="0"/></vertices>
             <triangles><triangle v1="0" v2="0" v3="0"/></triangles></mesh></object>
            </resources>
            <build><item objectid="2"/></build></model>"#;
        let (importer, scene) = load_geometry(xml);
        assert_eq!(scene.objects.len(), 1);
        // the surviving object's map entry was remapped to index 0
        assert_eq!(importer.objects.get(&2), Some(&0));
        assert!(importer.objects.get(&1).is_none());
    }

    #[test]
    fn test_alias_recursion_limit() {
        // chain of eleven aliases, one over the limit
        let mut xml = String::from("<model><resources>");
        xml.push_str(
            r#"<object id="1"><mesh>
             <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
             <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object>"#,
        );
        for id in 2..=11 {
            xml.push_str(&format!(
                r#"<object id="{}"><components><component objectid="{}"/></components></object>"#,
                id,
                id - 1
            ));
        }
        xml.push_str(r#"</resources><build><item objectid="11"/></build></model>"#);

        let mut importer = Importer::new();
        let mut scene = Scene::new();
        let result = importer.parse_geometry_part(&xml, &mut scene);
        assert!(result.is_err());
        assert!(importer
            .errors()
            .iter()
            .any(|e| e.contains("Too many recursions")));
    }

    #[test]
    fn test_alias_depth_ten_succeeds() {
        let mut xml = String::from("<model><resources>");
        xml.push_str(
            r#"<object id="1"><mesh>
             <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
             <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object>"#,
        );
        for id in 2..=10 {
            xml.push_str(&format!(
                r#"<object id="{}"><components><component objectid="{}"/></components></object>"#,
                id,
                id - 1
            ));
        }
        xml.push_str(r#"</resources><build><item objectid="10"/></build></model>"#);

        let (_, scene) = load_geometry(&xml);
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].instances.len(), 1);
    }

    #[test]
    fn test_version_gate() {
        let xml = r#"<model>
            <metadata name="slic3rpe:Version3mf">99</metadata>
            <resources/><build/></model>"#;

        let mut importer = Importer::new();
        importer.check_version = true;
        let mut scene = Scene::new();
        let result = importer.parse_geometry_part(xml, &mut scene);
        assert!(matches!(
            result,
            Err(Error::VersionMismatch {
                found: 99,
                supported: 2
            })
        ));

        // without checking, the same archive parses fine
        let mut importer = Importer::new();
        let mut scene = Scene::new();
        assert!(importer.parse_geometry_part(xml, &mut scene).is_ok());
        assert_eq!(importer.version, 99);
    }

    #[test]
    fn test_zero_scale_transform_keeps_identity() {
        let xml = r#"<model><resources>
            <object id="1"><mesh>
             <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
             <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object>
            </resources>
            <build><item objectid="1" transform="0 0 0 0 1 0 0 0 1 5 5 5"/></build></model>"#;
        let (_, scene) = load_geometry(xml);
        let instance = &scene.objects[0].instances[0];
        assert_eq!(instance.transform, Transform3d::identity());
    }

    #[test]
    fn test_sidecar_volume_partition() {
        let model = r#"<model>
            <metadata name="slic3rpe:Version3mf">1</metadata>
            <resources><object id="1"><mesh>
            <vertices>
             <vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/>
             <vertex x="5" y="5" z="5"/><vertex x="6" y="5" z="5"/><vertex x="5" y="6" z="5"/>
            </vertices>
            <triangles>
             <triangle v1="0" v2="1" v3="2"/>
             <triangle v1="3" v2="4" v3="5"/>
             <triangle v1="3" v2="5" v3="4"/>
            </triangles></mesh></object></resources>
            <build><item objectid="1"/></build></model>"#;
        let sidecar = r#"<config>
            <object id="1">
             <metadata type="object" key="name" value="split"/>
             <volume firstid="0" lastid="0">
              <metadata type="volume" key="name" value="lower"/>
             </volume>
             <volume firstid="1" lastid="2">
              <metadata type="volume" key="name" value="upper"/>
              <metadata type="volume" key="volume_type" value="parameter_modifier"/>
             </volume>
            </object></config>"#;

        let (mut importer, mut scene) = load_geometry(model);
        importer.parse_sidecar_part(sidecar).unwrap();
        importer.reconcile(&mut scene).unwrap();

        let object = &scene.objects[0];
        assert_eq!(object.name, "split");
        assert_eq!(object.volumes.len(), 2);
        assert_eq!(object.volumes[0].name, "lower");
        assert_eq!(object.volumes[0].mesh.indices.len(), 1);
        assert_eq!(object.volumes[1].name, "upper");
        assert_eq!(object.volumes[1].mesh.indices.len(), 2);
        assert_eq!(object.volumes[1].kind, VolumeKind::ParameterModifier);
        // vertex sets are compacted per volume
        assert_eq!(object.volumes[0].mesh.vertices.len(), 3);
        assert_eq!(object.volumes[1].mesh.vertices.len(), 3);
    }

    #[test]
    fn test_sidecar_range_out_of_bounds_is_fatal() {
        let model = r#"<model><resources><object id="1"><mesh>
            <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object></resources>
            <build><item objectid="1"/></build></model>"#;
        let sidecar = r#"<config><object id="1"><volume firstid="0" lastid="5"/></object></config>"#;

        let (mut importer, mut scene) = load_geometry(model);
        importer.parse_sidecar_part(sidecar).unwrap();
        let result = importer.reconcile(&mut scene);
        assert!(matches!(result, Err(Error::InvalidModel(_))));
        assert!(importer
            .errors()
            .iter()
            .any(|e| e.contains("invalid triangle id")));
    }

    #[test]
    fn test_modifier_then_volume_type_precedence() {
        let model = r#"<model><resources><object id="1"><mesh>
            <vertices><vertex x="0" y="0" z="0"/><vertex x="1" y="0" z="0"/><vertex x="0" y="1" z="0"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object></resources>
            <build><item objectid="1"/></build></model>"#;
        let sidecar = r#"<config><object id="1"><volume firstid="0" lastid="0">
            <metadata type="volume" key="modifier" value="1"/>
            <metadata type="volume" key="volume_type" value="support_blocker"/>
            </volume></object></config>"#;

        let (mut importer, mut scene) = load_geometry(model);
        importer.parse_sidecar_part(sidecar).unwrap();
        importer.reconcile(&mut scene).unwrap();
        // volume_type is applied after the legacy modifier flag
        assert_eq!(
            scene.objects[0].volumes[0].kind,
            VolumeKind::SupportBlocker
        );
    }

    #[test]
    fn test_volume_local_matrix_reverted_on_read() {
        let model = r#"<model>
            <metadata name="slic3rpe:Version3mf">2</metadata>
            <resources><object id="1"><mesh>
            <vertices><vertex x="10" y="20" z="30"/><vertex x="11" y="20" z="30"/><vertex x="10" y="21" z="30"/></vertices>
            <triangles><triangle v1="0" v2="1" v3="2"/></triangles></mesh></object></resources>
            <build><item objectid="1"/></build></model>"#;
        // translation (10, 20, 30): mesh vertices are stored in world
        // frame and must come back in local coordinates
        let sidecar = r#"<config><object id="1"><volume firstid="0" lastid="0">
            <metadata type="volume" key="matrix" value="1 0 0 10 0 1 0 20 0 0 1 30 0 0 0 1"/>
            </volume></object></config>"#;

        let (mut importer, mut scene) = load_geometry(model);
        importer.parse_sidecar_part(sidecar).unwrap();
        importer.reconcile(&mut scene).unwrap();

        let volume = &scene.objects[0].volumes[0];
        assert_eq!(volume.matrix[(0, 3)], 10.0);
        assert_eq!(volume.mesh.vertices[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(volume.mesh.vertices[1], Point3::new(1.0, 0.0, 0.0));
        assert_eq!(volume.mesh.vertices[2], Point3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_duplicate_sidecar_object_is_fatal() {
        let sidecar = r#"<config><object id="1"/><object id="1"/></config>"#;
        let mut importer = Importer::new();
        let result = importer.parse_sidecar_part(sidecar);
        assert!(matches!(result, Err(Error::InvalidModel(_))));
    }

    #[test]
    fn test_invalid_metadata_type_is_fatal() {
        let sidecar =
            r#"<config><object id="1"><metadata type="part" key="k" value="v"/></object></config>"#;
        let mut importer = Importer::new();
        assert!(importer.parse_sidecar_part(sidecar).is_err());
    }
}
