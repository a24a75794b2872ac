//! In-memory scene model
//!
//! The scene is what the codec reads archives into and writes archives
//! from: a list of objects, each owning its volumes (one mesh per
//! volume, in the volume's local frame) and its placed instances.

use crate::config::PrintConfig;
use crate::mesh::TriangleMesh;
use crate::transform::Transform3d;

/// A complete scene: the unit of a load or store operation
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Objects in scene order; text sidecars address them by 1-based
    /// position in this list
    pub objects: Vec<SceneObject>,
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise objects so no instance dips below the build plate
    ///
    /// For every object whose placed geometry reaches below z = 0, all
    /// of its instances are shifted up by the overshoot.
    pub fn adjust_min_z(&mut self) {
        for object in &mut self.objects {
            let mut min_z = f64::INFINITY;
            for instance in &object.instances {
                for volume in &object.volumes {
                    let world = instance.transform * volume.matrix;
                    if let Some((min, _)) = volume.mesh.transformed_aabb(&world) {
                        min_z = min_z.min(min.z);
                    }
                }
            }
            if min_z < 0.0 && min_z.is_finite() {
                for instance in &mut object.instances {
                    instance.transform[(2, 3)] -= min_z;
                }
            }
        }
    }
}

/// One object: shared metadata plus volumes and instances
#[derive(Debug, Clone, Default)]
pub struct SceneObject {
    /// Display name; synthesized from the archive stem when absent
    pub name: String,
    /// Per-object configuration overrides
    pub config: PrintConfig,
    /// Volumes partitioning the object's triangle pool
    pub volumes: Vec<Volume>,
    /// Placed instances of this object
    pub instances: Vec<Instance>,
    /// Layer-height profile, an opaque even-length float list
    pub layer_height_profile: Vec<f64>,
    /// Per-height-range configuration overrides
    pub layer_config_ranges: Vec<LayerConfigRange>,
    /// SLA support points
    pub sla_support_points: Vec<SupportPoint>,
}

impl SceneObject {
    /// Create an empty object
    pub fn new() -> Self {
        Self::default()
    }
}

/// The role a volume plays during slicing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VolumeKind {
    /// Printable part geometry
    #[default]
    ModelPart,
    /// Region overriding print parameters
    ParameterModifier,
    /// Region forcing support generation
    SupportEnforcer,
    /// Region suppressing support generation
    SupportBlocker,
}

impl VolumeKind {
    /// Parse the sidecar `volume_type` string
    pub fn from_type_string(value: &str) -> Option<Self> {
        match value {
            "model_part" => Some(VolumeKind::ModelPart),
            "parameter_modifier" => Some(VolumeKind::ParameterModifier),
            "support_enforcer" => Some(VolumeKind::SupportEnforcer),
            "support_blocker" => Some(VolumeKind::SupportBlocker),
            _ => None,
        }
    }

    /// The sidecar `volume_type` string
    pub fn type_string(&self) -> &'static str {
        match self {
            VolumeKind::ModelPart => "model_part",
            VolumeKind::ParameterModifier => "parameter_modifier",
            VolumeKind::SupportEnforcer => "support_enforcer",
            VolumeKind::SupportBlocker => "support_blocker",
        }
    }

    /// True for the legacy `modifier` flag
    pub fn is_modifier(&self) -> bool {
        *self == VolumeKind::ParameterModifier
    }
}

/// Provenance of a volume's mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeSource {
    /// Path of the file the mesh was imported from
    pub input_file: String,
    /// Object index within the source file
    pub object_idx: i32,
    /// Volume index within the source object
    pub volume_idx: i32,
    /// Offset applied to the source mesh on import
    pub mesh_offset: [f64; 3],
}

/// A contiguous triangle range of an object, with its own mesh
#[derive(Debug, Clone)]
pub struct Volume {
    /// Display name
    pub name: String,
    /// Slicing role
    pub kind: VolumeKind,
    /// Mesh in the volume's local frame
    pub mesh: TriangleMesh,
    /// Local frame; reapplying it yields world coordinates
    pub matrix: Transform3d,
    /// Per-volume configuration overrides
    pub config: PrintConfig,
    /// Source provenance, empty `input_file` when unknown
    pub source: VolumeSource,
    /// Convex hull of the mesh, if one could be computed
    pub convex_hull: Option<TriangleMesh>,
}

impl Volume {
    /// Create a volume around a mesh with identity local frame
    pub fn new(mesh: TriangleMesh) -> Self {
        Self {
            name: String::new(),
            kind: VolumeKind::default(),
            mesh,
            matrix: Transform3d::identity(),
            config: PrintConfig::new(),
            source: VolumeSource::default(),
            convex_hull: None,
        }
    }

    /// Compute and cache the mesh's convex hull
    pub fn calculate_convex_hull(&mut self) {
        self.convex_hull = self.mesh.convex_hull();
    }
}

/// One placement of an object in the printable scene
#[derive(Debug, Clone)]
pub struct Instance {
    /// World transform
    pub transform: Transform3d,
    /// Whether the instance takes part in the print
    pub printable: bool,
}

impl Instance {
    /// Create an identity-placed printable instance
    pub fn new() -> Self {
        Self {
            transform: Transform3d::identity(),
            printable: true,
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// A z-range with configuration overrides
#[derive(Debug, Clone, Default)]
pub struct LayerConfigRange {
    /// Lower bound of the range
    pub min_z: f64,
    /// Upper bound of the range
    pub max_z: f64,
    /// Overrides active inside the range
    pub config: PrintConfig,
}

/// A single SLA support point
#[derive(Debug, Clone, PartialEq)]
pub struct SupportPoint {
    /// Position
    pub pos: [f32; 3],
    /// Radius of the support head
    pub head_front_radius: f32,
    /// Whether the point supports a newly created island
    pub is_new_island: bool,
}

impl SupportPoint {
    /// Create a support point
    pub fn new(x: f32, y: f32, z: f32, head_front_radius: f32, is_new_island: bool) -> Self {
        Self {
            pos: [x, y, z],
            head_front_radius,
            is_new_island,
        }
    }
}
