//! # slicer3mf
//!
//! A bidirectional codec for slicer-extended 3MF archives: ZIP
//! packages following the 3MF core specification, carrying a
//! vendor-specific sidecar that preserves model structure the base
//! format cannot express (volumes with local frames and roles,
//! per-object and per-volume configuration, layer-height profiles,
//! layer config ranges and SLA support points).
//!
//! Reading joins the geometry part and the sidecar by archive object
//! ID: each object's shared triangle pool is sliced into volumes
//! using the sidecar's triangle ranges, and composite objects are
//! expanded into flat instances through the component alias graph.
//! Writing is symmetric and round-trips every semantically meaningful
//! field exactly, including float values.
//!
//! ## Example: loading an archive
//!
//! ```no_run
//! use slicer3mf::{load_3mf, PrintConfig, Scene};
//!
//! # fn main() -> slicer3mf::Result<()> {
//! let mut scene = Scene::new();
//! let mut config = PrintConfig::new();
//! load_3mf("model.3mf", &mut scene, &mut config, true)?;
//!
//! for object in &scene.objects {
//!     println!(
//!         "{}: {} volumes, {} instances",
//!         object.name,
//!         object.volumes.len(),
//!         object.instances.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: storing a scene
//!
//! ```no_run
//! use nalgebra::Point3;
//! use slicer3mf::{store_3mf, Instance, Scene, SceneObject, TriangleMesh, Volume};
//!
//! # fn main() -> slicer3mf::Result<()> {
//! let mut mesh = TriangleMesh::new();
//! mesh.vertices.push(Point3::new(0.0, 0.0, 0.0));
//! mesh.vertices.push(Point3::new(10.0, 0.0, 0.0));
//! mesh.vertices.push(Point3::new(5.0, 10.0, 0.0));
//! mesh.indices.push([0, 1, 2]);
//!
//! let mut object = SceneObject::new();
//! object.name = "triangle".to_string();
//! object.volumes.push(Volume::new(mesh));
//! object.instances.push(Instance::new());
//!
//! let mut scene = Scene::new();
//! scene.objects.push(object);
//!
//! store_3mf("out.3mf", &scene, None, None)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod mesh;
pub mod opc;
pub mod parser;
pub mod scene;
pub mod transform;
pub mod writer;

pub use config::PrintConfig;
pub use error::{Error, Result};
pub use mesh::TriangleMesh;
pub use opc::FORMAT_VERSION;
pub use parser::{load_3mf, Importer};
pub use scene::{
    Instance, LayerConfigRange, Scene, SceneObject, SupportPoint, Volume, VolumeKind, VolumeSource,
};
pub use transform::Transform3d;
pub use writer::{store_3mf, Exporter};
