//! Archive writing
//!
//! Parts are added in a fixed order: content types, the optional
//! thumbnail, relationships, the geometry part, layer-height profiles,
//! layer config ranges, SLA support points, the print config and the
//! model-config sidecar, then the archive is finalized. Writing is
//! atomic: any failure after the output file was created removes it
//! again.

mod config;
mod geometry;

use crate::config::PrintConfig;
use crate::error::{Error, Result};
use crate::opc;
use crate::scene::Scene;
use quick_xml::events::Event;
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Store a scene (and optional print config and PNG thumbnail) to an
/// archive at `path`
///
/// Convenience wrapper around [`Exporter`].
///
/// # Example
///
/// ```no_run
/// use slicer3mf::{store_3mf, PrintConfig, Scene};
///
/// # fn main() -> slicer3mf::Result<()> {
/// # let scene = Scene::new();
/// let config = PrintConfig::new();
/// store_3mf("out.3mf", &scene, Some(&config), None)?;
/// # Ok(())
/// # }
/// ```
pub fn store_3mf(
    path: impl AsRef<Path>,
    scene: &Scene,
    config: Option<&PrintConfig>,
    thumbnail: Option<&[u8]>,
) -> Result<()> {
    let mut exporter = Exporter::new();
    exporter.save_model_to_file(path.as_ref(), scene, config, thumbnail)
}

/// Per-volume placement inside the object's single indexed triangle set
#[derive(Debug, Clone, Copy)]
pub(crate) struct VolumeOffsets {
    /// Index of the volume's first vertex in the concatenated pool
    pub(crate) first_vertex_id: u32,
    /// First triangle of the volume's contiguous range
    pub(crate) first_triangle_id: usize,
    /// Last triangle of the volume's contiguous range, inclusive
    pub(crate) last_triangle_id: usize,
}

/// Bookkeeping shared between the geometry and sidecar writers,
/// keyed by the 1-based ID of the object's first instance
#[derive(Debug)]
pub(crate) struct ObjectData {
    /// Index of the object in the scene's object list
    pub(crate) object_index: usize,
    /// One entry per volume, in volume order
    pub(crate) offsets: Vec<VolumeOffsets>,
}

/// One `<item>` of the build section
#[derive(Debug)]
pub(crate) struct BuildItem {
    pub(crate) id: u32,
    pub(crate) transform: crate::transform::Transform3d,
    pub(crate) printable: bool,
}

/// Writes a scene to an archive
pub struct Exporter {
    errors: Vec<String>,
}

impl Exporter {
    /// Create a new exporter
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Error messages accumulated during the last store
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Write the accumulated error messages to a sink, one per line
    pub fn log_errors(&self, sink: &mut impl Write) -> std::io::Result<()> {
        for error in &self.errors {
            writeln!(sink, "{}", error)?;
        }
        Ok(())
    }

    /// Store `scene` to an archive at `path`
    ///
    /// On any failure the partially written output file is removed.
    pub fn save_model_to_file(
        &mut self,
        path: &Path,
        scene: &Scene,
        config: Option<&PrintConfig>,
        thumbnail: Option<&[u8]>,
    ) -> Result<()> {
        self.errors.clear();
        let result = self.save_archive(path, scene, config, thumbnail);
        if result.is_err() {
            let _ = std::fs::remove_file(path);
        }
        result
    }

    fn save_archive(
        &mut self,
        path: &Path,
        scene: &Scene,
        config: Option<&PrintConfig>,
        thumbnail: Option<&[u8]>,
    ) -> Result<()> {
        let file = File::create(path).map_err(|error| {
            self.errors.push("Unable to open the file".to_string());
            Error::Io(error)
        })?;
        let mut archive = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        archive.start_file(opc::CONTENT_TYPES_FILE, options)?;
        archive.write_all(opc::content_types_payload(thumbnail.is_some()).as_bytes())?;

        if let Some(png) = thumbnail {
            archive.start_file(opc::THUMBNAIL_FILE, options)?;
            archive.write_all(png)?;
        }

        archive.start_file(opc::RELATIONSHIPS_FILE, options)?;
        archive.write_all(opc::relationships_payload(thumbnail.is_some()).as_bytes())?;

        // the geometry part assigns the instance IDs the sidecar
        // refers back to
        let (model_xml, objects_data) = self.write_geometry_part(scene)?;
        archive.start_file(opc::MODEL_FILE, options)?;
        archive.write_all(&model_xml)?;

        if let Some(payload) = config::layer_heights_payload(scene) {
            archive.start_file(opc::LAYER_HEIGHTS_PROFILE_FILE, options)?;
            archive.write_all(payload.as_bytes())?;
        }

        if let Some(payload) = config::layer_config_ranges_payload(scene)? {
            archive.start_file(opc::LAYER_CONFIG_RANGES_FILE, options)?;
            archive.write_all(&payload)?;
        }

        if let Some(payload) = config::sla_support_points_payload(scene) {
            archive.start_file(opc::SLA_SUPPORT_POINTS_FILE, options)?;
            archive.write_all(payload.as_bytes())?;
        }

        if let Some(config) = config {
            archive.start_file(opc::PRINT_CONFIG_FILE, options)?;
            archive.write_all(config::print_config_payload(config).as_bytes())?;
        }

        let sidecar = config::model_config_payload(scene, &objects_data)?;
        archive.start_file(opc::MODEL_CONFIG_FILE, options)?;
        archive.write_all(&sidecar)?;

        archive.finish().map_err(|error| {
            self.errors.push("Unable to finalize the archive".to_string());
            Error::Zip(error)
        })?;

        Ok(())
    }

    /// Record a fatal message and build the error that aborts the store
    fn fatal(&mut self, message: &str) -> Error {
        self.errors.push(message.to_string());
        Error::InvalidModel(message.to_string())
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Bookkeeping map from first-instance ID to object data
pub(crate) type ObjectDataMap = BTreeMap<u32, ObjectData>;

/// Write one XML event, describing the failing element on error
pub(crate) fn emit<W: Write>(writer: &mut Writer<W>, event: Event, what: &str) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|error| Error::InvalidXml(format!("Failed to write {}: {}", what, error)))
}
