//! Package layout: part paths, format versions, fixed OPC payloads
//!
//! The archive is an OPC (Open Packaging Conventions) ZIP container.
//! The content-types and relationships parts are fixed strings; only
//! the optional thumbnail entries vary.

/// Folder holding geometry parts
pub const MODEL_FOLDER: &str = "3D/";

/// Extension of geometry parts
pub const MODEL_EXTENSION: &str = ".model";

/// The geometry part written by the exporter
pub const MODEL_FILE: &str = "3D/3dmodel.model";

/// OPC content-types part
pub const CONTENT_TYPES_FILE: &str = "[Content_Types].xml";

/// OPC package relationships part
pub const RELATIONSHIPS_FILE: &str = "_rels/.rels";

/// Optional PNG preview
pub const THUMBNAIL_FILE: &str = "Metadata/thumbnail.png";

/// Flat print configuration part
pub const PRINT_CONFIG_FILE: &str = "Metadata/Slic3r_PE.config";

/// Vendor sidecar carrying object/volume structure
pub const MODEL_CONFIG_FILE: &str = "Metadata/Slic3r_PE_model.config";

/// Line-oriented layer-height profiles
pub const LAYER_HEIGHTS_PROFILE_FILE: &str = "Metadata/Slic3r_PE_layer_heights_profile.txt";

/// Tree-mode XML layer config ranges
pub const LAYER_CONFIG_RANGES_FILE: &str = "Metadata/Prusa_Slicer_layer_config_ranges.xml";

/// Line-oriented SLA support points
pub const SLA_SUPPORT_POINTS_FILE: &str = "Metadata/Slic3r_PE_sla_support_points.txt";

/// Current archive format version
///
/// 0: archives with no version metadata.
/// 1: version metadata introduced.
/// 2: per-volume local matrices and source provenance in the sidecar;
///    meshes stored in their local frame.
pub const FORMAT_VERSION: u32 = 2;

/// Metadata key carrying the archive format version
pub const VERSION_METADATA_NAME: &str = "slic3rpe:Version3mf";

/// Current SLA support-points text format version
pub const SUPPORT_POINTS_FORMAT_VERSION: u32 = 1;

/// Sidecar metadata key: object or volume display name
pub const NAME_KEY: &str = "name";

/// Sidecar metadata key: legacy modifier flag, value `"1"`
pub const MODIFIER_KEY: &str = "modifier";

/// Sidecar metadata key: volume kind string
pub const VOLUME_TYPE_KEY: &str = "volume_type";

/// Sidecar metadata key: volume local frame, 16 floats row-major
pub const MATRIX_KEY: &str = "matrix";

/// Sidecar metadata key: source file path
pub const SOURCE_FILE_KEY: &str = "source_file";

/// Sidecar metadata key: source object index
pub const SOURCE_OBJECT_ID_KEY: &str = "source_object_id";

/// Sidecar metadata key: source volume index
pub const SOURCE_VOLUME_ID_KEY: &str = "source_volume_id";

/// Sidecar metadata key: x offset applied on import
pub const SOURCE_OFFSET_X_KEY: &str = "source_offset_x";

/// Sidecar metadata key: y offset applied on import
pub const SOURCE_OFFSET_Y_KEY: &str = "source_offset_y";

/// Sidecar metadata key: z offset applied on import
pub const SOURCE_OFFSET_Z_KEY: &str = "source_offset_z";

/// Core 3MF XML namespace
pub const CORE_NAMESPACE: &str = "http://schemas.microsoft.com/3dmanufacturing/core/2015/02";

/// Vendor extension namespace, bound to the `slic3rpe` prefix
pub const SLIC3RPE_NAMESPACE: &str = "http://schemas.slic3r.org/3mf/2017/06";

/// True for entry names the geometry pass must parse
///
/// Matches a case-insensitive `3D/` prefix and `.model` suffix; the
/// caller is expected to have normalized backslashes already.
pub fn is_geometry_part(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("3d/") && lower.ends_with(".model")
}

/// The content-types part payload
pub fn content_types_payload(with_thumbnail: bool) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">\n \
         <Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\" />\n \
         <Default Extension=\"model\" ContentType=\"application/vnd.ms-package.3dmanufacturing-3dmodel+xml\" />\n",
    );
    if with_thumbnail {
        out.push_str(" <Default Extension=\"png\" ContentType=\"image/png\" />\n");
    }
    out.push_str("</Types>");
    out
}

/// The package relationships part payload
pub fn relationships_payload(with_thumbnail: bool) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">\n",
    );
    out.push_str(&format!(
        " <Relationship Target=\"/{}\" Id=\"rel-1\" Type=\"http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel\" />\n",
        MODEL_FILE
    ));
    if with_thumbnail {
        out.push_str(&format!(
            " <Relationship Target=\"/{}\" Id=\"rel-2\" Type=\"http://schemas.openxmlformats.org/package/2006/relationships/metadata/thumbnail\" />\n",
            THUMBNAIL_FILE
        ));
    }
    out.push_str("</Relationships>");
    out
}
