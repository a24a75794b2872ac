//! Shared fixtures for integration tests
//!
//! Archives are assembled in place with `zip::ZipWriter` so tests can
//! exercise the loader against hand-written part contents.
#![allow(dead_code)]

use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Fixed content-types part for hand-built fixtures
pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
 <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml" />
 <Default Extension="model" ContentType="application/vnd.ms-package.3dmanufacturing-3dmodel+xml" />
</Types>"#;

/// Fixed relationships part for hand-built fixtures
pub const RELATIONSHIPS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
 <Relationship Target="/3D/3dmodel.model" Id="rel-1" Type="http://schemas.microsoft.com/3dmanufacturing/2013/01/3dmodel" />
</Relationships>"#;

/// Write an archive with the given `(entry name, content)` pairs
pub fn write_archive(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).expect("failed to create archive");
    let mut zip = ZipWriter::new(file);
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("failed to start entry");
        zip.write_all(content.as_bytes())
            .expect("failed to write entry");
    }
    zip.finish().expect("failed to finalize archive");
}

/// Write an archive holding only the standard OPC parts and a model
pub fn write_model_archive(path: &Path, model_xml: &str) {
    write_archive(
        path,
        &[
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", RELATIONSHIPS),
            ("3D/3dmodel.model", model_xml),
        ],
    );
}

/// Read one entry of an archive back as a string
pub fn read_archive_entry(path: &Path, name: &str) -> String {
    use std::io::Read;

    let file = std::fs::File::open(path).expect("failed to open archive");
    let mut zip = zip::ZipArchive::new(file).expect("failed to read archive");
    let mut entry = zip.by_name(name).expect("entry not found");
    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .expect("failed to read entry");
    content
}

/// List the archive's entry names in central-directory order
pub fn archive_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).expect("failed to open archive");
    let mut zip = zip::ZipArchive::new(file).expect("failed to read archive");
    (0..zip.len())
        .map(|i| zip.by_index(i).expect("bad entry").name().to_string())
        .collect()
}
