//! Parsers for the line-oriented and tree-mode auxiliary parts
//!
//! These parts are best-effort: a malformed row is recorded as a soft
//! error and skipped, and the load continues. Object IDs in all three
//! files are 1-based indices into the scene's object list, not archive
//! object IDs.

use super::{attr_f64, attr_string, attr_u32, parse_attributes, qname_to_string, Importer,
    XML_BUFFER_CAPACITY};
use crate::config::PrintConfig;
use crate::error::{Error, Result};
use crate::scene::{LayerConfigRange, SupportPoint};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Tolerance for decoding the island flag stored as a float
const EPSILON: f64 = 1e-4;

/// Default head radius for version-0 support point rows
const DEFAULT_HEAD_RADIUS: f32 = 0.4;

/// Header prefix of the support-points part
const SUPPORT_POINTS_VERSION_PREFIX: &str = "support_points_format_version=";

impl Importer {
    /// Parse `Metadata/Slic3r_PE_layer_heights_profile.txt`
    ///
    /// One line per object: `object_id=<n>|<f>;<f>;…` with an even
    /// number of at least four floats.
    pub(super) fn parse_layer_heights_profiles(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = text.strip_suffix('\n').unwrap_or(text);

        for line in text.split('\n') {
            let Some(object_id) = self.parse_object_id_prefix(line) else {
                continue;
            };
            if self.layer_heights_profiles.contains_key(&object_id) {
                self.soft_error("Found duplicated layer heights profile");
                continue;
            }

            // the payload after '|' was validated by the prefix parse
            let payload = line.split_once('|').map(|(_, p)| p).unwrap_or("");
            let values: Vec<&str> = payload.split(';').collect();
            if values.len() < 4 || values.len() % 2 != 0 {
                self.soft_error("Found invalid layer heights profile");
                continue;
            }

            let profile = values
                .iter()
                .map(|value| value.trim().parse().unwrap_or(0.0))
                .collect();
            self.layer_heights_profiles.insert(object_id, profile);
        }
    }

    /// Parse `Metadata/Slic3r_PE_sla_support_points.txt`
    ///
    /// An optional `support_points_format_version=<n>` header is
    /// followed by one line per object. Version 0 rows carry three
    /// floats per point, version 1 rows five.
    pub(super) fn parse_sla_support_points(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let text = text.strip_suffix('\n').unwrap_or(text);

        let mut lines = text.split('\n').peekable();
        let mut version = 0u32;
        if let Some(first) = lines.peek() {
            if let Some(value) = first.strip_prefix(SUPPORT_POINTS_VERSION_PREFIX) {
                version = value.trim().parse().unwrap_or(0);
                lines.next();
            }
        }

        for line in lines {
            let Some(object_id) = self.parse_object_id_prefix(line) else {
                continue;
            };
            if self.sla_support_points.contains_key(&object_id) {
                self.soft_error("Found duplicated SLA support points");
                continue;
            }

            let payload = line.split_once('|').map(|(_, p)| p).unwrap_or("");
            let fields: Vec<f64> = payload
                .split_whitespace()
                .map(|value| value.parse().unwrap_or(0.0))
                .collect();

            let mut points = Vec::new();
            match version {
                0 => {
                    for chunk in fields.chunks_exact(3) {
                        points.push(SupportPoint::new(
                            chunk[0] as f32,
                            chunk[1] as f32,
                            chunk[2] as f32,
                            DEFAULT_HEAD_RADIUS,
                            false,
                        ));
                    }
                }
                1 => {
                    for chunk in fields.chunks_exact(5) {
                        // the island flag is stored as a float 0/1
                        points.push(SupportPoint::new(
                            chunk[0] as f32,
                            chunk[1] as f32,
                            chunk[2] as f32,
                            chunk[3] as f32,
                            (chunk[4] - 1.0).abs() < EPSILON,
                        ));
                    }
                }
                _ => {
                    self.soft_error(format!(
                        "Unsupported support points format version {}",
                        version
                    ));
                }
            }

            if !points.is_empty() {
                self.sla_support_points.insert(object_id, points);
            }
        }
    }

    /// Parse `Metadata/Prusa_Slicer_layer_config_ranges.xml`
    ///
    /// Failure to parse the part is a soft error; the rest of the load
    /// continues without ranges.
    pub(super) fn parse_layer_config_ranges(&mut self, xml: &str) {
        if xml.is_empty() {
            return;
        }
        if let Err(error) = self.parse_layer_config_ranges_xml(xml) {
            self.soft_error(format!("Error while parsing layer config ranges: {}", error));
        }
    }

    fn parse_layer_config_ranges_xml(&mut self, xml: &str) -> Result<()> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);

        let mut curr_object_id: Option<usize> = None;
        let mut curr_ranges: Vec<LayerConfigRange> = Vec::new();
        let mut curr_range: Option<LayerConfigRange> = None;
        let mut curr_opt_key = String::new();
        let mut characters = String::new();

        loop {
            let event = reader.read_event_into(&mut buf);
            let is_empty = matches!(&event, Ok(Event::Empty(_)));
            match event {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    let attrs = parse_attributes(e)?;
                    match name.as_str() {
                        "object" => {
                            curr_ranges.clear();
                            let id = attr_u32(&attrs, "id") as usize;
                            if id == 0 {
                                self.soft_error("Found invalid object id");
                                curr_object_id = None;
                            } else if self.layer_config_ranges.contains_key(&id) {
                                self.soft_error("Found duplicated layer config range");
                                curr_object_id = None;
                            } else {
                                curr_object_id = Some(id);
                            }
                        }
                        "range" => {
                            curr_range = Some(LayerConfigRange {
                                min_z: attr_f64(&attrs, "min_z"),
                                max_z: attr_f64(&attrs, "max_z"),
                                config: PrintConfig::new(),
                            });
                        }
                        "option" => {
                            curr_opt_key = attr_string(&attrs, "opt_key");
                            characters.clear();
                        }
                        _ => {}
                    }
                    if is_empty {
                        match name.as_str() {
                            "option" => {
                                if let Some(range) = curr_range.as_mut() {
                                    range.config.set(curr_opt_key.as_str(), "");
                                }
                            }
                            "range" => {
                                if let Some(range) = curr_range.take() {
                                    curr_ranges.push(range);
                                }
                            }
                            "object" => {
                                curr_object_id = None;
                            }
                            _ => {}
                        }
                    }
                }
                Ok(Event::Text(ref t)) => {
                    let text = t
                        .unescape()
                        .map_err(|error| Error::InvalidXml(error.to_string()))?;
                    characters.push_str(&text);
                }
                Ok(Event::End(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    match name.as_str() {
                        "option" => {
                            if let Some(range) = curr_range.as_mut() {
                                range
                                    .config
                                    .set(curr_opt_key.as_str(), characters.as_str());
                            }
                        }
                        "range" => {
                            if let Some(range) = curr_range.take() {
                                curr_ranges.push(range);
                            }
                        }
                        "object" => {
                            if let Some(id) = curr_object_id.take() {
                                if !curr_ranges.is_empty() {
                                    self.layer_config_ranges
                                        .insert(id, std::mem::take(&mut curr_ranges));
                                }
                            }
                            curr_ranges.clear();
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(error) => return Err(Error::Xml(error)),
            }
            buf.clear();
        }

        Ok(())
    }

    /// Decode the `object_id=<n>|` prefix of a sidecar text line
    ///
    /// Returns `None` (after recording a soft error) when the line is
    /// malformed or the ID is zero.
    fn parse_object_id_prefix(&mut self, line: &str) -> Option<usize> {
        let Some((id_part, _)) = line.split_once('|') else {
            self.soft_error("Error while reading object data");
            return None;
        };
        let Some((_, id_value)) = id_part.split_once('=') else {
            self.soft_error("Error while reading object id");
            return None;
        };
        let object_id: usize = id_value.trim().parse().unwrap_or(0);
        if object_id == 0 {
            self.soft_error("Found invalid object id");
            return None;
        }
        Some(object_id)
    }
}
