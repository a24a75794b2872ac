//! Emission of the sidecar and auxiliary parts
//!
//! The sidecar mirrors what the geometry writer recorded: per object
//! the 1-based ID of its first instance, per volume the triangle range
//! inside the object's concatenated mesh. The text parts address
//! objects by their 1-based position in the scene's object list and
//! are elided entirely when no object carries the respective data.

use super::{emit, ObjectDataMap};
use crate::config::PrintConfig;
use crate::error::Result;
use crate::opc;
use crate::scene::Scene;
use crate::transform::matrix_to_metadata;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

/// Serialize the model-config sidecar part
pub(super) fn model_config_payload(scene: &Scene, objects_data: &ObjectDataMap) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);

    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        "XML declaration",
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("config")),
        "config element",
    )?;

    for (first_instance_id, data) in objects_data {
        let object = &scene.objects[data.object_index];

        let mut elem = BytesStart::new("object");
        elem.push_attribute(("id", first_instance_id.to_string().as_str()));
        emit(&mut writer, Event::Start(elem), "object element")?;

        if !object.name.is_empty() {
            write_metadata(&mut writer, "object", opc::NAME_KEY, &object.name)?;
        }
        for (key, value) in object.config.iter() {
            write_metadata(&mut writer, "object", key, value)?;
        }

        for (volume, offsets) in object.volumes.iter().zip(data.offsets.iter()) {
            let mut elem = BytesStart::new("volume");
            elem.push_attribute(("firstid", offsets.first_triangle_id.to_string().as_str()));
            elem.push_attribute(("lastid", offsets.last_triangle_id.to_string().as_str()));
            emit(&mut writer, Event::Start(elem), "volume element")?;

            if !volume.name.is_empty() {
                write_metadata(&mut writer, "volume", opc::NAME_KEY, &volume.name)?;
            }
            // legacy flag kept for older readers; volume_type below
            // overrides it on load
            if volume.kind.is_modifier() {
                write_metadata(&mut writer, "volume", opc::MODIFIER_KEY, "1")?;
            }
            write_metadata(
                &mut writer,
                "volume",
                opc::VOLUME_TYPE_KEY,
                volume.kind.type_string(),
            )?;
            write_metadata(
                &mut writer,
                "volume",
                opc::MATRIX_KEY,
                &matrix_to_metadata(&volume.matrix),
            )?;

            if !volume.source.input_file.is_empty() {
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_FILE_KEY,
                    &volume.source.input_file,
                )?;
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_OBJECT_ID_KEY,
                    &volume.source.object_idx.to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_VOLUME_ID_KEY,
                    &volume.source.volume_idx.to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_OFFSET_X_KEY,
                    &volume.source.mesh_offset[0].to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_OFFSET_Y_KEY,
                    &volume.source.mesh_offset[1].to_string(),
                )?;
                write_metadata(
                    &mut writer,
                    "volume",
                    opc::SOURCE_OFFSET_Z_KEY,
                    &volume.source.mesh_offset[2].to_string(),
                )?;
            }

            for (key, value) in volume.config.iter() {
                write_metadata(&mut writer, "volume", key, value)?;
            }

            emit(
                &mut writer,
                Event::End(BytesEnd::new("volume")),
                "volume element",
            )?;
        }

        emit(
            &mut writer,
            Event::End(BytesEnd::new("object")),
            "object element",
        )?;
    }

    emit(
        &mut writer,
        Event::End(BytesEnd::new("config")),
        "config element",
    )?;

    Ok(writer.into_inner())
}

fn write_metadata(
    writer: &mut Writer<Vec<u8>>,
    metadata_type: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    let mut elem = BytesStart::new("metadata");
    elem.push_attribute(("type", metadata_type));
    elem.push_attribute(("key", key));
    elem.push_attribute(("value", value));
    emit(writer, Event::Empty(elem), "metadata element")
}

/// Serialize the layer-height profile part, `None` when no object
/// carries a profile
pub(super) fn layer_heights_payload(scene: &Scene) -> Option<String> {
    let mut out = String::new();

    for (index, object) in scene.objects.iter().enumerate() {
        let profile = &object.layer_height_profile;
        if profile.len() >= 4 && profile.len() % 2 == 0 {
            out.push_str(&format!("object_id={}|", index + 1));
            for (i, value) in profile.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                out.push_str(&value.to_string());
            }
            out.push('\n');
        }
    }

    (!out.is_empty()).then_some(out)
}

/// Serialize the SLA support-points part, `None` when no object
/// carries points
pub(super) fn sla_support_points_payload(scene: &Scene) -> Option<String> {
    let mut out = String::new();

    for (index, object) in scene.objects.iter().enumerate() {
        let points = &object.sla_support_points;
        if points.is_empty() {
            continue;
        }

        out.push_str(&format!("object_id={}|", index + 1));
        for (i, point) in points.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&format!(
                "{} {} {} {} {}",
                point.pos[0],
                point.pos[1],
                point.pos[2],
                point.head_front_radius,
                if point.is_new_island { "1" } else { "0" }
            ));
        }
        out.push('\n');
    }

    (!out.is_empty()).then(|| {
        format!(
            "support_points_format_version={}\n{}",
            opc::SUPPORT_POINTS_FORMAT_VERSION,
            out
        )
    })
}

/// Serialize the layer config ranges part, `None` when no object
/// carries ranges
pub(super) fn layer_config_ranges_payload(scene: &Scene) -> Result<Option<Vec<u8>>> {
    if scene
        .objects
        .iter()
        .all(|object| object.layer_config_ranges.is_empty())
    {
        return Ok(None);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 1);
    emit(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        "XML declaration",
    )?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("objects")),
        "objects element",
    )?;

    for (index, object) in scene.objects.iter().enumerate() {
        if object.layer_config_ranges.is_empty() {
            continue;
        }

        let mut elem = BytesStart::new("object");
        elem.push_attribute(("id", (index + 1).to_string().as_str()));
        emit(&mut writer, Event::Start(elem), "object element")?;

        for range in &object.layer_config_ranges {
            let mut elem = BytesStart::new("range");
            elem.push_attribute(("min_z", range.min_z.to_string().as_str()));
            elem.push_attribute(("max_z", range.max_z.to_string().as_str()));
            emit(&mut writer, Event::Start(elem), "range element")?;

            for (key, value) in range.config.iter() {
                let mut elem = BytesStart::new("option");
                elem.push_attribute(("opt_key", key));
                emit(&mut writer, Event::Start(elem), "option element")?;
                emit(
                    &mut writer,
                    Event::Text(BytesText::new(value)),
                    "option value",
                )?;
                emit(
                    &mut writer,
                    Event::End(BytesEnd::new("option")),
                    "option element",
                )?;
            }

            emit(
                &mut writer,
                Event::End(BytesEnd::new("range")),
                "range element",
            )?;
        }

        emit(
            &mut writer,
            Event::End(BytesEnd::new("object")),
            "object element",
        )?;
    }

    emit(
        &mut writer,
        Event::End(BytesEnd::new("objects")),
        "objects element",
    )?;

    Ok(Some(writer.into_inner()))
}

/// Serialize the print-config part as gcode-style comment lines
pub(super) fn print_config_payload(config: &PrintConfig) -> String {
    let mut out = format!(
        "; generated by {} {}\n\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    for (key, value) in config.iter() {
        // printer compatibility conditions are not meaningful outside
        // the writing application
        if key == "compatible_printers" {
            continue;
        }
        out.push_str(&format!("; {} = {}\n", key, value));
    }

    out
}
