//! SAX state machine for the sidecar part
//!
//! The sidecar is flat: `config → object → volume → metadata`. All
//! state the handlers need is the current object ID and the index of
//! the volume being filled.

use super::{
    attr_string, attr_u32, attr_usize, parse_attributes, qname_to_string, Importer,
    ObjectMetadata, VolumeMetadata, XML_BUFFER_CAPACITY,
};
use crate::error::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

impl Importer {
    /// Parse the model-config sidecar part
    pub(super) fn parse_sidecar_part(&mut self, xml: &str) -> Result<()> {
        self.curr_config.object_id = None;
        self.curr_config.volume_id = 0;

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::with_capacity(XML_BUFFER_CAPACITY);

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let name = qname_to_string(e.name())?;
                    let attrs = parse_attributes(e)?;
                    match name.as_str() {
                        "object" => self.handle_start_config_object(&attrs)?,
                        "volume" => self.handle_start_config_volume(&attrs)?,
                        "metadata" => self.handle_start_config_metadata(&attrs)?,
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(error) => {
                    self.errors
                        .push(format!("Error while parsing the sidecar part: {}", error));
                    return Err(Error::Xml(error));
                }
            }
            buf.clear();
        }

        Ok(())
    }

    fn handle_start_config_object(
        &mut self,
        attrs: &super::AttributeMap,
    ) -> Result<()> {
        let object_id = attr_u32(attrs, "id");
        if self.objects_metadata.contains_key(&object_id) {
            return Err(self.fatal("Found duplicated object id"));
        }

        self.objects_metadata
            .insert(object_id, ObjectMetadata::default());
        self.curr_config.object_id = Some(object_id);
        Ok(())
    }

    fn handle_start_config_volume(&mut self, attrs: &super::AttributeMap) -> Result<()> {
        let Some(object_id) = self.curr_config.object_id else {
            return Err(self.fatal("Cannot assign volume to a valid object"));
        };
        let first_triangle_id = attr_usize(attrs, "firstid");
        let last_triangle_id = attr_usize(attrs, "lastid");

        let Some(metadata) = self.objects_metadata.get_mut(&object_id) else {
            return Err(self.fatal("Cannot assign volume to a valid object"));
        };
        self.curr_config.volume_id = metadata.volumes.len();
        metadata
            .volumes
            .push(VolumeMetadata::new(first_triangle_id, last_triangle_id));
        Ok(())
    }

    fn handle_start_config_metadata(&mut self, attrs: &super::AttributeMap) -> Result<()> {
        let Some(object_id) = self.curr_config.object_id else {
            return Err(self.fatal("Cannot assign metadata to valid object id"));
        };

        let metadata_type = attr_string(attrs, "type");
        let key = attr_string(attrs, "key");
        let value = attr_string(attrs, "value");

        match metadata_type.as_str() {
            "object" => {
                if let Some(metadata) = self.objects_metadata.get_mut(&object_id) {
                    metadata.metadata.push((key, value));
                }
                Ok(())
            }
            "volume" => {
                let volume_id = self.curr_config.volume_id;
                if let Some(volume) = self
                    .objects_metadata
                    .get_mut(&object_id)
                    .and_then(|metadata| metadata.volumes.get_mut(volume_id))
                {
                    volume.metadata.push((key, value));
                }
                Ok(())
            }
            _ => Err(self.fatal("Found invalid metadata type")),
        }
    }
}
