//! Parser for SVG alert maps.
//!
//! Every region is drawn by an element whose `id` is its ISO 3166-2:UA code.
//! A region is under alert when the `alert` token is in its `class`:
//!
//! ```text
//! <svg xmlns="http://www.w3.org/2000/svg">
//!   <path id="UA-30" class="region alert" d="..."/>
//!   <path id="UA-46" class="region" d="..."/>
//! </svg>
//! ```

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::catalog::RegionKey;
use crate::source::parsers::PayloadParser;
use crate::source::{Reading, SourceError};

const REGION_ID_PREFIX: &str = "UA-";
const ALERT_CLASS: &str = "alert";

pub struct SvgMapParser;

impl SvgMapParser {
    /// Reads the region reading of an element, if it draws a region.
    fn read_element(element: &BytesStart) -> Result<Option<Reading>, SourceError> {
        let mut id = None;
        let mut class = String::new();

        for attribute in element.attributes() {
            let attribute = attribute
                .map_err(|e| SourceError::Format(format!("invalid svg attribute: {}", e)))?;
            let value = attribute
                .unescape_value()
                .map_err(|e| SourceError::Format(format!("invalid svg attribute: {}", e)))?;

            match attribute.key.as_ref() {
                b"id" => id = Some(value.into_owned()),
                b"class" => class = value.into_owned(),
                _ => {}
            }
        }

        Ok(id
            .filter(|id| id.to_ascii_uppercase().starts_with(REGION_ID_PREFIX))
            .map(|id| {
                let alert_active = class.split_whitespace().any(|token| token == ALERT_CLASS);
                Reading::new(id, alert_active)
            }))
    }
}

impl PayloadParser for SvgMapParser {
    fn key(&self) -> RegionKey {
        RegionKey::Iso
    }

    fn parse(&self, raw: &str) -> Result<Vec<Reading>, SourceError> {
        let mut reader = Reader::from_str(raw);
        reader.trim_text(true);

        let mut seen_root = false;
        let mut readings = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                    if !seen_root {
                        if element.local_name().as_ref() != b"svg" {
                            return Err(SourceError::Format(
                                "payload root is not an svg element".to_owned(),
                            ));
                        }
                        seen_root = true;
                    }
                    if let Some(reading) = Self::read_element(&element)? {
                        readings.push(reading);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(SourceError::Format(format!(
                        "invalid svg at position {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            }
        }

        if !seen_root {
            return Err(SourceError::Format("payload is not an svg document".to_owned()));
        }
        if readings.is_empty() {
            return Err(SourceError::Format("svg map has no region elements".to_owned()));
        }

        Ok(readings)
    }
}
