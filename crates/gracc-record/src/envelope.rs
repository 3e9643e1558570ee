// SPDX-License-Identifier: MIT OR Apache-2.0
//! Splits a `multiupdate` XML envelope into the raw byte spans of its
//! direct child elements, so each child can be handed to [`crate::parse_record`]
//! with its `raw` field equal to its exact source bytes — not a
//! re-serialization through an intermediate tree.

use quick_xml::events::Event;
use quick_xml::Reader;

use gracc_error::{ErrorCode, GraccError};

/// Split an envelope document into the raw bytes of each direct child of
/// its root element, in document order.
///
/// The root element's own tag name is not inspected — any well-formed XML
/// document works as an envelope, with every immediate child treated as one
/// record.
pub fn split_envelope(raw: &[u8]) -> Result<Vec<Vec<u8>>, GraccError> {
    let text = std::str::from_utf8(raw).map_err(|e| {
        GraccError::new(ErrorCode::MalformedBundle, "envelope is not valid UTF-8").with_source(e)
    })?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut child_start: Option<usize> = None;
    let mut out = Vec::new();

    loop {
        let pos_before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                depth += 1;
                if depth == 2 {
                    child_start = Some(pos_before);
                }
            }
            Ok(Event::Empty(_)) => {
                if depth == 1 {
                    let pos_after = reader.buffer_position() as usize;
                    out.push(bytes[pos_before..pos_after].to_vec());
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some(start) = child_start.take() {
                        let pos_after = reader.buffer_position() as usize;
                        out.push(bytes[start..pos_after].to_vec());
                    }
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(
                    GraccError::new(ErrorCode::MalformedBundle, "envelope is not well-formed XML")
                        .with_source(e),
                );
            }
        }
    }

    Ok(out)
}
