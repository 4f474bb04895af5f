//! The discriminating parser (§4.4): reads a leading constant-valued
//! integer prefix and dispatches to whichever registered schema declares
//! that prefix as its `always` first field.

use std::io::Read;
use std::sync::Arc;

use crate::codec::Primitive;
use crate::error::{Error, Result, Warnings};
use crate::schema::{RecordInstance, RecordSchema};

/// The result of one [`Namespace::parse`] call.
#[derive(Debug)]
pub enum Outcome {
    /// A registered schema matched the prefix and was fully decoded.
    Instance(RecordInstance),
    /// No registered schema's `always` constant matched the prefix. Carries
    /// the raw prefix octets (plus, for [`Namespace::parse_buffer`], any
    /// further unconsumed buffered octets).
    RawUnrecognized(Vec<u8>),
    /// The source had no data at all (or not enough to complete the
    /// prefix) before EOF.
    Empty,
    /// The prefix matched a schema, but the source ran out of data before
    /// the rest of the record could be decoded.
    Incomplete,
}

/// A registry of candidate record schemas, all sharing one discriminator
/// prefix width, used to multiplex messages off one stream.
pub struct Namespace {
    prefix_width: usize,
    prefix_primitive: Primitive,
    schemas: Vec<Arc<RecordSchema>>,
}

impl Namespace {
    /// Builds a namespace from `schemas`. Every schema must declare a
    /// prefix constant (a primitive integer first field with `always`
    /// set), and all prefix widths must agree; otherwise this is a
    /// [`Error::SchemaError`] per `spec.md` §4.4 step 1.
    pub fn new(schemas: Vec<Arc<RecordSchema>>) -> Result<Namespace> {
        if schemas.is_empty() {
            return Err(Error::SchemaError {
                schema: "<namespace>".to_string(),
                reason: "a namespace needs at least one schema".to_string(),
            });
        }
        let mut prefix_width = None;
        let mut prefix_primitive = None;
        for s in &schemas {
            let width = s.prefix_width().ok_or_else(|| Error::SchemaError {
                schema: s.name().to_string(),
                reason: "schema has no prefix constant (first field must be a primitive integer with `always` set)".to_string(),
            })?;
            match prefix_width {
                None => prefix_width = Some(width),
                Some(w) if w != width => {
                    return Err(Error::SchemaError {
                        schema: s.name().to_string(),
                        reason: format!(
                            "prefix width {width} disagrees with the namespace's width {w}"
                        ),
                    })
                }
                _ => {}
            }
            prefix_primitive = prefix_primitive.or(s.prefix_primitive());
        }
        Ok(Namespace {
            prefix_width: prefix_width.unwrap(),
            prefix_primitive: prefix_primitive.unwrap(),
            schemas,
        })
    }

    fn find(&self, prefix: i64) -> Option<&Arc<RecordSchema>> {
        self.schemas
            .iter()
            .find(|s| s.prefix_constant() == Some(prefix))
    }

    /// Reads one framed message from `reader`. Never reads more octets
    /// than the matched schema requires; a `RawUnrecognized` result here
    /// carries only the prefix octets, since over-reading past them would
    /// block on a live stream that has nothing more buffered.
    pub fn parse<R: Read>(&self, reader: &mut R, warnings: &mut Warnings) -> Result<Outcome> {
        let prefix_bytes = read_up_to(reader, self.prefix_width)?;
        if prefix_bytes.len() < self.prefix_width {
            return Ok(Outcome::Empty);
        }
        let prefix = self.prefix_primitive.decode("<prefix>", &prefix_bytes)?;
        let prefix_value = prefix.as_i64().unwrap_or_default();
        match self.find(prefix_value) {
            Some(schema) => {
                // The prefix octets are already off `reader`; replay them
                // ahead of it so `schema.parse` sees the whole record
                // (prefix field included) instead of re-reading past it.
                let mut whole = std::io::Cursor::new(prefix_bytes).chain(reader);
                match schema.parse(&mut whole, warnings) {
                    Ok(instance) => Ok(Outcome::Instance(instance)),
                    Err(e @ Error::ShortRead { .. }) => {
                        log::error!(target: "framewire::log::error", "short read while completing `{}`: {e}", schema.name());
                        Ok(Outcome::Incomplete)
                    }
                    Err(e) => Err(e),
                }
            }
            None => Ok(Outcome::RawUnrecognized(prefix_bytes)),
        }
    }

    /// The in-memory counterpart of [`Namespace::parse`]: reads from a
    /// byte slice, and on no-match returns the prefix bytes followed by
    /// every remaining unconsumed byte (which is "free" to include here,
    /// since nothing further is read from the slice). Returns the outcome
    /// and the number of bytes consumed.
    pub fn parse_buffer(&self, data: &[u8], warnings: &mut Warnings) -> Result<(Outcome, usize)> {
        let mut cursor: &[u8] = data;
        let prefix_bytes = read_up_to(&mut cursor, self.prefix_width)?;
        if prefix_bytes.len() < self.prefix_width {
            return Ok((Outcome::Empty, 0));
        }
        let prefix = self.prefix_primitive.decode("<prefix>", &prefix_bytes)?;
        let prefix_value = prefix.as_i64().unwrap_or_default();
        match self.find(prefix_value) {
            Some(schema) => {
                // Same replay as `parse`: `cursor` has already moved past
                // the prefix octets, so feed them back in ahead of it.
                let outcome = {
                    let mut whole = std::io::Cursor::new(prefix_bytes).chain(&mut cursor);
                    schema.parse(&mut whole, warnings)
                };
                match outcome {
                    Ok(instance) => {
                        let consumed = data.len() - cursor.len();
                        Ok((Outcome::Instance(instance), consumed))
                    }
                    Err(e @ Error::ShortRead { .. }) => {
                        log::error!(target: "framewire::log::error", "short read while completing `{}`: {e}", schema.name());
                        Ok((Outcome::Incomplete, 0))
                    }
                    Err(e) => Err(e),
                }
            }
            None => {
                let mut raw = prefix_bytes;
                raw.extend_from_slice(cursor);
                let consumed = data.len();
                Ok((Outcome::RawUnrecognized(raw), consumed))
            }
        }
    }
}

fn read_up_to<R: Read>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut total = 0;
    while total < n {
        match reader.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(k) => total += k,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    buf.truncate(total);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, FieldOptions};
    use crate::schema::SchemaBuilder;
    use crate::value::Value;

    fn namespace() -> Namespace {
        let point = SchemaBuilder::new("Point")
            .field(
                "tag",
                Codec::Primitive(Primitive::I16, FieldOptions::new().with_always(Value::Int(1))),
            )
            .unwrap()
            .field("x", Codec::Primitive(Primitive::I32, FieldOptions::new()))
            .unwrap()
            .build()
            .unwrap();
        let vector = SchemaBuilder::new("Vector")
            .field(
                "tag",
                Codec::Primitive(Primitive::I16, FieldOptions::new().with_always(Value::Int(2))),
            )
            .unwrap()
            .field("x", Codec::Primitive(Primitive::I32, FieldOptions::new()))
            .unwrap()
            .build()
            .unwrap();
        Namespace::new(vec![point, vector]).unwrap()
    }

    #[test]
    fn dispatches_by_prefix() {
        let ns = namespace();
        let mut warnings = Warnings::new();
        let data = [0x00u8, 0x02, 0x00, 0x00, 0x00, 0x07];
        let (outcome, consumed) = ns.parse_buffer(&data, &mut warnings).unwrap();
        assert_eq!(consumed, 6);
        match outcome {
            Outcome::Instance(instance) => {
                assert_eq!(instance.schema().name(), "Vector");
            }
            other => panic!("expected Instance, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_prefix_returns_raw() {
        let ns = namespace();
        let mut warnings = Warnings::new();
        let data = [0x00u8, 0x09];
        let (outcome, _) = ns.parse_buffer(&data, &mut warnings).unwrap();
        assert!(matches!(outcome, Outcome::RawUnrecognized(bytes) if bytes == vec![0x00, 0x09]));
    }

    #[test]
    fn empty_input_returns_empty() {
        let ns = namespace();
        let mut warnings = Warnings::new();
        let data: [u8; 0] = [];
        let (outcome, _) = ns.parse_buffer(&data, &mut warnings).unwrap();
        assert!(matches!(outcome, Outcome::Empty));
    }

    #[test]
    fn short_mid_record_returns_incomplete() {
        let ns = namespace();
        let mut warnings = Warnings::new();
        let data = [0x00u8, 0x01, 0x00, 0x00];
        let (outcome, _) = ns.parse_buffer(&data, &mut warnings).unwrap();
        assert!(matches!(outcome, Outcome::Incomplete));
    }
}
