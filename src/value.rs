//! The coerced runtime value carried by a record field, and the coercion
//! rules of `spec.md` §4.3 that turn a caller-supplied value into one.

use crate::codec::{Codec, Primitive};
use crate::error::{Error, Result, Warning, Warnings};
use crate::options::Encoding;
use crate::schema::RecordInstance;

/// A coerced field value. Signed and unsigned integers are kept as
/// separate variants (rather than unified into one wide integer type) so
/// that `u64::MAX` and `i64::MIN` both round-trip exactly.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A signed integer, used by the `i8 i16 i32 i64` primitive families.
    Int(i64),
    /// An unsigned integer, used by the `u8 u16 u32 u64` primitive families.
    UInt(u64),
    /// A 32- or 64-bit float.
    Float(f64),
    /// Byte-string content, already framed/unframed as appropriate.
    Bytes(Vec<u8>),
    /// Decoded text-string content.
    Text(String),
    /// Array elements, in order.
    Array(Vec<Value>),
    /// A nested record instance.
    Record(RecordInstance),
}

impl Value {
    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub(crate) fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// True if this value is already in canonical form for `codec` --
    /// used to implement coerce-idempotence (`spec.md` §8).
    fn already_coerced(&self, codec: &Codec) -> bool {
        match codec {
            Codec::Primitive(p, _) => match (p.is_float(), p.is_signed(), self) {
                (true, _, Value::Float(_)) => true,
                (false, true, Value::Int(_)) => true,
                (false, false, Value::UInt(_)) => true,
                _ => false,
            },
            Codec::ByteString(_) => matches!(self, Value::Bytes(_)),
            Codec::TextString(..) => matches!(self, Value::Text(_)),
            Codec::Array(_) => matches!(self, Value::Array(_)),
            Codec::Record(..) => matches!(self, Value::Record(_)),
        }
    }
}

/// Coerces `value` into the representation demanded by `codec`, recording
/// non-fatal diagnostics (`PrecisionLoss`, recursively any array-element
/// warnings) into `warnings`.
pub(crate) fn coerce(
    codec: &Codec,
    value: Value,
    field: &str,
    warnings: &mut Warnings,
) -> Result<Value> {
    if value.already_coerced(codec) {
        return Ok(value);
    }
    match codec {
        Codec::Primitive(p, _) => coerce_primitive(*p, value, field, warnings),
        Codec::ByteString(_) => coerce_bytes(value, field),
        Codec::TextString(spec, encoding) => {
            coerce_text(value, *encoding, spec.options.enc_errors, field)
        }
        Codec::Array(spec) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce(&spec.element, item, field, warnings)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(Error::CoerceError {
                field: field.to_string(),
                reason: format!("expected an array, found {other:?}"),
            }),
        },
        Codec::Record(schema, _) => match value {
            Value::Record(instance) => {
                if instance.schema().name() != schema.name() {
                    return Err(Error::CoerceError {
                        field: field.to_string(),
                        reason: format!(
                            "expected an instance of `{}`, found `{}`",
                            schema.name(),
                            instance.schema().name()
                        ),
                    });
                }
                Ok(Value::Record(instance))
            }
            other => Err(Error::CoerceError {
                field: field.to_string(),
                reason: format!("expected a record instance, found {other:?}"),
            }),
        },
    }
}

fn coerce_primitive(
    p: Primitive,
    value: Value,
    field: &str,
    warnings: &mut Warnings,
) -> Result<Value> {
    if p.is_float() {
        let f = match value {
            Value::Float(f) => f,
            Value::Int(i) => i as f64,
            Value::UInt(u) => u as f64,
            Value::Bytes(ref b) if b.len() == 1 => b[0] as f64,
            Value::Text(ref s) => s.trim().parse::<f64>().map_err(|_| Error::CoerceError {
                field: field.to_string(),
                reason: format!("{s:?} is not a valid float"),
            })?,
            other => {
                return Err(Error::CoerceError {
                    field: field.to_string(),
                    reason: format!("cannot coerce {other:?} to a float"),
                })
            }
        };
        return Ok(Value::Float(f));
    }

    // Integer target: gather a candidate integer, noting precision loss
    // if the source was a float.
    let mut lossy_source: Option<f64> = None;
    let (as_int, lost_precision): (i128, bool) = match value {
        Value::Int(i) => (i as i128, false),
        Value::UInt(u) => (u as i128, false),
        Value::Float(f) => {
            let truncated = f.trunc();
            if truncated != f {
                lossy_source = Some(f);
            }
            (truncated as i128, truncated != f)
        }
        Value::Bytes(ref b) if b.len() == 1 => (b[0] as i128, false),
        Value::Text(ref s) => {
            let s = s.trim();
            s.parse::<i128>().map(|v| (v, false)).map_err(|_| Error::CoerceError {
                field: field.to_string(),
                reason: format!("{s:?} is not a valid integer"),
            })?
        }
        other => {
            return Err(Error::CoerceError {
                field: field.to_string(),
                reason: format!("cannot coerce {other:?} to an integer"),
            })
        }
    };

    if lost_precision {
        crate::error::warn(
            warnings,
            Warning::PrecisionLoss {
                field: field.to_string(),
                from: lossy_source.expect("lost_precision only set alongside lossy_source").to_string(),
                to: as_int.to_string(),
            },
        );
    }

    if p.is_signed() {
        let n = i64::try_from(as_int).map_err(|_| Error::CoerceError {
            field: field.to_string(),
            reason: format!("{as_int} does not fit in an i64"),
        })?;
        Ok(Value::Int(n))
    } else {
        let n = u64::try_from(as_int).map_err(|_| Error::CoerceError {
            field: field.to_string(),
            reason: format!("{as_int} does not fit in a u64"),
        })?;
        Ok(Value::UInt(n))
    }
}

fn coerce_bytes(value: Value, field: &str) -> Result<Value> {
    match value {
        Value::Bytes(b) => Ok(Value::Bytes(b)),
        Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
        Value::Int(i) => Ok(Value::Bytes(i.to_string().into_bytes())),
        Value::UInt(u) => Ok(Value::Bytes(u.to_string().into_bytes())),
        other => Err(Error::CoerceError {
            field: field.to_string(),
            reason: format!("cannot coerce {other:?} to a byte-string"),
        }),
    }
}

fn coerce_text(
    value: Value,
    encoding: Encoding,
    enc_errors: crate::options::EncErrors,
    field: &str,
) -> Result<Value> {
    match value {
        Value::Text(s) => Ok(Value::Text(s)),
        Value::Bytes(b) => {
            let s = crate::codec::decode_text(field, &b, encoding, enc_errors)?;
            Ok(Value::Text(s))
        }
        other => Err(Error::CoerceError {
            field: field.to_string(),
            reason: format!("cannot coerce {other:?} to a text-string"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_int_precision_loss_warns() {
        let mut warnings = Warnings::new();
        let out = coerce_primitive(Primitive::I32, Value::Float(6.25), "x", &mut warnings).unwrap();
        assert_eq!(out, Value::Int(6));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::PrecisionLoss { .. }));
    }

    #[test]
    fn single_byte_string_becomes_ordinal() {
        let mut warnings = Warnings::new();
        let out = coerce_primitive(
            Primitive::U8,
            Value::Bytes(vec![b'A']),
            "x",
            &mut warnings,
        )
        .unwrap();
        assert_eq!(out, Value::UInt(65));
    }
}
