//! Leaf and combinator codecs: the primitive scalar/byte-string family
//! (§4.1), the homogeneous array combinator (§4.2), and the shared option
//! surface (`default`, `always`, `full_string`, `encoding`, `enc_errors`)
//! every codec is parametrised by.
//!
//! Every codec here is a plain, owned, non-shared value: the builder in
//! [`crate::schema`] hands each field a freshly constructed `Codec`, which
//! is what rules out the "two fields share one codec object" aliasing
//! hazard `spec.md` describes -- Rust's ownership model makes the sharing
//! a type error rather than something to detect at runtime.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::{Error, Result, Warning, Warnings};
use crate::length::Length;
use crate::options::{self, ByteOrder, EncErrors, Encoding, RawEndian};
use crate::schema::RecordSchema;
use crate::value::Value;

/// A value supplied at schema-construction time for `default`, invoked
/// lazily so that e.g. timestamps or counters can differ per instance.
#[derive(Clone)]
pub enum DefaultSpec {
    /// A fixed, pre-computed value.
    Value(Value),
    /// A callable evaluated each time a default is needed.
    Fn(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultSpec {
    pub(crate) fn resolve(&self) -> Value {
        match self {
            DefaultSpec::Value(v) => v.clone(),
            DefaultSpec::Fn(f) => f(),
        }
    }
}

impl std::fmt::Debug for DefaultSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultSpec::Value(v) => write!(f, "DefaultSpec::Value({v:?})"),
            DefaultSpec::Fn(_) => write!(f, "DefaultSpec::Fn(..)"),
        }
    }
}

impl PartialEq for DefaultSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DefaultSpec::Value(a), DefaultSpec::Value(b)) => a == b,
            _ => false,
        }
    }
}

/// The option surface shared by every codec kind: `default`, `always`,
/// `full_string`, `enc_errors`. Per `spec.md` §3, `always` and `default`
/// are mutually exclusive on one codec; that invariant is enforced by the
/// builder methods in [`crate::schema::SchemaBuilder`], not by this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    pub(crate) default: Option<DefaultSpec>,
    pub(crate) always: Option<Value>,
    pub(crate) full_string: bool,
    pub(crate) enc_errors: EncErrors,
}

impl FieldOptions {
    /// An empty option set: no default, no constant, no flags.
    pub fn new() -> Self {
        FieldOptions::default()
    }

    /// Sets a fixed default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(DefaultSpec::Value(value));
        self
    }

    /// Sets a callable default, invoked fresh at each instance construction.
    pub fn with_default_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultSpec::Fn(Arc::new(f)));
        self
    }

    /// Sets the constant-value constraint.
    pub fn with_always(mut self, value: Value) -> Self {
        self.always = Some(value);
        self
    }

    /// For byte-strings, suppresses null-stripping on decode.
    pub fn with_full_string(mut self) -> Self {
        self.full_string = true;
        self
    }

    /// Sets the error policy used when en/decoding text against its
    /// encoding.
    pub fn with_enc_errors(mut self, policy: EncErrors) -> Self {
        self.enc_errors = policy;
        self
    }

    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        if self.default.is_some() && self.always.is_some() {
            return Err(Error::SchemaError {
                schema: field.to_string(),
                reason: format!(
                    "field `{field}`: `default` and `always` are mutually exclusive"
                ),
            });
        }
        Ok(())
    }
}

/// The fixed-width scalar families, mirroring the well-known
/// byte-packing mini-language (`b B h H i I q Q f d`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// Signed 8-bit integer, descriptor `b`.
    I8,
    /// Unsigned 8-bit integer, descriptor `B`.
    U8,
    /// Signed 16-bit integer, descriptor `h`.
    I16,
    /// Unsigned 16-bit integer, descriptor `H`.
    U16,
    /// Signed 32-bit integer, descriptor `i`.
    I32,
    /// Unsigned 32-bit integer, descriptor `I`.
    U32,
    /// Signed 64-bit integer, descriptor `q`.
    I64,
    /// Unsigned 64-bit integer, descriptor `Q`.
    U64,
    /// 32-bit IEEE-754 float, descriptor `f`.
    F32,
    /// 64-bit IEEE-754 float, descriptor `d`.
    F64,
}

impl Primitive {
    /// The fixed wire width in octets.
    pub fn size(self) -> usize {
        match self {
            Primitive::I8 | Primitive::U8 => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }

    /// The single-character wire-format descriptor.
    pub fn descriptor_char(self) -> char {
        match self {
            Primitive::I8 => 'b',
            Primitive::U8 => 'B',
            Primitive::I16 => 'h',
            Primitive::U16 => 'H',
            Primitive::I32 => 'i',
            Primitive::U32 => 'I',
            Primitive::I64 => 'q',
            Primitive::U64 => 'Q',
            Primitive::F32 => 'f',
            Primitive::F64 => 'd',
        }
    }

    pub(crate) fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8 | Primitive::I16 | Primitive::I32 | Primitive::I64
        )
    }

    pub(crate) fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    /// The zero value of this primitive, used to fill in unset fields
    /// with no `default`/`always`.
    pub(crate) fn zero(self) -> Value {
        if self.is_float() {
            Value::Float(0.0)
        } else if self.is_signed() {
            Value::Int(0)
        } else {
            Value::UInt(0)
        }
    }

    fn order(byte_order: ByteOrder) -> RawEndian {
        byte_order.endianness()
    }

    /// Writes `bytes` (already in the primitive's native order) onto `out`
    /// in `order`, matching the teacher's own `SomeIpWriter::write_ux`
    /// approach of switching on the byte order once per value rather than
    /// reaching for a byte-order crate.
    fn push_ordered(out: &mut Vec<u8>, order: RawEndian, be: &[u8], le: &[u8]) {
        match order {
            RawEndian::Big => out.extend_from_slice(be),
            RawEndian::Little => out.extend_from_slice(le),
        }
    }

    fn read_ordered<const N: usize>(order: RawEndian, bytes: &[u8]) -> [u8; N] {
        let mut buf = [0u8; N];
        buf.copy_from_slice(&bytes[..N]);
        match order {
            RawEndian::Big => buf,
            RawEndian::Little => {
                buf.reverse();
                buf
            }
        }
    }

    pub(crate) fn encode(self, field: &str, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        let order = Self::order(options::byte_order());
        let oor = |v: String| Error::EncodeOutOfRange {
            field: field.to_string(),
            primitive: self.name(),
            value: v,
        };
        match self {
            Primitive::I8 => {
                let v = value.as_i64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = i8::try_from(v).map_err(|_| oor(v.to_string()))?;
                out.push(n as u8);
            }
            Primitive::U8 => {
                let v = value.as_u64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = u8::try_from(v).map_err(|_| oor(v.to_string()))?;
                out.push(n);
            }
            Primitive::I16 => {
                let v = value.as_i64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = i16::try_from(v).map_err(|_| oor(v.to_string()))?;
                Self::push_ordered(out, order, &n.to_be_bytes(), &n.to_le_bytes());
            }
            Primitive::U16 => {
                let v = value.as_u64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = u16::try_from(v).map_err(|_| oor(v.to_string()))?;
                Self::push_ordered(out, order, &n.to_be_bytes(), &n.to_le_bytes());
            }
            Primitive::I32 => {
                let v = value.as_i64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = i32::try_from(v).map_err(|_| oor(v.to_string()))?;
                Self::push_ordered(out, order, &n.to_be_bytes(), &n.to_le_bytes());
            }
            Primitive::U32 => {
                let v = value.as_u64().ok_or_else(|| oor(format!("{value:?}")))?;
                let n = u32::try_from(v).map_err(|_| oor(v.to_string()))?;
                Self::push_ordered(out, order, &n.to_be_bytes(), &n.to_le_bytes());
            }
            Primitive::I64 => {
                let v = value.as_i64().ok_or_else(|| oor(format!("{value:?}")))?;
                Self::push_ordered(out, order, &v.to_be_bytes(), &v.to_le_bytes());
            }
            Primitive::U64 => {
                let v = value.as_u64().ok_or_else(|| oor(format!("{value:?}")))?;
                Self::push_ordered(out, order, &v.to_be_bytes(), &v.to_le_bytes());
            }
            Primitive::F32 => {
                let v = value.as_f64().ok_or_else(|| oor(format!("{value:?}")))? as f32;
                Self::push_ordered(out, order, &v.to_be_bytes(), &v.to_le_bytes());
            }
            Primitive::F64 => {
                let v = value.as_f64().ok_or_else(|| oor(format!("{value:?}")))?;
                Self::push_ordered(out, order, &v.to_be_bytes(), &v.to_le_bytes());
            }
        }
        Ok(())
    }

    pub(crate) fn decode(self, field: &str, bytes: &[u8]) -> Result<Value> {
        let order = Self::order(options::byte_order());
        if bytes.len() < self.size() {
            return Err(Error::ShortRead {
                field: field.to_string(),
                offset: 0,
                needed: self.size(),
                available: bytes.len(),
            });
        }
        Ok(match self {
            Primitive::I8 => Value::Int(bytes[0] as i8 as i64),
            Primitive::U8 => Value::UInt(bytes[0] as u64),
            Primitive::I16 => Value::Int(i16::from_be_bytes(Self::read_ordered::<2>(order, bytes)) as i64),
            Primitive::U16 => Value::UInt(u16::from_be_bytes(Self::read_ordered::<2>(order, bytes)) as u64),
            Primitive::I32 => Value::Int(i32::from_be_bytes(Self::read_ordered::<4>(order, bytes)) as i64),
            Primitive::U32 => Value::UInt(u32::from_be_bytes(Self::read_ordered::<4>(order, bytes)) as u64),
            Primitive::I64 => Value::Int(i64::from_be_bytes(Self::read_ordered::<8>(order, bytes))),
            Primitive::U64 => Value::UInt(u64::from_be_bytes(Self::read_ordered::<8>(order, bytes))),
            Primitive::F32 => Value::Float(f32::from_be_bytes(Self::read_ordered::<4>(order, bytes)) as f64),
            Primitive::F64 => Value::Float(f64::from_be_bytes(Self::read_ordered::<8>(order, bytes))),
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Primitive::I8 => "i8",
            Primitive::U8 => "u8",
            Primitive::I16 => "i16",
            Primitive::U16 => "u16",
            Primitive::I32 => "i32",
            Primitive::U32 => "u32",
            Primitive::I64 => "i64",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }
}

/// Shared shape of the byte-string and text-string codecs: a [`Length`]
/// mode plus the common option surface.
#[derive(Debug, Clone, PartialEq)]
pub struct StringSpec {
    pub(crate) length: Length,
    pub(crate) options: FieldOptions,
}

impl StringSpec {
    /// A string in `length` mode with no options set.
    pub fn new(length: Length) -> Self {
        StringSpec {
            length,
            options: FieldOptions::new(),
        }
    }

    /// Attaches an option set (`default`/`always`/`full_string`/
    /// `enc_errors`) to this string spec.
    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }
}

/// A homogeneous sequence combinator: an element codec, a [`Length`], and
/// its own `default`/`always` option surface (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    pub(crate) element: Codec,
    pub(crate) length: Length,
    pub(crate) options: FieldOptions,
}

impl ArraySpec {
    /// An array of `element` in `length` mode with no array-level options
    /// set.
    pub fn new(element: Codec, length: Length) -> Self {
        ArraySpec {
            element,
            length,
            options: FieldOptions::new(),
        }
    }

    /// Attaches an array-level option set (`default`/`always`) to this
    /// array spec.
    pub fn with_options(mut self, options: FieldOptions) -> Self {
        self.options = options;
        self
    }
}

/// One field's codec: the kind tag of `spec.md`'s abstract `Codec` value.
#[derive(Debug, Clone, PartialEq)]
pub enum Codec {
    /// A fixed-width scalar.
    Primitive(Primitive, FieldOptions),
    /// A byte-string in one of the three length modes.
    ByteString(StringSpec),
    /// A text-string in one of the three length modes, decoded/encoded
    /// under the given [`Encoding`].
    TextString(StringSpec, Encoding),
    /// A homogeneous sequence of some element codec.
    Array(Box<ArraySpec>),
    /// A nested record, nested by reference to its (already-built) schema.
    Record(Arc<RecordSchema>, FieldOptions),
}

impl Codec {
    /// Validates the cross-option invariants from `spec.md` §3:
    /// `encoding` iff text-string, `length` iff string/array, `full_string`
    /// only on byte-strings, `always`/`default` mutually exclusive.
    pub(crate) fn validate(&self, field: &str) -> Result<()> {
        match self {
            Codec::Primitive(_, opts) => {
                opts.validate(field)?;
                if opts.full_string {
                    return Err(Error::SchemaError {
                        schema: field.to_string(),
                        reason: format!("field `{field}`: full_string is only valid on byte-strings"),
                    });
                }
                Ok(())
            }
            Codec::ByteString(spec) => spec.options.validate(field),
            Codec::TextString(spec, encoding) => {
                spec.options.validate(field)?;
                if spec.options.full_string {
                    return Err(Error::SchemaError {
                        schema: field.to_string(),
                        reason: format!("field `{field}`: full_string is only valid on byte-strings"),
                    });
                }
                if matches!(spec.length, Length::Autosized) && encoding.embeds_null() {
                    log::warn!(
                        target: "framewire::schema",
                        "field `{field}`: autosized text field uses an encoding ({encoding:?}) that can embed null octets; decoding may fail to find the real terminator"
                    );
                }
                Ok(())
            }
            Codec::Array(spec) => {
                if matches!(spec.length, Length::Autosized) {
                    return Err(Error::SchemaError {
                        schema: field.to_string(),
                        reason: format!(
                            "field `{field}`: an array cannot itself be Autosized; autosize the element string instead"
                        ),
                    });
                }
                spec.options.validate(field)?;
                if spec.options.always.is_some() && element_always(&spec.element).is_some() {
                    return Err(Error::SchemaError {
                        schema: field.to_string(),
                        reason: format!(
                            "field `{field}`: `always` set at both the array and element level is not supported"
                        ),
                    });
                }
                spec.element.validate(field)
            }
            Codec::Record(_, opts) => opts.validate(field),
        }
    }

    pub(crate) fn options(&self) -> Option<&FieldOptions> {
        match self {
            Codec::Primitive(_, o) => Some(o),
            Codec::ByteString(s) => Some(&s.options),
            Codec::TextString(s, _) => Some(&s.options),
            Codec::Array(a) => Some(&a.options),
            Codec::Record(_, o) => Some(o),
        }
    }

    /// Whether this codec can vary in wire width between instances.
    pub(crate) fn is_variable(&self) -> bool {
        match self {
            Codec::Primitive(..) => false,
            Codec::ByteString(spec) | Codec::TextString(spec, _) => {
                !matches!(spec.length, Length::Fixed(_))
            }
            Codec::Array(spec) => {
                !matches!(spec.length, Length::Fixed(_)) || spec.element.is_variable()
            }
            Codec::Record(schema, _) => !schema.is_fixed(),
        }
    }

    /// The fixed wire width, if this codec never varies.
    pub(crate) fn fixed_size(&self) -> Option<usize> {
        match self {
            Codec::Primitive(p, _) => Some(p.size()),
            Codec::ByteString(spec) | Codec::TextString(spec, _) => spec.length.fixed(),
            Codec::Array(spec) => spec.length.fixed().and_then(|n| {
                spec.element.fixed_size().map(|elem| elem * n)
            }),
            Codec::Record(schema, _) => schema.fixed_size(),
        }
    }

    /// The field this codec's length depends on, if it is `FromField`.
    pub(crate) fn from_field(&self) -> Option<&str> {
        match self {
            Codec::ByteString(spec) | Codec::TextString(spec, _) => spec.length.from_field_name(),
            Codec::Array(spec) => spec.length.from_field_name(),
            _ => None,
        }
    }

    /// The wire-format descriptor fragment for this codec, given the
    /// already-resolved length for variable-width codecs (ignored for
    /// fixed-width ones).
    pub(crate) fn descriptor(&self, resolved_len: Option<usize>) -> String {
        match self {
            Codec::Primitive(p, _) => p.descriptor_char().to_string(),
            Codec::ByteString(spec) | Codec::TextString(spec, _) => {
                let n = spec.length.fixed().or(resolved_len).unwrap_or(0);
                format!("{n}s")
            }
            Codec::Array(spec) => {
                let n = spec.length.fixed().or(resolved_len).unwrap_or(0);
                let elem = spec.element.descriptor(None);
                let mut out = String::new();
                for _ in 0..n {
                    let _ = write!(out, "{elem}");
                }
                out
            }
            Codec::Record(schema, _) => schema.descriptor().to_string(),
        }
    }

    pub(crate) fn encode_primitive_always_check(
        &self,
        field: &str,
        value: &Value,
        warnings: &mut Warnings,
    ) {
        if let Some(opts) = self.options() {
            if let Some(always) = &opts.always {
                if always != value {
                    crate::error::warn(
                        warnings,
                        Warning::ConstantMismatch {
                            field: field.to_string(),
                            expected: format!("{always:?}"),
                            actual: format!("{value:?}"),
                        },
                    );
                }
            }
        }
    }
}

fn element_always(codec: &Codec) -> Option<&Value> {
    codec.options().and_then(|o| o.always.as_ref())
}

/// Encodes `bytes` as a byte-string field of the resolved length `n`,
/// appending the framed (padded/truncated) octets to `out`. Returns the
/// `LengthMismatch` warning, if any, via `warnings`.
pub(crate) fn encode_fixed_bytes(
    field: &str,
    bytes: &[u8],
    n: usize,
    out: &mut Vec<u8>,
    warnings: &mut Warnings,
) {
    if bytes.len() == n {
        out.extend_from_slice(bytes);
    } else if bytes.len() < n {
        out.extend_from_slice(bytes);
        out.resize(out.len() + (n - bytes.len()), 0u8);
    } else {
        crate::error::warn(
            warnings,
            Warning::LengthMismatch {
                field: field.to_string(),
                expected: n,
                actual: bytes.len(),
            },
        );
        out.extend_from_slice(&bytes[..n]);
    }
}

/// Strips a byte-string's right-hand null padding per `spec.md`'s boundary
/// rule: the first `0x00` and everything after it is dropped.
pub(crate) fn strip_nulls(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(i) => &bytes[..i],
        None => bytes,
    }
}

pub(crate) fn encode_text(
    field: &str,
    text: &str,
    encoding: Encoding,
    enc_errors: EncErrors,
) -> Result<Vec<u8>> {
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Ascii => {
            let mut out = Vec::with_capacity(text.len());
            for c in text.chars() {
                if c.is_ascii() {
                    out.push(c as u8);
                } else {
                    match enc_errors {
                        EncErrors::Strict => {
                            return Err(Error::CoerceError {
                                field: field.to_string(),
                                reason: format!("character {c:?} is not ASCII"),
                            })
                        }
                        EncErrors::Replace => out.push(b'?'),
                        EncErrors::Ignore => {}
                    }
                }
            }
            Ok(out)
        }
        Encoding::Utf16 => {
            let order = options::byte_order().endianness();
            let mut out = Vec::with_capacity(text.len() * 2);
            for unit in text.encode_utf16() {
                let pair = match order {
                    RawEndian::Big => unit.to_be_bytes(),
                    RawEndian::Little => unit.to_le_bytes(),
                };
                out.extend_from_slice(&pair);
            }
            Ok(out)
        }
    }
}

pub(crate) fn decode_text(
    field: &str,
    bytes: &[u8],
    encoding: Encoding,
    enc_errors: EncErrors,
) -> Result<String> {
    match encoding {
        Encoding::Utf8 => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => match enc_errors {
                EncErrors::Strict => Err(Error::CoerceError {
                    field: field.to_string(),
                    reason: "invalid utf-8".to_string(),
                }),
                EncErrors::Replace => Ok(String::from_utf8_lossy(bytes).into_owned()),
                EncErrors::Ignore => Ok(bytes
                    .iter()
                    .filter(|b| b.is_ascii())
                    .map(|&b| b as char)
                    .collect()),
            },
        },
        Encoding::Ascii => {
            let mut out = String::with_capacity(bytes.len());
            for &b in bytes {
                if b < 0x80 {
                    out.push(b as char);
                } else {
                    match enc_errors {
                        EncErrors::Strict => {
                            return Err(Error::CoerceError {
                                field: field.to_string(),
                                reason: format!("byte {b:#04x} is not ASCII"),
                            })
                        }
                        EncErrors::Replace => out.push('?'),
                        EncErrors::Ignore => {}
                    }
                }
            }
            Ok(out)
        }
        Encoding::Utf16 => {
            let order = options::byte_order().endianness();
            if bytes.len() % 2 != 0 {
                return Err(Error::CoerceError {
                    field: field.to_string(),
                    reason: "odd number of bytes for utf-16".to_string(),
                });
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| match order {
                    RawEndian::Big => u16::from_be_bytes([pair[0], pair[1]]),
                    RawEndian::Little => u16::from_le_bytes([pair[0], pair[1]]),
                })
                .collect();
            let mut out = String::new();
            for c in char::decode_utf16(units) {
                match c {
                    Ok(c) => out.push(c),
                    Err(_) => match enc_errors {
                        EncErrors::Strict => {
                            return Err(Error::CoerceError {
                                field: field.to_string(),
                                reason: "invalid utf-16".to_string(),
                            })
                        }
                        EncErrors::Replace => out.push('\u{FFFD}'),
                        EncErrors::Ignore => {}
                    },
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_nulls_boundary() {
        assert_eq!(strip_nulls(b"foo\0\0"), b"foo");
        assert_eq!(strip_nulls(b"foo\0!"), b"foo");
        assert_eq!(strip_nulls(b"foo"), b"foo");
    }

    #[test]
    fn ascii_round_trip() {
        let bytes = encode_text("f", "hi", Encoding::Ascii, EncErrors::Strict).unwrap();
        assert_eq!(bytes, b"hi");
        let back = decode_text("f", &bytes, Encoding::Ascii, EncErrors::Strict).unwrap();
        assert_eq!(back, "hi");
    }
}
