//! The record schema engine (§4.3): schema construction, field ordering,
//! inheritance, and the per-record `parse`/`serialize`/`size_of` triad.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::codec::{self, Codec, Primitive};
use crate::error::{Error, Result, Warning, Warnings};
use crate::length::Length;
use crate::value::{self, Value};

/// One named field and its codec, in the order it was declared.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldEntry {
    pub(crate) name: String,
    pub(crate) codec: Codec,
    pub(crate) seq: u64,
}

/// An immutable, shareable description of one record type: its ordered
/// fields and the attributes derived from them (fixed-size-ness, total
/// size, prefix constant, wire-format descriptor).
///
/// Built exclusively through [`SchemaBuilder`]; never mutated after
/// [`SchemaBuilder::build`] returns, so it is `Send + Sync` and meant to
/// be shared behind an [`Arc`] the way `serde_someip`'s `&'static
/// SomeIpType` constants are shared -- except computed once at runtime
/// instead of baked in at compile time.
#[derive(Debug, PartialEq)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldEntry>,
    index: HashMap<String, usize>,
    is_fixed: bool,
    fixed_size: Option<usize>,
    prefix_constant: Option<i64>,
    prefix_width: Option<usize>,
    prefix_primitive: Option<Primitive>,
    descriptor: String,
}

impl RecordSchema {
    /// The schema's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether every field resolves to a fixed wire width, making
    /// [`RecordSchema::size_of`] callable with no instance.
    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    /// The fixed size in octets, for schemas with no variable-width
    /// field. `None` for variable-size schemas.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }

    /// The integer value the first field must equal for this schema to
    /// be selected by a [`crate::dispatch::Namespace`], if the first
    /// field is a primitive integer with `always` set.
    pub fn prefix_constant(&self) -> Option<i64> {
        self.prefix_constant
    }

    pub(crate) fn prefix_width(&self) -> Option<usize> {
        self.prefix_width
    }

    pub(crate) fn prefix_primitive(&self) -> Option<Primitive> {
        self.prefix_primitive
    }

    /// The wire-format descriptor string: a byte-order character followed
    /// by one packing-mini-language character per field (expanded for
    /// arrays and nested records).
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub(crate) fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Resolves a `FromField` length against already-parsed/constructed
    /// sibling values.
    fn resolve_length(&self, length: &Length, values: &[Value], field: &str) -> Result<usize> {
        match length {
            Length::Fixed(n) => Ok(*n),
            Length::Autosized => Err(Error::SchemaError {
                schema: self.name.clone(),
                reason: format!("field `{field}` has no fixed length (autosized)"),
            }),
            Length::FromField(name) => {
                let idx = self.field_index(name).ok_or_else(|| Error::SchemaError {
                    schema: self.name.clone(),
                    reason: format!("field `{field}` references unknown sibling `{name}`"),
                })?;
                let v = &values[idx];
                v.as_u64().map(|n| n as usize).ok_or_else(|| Error::CoerceError {
                    field: field.to_string(),
                    reason: format!("sibling field `{name}` is not an integer"),
                })
            }
        }
    }

    /// Computes the byte size of `codec` given the already-known sibling
    /// values and (if already coerced) this field's own value.
    fn codec_size(
        &self,
        codec: &Codec,
        field: &str,
        values: &[Value],
        value: Option<&Value>,
    ) -> Result<usize> {
        if let Some(n) = codec.fixed_size() {
            return Ok(n);
        }
        match codec {
            Codec::ByteString(spec) | Codec::TextString(spec, _) => match &spec.length {
                Length::Fixed(n) => Ok(*n),
                Length::FromField(_) => self.resolve_length(&spec.length, values, field),
                Length::Autosized => match value {
                    Some(Value::Bytes(b)) => Ok(b.len() + 1),
                    Some(Value::Text(s)) => Ok(s.len() + 1),
                    _ => Err(Error::SchemaError {
                        schema: self.name.clone(),
                        reason: format!("cannot size autosized field `{field}` without a value"),
                    }),
                },
            },
            Codec::Array(spec) => {
                let n = match &spec.length {
                    Length::Fixed(n) => *n,
                    Length::FromField(_) => self.resolve_length(&spec.length, values, field)?,
                    Length::Autosized => unreachable!("validated at build time"),
                };
                if let Some(elem_size) = spec.element.fixed_size() {
                    Ok(elem_size * n)
                } else {
                    match value {
                        Some(Value::Array(items)) => {
                            let mut total = 0;
                            for item in items {
                                total += self.codec_size(&spec.element, field, values, Some(item))?;
                            }
                            Ok(total)
                        }
                        _ => Err(Error::SchemaError {
                            schema: self.name.clone(),
                            reason: format!(
                                "cannot size variable-element array field `{field}` without a value"
                            ),
                        }),
                    }
                }
            }
            Codec::Record(schema, _) => match value {
                Some(Value::Record(instance)) => schema.size_of(Some(instance)),
                _ => Err(Error::VariableSize {
                    schema: schema.name.clone(),
                }),
            },
            Codec::Primitive(..) => unreachable!("primitives are always fixed-size"),
        }
    }

    /// Returns the fixed total size, or errors with
    /// [`Error::VariableSize`] if any field is variable-width.
    pub fn size_of(&self, instance: Option<&RecordInstance>) -> Result<usize> {
        match (self.fixed_size, instance) {
            (Some(n), _) => Ok(n),
            (None, None) => Err(Error::VariableSize {
                schema: self.name.clone(),
            }),
            (None, Some(instance)) => {
                let mut total = 0;
                for (i, f) in self.fields.iter().enumerate() {
                    total += self.codec_size(&f.codec, &f.name, &instance.values, Some(&instance.values[i]))?;
                }
                Ok(total)
            }
        }
    }

    /// Serializes `instance`'s current field values in field order.
    pub fn serialize(&self, instance: &RecordInstance, warnings: &mut Warnings) -> Result<Vec<u8>> {
        if instance.schema.name() != self.name {
            return Err(Error::CoerceError {
                field: self.name.clone(),
                reason: "instance does not belong to this schema".to_string(),
            });
        }
        let mut out = Vec::new();
        for (i, f) in self.fields.iter().enumerate() {
            let value = &instance.values[i];
            f.codec.encode_primitive_always_check(&f.name, value, warnings);
            self.encode_field(&f.codec, &f.name, value, &instance.values, &mut out, warnings)?;
        }
        Ok(out)
    }

    fn encode_field(
        &self,
        codec: &Codec,
        field: &str,
        value: &Value,
        siblings: &[Value],
        out: &mut Vec<u8>,
        warnings: &mut Warnings,
    ) -> Result<()> {
        match codec {
            Codec::Primitive(p, _) => p.encode(field, value, out),
            Codec::ByteString(spec) => {
                let bytes = match value {
                    Value::Bytes(b) => b.clone(),
                    other => {
                        return Err(Error::CoerceError {
                            field: field.to_string(),
                            reason: format!("expected bytes, found {other:?}"),
                        })
                    }
                };
                match &spec.length {
                    Length::Autosized => {
                        out.extend_from_slice(&bytes);
                        out.push(0);
                        Ok(())
                    }
                    Length::Fixed(n) => {
                        codec::encode_fixed_bytes(field, &bytes, *n, out, warnings);
                        Ok(())
                    }
                    Length::FromField(_) => {
                        let n = self.resolve_length(&spec.length, siblings, field)?;
                        codec::encode_fixed_bytes(field, &bytes, n, out, warnings);
                        Ok(())
                    }
                }
            }
            Codec::TextString(spec, encoding) => {
                let text = match value {
                    Value::Text(s) => s.clone(),
                    other => {
                        return Err(Error::CoerceError {
                            field: field.to_string(),
                            reason: format!("expected text, found {other:?}"),
                        })
                    }
                };
                let bytes = codec::encode_text(field, &text, *encoding, spec.options.enc_errors)?;
                match &spec.length {
                    Length::Autosized => {
                        out.extend_from_slice(&bytes);
                        out.push(0);
                        Ok(())
                    }
                    Length::Fixed(n) => {
                        codec::encode_fixed_bytes(field, &bytes, *n, out, warnings);
                        Ok(())
                    }
                    Length::FromField(_) => {
                        let n = self.resolve_length(&spec.length, siblings, field)?;
                        codec::encode_fixed_bytes(field, &bytes, n, out, warnings);
                        Ok(())
                    }
                }
            }
            Codec::Array(spec) => {
                let items = match value {
                    Value::Array(items) => items.clone(),
                    other => {
                        return Err(Error::CoerceError {
                            field: field.to_string(),
                            reason: format!("expected an array, found {other:?}"),
                        })
                    }
                };
                let n = match &spec.length {
                    Length::Fixed(n) => *n,
                    Length::FromField(_) => self.resolve_length(&spec.length, siblings, field)?,
                    Length::Autosized => unreachable!("validated at build time"),
                };
                let fill = array_element_default(spec);
                let padded = pad_or_truncate(field, items, n, fill, warnings);
                for item in &padded {
                    self.encode_field(&spec.element, field, item, siblings, out, warnings)?;
                }
                Ok(())
            }
            Codec::Record(schema, _) => {
                let instance = match value {
                    Value::Record(instance) => instance,
                    other => {
                        return Err(Error::CoerceError {
                            field: field.to_string(),
                            reason: format!("expected a record, found {other:?}"),
                        })
                    }
                };
                let bytes = schema.serialize(instance, warnings)?;
                out.extend_from_slice(&bytes);
                Ok(())
            }
        }
    }

    /// Parses one instance of this schema from `reader`, consuming
    /// exactly as many bytes as the resolved field lengths require.
    pub fn parse<R: Read>(&self, reader: &mut R, warnings: &mut Warnings) -> Result<RecordInstance> {
        let mut values: Vec<Value> = Vec::with_capacity(self.fields.len());
        for f in &self.fields {
            let v = self.decode_field(&f.codec, &f.name, reader, &values, warnings)?;
            f.codec.encode_primitive_always_check(&f.name, &v, warnings);
            values.push(v);
        }
        Ok(RecordInstance {
            schema: Arc::new(self.shallow_clone()),
            values,
        })
    }

    /// Parses one instance from a [`bytes::Bytes`] buffer.
    ///
    /// *Only available with the `bytes` feature.* Currently just a
    /// convenience over [`RecordSchema::parse`] against the buffer's
    /// octet slice.
    #[cfg(feature = "bytes")]
    pub fn parse_bytes(&self, data: &bytes::Bytes, warnings: &mut Warnings) -> Result<RecordInstance> {
        let mut cursor: &[u8] = data.as_ref();
        self.parse(&mut cursor, warnings)
    }

    /// Serializes `instance` into a [`bytes::Bytes`] buffer.
    ///
    /// *Only available with the `bytes` feature.* Currently just a
    /// convenience over [`RecordSchema::serialize`].
    #[cfg(feature = "bytes")]
    pub fn serialize_bytes(&self, instance: &RecordInstance, warnings: &mut Warnings) -> Result<bytes::Bytes> {
        self.serialize(instance, warnings).map(bytes::Bytes::from)
    }

    fn shallow_clone(&self) -> RecordSchema {
        RecordSchema {
            name: self.name.clone(),
            fields: self.fields.clone(),
            index: self.index.clone(),
            is_fixed: self.is_fixed,
            fixed_size: self.fixed_size,
            prefix_constant: self.prefix_constant,
            prefix_width: self.prefix_width,
            prefix_primitive: self.prefix_primitive,
            descriptor: self.descriptor.clone(),
        }
    }

    fn decode_field<R: Read>(
        &self,
        codec: &Codec,
        field: &str,
        reader: &mut R,
        siblings: &[Value],
        warnings: &mut Warnings,
    ) -> Result<Value> {
        match codec {
            Codec::Primitive(p, _) => {
                let bytes = read_exact_or_short(reader, field, p.size())?;
                p.decode(field, &bytes)
            }
            Codec::ByteString(spec) => {
                let raw = self.read_string_bytes(&spec.length, field, reader, siblings)?;
                if spec.options.full_string {
                    Ok(Value::Bytes(raw))
                } else {
                    Ok(Value::Bytes(codec::strip_nulls(&raw).to_vec()))
                }
            }
            Codec::TextString(spec, encoding) => {
                let raw = self.read_string_bytes(&spec.length, field, reader, siblings)?;
                let framed = if spec.options.full_string {
                    raw
                } else {
                    codec::strip_nulls(&raw).to_vec()
                };
                let text = codec::decode_text(field, &framed, *encoding, spec.options.enc_errors)?;
                Ok(Value::Text(text))
            }
            Codec::Array(spec) => {
                let n = match &spec.length {
                    Length::Fixed(n) => *n,
                    Length::FromField(_) => self.resolve_length(&spec.length, siblings, field)?,
                    Length::Autosized => unreachable!("validated at build time"),
                };
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(self.decode_field(&spec.element, field, reader, siblings, warnings)?);
                }
                Ok(Value::Array(items))
            }
            Codec::Record(schema, _) => {
                let instance = schema.parse(reader, warnings)?;
                Ok(Value::Record(instance))
            }
        }
    }

    fn read_string_bytes<R: Read>(
        &self,
        length: &Length,
        field: &str,
        reader: &mut R,
        siblings: &[Value],
    ) -> Result<Vec<u8>> {
        match length {
            Length::Fixed(n) => read_exact_or_short(reader, field, *n),
            Length::FromField(_) => {
                let n = self.resolve_length(length, siblings, field)?;
                read_exact_or_short(reader, field, n)
            }
            Length::Autosized => read_until_null_or_short(reader, field),
        }
    }
}

fn array_element_default(spec: &crate::codec::ArraySpec) -> Value {
    if let Some(v) = &spec.options.default {
        return v.resolve();
    }
    if let Some(opts) = spec.element.options() {
        if let Some(d) = &opts.default {
            return d.resolve();
        }
    }
    zero_value(&spec.element)
}

/// The natural zero value for a codec, used to fill defaults with
/// nothing else declared.
pub(crate) fn zero_value(codec: &Codec) -> Value {
    match codec {
        Codec::Primitive(p, _) => p.zero(),
        Codec::ByteString(spec) => Value::Bytes(vec![0u8; spec.length.fixed().unwrap_or(0)]),
        Codec::TextString(..) => Value::Text(String::new()),
        Codec::Array(spec) => {
            let n = spec.length.fixed().unwrap_or(0);
            Value::Array((0..n).map(|_| array_element_default(spec)).collect())
        }
        Codec::Record(..) => Value::Bytes(Vec::new()),
    }
}

fn pad_or_truncate(
    field: &str,
    mut items: Vec<Value>,
    n: usize,
    fill: Value,
    warnings: &mut Warnings,
) -> Vec<Value> {
    use std::cmp::Ordering;
    match items.len().cmp(&n) {
        Ordering::Equal => items,
        Ordering::Less => {
            while items.len() < n {
                items.push(fill.clone());
            }
            items
        }
        Ordering::Greater => {
            crate::error::warn(
                warnings,
                Warning::LengthMismatch {
                    field: field.to_string(),
                    expected: n,
                    actual: items.len(),
                },
            );
            items.truncate(n);
            items
        }
    }
}

fn read_exact_or_short<R: Read>(reader: &mut R, field: &str, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut total = 0;
    while total < n {
        match reader.read(&mut buf[total..]) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    field: field.to_string(),
                    offset: total,
                    needed: n,
                    available: total,
                })
            }
            Ok(k) => total += k,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(buf)
}

fn read_until_null_or_short<R: Read>(reader: &mut R, field: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                return Err(Error::ShortRead {
                    field: field.to_string(),
                    offset: out.len(),
                    needed: out.len() + 1,
                    available: out.len(),
                })
            }
            Ok(_) => {
                if byte[0] == 0 {
                    return Ok(out);
                }
                out.push(byte[0]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
}

/// A mapping from field name to coerced [`Value`], plus a back-reference
/// to the schema it was built from. Equality compares field values
/// (post-coercion) and the schema name.
#[derive(Debug, Clone)]
pub struct RecordInstance {
    schema: Arc<RecordSchema>,
    values: Vec<Value>,
}

impl PartialEq for RecordInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.values == other.values
    }
}

impl RecordInstance {
    /// The schema this instance was built/parsed against.
    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    /// Builds an instance from named field values; fields left unset fall
    /// back to `always`, then `default`, then the codec's natural zero.
    pub fn new(
        schema: Arc<RecordSchema>,
        provided: Vec<(&str, Value)>,
        warnings: &mut Warnings,
    ) -> Result<RecordInstance> {
        let mut by_name: HashMap<&str, Value> = provided.into_iter().collect();
        let mut values: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for f in &schema.fields {
            let raw = match by_name.remove(f.name.as_str()) {
                Some(v) => v,
                None => default_for(&f.codec, &values, &schema, &f.name)?,
            };
            let coerced = value::coerce(&f.codec, raw, &f.name, warnings)?;
            f.codec
                .encode_primitive_always_check(&f.name, &coerced, warnings);
            values.push(coerced);
        }
        Ok(RecordInstance { schema, values })
    }

    /// Builds an instance from positional field values, in field order.
    pub fn new_positional(
        schema: Arc<RecordSchema>,
        provided: Vec<Value>,
        warnings: &mut Warnings,
    ) -> Result<RecordInstance> {
        let named = schema
            .fields
            .iter()
            .zip(provided)
            .map(|(f, v)| (f.name.as_str(), v))
            .collect();
        RecordInstance::new(schema, named, warnings)
    }

    /// Reads a field's current coerced value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let idx = self.schema.field_index(name)?;
        self.values.get(idx)
    }

    /// Assigns `value` to `name`, coercing it and checking/warning on
    /// `always` mismatch.
    pub fn set(&mut self, name: &str, value: Value, warnings: &mut Warnings) -> Result<()> {
        let idx = self.schema.field_index(name).ok_or_else(|| Error::CoerceError {
            field: name.to_string(),
            reason: "no such field".to_string(),
        })?;
        let codec = &self.schema.fields[idx].codec;
        let coerced = value::coerce(codec, value, name, warnings)?;
        codec.encode_primitive_always_check(name, &coerced, warnings);
        self.values[idx] = coerced;
        Ok(())
    }
}

fn default_for(
    codec: &Codec,
    values_so_far: &[Value],
    schema: &RecordSchema,
    field: &str,
) -> Result<Value> {
    if let Some(opts) = codec.options() {
        if let Some(always) = &opts.always {
            return Ok(always.clone());
        }
        if let Some(d) = &opts.default {
            return Ok(d.resolve());
        }
    }
    match codec {
        Codec::ByteString(spec) if matches!(spec.length, Length::FromField(_)) => {
            let n = schema.resolve_length(&spec.length, values_so_far, field)?;
            Ok(Value::Bytes(vec![0u8; n]))
        }
        Codec::TextString(spec, _) if matches!(spec.length, Length::FromField(_)) => {
            let n = schema.resolve_length(&spec.length, values_so_far, field)?;
            Ok(Value::Text("\0".repeat(n)))
        }
        Codec::Array(spec) if matches!(spec.length, Length::FromField(_)) => {
            let n = schema.resolve_length(&spec.length, values_so_far, field)?;
            Ok(Value::Array((0..n).map(|_| array_element_default(spec)).collect()))
        }
        Codec::Record(schema, _) => Err(Error::CoerceError {
            field: field.to_string(),
            reason: format!(
                "nested record field has no default; supply a `{}` instance explicitly",
                schema.name
            ),
        }),
        other => Ok(zero_value(other)),
    }
}

/// Builds [`RecordSchema`] values: collects fields in call order,
/// validates `FromField` references and codec options, resolves
/// inheritance, and computes the cached derived attributes.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldEntry>,
    index: HashMap<String, usize>,
    counter: u64,
}

impl SchemaBuilder {
    /// Starts an empty builder for a schema named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            index: HashMap::new(),
            counter: 0,
        }
    }

    /// Starts a derived schema from `base`: its field list is pre-seeded
    /// with `base`'s fields (same order, same codecs). Subsequent
    /// `.field()` calls either substitute an existing name's codec in
    /// place, or append a new field after all of `base`'s fields, per the
    /// inheritance rule in `spec.md` §3.
    pub fn derive_from(base: &Arc<RecordSchema>, name: impl Into<String>) -> Self {
        let mut index = HashMap::new();
        let fields: Vec<FieldEntry> = base
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                index.insert(f.name.clone(), i);
                f.clone()
            })
            .collect();
        let counter = fields.len() as u64;
        SchemaBuilder {
            name: name.into(),
            fields,
            index,
            counter,
        }
    }

    /// Declares a field, or (when deriving) overrides an existing one's
    /// codec in place.
    pub fn field(mut self, name: impl Into<String>, codec: Codec) -> Result<Self> {
        let name = name.into();
        codec.validate(&name)?;
        if let Some(&idx) = self.index.get(&name) {
            let seq = self.fields[idx].seq;
            self.fields[idx] = FieldEntry { name, codec, seq };
        } else {
            let seq = self.counter;
            self.counter += 1;
            self.index.insert(name.clone(), self.fields.len());
            self.fields.push(FieldEntry { name, codec, seq });
        }
        Ok(self)
    }

    /// Validates and finalizes the schema.
    pub fn build(self) -> Result<Arc<RecordSchema>> {
        let SchemaBuilder { name, fields, index, .. } = self;

        let mut seen = std::collections::HashSet::new();
        for f in &fields {
            if !seen.insert(f.name.clone()) {
                return Err(Error::SchemaError {
                    schema: name.clone(),
                    reason: format!("duplicate field name `{}`", f.name),
                });
            }
        }

        for (i, f) in fields.iter().enumerate() {
            if let Some(dep) = f.codec.from_field() {
                let dep_idx = index.get(dep).ok_or_else(|| Error::SchemaError {
                    schema: name.clone(),
                    reason: format!(
                        "field `{}` references unknown sibling `{dep}`",
                        f.name
                    ),
                })?;
                if *dep_idx >= i {
                    return Err(Error::SchemaError {
                        schema: name.clone(),
                        reason: format!(
                            "field `{}` references `{dep}`, which is not declared earlier",
                            f.name
                        ),
                    });
                }
                if !matches!(fields[*dep_idx].codec, Codec::Primitive(p, _) if !p.is_float()) {
                    return Err(Error::SchemaError {
                        schema: name.clone(),
                        reason: format!(
                            "field `{}` references `{dep}`, which is not an integer field",
                            f.name
                        ),
                    });
                }
            }
        }

        let is_fixed = !fields.iter().any(|f| f.codec.is_variable());
        let fixed_size = if is_fixed {
            Some(fields.iter().map(|f| f.codec.fixed_size().unwrap_or(0)).sum())
        } else {
            None
        };

        let (prefix_constant, prefix_width, prefix_primitive) = match fields.first() {
            Some(f) => match &f.codec {
                Codec::Primitive(p, opts) => match &opts.always {
                    Some(v) => (v.as_i64(), Some(p.size()), Some(*p)),
                    None => (None, None, None),
                },
                _ => (None, None, None),
            },
            None => (None, None, None),
        };

        let descriptor = build_descriptor(&fields);

        Ok(Arc::new(RecordSchema {
            name,
            fields,
            index,
            is_fixed,
            fixed_size,
            prefix_constant,
            prefix_width,
            prefix_primitive,
            descriptor,
        }))
    }
}

fn build_descriptor(fields: &[FieldEntry]) -> String {
    use crate::options;
    let mut out = String::new();
    out.push(options::byte_order().as_char());
    for f in fields {
        out.push_str(&f.codec.descriptor(f.codec.fixed_size()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FieldOptions, Primitive};

    fn int_field(p: Primitive) -> Codec {
        Codec::Primitive(p, FieldOptions::new())
    }

    #[test]
    fn round_trip_two_i32_fields() {
        let schema = SchemaBuilder::new("Point")
            .field("x", int_field(Primitive::I32))
            .unwrap()
            .field("y", int_field(Primitive::I32))
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let instance = RecordInstance::new_positional(
            schema.clone(),
            vec![Value::Int(5), Value::Int(6)],
            &mut warnings,
        )
        .unwrap();

        let bytes = schema.serialize(&instance, &mut warnings).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 5, 0, 0, 0, 6]);

        let mut cursor: &[u8] = &bytes;
        let parsed = schema.parse(&mut cursor, &mut warnings).unwrap();
        assert_eq!(parsed, instance);
        assert_eq!(schema.size_of(Some(&instance)).unwrap(), 8);
        assert_eq!(schema.size_of(None).unwrap(), 8);
    }

    #[test]
    fn dangling_from_field_is_rejected() {
        let err = SchemaBuilder::new("Bad")
            .field(
                "name",
                Codec::ByteString(crate::codec::StringSpec::new(Length::FromField(
                    "missing".into(),
                ))),
            )
            .unwrap()
            .build();
        assert!(matches!(err, Err(Error::SchemaError { .. })));
    }

    #[test]
    fn inheritance_substitutes_in_place_and_appends() {
        let base = SchemaBuilder::new("Base")
            .field("a", int_field(Primitive::I16))
            .unwrap()
            .field("b", int_field(Primitive::I16))
            .unwrap()
            .build()
            .unwrap();

        let derived = SchemaBuilder::derive_from(&base, "Derived")
            .field("a", int_field(Primitive::I32))
            .unwrap()
            .field("c", int_field(Primitive::I16))
            .unwrap()
            .build()
            .unwrap();

        let names: Vec<&str> = derived.field_names().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(matches!(derived.fields[0].codec, Codec::Primitive(Primitive::I32, _)));
    }

    // spec.md §8 end-to-end scenario 2: a fixed byte-string prefix, a
    // length field, and a sibling byte-string sized off it.
    #[test]
    fn variable_length_string_sized_from_sibling_field() {
        use crate::codec::StringSpec;

        let schema = SchemaBuilder::new("Greeting")
            .field(
                "state",
                Codec::ByteString(StringSpec::new(Length::Fixed(2))),
            )
            .unwrap()
            .field("name_len", int_field(Primitive::U16))
            .unwrap()
            .field(
                "name",
                Codec::ByteString(StringSpec::new(Length::FromField("name_len".into()))),
            )
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let instance = RecordInstance::new_positional(
            schema.clone(),
            vec![
                Value::Bytes(b"VA".to_vec()),
                Value::UInt(3),
                Value::Bytes(b"Eli".to_vec()),
            ],
            &mut warnings,
        )
        .unwrap();

        let bytes = schema.serialize(&instance, &mut warnings).unwrap();
        assert_eq!(bytes, b"VA\x00\x03Eli");

        let mut cursor: &[u8] = &bytes;
        let parsed = schema.parse(&mut cursor, &mut warnings).unwrap();
        assert_eq!(parsed, instance);
    }

    // spec.md §8 end-to-end scenario 3: a constant discriminator prefix
    // followed by two floats.
    #[test]
    fn always_prefix_and_floats_round_trip() {
        let schema = SchemaBuilder::new("Coord")
            .field(
                "code",
                Codec::Primitive(
                    Primitive::I16,
                    FieldOptions::new().with_always(Value::Int(1)),
                ),
            )
            .unwrap()
            .field("x", Codec::Primitive(Primitive::F32, FieldOptions::new()))
            .unwrap()
            .field("y", Codec::Primitive(Primitive::F32, FieldOptions::new()))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(schema.prefix_constant(), Some(1));

        let mut warnings = Warnings::new();
        let instance = RecordInstance::new_positional(
            schema.clone(),
            vec![Value::Int(1), Value::Float(66.0), Value::Float(27.0)],
            &mut warnings,
        )
        .unwrap();

        let bytes = schema.serialize(&instance, &mut warnings).unwrap();
        assert_eq!(
            bytes,
            vec![0x00, 0x01, b'B', 0x84, 0x00, 0x00, b'A', 0xd8, 0x00, 0x00]
        );
        assert!(warnings.is_empty());

        let mut cursor: &[u8] = &bytes;
        let parsed = schema.parse(&mut cursor, &mut warnings).unwrap();
        assert_eq!(parsed, instance);
    }

    // spec.md §8 end-to-end scenario 5: nested arrays with element-level
    // defaults.
    #[test]
    fn nested_array_default_and_size() {
        use crate::codec::ArraySpec;

        let inner = Codec::Array(Box::new(ArraySpec::new(
            Codec::Primitive(
                Primitive::I32,
                FieldOptions::new().with_default(Value::Int(0)),
            ),
            Length::Fixed(2),
        )));
        let schema = SchemaBuilder::new("Grid")
            .field("xs", Codec::Array(Box::new(ArraySpec::new(inner, Length::Fixed(3)))))
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let instance = RecordInstance::new(schema.clone(), vec![], &mut warnings).unwrap();
        let expected = Value::Array(vec![
            Value::Array(vec![Value::Int(0), Value::Int(0)]),
            Value::Array(vec![Value::Int(0), Value::Int(0)]),
            Value::Array(vec![Value::Int(0), Value::Int(0)]),
        ]);
        assert_eq!(instance.get("xs"), Some(&expected));
        assert_eq!(schema.size_of(Some(&instance)).unwrap(), 24);
        assert_eq!(schema.size_of(None).unwrap(), 24);
    }

    // spec.md §8 boundary: over-length array truncates and warns.
    #[test]
    fn over_length_array_truncates_and_warns() {
        use crate::codec::ArraySpec;

        let schema = SchemaBuilder::new("Five")
            .field(
                "xs",
                Codec::Array(Box::new(ArraySpec::new(
                    int_field(Primitive::I32),
                    Length::Fixed(5),
                ))),
            )
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let six: Vec<Value> = (0..6).map(Value::Int).collect();
        let instance = RecordInstance::new(
            schema.clone(),
            vec![("xs", Value::Array(six))],
            &mut warnings,
        )
        .unwrap();

        let mut warnings = Warnings::new();
        let bytes = schema.serialize(&instance, &mut warnings).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::LengthMismatch { expected: 5, actual: 6, .. }));
    }

    // spec.md §8 boundary: an autosized tail after a fixed prefix.
    #[test]
    fn autosized_tail_after_fixed_prefix() {
        use crate::codec::StringSpec;

        let schema = SchemaBuilder::new("Tagged")
            .field(
                "state",
                Codec::ByteString(StringSpec::new(Length::Fixed(2))),
            )
            .unwrap()
            .field("name", Codec::ByteString(StringSpec::new(Length::Autosized)))
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let data = b"VAEli\0";
        let mut cursor: &[u8] = data;
        let instance = schema.parse(&mut cursor, &mut warnings).unwrap();
        assert_eq!(instance.get("state"), Some(&Value::Bytes(b"VA".to_vec())));
        assert_eq!(instance.get("name"), Some(&Value::Bytes(b"Eli".to_vec())));

        let bytes = schema.serialize(&instance, &mut warnings).unwrap();
        assert_eq!(bytes, data);
    }

    // spec.md §8 boundary: `full_string` suppresses null-stripping.
    #[test]
    fn full_string_suppresses_null_strip() {
        use crate::codec::StringSpec;

        let schema = SchemaBuilder::new("Raw")
            .field(
                "blob",
                Codec::ByteString(
                    StringSpec::new(Length::Fixed(5)).with_options(FieldOptions::new().with_full_string()),
                ),
            )
            .unwrap()
            .build()
            .unwrap();

        let mut warnings = Warnings::new();
        let mut cursor: &[u8] = b"foo\0!";
        let instance = schema.parse(&mut cursor, &mut warnings).unwrap();
        assert_eq!(instance.get("blob"), Some(&Value::Bytes(b"foo\0!".to_vec())));
    }
}
