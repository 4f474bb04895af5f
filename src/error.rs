//! This module contains the [Error] and [Warning] types used by the codec
//! engine: the errors abort the current parse/serialize/coerce operation,
//! the warnings are recorded and logged but never abort anything.

use thiserror::Error;

/// The error type returned by schema construction, coercion, parsing and
/// serialization.
#[derive(Debug, Error)]
pub enum Error {
    /// The source ran out of bytes before a field could be fully decoded.
    #[error("short read while decoding field `{field}` at offset {offset}: needed {needed} byte(s), {available} available")]
    ShortRead {
        /// The field that was being decoded.
        field: String,
        /// The byte offset into the record at which the read was attempted.
        offset: usize,
        /// The number of bytes the field needed.
        needed: usize,
        /// The number of bytes actually available from the source.
        available: usize,
    },

    /// A value could not be coerced into the representation demanded by a
    /// field's codec.
    #[error("cannot coerce value for field `{field}`: {reason}")]
    CoerceError {
        /// The field whose assignment failed.
        field: String,
        /// Human readable explanation.
        reason: String,
    },

    /// A value exceeds the range representable by the field's primitive
    /// integer width.
    #[error("value {value} is out of range for {primitive} field `{field}`")]
    EncodeOutOfRange {
        /// The field being encoded.
        field: String,
        /// Name of the primitive type, e.g. `"i16"`.
        primitive: &'static str,
        /// The offending value, pre-rendered for display.
        value: String,
    },

    /// [`RecordSchema::size_of`](crate::schema::RecordSchema::size_of) was
    /// called on a variable-size schema without an instance.
    #[error("size_of() requires an instance: schema `{schema}` is variable-size")]
    VariableSize {
        /// The schema that was queried.
        schema: String,
    },

    /// An error detected while constructing a schema: dangling `FromField`
    /// reference, inconsistent inheritance, mismatched discriminator width,
    /// conflicting `always` constants, duplicate field names, and so on.
    #[error("schema error in `{schema}`: {reason}")]
    SchemaError {
        /// The schema under construction.
        schema: String,
        /// Human readable explanation.
        reason: String,
    },

    /// An I/O error propagated from the underlying [`std::io::Read`] source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal diagnostics emitted by coercion, parsing and serialization.
///
/// Warnings never abort the operation that produced them. They are logged
/// through the `log` crate (target `framewire::warning`) and also collected
/// into the [`Warnings`] sink threaded through the relevant calls, so tests
/// and callers can assert on them without scraping logs.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// An `always` constant did not match the observed value.
    ConstantMismatch {
        /// The field whose constant was violated.
        field: String,
        /// The expected constant, pre-rendered.
        expected: String,
        /// The value actually observed, pre-rendered.
        actual: String,
    },
    /// An array or string was longer than its declared length and was
    /// truncated, or shorter and was padded.
    LengthMismatch {
        /// The field that was resized.
        field: String,
        /// The declared/expected length.
        expected: usize,
        /// The length actually supplied.
        actual: usize,
    },
    /// A float-to-integer coercion lost a fractional part.
    PrecisionLoss {
        /// The field being coerced.
        field: String,
        /// The original value, pre-rendered.
        from: String,
        /// The value after truncation, pre-rendered.
        to: String,
    },
    /// Two field names are bound to the same codec object, so their
    /// relative field order is unspecified (a stable, call-order tiebreak
    /// is used).
    AliasedFieldOrder {
        /// One of the two aliased field names.
        field_a: String,
        /// The other aliased field name.
        field_b: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ConstantMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field `{field}`: expected constant {expected}, observed {actual}"
            ),
            Warning::LengthMismatch {
                field,
                expected,
                actual,
            } => write!(
                f,
                "field `{field}`: length mismatch, expected {expected}, got {actual}"
            ),
            Warning::PrecisionLoss { field, from, to } => {
                write!(f, "field `{field}`: precision loss coercing {from} to {to}")
            }
            Warning::AliasedFieldOrder { field_a, field_b } => write!(
                f,
                "fields `{field_a}` and `{field_b}` share one codec object; their relative order is unspecified"
            ),
        }
    }
}

impl Warning {
    /// Logs this warning through the `log` crate under the
    /// `framewire::warning` target.
    pub fn log(&self) {
        log::warn!(target: "framewire::warning", "{self}");
    }
}

/// A sink for non-fatal diagnostics, threaded through `parse`, `serialize`
/// and coercion as an out-parameter.
pub type Warnings = Vec<Warning>;

/// Records `w`: logs it and pushes it onto `sink`.
pub(crate) fn warn(sink: &mut Warnings, w: Warning) {
    w.log();
    sink.push(w);
}
