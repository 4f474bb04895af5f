//! Process-wide configuration read by every encode/decode operation.
//!
//! The wire byte order is, per the framing convention this crate implements,
//! a single process-wide setting rather than a per-type parameter (compare
//! `serde_someip::options::SomeIpOptions::BYTE_ORDER`, which is a compile
//! time constant on a per-project options type). Here it is a runtime value
//! set once at startup via [`set_byte_order`] and read on every field
//! access via [`byte_order`].

use std::sync::OnceLock;

/// The two octet arrangements this crate actually writes to the wire.
/// Unlike the five [`ByteOrder`] packing-mini-language characters, which
/// also distinguish alignment/native variants, encode/decode only ever
/// needs to know which end the most significant octet goes on -- mirrored
/// on the teacher's own `SomeIpWriter::write_ux`, which switches on exactly
/// this binary choice rather than pulling in a byte-order crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawEndian {
    Big,
    Little,
}

/// The wire byte order, selected with the characters of the well known
/// packing mini-language (`struct.pack` et al.): `!`, `>`, `<`, `=`, `@`.
///
/// Integer widths never change with the byte order; only the arrangement
/// of octets within a multi-byte value does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// `!` -- network byte order (big-endian). The default.
    Network,
    /// `>` -- big-endian, standard sizes.
    Big,
    /// `<` -- little-endian, standard sizes.
    Little,
    /// `=` -- native byte order, standard sizes.
    NativeStandard,
    /// `@` -- native byte order, native alignment.
    ///
    /// This crate never pads for alignment, so this behaves identically to
    /// [`NativeStandard`](ByteOrder::NativeStandard); the distinction is
    /// kept only so the descriptor character round-trips.
    NativeAligned,
}

impl ByteOrder {
    /// Parses one of the five packing-mini-language characters.
    pub fn from_char(c: char) -> Option<ByteOrder> {
        match c {
            '!' => Some(ByteOrder::Network),
            '>' => Some(ByteOrder::Big),
            '<' => Some(ByteOrder::Little),
            '=' => Some(ByteOrder::NativeStandard),
            '@' => Some(ByteOrder::NativeAligned),
            _ => None,
        }
    }

    /// The character this byte order is prepended to a wire-format
    /// descriptor as.
    pub fn as_char(self) -> char {
        match self {
            ByteOrder::Network => '!',
            ByteOrder::Big => '>',
            ByteOrder::Little => '<',
            ByteOrder::NativeStandard => '=',
            ByteOrder::NativeAligned => '@',
        }
    }

    /// The [`RawEndian`] used to actually read/write octets.
    pub(crate) fn endianness(self) -> RawEndian {
        match self {
            ByteOrder::Network | ByteOrder::Big => RawEndian::Big,
            ByteOrder::Little => RawEndian::Little,
            ByteOrder::NativeStandard | ByteOrder::NativeAligned => {
                if cfg!(target_endian = "big") {
                    RawEndian::Big
                } else {
                    RawEndian::Little
                }
            }
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Network
    }
}

static BYTE_ORDER: OnceLock<ByteOrder> = OnceLock::new();

/// Sets the process-wide byte order. Must be called at most once, before
/// any codec work starts.
///
/// # Panics
/// Panics if the byte order has already been set (either explicitly, or
/// implicitly by a prior call to [`byte_order`]). Callers that need to
/// change byte order mid-run are responsible for quiescing all codec work
/// first; this crate does not attempt to detect or synchronize that for
/// them, so a second call is treated as a programming error rather than a
/// silent reconfiguration.
pub fn set_byte_order(order: ByteOrder) {
    if BYTE_ORDER.set(order).is_err() {
        panic!("framewire::options::set_byte_order called more than once");
    }
}

/// Returns the process-wide byte order, defaulting to
/// [`ByteOrder::Network`] if [`set_byte_order`] was never called.
pub fn byte_order() -> ByteOrder {
    *BYTE_ORDER.get_or_init(ByteOrder::default)
}

/// Supported text encodings for `TextString` codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8, Rust's native string encoding.
    Utf8,
    /// 7-bit ASCII; every octet must be `< 0x80`.
    Ascii,
    /// UTF-16, decoded/encoded in the process-wide byte order.
    Utf16,
}

impl Encoding {
    pub(crate) fn embeds_null(self) -> bool {
        // Utf8/Ascii text never legitimately contains an embedded NUL
        // byte unless the string itself does, which autosizing forbids
        // anyway; Utf16 code units routinely have a zero high or low
        // byte, which collides with the autosize terminator.
        matches!(self, Encoding::Utf16)
    }
}

/// What to do when bytes can't be decoded under the declared `encoding`,
/// or text can't be encoded into it (e.g. non-ASCII text into `Ascii`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncErrors {
    /// Fail the operation with [`crate::error::Error::CoerceError`].
    Strict,
    /// Substitute the Unicode replacement character / ASCII `?`.
    Replace,
    /// Drop the offending byte(s)/character(s) silently.
    Ignore,
}

impl Default for EncErrors {
    fn default() -> Self {
        EncErrors::Strict
    }
}
