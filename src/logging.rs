//! The five-stream logger facade consumed by [`crate::server`] and
//! [`crate::hexdump`]. `spec.md` §6 describes five independent streams
//! (`hex`, `raw`, `struct`, `error`, `stack`); here each is a distinct
//! `log` target rather than a distinct file handle, so a consumer wires
//! them up (or filters them apart) with their own `log`/`tracing`
//! subscriber instead of this crate doing file I/O on their behalf. The
//! codec engine itself never calls into this module -- only the ambient
//! `server`/`hexdump` collaborators do.

/// Logs the hex-dump of a just-received or just-sent buffer.
pub fn hex(direction: &str, bytes: &[u8]) {
    log::debug!(target: "framewire::log::hex", "{direction}\n{}", crate::hexdump::dump(bytes));
}

/// Logs the raw octets of a buffer, undecorated.
pub fn raw(direction: &str, bytes: &[u8]) {
    log::trace!(target: "framewire::log::raw", "{direction} {} byte(s): {bytes:02x?}", bytes.len());
}

/// Logs a decoded record instance.
pub fn record(name: &str, instance: &crate::schema::RecordInstance) {
    log::info!(target: "framewire::log::struct", "{name} {instance:?}");
}

/// Logs an error encountered while handling a connection or message.
pub fn error(context: &str, err: &crate::error::Error) {
    log::error!(target: "framewire::log::error", "{context}: {err}");
}

/// Logs a handler panic/unwind, with as much of a backtrace as is
/// available.
pub fn stack(context: &str, payload: &str) {
    log::error!(target: "framewire::log::stack", "{context}: {payload}");
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercises all five log targets against a real subscriber
    // (`env_logger`), the way a consumer would actually see them
    // separated, rather than asserting on an internal buffer.
    #[test]
    fn all_five_streams_log_without_panicking() {
        let _ = env_logger::builder().is_test(true).try_init();
        hex("recv", b"\x01\x02");
        raw("recv", b"\x01\x02");
        let schema = crate::schema::SchemaBuilder::new("Ping").build().unwrap();
        let mut warnings = Vec::new();
        let instance = crate::schema::RecordInstance::new(schema, vec![], &mut warnings).unwrap();
        record("ping", &instance);
        error("decoding", &crate::error::Error::VariableSize { schema: "Ping".into() });
        stack("handler panic", "payload");
    }
}
