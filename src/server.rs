//! A blocking request-handler dispatch skeleton built atop
//! `std::net`'s stream/datagram sockets (`spec.md` §6): feeds each
//! accepted connection through a [`crate::dispatch::Namespace`] and
//! routes the decoded record to a user-supplied [`Handler`]. This is
//! explicitly not the hard core -- no async runtime is pulled in for it,
//! matching `spec.md`'s framing of the handler dispatch as an external
//! collaborator rather than part of the codec engine.

use std::io::Write;
use std::net::{TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use crate::dispatch::{Namespace, Outcome};
use crate::error::Warnings;
use crate::schema::RecordInstance;
use crate::{casing, logging};

/// What a [`Handler`] wants done after processing one record.
pub enum HandlerOutcome {
    /// Serialize and send this instance back (serialized by the schema
    /// the caller already resolved).
    Reply(RecordInstance),
    /// Send these octets back verbatim, with no further encoding.
    RawReply(Vec<u8>),
    /// Send nothing.
    NoReply,
}

/// Implemented by the application code that reacts to decoded records.
/// `record_name` has already been mapped from the schema name through
/// [`casing::to_handler_name`] by the dispatch loop, so implementations
/// can match on it directly; `reply` is an explicit sink a handler may
/// call any number of times for multi-reply protocols, independent of
/// the single [`HandlerOutcome`] it finally returns.
pub trait Handler: Send + Sync {
    /// Reacts to one decoded record, returning what (if anything) should
    /// be sent back on the connection/datagram it arrived on.
    fn handle(
        &self,
        record_name: &str,
        instance: RecordInstance,
        reply: &mut dyn FnMut(&[u8]),
    ) -> HandlerOutcome;
}

/// Runs a blocking TCP accept loop on `addr`: one thread per connection,
/// each decoding a sequence of framed records off the stream via
/// `namespace` and dispatching to `handler`.
pub fn serve_tcp<H, A>(addr: A, namespace: Arc<Namespace>, handler: Arc<H>) -> std::io::Result<()>
where
    H: Handler + 'static,
    A: ToSocketAddrs,
{
    let listener = TcpListener::bind(addr)?;
    for stream in listener.incoming() {
        let stream = stream?;
        let namespace = Arc::clone(&namespace);
        let handler = Arc::clone(&handler);
        std::thread::spawn(move || {
            if let Err(e) = serve_tcp_connection(stream, &namespace, handler.as_ref()) {
                log::error!(target: "framewire::server", "connection error: {e}");
            }
        });
    }
    Ok(())
}

fn serve_tcp_connection(
    mut stream: TcpStream,
    namespace: &Namespace,
    handler: &(impl Handler + ?Sized),
) -> std::io::Result<()> {
    loop {
        let mut warnings = Warnings::new();
        match namespace.parse(&mut stream, &mut warnings) {
            Ok(Outcome::Empty) => return Ok(()),
            Ok(Outcome::Incomplete) => return Ok(()),
            Ok(Outcome::RawUnrecognized(bytes)) => {
                logging::raw("recv unrecognized", &bytes);
                continue;
            }
            Ok(Outcome::Instance(instance)) => {
                for w in &warnings {
                    log::warn!(target: "framewire::warning", "{w}");
                }
                let schema = Arc::clone(instance.schema());
                let handler_name = casing::to_handler_name(schema.name());
                logging::record(&handler_name, &instance);
                let outcome = handler.handle(&handler_name, instance, &mut |bytes| {
                    let _ = stream.write_all(bytes);
                });
                match outcome {
                    HandlerOutcome::NoReply => {}
                    HandlerOutcome::RawReply(bytes) => {
                        stream.write_all(&bytes)?;
                    }
                    HandlerOutcome::Reply(reply_instance) => {
                        let mut warnings = Warnings::new();
                        match schema.serialize(&reply_instance, &mut warnings) {
                            Ok(bytes) => stream.write_all(&bytes)?,
                            Err(e) => logging::error("serializing reply", &e),
                        }
                    }
                }
            }
            Err(e) => {
                logging::error("decoding record", &e);
                return Ok(());
            }
        }
    }
}

/// Runs a blocking UDP receive loop on `addr`, dispatching each datagram
/// (treated as one in-memory buffer) through `namespace` to `handler`.
pub fn serve_udp<H, A>(addr: A, namespace: Arc<Namespace>, handler: Arc<H>) -> std::io::Result<()>
where
    H: Handler + 'static,
    A: ToSocketAddrs,
{
    let socket = UdpSocket::bind(addr)?;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let (n, peer) = socket.recv_from(&mut buf)?;
        let mut warnings = Warnings::new();
        match namespace.parse_buffer(&buf[..n], &mut warnings) {
            Ok((Outcome::Instance(instance), _consumed)) => {
                for w in &warnings {
                    log::warn!(target: "framewire::warning", "{w}");
                }
                let schema = Arc::clone(instance.schema());
                let handler_name = casing::to_handler_name(schema.name());
                logging::record(&handler_name, &instance);
                let outcome = handler.handle(&handler_name, instance, &mut |bytes| {
                    let _ = socket.send_to(bytes, peer);
                });
                match outcome {
                    HandlerOutcome::NoReply => {}
                    HandlerOutcome::RawReply(bytes) => {
                        socket.send_to(&bytes, peer)?;
                    }
                    HandlerOutcome::Reply(reply_instance) => {
                        let mut warnings = Warnings::new();
                        match schema.serialize(&reply_instance, &mut warnings) {
                            Ok(bytes) => {
                                socket.send_to(&bytes, peer)?;
                            }
                            Err(e) => logging::error("serializing reply", &e),
                        }
                    }
                }
            }
            Ok((Outcome::RawUnrecognized(bytes), _)) => {
                logging::raw("recv unrecognized", &bytes);
            }
            Ok((Outcome::Empty | Outcome::Incomplete, _)) => {}
            Err(e) => logging::error("decoding datagram", &e),
        }
    }
}
