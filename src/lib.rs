//! Client library for the NRSC-5 ("HD Radio") demodulation engine.
//!
//! The crate mirrors the engine's layering: [`abi`] declares the raw
//! callback record exactly as the native library lays it out, [`decode`]
//! turns one raw record into at most one owned [`event::Event`], and
//! [`session::Session`] owns the engine handle and its lifecycle. The
//! [`registry::ServiceRegistry`] tracks the current service/component graph
//! so stream, packet, and file events resolve back to the service that
//! produced them. [`audio`] and [`output`] are the receiving end: a bounded
//! audio queue with pluggable sinks, plus HDC and AAS file dumps.
//!
//! Linking against `libnrsc5` is optional and gated behind the `ffi` cargo
//! feature; without it the session layer still works against any
//! [`engine::Engine`] implementation.

pub mod abi;
pub mod audio;
pub mod decode;
pub mod engine;
pub mod error;
pub mod event;
pub mod output;
pub mod registry;
pub mod session;

pub use error::{Error, Result};
pub use event::Event;
pub use session::{SampleFormat, Session, SessionState, Transport};
