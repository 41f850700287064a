//! Session lifecycle over the native engine.
//!
//! A [`Session`] exclusively owns one opened engine handle and enforces the
//! `Closed → Open → Started` state machine: every operation other than open
//! requires a live handle, `start` must not be called twice without an
//! intervening `stop`, and `close` invalidates the handle so any later call
//! fails deterministically with [`Error::InvalidState`] instead of touching
//! freed native memory.

use std::fmt;

use tracing::info;

use crate::decode::Dispatcher;
use crate::engine::{Engine, Mode};
use crate::error::{Error, Result};
use crate::event::Event;

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
    Started,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Closed => "closed",
            SessionState::Open => "open",
            SessionState::Started => "started",
        })
    }
}

/// Which of the three mutually exclusive transports this session opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Local hardware by device index.
    Device,
    /// Byte-stream pipe for offline sample replay.
    Pipe,
    /// Remote tuner over rtl_tcp.
    Rtltcp,
}

/// Sample encodings accepted by [`Session::pipe_samples`]. Both encodings
/// use a 4-byte frame: two interleaved 8-bit unsigned I/Q pairs, or one
/// interleaved 16-bit signed I/Q pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit unsigned interleaved I/Q.
    Cu8,
    /// 16-bit signed interleaved I/Q.
    Cs16,
}

impl SampleFormat {
    /// Injection buffers must be a whole multiple of this.
    pub fn frame_bytes(self) -> usize {
        match self {
            SampleFormat::Cu8 | SampleFormat::Cs16 => 4,
        }
    }
}

/// One receiver session over an opened engine handle.
pub struct Session {
    engine: Option<Box<dyn Engine>>,
    transport: Transport,
    state: SessionState,
}

impl Session {
    /// Wraps an already-opened engine. The transport-specific constructors
    /// below are the usual entry points when linking the native library.
    pub fn open(engine: Box<dyn Engine>, transport: Transport) -> Self {
        info!(?transport, "session opened");
        Self {
            engine: Some(engine),
            transport,
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    fn engine_for(&mut self, operation: &'static str) -> Result<&mut dyn Engine> {
        let state = self.state;
        match self.engine.as_mut() {
            Some(engine) if state != SessionState::Closed => Ok(engine.as_mut()),
            _ => Err(Error::InvalidState { operation, state }),
        }
    }

    fn configure(
        &mut self,
        parameter: &'static str,
        call: impl FnOnce(&mut dyn Engine) -> i32,
    ) -> Result<()> {
        let engine = self.engine_for(parameter)?;
        match call(engine) {
            0 => Ok(()),
            code => Err(Error::Configuration { parameter, code }),
        }
    }

    /// Installs the handler that receives every decoded event, on the
    /// engine's callback thread. Install before [`Session::start`].
    pub fn set_handler(&mut self, handler: impl FnMut(Event) + Send + 'static) -> Result<()> {
        let dispatcher = Dispatcher::new(handler);
        self.engine_for("set_handler")?.install_dispatcher(dispatcher);
        Ok(())
    }

    pub fn set_frequency(&mut self, hz: f32) -> Result<()> {
        self.configure("frequency", |e| e.set_frequency(hz))
    }

    pub fn set_gain(&mut self, db: f32) -> Result<()> {
        self.configure("gain", |e| e.set_gain(db))
    }

    pub fn set_auto_gain(&mut self, enabled: bool) -> Result<()> {
        self.configure("auto gain", |e| e.set_auto_gain(enabled))
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.configure("mode", |e| e.set_mode(mode))
    }

    pub fn set_bias_tee(&mut self, enabled: bool) -> Result<()> {
        self.configure("bias tee", |e| e.set_bias_tee(enabled))
    }

    pub fn set_direct_sampling(&mut self, enabled: bool) -> Result<()> {
        self.configure("direct sampling", |e| e.set_direct_sampling(enabled))
    }

    pub fn set_freq_correction(&mut self, ppm: i32) -> Result<()> {
        self.configure("frequency correction", |e| e.set_freq_correction(ppm))
    }

    /// Starts demodulation. The native layer does not guarantee idempotence,
    /// so a second `start` without an intervening `stop` is rejected here.
    pub fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Open {
            return Err(Error::InvalidState {
                operation: "start",
                state: self.state,
            });
        }
        self.engine_for("start")?.start();
        self.state = SessionState::Started;
        info!("session started");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if self.state != SessionState::Started {
            return Err(Error::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }
        self.engine_for("stop")?.stop();
        self.state = SessionState::Open;
        info!("session stopped");
        Ok(())
    }

    /// Feeds raw IQ bytes to the demodulator. Only valid on the pipe
    /// transport, and only for buffers that are a whole multiple of the
    /// encoding's frame size.
    pub fn pipe_samples(&mut self, format: SampleFormat, samples: &[u8]) -> Result<()> {
        if self.transport != Transport::Pipe {
            return Err(Error::InvalidState {
                operation: "pipe_samples",
                state: self.state,
            });
        }
        let frame = format.frame_bytes();
        if samples.len() % frame != 0 {
            return Err(Error::InvalidInput(format!(
                "sample buffer of {} bytes is not a multiple of the {frame}-byte {format:?} frame",
                samples.len()
            )));
        }
        let engine = self.engine_for("pipe_samples")?;
        match engine.pipe_samples(samples) {
            0 => Ok(()),
            code => Err(Error::InvalidInput(format!(
                "engine rejected sample buffer (native error {code})"
            ))),
        }
    }

    /// Releases the native handle. The session transitions to `Closed` and
    /// every subsequent call fails with [`Error::InvalidState`]; a second
    /// `close` is such a call, never a double free.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::InvalidState {
                operation: "close",
                state: self.state,
            });
        }
        if self.state == SessionState::Started {
            if let Some(engine) = self.engine.as_mut() {
                engine.stop();
            }
        }
        // Dropping the engine releases the native handle.
        self.engine = None;
        self.state = SessionState::Closed;
        info!("session closed");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            let _ = self.close();
        }
    }
}

#[cfg(feature = "ffi")]
impl Session {
    /// Opens local hardware by device index.
    pub fn open_device(device_index: i32, ppm_error: i32) -> Result<Self> {
        let engine = crate::engine::FfiEngine::open_device(device_index, ppm_error)?;
        Ok(Self::open(engine, Transport::Device))
    }

    /// Opens the sample-injection pipe for offline replay.
    pub fn open_pipe() -> Result<Self> {
        Ok(Self::open(
            crate::engine::FfiEngine::open_pipe()?,
            Transport::Pipe,
        ))
    }

    /// Connects to a remote rtl_tcp tuner.
    #[cfg(unix)]
    pub fn open_rtltcp(addr: &str) -> Result<Self> {
        Ok(Self::open(
            crate::engine::FfiEngine::open_rtltcp(addr)?,
            Transport::Rtltcp,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records calls and returns a scripted status code per parameter.
    struct MockEngine {
        calls: Arc<Mutex<Vec<String>>>,
        fail: Option<(&'static str, i32)>,
    }

    impl MockEngine {
        fn boxed() -> (Box<Self>, Arc<Mutex<Vec<String>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            (
                Box::new(Self {
                    calls: calls.clone(),
                    fail: None,
                }),
                calls,
            )
        }

        fn failing(call: &'static str, code: i32) -> Box<Self> {
            Box::new(Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                fail: Some((call, code)),
            })
        }

        fn record(&self, name: &str) -> i32 {
            self.calls.lock().unwrap().push(name.to_string());
            match self.fail {
                Some((failing, code)) if failing == name => code,
                _ => 0,
            }
        }
    }

    impl Engine for MockEngine {
        fn install_dispatcher(&mut self, _dispatcher: Dispatcher) {
            self.record("install_dispatcher");
        }
        fn start(&mut self) {
            self.record("start");
        }
        fn stop(&mut self) {
            self.record("stop");
        }
        fn set_frequency(&mut self, _hz: f32) -> i32 {
            self.record("set_frequency")
        }
        fn set_gain(&mut self, _db: f32) -> i32 {
            self.record("set_gain")
        }
        fn set_auto_gain(&mut self, _enabled: bool) -> i32 {
            self.record("set_auto_gain")
        }
        fn set_mode(&mut self, _mode: Mode) -> i32 {
            self.record("set_mode")
        }
        fn set_bias_tee(&mut self, _enabled: bool) -> i32 {
            self.record("set_bias_tee")
        }
        fn set_direct_sampling(&mut self, _enabled: bool) -> i32 {
            self.record("set_direct_sampling")
        }
        fn set_freq_correction(&mut self, _ppm: i32) -> i32 {
            self.record("set_freq_correction")
        }
        fn pipe_samples(&mut self, _samples: &[u8]) -> i32 {
            self.record("pipe_samples")
        }
    }

    #[test]
    fn lifecycle_transitions() {
        let (engine, calls) = MockEngine::boxed();
        let mut session = Session::open(engine, Transport::Device);
        assert_eq!(session.state(), SessionState::Open);

        session.set_frequency(90.5e6).unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Started);

        // start is not idempotent at the native layer; reject a second one.
        assert!(matches!(
            session.start(),
            Err(Error::InvalidState {
                operation: "start",
                ..
            })
        ));

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert!(matches!(session.stop(), Err(Error::InvalidState { .. })));

        assert_eq!(
            calls.lock().unwrap().as_slice(),
            &["set_frequency", "start", "stop"]
        );
    }

    #[test]
    fn close_is_terminal_and_not_a_double_free() {
        let (engine, calls) = MockEngine::boxed();
        let mut session = Session::open(engine, Transport::Device);
        session.start().unwrap();

        session.close().unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        // close() on a started session stops the engine first.
        assert_eq!(calls.lock().unwrap().as_slice(), &["start", "stop"]);

        // The second close fails; the engine is already gone.
        assert!(matches!(
            session.close(),
            Err(Error::InvalidState {
                operation: "close",
                state: SessionState::Closed,
            })
        ));

        // And every other operation fails the same way.
        assert!(matches!(
            session.set_frequency(88.1e6),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(session.start(), Err(Error::InvalidState { .. })));
    }

    #[test]
    fn configuration_failure_names_the_parameter() {
        let mut session = Session::open(MockEngine::failing("set_gain", -3), Transport::Device);
        session.set_frequency(90.5e6).unwrap();
        match session.set_gain(19.7) {
            Err(Error::Configuration {
                parameter: "gain",
                code: -3,
            }) => {}
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn pipe_samples_validates_frame_size() {
        let (engine, calls) = MockEngine::boxed();
        let mut session = Session::open(engine, Transport::Pipe);

        // Whole multiples of the 4-byte frame are accepted.
        session.pipe_samples(SampleFormat::Cu8, &[0u8; 32768]).unwrap();
        session.pipe_samples(SampleFormat::Cs16, &[0u8; 4]).unwrap();
        session.pipe_samples(SampleFormat::Cu8, &[]).unwrap();

        // Anything else is rejected before reaching the engine.
        assert!(matches!(
            session.pipe_samples(SampleFormat::Cu8, &[0u8; 6]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            session.pipe_samples(SampleFormat::Cs16, &[0u8; 13]),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(
            calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| *c == "pipe_samples")
                .count(),
            3
        );
    }

    #[test]
    fn pipe_samples_requires_pipe_transport() {
        let (engine, _) = MockEngine::boxed();
        let mut session = Session::open(engine, Transport::Device);
        assert!(matches!(
            session.pipe_samples(SampleFormat::Cu8, &[0u8; 4]),
            Err(Error::InvalidState {
                operation: "pipe_samples",
                ..
            })
        ));
    }

    #[test]
    fn native_rejection_of_samples_is_invalid_input() {
        let mut session = Session::open(
            MockEngine::failing("pipe_samples", -9),
            Transport::Pipe,
        );
        assert!(matches!(
            session.pipe_samples(SampleFormat::Cu8, &[0u8; 8]),
            Err(Error::InvalidInput(_))
        ));
    }
}
