//! The native engine control seam.
//!
//! [`Engine`] is the narrow surface the session drives: every method mirrors
//! one native call and reports the native status code verbatim (zero means
//! success). The session layer owns the translation of non-zero codes into
//! typed errors, and the state machine that decides when each call is legal.
//!
//! The real FFI-backed implementation lives behind the `ffi` cargo feature;
//! tests drive the session with a mock.

use crate::decode::Dispatcher;

/// Demodulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Fm,
    Am,
}

impl Mode {
    /// The native enumerant (`NRSC5_MODE_*`).
    pub fn to_native(self) -> i32 {
        match self {
            Mode::Fm => 0,
            Mode::Am => 1,
        }
    }
}

/// Low-level control surface over one opened native handle.
///
/// Implementations are created already-open by their transport-specific
/// constructors and release the handle on drop. Methods returning `i32`
/// forward the native status code; calls that are `void` at the native layer
/// return zero.
pub trait Engine: Send {
    /// Registers the decode/dispatch pipeline invoked from the engine's
    /// callback thread. Must be called before [`Engine::start`].
    fn install_dispatcher(&mut self, dispatcher: Dispatcher);

    fn start(&mut self);
    fn stop(&mut self);

    fn set_frequency(&mut self, hz: f32) -> i32;
    fn set_gain(&mut self, db: f32) -> i32;
    fn set_auto_gain(&mut self, enabled: bool) -> i32;
    fn set_mode(&mut self, mode: Mode) -> i32;
    fn set_bias_tee(&mut self, enabled: bool) -> i32;
    fn set_direct_sampling(&mut self, enabled: bool) -> i32;
    fn set_freq_correction(&mut self, ppm: i32) -> i32;

    /// Feeds raw IQ bytes when the pipe transport is active. Length
    /// validation happens in the session layer before this is reached.
    fn pipe_samples(&mut self, samples: &[u8]) -> i32;
}

#[cfg(feature = "ffi")]
pub use ffi::FfiEngine;

#[cfg(feature = "ffi")]
mod ffi {
    use std::os::raw::{c_int, c_void};
    use std::ptr;

    use tracing::debug;

    use super::{Engine, Mode};
    use crate::abi::{RawEvent, sys};
    use crate::decode::Dispatcher;
    use crate::error::{Error, Result};

    /// Trampoline the native engine invokes on its own thread. `opaque` is
    /// the boxed [`Dispatcher`] installed below; the box keeps its address
    /// stable for the lifetime of the engine.
    unsafe extern "C" fn dispatch_trampoline(event: *const RawEvent, opaque: *mut c_void) {
        if opaque.is_null() {
            return;
        }
        let dispatcher = &mut *(opaque as *mut Dispatcher);
        dispatcher.dispatch(event);
    }

    /// [`Engine`] implementation backed by `libnrsc5`.
    pub struct FfiEngine {
        handle: *mut sys::NativeHandle,
        dispatcher: Option<Box<Dispatcher>>,
    }

    // The native handle is only ever driven from the thread owning the
    // session; the engine's own threads call back through the trampoline.
    unsafe impl Send for FfiEngine {}

    impl FfiEngine {
        /// Opens local RTL-SDR hardware by device index.
        pub fn open_device(device_index: i32, ppm_error: i32) -> Result<Box<Self>> {
            let mut handle = ptr::null_mut();
            let rc = unsafe { sys::nrsc5_open(&mut handle, device_index, ppm_error) };
            if rc != 0 || handle.is_null() {
                return Err(Error::Open {
                    transport: "device",
                    code: rc,
                });
            }
            debug!(device_index, "opened native device transport");
            Ok(Box::new(Self {
                handle,
                dispatcher: None,
            }))
        }

        /// Opens the sample-injection pipe transport for offline replay.
        pub fn open_pipe() -> Result<Box<Self>> {
            let mut handle = ptr::null_mut();
            let rc = unsafe { sys::nrsc5_open_pipe(&mut handle) };
            if rc != 0 || handle.is_null() {
                return Err(Error::Open {
                    transport: "pipe",
                    code: rc,
                });
            }
            Ok(Box::new(Self {
                handle,
                dispatcher: None,
            }))
        }

        /// Connects to a remote rtl_tcp tuner and hands the socket to the
        /// engine.
        #[cfg(unix)]
        pub fn open_rtltcp(addr: &str) -> Result<Box<Self>> {
            use std::net::TcpStream;
            use std::os::unix::io::IntoRawFd;

            let stream = TcpStream::connect(addr).map_err(|e| {
                debug!(addr, error = %e, "rtl_tcp connect failed");
                Error::Open {
                    transport: "rtltcp",
                    code: -1,
                }
            })?;
            stream.set_nodelay(true)?;

            let fd = stream.into_raw_fd();
            let mut handle = ptr::null_mut();
            let rc = unsafe { sys::nrsc5_open_rtltcp(&mut handle, fd) };
            if rc != 0 || handle.is_null() {
                return Err(Error::Open {
                    transport: "rtltcp",
                    code: rc,
                });
            }
            debug!(addr, "opened rtl_tcp transport");
            Ok(Box::new(Self {
                handle,
                dispatcher: None,
            }))
        }
    }

    impl Engine for FfiEngine {
        fn install_dispatcher(&mut self, dispatcher: Dispatcher) {
            let boxed = Box::new(dispatcher);
            let opaque = &*boxed as *const Dispatcher as *mut c_void;
            unsafe {
                sys::nrsc5_set_callback(self.handle, Some(dispatch_trampoline), opaque);
            }
            self.dispatcher = Some(boxed);
        }

        fn start(&mut self) {
            unsafe { sys::nrsc5_start(self.handle) }
        }

        fn stop(&mut self) {
            unsafe { sys::nrsc5_stop(self.handle) }
        }

        fn set_frequency(&mut self, hz: f32) -> i32 {
            unsafe { sys::nrsc5_set_frequency(self.handle, hz) }
        }

        fn set_gain(&mut self, db: f32) -> i32 {
            unsafe { sys::nrsc5_set_gain(self.handle, db) }
        }

        fn set_auto_gain(&mut self, enabled: bool) -> i32 {
            unsafe { sys::nrsc5_set_auto_gain(self.handle, enabled as c_int) };
            0
        }

        fn set_mode(&mut self, mode: Mode) -> i32 {
            unsafe { sys::nrsc5_set_mode(self.handle, mode.to_native()) }
        }

        fn set_bias_tee(&mut self, enabled: bool) -> i32 {
            unsafe { sys::nrsc5_set_bias_tee(self.handle, enabled as c_int) }
        }

        fn set_direct_sampling(&mut self, enabled: bool) -> i32 {
            unsafe { sys::nrsc5_set_direct_sampling(self.handle, enabled as c_int) }
        }

        fn set_freq_correction(&mut self, ppm: i32) -> i32 {
            unsafe { sys::nrsc5_set_freq_correction(self.handle, ppm) }
        }

        fn pipe_samples(&mut self, samples: &[u8]) -> i32 {
            unsafe {
                sys::nrsc5_pipe_samples(self.handle, samples.as_ptr(), samples.len() as u32)
            }
        }
    }

    impl Drop for FfiEngine {
        fn drop(&mut self) {
            if !self.handle.is_null() {
                // Detach the callback before the dispatcher box is freed.
                unsafe {
                    sys::nrsc5_set_callback(self.handle, None, ptr::null_mut());
                    sys::nrsc5_close(self.handle);
                }
                self.handle = ptr::null_mut();
            }
        }
    }
}
