//! Raw C ABI mirror of the native engine's event structures.
//!
//! Everything here reproduces the layout `libnrsc5` hands to the registered
//! callback: a tag-first event struct whose payload is a union, with nested
//! singly linked lists that always place the `next` pointer first. Nothing in
//! this module owns memory; all pointers reference engine-owned buffers that
//! are only valid for the duration of one callback invocation. The safe,
//! owned representation lives in [`crate::event`] and the translation in
//! [`crate::decode`].
//!
//! Sentinel conventions carried by the native layer:
//! - null pointer: absent for any pointer field
//! - `-1`: absent for signed index fields (XHDR param/lot, alert categories,
//!   location format, sync PSMI)
//! - `NaN`: absent for geographic coordinates

use std::os::raw::{c_char, c_int, c_uint, c_void};

/// Event tags, matching the native `NRSC5_EVENT_*` enum order. The tag space
/// is open: tags beyond the ones listed here are ignored by the decoder, never
/// treated as an error.
pub const EVENT_LOST_DEVICE: c_uint = 0;
pub const EVENT_IQ: c_uint = 1;
pub const EVENT_SYNC: c_uint = 2;
pub const EVENT_LOST_SYNC: c_uint = 3;
pub const EVENT_MER: c_uint = 4;
pub const EVENT_BER: c_uint = 5;
pub const EVENT_HDC: c_uint = 6;
pub const EVENT_AUDIO: c_uint = 7;
pub const EVENT_ID3: c_uint = 8;
pub const EVENT_SIG: c_uint = 9;
pub const EVENT_LOT: c_uint = 10;
pub const EVENT_STREAM: c_uint = 11;
pub const EVENT_PACKET: c_uint = 12;
pub const EVENT_LOT_HEADER: c_uint = 13;
pub const EVENT_LOT_FRAGMENT: c_uint = 14;
pub const EVENT_STATION_ID: c_uint = 15;
pub const EVENT_STATION_NAME: c_uint = 16;
pub const EVENT_STATION_SLOGAN: c_uint = 17;
pub const EVENT_STATION_MESSAGE: c_uint = 18;
pub const EVENT_STATION_LOCATION: c_uint = 19;
pub const EVENT_AUDIO_SERVICE_DESCRIPTORS: c_uint = 20;
pub const EVENT_DATA_SERVICE_DESCRIPTORS: c_uint = 21;
pub const EVENT_AUDIO_SERVICE: c_uint = 22;
pub const EVENT_EMERGENCY_ALERT: c_uint = 23;

/// SIG component discriminants (`NRSC5_SIG_COMPONENT_*`).
pub const SIG_COMPONENT_AUDIO: u8 = 0;
pub const SIG_COMPONENT_DATA: u8 = 1;

/// SIG service discriminants (`NRSC5_SIG_SERVICE_*`).
pub const SIG_SERVICE_AUDIO: u8 = 0;
pub const SIG_SERVICE_DATA: u8 = 1;

/// Audio-typed SIG component payload.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSigAudioComponent {
    pub port: u8,
    pub kind: u8,
    pub mime: u32,
}

/// Data-typed SIG component payload.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSigDataComponent {
    pub port: u16,
    pub service_data_type: u16,
    pub kind: u8,
    pub mime: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union RawSigComponentUnion {
    pub audio: RawSigAudioComponent,
    pub data: RawSigDataComponent,
}

/// One node of the SIG component list. Which union arm is live is decided by
/// `kind` alone; reading the other arm is undefined.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSigComponent {
    pub next: *const RawSigComponent,
    pub kind: u8,
    pub id: u8,
    pub u: RawSigComponentUnion,
}

/// One node of the SIG service list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSigService {
    pub next: *const RawSigService,
    pub kind: u8,
    pub number: u16,
    pub name: *const c_char,
    pub components: *const RawSigComponent,
}

/// Broken-down calendar time as the engine reports it (`struct tm` layout):
/// `year` counts from 1900 and `month` is zero-based.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawTime {
    pub sec: c_int,
    pub min: c_int,
    pub hour: c_int,
    pub mday: c_int,
    pub mon: c_int,
    pub year: c_int,
    pub wday: c_int,
    pub yday: c_int,
    pub isdst: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawIq {
    pub data: *const c_void,
    pub count: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSync {
    pub freq_offset: f32,
    /// Primary service mode; `-1` when not yet known.
    pub psmi: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawMer {
    pub lower: f32,
    pub upper: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawBer {
    pub cber: f32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawHdc {
    pub program: c_uint,
    pub data: *const u8,
    pub count: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawAudio {
    pub program: c_uint,
    pub data: *const i16,
    pub count: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawUfid {
    pub owner: *const c_char,
    pub id: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawXhdr {
    pub mime: u32,
    pub param: c_int,
    pub lot: c_int,
}

/// One node of the ID3 comment list (COMM frames).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawId3Comment {
    pub next: *const RawId3Comment,
    pub lang: *const c_char,
    pub short_content_desc: *const c_char,
    pub full_text: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawId3 {
    pub program: c_uint,
    pub title: *const c_char,
    pub artist: *const c_char,
    pub album: *const c_char,
    pub genre: *const c_char,
    pub ufid: RawUfid,
    pub xhdr: RawXhdr,
    pub comments: *const RawId3Comment,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSig {
    pub services: *const RawSigService,
}

/// STREAM and PACKET data units share this shape. `service` and `component`
/// point back into the engine's SIG graph; the decoder resolves them through
/// the session's service registry, never by retaining the pointers.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawDataUnit {
    pub port: u16,
    pub seq: u16,
    pub size: c_uint,
    pub mime: u32,
    pub data: *const u8,
    pub service: *const RawSigService,
    pub component: *const RawSigComponent,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawLot {
    pub port: u16,
    pub lot: c_uint,
    pub size: c_uint,
    pub mime: u32,
    pub name: *const c_char,
    pub data: *const u8,
    pub expiry: *const RawTime,
    pub service: *const RawSigService,
    pub component: *const RawSigComponent,
}

/// Announces an incoming LOT object before any data has arrived.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawLotHeader {
    pub port: u16,
    pub lot: c_uint,
    pub size: c_uint,
    pub mime: u32,
    pub name: *const c_char,
    pub expiry: *const RawTime,
    pub service: *const RawSigService,
    pub component: *const RawSigComponent,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawLotFragment {
    pub port: u16,
    pub lot: c_uint,
    pub seq: c_uint,
    /// Non-zero when this fragment repeats data already delivered.
    pub repeat: c_int,
    pub size: c_uint,
    pub data: *const u8,
    pub service: *const RawSigService,
    pub component: *const RawSigComponent,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStationId {
    pub country_code: *const c_char,
    pub fcc_facility_id: c_int,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStationName {
    pub name: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStationSlogan {
    pub slogan: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStationMessage {
    pub message: *const c_char,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawStationLocation {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: c_int,
}

/// One node of the SIS audio service descriptor list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSisAsd {
    pub next: *const RawSisAsd,
    pub program: c_uint,
    pub access: c_uint,
    pub kind: c_uint,
    pub sound_exp: c_uint,
}

/// One node of the SIS data service descriptor list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawSisDsd {
    pub next: *const RawSisDsd,
    pub access: c_uint,
    pub kind: c_uint,
    pub mime_type: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawAsdList {
    pub audio_services: *const RawSisAsd,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawDsdList {
    pub data_services: *const RawSisDsd,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawAudioService {
    pub program: c_uint,
    pub access: c_uint,
    pub kind: c_uint,
    pub codec_mode: c_uint,
}

/// One node of the alert location list.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawAlertLocation {
    pub next: *const RawAlertLocation,
    pub id: c_int,
}

/// Emergency alert. A null `message` means the alert has ended, not an error.
/// Categories use `0`/negative as "absent"; `location_format` uses `-1`.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawAlert {
    pub message: *const c_char,
    pub category1: c_int,
    pub category2: c_int,
    pub location_format: c_int,
    pub locations: *const RawAlertLocation,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union RawEventUnion {
    pub iq: RawIq,
    pub sync: RawSync,
    pub mer: RawMer,
    pub ber: RawBer,
    pub hdc: RawHdc,
    pub audio: RawAudio,
    pub id3: RawId3,
    pub sig: RawSig,
    pub lot: RawLot,
    pub lot_header: RawLotHeader,
    pub lot_fragment: RawLotFragment,
    pub stream: RawDataUnit,
    pub packet: RawDataUnit,
    pub station_id: RawStationId,
    pub station_name: RawStationName,
    pub station_slogan: RawStationSlogan,
    pub station_message: RawStationMessage,
    pub station_location: RawStationLocation,
    pub asd: RawAsdList,
    pub dsd: RawDsdList,
    pub audio_service: RawAudioService,
    pub alert: RawAlert,
    /// Placeholder so tag-only events (SYNC/LOST_SYNC/LOST_DEVICE) can be
    /// constructed without naming a payload arm.
    pub none: [u8; 0],
}

/// The tagged event record as delivered to the native callback. The tag comes
/// first; which union arm is live is decided by the tag alone.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct RawEvent {
    pub event: c_uint,
    pub u: RawEventUnion,
}

impl RawEvent {
    /// An event with no payload. Used for tag-only events and by tests.
    pub fn tag_only(event: c_uint) -> Self {
        RawEvent {
            event,
            u: RawEventUnion { none: [] },
        }
    }
}

/// Signature of the callback the engine invokes, on a thread it owns, once
/// per event. Invocations are never concurrent.
pub type RawCallback = unsafe extern "C" fn(event: *const RawEvent, opaque: *mut c_void);

/// Direct bindings to `libnrsc5`. Only compiled when linking against the
/// native engine is requested; the rest of the crate is testable without it.
#[cfg(feature = "ffi")]
pub mod sys {
    use super::{RawCallback, c_int, c_uint, c_void};

    /// Opaque session handle owned by the native engine.
    #[repr(C)]
    pub struct NativeHandle {
        _private: [u8; 0],
    }

    #[link(name = "nrsc5")]
    extern "C" {
        pub fn nrsc5_open(result: *mut *mut NativeHandle, device_index: c_int, ppm_error: c_int) -> c_int;
        pub fn nrsc5_open_pipe(result: *mut *mut NativeHandle) -> c_int;
        pub fn nrsc5_open_rtltcp(result: *mut *mut NativeHandle, socket: c_int) -> c_int;
        pub fn nrsc5_close(handle: *mut NativeHandle);
        pub fn nrsc5_start(handle: *mut NativeHandle);
        pub fn nrsc5_stop(handle: *mut NativeHandle);
        pub fn nrsc5_set_mode(handle: *mut NativeHandle, mode: c_int) -> c_int;
        pub fn nrsc5_set_bias_tee(handle: *mut NativeHandle, on: c_int) -> c_int;
        pub fn nrsc5_set_direct_sampling(handle: *mut NativeHandle, on: c_int) -> c_int;
        pub fn nrsc5_set_freq_correction(handle: *mut NativeHandle, ppm_error: c_int) -> c_int;
        pub fn nrsc5_set_frequency(handle: *mut NativeHandle, freq: f32) -> c_int;
        pub fn nrsc5_set_gain(handle: *mut NativeHandle, gain: f32) -> c_int;
        pub fn nrsc5_set_auto_gain(handle: *mut NativeHandle, enabled: c_int);
        pub fn nrsc5_set_callback(
            handle: *mut NativeHandle,
            callback: Option<RawCallback>,
            opaque: *mut c_void,
        );
        pub fn nrsc5_pipe_samples(handle: *mut NativeHandle, samples: *const u8, length: c_uint) -> c_int;
    }
}
