//! Owned, decoded event model.
//!
//! Every value here is fully owned: decoding copies out of the engine's
//! buffers and nothing retains a native pointer. Optional fields are real
//! `Option`s; the sentinel conventions of the wire layer (`null`/`-1`/`NaN`)
//! never leak past [`crate::decode`].

use chrono::{DateTime, Utc};

use crate::error::Error;

/// Well-known AAS MIME type hashes (`NRSC5_MIME_*`).
pub const MIME_PRIMARY_IMAGE: u32 = 0xBE4B7536;
pub const MIME_STATION_LOGO: u32 = 0xD9C72536;
pub const MIME_NAVTEQ: u32 = 0x2D42AC3E;
pub const MIME_HERE_TPEG: u32 = 0x82F03DFC;
pub const MIME_HERE_IMAGE: u32 = 0xB7F03DFC;
pub const MIME_HD_TMC: u32 = 0xEECB55B6;
pub const MIME_HDC: u32 = 0x4DC66C5A;
pub const MIME_TEXT: u32 = 0xBB492AAC;
pub const MIME_JPEG: u32 = 0x1E653E9C;
pub const MIME_PNG: u32 = 0x4F328CA0;

/// Returns a short name for a well-known MIME hash, for log output.
pub fn mime_name(mime: u32) -> Option<&'static str> {
    Some(match mime {
        MIME_PRIMARY_IMAGE => "primary_image",
        MIME_STATION_LOGO => "station_logo",
        MIME_NAVTEQ => "navteq",
        MIME_HERE_TPEG => "here_tpeg",
        MIME_HERE_IMAGE => "here_image",
        MIME_HD_TMC => "hd_tmc",
        MIME_HDC => "hdc",
        MIME_TEXT => "text",
        MIME_JPEG => "jpeg",
        MIME_PNG => "png",
        _ => return None,
    })
}

/// Whether a SIG service carries audio or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Audio,
    Data,
}

impl TryFrom<u8> for ServiceType {
    type Error = Error;

    fn try_from(v: u8) -> Result<Self, Error> {
        match v {
            crate::abi::SIG_SERVICE_AUDIO => Ok(Self::Audio),
            crate::abi::SIG_SERVICE_DATA => Ok(Self::Data),
            other => Err(Error::Decode(format!("unknown service type {other}"))),
        }
    }
}

/// The typed half of a SIG component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentDetail {
    Audio {
        port: u8,
        content_type: u8,
        mime: u32,
    },
    Data {
        port: u16,
        service_data_type: u16,
        content_type: u8,
        mime: u32,
    },
}

impl ComponentDetail {
    /// The MIME hash of the content this component carries.
    pub fn mime(&self) -> u32 {
        match self {
            Self::Audio { mime, .. } | Self::Data { mime, .. } => *mime,
        }
    }
}

/// One physical sub-stream of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub id: u8,
    pub detail: ComponentDetail,
}

/// One logical audio or data service from the SIG graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub service_type: ServiceType,
    pub number: u16,
    pub name: Option<String>,
    /// Components in wire order.
    pub components: Vec<Component>,
}

impl Service {
    pub fn component(&self, id: u8) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }
}

/// The service/component a STREAM, PACKET, or LOT event belongs to, resolved
/// through the current registry generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub service: Service,
    pub component: Component,
}

/// ID3 unique file identifier (UFID frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ufid {
    pub owner: Option<String>,
    pub id: Option<String>,
}

/// ID3 extended header (XHDR frame), used to cross-reference album art LOTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xhdr {
    pub mime: u32,
    pub param: Option<u32>,
    pub lot: Option<u32>,
}

/// One ID3 comment (COMM frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub language: Option<String>,
    pub short_description: Option<String>,
    pub text: Option<String>,
}

/// Program metadata carried in the PSD ID3 tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Id3 {
    pub program: u32,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub ufid: Option<Ufid>,
    pub xhdr: Option<Xhdr>,
    pub comments: Vec<Comment>,
}

/// A STREAM or PACKET data unit, resolved against the service registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUnit {
    pub port: u16,
    pub seq: u16,
    pub mime: u32,
    pub data: Vec<u8>,
    pub origin: Origin,
}

/// A fully reassembled LOT file object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotFile {
    pub port: u16,
    pub lot: u32,
    pub mime: u32,
    pub name: Option<String>,
    pub data: Vec<u8>,
    pub expiry: Option<DateTime<Utc>>,
    pub origin: Origin,
}

/// Announces an incoming LOT object: size and identity before any data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotHeader {
    pub port: u16,
    pub lot: u32,
    pub size: u32,
    pub mime: u32,
    pub name: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub origin: Origin,
}

/// One partial delivery of a LOT object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotFragment {
    pub port: u16,
    pub lot: u32,
    pub seq: u32,
    /// True when this fragment repeats data already delivered.
    pub repeat: bool,
    pub data: Vec<u8>,
    pub origin: Origin,
}

/// Whether a SIS-announced service is publicly receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAccess {
    Public,
    Restricted,
}

impl TryFrom<u32> for ServiceAccess {
    type Error = Error;

    fn try_from(v: u32) -> Result<Self, Error> {
        match v {
            0 => Ok(Self::Public),
            1 => Ok(Self::Restricted),
            other => Err(Error::Decode(format!("unknown service access {other}"))),
        }
    }
}

/// SIS audio service descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioServiceDescriptor {
    pub program: u32,
    pub access: ServiceAccess,
    pub program_type: u32,
    pub sound_experience: u32,
}

/// SIS data service descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataServiceDescriptor {
    pub access: ServiceAccess,
    pub service_type: u32,
    pub mime_type: u32,
}

/// Emergency alert category code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    NonSpecific = 1,
    Geophysical = 2,
    Meteorological = 3,
    Safety = 4,
    Security = 5,
    Rescue = 6,
    Fire = 7,
    Health = 8,
    Environmental = 9,
    Transport = 10,
    Infrastructure = 11,
    Cbrne = 12,
    Other = 13,
    Test = 14,
}

impl TryFrom<i32> for AlertCategory {
    type Error = Error;

    fn try_from(v: i32) -> Result<Self, Error> {
        Ok(match v {
            1 => Self::NonSpecific,
            2 => Self::Geophysical,
            3 => Self::Meteorological,
            4 => Self::Safety,
            5 => Self::Security,
            6 => Self::Rescue,
            7 => Self::Fire,
            8 => Self::Health,
            9 => Self::Environmental,
            10 => Self::Transport,
            11 => Self::Infrastructure,
            12 => Self::Cbrne,
            13 => Self::Other,
            14 => Self::Test,
            other => return Err(Error::Decode(format!("unknown alert category {other}"))),
        })
    }
}

/// How alert location codes are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationFormat {
    Same,
    Fips,
    ZipCode,
}

impl TryFrom<i32> for LocationFormat {
    type Error = Error;

    fn try_from(v: i32) -> Result<Self, Error> {
        match v {
            0 => Ok(Self::Same),
            1 => Ok(Self::Fips),
            2 => Ok(Self::ZipCode),
            other => Err(Error::Decode(format!("unknown location format {other}"))),
        }
    }
}

/// An emergency alert. A `None` message means the alert has ended.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Alert {
    pub message: Option<String>,
    /// Zero, one, or two categories.
    pub categories: Vec<AlertCategory>,
    pub location_format: Option<LocationFormat>,
    pub locations: Vec<i32>,
}

/// A decoded engine event. One native callback record decodes to at most one
/// of these; unrecognized future tags are ignored rather than failing.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The underlying device/transport was lost; the session should shut
    /// down in an orderly fashion.
    LostDevice,
    /// Raw IQ passthrough of the bytes fed into the demodulator.
    Iq { data: Vec<u8> },
    /// Acquired synchronization with the digital sidebands.
    Sync {
        frequency_offset: f32,
        primary_service_mode: Option<u8>,
    },
    LostSync,
    /// Modulation error ratio of the lower/upper sidebands, in dB.
    Mer { lower: f32, upper: f32 },
    /// Channel bit error rate before error correction.
    Ber { cber: f32 },
    /// One compressed HDC audio unit.
    Hdc { program: u32, data: Vec<u8> },
    /// One decoded audio frame: 16-bit signed, interleaved stereo.
    Audio { program: u32, samples: Vec<i16> },
    Id3(Id3),
    /// The full service/component graph. Replaces the registry wholesale.
    Sig { services: Vec<Service> },
    Stream(DataUnit),
    Packet(DataUnit),
    Lot(LotFile),
    LotHeader(LotHeader),
    LotFragment(LotFragment),
    StationId {
        country_code: Option<String>,
        fcc_facility_id: Option<u32>,
    },
    StationName { name: Option<String> },
    StationSlogan { slogan: Option<String> },
    StationMessage { message: Option<String> },
    StationLocation {
        latitude: Option<f32>,
        longitude: Option<f32>,
        altitude: i32,
    },
    AudioServiceDescriptors {
        services: Vec<AudioServiceDescriptor>,
    },
    DataServiceDescriptors {
        services: Vec<DataServiceDescriptor>,
    },
    /// Per-program audio service information.
    AudioService {
        program: u32,
        access: ServiceAccess,
        service_type: u32,
        codec_mode: u32,
    },
    EmergencyAlert(Alert),
}
