//! File sinks: HDC dumps with ADTS-style framing, and AAS file output.
//!
//! Compressed HDC audio units are headerless on the wire; external tools
//! expect each unit preceded by a fixed 7-byte framing header carrying the
//! unit length in a bit-packed 13-bit field plus constant sync, profile, and
//! channel-configuration bits.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::event::LotFile;

/// Largest payload representable in the 13-bit frame-length field, which
/// counts the header itself.
pub const MAX_FRAMED_PAYLOAD: usize = 0x1FFF - FramingHeader::LEN;

/// The synthesized 7-byte header that makes dumped HDC units self-delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramingHeader {
    payload_len: usize,
}

impl FramingHeader {
    pub const LEN: usize = 7;

    pub fn new(payload_len: usize) -> Result<Self> {
        if payload_len > MAX_FRAMED_PAYLOAD {
            return Err(Error::InvalidInput(format!(
                "payload of {payload_len} bytes exceeds the {MAX_FRAMED_PAYLOAD}-byte framing limit"
            )));
        }
        Ok(Self { payload_len })
    }

    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    /// Encodes the header. The frame length field counts header plus
    /// payload, split across bits of bytes 3..6.
    pub fn encode(&self) -> [u8; Self::LEN] {
        let frame_len = self.payload_len + Self::LEN;
        [
            0xFF,
            0xF1,
            0x5C,
            0x80 | (frame_len >> 11) as u8,
            ((frame_len >> 3) & 0xFF) as u8,
            0x1F | (((frame_len & 0x07) << 5) as u8),
            0xFC,
        ]
    }

    /// Parses an encoded header back, recovering the exact payload length.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(Error::InvalidInput(format!(
                "framing header needs {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        if bytes[0] != 0xFF
            || bytes[1] != 0xF1
            || bytes[2] != 0x5C
            || bytes[3] & 0xFC != 0x80
            || bytes[5] & 0x1F != 0x1F
            || bytes[6] != 0xFC
        {
            return Err(Error::InvalidInput("bad framing header sync bits".into()));
        }
        let frame_len = ((bytes[3] as usize & 0x03) << 11)
            | ((bytes[4] as usize) << 3)
            | (bytes[5] as usize >> 5);
        let payload_len = frame_len.checked_sub(Self::LEN).ok_or_else(|| {
            Error::InvalidInput(format!("framing length {frame_len} shorter than the header"))
        })?;
        Ok(Self { payload_len })
    }
}

/// Dumps compressed HDC units to a byte stream, optionally framed.
pub struct HdcDump<W: Write> {
    out: W,
    framed: bool,
}

impl HdcDump<BufWriter<File>> {
    pub fn create(path: &Path, framed: bool) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?), framed))
    }
}

impl<W: Write> HdcDump<W> {
    pub fn new(out: W, framed: bool) -> Self {
        Self { out, framed }
    }

    pub fn write_unit(&mut self, data: &[u8]) -> Result<()> {
        if self.framed {
            self.out.write_all(&FramingHeader::new(data.len())?.encode())?;
        }
        self.out.write_all(data)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Appends raw IQ passthrough bytes to a capture file. The bytes arrive
/// frame-aligned from the engine, so a capture written here replays cleanly.
pub struct IqDump<W: Write> {
    out: W,
}

impl IqDump<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> IqDump<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.out.write_all(data)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Persists reassembled LOT files into a dump directory.
pub struct AasDump {
    dir: PathBuf,
}

impl AasDump {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Writes the file's payload under a sanitized name and returns the
    /// path. Broadcast-supplied names are untrusted; anything that could
    /// escape the dump directory is stripped.
    pub fn save(&self, file: &LotFile) -> Result<PathBuf> {
        let name = file
            .name
            .as_deref()
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("lot-{:04X}-{}", file.port, file.lot));
        let path = self.dir.join(name);
        fs::write(&path, &file.data)?;
        debug!(path = %path.display(), bytes = file.data.len(), "saved LOT file");
        Ok(path)
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .skip_while(|&c| c == '.')
        .collect()
}
