//! NRSC-5 receiver command line.
//!
//! Tunes local RTL-SDR hardware, a remote rtl_tcp tuner, or replays a raw IQ
//! capture, then routes decoded events to the configured outputs: WAV audio,
//! HDC dumps, AAS file captures, and structured logs.

use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nrsc5_rx::audio::{self, AudioFrame, AudioSink, NullSink, WavSink};
use nrsc5_rx::engine::Mode;
use nrsc5_rx::event::{mime_name, Event};
use nrsc5_rx::output::{AasDump, HdcDump, IqDump};
use nrsc5_rx::session::{SampleFormat, Session, Transport};

/// Reads from the replay source happen in chunks of this size, truncated
/// down to a whole number of 4-byte IQ frames before injection.
const REPLAY_CHUNK: usize = 32_768;

#[derive(Parser, Debug)]
#[command(name = "nrsc5-rx", version, about = "Receive NRSC-5 digital radio broadcasts")]
struct Cli {
    /// Only log errors
    #[arg(short = 'q', long)]
    quiet: bool,

    /// RTL-SDR device index
    #[arg(short = 'd', long, default_value_t = 0)]
    device_index: i32,

    /// Frequency correction in ppm
    #[arg(short = 'p', long, default_value_t = 0)]
    ppm_error: i32,

    /// Tuner gain in dB (automatic gain when omitted)
    #[arg(short = 'g', long)]
    gain: Option<f32>,

    /// Connect to an rtl_tcp server instead of local hardware
    #[arg(short = 'H', long, value_name = "host:port", conflicts_with = "iq_input")]
    rtltcp: Option<String>,

    /// Replay raw IQ samples from a file instead of tuning ("-" for stdin)
    #[arg(short = 'r', long, value_name = "file")]
    iq_input: Option<String>,

    /// Write the raw IQ passthrough to a file
    #[arg(short = 'w', long, value_name = "file")]
    iq_output: Option<PathBuf>,

    /// Write decoded audio to a WAV file
    #[arg(short = 'o', long, value_name = "file")]
    wav_output: Option<PathBuf>,

    /// Dump compressed HDC audio units (with framing headers) to a file
    #[arg(long, value_name = "file")]
    dump_hdc: Option<PathBuf>,

    /// Save received AAS files into a directory
    #[arg(long, value_name = "dir")]
    dump_aas_files: Option<PathBuf>,

    /// Demodulate AM instead of FM
    #[arg(long)]
    am: bool,

    /// Enable the bias tee
    #[arg(long)]
    bias_tee: bool,

    /// Frequency in Hz (values below 10 kHz are read as MHz)
    #[arg(required_unless_present = "iq_input")]
    frequency: Option<f32>,

    /// Audio program number (0 is the primary program)
    #[arg(default_value_t = 0)]
    program: u32,
}

/// Flag plus condvar the main thread parks on in live-tuner mode. Signaled
/// by the interrupt handler and by the device-loss event.
type Shutdown = Arc<(Mutex<bool>, Condvar)>;

fn request_shutdown(shutdown: &Shutdown) {
    let (flag, cvar) = &**shutdown;
    if let Ok(mut requested) = flag.lock() {
        *requested = true;
        cvar.notify_all();
    }
}

fn shutdown_requested(shutdown: &Shutdown) -> bool {
    shutdown.0.lock().map(|flag| *flag).unwrap_or(true)
}

/// Routes decoded events to the configured outputs. Runs on the engine's
/// callback thread, so everything here is push and return.
struct EventRouter {
    program: u32,
    producer: audio::AudioProducer,
    shutdown: Shutdown,
    iq_out: Option<IqDump<BufWriter<File>>>,
    hdc_dump: Option<HdcDump<BufWriter<File>>>,
    aas_dump: Option<AasDump>,
}

impl EventRouter {
    fn handle(&mut self, event: Event) {
        match event {
            Event::LostDevice => {
                info!("lost device");
                request_shutdown(&self.shutdown);
            }
            Event::Iq { data } => {
                if let Some(out) = self.iq_out.as_mut() {
                    if let Err(e) = out.write(&data) {
                        error!(error = %e, "IQ output write failed");
                        self.iq_out = None;
                    }
                }
            }
            Event::Sync {
                frequency_offset,
                primary_service_mode,
            } => match primary_service_mode {
                Some(psmi) => {
                    info!("synchronized, offset {frequency_offset:.0} Hz, service mode {psmi}")
                }
                None => info!("synchronized, offset {frequency_offset:.0} Hz"),
            },
            Event::LostSync => info!("lost synchronization"),
            Event::Mer { lower, upper } => {
                info!("MER: {lower:.1} dB (lower), {upper:.1} dB (upper)")
            }
            Event::Ber { cber } => info!("BER: {cber:.6}"),
            Event::Hdc { program, data } => {
                if program == self.program {
                    if let Some(dump) = self.hdc_dump.as_mut() {
                        if let Err(e) = dump.write_unit(&data) {
                            error!(error = %e, "HDC dump write failed");
                            self.hdc_dump = None;
                        }
                    }
                }
            }
            Event::Audio { program, samples } => {
                if program == self.program
                    && self.producer.push(AudioFrame { program, samples }).is_err()
                {
                    request_shutdown(&self.shutdown);
                }
            }
            Event::Id3(id3) => {
                if id3.program != self.program {
                    return;
                }
                if let Some(title) = &id3.title {
                    info!("Title: {title}");
                }
                if let Some(artist) = &id3.artist {
                    info!("Artist: {artist}");
                }
                if let Some(album) = &id3.album {
                    info!("Album: {album}");
                }
                if let Some(genre) = &id3.genre {
                    info!("Genre: {genre}");
                }
                if let Some(xhdr) = &id3.xhdr {
                    debug!(
                        mime = mime_name(xhdr.mime).unwrap_or("unknown"),
                        param = ?xhdr.param,
                        lot = ?xhdr.lot,
                        "XHDR"
                    );
                }
            }
            Event::Sig { services } => {
                for service in &services {
                    info!(
                        "SIG service {} ({:?}): {}",
                        service.number,
                        service.service_type,
                        service.name.as_deref().unwrap_or("(unnamed)")
                    );
                    for component in &service.components {
                        debug!(id = component.id, detail = ?component.detail, "SIG component");
                    }
                }
            }
            Event::Stream(unit) | Event::Packet(unit) => debug!(
                port = unit.port,
                seq = unit.seq,
                bytes = unit.data.len(),
                mime = mime_name(unit.mime).unwrap_or("unknown"),
                service = unit.origin.service.number,
                "data unit"
            ),
            Event::Lot(file) => {
                info!(
                    "LOT file: port {:04X}, lot {}, name {}, {} bytes",
                    file.port,
                    file.lot,
                    file.name.as_deref().unwrap_or("(unnamed)"),
                    file.data.len()
                );
                if let Some(dump) = self.aas_dump.as_ref() {
                    if let Err(e) = dump.save(&file) {
                        error!(error = %e, "AAS file save failed");
                    }
                }
            }
            Event::LotHeader(header) => debug!(
                port = header.port,
                lot = header.lot,
                size = header.size,
                "LOT header"
            ),
            Event::LotFragment(fragment) => debug!(
                port = fragment.port,
                lot = fragment.lot,
                seq = fragment.seq,
                repeat = fragment.repeat,
                "LOT fragment"
            ),
            Event::StationId {
                country_code,
                fcc_facility_id,
            } => info!(
                "Station ID: country {}, FCC facility {:?}",
                country_code.as_deref().unwrap_or("??"),
                fcc_facility_id
            ),
            Event::StationName { name } => {
                if let Some(name) = name {
                    info!("Station name: {name}");
                }
            }
            Event::StationSlogan { slogan } => {
                if let Some(slogan) = slogan {
                    info!("Slogan: {slogan}");
                }
            }
            Event::StationMessage { message } => {
                if let Some(message) = message {
                    info!("Message: {message}");
                }
            }
            Event::StationLocation {
                latitude,
                longitude,
                altitude,
            } => {
                if let (Some(lat), Some(lon)) = (latitude, longitude) {
                    info!("Station location: {lat:.4}, {lon:.4}, {altitude}m");
                }
            }
            Event::AudioServiceDescriptors { services } => {
                for asd in services {
                    debug!(
                        program = asd.program,
                        access = ?asd.access,
                        program_type = asd.program_type,
                        "audio service descriptor"
                    );
                }
            }
            Event::DataServiceDescriptors { services } => {
                for dsd in services {
                    debug!(
                        access = ?dsd.access,
                        service_type = dsd.service_type,
                        mime = mime_name(dsd.mime_type).unwrap_or("unknown"),
                        "data service descriptor"
                    );
                }
            }
            Event::AudioService {
                program,
                access,
                service_type,
                codec_mode,
            } => debug!(
                program,
                access = ?access,
                service_type,
                codec_mode,
                "audio service"
            ),
            Event::EmergencyAlert(alert) => match &alert.message {
                Some(message) => warn!(
                    categories = ?alert.categories,
                    locations = alert.locations.len(),
                    "ALERT: {message}"
                ),
                None => info!("alert ended"),
            },
        }
    }
}

#[cfg(feature = "ffi")]
fn open_session(cli: &Cli) -> Result<Session> {
    if cli.iq_input.is_some() {
        return Ok(Session::open_pipe()?);
    }
    if let Some(addr) = &cli.rtltcp {
        #[cfg(unix)]
        return Ok(Session::open_rtltcp(addr)?);
        #[cfg(not(unix))]
        {
            let _ = addr;
            bail!("the rtl_tcp transport is only available on unix platforms");
        }
    }
    Ok(Session::open_device(cli.device_index, cli.ppm_error)?)
}

#[cfg(not(feature = "ffi"))]
fn open_session(_cli: &Cli) -> Result<Session> {
    bail!("this build does not link the demodulation engine; rebuild with `--features ffi`")
}

/// Applies tuner settings that only make sense when real hardware (local or
/// remote) is on the other end.
fn configure_tuner(session: &mut Session, cli: &Cli, frequency: Option<f32>) -> Result<()> {
    let hz = frequency.context("a frequency is required when tuning hardware")?;
    session.set_frequency(hz)?;
    match cli.gain {
        Some(db) => session.set_gain(db)?,
        None => session.set_auto_gain(true)?,
    }
    if cli.bias_tee {
        session.set_bias_tee(true)?;
    }
    if session.transport() == Transport::Rtltcp && cli.ppm_error != 0 {
        session.set_freq_correction(cli.ppm_error)?;
    }
    Ok(())
}

/// Feeds the replay source through the pipe transport until EOF or an
/// interrupt. Each chunk is truncated to a whole number of IQ frames.
fn replay(session: &mut Session, input: &str, shutdown: &Shutdown) -> Result<()> {
    let mut reader: Box<dyn Read> = if input == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(input).with_context(|| format!("opening {input}"))?)
    };

    let mut buf = vec![0u8; REPLAY_CHUNK];
    loop {
        if shutdown_requested(shutdown) {
            info!("interrupted");
            break;
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            info!("end of sample input");
            break;
        }
        let usable = n - n % 4;
        if usable > 0 {
            session.pipe_samples(SampleFormat::Cu8, &buf[..usable])?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Frequencies below 10 kHz are shorthand for MHz.
    let frequency = cli.frequency.map(|f| if f < 10_000.0 { f * 1e6 } else { f });

    let mut session = open_session(&cli)?;

    if cli.am {
        session.set_mode(Mode::Am)?;
    }
    if matches!(session.transport(), Transport::Device | Transport::Rtltcp) {
        configure_tuner(&mut session, &cli, frequency)?;
    }

    let shutdown: Shutdown = Arc::new((Mutex::new(false), Condvar::new()));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || request_shutdown(&shutdown))
            .context("installing the interrupt handler")?;
    }

    let (producer, consumer) = audio::queue(audio::DEFAULT_QUEUE_FRAMES);
    let mut sink: Box<dyn AudioSink> = match &cli.wav_output {
        Some(path) => Box::new(WavSink::create(path)?),
        None => Box::new(NullSink),
    };
    let audio_thread = thread::Builder::new()
        .name("audio-output".into())
        .spawn(move || {
            if let Err(e) = consumer.run(sink.as_mut()) {
                error!(error = %e, "audio writer failed");
            }
        })
        .context("spawning the audio writer thread")?;

    let mut router = EventRouter {
        program: cli.program,
        producer: producer.clone(),
        shutdown: shutdown.clone(),
        iq_out: cli
            .iq_output
            .as_deref()
            .map(IqDump::create)
            .transpose()?,
        hdc_dump: cli
            .dump_hdc
            .as_ref()
            .map(|path| HdcDump::create(path, true))
            .transpose()?,
        aas_dump: cli.dump_aas_files.clone().map(AasDump::new).transpose()?,
    };
    session.set_handler(move |event| router.handle(event))?;

    session.start()?;

    match &cli.iq_input {
        Some(input) => replay(&mut session, input, &shutdown)?,
        None => {
            let (flag, cvar) = &*shutdown;
            let mut requested = flag
                .lock()
                .map_err(|_| anyhow::anyhow!("shutdown state poisoned"))?;
            while !*requested {
                requested = cvar
                    .wait(requested)
                    .map_err(|_| anyhow::anyhow!("shutdown state poisoned"))?;
            }
        }
    }

    session.stop()?;
    session.close()?;

    // The dispatcher is gone with the session; drain and finalize audio.
    producer.finish();
    if audio_thread.join().is_err() {
        bail!("the audio writer thread panicked");
    }
    Ok(())
}
