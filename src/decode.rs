//! Native event decoding.
//!
//! [`EventDecoder::decode`] turns one raw callback record into at most one
//! owned [`Event`]. All pointer walking happens here: linked lists are copied
//! into `Vec`s in traversal order, text is copied out of C strings, sentinel
//! values become `Option`s, and the broken-down calendar time is corrected
//! (`year` counts from 1900, `month` is zero-based) into a UTC instant.
//! Union arms are read strictly by tag; the inactive arms are never touched.
//!
//! [`Dispatcher`] is the drop boundary: decode failures and unresolved
//! service references are logged and swallowed there so a single malformed
//! event cannot take down the session.

use std::ffi::CStr;
use std::os::raw::{c_char, c_int};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{trace, warn};

use crate::abi::{
    self, RawAlertLocation, RawEvent, RawId3Comment, RawSigComponent, RawSigService, RawSisAsd,
    RawSisDsd, RawTime,
};
use crate::error::{Error, Result};
use crate::event::{
    Alert, AlertCategory, AudioServiceDescriptor, Comment, Component, ComponentDetail,
    DataServiceDescriptor, DataUnit, Event, Id3, LocationFormat, LotFile, LotFragment, LotHeader,
    Origin, Service, ServiceAccess, ServiceType, Ufid, Xhdr,
};
use crate::registry::ServiceRegistry;

/// Copies a native C string, treating a null pointer as absent. An empty
/// native pointer maps to `None`, never to an empty string.
unsafe fn opt_string(p: *const c_char) -> Option<String> {
    if p.is_null() {
        None
    } else {
        Some(CStr::from_ptr(p).to_string_lossy().into_owned())
    }
}

/// Translates the `-1` sentinel for signed index fields.
fn opt_index(v: c_int) -> Option<u32> {
    if v < 0 { None } else { Some(v as u32) }
}

/// Translates the `NaN` sentinel for geographic coordinates.
fn opt_coord(v: f32) -> Option<f32> {
    if v.is_nan() { None } else { Some(v) }
}

/// Copies a counted native byte buffer into an owned `Vec`.
unsafe fn owned_bytes(data: *const u8, count: usize) -> Result<Vec<u8>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if data.is_null() {
        return Err(Error::Decode("null data pointer with non-zero count".into()));
    }
    Ok(std::slice::from_raw_parts(data, count).to_vec())
}

/// Copies a counted native i16 sample buffer into an owned `Vec`.
unsafe fn owned_samples(data: *const i16, count: usize) -> Result<Vec<i16>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if data.is_null() {
        return Err(Error::Decode("null sample pointer with non-zero count".into()));
    }
    Ok(std::slice::from_raw_parts(data, count).to_vec())
}

/// Decodes the engine's `struct tm`-shaped time into a UTC instant. A null
/// pointer means absent; an unrepresentable date is a decode error.
unsafe fn decode_time(p: *const RawTime) -> Result<Option<DateTime<Utc>>> {
    if p.is_null() {
        return Ok(None);
    }
    let t = &*p;
    let instant = Utc
        .with_ymd_and_hms(
            1900 + t.year,
            (t.mon + 1) as u32,
            t.mday as u32,
            t.hour as u32,
            t.min as u32,
            t.sec as u32,
        )
        .single()
        .ok_or_else(|| {
            Error::Decode(format!(
                "unrepresentable calendar time {}-{}-{} {}:{}:{}",
                1900 + t.year,
                t.mon + 1,
                t.mday,
                t.hour,
                t.min,
                t.sec
            ))
        })?;
    Ok(Some(instant))
}

/// Decodes one native event record into a safe, owned value.
///
/// Owns the session's [`ServiceRegistry`]: SIG events replace it, and
/// STREAM/PACKET/LOT events resolve their back-references through it.
#[derive(Debug, Default)]
pub struct EventDecoder {
    registry: ServiceRegistry,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Decodes one raw record. Returns `Ok(None)` for unrecognized tags
    /// (forward compatibility with newer engines), `Err` when a field or a
    /// cross-reference cannot be interpreted.
    ///
    /// # Safety
    ///
    /// `raw` must be a record delivered by the native engine (or an
    /// equivalent, correctly populated mirror): the union arm selected by
    /// `raw.event` must be the live one, and every pointer reachable from it
    /// must be valid for the duration of this call.
    pub unsafe fn decode(&mut self, raw: &RawEvent) -> Result<Option<Event>> {
        let event = match raw.event {
            abi::EVENT_LOST_DEVICE => Event::LostDevice,
            abi::EVENT_IQ => {
                let iq = raw.u.iq;
                Event::Iq {
                    data: owned_bytes(iq.data as *const u8, iq.count)?,
                }
            }
            abi::EVENT_SYNC => {
                let sync = raw.u.sync;
                Event::Sync {
                    frequency_offset: sync.freq_offset,
                    primary_service_mode: opt_index(sync.psmi).map(|v| v as u8),
                }
            }
            abi::EVENT_LOST_SYNC => Event::LostSync,
            abi::EVENT_MER => {
                let mer = raw.u.mer;
                Event::Mer {
                    lower: mer.lower,
                    upper: mer.upper,
                }
            }
            abi::EVENT_BER => Event::Ber {
                cber: raw.u.ber.cber,
            },
            abi::EVENT_HDC => {
                let hdc = raw.u.hdc;
                Event::Hdc {
                    program: hdc.program,
                    data: owned_bytes(hdc.data, hdc.count)?,
                }
            }
            abi::EVENT_AUDIO => {
                let audio = raw.u.audio;
                Event::Audio {
                    program: audio.program,
                    samples: owned_samples(audio.data, audio.count)?,
                }
            }
            abi::EVENT_ID3 => Event::Id3(self.decode_id3(raw)?),
            abi::EVENT_SIG => {
                let services = decode_services(raw.u.sig.services)?;
                self.registry.replace(&services);
                Event::Sig { services }
            }
            abi::EVENT_STREAM => Event::Stream(self.decode_data_unit(&raw.u.stream)?),
            abi::EVENT_PACKET => Event::Packet(self.decode_data_unit(&raw.u.packet)?),
            abi::EVENT_LOT => {
                let lot = raw.u.lot;
                Event::Lot(LotFile {
                    port: lot.port,
                    lot: lot.lot,
                    mime: lot.mime,
                    name: opt_string(lot.name),
                    data: owned_bytes(lot.data, lot.size as usize)?,
                    expiry: decode_time(lot.expiry)?,
                    origin: self.resolve_origin(lot.service, lot.component)?,
                })
            }
            abi::EVENT_LOT_HEADER => {
                let hdr = raw.u.lot_header;
                Event::LotHeader(LotHeader {
                    port: hdr.port,
                    lot: hdr.lot,
                    size: hdr.size,
                    mime: hdr.mime,
                    name: opt_string(hdr.name),
                    expiry: decode_time(hdr.expiry)?,
                    origin: self.resolve_origin(hdr.service, hdr.component)?,
                })
            }
            abi::EVENT_LOT_FRAGMENT => {
                let frag = raw.u.lot_fragment;
                Event::LotFragment(LotFragment {
                    port: frag.port,
                    lot: frag.lot,
                    seq: frag.seq,
                    repeat: frag.repeat != 0,
                    data: owned_bytes(frag.data, frag.size as usize)?,
                    origin: self.resolve_origin(frag.service, frag.component)?,
                })
            }
            abi::EVENT_STATION_ID => {
                let sid = raw.u.station_id;
                Event::StationId {
                    country_code: opt_string(sid.country_code),
                    fcc_facility_id: opt_index(sid.fcc_facility_id),
                }
            }
            abi::EVENT_STATION_NAME => Event::StationName {
                name: opt_string(raw.u.station_name.name),
            },
            abi::EVENT_STATION_SLOGAN => Event::StationSlogan {
                slogan: opt_string(raw.u.station_slogan.slogan),
            },
            abi::EVENT_STATION_MESSAGE => Event::StationMessage {
                message: opt_string(raw.u.station_message.message),
            },
            abi::EVENT_STATION_LOCATION => {
                let loc = raw.u.station_location;
                Event::StationLocation {
                    latitude: opt_coord(loc.latitude),
                    longitude: opt_coord(loc.longitude),
                    altitude: loc.altitude,
                }
            }
            abi::EVENT_AUDIO_SERVICE_DESCRIPTORS => Event::AudioServiceDescriptors {
                services: decode_asd_list(raw.u.asd.audio_services)?,
            },
            abi::EVENT_DATA_SERVICE_DESCRIPTORS => Event::DataServiceDescriptors {
                services: decode_dsd_list(raw.u.dsd.data_services)?,
            },
            abi::EVENT_AUDIO_SERVICE => {
                let svc = raw.u.audio_service;
                Event::AudioService {
                    program: svc.program,
                    access: ServiceAccess::try_from(svc.access)?,
                    service_type: svc.kind,
                    codec_mode: svc.codec_mode,
                }
            }
            abi::EVENT_EMERGENCY_ALERT => Event::EmergencyAlert(decode_alert(&raw.u.alert)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    unsafe fn decode_id3(&self, raw: &RawEvent) -> Result<Id3> {
        let id3 = raw.u.id3;

        let owner = opt_string(id3.ufid.owner);
        let id = opt_string(id3.ufid.id);
        let ufid = if owner.is_some() || id.is_some() {
            Some(Ufid { owner, id })
        } else {
            None
        };

        let param = opt_index(id3.xhdr.param);
        let lot = opt_index(id3.xhdr.lot);
        let xhdr = if id3.xhdr.mime != 0 || param.is_some() || lot.is_some() {
            Some(Xhdr {
                mime: id3.xhdr.mime,
                param,
                lot,
            })
        } else {
            None
        };

        let mut comments = Vec::new();
        let mut node = id3.comments;
        while !node.is_null() {
            let c: &RawId3Comment = &*node;
            comments.push(Comment {
                language: opt_string(c.lang),
                short_description: opt_string(c.short_content_desc),
                text: opt_string(c.full_text),
            });
            node = c.next;
        }

        Ok(Id3 {
            program: id3.program,
            title: opt_string(id3.title),
            artist: opt_string(id3.artist),
            album: opt_string(id3.album),
            genre: opt_string(id3.genre),
            ufid,
            xhdr,
            comments,
        })
    }

    unsafe fn decode_data_unit(&self, unit: &abi::RawDataUnit) -> Result<DataUnit> {
        Ok(DataUnit {
            port: unit.port,
            seq: unit.seq,
            mime: unit.mime,
            data: owned_bytes(unit.data, unit.size as usize)?,
            origin: self.resolve_origin(unit.service, unit.component)?,
        })
    }

    /// Resolves a service/component back-reference through the current
    /// registry generation, keyed by the (number, id) pair read from the
    /// native record. The pointers themselves are never retained.
    unsafe fn resolve_origin(
        &self,
        service: *const RawSigService,
        component: *const RawSigComponent,
    ) -> Result<Origin> {
        if service.is_null() || component.is_null() {
            return Err(Error::Decode(
                "data event without service/component reference".into(),
            ));
        }
        let number = (*service).number;
        let id = (*component).id;
        self.registry
            .resolve(number, id)
            .ok_or(Error::UnresolvedReference {
                service: number,
                component: id,
            })
    }
}

/// Walks the SIG service list into owned values, preserving wire order.
unsafe fn decode_services(head: *const RawSigService) -> Result<Vec<Service>> {
    let mut services = Vec::new();
    let mut node = head;
    while !node.is_null() {
        let s: &RawSigService = &*node;
        services.push(Service {
            service_type: ServiceType::try_from(s.kind)?,
            number: s.number,
            name: opt_string(s.name),
            components: decode_components(s.components)?,
        });
        node = s.next;
    }
    Ok(services)
}

unsafe fn decode_components(head: *const RawSigComponent) -> Result<Vec<Component>> {
    let mut components = Vec::new();
    let mut node = head;
    while !node.is_null() {
        let c: &RawSigComponent = &*node;
        // The component kind selects the live union arm.
        let detail = match c.kind {
            abi::SIG_COMPONENT_AUDIO => {
                let a = c.u.audio;
                ComponentDetail::Audio {
                    port: a.port,
                    content_type: a.kind,
                    mime: a.mime,
                }
            }
            abi::SIG_COMPONENT_DATA => {
                let d = c.u.data;
                ComponentDetail::Data {
                    port: d.port,
                    service_data_type: d.service_data_type,
                    content_type: d.kind,
                    mime: d.mime,
                }
            }
            other => {
                return Err(Error::Decode(format!("unknown component type {other}")));
            }
        };
        components.push(Component { id: c.id, detail });
        node = c.next;
    }
    Ok(components)
}

unsafe fn decode_asd_list(head: *const RawSisAsd) -> Result<Vec<AudioServiceDescriptor>> {
    let mut out = Vec::new();
    let mut node = head;
    while !node.is_null() {
        let a: &RawSisAsd = &*node;
        out.push(AudioServiceDescriptor {
            program: a.program,
            access: ServiceAccess::try_from(a.access)?,
            program_type: a.kind,
            sound_experience: a.sound_exp,
        });
        node = a.next;
    }
    Ok(out)
}

unsafe fn decode_dsd_list(head: *const RawSisDsd) -> Result<Vec<DataServiceDescriptor>> {
    let mut out = Vec::new();
    let mut node = head;
    while !node.is_null() {
        let d: &RawSisDsd = &*node;
        out.push(DataServiceDescriptor {
            access: ServiceAccess::try_from(d.access)?,
            service_type: d.kind,
            mime_type: d.mime_type,
        });
        node = d.next;
    }
    Ok(out)
}

unsafe fn decode_alert(alert: &abi::RawAlert) -> Result<Alert> {
    // Category slots use 0/negative as "absent"; a positive value must be a
    // known enumerant.
    let mut categories = Vec::new();
    for slot in [alert.category1, alert.category2] {
        if slot >= 1 {
            categories.push(AlertCategory::try_from(slot)?);
        }
    }

    let location_format = match alert.location_format {
        v if v < 0 => None,
        v => Some(LocationFormat::try_from(v)?),
    };

    let mut locations = Vec::new();
    let mut node = alert.locations;
    while !node.is_null() {
        let l: &RawAlertLocation = &*node;
        locations.push(l.id);
        node = l.next;
    }

    Ok(Alert {
        message: opt_string(alert.message),
        categories,
        location_format,
        locations,
    })
}

/// The callback-side drop boundary. Decodes each record and hands decoded
/// events to the handler; per-event failures are logged and dropped so the
/// session stays live.
pub struct Dispatcher {
    decoder: EventDecoder,
    handler: Box<dyn FnMut(Event) + Send>,
}

impl Dispatcher {
    pub fn new(handler: impl FnMut(Event) + Send + 'static) -> Self {
        Self {
            decoder: EventDecoder::new(),
            handler: Box::new(handler),
        }
    }

    /// # Safety
    ///
    /// Same contract as [`EventDecoder::decode`]; additionally `raw` may be
    /// null, which is ignored.
    pub unsafe fn dispatch(&mut self, raw: *const RawEvent) {
        let Some(raw) = raw.as_ref() else {
            return;
        };
        match self.decoder.decode(raw) {
            Ok(Some(event)) => (self.handler)(event),
            Ok(None) => trace!(tag = raw.event, "ignoring unknown event tag"),
            Err(Error::UnresolvedReference { service, component }) => warn!(
                service,
                component, "dropping event with unresolved service reference"
            ),
            Err(e) => warn!(tag = raw.event, error = %e, "dropping undecodable event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::{
        RawAlert, RawAudio, RawDataUnit, RawEventUnion, RawSig, RawSigAudioComponent,
        RawSigComponentUnion, RawSigDataComponent, RawSync,
    };
    use crate::event::MIME_HDC;
    use std::ffi::CString;
    use std::ptr;
    use std::sync::{Arc, Mutex};

    fn audio_component(id: u8, port: u8, mime: u32) -> RawSigComponent {
        RawSigComponent {
            next: ptr::null(),
            kind: abi::SIG_COMPONENT_AUDIO,
            id,
            u: RawSigComponentUnion {
                audio: RawSigAudioComponent {
                    port,
                    kind: 0,
                    mime,
                },
            },
        }
    }

    fn sig_event(service: *const RawSigService) -> RawEvent {
        RawEvent {
            event: abi::EVENT_SIG,
            u: RawEventUnion {
                sig: RawSig { services: service },
            },
        }
    }

    #[test]
    fn unknown_tag_is_ignored() {
        let mut decoder = EventDecoder::new();
        let raw = RawEvent::tag_only(999);
        let decoded = unsafe { decoder.decode(&raw) }.unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn tag_only_events() {
        let mut decoder = EventDecoder::new();
        let sync = RawEvent {
            event: abi::EVENT_SYNC,
            u: RawEventUnion {
                sync: RawSync {
                    freq_offset: 12.5,
                    psmi: -1,
                },
            },
        };
        match unsafe { decoder.decode(&sync) }.unwrap().unwrap() {
            Event::Sync {
                frequency_offset,
                primary_service_mode,
            } => {
                assert_eq!(frequency_offset, 12.5);
                assert_eq!(primary_service_mode, None);
            }
            other => panic!("unexpected event {other:?}"),
        }

        let lost = RawEvent::tag_only(abi::EVENT_LOST_SYNC);
        assert_eq!(
            unsafe { decoder.decode(&lost) }.unwrap(),
            Some(Event::LostSync)
        );
    }

    #[test]
    fn audio_samples_are_copied() {
        let mut decoder = EventDecoder::new();
        let samples: Vec<i16> = vec![1, -2, 3, -4];
        let raw = RawEvent {
            event: abi::EVENT_AUDIO,
            u: RawEventUnion {
                audio: RawAudio {
                    program: 2,
                    data: samples.as_ptr(),
                    count: samples.len(),
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Audio { program, samples } => {
                assert_eq!(program, 2);
                assert_eq!(samples, vec![1, -2, 3, -4]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn sig_preserves_wire_order_and_unions() {
        let mut decoder = EventDecoder::new();

        let data_comp = RawSigComponent {
            next: ptr::null(),
            kind: abi::SIG_COMPONENT_DATA,
            id: 1,
            u: RawSigComponentUnion {
                data: RawSigDataComponent {
                    port: 0x1001,
                    service_data_type: 264,
                    kind: 0,
                    mime: crate::event::MIME_PRIMARY_IMAGE,
                },
            },
        };
        let mut audio_comp = audio_component(0, 1, MIME_HDC);
        audio_comp.next = &data_comp;

        let name = CString::new("HD1").unwrap();
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 1,
            name: name.as_ptr(),
            components: &audio_comp,
        };

        let raw = sig_event(&service);
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Sig { services } => {
                assert_eq!(services.len(), 1);
                let svc = &services[0];
                assert_eq!(svc.number, 1);
                assert_eq!(svc.name.as_deref(), Some("HD1"));
                assert_eq!(svc.components.len(), 2);
                // Traversal order is preserved: audio first, then data.
                assert_eq!(svc.components[0].id, 0);
                assert!(matches!(
                    svc.components[0].detail,
                    ComponentDetail::Audio { port: 1, .. }
                ));
                assert!(matches!(
                    svc.components[1].detail,
                    ComponentDetail::Data {
                        port: 0x1001,
                        service_data_type: 264,
                        ..
                    }
                ));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn null_service_name_is_absent_not_empty() {
        let mut decoder = EventDecoder::new();
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_DATA,
            number: 9,
            name: ptr::null(),
            components: ptr::null(),
        };
        let raw = sig_event(&service);
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Sig { services } => assert_eq!(services[0].name, None),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn bad_service_type_is_a_decode_error() {
        let mut decoder = EventDecoder::new();
        let service = RawSigService {
            next: ptr::null(),
            kind: 7,
            number: 1,
            name: ptr::null(),
            components: ptr::null(),
        };
        let raw = sig_event(&service);
        assert!(matches!(
            unsafe { decoder.decode(&raw) },
            Err(Error::Decode(_))
        ));
    }

    /// End-to-end scenario: a SIG event defines service 5 with one audio
    /// component id 0; a later STREAM event referencing (5, 0) resolves and
    /// exposes the component's MIME type.
    #[test]
    fn stream_resolves_through_registry() {
        let mut decoder = EventDecoder::new();

        let comp = audio_component(0, 1, MIME_HDC);
        let name = CString::new("HD1").unwrap();
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 5,
            name: name.as_ptr(),
            components: &comp,
        };
        unsafe { decoder.decode(&sig_event(&service)) }.unwrap();

        let payload = [0xAAu8, 0xBB, 0xCC];
        let raw = RawEvent {
            event: abi::EVENT_STREAM,
            u: RawEventUnion {
                stream: RawDataUnit {
                    port: 0x5100,
                    seq: 7,
                    size: payload.len() as u32,
                    mime: MIME_HDC,
                    data: payload.as_ptr(),
                    service: &service,
                    component: &comp,
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Stream(unit) => {
                assert_eq!(unit.port, 0x5100);
                assert_eq!(unit.data, payload);
                assert_eq!(unit.origin.service.number, 5);
                assert_eq!(unit.origin.component.detail.mime(), MIME_HDC);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn stream_without_sig_is_unresolved() {
        let mut decoder = EventDecoder::new();

        let comp = audio_component(0, 1, MIME_HDC);
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 5,
            name: ptr::null(),
            components: &comp,
        };
        let raw = RawEvent {
            event: abi::EVENT_STREAM,
            u: RawEventUnion {
                stream: RawDataUnit {
                    port: 0x5100,
                    seq: 0,
                    size: 0,
                    mime: MIME_HDC,
                    data: ptr::null(),
                    service: &service,
                    component: &comp,
                },
            },
        };
        assert!(matches!(
            unsafe { decoder.decode(&raw) },
            Err(Error::UnresolvedReference {
                service: 5,
                component: 0
            })
        ));

        // The decoder stays usable for later well-formed events.
        let ber = RawEvent {
            event: abi::EVENT_BER,
            u: RawEventUnion {
                ber: abi::RawBer { cber: 0.01 },
            },
        };
        assert!(unsafe { decoder.decode(&ber) }.unwrap().is_some());
    }

    /// A later SIG generation fully replaces the first; references into the
    /// old generation stop resolving.
    #[test]
    fn sig_replacement_invalidates_old_references() {
        let mut decoder = EventDecoder::new();

        let comp_a = audio_component(0, 1, MIME_HDC);
        let service_a = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 5,
            name: ptr::null(),
            components: &comp_a,
        };
        unsafe { decoder.decode(&sig_event(&service_a)) }.unwrap();
        assert!(decoder.registry().resolve(5, 0).is_some());

        let comp_b = audio_component(0, 2, MIME_HDC);
        let service_b = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 6,
            name: ptr::null(),
            components: &comp_b,
        };
        unsafe { decoder.decode(&sig_event(&service_b)) }.unwrap();

        assert!(decoder.registry().resolve(5, 0).is_none());
        assert!(decoder.registry().resolve(6, 0).is_some());
    }

    /// Emergency alert with both category sentinels set decodes to an empty
    /// category list, not an error.
    #[test]
    fn alert_sentinel_categories_are_absent() {
        let mut decoder = EventDecoder::new();
        let msg = CString::new("Tornado warning for Franklin county").unwrap();
        let loc2 = RawAlertLocation {
            next: ptr::null(),
            id: 39049,
        };
        let loc1 = RawAlertLocation {
            next: &loc2,
            id: 39041,
        };
        let raw = RawEvent {
            event: abi::EVENT_EMERGENCY_ALERT,
            u: RawEventUnion {
                alert: RawAlert {
                    message: msg.as_ptr(),
                    category1: -1,
                    category2: -1,
                    location_format: 1,
                    locations: &loc1,
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::EmergencyAlert(alert) => {
                assert_eq!(alert.categories, Vec::new());
                assert_eq!(alert.location_format, Some(LocationFormat::Fips));
                assert_eq!(alert.locations, vec![39041, 39049]);
                assert!(alert.message.is_some());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn alert_end_has_no_message() {
        let mut decoder = EventDecoder::new();
        let raw = RawEvent {
            event: abi::EVENT_EMERGENCY_ALERT,
            u: RawEventUnion {
                alert: RawAlert {
                    message: ptr::null(),
                    category1: 0,
                    category2: 0,
                    location_format: -1,
                    locations: ptr::null(),
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::EmergencyAlert(alert) => {
                assert_eq!(alert.message, None);
                assert!(alert.categories.is_empty());
                assert_eq!(alert.location_format, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn alert_with_valid_categories() {
        let mut decoder = EventDecoder::new();
        let msg = CString::new("test").unwrap();
        let raw = RawEvent {
            event: abi::EVENT_EMERGENCY_ALERT,
            u: RawEventUnion {
                alert: RawAlert {
                    message: msg.as_ptr(),
                    category1: 3,
                    category2: 14,
                    location_format: 0,
                    locations: ptr::null(),
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::EmergencyAlert(alert) => {
                assert_eq!(
                    alert.categories,
                    vec![AlertCategory::Meteorological, AlertCategory::Test]
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// Native year-since-1900 encoding: a year field of 124 is 2024, and the
    /// zero-based month is corrected.
    #[test]
    fn lot_expiry_year_and_month_are_corrected() {
        let mut decoder = EventDecoder::new();

        let comp = audio_component(0, 1, MIME_HDC);
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 5,
            name: ptr::null(),
            components: &comp,
        };
        unsafe { decoder.decode(&sig_event(&service)) }.unwrap();

        let expiry = RawTime {
            sec: 30,
            min: 15,
            hour: 6,
            mday: 20,
            mon: 6, // zero-based: July
            year: 124,
            wday: 0,
            yday: 0,
            isdst: 0,
        };
        let name = CString::new("cover.png").unwrap();
        let payload = [1u8, 2, 3, 4];
        let raw = RawEvent {
            event: abi::EVENT_LOT,
            u: RawEventUnion {
                lot: abi::RawLot {
                    port: 0x1000,
                    lot: 42,
                    size: payload.len() as u32,
                    mime: crate::event::MIME_PNG,
                    name: name.as_ptr(),
                    data: payload.as_ptr(),
                    expiry: &expiry,
                    service: &service,
                    component: &comp,
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Lot(file) => {
                let expiry = file.expiry.expect("expiry should be present");
                assert_eq!(
                    expiry,
                    Utc.with_ymd_and_hms(2024, 7, 20, 6, 15, 30).unwrap()
                );
                assert_eq!(file.name.as_deref(), Some("cover.png"));
                assert_eq!(file.data, payload);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn id3_sentinels_and_comment_list() {
        let mut decoder = EventDecoder::new();
        let title = CString::new("Song").unwrap();
        let lang = CString::new("eng").unwrap();
        let text = CString::new("hello").unwrap();
        let comment = RawId3Comment {
            next: ptr::null(),
            lang: lang.as_ptr(),
            short_content_desc: ptr::null(),
            full_text: text.as_ptr(),
        };
        let raw = RawEvent {
            event: abi::EVENT_ID3,
            u: RawEventUnion {
                id3: abi::RawId3 {
                    program: 0,
                    title: title.as_ptr(),
                    artist: ptr::null(),
                    album: ptr::null(),
                    genre: ptr::null(),
                    ufid: abi::RawUfid {
                        owner: ptr::null(),
                        id: ptr::null(),
                    },
                    xhdr: abi::RawXhdr {
                        mime: 0,
                        param: -1,
                        lot: -1,
                    },
                    comments: &comment,
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::Id3(id3) => {
                assert_eq!(id3.title.as_deref(), Some("Song"));
                assert_eq!(id3.artist, None);
                assert_eq!(id3.ufid, None);
                assert_eq!(id3.xhdr, None);
                assert_eq!(id3.comments.len(), 1);
                assert_eq!(id3.comments[0].language.as_deref(), Some("eng"));
                assert_eq!(id3.comments[0].short_description, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn station_location_nan_is_absent() {
        let mut decoder = EventDecoder::new();
        let raw = RawEvent {
            event: abi::EVENT_STATION_LOCATION,
            u: RawEventUnion {
                station_location: abi::RawStationLocation {
                    latitude: f32::NAN,
                    longitude: f32::NAN,
                    altitude: 0,
                },
            },
        };
        match unsafe { decoder.decode(&raw) }.unwrap().unwrap() {
            Event::StationLocation {
                latitude,
                longitude,
                ..
            } => {
                assert_eq!(latitude, None);
                assert_eq!(longitude, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    /// The dispatcher drops undecodable events and keeps delivering the
    /// well-formed ones.
    #[test]
    fn dispatcher_drops_and_continues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut dispatcher = Dispatcher::new(move |event| sink.lock().unwrap().push(event));

        // Unresolved stream reference: dropped, not fatal.
        let comp = audio_component(0, 1, MIME_HDC);
        let service = RawSigService {
            next: ptr::null(),
            kind: abi::SIG_SERVICE_AUDIO,
            number: 5,
            name: ptr::null(),
            components: &comp,
        };
        let stream = RawEvent {
            event: abi::EVENT_STREAM,
            u: RawEventUnion {
                stream: RawDataUnit {
                    port: 1,
                    seq: 0,
                    size: 0,
                    mime: 0,
                    data: ptr::null(),
                    service: &service,
                    component: &comp,
                },
            },
        };
        unsafe {
            dispatcher.dispatch(&stream);
            dispatcher.dispatch(ptr::null());
            dispatcher.dispatch(&RawEvent::tag_only(abi::EVENT_LOST_SYNC));
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[Event::LostSync]);
    }
}
