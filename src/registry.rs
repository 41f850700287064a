//! Session-scoped service registry.
//!
//! Each SIG event replaces the whole registry; there is no incremental
//! merge. STREAM/PACKET/LOT events arriving afterwards resolve their
//! service/component back-references against whichever generation is current;
//! stale keys from an earlier generation must not resolve. The registry is
//! owned and mutated only from the callback thread, so it needs no locking.

use std::collections::HashMap;

use tracing::debug;

use crate::event::{Origin, Service};

/// Maps service numbers to the current SIG generation's service graph.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<u16, Service>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True before any SIG event has been seen (or after a SIG event that
    /// carried no services).
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Replace the registry with a new SIG generation. Not a merge: every
    /// previous entry is discarded.
    pub fn replace(&mut self, services: &[Service]) {
        self.services.clear();
        for service in services {
            self.services.insert(service.number, service.clone());
        }
        debug!(services = self.services.len(), "service registry replaced");
    }

    /// Look up a service by number.
    pub fn service(&self, number: u16) -> Option<&Service> {
        self.services.get(&number)
    }

    /// Resolve a (service number, component id) reference into an owned
    /// [`Origin`]. Absence is a normal outcome the caller must handle.
    pub fn resolve(&self, number: u16, component_id: u8) -> Option<Origin> {
        let service = self.services.get(&number)?;
        let component = service.component(component_id)?;
        Some(Origin {
            service: service.clone(),
            component: component.clone(),
        })
    }
}
