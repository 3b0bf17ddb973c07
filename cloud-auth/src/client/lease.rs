//! Client lease with signature-based invalidation.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::ClientFactory;
use crate::credentials::{CredentialRecord, CredentialSignature};
use crate::error::{client_error, ClientErrorKind, Error};

struct Slot<C> {
    service: String,
    handle: Option<Arc<C>>,
}

/// Named client handles owned by one handler instance.
///
/// Each slot maps a name (e.g. "control", "data") to a service and at most one
/// live handle. The lease remembers the signature of the credentials its
/// handles were built with; [`ensure`](Self::ensure) drops the requested
/// handles when that signature changes and lazily rebuilds whatever is empty.
///
/// `ensure` takes `&mut self`: a lease serves one invocation at a time and is
/// never shared between owners.
pub struct ClientLease<F: ClientFactory> {
    factory: F,
    slots: BTreeMap<String, Slot<F::Client>>,
    signature: Option<CredentialSignature>,
}

impl<F: ClientFactory> ClientLease<F> {
    /// Create an empty lease backed by `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slots: BTreeMap::new(),
            signature: None,
        }
    }

    /// Register a slot that will hold a client for `service`.
    pub fn with_slot(mut self, slot: &str, service: &str) -> Self {
        self.slots.insert(
            slot.to_string(),
            Slot {
                service: service.to_string(),
                handle: None,
            },
        );
        self
    }

    /// Make sure every slot in `slots` holds a client built for `credentials`.
    ///
    /// When the credential signature differs from the stored one, the handles
    /// of the named slots are dropped before the new signature is stored. Empty
    /// slots are then constructed through the factory.
    pub fn ensure(&mut self, credentials: &CredentialRecord, slots: &[&str]) -> Result<(), Error> {
        if let Some(unknown) = slots.iter().find(|name| !self.slots.contains_key(**name)) {
            return Err(client_error(
                ClientErrorKind::UnknownSlot,
                &format!("slot '{}' is not registered", unknown),
            ));
        }

        let signature = credentials.signature();
        if self.signature.as_ref() != Some(&signature) {
            for name in slots {
                if let Some(slot) = self.slots.get_mut(*name) {
                    if slot.handle.take().is_some() {
                        debug!("Credentials changed, dropping cached '{}' client", name);
                    }
                }
            }
            self.signature = Some(signature);
        }

        for name in slots {
            if let Some(slot) = self.slots.get_mut(*name) {
                if slot.handle.is_none() {
                    debug!(
                        "Building '{}' client for service {} in {}",
                        name,
                        slot.service,
                        credentials.region()
                    );
                    let client = self.factory.create(&slot.service, credentials)?;
                    slot.handle = Some(Arc::new(client));
                }
            }
        }

        Ok(())
    }

    /// Ensure every registered slot.
    pub fn ensure_all(&mut self, credentials: &CredentialRecord) -> Result<(), Error> {
        let names: Vec<String> = self.slots.keys().cloned().collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        self.ensure(credentials, &names)
    }

    /// Read the handle held by `slot`.
    pub fn get(&self, slot: &str) -> Result<Arc<F::Client>, Error> {
        let entry = self.slots.get(slot).ok_or_else(|| {
            client_error(
                ClientErrorKind::UnknownSlot,
                &format!("slot '{}' is not registered", slot),
            )
        })?;

        entry.handle.clone().ok_or_else(|| {
            client_error(
                ClientErrorKind::NotReady,
                &format!("slot '{}' has no client; call ensure first", slot),
            )
        })
    }

    /// Whether `slot` currently holds a client.
    pub fn is_live(&self, slot: &str) -> bool {
        self.slots
            .get(slot)
            .map(|entry| entry.handle.is_some())
            .unwrap_or(false)
    }

    /// Get a reference to the factory.
    pub fn factory(&self) -> &F {
        &self.factory
    }
}
