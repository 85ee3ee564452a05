//! CRUD reconciliation for one resource kind.
//!
//! The reconciler sequences validation, plan resolution, body encoding, the
//! remote call, response decoding and the preserved-field merge. It issues
//! at most one remote call per operation and never retries; transport
//! retries belong to the gateway.

use log::{debug, warn};
use serde_json::Value as Json;

use crate::diff::InstanceDiff;
use crate::error::{EngineError, Result};
use crate::mapper::{self, Purpose};
use crate::plan;
use crate::resource::{RemoteResponse, ResourceKind};
use crate::schema::ResourceDescriptor;
use crate::types::Record;

/// Reconciler bound to one kind and one gateway
pub struct Reconciler<'a, G: ?Sized> {
    kind: &'a dyn ResourceKind<G>,
    gateway: &'a G,
}

impl<'a, G: ?Sized> Reconciler<'a, G> {
    pub fn new(kind: &'a dyn ResourceKind<G>, gateway: &'a G) -> Self {
        Self { kind, gateway }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        self.kind.descriptor()
    }

    fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Classify what converging `address` requires
    pub fn plan(
        &self,
        address: &str,
        desired: Option<&Record>,
        prior: Option<&Record>,
    ) -> Result<InstanceDiff> {
        InstanceDiff::compute(self.descriptor(), address, desired, prior)
    }

    /// Create a new instance from desired configuration
    pub fn create(&self, desired: &Record) -> Result<Record> {
        let descriptor = self.descriptor();
        let defaulted = descriptor.with_defaults(desired);
        descriptor.check(&defaulted)?;

        let planned = plan::resolve(descriptor, &defaulted, None)?.planned_record();
        let body = self.kind.encode(&planned, mapper::Purpose::Create)?;

        debug!("Creating {}", self.kind_name());
        let response = self.kind.remote_create(self.gateway, &planned, &body)?;
        let mut state = self.accept(response)?;
        mapper::merge_preserved(descriptor, &mut state, &planned, None);

        let Some(id) = descriptor.identity_of(&state) else {
            return Err(EngineError::mapping(
                self.kind_name(),
                descriptor.identity(),
                "remote system returned no identity",
            ));
        };
        debug!("Created {} {}", self.kind_name(), id);
        Ok(state)
    }

    /// Refresh an instance from the remote system
    pub fn read(&self, prior: &Record) -> Result<Record> {
        let id = self.identity(prior)?;

        debug!("Reading {} {}", self.kind_name(), id);
        let response = self.kind.remote_read(self.gateway, id)?;
        if response.is_not_found() {
            return Err(EngineError::ResourceGone {
                kind: self.kind_name().to_string(),
                id: id.to_string(),
            });
        }

        let mut state = self.accept(response)?;
        mapper::merge_preserved(self.descriptor(), &mut state, prior, Some(prior));
        Ok(state)
    }

    /// Update an instance in place
    pub fn update(&self, desired: &Record, prior: &Record) -> Result<Record> {
        let descriptor = self.descriptor();
        descriptor.check(desired)?;
        let id = self.identity(prior)?;

        let delta = plan::resolve(descriptor, desired, Some(prior))?;
        let mut planned = delta.planned_record();
        for name in delta.ignored() {
            warn!(
                "{} {}: '{}' cannot be changed in place, keeping the current value",
                self.kind_name(),
                id,
                name
            );
            if let Some(value) = prior.get(name) {
                planned.set(name.clone(), value.clone());
            }
        }

        let body = self.kind.encode(&planned, Purpose::Update)?;

        debug!("Updating {} {}", self.kind_name(), id);
        let response = self.kind.remote_update(self.gateway, id, &body)?;
        let mut state = self.accept(response)?;
        mapper::merge_preserved(descriptor, &mut state, &planned, Some(prior));
        Ok(state)
    }

    /// Delete an instance. An instance that is already gone counts as
    /// deleted.
    pub fn delete(&self, prior: &Record) -> Result<()> {
        let id = self.identity(prior)?;

        debug!("Deleting {} {}", self.kind_name(), id);
        let response = self.kind.remote_delete(self.gateway, id)?;
        if response.is_not_found() {
            debug!("{} {} was already gone", self.kind_name(), id);
            return Ok(());
        }
        if !response.is_success() {
            return Err(remote_error(response));
        }
        Ok(())
    }

    /// Adopt an existing remote instance by identity
    pub fn import(&self, id: &str) -> Result<Record> {
        let skeleton = self.descriptor().skeleton(id);
        self.read(&skeleton)
    }

    /// Every instance the remote system lists for this kind
    pub fn list(&self) -> Result<Vec<Record>> {
        let Some(response) = self.kind.remote_list(self.gateway) else {
            return Err(EngineError::schema(
                self.kind_name(),
                "listing is not supported for this kind",
            ));
        };
        let response = response?;
        if !response.is_success() {
            return Err(remote_error(response));
        }

        match self.parse(&response.body)? {
            Json::Array(items) => items.iter().map(|item| self.kind.decode(item)).collect(),
            other => Err(EngineError::mapping(
                self.kind_name(),
                "",
                format!("expected a JSON array, got {}", other),
            )),
        }
    }

    fn identity<'r>(&self, prior: &'r Record) -> Result<&'r str> {
        self.descriptor()
            .identity_of(prior)
            .ok_or_else(|| EngineError::MissingIdentity {
                kind: self.kind_name().to_string(),
                attribute: self.descriptor().identity().to_string(),
            })
    }

    fn accept(&self, response: RemoteResponse) -> Result<Record> {
        if !response.is_success() {
            return Err(remote_error(response));
        }
        let raw = self.parse(&response.body)?;
        self.kind.decode(&raw)
    }

    fn parse(&self, body: &str) -> Result<Json> {
        serde_json::from_str(body).map_err(|e| {
            EngineError::mapping(self.kind_name(), "", format!("invalid JSON body: {}", e))
        })
    }
}

fn remote_error(response: RemoteResponse) -> EngineError {
    EngineError::Remote {
        status: response.status,
        status_text: response.status_text,
        body: response.body,
    }
}
