//! Resource kind trait for declarative state management
//!
//! A kind binds a [`ResourceDescriptor`] to the remote calls that manage
//! instances of it. The engine is generic over the gateway type `G`, so kinds
//! decide how requests are issued and the reconciler decides when.

use serde_json::Value as Json;

use crate::error::Result;
use crate::mapper::{self, Purpose};
use crate::schema::ResourceDescriptor;
use crate::types::Record;

/// Raw answer from the remote system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// Any 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Core trait for a managed resource kind
///
/// Implementors supply the descriptor and the four remote calls. Body
/// shaping defaults to the generic mapper; kinds whose endpoints expect a
/// different envelope override [`ResourceKind::encode`] or
/// [`ResourceKind::decode`].
///
/// # Example
///
/// ```ignore
/// struct Widget;
///
/// impl ResourceKind<dyn WidgetApi> for Widget {
///     fn descriptor(&self) -> &ResourceDescriptor { &WIDGET }
///
///     fn remote_create(&self, api: &dyn WidgetApi, _planned: &Record, body: &Json)
///         -> Result<RemoteResponse> {
///         api.post("/widgets", body)
///     }
///     // remote_read, remote_update, remote_delete ...
/// }
/// ```
pub trait ResourceKind<G: ?Sized>: Send + Sync {
    /// Static descriptor for this kind
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Kind name, as used in addresses
    fn name(&self) -> &'static str {
        self.descriptor().kind()
    }

    /// Dependency depth. Kinds that other kinds live inside have a lower
    /// rank; the executor creates in ascending and deletes in descending
    /// rank order.
    fn rank(&self) -> u8 {
        0
    }

    /// Build a request body for `record`
    fn encode(&self, record: &Record, purpose: Purpose) -> Result<Json> {
        mapper::encode(self.descriptor(), record, purpose)
    }

    /// Map a response body onto a record
    fn decode(&self, raw: &Json) -> Result<Record> {
        mapper::decode(self.descriptor(), raw)
    }

    /// Create an instance. `planned` carries local attributes such as path
    /// parameters.
    fn remote_create(&self, gateway: &G, planned: &Record, body: &Json) -> Result<RemoteResponse>;

    /// Fetch an instance by identity
    fn remote_read(&self, gateway: &G, id: &str) -> Result<RemoteResponse>;

    /// Update an instance in place
    fn remote_update(&self, gateway: &G, id: &str, body: &Json) -> Result<RemoteResponse>;

    /// Delete an instance
    fn remote_delete(&self, gateway: &G, id: &str) -> Result<RemoteResponse>;

    /// List every visible instance; `None` when the kind cannot be listed
    fn remote_list(&self, _gateway: &G) -> Option<Result<RemoteResponse>> {
        None
    }
}
