//! CrateDB Cloud resource kinds
//!
//! Each kind pairs a descriptor with the gateway calls that manage its
//! instances. Kinds are ranked by containment: organizations hold projects,
//! projects hold clusters.

use cratedb::{Gateway, Response};
use declarative::schema::{AttrType, AttributeSpec};
use declarative::{EngineError, Registry, RemoteResponse};

pub mod cluster;
pub mod organization;
pub mod project;

pub use cluster::Cluster;
pub use organization::Organization;
pub use project::Project;

/// Registry of every kind, bound to the CrateDB Cloud gateway
pub type CloudRegistry = Registry<dyn Gateway>;

/// Build the registry. Fails only if a descriptor table is malformed.
pub fn registry() -> declarative::Result<CloudRegistry> {
    let mut registry = CloudRegistry::new();
    registry.register(Box::new(Organization::new()?))?;
    registry.register(Box::new(Project::new()?))?;
    registry.register(Box::new(Cluster::new()?))?;
    Ok(registry)
}

/// Convert a gateway answer into the engine's representation
pub(crate) fn remote(result: cratedb::Result<Response>) -> declarative::Result<RemoteResponse> {
    match result {
        Ok(response) => Ok(RemoteResponse::new(
            response.status,
            response.status_text,
            response.body,
        )),
        Err(e) => Err(EngineError::transport(e.to_string())),
    }
}

/// DublinCore timestamps carried by every object
pub(crate) fn dc(owner: &'static str) -> AttributeSpec {
    AttributeSpec::computed(
        "dc",
        AttrType::Object(vec![
            AttributeSpec::computed_once("created", AttrType::String).describe("The created time."),
            AttributeSpec::computed("modified", AttrType::String).describe("The modified time."),
        ]),
    )
    .remote_required()
    .describe(owner)
}
