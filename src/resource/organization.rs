//! Organization resource
//!
//! The top of the containment tree. Only the name is user-settable; the
//! update endpoint replaces the whole object (`PUT`) but accepts the name
//! alone.

use cratedb::Gateway;
use declarative::schema::{AttrType, AttributeSpec};
use declarative::{Record, RemoteResponse, ResourceDescriptor, ResourceKind, Result};
use serde_json::Value as Json;

use super::{dc, remote};

/// A CrateDB Cloud organization
#[derive(Debug)]
pub struct Organization {
    descriptor: ResourceDescriptor,
}

impl Organization {
    pub fn new() -> Result<Self> {
        let descriptor = ResourceDescriptor::new(
            "organization",
            "Creates and manages an organization.",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String)
                    .remote_required()
                    .describe("The id of the organization."),
                AttributeSpec::required("name", AttrType::String)
                    .updatable()
                    .remote_required()
                    .describe("The name of the organization."),
                AttributeSpec::computed("email", AttrType::String)
                    .describe("The notification email used in the organization."),
                AttributeSpec::computed("notifications_enabled", AttrType::Bool)
                    .describe("Whether notifications enabled for the organization."),
                AttributeSpec::computed("plan_type", AttrType::Int32)
                    .describe("The support plan type used in the organization."),
                AttributeSpec::computed("project_count", AttrType::Int32)
                    .describe("The project count in the organization."),
                AttributeSpec::computed("role_fqn", AttrType::String).describe("The role FQN."),
                dc("The DublinCore of the organization."),
            ],
        )?;
        Ok(Self { descriptor })
    }
}

impl ResourceKind<dyn Gateway> for Organization {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn remote_create(
        &self,
        gateway: &dyn Gateway,
        _planned: &Record,
        body: &Json,
    ) -> Result<RemoteResponse> {
        remote(gateway.create_organization(body))
    }

    fn remote_read(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.get_organization(id))
    }

    fn remote_update(&self, gateway: &dyn Gateway, id: &str, body: &Json) -> Result<RemoteResponse> {
        remote(gateway.update_organization(id, body))
    }

    fn remote_delete(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.delete_organization(id))
    }

    fn remote_list(&self, gateway: &dyn Gateway) -> Option<Result<RemoteResponse>> {
        Some(remote(gateway.list_organizations()))
    }
}
