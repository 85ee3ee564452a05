//! Project resource
//!
//! Projects live in an organization and are pinned to a region. Moving a
//! project to another region means destroying and recreating it.

use cratedb::Gateway;
use declarative::schema::{AttrType, AttributeSpec};
use declarative::{Record, RemoteResponse, ResourceDescriptor, ResourceKind, Result};
use serde_json::Value as Json;

use super::{dc, remote};

/// A CrateDB Cloud project
#[derive(Debug)]
pub struct Project {
    descriptor: ResourceDescriptor,
}

impl Project {
    pub fn new() -> Result<Self> {
        let descriptor = ResourceDescriptor::new(
            "project",
            "Creates and manages a project.",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String)
                    .remote_required()
                    .describe("The id of the project."),
                AttributeSpec::required("name", AttrType::String)
                    .updatable()
                    .remote_required()
                    .describe("The name of the project."),
                AttributeSpec::required("organization_id", AttrType::String)
                    .remote_required()
                    .describe("The organization id of the project."),
                AttributeSpec::required("region", AttrType::String)
                    .requires_replace()
                    .remote_required()
                    .describe("The region of the project."),
                dc("The DublinCore of the project."),
            ],
        )?;
        Ok(Self { descriptor })
    }
}

impl ResourceKind<dyn Gateway> for Project {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn rank(&self) -> u8 {
        1
    }

    fn remote_create(
        &self,
        gateway: &dyn Gateway,
        _planned: &Record,
        body: &Json,
    ) -> Result<RemoteResponse> {
        remote(gateway.create_project(body))
    }

    fn remote_read(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.get_project(id))
    }

    fn remote_update(&self, gateway: &dyn Gateway, id: &str, body: &Json) -> Result<RemoteResponse> {
        remote(gateway.update_project(id, body))
    }

    fn remote_delete(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.delete_project(id))
    }
}
