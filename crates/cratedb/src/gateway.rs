//! Gateway trait for the CrateDB Cloud API.
//!
//! One method per resource kind and action. Implementations return the raw
//! status and body of whatever the API answered; interpreting statuses is
//! up to the caller.

use serde_json::Value as Json;

use crate::error::Result;

/// Raw API answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase, e.g. "Not Found".
    pub status_text: String,
    /// Response body, possibly empty.
    pub body: String,
}

impl Response {
    /// Create a response.
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    /// Create a response with a JSON body and the standard reason phrase.
    pub fn json(status: u16, body: &Json) -> Self {
        Self::new(status, reason_phrase(status), body.to_string())
    }

    /// Create a response with an empty body and the standard reason phrase.
    pub fn empty(status: u16) -> Self {
        Self::new(status, reason_phrase(status), "")
    }

    /// Any 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Standard reason phrase for the statuses the API uses.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// API paths, relative to the base URL.
pub mod paths {
    /// Organizations collection.
    pub const ORGANIZATIONS: &str = "/api/v2/organizations/";
    /// Projects collection.
    pub const PROJECTS: &str = "/api/v2/projects/";
    /// Clusters collection.
    pub const CLUSTERS: &str = "/api/v2/clusters/";

    /// One organization.
    pub fn organization(id: &str) -> String {
        format!("{}{}/", ORGANIZATIONS, id)
    }

    /// One project.
    pub fn project(id: &str) -> String {
        format!("{}{}/", PROJECTS, id)
    }

    /// One cluster.
    pub fn cluster(id: &str) -> String {
        format!("{}{}/", CLUSTERS, id)
    }

    /// Cluster collection of an organization (cluster creation).
    pub fn organization_clusters(organization_id: &str) -> String {
        format!("{}{}/clusters/", ORGANIZATIONS, organization_id)
    }
}

/// Remote control plane for organizations, projects and clusters.
///
/// Errors mean no response was obtained. Every HTTP status, including 4xx
/// and 5xx, is returned as an `Ok(Response)`.
pub trait Gateway: Send + Sync {
    /// `POST /api/v2/organizations/`
    fn create_organization(&self, body: &Json) -> Result<Response>;
    /// `GET /api/v2/organizations/{id}/`
    fn get_organization(&self, id: &str) -> Result<Response>;
    /// `PUT /api/v2/organizations/{id}/`
    fn update_organization(&self, id: &str, body: &Json) -> Result<Response>;
    /// `DELETE /api/v2/organizations/{id}/`
    fn delete_organization(&self, id: &str) -> Result<Response>;
    /// `GET /api/v2/organizations/`
    fn list_organizations(&self) -> Result<Response>;

    /// `POST /api/v2/projects/`
    fn create_project(&self, body: &Json) -> Result<Response>;
    /// `GET /api/v2/projects/{id}/`
    fn get_project(&self, id: &str) -> Result<Response>;
    /// `PATCH /api/v2/projects/{id}/`
    fn update_project(&self, id: &str, body: &Json) -> Result<Response>;
    /// `DELETE /api/v2/projects/{id}/`
    fn delete_project(&self, id: &str) -> Result<Response>;

    /// `POST /api/v2/organizations/{organization_id}/clusters/`
    fn create_cluster(&self, organization_id: &str, body: &Json) -> Result<Response>;
    /// `GET /api/v2/clusters/{id}/`
    fn get_cluster(&self, id: &str) -> Result<Response>;
    /// `PATCH /api/v2/clusters/{id}/`
    fn update_cluster(&self, id: &str, body: &Json) -> Result<Response>;
    /// `DELETE /api/v2/clusters/{id}/`
    fn delete_cluster(&self, id: &str) -> Result<Response>;
}
