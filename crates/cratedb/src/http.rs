//! HTTP gateway backed by `ureq`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde_json::Value as Json;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::gateway::{Gateway, Response, paths};
use crate::retry::{RetryConfig, with_retry};

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// Gateway talking to a real CrateDB Cloud API.
///
/// # Example
///
/// ```no_run
/// use cratedb::{ClientConfig, HttpGateway, ProviderSettings};
///
/// let config = ClientConfig::from_env(&ProviderSettings::default()).unwrap();
/// let gateway = HttpGateway::new(&config);
/// ```
pub struct HttpGateway {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API base URL, without trailing slash.
    base_url: String,
    /// Precomputed `Authorization` header value.
    authorization: String,
    retry: RetryConfig,
}

impl HttpGateway {
    /// Create a gateway from resolved configuration.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .into();

        Self {
            agent,
            base_url: config.url.clone(),
            authorization: basic_auth(&config.api_key, &config.api_secret),
            retry: config.retry.clone(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send(&self, method: Method, path: &str, body: Option<&Json>) -> Result<Response> {
        let url = self.url(path);
        let what = format!("{} {}", method.as_str(), path);
        with_retry(&self.retry, &what, || {
            debug!("{}", what);
            let response = self.send_once(method, &url, body)?;
            debug!("{} -> {} {}", what, response.status, response.status_text);
            Ok(response)
        })
    }

    fn send_once(&self, method: Method, url: &str, body: Option<&Json>) -> Result<Response> {
        let empty = Json::Object(serde_json::Map::new());
        let body = body.unwrap_or(&empty);

        let result = match method {
            Method::Get => self.authorize(self.agent.get(url)).call(),
            Method::Delete => self.authorize(self.agent.delete(url)).call(),
            Method::Post => self.authorize(self.agent.post(url)).send_json(body),
            Method::Put => self.authorize(self.agent.put(url)).send_json(body),
            Method::Patch => self.authorize(self.agent.patch(url)).send_json(body),
        };

        let mut response = result.map_err(|e| Error::transport(url, &e))?;
        let status = response.status();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Error::transport(url, &e))?;

        Ok(Response::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
        ))
    }

    fn authorize<B>(&self, request: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        request
            .header("Authorization", self.authorization.as_str())
            .header("Accept", "application/json")
    }
}

fn basic_auth(key: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", key, secret)))
}

impl Gateway for HttpGateway {
    fn create_organization(&self, body: &Json) -> Result<Response> {
        self.send(Method::Post, paths::ORGANIZATIONS, Some(body))
    }

    fn get_organization(&self, id: &str) -> Result<Response> {
        self.send(Method::Get, &paths::organization(id), None)
    }

    fn update_organization(&self, id: &str, body: &Json) -> Result<Response> {
        self.send(Method::Put, &paths::organization(id), Some(body))
    }

    fn delete_organization(&self, id: &str) -> Result<Response> {
        self.send(Method::Delete, &paths::organization(id), None)
    }

    fn list_organizations(&self) -> Result<Response> {
        self.send(Method::Get, paths::ORGANIZATIONS, None)
    }

    fn create_project(&self, body: &Json) -> Result<Response> {
        self.send(Method::Post, paths::PROJECTS, Some(body))
    }

    fn get_project(&self, id: &str) -> Result<Response> {
        self.send(Method::Get, &paths::project(id), None)
    }

    fn update_project(&self, id: &str, body: &Json) -> Result<Response> {
        self.send(Method::Patch, &paths::project(id), Some(body))
    }

    fn delete_project(&self, id: &str) -> Result<Response> {
        self.send(Method::Delete, &paths::project(id), None)
    }

    fn create_cluster(&self, organization_id: &str, body: &Json) -> Result<Response> {
        self.send(
            Method::Post,
            &paths::organization_clusters(organization_id),
            Some(body),
        )
    }

    fn get_cluster(&self, id: &str) -> Result<Response> {
        self.send(Method::Get, &paths::cluster(id), None)
    }

    fn update_cluster(&self, id: &str, body: &Json) -> Result<Response> {
        self.send(Method::Patch, &paths::cluster(id), Some(body))
    }

    fn delete_cluster(&self, id: &str) -> Result<Response> {
        self.send(Method::Delete, &paths::cluster(id), None)
    }
}
