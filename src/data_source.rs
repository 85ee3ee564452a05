//! Read-only data sources
//!
//! Lookups that never touch state: one organization, project or cluster by
//! id, or every organization the credentials can see. Results come back as
//! documents keyed by attribute name, the same shape the state file uses.

use anyhow::{Result, bail};
use cratedb::Gateway;
use declarative::{EngineError, Record, mapper};
use serde_json::Value as Json;
use std::fmt;
use std::str::FromStr;

use crate::resource::CloudRegistry;

/// Available data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Organization,
    Organizations,
    Project,
    Cluster,
}

impl DataSource {
    pub const ALL: [DataSource; 4] = [
        Self::Organization,
        Self::Organizations,
        Self::Project,
        Self::Cluster,
    ];

    /// Resource kind the data source reads
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Organization | Self::Organizations => "organization",
            Self::Project => "project",
            Self::Cluster => "cluster",
        }
    }

    pub fn needs_id(&self) -> bool {
        !matches!(self, Self::Organizations)
    }

    /// Read the data source. Single lookups yield one document, listings an
    /// array.
    pub fn read(
        &self,
        registry: &CloudRegistry,
        gateway: &(dyn Gateway + 'static),
        id: Option<&str>,
    ) -> Result<Json> {
        let reconciler = registry.reconciler(self.kind(), gateway)?;
        let descriptor = reconciler.descriptor();

        if !self.needs_id() {
            let records = reconciler.list()?;
            let documents = records
                .iter()
                .map(|record| mapper::to_document(descriptor, record))
                .collect::<declarative::Result<Vec<_>>>()?;
            log::debug!("{} returned {} entries", self, documents.len());
            return Ok(Json::Array(documents));
        }

        let Some(id) = id.filter(|id| !id.is_empty()) else {
            bail!("The {} data source needs an id", self);
        };

        let record: Record = match reconciler.import(id) {
            Ok(record) => record,
            Err(EngineError::ResourceGone { .. }) => {
                bail!("{} '{}' not found", self.kind(), id)
            }
            Err(e) => return Err(e.into()),
        };
        Ok(mapper::to_document(descriptor, &record)?)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Organization => "organization",
            Self::Organizations => "organizations",
            Self::Project => "project",
            Self::Cluster => "cluster",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|source| source.to_string() == s)
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(ToString::to_string).collect();
                anyhow::anyhow!(
                    "Unknown data source '{}'. Available: {}",
                    s,
                    names.join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource;
    use cratedb::{Call, MockGateway};
    use serde_json::json;

    fn organization(mock: &MockGateway, name: &str) -> String {
        let response = mock.create_organization(&json!({ "name": name })).unwrap();
        let body: Json = serde_json::from_str(&response.body).unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_parse() {
        assert_eq!("organizations".parse::<DataSource>().unwrap(), DataSource::Organizations);
        assert_eq!("cluster".parse::<DataSource>().unwrap(), DataSource::Cluster);
        let err = "database".parse::<DataSource>().unwrap_err();
        assert!(err.to_string().contains("Available: organization, organizations"));
    }

    #[test]
    fn test_read_organization() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let id = organization(&mock, "acme");

        let document = DataSource::Organization
            .read(&registry, &mock, Some(&id))
            .unwrap();
        assert_eq!(document["name"], "acme");
        assert_eq!(document["id"], id.as_str());
        assert!(document["email"].is_null());
        assert_eq!(mock.count(Call::GetOrganization), 1);
    }

    #[test]
    fn test_list_organizations() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        organization(&mock, "a");
        organization(&mock, "b");

        let document = DataSource::Organizations.read(&registry, &mock, None).unwrap();
        assert_eq!(document.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_missing_is_not_found() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let err = DataSource::Project
            .read(&registry, &mock, Some("nope"))
            .unwrap_err();
        assert_eq!(err.to_string(), "project 'nope' not found");
    }

    #[test]
    fn test_id_required() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let err = DataSource::Cluster.read(&registry, &mock, None).unwrap_err();
        assert!(err.to_string().contains("needs an id"));
        assert!(mock.calls().is_empty());
    }
}
