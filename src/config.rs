//! Desired configuration file
//!
//! ```toml
//! [provider]
//! url = "https://console.cratedb.cloud"
//!
//! [resources.organization.main]
//! name = "acme"
//!
//! [resources.project.web]
//! name = "web"
//! organization_id = "…"
//! region = "aks1.eastus2.azure"
//! ```
//!
//! Each `[resources.<kind>.<name>]` table declares one instance, addressed
//! as `kind.name`. Credentials usually come from the environment instead of
//! the `[provider]` table.

use anyhow::{Context, Result, bail};
use cratedb::ProviderSettings;
use declarative::{Record, mapper};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::resource::CloudRegistry;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG: &str = "cratedb.toml";

static NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").ok());

/// Config file as written on disk
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    provider: ProviderSettings,
    #[serde(default)]
    resources: BTreeMap<String, BTreeMap<String, toml::Table>>,
}

/// One declared instance
#[derive(Debug, Clone)]
pub struct DesiredInstance {
    pub kind: String,
    pub record: Record,
}

/// Parsed and type-checked desired configuration
#[derive(Debug, Default)]
pub struct DesiredConfig {
    pub provider: ProviderSettings,
    /// Declared instances by address
    pub instances: BTreeMap<String, DesiredInstance>,
}

impl DesiredConfig {
    /// Load from a file. A missing file is an error.
    pub fn load(path: &Path, registry: &CloudRegistry) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content, registry)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse config text. Every problem in every instance is reported.
    pub fn parse(content: &str, registry: &CloudRegistry) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;

        let mut instances = BTreeMap::new();
        let mut problems = Vec::new();

        for (kind, declared) in &file.resources {
            let descriptor = match registry.descriptor(kind) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    problems.push(format!("resources.{}: {}", kind, e));
                    continue;
                }
            };

            for (name, table) in declared {
                let address = address(kind, name);
                if !is_valid_name(name) {
                    problems.push(format!(
                        "{}: instance names may contain only letters, digits, '_' and '-'",
                        address
                    ));
                    continue;
                }

                let document = serde_json::to_value(table)
                    .with_context(|| format!("Failed to convert {}", address))?;
                match mapper::from_document(descriptor, &document) {
                    Ok(record) => {
                        instances.insert(
                            address,
                            DesiredInstance {
                                kind: kind.clone(),
                                record,
                            },
                        );
                    }
                    Err(violations) => {
                        for violation in violations {
                            problems.push(format!("{}.{}", address, violation));
                        }
                    }
                }
            }
        }

        if !problems.is_empty() {
            bail!("{}", problems.join("\n"));
        }

        log::debug!("Loaded {} declared instances", instances.len());
        Ok(Self {
            provider: file.provider,
            instances,
        })
    }

    pub fn get(&self, address: &str) -> Option<&DesiredInstance> {
        self.instances.get(address)
    }
}

/// Address of an instance
pub fn address(kind: &str, name: &str) -> String {
    format!("{}.{}", kind, name)
}

/// Split `kind.name` into its parts
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    address
        .split_once('.')
        .filter(|(kind, name)| !kind.is_empty() && is_valid_name(name))
}

fn is_valid_name(name: &str) -> bool {
    NAME.as_ref().is_some_and(|re| re.is_match(name))
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource;
    use declarative::Value;

    const SAMPLE: &str = r#"
[provider]
url = "https://console.cratedb.cloud"
api_key = "key"

[resources.organization.main]
name = "acme"

[resources.cluster.analytics]
organization_id = "org-1"
name = "analytics"
crate_version = "5.6.0"
product_name = "cr4"
product_tier = "default"
product_unit = 1
project_id = "00000002-0000-4000-8000-000000000002"
subscription_id = "sub-1"
username = "admin"
password = "correct-horse-battery-staple"
"#;

    #[test]
    fn test_parse_sample() {
        let registry = resource::registry().unwrap();
        let config = DesiredConfig::parse(SAMPLE, &registry).unwrap();

        assert_eq!(config.provider.api_key.as_deref(), Some("key"));
        assert_eq!(config.instances.len(), 2);

        let org = config.get("organization.main").unwrap();
        assert_eq!(org.kind, "organization");
        assert_eq!(org.record.get_str("name"), Some("acme"));

        let cluster = config.get("cluster.analytics").unwrap();
        assert_eq!(cluster.record.get("product_unit"), Some(&Value::Int32(1)));
        // Absent optional attributes stay absent
        assert!(!cluster.record.contains("channel"));
    }

    #[test]
    fn test_empty_config() {
        let registry = resource::registry().unwrap();
        let config = DesiredConfig::parse("", &registry).unwrap();
        assert!(config.instances.is_empty());
        assert!(config.provider.url.is_none());
    }

    #[test]
    fn test_every_problem_reported() {
        let registry = resource::registry().unwrap();
        let content = r#"
[resources.database.main]
name = "x"

[resources.organization.main]
name = 42

[resources.project.web]
name = "web"
region = true
"#;
        let err = DesiredConfig::parse(content, &registry).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("resources.database"));
        assert!(message.contains("organization.main.name"));
        assert!(message.contains("project.web.region"));
    }

    #[test]
    fn test_unknown_provider_setting_rejected() {
        let registry = resource::registry().unwrap();
        let err = DesiredConfig::parse("[provider]\ntoken = \"x\"\n", &registry).unwrap_err();
        assert!(format!("{:#}", err).contains("token"));
    }

    #[test]
    fn test_split_address() {
        assert_eq!(split_address("cluster.analytics"), Some(("cluster", "analytics")));
        assert_eq!(split_address("cluster"), None);
        assert_eq!(split_address(".x"), None);
        assert_eq!(split_address("cluster.a.b"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let registry = resource::registry().unwrap();
        let err = DesiredConfig::load(Path::new("/nonexistent/cratedb.toml"), &registry).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_expand_path_keeps_plain_paths() {
        assert_eq!(expand_path("state.json"), PathBuf::from("state.json"));
    }
}
