//! State commands: `show` and `import`

use anyhow::{Result, bail};
use colored::Colorize;
use cratedb::Gateway;
use declarative::{Record, ResourceDescriptor};
use serde_json::Value as Json;

use crate::Context;
use crate::config::{DesiredConfig, split_address};
use crate::resource::CloudRegistry;
use crate::state::StateStore;
use crate::ui;

use super::Workspace;

pub fn show(ctx: &Context, address: Option<&str>) -> Result<()> {
    let ws = Workspace::load_state(ctx)?;

    let entries: Vec<_> = ws
        .store
        .entries()
        .into_iter()
        .filter(|(a, _)| address.is_none_or(|wanted| wanted == a))
        .collect();

    if entries.is_empty() {
        match address {
            Some(address) => bail!("{} is not in state", address),
            None => {
                ui::info(&format!("No resources in {}", ctx.state_path.display()));
                return Ok(());
            }
        }
    }

    for (address, stored) in entries {
        ui::resource(&address);
        let descriptor = ws.registry.descriptor(&stored.kind)?;
        let Json::Object(attributes) = &stored.attributes else {
            continue;
        };
        let width = descriptor
            .attributes()
            .iter()
            .filter(|spec| attributes.contains_key(spec.name))
            .map(|spec| spec.name.len())
            .max()
            .unwrap_or(0);
        for spec in descriptor.attributes() {
            let Some(value) = attributes.get(spec.name) else {
                continue;
            };
            let shown = if spec.sensitive && !value.is_null() {
                "(sensitive value)".dimmed().to_string()
            } else {
                render(value)
            };
            ui::attribute(spec.name, &shown, width);
        }
    }
    Ok(())
}

fn render(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => "null".dimmed().to_string(),
        other => other.to_string(),
    }
}

pub fn import(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let ws = Workspace::load_state(ctx)?;
    let gateway = ws.gateway()?;

    let record = import_instance(&ws.registry, &gateway, &ws.store, &ws.desired, address, id)?;

    ui::success(&format!("Imported {} ({})", address.bold(), id));
    let unknown: Vec<_> = record
        .iter()
        .filter(|(_, v)| v.is_null())
        .map(|(k, _)| k.as_str())
        .collect();
    if !unknown.is_empty() {
        ui::dim(&format!("Not returned by the API: {}", unknown.join(", ")));
    }
    ui::dim("Run `plan` to compare it with the configuration");
    Ok(())
}

/// Read a remote instance by id and record it under `address`.
///
/// Attributes the API never returns (local and sensitive ones) are taken
/// from the configuration when the address is declared there.
pub fn import_instance(
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    store: &StateStore,
    desired: &DesiredConfig,
    address: &str,
    id: &str,
) -> Result<Record> {
    let Some((kind, _)) = split_address(address) else {
        bail!("Invalid address '{}', expected kind.name", address);
    };
    if store.get(address).is_some() {
        bail!("{} is already managed; remove it from state first", address);
    }

    let reconciler = registry.reconciler(kind, gateway)?;
    let mut record = reconciler.import(id)?;

    if let Some(instance) = desired.get(address) {
        fill_unreadable(reconciler.descriptor(), &mut record, &instance.record);
    }

    store.put(address, reconciler.descriptor(), Some(&record))?;
    Ok(record)
}

fn fill_unreadable(descriptor: &ResourceDescriptor, record: &mut Record, declared: &Record) {
    for spec in descriptor.attributes() {
        if !(spec.local || spec.sensitive) {
            continue;
        }
        let missing = record.get(spec.name).is_none_or(|v| !v.is_present());
        if let (true, Some(value)) = (missing, declared.get(spec.name)) {
            log::debug!("Taking {} from configuration", spec.name);
            record.set(spec.name, value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PlanOptions, build_plan};
    use crate::resource;
    use cratedb::MockGateway;
    use declarative::{Action, Value};
    use serde_json::json;
    use tempfile::TempDir;

    fn created_id(response: cratedb::Result<cratedb::Response>) -> String {
        let body: Json = serde_json::from_str(&response.unwrap().body).unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_import_cluster_with_declared_config() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(&dir.path().join("state.json")).unwrap();

        let org_id = created_id(mock.create_organization(&json!({"name": "acme"})));
        let project_id = created_id(mock.create_project(&json!({
            "name": "web",
            "organization_id": org_id,
            "region": "aks1.eastus2.azure",
        })));
        let cluster_id = created_id(mock.create_cluster(
            &org_id,
            &json!({
                "cluster": {
                    "name": "analytics",
                    "crate_version": "5.6.0",
                    "product_name": "cr4",
                    "product_tier": "default",
                    "product_unit": 1,
                    "channel": "stable",
                    "username": "admin",
                    "password": "imported-password-0123456789",
                },
                "project_id": project_id,
                "subscription_id": "sub-1",
            }),
        ));

        let config = format!(
            r#"
[resources.cluster.analytics]
organization_id = "{org_id}"
project_id = "{project_id}"
name = "analytics"
crate_version = "5.6.0"
product_name = "cr4"
product_tier = "default"
product_unit = 1
subscription_id = "sub-1"
username = "admin"
password = "imported-password-0123456789"
"#
        );
        let desired = DesiredConfig::parse(&config, &registry).unwrap();

        let record = import_instance(
            &registry,
            &mock,
            &store,
            &desired,
            "cluster.analytics",
            &cluster_id,
        )
        .unwrap();
        assert_eq!(record.get_str("organization_id"), Some(org_id.as_str()));
        assert_eq!(
            record.get("password"),
            Some(&Value::string("imported-password-0123456789"))
        );

        let plan = build_plan(&registry, &mock, &desired, &store, &PlanOptions::default()).unwrap();
        assert_eq!(plan.diffs[0].action, Action::NoOp);
        assert!(plan.diffs[0].ignored.is_empty());
    }

    #[test]
    fn test_import_undeclared_leaves_unreadable_null() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(&dir.path().join("state.json")).unwrap();
        let org_id = created_id(mock.create_organization(&json!({"name": "acme"})));

        let record = import_instance(
            &registry,
            &mock,
            &store,
            &DesiredConfig::default(),
            "organization.main",
            &org_id,
        )
        .unwrap();
        assert_eq!(record.get_str("name"), Some("acme"));
        assert!(store.get("organization.main").is_some());

        let err = import_instance(
            &registry,
            &mock,
            &store,
            &DesiredConfig::default(),
            "organization.main",
            &org_id,
        )
        .unwrap_err();
        assert!(err.to_string().contains("already managed"));
    }

    #[test]
    fn test_import_missing_remote() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(&dir.path().join("state.json")).unwrap();

        let err = import_instance(
            &registry,
            &mock,
            &store,
            &DesiredConfig::default(),
            "project.web",
            "nope",
        )
        .unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_import_rejects_bad_address() {
        let registry = resource::registry().unwrap();
        let mock = MockGateway::new();
        let dir = TempDir::new().unwrap();
        let store = StateStore::load(&dir.path().join("state.json")).unwrap();

        let err = import_instance(
            &registry,
            &mock,
            &store,
            &DesiredConfig::default(),
            "cluster",
            "x",
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected kind.name"));
    }
}
