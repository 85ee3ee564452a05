//! Cluster resource
//!
//! Clusters are created under an organization (a path parameter that the
//! API never echoes back) and inside a project. The create endpoint expects
//! the cluster fields wrapped in an envelope:
//!
//! ```json
//! {"cluster": {"name": "...", ...}, "project_id": "...", "subscription_id": "..."}
//! ```
//!
//! Only the password can be changed in place.

use cratedb::Gateway;
use declarative::schema::{AttrType, AttributeSpec};
use declarative::{
    Purpose, Record, RemoteResponse, ResourceDescriptor, ResourceKind, Result, mapper,
};
use serde_json::{Map, Value as Json};

use super::{dc, remote};

const PRODUCT_PATTERN: &str = r"^\w[\w\-\. ]*$";
const PRODUCT_MESSAGE: &str = "Product name must start with a letter and contain only letters, numbers, hyphens, underscores, and periods.";
const UUID_PATTERN: &str = r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$";

/// Fields that sit next to the cluster object in the create envelope
const ENVELOPE_FIELDS: [&str; 2] = ["project_id", "subscription_id"];

/// A CrateDB Cloud cluster
#[derive(Debug)]
pub struct Cluster {
    descriptor: ResourceDescriptor,
}

impl Cluster {
    pub fn new() -> Result<Self> {
        let descriptor = ResourceDescriptor::new(
            "cluster",
            "Creates and manages a cluster.",
            "id",
            attributes(),
        )?;
        Ok(Self { descriptor })
    }
}

fn attributes() -> Vec<AttributeSpec> {
    use AttrType::{Bool, Int32, Int64, List, Object, String};

    vec![
        AttributeSpec::computed_once("id", String)
            .remote_required()
            .describe("The id of the cluster."),
        AttributeSpec::required("organization_id", String)
            .local()
            .describe("The organization id of the cluster."),
        AttributeSpec::required("name", String)
            .remote_required()
            .describe("The name of the cluster."),
        AttributeSpec::required("crate_version", String)
            .remote_required()
            .describe("The CrateDB version of the cluster."),
        AttributeSpec::required("product_name", String)
            .length(1, 512)
            .pattern(PRODUCT_PATTERN, PRODUCT_MESSAGE)
            .describe("The product name of the cluster."),
        AttributeSpec::required("product_tier", String)
            .length(1, 512)
            .pattern(PRODUCT_PATTERN, PRODUCT_MESSAGE)
            .describe("The product tier of the cluster."),
        AttributeSpec::optional("product_unit", Int32, 0)
            .describe("The product unit of the cluster. Default is `0`."),
        AttributeSpec::optional("channel", String, "stable")
            .describe("The channel of the cluster. Default is 'stable'."),
        AttributeSpec::required("project_id", String)
            .length(36, 36)
            .pattern(UUID_PATTERN, "Project ID must be a valid UUID.")
            .describe("The project id of the cluster."),
        AttributeSpec::required("subscription_id", String)
            .length(1, 512)
            .describe("The subscription id of the cluster."),
        AttributeSpec::required("username", String)
            .remote_required()
            .describe("The username of the cluster."),
        AttributeSpec::required("password", String)
            .sensitive()
            .updatable()
            .min_length(24)
            .describe("The password of the cluster."),
        AttributeSpec::computed("allow_custom_storage", Bool)
            .describe("The allow custom storage flag."),
        AttributeSpec::computed("allow_suspend", Bool).describe("The allow suspend flag."),
        AttributeSpec::computed("backup_schedule", String).describe("The backup schedule."),
        AttributeSpec::computed("deletion_protected", Bool)
            .describe("The deletion protected flag."),
        AttributeSpec::computed("external_ip", String).describe("The external IP address."),
        AttributeSpec::computed("fqdn", String).describe("The Fully Qualified Domain Name."),
        AttributeSpec::computed("gc_available", Bool)
            .describe("The garbage collection available flag."),
        AttributeSpec::computed("num_nodes", Int32).describe("The number of nodes in the cluster."),
        AttributeSpec::computed("origin", String).describe("The origin of the cluster."),
        AttributeSpec::computed("suspended", Bool).describe("The suspended flag."),
        AttributeSpec::computed("url", String).describe("The URL of the cluster."),
        dc("The DublinCore of the cluster."),
        AttributeSpec::computed(
            "hardware_specs",
            Object(vec![
                AttributeSpec::computed("cpus_per_node", Int32).describe("The cpus per node."),
                AttributeSpec::computed("disk_size_per_node_bytes", Int64)
                    .describe("The disk size per node in bytes."),
                AttributeSpec::computed("disk_type", String).describe("The disk type."),
                AttributeSpec::computed("disks_per_node", Int32).describe("The disks per node."),
                AttributeSpec::computed("heap_size_bytes", Int64)
                    .describe("The heap size in bytes."),
                AttributeSpec::computed("memory_per_node_bytes", Int64)
                    .describe("The memory per node in bytes."),
            ]),
        )
        .describe("The hardware specs of the cluster."),
        AttributeSpec::computed(
            "health",
            Object(vec![
                AttributeSpec::computed("last_seen", String)
                    .describe("The last time the health was checked."),
                AttributeSpec::computed("running_operation", String)
                    .describe("The operation currently running on the cluster."),
                AttributeSpec::computed("status", String)
                    .describe("The health status of the cluster."),
            ]),
        )
        .describe("The health of the cluster."),
        AttributeSpec::computed(
            "ip_whitelist",
            List(vec![
                AttributeSpec::computed("cidr", String).describe("The CIDR."),
                AttributeSpec::computed("description", String).describe("The description."),
            ]),
        )
        .describe("The IP whitelist of the cluster."),
        AttributeSpec::computed(
            "last_async_operation",
            Object(vec![
                AttributeSpec::computed(
                    "dc",
                    Object(vec![
                        AttributeSpec::computed("created", String).describe("The created time."),
                        AttributeSpec::computed("modified", String)
                            .describe("The modified time."),
                    ]),
                )
                .describe("The DublinCore of the operation."),
                AttributeSpec::computed("id", String).describe("The id of the operation."),
                AttributeSpec::computed("status", String).describe("The status of the operation."),
                AttributeSpec::computed("type", String).describe("The type of the operation."),
            ]),
        )
        .describe("The last asynchronous operation of the cluster."),
    ]
}

/// Move the envelope fields out of a flat create body
fn envelope(body: Json) -> Json {
    let mut cluster = match body {
        Json::Object(fields) => fields,
        other => return other,
    };

    let mut wrapped = Map::new();
    for field in ENVELOPE_FIELDS {
        if let Some(value) = cluster.remove(field) {
            wrapped.insert(field.to_string(), value);
        }
    }
    wrapped.insert("cluster".to_string(), Json::Object(cluster));
    Json::Object(wrapped)
}

impl ResourceKind<dyn Gateway> for Cluster {
    fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn rank(&self) -> u8 {
        2
    }

    fn encode(&self, record: &Record, purpose: Purpose) -> Result<Json> {
        let body = mapper::encode(&self.descriptor, record, purpose)?;
        Ok(match purpose {
            Purpose::Create => envelope(body),
            Purpose::Update => body,
        })
    }

    fn remote_create(
        &self,
        gateway: &dyn Gateway,
        planned: &Record,
        body: &Json,
    ) -> Result<RemoteResponse> {
        let organization_id = planned.require_str("cluster", "organization_id")?;
        remote(gateway.create_cluster(organization_id, body))
    }

    fn remote_read(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.get_cluster(id))
    }

    fn remote_update(&self, gateway: &dyn Gateway, id: &str, body: &Json) -> Result<RemoteResponse> {
        remote(gateway.update_cluster(id, body))
    }

    fn remote_delete(&self, gateway: &dyn Gateway, id: &str) -> Result<RemoteResponse> {
        remote(gateway.delete_cluster(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cratedb::{Call, Collection, MockGateway, Response};
    use declarative::{Action, EngineError, Reconciler, Value};
    use serde_json::json;

    const PASSWORD: &str = "correct-horse-battery-staple";

    struct Fixture {
        kind: Cluster,
        mock: MockGateway,
        org_id: String,
        project_id: String,
    }

    impl Fixture {
        fn new() -> Self {
            let mock = MockGateway::new();
            let org = mock.create_organization(&json!({"name": "acme"})).unwrap();
            let org_id = id_of(&org);
            let project = mock
                .create_project(&json!({"name": "p", "organization_id": org_id, "region": "r"}))
                .unwrap();
            let project_id = id_of(&project);
            Self {
                kind: Cluster::new().unwrap(),
                mock,
                org_id,
                project_id,
            }
        }

        fn reconciler(&self) -> Reconciler<'_, dyn Gateway> {
            Reconciler::new(&self.kind, &self.mock)
        }

        fn desired(&self) -> Record {
            Record::new()
                .with("organization_id", self.org_id.as_str())
                .with("name", "analytics")
                .with("crate_version", "5.6.0")
                .with("product_name", "cr4")
                .with("product_tier", "default")
                .with("project_id", self.project_id.as_str())
                .with("subscription_id", "sub-1")
                .with("username", "admin")
                .with("password", PASSWORD)
        }
    }

    fn id_of(response: &Response) -> String {
        let body: Json = serde_json::from_str(&response.body).unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_create_wraps_envelope() {
        let f = Fixture::new();
        let state = f.reconciler().create(&f.desired()).unwrap();

        let body = f.mock.last_body(Call::CreateCluster).unwrap();
        assert_eq!(body["project_id"], f.project_id.as_str());
        assert_eq!(body["subscription_id"], "sub-1");
        assert_eq!(body["cluster"]["password"], PASSWORD);
        assert_eq!(body["cluster"]["channel"], "stable");
        assert_eq!(body["cluster"]["product_unit"], 0);
        assert!(body["cluster"].get("project_id").is_none());
        assert!(body["cluster"].get("organization_id").is_none());
        assert_eq!(f.mock.calls().last().unwrap().target.as_deref(), Some(f.org_id.as_str()));

        // Local and sensitive values come from configuration
        assert_eq!(state.get_str("organization_id"), Some(f.org_id.as_str()));
        assert_eq!(state.get_str("password"), Some(PASSWORD));
        assert!(state.is_fully_known());
        let specs = state.get("hardware_specs").and_then(Value::as_object).unwrap();
        assert_eq!(specs.get("disk_size_per_node_bytes"), Some(&Value::Int64(34_359_738_368)));
    }

    #[test]
    fn test_noop_plan_after_create() {
        let f = Fixture::new();
        let state = f.reconciler().create(&f.desired()).unwrap();
        let refreshed = f.reconciler().read(&state).unwrap();
        assert_eq!(refreshed.get_str("password"), Some(PASSWORD));

        let diff = f
            .reconciler()
            .plan("cluster.analytics", Some(&f.desired()), Some(&refreshed))
            .unwrap();
        assert_eq!(diff.action, Action::NoOp);
    }

    #[test]
    fn test_password_only_update_body() {
        let f = Fixture::new();
        let state = f.reconciler().create(&f.desired()).unwrap();

        let new_password = "another-correct-horse-battery";
        let desired = f.desired().with("password", new_password);
        let diff = f
            .reconciler()
            .plan("cluster.analytics", Some(&desired), Some(&state))
            .unwrap();
        assert_eq!(diff.action, Action::Update);
        assert!(diff.changes.iter().all(|c| c.name == "password" && c.sensitive));

        let updated = f.reconciler().update(&desired, &state).unwrap();
        assert_eq!(
            f.mock.last_body(Call::UpdateCluster),
            Some(json!({"password": new_password}))
        );
        assert_eq!(updated.get_str("password"), Some(new_password));
    }

    #[test]
    fn test_read_gone() {
        let f = Fixture::new();
        let state = f.reconciler().create(&f.desired()).unwrap();
        f.mock
            .forget(Collection::Clusters, state.get_str("id").unwrap());
        let err = f.reconciler().read(&state).unwrap_err();
        assert!(matches!(err, EngineError::ResourceGone { ref kind, .. } if kind == "cluster"));
    }

    #[test]
    fn test_invalid_configuration_reports_every_violation() {
        let f = Fixture::new();
        let desired = f
            .desired()
            .with("password", "short")
            .with("project_id", "not-a-uuid")
            .with("product_name", "-bad");
        let err = f.reconciler().create(&desired).unwrap_err();
        match err {
            EngineError::Validation { violations, .. } => {
                let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
                assert!(paths.contains(&"password"));
                assert!(paths.contains(&"project_id"));
                assert!(paths.contains(&"product_name"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(f.mock.calls().iter().all(|c| c.call != Call::CreateCluster));
    }

    #[test]
    fn test_remote_error_carries_status() {
        let f = Fixture::new();
        f.mock.respond_with(
            Call::CreateCluster,
            Response::json(409, &json!({"message": "name taken"})),
        );
        let err = f.reconciler().create(&f.desired()).unwrap_err();
        let diagnostic = err.diagnostic("create", "cluster");
        assert!(diagnostic.detail.contains("HTTP Status Code: 409"));
        assert!(diagnostic.detail.contains("Status: Conflict"));
    }

    #[test]
    fn test_import_then_plan() {
        let f = Fixture::new();
        let created = f.reconciler().create(&f.desired()).unwrap();
        let id = created.get_str("id").unwrap();

        let imported = f.reconciler().import(id).unwrap();
        assert_eq!(imported.get_str("name"), Some("analytics"));
        // Neither is returned by the API
        assert_eq!(imported.get("password"), Some(&Value::Null));
        assert_eq!(imported.get("organization_id"), Some(&Value::Null));

        let diff = f
            .reconciler()
            .plan("cluster.analytics", Some(&f.desired()), Some(&imported))
            .unwrap();
        assert_eq!(diff.action, Action::Update);
        assert!(diff.ignored.contains(&"organization_id".to_string()));
    }

    #[test]
    fn test_envelope_shape() {
        let flat = json!({"name": "c", "project_id": "p", "subscription_id": "s"});
        assert_eq!(
            envelope(flat),
            json!({"cluster": {"name": "c"}, "project_id": "p", "subscription_id": "s"})
        );
    }

    fn remote_body() -> Json {
        json!({
            "id": "8d1f7c6e-0000-4000-8000-000000000003",
            "name": "analytics",
            "crate_version": "5.6.0",
            "product_name": "cr4",
            "product_tier": "default",
            "product_unit": 2,
            "channel": "stable",
            "project_id": "2f3c8a4e-0000-4000-8000-000000000001",
            "subscription_id": "sub-1",
            "username": "admin",
            "allow_custom_storage": false,
            "allow_suspend": true,
            "backup_schedule": "0 */6 * * *",
            "deletion_protected": false,
            "external_ip": "20.0.0.1",
            "fqdn": "analytics.eastus2.azure.cratedb.net.",
            "gc_available": true,
            "num_nodes": 3,
            "origin": "cloud",
            "suspended": false,
            "url": "https://analytics.eastus2.azure.cratedb.net:4200",
            "dc": {"created": "2024-01-01T00:00:00", "modified": "2024-01-02T00:00:00"},
            "hardware_specs": {
                "cpus_per_node": 4,
                "disk_size_per_node_bytes": 4_398_046_511_104_i64,
                "disk_type": "premium",
                "disks_per_node": 1,
                "heap_size_bytes": 8_589_934_592_i64,
                "memory_per_node_bytes": 17_179_869_184_i64,
            },
            "health": {"last_seen": "2024-01-02T00:00:00", "running_operation": "", "status": "GREEN"},
            "ip_whitelist": [
                {"cidr": "10.0.0.0/8", "description": "office"},
                {"cidr": "192.168.1.0/24", "description": "vpn"},
            ],
            "last_async_operation": {
                "dc": {"created": "2024-01-01T00:00:00", "modified": "2024-01-01T00:05:00"},
                "id": "op-1",
                "status": "SUCCEEDED",
                "type": "CREATE",
            },
        })
    }

    #[test]
    fn test_remote_round_trip() {
        let kind = Cluster::new().unwrap();
        let descriptor = kind.descriptor();

        let record = mapper::decode(descriptor, &remote_body()).unwrap();
        let specs = record.get("hardware_specs").and_then(Value::as_object).unwrap();
        assert_eq!(
            specs.get("disk_size_per_node_bytes"),
            Some(&Value::Int64(4_398_046_511_104))
        );
        assert!(matches!(record.get("ip_whitelist"), Some(Value::List(items)) if items.len() == 2));

        let encoded = mapper::encode_remote(descriptor, &record).unwrap();
        assert_eq!(encoded, remote_body());
        assert_eq!(mapper::decode(descriptor, &encoded).unwrap(), record);
    }

    #[test]
    fn test_document_round_trip() {
        let kind = Cluster::new().unwrap();
        let descriptor = kind.descriptor();

        let mut record = mapper::decode(descriptor, &remote_body()).unwrap();
        record.set("organization_id", "org-1");
        record.set("password", PASSWORD);

        let doc = mapper::to_document(descriptor, &record).unwrap();
        assert_eq!(doc["last_async_operation"]["dc"]["modified"], json!("2024-01-01T00:05:00"));
        assert_eq!(doc["ip_whitelist"][1]["cidr"], json!("192.168.1.0/24"));
        assert_eq!(mapper::from_document(descriptor, &doc).unwrap(), record);
    }
}
