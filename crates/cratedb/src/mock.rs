//! In-memory control plane.
//!
//! [`MockGateway`] behaves like a small CrateDB Cloud API: objects created
//! through it can be read, updated and deleted again, ids are deterministic
//! and timestamps are fixed. Responses and transport failures can be
//! scripted per call, and every call is recorded for later inspection.
//!
//! # Example
//!
//! ```
//! use cratedb::{Gateway, MockGateway};
//! use serde_json::json;
//!
//! let mock = MockGateway::new();
//! let created = mock.create_organization(&json!({"name": "acme"})).unwrap();
//! assert_eq!(created.status, 201);
//! assert_eq!(mock.calls().len(), 1);
//! ```

use serde_json::{Map, Value as Json, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::gateway::{Gateway, Response, paths};

/// Timestamp given to every created object.
pub const CREATED_AT: &str = "2024-01-01T00:00:00.000000+00:00";
/// Timestamp given to every updated object.
pub const MODIFIED_AT: &str = "2024-01-02T00:00:00.000000+00:00";

/// Gateway method, used to script and inspect calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    CreateOrganization,
    GetOrganization,
    UpdateOrganization,
    DeleteOrganization,
    ListOrganizations,
    CreateProject,
    GetProject,
    UpdateProject,
    DeleteProject,
    CreateCluster,
    GetCluster,
    UpdateCluster,
    DeleteCluster,
}

/// Object collection held by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Organizations,
    Projects,
    Clusters,
}

/// One call as received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub call: Call,
    /// Object id or organization id the call addressed, if any.
    pub target: Option<String>,
    /// Request body, if any.
    pub body: Option<Json>,
}

enum Scripted {
    Respond(Response),
    Fail(String),
}

#[derive(Default)]
struct MockState {
    organizations: BTreeMap<String, Json>,
    projects: BTreeMap<String, Json>,
    clusters: BTreeMap<String, Json>,
    next_id: u64,
    scripted: HashMap<Call, VecDeque<Scripted>>,
    calls: Vec<RecordedCall>,
}

impl MockState {
    fn collection(&mut self, collection: Collection) -> &mut BTreeMap<String, Json> {
        match collection {
            Collection::Organizations => &mut self.organizations,
            Collection::Projects => &mut self.projects,
            Collection::Clusters => &mut self.clusters,
        }
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!(
            "{:08x}-0000-4000-8000-{:012x}",
            self.next_id, self.next_id
        )
    }
}

/// In-memory [`Gateway`]. Clones share the same state.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty control plane.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next `call` with `response` instead of the default
    /// behavior. Scripted answers queue up in order.
    pub fn respond_with(&self, call: Call, response: Response) {
        self.lock()
            .scripted
            .entry(call)
            .or_default()
            .push_back(Scripted::Respond(response));
    }

    /// Fail the next `call` with a transport error.
    pub fn fail_with(&self, call: Call, message: &str) {
        self.lock()
            .scripted
            .entry(call)
            .or_default()
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// Store an object as if the API had created it. The object must carry
    /// an `id`.
    pub fn seed(&self, collection: Collection, object: Json) {
        let Some(id) = object.get("id").and_then(Json::as_str).map(str::to_string) else {
            return;
        };
        self.lock().collection(collection).insert(id, object);
    }

    /// Current remote representation of an object.
    pub fn object(&self, collection: Collection, id: &str) -> Option<Json> {
        self.lock().collection(collection).get(id).cloned()
    }

    /// Ids of every object in a collection.
    pub fn ids(&self, collection: Collection) -> Vec<String> {
        self.lock().collection(collection).keys().cloned().collect()
    }

    /// Change an object behind the caller's back.
    pub fn drift(&self, collection: Collection, id: &str, fields: &Json) -> bool {
        let mut state = self.lock();
        match state.collection(collection).get_mut(id) {
            Some(object) => {
                merge(object, fields);
                true
            }
            None => false,
        }
    }

    /// Delete an object behind the caller's back.
    pub fn forget(&self, collection: Collection, id: &str) -> bool {
        self.lock().collection(collection).remove(id).is_some()
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of times `call` was received.
    pub fn count(&self, call: Call) -> usize {
        self.lock().calls.iter().filter(|c| c.call == call).count()
    }

    /// Body of the most recent `call`, if any.
    pub fn last_body(&self, call: Call) -> Option<Json> {
        self.lock()
            .calls
            .iter()
            .rev()
            .find(|c| c.call == call)
            .and_then(|c| c.body.clone())
    }

    /// Record the call, then serve a scripted answer or fall back to
    /// `default`.
    fn handle<F>(
        &self,
        call: Call,
        target: Option<&str>,
        body: Option<&Json>,
        path: &str,
        default: F,
    ) -> Result<Response>
    where
        F: FnOnce(&mut MockState) -> Response,
    {
        let mut state = self.lock();
        state.calls.push(RecordedCall {
            call,
            target: target.map(str::to_string),
            body: body.cloned(),
        });

        match state.scripted.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(Error::Transport {
                url: path.to_string(),
                message,
            }),
            None => Ok(default(&mut state)),
        }
    }
}

fn not_found() -> Response {
    Response::json(404, &json!({"message": "Not found."}))
}

fn bad_request(message: &str) -> Response {
    Response::json(400, &json!({"message": message}))
}

/// Shallow merge of `fields` into `object`.
fn merge(object: &mut Json, fields: &Json) {
    if let (Json::Object(target), Json::Object(source)) = (object, fields) {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn dc(modified: &str) -> Json {
    json!({"created": CREATED_AT, "modified": modified})
}

fn get(map: &BTreeMap<String, Json>, id: &str) -> Response {
    map.get(id)
        .map_or_else(not_found, |object| Response::json(200, object))
}

fn update(map: &mut BTreeMap<String, Json>, id: &str, body: &Json, hidden: &[&str]) -> Response {
    let Some(object) = map.get_mut(id) else {
        return not_found();
    };
    let mut fields = body.clone();
    if let Json::Object(fields) = &mut fields {
        for key in hidden {
            fields.remove(*key);
        }
        fields.remove("id");
        fields.insert("dc".to_string(), dc(MODIFIED_AT));
    }
    merge(object, &fields);
    Response::json(200, object)
}

fn delete(map: &mut BTreeMap<String, Json>, id: &str) -> Response {
    match map.remove(id) {
        Some(_) => Response::empty(204),
        None => not_found(),
    }
}

fn object_body(body: &Json) -> Option<Map<String, Json>> {
    body.as_object().cloned()
}

fn new_organization(state: &mut MockState, body: &Json) -> Response {
    let Some(mut object) = object_body(body) else {
        return bad_request("expected a JSON object");
    };
    if object.get("name").and_then(Json::as_str).is_none_or(str::is_empty) {
        return bad_request("name is required");
    }
    let id = state.new_id();
    object.insert("id".into(), json!(id));
    object.insert("dc".into(), dc(CREATED_AT));
    object.insert("notifications_enabled".into(), json!(false));
    object.insert("plan_type".into(), json!(1));
    object.insert("project_count".into(), json!(0));
    let object = Json::Object(object);
    state.organizations.insert(id, object.clone());
    Response::json(201, &object)
}

fn new_project(state: &mut MockState, body: &Json) -> Response {
    let Some(mut object) = object_body(body) else {
        return bad_request("expected a JSON object");
    };
    let Some(organization_id) = object
        .get("organization_id")
        .and_then(Json::as_str)
        .map(str::to_string)
    else {
        return bad_request("organization_id is required");
    };
    let Some(organization) = state.organizations.get_mut(&organization_id) else {
        return not_found();
    };
    let count = organization
        .get("project_count")
        .and_then(Json::as_i64)
        .unwrap_or(0);
    merge(organization, &json!({"project_count": count + 1}));

    let id = state.new_id();
    object.insert("id".into(), json!(id));
    object.insert("dc".into(), dc(CREATED_AT));
    let object = Json::Object(object);
    state.projects.insert(id, object.clone());
    Response::json(201, &object)
}

fn new_cluster(state: &mut MockState, organization_id: &str, body: &Json) -> Response {
    if !state.organizations.contains_key(organization_id) {
        return not_found();
    }
    let Some(mut cluster) = body.get("cluster").and_then(object_body) else {
        return bad_request("cluster is required");
    };
    let project_id = body.get("project_id").cloned().unwrap_or(Json::Null);
    let subscription_id = body.get("subscription_id").cloned().unwrap_or(Json::Null);
    if project_id
        .as_str()
        .is_none_or(|id| !state.projects.contains_key(id))
    {
        return bad_request("unknown project_id");
    }

    cluster.remove("password");
    let id = state.new_id();
    let name = cluster
        .get("name")
        .and_then(Json::as_str)
        .unwrap_or("cluster")
        .to_string();
    let unit = cluster
        .get("product_unit")
        .and_then(Json::as_i64)
        .unwrap_or(0);
    let fqdn = format!("{}.eastus2.azure.cratedb.net.", name);

    cluster.insert("id".into(), json!(id));
    cluster.insert("project_id".into(), project_id);
    cluster.insert("subscription_id".into(), subscription_id);
    cluster.insert("dc".into(), dc(CREATED_AT));
    cluster.insert("num_nodes".into(), json!(unit + 1));
    cluster.insert("url".into(), json!(format!("https://{}:4200", fqdn.trim_end_matches('.'))));
    cluster.insert("fqdn".into(), json!(fqdn));
    cluster.insert("origin".into(), json!("cloud"));
    cluster.insert("backup_schedule".into(), json!("0 */6 * * *"));
    cluster.insert("allow_custom_storage".into(), json!(false));
    cluster.insert("allow_suspend".into(), json!(true));
    cluster.insert("deletion_protected".into(), json!(false));
    cluster.insert("gc_available".into(), json!(true));
    cluster.insert("suspended".into(), json!(false));
    cluster.insert(
        "hardware_specs".into(),
        json!({
            "cpus_per_node": 2,
            "disk_size_per_node_bytes": 34_359_738_368_i64,
            "disk_type": "premium",
            "disks_per_node": 1,
            "heap_size_bytes": 2_147_483_648_i64,
            "memory_per_node_bytes": 4_294_967_296_i64,
        }),
    );
    cluster.insert(
        "health".into(),
        json!({"last_seen": CREATED_AT, "running_operation": "", "status": "GREEN"}),
    );
    cluster.insert("ip_whitelist".into(), json!([]));
    cluster.insert(
        "last_async_operation".into(),
        json!({
            "dc": dc(CREATED_AT),
            "id": format!("op-{}", id),
            "status": "SUCCEEDED",
            "type": "CREATE",
        }),
    );

    let object = Json::Object(cluster);
    state.clusters.insert(id, object.clone());
    Response::json(201, &object)
}

impl Gateway for MockGateway {
    fn create_organization(&self, body: &Json) -> Result<Response> {
        self.handle(
            Call::CreateOrganization,
            None,
            Some(body),
            paths::ORGANIZATIONS,
            |state| new_organization(state, body),
        )
    }

    fn get_organization(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::GetOrganization,
            Some(id),
            None,
            &paths::organization(id),
            |state| get(&state.organizations, id),
        )
    }

    fn update_organization(&self, id: &str, body: &Json) -> Result<Response> {
        self.handle(
            Call::UpdateOrganization,
            Some(id),
            Some(body),
            &paths::organization(id),
            |state| update(&mut state.organizations, id, body, &[]),
        )
    }

    fn delete_organization(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::DeleteOrganization,
            Some(id),
            None,
            &paths::organization(id),
            |state| delete(&mut state.organizations, id),
        )
    }

    fn list_organizations(&self) -> Result<Response> {
        self.handle(
            Call::ListOrganizations,
            None,
            None,
            paths::ORGANIZATIONS,
            |state| {
                let all: Vec<Json> = state.organizations.values().cloned().collect();
                Response::json(200, &Json::Array(all))
            },
        )
    }

    fn create_project(&self, body: &Json) -> Result<Response> {
        self.handle(
            Call::CreateProject,
            None,
            Some(body),
            paths::PROJECTS,
            |state| new_project(state, body),
        )
    }

    fn get_project(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::GetProject,
            Some(id),
            None,
            &paths::project(id),
            |state| get(&state.projects, id),
        )
    }

    fn update_project(&self, id: &str, body: &Json) -> Result<Response> {
        self.handle(
            Call::UpdateProject,
            Some(id),
            Some(body),
            &paths::project(id),
            |state| update(&mut state.projects, id, body, &[]),
        )
    }

    fn delete_project(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::DeleteProject,
            Some(id),
            None,
            &paths::project(id),
            |state| delete(&mut state.projects, id),
        )
    }

    fn create_cluster(&self, organization_id: &str, body: &Json) -> Result<Response> {
        self.handle(
            Call::CreateCluster,
            Some(organization_id),
            Some(body),
            &paths::organization_clusters(organization_id),
            |state| new_cluster(state, organization_id, body),
        )
    }

    fn get_cluster(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::GetCluster,
            Some(id),
            None,
            &paths::cluster(id),
            |state| get(&state.clusters, id),
        )
    }

    fn update_cluster(&self, id: &str, body: &Json) -> Result<Response> {
        self.handle(
            Call::UpdateCluster,
            Some(id),
            Some(body),
            &paths::cluster(id),
            |state| update(&mut state.clusters, id, body, &["password"]),
        )
    }

    fn delete_cluster(&self, id: &str) -> Result<Response> {
        self.handle(
            Call::DeleteCluster,
            Some(id),
            None,
            &paths::cluster(id),
            |state| delete(&mut state.clusters, id),
        )
    }
}
