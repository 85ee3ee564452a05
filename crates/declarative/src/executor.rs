//! Execution engine - applies planned changes with parallelism
//!
//! Instances are independent of each other except through kind ordering:
//! deletions run dependents first (highest rank), everything else runs
//! dependencies first. Within one rank, instances run in parallel. Each
//! instance's own operations are strictly sequenced, and every completed
//! remote operation is committed to the [`StateSink`] before the next.

use crate::context::{ConfirmCallback, ProgressCallback, StateSink};
use crate::diff::InstanceDiff;
use crate::error::EngineError;
use crate::lifecycle::{Operation, Phase};
use crate::reconciler::Reconciler;
use crate::registry::Registry;
use crate::types::{Action, ExecuteOptions, ExecuteSummary, Outcome, Record};
use anyhow::Result;
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Execute planned changes with the given options and callbacks
///
/// # Type Parameters
/// * `G` - Gateway type shared by all kinds
/// * `P` - Progress callback type
/// * `C` - Confirm callback type
///
/// # Returns
/// Summary of execution results. Per-instance failures are counted in the
/// summary; only setup problems (thread pool, confirmation) return `Err`.
pub fn execute<G, P, C>(
    diffs: Vec<InstanceDiff>,
    registry: &Registry<G>,
    gateway: &G,
    sink: &dyn StateSink,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    G: ?Sized + Sync,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let (changes, unchanged): (Vec<_>, Vec<_>) =
        diffs.into_iter().partition(InstanceDiff::has_changes);

    let mut summary = ExecuteSummary {
        unchanged: unchanged.len(),
        ..Default::default()
    };

    if changes.is_empty() {
        return Ok(summary);
    }

    if opts.dry_run {
        summary.skipped = changes.len();
        return Ok(summary);
    }

    if !confirm.confirm("Apply these changes?")? {
        summary.skipped = changes.len();
        return Ok(summary);
    }

    progress.on_start(changes.len());
    for wave in waves(changes, registry) {
        let results = execute_wave(&wave, registry, gateway, sink, opts.jobs, progress)?;
        for (_, outcome) in &results {
            summary.add_outcome(outcome);
        }
    }
    progress.on_complete();

    Ok(summary)
}

/// Group changes into ordered waves by kind rank
fn waves<G: ?Sized>(changes: Vec<InstanceDiff>, registry: &Registry<G>) -> Vec<Vec<InstanceDiff>> {
    let rank = |diff: &InstanceDiff| registry.get(&diff.kind).map_or(0, |k| k.rank());

    let mut deletions: BTreeMap<u8, Vec<InstanceDiff>> = BTreeMap::new();
    let mut applies: BTreeMap<u8, Vec<InstanceDiff>> = BTreeMap::new();
    for diff in changes {
        let target = if diff.action == Action::Delete {
            &mut deletions
        } else {
            &mut applies
        };
        target.entry(rank(&diff)).or_default().push(diff);
    }

    deletions
        .into_values()
        .rev()
        .chain(applies.into_values())
        .collect()
}

fn execute_wave<G, P>(
    wave: &[InstanceDiff],
    registry: &Registry<G>,
    gateway: &G,
    sink: &dyn StateSink,
    jobs: usize,
    progress: &mut P,
) -> Result<Vec<(String, Outcome)>>
where
    G: ?Sized + Sync,
    P: ProgressCallback,
{
    if jobs <= 1 || wave.len() == 1 {
        let mut results = Vec::with_capacity(wave.len());
        for diff in wave {
            progress.on_instance_start(&diff.address, diff.action);
            let outcome = apply_instance(diff, registry, gateway, sink);
            progress.on_instance_complete(&diff.address, &outcome);
            results.push((diff.address.clone(), outcome));
        }
        return Ok(results);
    }

    // The progress callback is not thread-safe; report after the wave.
    let results: Mutex<Vec<(String, Outcome)>> = Mutex::new(Vec::with_capacity(wave.len()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    pool.install(|| {
        wave.par_iter().for_each(|diff| {
            let outcome = apply_instance(diff, registry, gateway, sink);
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((diff.address.clone(), outcome));
        });
    });

    let results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
    for (address, outcome) in &results {
        progress.on_instance_complete(address, outcome);
    }
    Ok(results)
}

/// Apply a single instance, turning every error into a failed outcome
fn apply_instance<G: ?Sized>(
    diff: &InstanceDiff,
    registry: &Registry<G>,
    gateway: &G,
    sink: &dyn StateSink,
) -> Outcome {
    match try_apply_instance(diff, registry, gateway, sink) {
        Ok(outcome) => outcome,
        Err(failure) => Outcome::Failed { error: failure },
    }
}

fn try_apply_instance<G: ?Sized>(
    diff: &InstanceDiff,
    registry: &Registry<G>,
    gateway: &G,
    sink: &dyn StateSink,
) -> std::result::Result<Outcome, String> {
    let reconciler = registry
        .reconciler(&diff.kind, gateway)
        .map_err(|e| e.to_string())?;

    let mut phase = Phase::from_prior(diff.prior.is_some());
    let mut state: Option<Record> = None;

    for operation in Phase::steps(diff.action) {
        phase = phase.begin(*operation).map_err(|e| e.to_string())?;
        debug!("{}: {} ({})", diff.address, operation, phase);

        match run_operation(&reconciler, diff, *operation) {
            Ok(new_state) => {
                phase = phase.complete();
                sink.commit(&diff.address, &diff.kind, new_state.as_ref())
                    .map_err(|e| format!("Failed to save state for {}: {:#}", diff.address, e))?;
                state = new_state;
            }
            Err(e) => {
                phase = phase.fail();
                debug!("{}: {} failed, now {}", diff.address, operation, phase);
                return Err(e.diagnostic(&operation.to_string(), &diff.kind).to_string());
            }
        }
    }

    let outcome = match (diff.action, state) {
        (Action::Create, Some(state)) => Outcome::Created(state),
        (Action::Update, Some(state)) => Outcome::Updated(state),
        (Action::Replace, Some(state)) => Outcome::Replaced(state),
        (Action::Delete, _) => Outcome::Deleted,
        _ => Outcome::Unchanged,
    };
    Ok(outcome)
}

fn run_operation<G: ?Sized>(
    reconciler: &Reconciler<'_, G>,
    diff: &InstanceDiff,
    operation: Operation,
) -> std::result::Result<Option<Record>, EngineError> {
    let missing = |what: &str| EngineError::IllegalTransition {
        operation: operation.to_string(),
        phase: format!("missing its {}", what),
    };

    match operation {
        Operation::Create => {
            let desired = diff.desired.as_ref().ok_or_else(|| missing("configuration"))?;
            reconciler.create(desired).map(Some)
        }
        Operation::Update => {
            let desired = diff.desired.as_ref().ok_or_else(|| missing("configuration"))?;
            let prior = diff.prior.as_ref().ok_or_else(|| missing("state"))?;
            reconciler.update(desired, prior).map(Some)
        }
        Operation::Delete => {
            let prior = diff.prior.as_ref().ok_or_else(|| missing("state"))?;
            reconciler.delete(prior).map(|()| None)
        }
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple<G: ?Sized + Sync>(
    diffs: Vec<InstanceDiff>,
    registry: &Registry<G>,
    gateway: &G,
    sink: &dyn StateSink,
    opts: ExecuteOptions,
) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(
        diffs,
        registry,
        gateway,
        sink,
        opts,
        &mut NoProgress,
        &mut AutoConfirm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoDecline, NoProgress};
    use crate::error::Result as EngineResult;
    use crate::resource::{RemoteResponse, ResourceKind};
    use crate::schema::{AttrType, AttributeSpec, ResourceDescriptor};
    use serde_json::{Value as Json, json};
    use std::sync::LazyLock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NOTE: LazyLock<ResourceDescriptor> = LazyLock::new(|| {
        ResourceDescriptor::new(
            "note",
            "test kind",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String).remote_required(),
                AttributeSpec::required("text", AttrType::String).updatable(),
                AttributeSpec::required("folder", AttrType::String).requires_replace(),
            ],
        )
        .unwrap()
    });

    static FOLDER: LazyLock<ResourceDescriptor> = LazyLock::new(|| {
        ResourceDescriptor::new(
            "folder",
            "test kind",
            "id",
            vec![
                AttributeSpec::computed_once("id", AttrType::String).remote_required(),
                AttributeSpec::required("text", AttrType::String),
            ],
        )
        .unwrap()
    });

    /// In-memory remote store
    #[derive(Default)]
    struct Store {
        items: Mutex<BTreeMap<String, Json>>,
        next: AtomicUsize,
        log: Mutex<Vec<String>>,
        reject: Option<&'static str>,
    }

    impl Store {
        fn ok(status: u16, body: &Json) -> RemoteResponse {
            RemoteResponse::new(status, "OK", body.to_string())
        }

        fn create(&self, prefix: &str, body: &Json) -> EngineResult<RemoteResponse> {
            if body["text"].as_str() == self.reject {
                return Ok(RemoteResponse::new(400, "Bad Request", "{\"message\":\"rejected\"}"));
            }
            let id = format!("{}-{}", prefix, self.next.fetch_add(1, Ordering::SeqCst));
            let mut item = body.clone();
            item["id"] = json!(id);
            self.items.lock().unwrap().insert(id.clone(), item.clone());
            self.log.lock().unwrap().push(format!("create {}", id));
            Ok(Self::ok(201, &item))
        }

        fn read(&self, id: &str) -> EngineResult<RemoteResponse> {
            match self.items.lock().unwrap().get(id) {
                Some(item) => Ok(Self::ok(200, item)),
                None => Ok(RemoteResponse::new(404, "Not Found", "")),
            }
        }

        fn update(&self, id: &str, body: &Json) -> EngineResult<RemoteResponse> {
            let mut items = self.items.lock().unwrap();
            let Some(item) = items.get_mut(id) else {
                return Ok(RemoteResponse::new(404, "Not Found", ""));
            };
            if let (Some(item), Some(patch)) = (item.as_object_mut(), body.as_object()) {
                for (k, v) in patch {
                    item.insert(k.clone(), v.clone());
                }
            }
            self.log.lock().unwrap().push(format!("update {}", id));
            Ok(Self::ok(200, item))
        }

        fn delete(&self, id: &str) -> EngineResult<RemoteResponse> {
            self.log.lock().unwrap().push(format!("delete {}", id));
            match self.items.lock().unwrap().remove(id) {
                Some(_) => Ok(RemoteResponse::new(204, "No Content", "")),
                None => Ok(RemoteResponse::new(404, "Not Found", "")),
            }
        }
    }

    struct Note;

    impl ResourceKind<Store> for Note {
        fn descriptor(&self) -> &ResourceDescriptor {
            &NOTE
        }

        fn rank(&self) -> u8 {
            1
        }

        fn remote_create(&self, s: &Store, _: &Record, body: &Json) -> EngineResult<RemoteResponse> {
            s.create("n", body)
        }

        fn remote_read(&self, s: &Store, id: &str) -> EngineResult<RemoteResponse> {
            s.read(id)
        }

        fn remote_update(&self, s: &Store, id: &str, body: &Json) -> EngineResult<RemoteResponse> {
            s.update(id, body)
        }

        fn remote_delete(&self, s: &Store, id: &str) -> EngineResult<RemoteResponse> {
            s.delete(id)
        }
    }

    struct Folder;

    impl ResourceKind<Store> for Folder {
        fn descriptor(&self) -> &ResourceDescriptor {
            &FOLDER
        }

        fn remote_create(&self, s: &Store, _: &Record, body: &Json) -> EngineResult<RemoteResponse> {
            s.create("f", body)
        }

        fn remote_read(&self, s: &Store, id: &str) -> EngineResult<RemoteResponse> {
            s.read(id)
        }

        fn remote_update(&self, s: &Store, id: &str, body: &Json) -> EngineResult<RemoteResponse> {
            s.update(id, body)
        }

        fn remote_delete(&self, s: &Store, id: &str) -> EngineResult<RemoteResponse> {
            s.delete(id)
        }
    }

    /// Records every commit in order
    #[derive(Default)]
    struct Journal {
        commits: Mutex<Vec<(String, Option<Record>)>>,
    }

    impl StateSink for Journal {
        fn commit(&self, address: &str, _kind: &str, state: Option<&Record>) -> Result<()> {
            self.commits
                .lock()
                .unwrap()
                .push((address.to_string(), state.cloned()));
            Ok(())
        }
    }

    fn registry() -> Registry<Store> {
        let mut registry = Registry::new();
        registry.register(Box::new(Note)).unwrap();
        registry.register(Box::new(Folder)).unwrap();
        registry
    }

    fn note(text: &str, folder: &str) -> Record {
        Record::new().with("text", text).with("folder", folder)
    }

    fn diff(address: &str, desired: Option<&Record>, prior: Option<&Record>) -> InstanceDiff {
        InstanceDiff::compute(&NOTE, address, desired, prior).unwrap()
    }

    fn opts(jobs: usize) -> ExecuteOptions {
        ExecuteOptions {
            dry_run: false,
            jobs,
        }
    }

    #[test]
    fn test_execute_creates_and_commits() {
        let store = Store::default();
        let journal = Journal::default();
        let diffs = vec![
            diff("note.a", Some(&note("a", "inbox")), None),
            diff("note.b", Some(&note("b", "inbox")), None),
        ];
        let summary = execute_simple(diffs, &registry(), &store, &journal, opts(4)).unwrap();

        assert_eq!(summary.created, 2);
        assert!(summary.is_success());
        let commits = journal.commits.lock().unwrap();
        assert_eq!(commits.len(), 2);
        assert!(commits.iter().all(|(_, s)| s.as_ref().is_some_and(|r| r.get_str("id").is_some())));
    }

    #[test]
    fn test_execute_noop_only() {
        let store = Store::default();
        let prior = note("a", "inbox").with("id", "n-0");
        let diffs = vec![diff("note.a", Some(&note("a", "inbox")), Some(&prior))];
        let summary = execute_simple(diffs, &registry(), &store, &crate::context::NoState, opts(1)).unwrap();
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.total_changes(), 0);
        assert!(store.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_execute_replace_deletes_then_creates() {
        let store = Store::default();
        let journal = Journal::default();
        let registry = registry();

        let created = registry
            .reconciler("note", &store)
            .unwrap()
            .create(&note("a", "inbox"))
            .unwrap();
        let old_id = created.get_str("id").unwrap().to_string();

        let diffs = vec![diff("note.a", Some(&note("a", "archive")), Some(&created))];
        assert_eq!(diffs[0].action, Action::Replace);
        let summary = execute_simple(diffs, &registry, &store, &journal, opts(1)).unwrap();
        assert_eq!(summary.replaced, 1);

        let log = store.log.lock().unwrap().clone();
        assert_eq!(log[1], format!("delete {}", old_id));
        assert!(log[2].starts_with("create "));

        let commits = journal.commits.lock().unwrap();
        assert_eq!(commits.len(), 2);
        assert!(commits[0].1.is_none());
        let new_state = commits[1].1.as_ref().unwrap();
        assert_ne!(new_state.get_str("id"), Some(old_id.as_str()));
        assert_eq!(new_state.get_str("folder"), Some("archive"));
    }

    #[test]
    fn test_execute_update_and_delete() {
        let store = Store::default();
        let journal = Journal::default();
        let registry = registry();
        let reconciler = registry.reconciler("note", &store).unwrap();
        let a = reconciler.create(&note("a", "inbox")).unwrap();
        let b = reconciler.create(&note("b", "inbox")).unwrap();

        let diffs = vec![
            diff("note.a", Some(&note("a2", "inbox")), Some(&a)),
            diff("note.b", None, Some(&b)),
        ];
        let summary = execute_simple(diffs, &registry, &store, &journal, opts(2)).unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.deleted, 1);
        assert_eq!(store.items.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_execute_failure_is_isolated() {
        let store = Store {
            reject: Some("bad"),
            ..Default::default()
        };
        let journal = Journal::default();
        let diffs = vec![
            diff("note.good", Some(&note("good", "inbox")), None),
            diff("note.bad", Some(&note("bad", "inbox")), None),
        ];
        let summary = execute_simple(diffs, &registry(), &store, &journal, opts(2)).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        let commits = journal.commits.lock().unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].0, "note.good");
    }

    #[test]
    fn test_execute_dry_run_makes_no_calls() {
        let store = Store::default();
        let diffs = vec![diff("note.a", Some(&note("a", "inbox")), None)];
        let opts = ExecuteOptions {
            dry_run: true,
            jobs: 1,
        };
        let summary = execute_simple(diffs, &registry(), &store, &crate::context::NoState, opts).unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(store.log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_execute_declined() {
        let store = Store::default();
        let diffs = vec![diff("note.a", Some(&note("a", "inbox")), None)];
        let summary = execute(
            diffs,
            &registry(),
            &store,
            &crate::context::NoState,
            opts(1),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(store.items.lock().unwrap().is_empty());
    }

    #[test]
    fn test_waves_order_by_rank() {
        let registry = registry();
        let folder_prior = Record::new().with("id", "f-9").with("text", "x");
        let note_prior = note("n", "inbox").with("id", "n-9");
        let changes = vec![
            InstanceDiff::compute(&FOLDER, "folder.old", None, Some(&folder_prior)).unwrap(),
            InstanceDiff::compute(&NOTE, "note.old", None, Some(&note_prior)).unwrap(),
            InstanceDiff::compute(&NOTE, "note.new", Some(&note("n", "inbox")), None).unwrap(),
            InstanceDiff::compute(&FOLDER, "folder.new", Some(&Record::new().with("text", "f")), None)
                .unwrap(),
        ];
        let order: Vec<Vec<String>> = waves(changes, &registry)
            .into_iter()
            .map(|w| w.into_iter().map(|d| d.address).collect())
            .collect();
        assert_eq!(
            order,
            vec![
                vec!["note.old".to_string()],
                vec!["folder.old".to_string()],
                vec!["folder.new".to_string()],
                vec!["note.new".to_string()],
            ]
        );
    }
}
