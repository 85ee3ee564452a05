//! # Declarative
//!
//! A framework for reconciling declared resources against a remote control
//! plane.
//!
//! Users declare the desired configuration of each resource instance. The
//! engine compares it with the last persisted state, decides what must
//! happen, issues the remote calls and produces the new state.
//!
//! ## Core Concepts
//!
//! - **ResourceDescriptor**: static table of a kind's attributes, their types,
//!   ownership (user or remote) and validation rules
//! - **Value / Record**: tri-state attribute values (unknown, null, known) and
//!   the records holding them
//! - **Mapper**: descriptor-driven conversion between records and JSON
//! - **Plan resolution**: where each planned value comes from (desired,
//!   default, prior, or unknown until apply)
//! - **Reconciler**: create / read / update / delete / import for one kind
//! - **Executor**: applies planned changes across instances in parallel
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Registry, Reconciler, Record};
//!
//! let mut registry: Registry<dyn Api> = Registry::new();
//! registry.register(Box::new(Widget))?;
//!
//! let reconciler = registry.reconciler("widget", &api)?;
//! let state = reconciler.create(&Record::new().with("name", "alpha"))?;
//! let refreshed = reconciler.read(&state)?;
//! ```
//!
//! ## Provider Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`ResourceKind`]: binds a descriptor to the remote calls for one kind
//! - [`StateSink`]: persists committed state
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on a
//! particular HTTP client, storage format or UI.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod mapper;
pub mod plan;
pub mod reconciler;
pub mod registry;
pub mod resource;
pub mod schema;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, NoState, ProgressCallback, StateSink,
};
pub use diff::{DiffSummary, InstanceDiff, group_by_kind};
pub use error::{Diagnostic, EngineError, ErrorCategory, Result};
pub use executor::{execute, execute_simple};
pub use lifecycle::{Operation, Phase};
pub use mapper::Purpose;
pub use plan::{AttributeChange, PlanDelta, Planned};
pub use reconciler::Reconciler;
pub use registry::Registry;
pub use resource::{RemoteResponse, ResourceKind};
pub use schema::{AttrType, AttributeSpec, Mutability, ResourceDescriptor, Violation};
pub use types::{Action, ExecuteOptions, ExecuteSummary, Outcome, Record, Value};
