//! Execution engine for the provider
//!
//! The engine orchestrates:
//! 1. Planning - Compare declared instances with (refreshed) state
//! 2. Display - Show what will change, secrets masked
//! 3. Executing - Apply changes with parallelism, committing state as it goes

pub mod differ;
pub mod executor;
pub mod planner;

pub use differ::display_plan;
pub use executor::{ApplyOptions, apply, print_summary};
pub use planner::{Plan, PlanOptions, Target, build_plan, parse_target, refresh_state};
