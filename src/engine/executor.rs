//! Plan execution with terminal progress and confirmation

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use cratedb::Gateway;
use declarative::{
    Action, AutoConfirm, ConfirmCallback, ExecuteOptions, ExecuteSummary, Outcome,
    ProgressCallback, execute,
};
use indicatif::{ProgressBar, ProgressStyle};

use super::planner::Plan;
use crate::resource::CloudRegistry;
use crate::state::{StateStore, StateWriter};

/// Options for applying a plan (adds `yes` for confirmation skip)
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of instances applied in parallel
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Hide the progress bar
    pub quiet: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            quiet: false,
        }
    }
}

/// Progress bar driven by the executor callbacks
pub struct TerminalProgress {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl TerminalProgress {
    pub fn new(hidden: bool) -> Self {
        Self { bar: None, hidden }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_start(&mut self, count: usize) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(count as u64)
        };
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }
        self.bar = Some(bar);
    }

    fn on_instance_start(&mut self, address: &str, action: Action) {
        if let Some(bar) = &self.bar {
            bar.set_message(format!("{} {}", action.symbol(), address));
        }
    }

    fn on_instance_complete(&mut self, address: &str, outcome: &Outcome) {
        let Some(bar) = &self.bar else {
            return;
        };
        let line = match outcome {
            Outcome::Created(_) => format!("  {} {} created", "✓".green(), address),
            Outcome::Updated(_) => format!("  {} {} updated", "✓".green(), address),
            Outcome::Replaced(_) => format!("  {} {} replaced", "✓".green(), address),
            Outcome::Deleted => format!("  {} {} destroyed", "✓".green(), address),
            Outcome::Unchanged => format!("  {} {} unchanged", "○".dimmed(), address),
            Outcome::Skipped { reason } => {
                format!("  {} {} skipped: {}", "⊘".yellow(), address, reason)
            }
            Outcome::Failed { error } => {
                format!("  {} {} failed\n{}", "✗".red(), address, indent(error))
            }
        };
        bar.println(line);
        bar.inc(1);
    }

    fn on_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("      {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks before applying
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;

        Ok(confirmed)
    }
}

/// Apply a plan and persist every committed operation
pub fn apply(
    plan: Plan,
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    store: &StateStore,
    opts: &ApplyOptions,
) -> Result<ExecuteSummary> {
    apply_with(plan, registry, gateway, store, opts, &mut PromptConfirm)
}

/// Apply a plan with an explicit confirmation callback
pub fn apply_with<C: ConfirmCallback>(
    plan: Plan,
    registry: &CloudRegistry,
    gateway: &(dyn Gateway + 'static),
    store: &StateStore,
    opts: &ApplyOptions,
    confirm: &mut C,
) -> Result<ExecuteSummary> {
    if !opts.dry_run {
        for address in &plan.gone {
            store
                .forget(address)
                .with_context(|| format!("Failed to drop {} from state", address))?;
        }
    }

    let sink = StateWriter::new(store, registry);
    let exec = ExecuteOptions {
        dry_run: opts.dry_run,
        jobs: opts.jobs.max(1),
    };
    let mut progress = TerminalProgress::new(opts.quiet);

    if opts.yes {
        execute(plan.diffs, registry, gateway, &sink, exec, &mut progress, &mut AutoConfirm)
    } else {
        execute(plan.diffs, registry, gateway, &sink, exec, &mut progress, confirm)
    }
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary, dry_run: bool) {
    println!();
    if dry_run {
        println!(
            "  {} Dry run: {} changes planned, none made",
            "ℹ".blue(),
            summary.skipped
        );
        return;
    }

    if summary.total_changes() == 0 && summary.failed == 0 && summary.skipped > 0 {
        println!("  {} Aborted, no changes made", "✗".red());
        return;
    }

    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} updated", summary.updated);
    }
    if summary.replaced > 0 {
        println!("    • {} replaced", summary.replaced);
    }
    if summary.deleted > 0 {
        println!("    • {} destroyed", summary.deleted);
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}
