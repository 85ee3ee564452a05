//! Declarative commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make remote resources match the configuration
//! - `destroy` - Delete everything recorded in state
//! - `refresh` - Pull remote changes into state

use anyhow::{Result, bail};
use colored::Colorize;

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs, TargetArgs};
use crate::engine::{self, ApplyOptions, Plan, PlanOptions, Target};
use crate::resource::CloudRegistry;
use crate::ui;

use super::Workspace;

fn target(args: &TargetArgs, registry: &CloudRegistry) -> Result<Option<Target>> {
    args.target
        .as_deref()
        .map(|t| engine::parse_target(t, registry))
        .transpose()
}

pub fn validate(ctx: &Context) -> Result<()> {
    let ws = Workspace::load(ctx)?;

    let mut problems = Vec::new();
    for (address, instance) in &ws.desired.instances {
        let descriptor = ws.registry.descriptor(&instance.kind)?;
        let defaulted = descriptor.with_defaults(&instance.record);
        for violation in descriptor.validate(&defaulted) {
            problems.push(format!("{}.{}", address, violation));
        }
    }

    if !problems.is_empty() {
        for problem in &problems {
            ui::error(problem);
        }
        bail!("{} problems in {}", problems.len(), ctx.config_path.display());
    }

    ui::success(&format!(
        "{} is valid ({} resources)",
        ctx.config_path.display(),
        ws.desired.instances.len()
    ));
    Ok(())
}

pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let ws = Workspace::load(ctx)?;
    let gateway = ws.gateway()?;

    let opts = PlanOptions {
        refresh: !args.no_refresh,
        target: target(&args.target, &ws.registry)?,
        destroy: false,
    };
    let plan = engine::build_plan(&ws.registry, &gateway, &ws.desired, &ws.store, &opts)?;
    engine::display_plan(&plan);
    Ok(())
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    ui::header("Applying Configuration");

    if args.dry_run {
        ui::warn("Dry run - no changes will be made");
    }

    let ws = Workspace::load(ctx)?;
    let gateway = ws.gateway()?;

    let opts = PlanOptions {
        refresh: !args.no_refresh,
        target: target(&args.target, &ws.registry)?,
        destroy: false,
    };
    let plan = engine::build_plan(&ws.registry, &gateway, &ws.desired, &ws.store, &opts)?;

    run(
        ctx,
        &ws,
        &gateway,
        plan,
        &ApplyOptions {
            dry_run: args.dry_run,
            jobs: args.jobs,
            yes: args.yes,
            quiet: ctx.quiet,
        },
    )
}

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    ui::header("Destroying Resources");

    let ws = Workspace::load_state(ctx)?;
    if ws.store.is_empty() {
        ui::info("State is empty, nothing to destroy");
        return Ok(());
    }
    let gateway = ws.gateway()?;

    let opts = PlanOptions {
        refresh: false,
        target: target(&args.target, &ws.registry)?,
        destroy: true,
    };
    let plan = engine::build_plan(&ws.registry, &gateway, &ws.desired, &ws.store, &opts)?;

    run(
        ctx,
        &ws,
        &gateway,
        plan,
        &ApplyOptions {
            dry_run: args.dry_run,
            jobs: 1,
            yes: args.yes,
            quiet: ctx.quiet,
        },
    )
}

fn run(
    ctx: &Context,
    ws: &Workspace,
    gateway: &cratedb::HttpGateway,
    plan: Plan,
    opts: &ApplyOptions,
) -> Result<()> {
    engine::display_plan(&plan);
    if !plan.has_changes() && plan.gone.is_empty() {
        return Ok(());
    }

    let summary = engine::apply(plan, &ws.registry, gateway, &ws.store, opts)?;
    engine::print_summary(&summary, opts.dry_run);

    if !summary.is_success() {
        bail!(
            "{} of {} resources failed, state saved to {}",
            summary.failed,
            summary.total(),
            ctx.state_path.display()
        );
    }
    Ok(())
}

pub fn refresh(ctx: &Context, args: &TargetArgs) -> Result<()> {
    let ws = Workspace::load_state(ctx)?;
    if ws.store.is_empty() {
        ui::info("State is empty, nothing to refresh");
        return Ok(());
    }
    let gateway = ws.gateway()?;
    let target = target(args, &ws.registry)?;

    let summary = engine::refresh_state(&ws.registry, &gateway, &ws.store, target.as_ref())?;

    println!();
    println!(
        "  {} Refreshed {} resources{}",
        "✓".green(),
        summary.refreshed,
        if summary.gone > 0 {
            format!(", {} no longer exist", summary.gone)
        } else {
            String::new()
        }
    );
    if summary.failed > 0 {
        bail!("{} resources could not be read", summary.failed);
    }
    Ok(())
}
