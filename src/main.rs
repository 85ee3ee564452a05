mod cli;
mod commands;
mod config;
mod data_source;
mod engine;
mod resource;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub state_path: PathBuf,
}

fn main() {
    if let Err(e) = run() {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config_path: config::expand_path(&cli.config),
        state_path: config::expand_path(&cli.state),
    };
    log::debug!(
        "config: {}, state: {}, verbosity: {}",
        ctx.config_path.display(),
        ctx.state_path.display(),
        ctx.verbose
    );

    match cli.command {
        Command::Validate => commands::declarative::validate(&ctx),
        Command::Plan(args) => commands::declarative::plan(&ctx, &args),
        Command::Apply(args) => commands::declarative::apply(&ctx, &args),
        Command::Destroy(args) => commands::declarative::destroy(&ctx, &args),
        Command::Refresh(args) => commands::declarative::refresh(&ctx, &args),
        Command::Import { address, id } => commands::state::import(&ctx, &address, &id),
        Command::Show { address } => commands::state::show(&ctx, address.as_deref()),
        Command::Get { source, id } => commands::data::get(&ctx, &source, &id),
        Command::List(cmd) => commands::data::list(&ctx, &cmd),
        Command::Schema { kind, format } => commands::schema::run(&ctx, kind.as_deref(), format),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "cratedb-provider", &mut io::stdout());
            Ok(())
        }
    }
}
