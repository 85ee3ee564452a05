use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::config::DEFAULT_CONFIG;
use crate::state::DEFAULT_STATE;

#[derive(Parser)]
#[command(name = "cratedb-provider")]
#[command(version)]
#[command(about = "Declarative management of CrateDB Cloud organizations, projects and clusters", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Desired configuration file
    #[arg(short, long, global = true, env = "CRATEDB_CONFIG", default_value = DEFAULT_CONFIG)]
    pub config: String,

    /// State file
    #[arg(short, long, global = true, env = "CRATEDB_STATE", default_value = DEFAULT_STATE)]
    pub state: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check the configuration without contacting the API
    Validate,

    /// Show what apply would change
    Plan(PlanArgs),

    /// Make the remote resources match the configuration
    Apply(ApplyArgs),

    /// Destroy every resource recorded in state
    Destroy(DestroyArgs),

    /// Update state from the remote resources
    Refresh(TargetArgs),

    /// Adopt an existing remote resource into state
    Import {
        /// Address to import into, e.g. cluster.analytics
        address: String,

        /// Remote id of the resource
        id: String,
    },

    /// Show stored state
    Show {
        /// Only this address
        address: Option<String>,
    },

    /// Read a resource by id without touching state
    Get {
        /// Data source: organization, project or cluster
        source: String,

        /// Remote id
        id: String,
    },

    /// List remote resources
    #[command(subcommand)]
    List(ListCommand),

    /// Describe resource kinds and their attributes
    Schema {
        /// Only this kind
        kind: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ListCommand {
    /// Every organization the credentials can see
    Organizations,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct TargetArgs {
    /// Only a kind or one instance (e.g. "cluster" or "cluster.analytics")
    #[arg(short, long)]
    pub target: Option<String>,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plan against stored state without reading remote resources
    #[arg(long)]
    pub no_refresh: bool,
}

#[derive(Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Plan against stored state without reading remote resources
    #[arg(long)]
    pub no_refresh: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Number of resources applied in parallel
    #[arg(short, long, default_value = "4")]
    pub jobs: usize,
}

#[derive(Args)]
pub struct DestroyArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "cratedb-provider",
            "apply",
            "--yes",
            "--jobs",
            "2",
            "--target",
            "cluster.analytics",
        ])
        .unwrap();
        let Command::Apply(args) = cli.command else {
            panic!("expected apply");
        };
        assert!(args.yes);
        assert_eq!(args.jobs, 2);
        assert_eq!(args.target.target.as_deref(), Some("cluster.analytics"));
    }

    #[test]
    fn test_global_paths() {
        let cli = Cli::try_parse_from([
            "cratedb-provider",
            "show",
            "--state",
            "other.json",
        ])
        .unwrap();
        assert_eq!(cli.state, "other.json");
        assert!(matches!(cli.command, Command::Show { address: None }));
    }
}
