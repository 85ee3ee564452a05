//! CLI subcommands

pub mod data;
pub mod declarative;
pub mod schema;
pub mod state;

use anyhow::{Context as AnyhowContext, Result, bail};
use cratedb::{ClientConfig, HttpGateway, ProviderSettings};

use crate::Context;
use crate::config::DesiredConfig;
use crate::resource::{self, CloudRegistry};
use crate::state::StateStore;

/// Everything a command needs: kinds, configuration and state
pub struct Workspace {
    pub registry: CloudRegistry,
    pub desired: DesiredConfig,
    pub store: StateStore,
}

impl Workspace {
    /// Load configuration and state. A missing config file is an error.
    pub fn load(ctx: &Context) -> Result<Self> {
        let registry = resource::registry().context("Resource kinds are inconsistent")?;
        let desired = DesiredConfig::load(&ctx.config_path, &registry)?;
        let store = StateStore::load(&ctx.state_path)?;
        Ok(Self {
            registry,
            desired,
            store,
        })
    }

    /// Load state only; configuration is optional
    pub fn load_state(ctx: &Context) -> Result<Self> {
        let registry = resource::registry().context("Resource kinds are inconsistent")?;
        let desired = if ctx.config_path.exists() {
            DesiredConfig::load(&ctx.config_path, &registry)?
        } else {
            DesiredConfig::default()
        };
        let store = StateStore::load(&ctx.state_path)?;
        Ok(Self {
            registry,
            desired,
            store,
        })
    }

    pub fn gateway(&self) -> Result<HttpGateway> {
        connect(&self.desired.provider)
    }
}

/// Build the HTTP gateway, reporting every missing setting at once
pub fn connect(settings: &ProviderSettings) -> Result<HttpGateway> {
    match ClientConfig::from_env(settings) {
        Ok(config) => {
            log::debug!("Using CrateDB Cloud at {}", config.url);
            Ok(HttpGateway::new(&config))
        }
        Err(cratedb::Error::Config { problems }) => {
            let lines: Vec<_> = problems.iter().map(|p| format!("  • {}", p)).collect();
            bail!("Provider configuration is incomplete:\n{}", lines.join("\n"))
        }
        Err(e) => Err(e.into()),
    }
}
