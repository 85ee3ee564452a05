//! Data source commands: `get` and `list`

use anyhow::Result;

use crate::Context;
use crate::cli::ListCommand;
use crate::data_source::DataSource;

use super::Workspace;

pub fn get(ctx: &Context, source: &str, id: &str) -> Result<()> {
    let source: DataSource = source.parse()?;
    read(ctx, source, Some(id))
}

pub fn list(ctx: &Context, cmd: &ListCommand) -> Result<()> {
    match cmd {
        ListCommand::Organizations => read(ctx, DataSource::Organizations, None),
    }
}

fn read(ctx: &Context, source: DataSource, id: Option<&str>) -> Result<()> {
    let ws = Workspace::load_state(ctx)?;
    let gateway = ws.gateway()?;

    let document = source.read(&ws.registry, &gateway, id)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
