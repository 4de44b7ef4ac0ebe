//! Server listing and repository info (`cmisx servers`, `cmisx info`).

use anyhow::Result;

use crate::app::{into_result, print_json, App};
use crate::config::Config;

pub fn run_servers(config: &Config, json: bool) -> Result<()> {
    let servers = config.servers();
    if json {
        return print_json(&servers);
    }

    if servers.is_empty() {
        println!("No servers configured. Add a [servers.<id>] table to the config.");
        return Ok(());
    }

    println!("{:<16} {:<24} {:<12} URL", "ID", "NAME", "USER");
    for server in &servers {
        let user = server
            .credentials
            .as_ref()
            .map(|c| c.username.as_str())
            .unwrap_or("-");
        println!("{:<16} {:<24} {:<12} {}", server.id, server.name, user, server.url);
    }
    Ok(())
}

/// Refetch the service document and print general info and capabilities.
pub async fn run_info(app: &mut App, server_id: &str, json: bool) -> Result<()> {
    let server = app.server(server_id)?;
    let shared = app.capabilities(&server).await?;
    let info = into_result(&shared)?;

    if json {
        return print_json(info);
    }

    println!("{} ({})", server.name, server.url);
    println!();
    println!("  General:");
    for (label, value) in &info.general {
        println!("    {:<20} {}", label, value);
    }
    println!();
    println!("  Capabilities:");
    if info.capabilities.is_empty() {
        println!("    (none advertised)");
    }
    for (name, value) in &info.capabilities {
        println!("    {:<28} {}", name, value);
    }
    Ok(())
}
