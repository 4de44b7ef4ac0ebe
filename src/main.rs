//! # CMIS Explorer CLI (`cmisx`)
//!
//! Browse CMIS repositories over the AtomPub binding from the terminal.
//!
//! ## Usage
//!
//! ```bash
//! cmisx --config ./config/cmisx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cmisx init` | Create the favorites database |
//! | `cmisx servers` | List configured servers |
//! | `cmisx info <server>` | Repository info and capabilities |
//! | `cmisx browse <server>` | List the root folder, or `--folder`, one page at a time |
//! | `cmisx show <server> <url>` | Show one item with its properties |
//! | `cmisx favorites list\|add\|delete\|open` | Manage favorites |
//!
//! Every command accepts `--json` for machine-readable output. Logs go to
//! stderr; set `RUST_LOG` or pass `--verbose` to see them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cmis_explorer::app::App;
use cmis_explorer::{browse, config, favorites, info, logging, migrate};

/// CMIS Explorer: browse CMIS repositories from the terminal.
#[derive(Parser)]
#[command(
    name = "cmisx",
    about = "Browse CMIS repositories over the AtomPub binding",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cmisx.toml")]
    config: PathBuf,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the favorites database. Safe to run repeatedly.
    Init,

    /// List configured servers.
    Servers,

    /// Show repository info and capabilities of a server.
    ///
    /// Always refetches the service document.
    Info {
        /// Server id (the key of a `[servers.<id>]` table).
        server: String,
    },

    /// List a folder, one page at a time.
    Browse {
        server: String,

        /// Children URL of the folder to list. Defaults to the root folder.
        #[arg(long)]
        folder: Option<String>,

        /// `next` link printed by a previous page.
        #[arg(long)]
        cursor: Option<String>,
    },

    /// Show one item and its CMIS properties.
    Show {
        server: String,
        /// Self URL of the item.
        url: String,
    },

    /// Manage favorites.
    Favorites {
        #[command(subcommand)]
        action: FavoriteAction,
    },
}

#[derive(Subcommand)]
enum FavoriteAction {
    /// List favorites, optionally of one server only.
    List { server: Option<String> },

    /// Bookmark an item.
    Add {
        server: String,
        /// Self URL of the item.
        url: String,
        /// Display name; defaults to the item's title.
        #[arg(long)]
        name: Option<String>,
    },

    /// Delete a favorite by id.
    Delete { id: i64 },

    /// Open a favorite: show a document, list a folder.
    Open {
        id: i64,
        /// Show a folder's own properties instead of its contents.
        #[arg(long)]
        details: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let json = cli.json;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
            return Ok(());
        }
        Commands::Servers => {
            return info::run_servers(&cfg, json);
        }
        _ => {}
    }

    let mut app = App::open(cfg).await?;
    let result = match cli.command {
        Commands::Info { server } => info::run_info(&mut app, &server, json).await,
        Commands::Browse {
            server,
            folder,
            cursor,
        } => {
            browse::run_browse(
                &mut app,
                &server,
                folder.as_deref(),
                cursor.as_deref(),
                json,
            )
            .await
        }
        Commands::Show { server, url } => browse::run_show(&mut app, &server, &url, json).await,
        Commands::Favorites { action } => match action {
            FavoriteAction::List { server } => {
                favorites::run_list(&app, server.as_deref(), json).await
            }
            FavoriteAction::Add { server, url, name } => {
                favorites::run_add(&mut app, &server, &url, name, json).await
            }
            FavoriteAction::Delete { id } => favorites::run_delete(&app, id, json).await,
            FavoriteAction::Open { id, details } => {
                favorites::run_open(&mut app, id, details, json).await
            }
        },
        Commands::Init | Commands::Servers => Ok(()),
    };
    app.close().await;
    result
}
