//! Favorite management (`cmisx favorites ...`).
//!
//! | Command | Effect |
//! |---------|--------|
//! | `list [server]` | Favorites of one server, or of every configured server |
//! | `add <server> <url>` | Fetch the item and bookmark a snapshot of it |
//! | `delete <id>` | Remove a favorite; unknown ids are reported, not an error |
//! | `open <id> [--details]` | Show a document, or list a folder |

use anyhow::{bail, Result};
use serde::Serialize;

use cmis_explorer_core::models::{Favorite, NewFavorite};

use crate::app::{from_store, into_result, print_json, App};
use crate::browse::{print_detail, print_page};

pub async fn run_list(app: &App, server_id: Option<&str>, json: bool) -> Result<()> {
    let server_ids: Vec<String> = match server_id {
        Some(id) => vec![app.server(id)?.id],
        None => app.config().servers.keys().cloned().collect(),
    };

    let mut favorites: Vec<Favorite> = Vec::new();
    for id in &server_ids {
        favorites.extend(from_store(app.favorites().find_all(id).await)?);
    }

    if json {
        return print_json(&favorites);
    }
    if favorites.is_empty() {
        println!("No favorites.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<32} {:<24} URL", "ID", "SERVER", "NAME", "MIMETYPE");
    for fav in &favorites {
        println!(
            "{:<6} {:<12} {:<32} {:<24} {}",
            fav.id,
            fav.server_id,
            fav.display_name,
            if fav.is_folder() { "folder" } else { fav.mimetype.as_str() },
            fav.url
        );
    }
    Ok(())
}

/// Bookmark the item at `url`. The display name defaults to the item's title.
pub async fn run_add(
    app: &mut App,
    server_id: &str,
    url: &str,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    let server = app.server(server_id)?;
    let shared = app.detail(&server, url).await?;
    let detail = into_result(&shared)?;

    let mut new = NewFavorite::from_item(&server.id, &detail.item);
    if let Some(name) = name {
        new.display_name = name;
    }
    let stored = from_store(app.favorites().add(&new).await)?;

    if json {
        return print_json(&stored);
    }
    println!("Added favorite {}: {}", stored.id, stored.display_name);
    Ok(())
}

#[derive(Serialize)]
struct DeleteResult {
    id: i64,
    deleted: bool,
}

pub async fn run_delete(app: &App, id: i64, json: bool) -> Result<()> {
    let deleted = from_store(app.favorites().delete(id).await)?;
    if json {
        return print_json(&DeleteResult { id, deleted });
    }
    if deleted {
        println!("Deleted favorite {}.", id);
    } else {
        println!("No favorite with id {}.", id);
    }
    Ok(())
}

/// Open a favorite: documents are shown, folders are listed unless
/// `details` asks for the folder's own properties.
pub async fn run_open(app: &mut App, id: i64, details: bool, json: bool) -> Result<()> {
    let Some(fav) = from_store(app.favorites().get(id).await)? else {
        bail!("No favorite with id {}", id);
    };
    let server = app.server(&fav.server_id)?;

    let shared = app.detail(&server, &fav.url).await?;
    let detail = into_result(&shared)?;

    if !fav.is_folder() || details {
        if json {
            return print_json(detail);
        }
        print_detail(detail);
        return Ok(());
    }

    let Some(children) = detail.item.children_url() else {
        bail!("'{}' is no longer a folder", fav.display_name);
    };
    let children = children.to_string();
    let shared = app.list(&server, Some(&children), None).await?;
    let page = into_result(&shared)?;
    if json {
        return print_json(page);
    }
    print_page(&server, page);
    Ok(())
}
