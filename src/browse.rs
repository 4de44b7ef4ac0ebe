//! Folder browsing and item details (`cmisx browse`, `cmisx show`).

use anyhow::Result;

use cmis_explorer_core::models::{FeedItem, FolderPage, ItemDetail, Server};

use crate::app::{into_result, print_json, App};

/// List one page of a folder, or of the repository root.
pub async fn run_browse(
    app: &mut App,
    server_id: &str,
    folder: Option<&str>,
    cursor: Option<&str>,
    json: bool,
) -> Result<()> {
    let server = app.server(server_id)?;
    let shared = app.list(&server, folder, cursor).await?;
    let page = into_result(&shared)?;

    if json {
        return print_json(page);
    }
    print_page(&server, page);
    Ok(())
}

/// Show one item with all of its CMIS properties.
pub async fn run_show(app: &mut App, server_id: &str, url: &str, json: bool) -> Result<()> {
    let server = app.server(server_id)?;
    let shared = app.detail(&server, url).await?;
    let detail = into_result(&shared)?;

    if json {
        return print_json(detail);
    }
    print_detail(detail);
    Ok(())
}

pub(crate) fn print_page(server: &Server, page: &FolderPage) {
    let title = page.title.as_deref().unwrap_or("(untitled)");
    println!("{} / {}", server.name, title);
    match page.num_items {
        Some(total) => println!("{} of {} items", page.items.len(), total),
        None => println!("{} items", page.items.len()),
    }
    println!();

    if page.items.is_empty() {
        println!("Folder is empty.");
    } else {
        println!("{:<8} {:<32} {:<28} URL", "TYPE", "NAME", "MIMETYPE");
        for item in &page.items {
            println!(
                "{:<8} {:<32} {:<28} {}",
                if item.is_folder() { "folder" } else { "doc" },
                truncate(&item.title, 32),
                item.mimetype().unwrap_or("-"),
                item_link(item)
            );
        }
    }

    if let Some(next) = &page.next {
        println!();
        println!("More items: --cursor '{}'", next);
    }
}

/// Where to go next from an item: children for folders, self for documents.
fn item_link(item: &FeedItem) -> &str {
    item.children_url().unwrap_or(&item.url)
}

pub(crate) fn print_detail(detail: &ItemDetail) {
    let item = &detail.item;
    println!("{}", item.title);
    println!("{}", "=".repeat(item.title.chars().count().max(8)));
    println!();
    println!("  Type:      {}", if item.is_folder() { "folder" } else { "document" });
    if let Some(mimetype) = item.mimetype() {
        println!("  Mimetype:  {}", mimetype);
    }
    if let Some(length) = item.content_length {
        println!("  Size:      {} bytes", length);
    }
    if let Some(author) = &item.author {
        println!("  Author:    {}", author);
    }
    if let Some(updated) = item.updated {
        println!("  Updated:   {}", updated.to_rfc3339());
    }
    println!("  URL:       {}", item.url);
    if let Some(children) = item.children_url() {
        println!("  Children:  {}", children);
    }
    if let Some(content) = &item.content_url {
        println!("  Content:   {}", content);
    }

    if !detail.properties.is_empty() {
        println!();
        println!("  Properties:");
        for prop in &detail.properties {
            println!(
                "    {:<36} {}",
                prop.display_name.as_deref().unwrap_or(&prop.id),
                prop.values.join(", ")
            );
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
