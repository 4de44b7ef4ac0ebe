//! CMIS AtomPub payload parser.
//!
//! Decodes the three document shapes a browsing client needs:
//!
//! | Kind | Root element | Result |
//! |------|--------------|--------|
//! | [`FeedKind::Feed`] | `atom:feed` | [`FolderPage`]: typed items + `next` cursor |
//! | [`FeedKind::Entry`] | `atom:entry` | [`ItemDetail`]: one item + its properties |
//! | [`FeedKind::Service`] | `app:service` | [`RepositoryInfo`]: collections + capabilities |
//!
//! Parsing is pure: no I/O, no clock, no global state. Hrefs are returned
//! exactly as written; the repository client resolves relative ones against
//! the URL it fetched.
//!
//! # Item classification
//!
//! An entry is a folder when its `cmis:baseTypeId` is `cmis:folder`, or when
//! its mimetype is absent, empty, or the literal `cmis:folder`, whatever base
//! type it declares. A document's mimetype is therefore never empty and never
//! `cmis:folder`. Folders must carry a `rel="down"` child link; every entry
//! must carry an `atom:id` and a `rel="self"` link. Violations fail with
//! [`FeedError::MalformedFeed`].
//!
//! The mimetype is taken from `cmis:contentStreamMimeType`, falling back to
//! the `type` attribute of `atom:content`.

mod xml;

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::FeedError;
use crate::models::{
    FeedItem, FolderPage, ItemDetail, ItemKind, Property, RepositoryInfo, FOLDER_TYPE,
};
use xml::Element;

/// The payload shape a caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// A folder listing (`atom:feed`).
    Feed,
    /// A single object (`atom:entry`).
    Entry,
    /// The repository service document (`app:service`).
    Service,
}

impl FeedKind {
    fn root_name(self) -> &'static str {
        match self {
            FeedKind::Feed => "feed",
            FeedKind::Entry => "entry",
            FeedKind::Service => "service",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_name())
    }
}

/// A decoded payload, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Feed(FolderPage),
    Entry(ItemDetail),
    Service(RepositoryInfo),
}

/// Parse `raw` as the given kind.
///
/// # Errors
///
/// - [`FeedError::UnsupportedKind`] if the root element is not the one
///   `expected` calls for (JSON payloads report `found = "json"`).
/// - [`FeedError::MalformedFeed`] if the XML is broken or a required
///   id/link is missing.
pub fn parse(raw: &str, expected: FeedKind) -> Result<Payload, FeedError> {
    match expected {
        FeedKind::Feed => parse_feed(raw).map(Payload::Feed),
        FeedKind::Entry => parse_entry(raw).map(Payload::Entry),
        FeedKind::Service => parse_service(raw).map(Payload::Service),
    }
}

/// Parse a folder listing feed.
pub fn parse_feed(raw: &str) -> Result<FolderPage, FeedError> {
    let root = parse_root(raw, FeedKind::Feed)?;

    let mut items = Vec::new();
    for entry in root.children_named("entry") {
        let (item, _) = decode_entry(entry)?;
        items.push(item);
    }

    Ok(FolderPage {
        title: root.child_text("title").map(str::to_string),
        self_url: link_href(&root, "self").map(str::to_string),
        next: link_href(&root, "next").map(str::to_string),
        num_items: root.child_text("numItems").and_then(|n| n.parse().ok()),
        items,
    })
}

/// Parse a single entry together with its CMIS properties.
pub fn parse_entry(raw: &str) -> Result<ItemDetail, FeedError> {
    let root = parse_root(raw, FeedKind::Entry)?;
    let (item, properties) = decode_entry(&root)?;
    Ok(ItemDetail { item, properties })
}

/// Parse an AtomPub service document. Only the first workspace is read.
pub fn parse_service(raw: &str) -> Result<RepositoryInfo, FeedError> {
    let root = parse_root(raw, FeedKind::Service)?;
    let workspace = root
        .child("workspace")
        .ok_or_else(|| malformed("service document has no workspace"))?;
    let repo = workspace
        .child("repositoryInfo")
        .ok_or_else(|| malformed("workspace has no repositoryInfo"))?;
    let id = repo
        .child_text("repositoryId")
        .ok_or_else(|| malformed("repositoryInfo has no repositoryId"))?;

    let mut info = RepositoryInfo {
        id: id.to_string(),
        name: repo
            .child_text("repositoryName")
            .or_else(|| workspace.child_text("title"))
            .unwrap_or(id)
            .to_string(),
        description: text_of(repo, "repositoryDescription"),
        vendor: text_of(repo, "vendorName"),
        product_name: text_of(repo, "productName"),
        product_version: text_of(repo, "productVersion"),
        cmis_version: text_of(repo, "cmisVersionSupported"),
        root_folder_id: text_of(repo, "rootFolderId"),
        ..Default::default()
    };

    for collection in workspace.children_named("collection") {
        let Some(href) = collection.attr("href") else {
            continue;
        };
        if let Some(kind) = collection.child_text("collectionType") {
            if kind == "root" {
                info.root_collection_url = Some(href.to_string());
            }
            info.collections.insert(kind.to_string(), href.to_string());
        }
    }

    for template in workspace.children_named("uritemplate") {
        if let (Some(kind), Some(tpl)) = (template.child_text("type"), template.child_text("template"))
        {
            info.uri_templates.insert(kind.to_string(), tpl.to_string());
        }
    }

    if let Some(caps) = repo.child("capabilities") {
        for cap in &caps.children {
            let name = cap.name.strip_prefix("capability").unwrap_or(&cap.name);
            let value = if cap.text.trim().is_empty() {
                cap.children
                    .iter()
                    .map(|c| c.text.trim())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                cap.text.trim().to_string()
            };
            info.capabilities.insert(name.to_string(), value);
        }
    }

    Ok(info)
}

// ============ Internals ============

fn malformed(msg: impl Into<String>) -> FeedError {
    FeedError::MalformedFeed(msg.into())
}

fn parse_root(raw: &str, expected: FeedKind) -> Result<Element, FeedError> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Err(FeedError::UnsupportedKind {
            expected,
            found: "json".to_string(),
        });
    }

    let root = xml::parse_document(trimmed).map_err(FeedError::MalformedFeed)?;
    if root.name != expected.root_name() {
        return Err(FeedError::UnsupportedKind {
            expected,
            found: root.name,
        });
    }
    Ok(root)
}

fn text_of(el: &Element, name: &str) -> Option<String> {
    el.child_text(name).map(str::to_string)
}

fn link_href<'a>(el: &'a Element, rel: &str) -> Option<&'a str> {
    el.children_named("link")
        .find(|l| l.attr("rel") == Some(rel))
        .and_then(|l| l.attr("href"))
}

/// The child-collection link of a folder entry.
///
/// Prefers the `rel="down"` link typed as an Atom feed over the folder-tree
/// (`application/cmistree+xml`) variant.
fn children_href(entry: &Element) -> Option<&str> {
    let downs: Vec<&Element> = entry
        .children_named("link")
        .filter(|l| l.attr("rel") == Some("down"))
        .collect();
    downs
        .iter()
        .copied()
        .find(|l| l.attr("type").is_some_and(|t| t.contains("type=feed")))
        .or_else(|| {
            downs
                .iter()
                .copied()
                .find(|l| !l.attr("type").is_some_and(|t| t.contains("cmistree")))
        })
        .and_then(|l| l.attr("href"))
}

fn decode_properties(entry: &Element) -> Vec<Property> {
    let Some(props) = entry.child("object").and_then(|o| o.child("properties")) else {
        return Vec::new();
    };
    props
        .children
        .iter()
        .filter_map(|p| {
            let id = p.attr("propertyDefinitionId")?;
            Some(Property {
                id: id.to_string(),
                property_type: p.name.clone(),
                display_name: p.attr("displayName").map(str::to_string),
                values: p
                    .children_named("value")
                    .map(|v| v.text.trim().to_string())
                    .collect(),
            })
        })
        .collect()
}

fn prop_value<'a>(props: &'a [Property], id: &str) -> Option<&'a str> {
    props
        .iter()
        .find(|p| p.id == id)
        .and_then(|p| p.first_value())
        .filter(|v| !v.is_empty())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode_entry(entry: &Element) -> Result<(FeedItem, Vec<Property>), FeedError> {
    let id = entry
        .child_text("id")
        .ok_or_else(|| malformed("entry without <id>"))?
        .to_string();
    let url = link_href(entry, "self")
        .ok_or_else(|| malformed(format!("entry '{}' has no self link", id)))?
        .to_string();

    let properties = decode_properties(entry);
    let content = entry.child("content");

    let base_type_id = prop_value(&properties, "cmis:baseTypeId").map(str::to_string);
    let mimetype = prop_value(&properties, "cmis:contentStreamMimeType")
        .or_else(|| content.and_then(|c| c.attr("type")))
        .map(str::trim)
        .filter(|m| !m.is_empty());

    let document_mimetype = mimetype.filter(|m| *m != FOLDER_TYPE);
    let is_folder = base_type_id.as_deref() == Some(FOLDER_TYPE) || document_mimetype.is_none();

    let kind = match document_mimetype {
        Some(mimetype) if !is_folder => ItemKind::Document {
            mimetype: mimetype.to_string(),
        },
        _ => {
            let children_url = children_href(entry).ok_or_else(|| {
                malformed(format!("folder '{}' has no child-collection link", id))
            })?;
            ItemKind::Folder {
                children_url: children_url.to_string(),
            }
        }
    };

    let title = entry
        .child_text("title")
        .or_else(|| prop_value(&properties, "cmis:name"))
        .unwrap_or_default()
        .to_string();

    let content_url = if is_folder {
        None
    } else {
        content
            .and_then(|c| c.attr("src"))
            .or_else(|| link_href(entry, "edit-media"))
            .map(str::to_string)
    };

    let author = entry
        .child("author")
        .and_then(|a| a.child_text("name"))
        .or_else(|| prop_value(&properties, "cmis:createdBy"))
        .map(str::to_string);

    let updated = entry
        .child_text("updated")
        .or_else(|| prop_value(&properties, "cmis:lastModificationDate"))
        .and_then(parse_timestamp);

    let item = FeedItem {
        id,
        title,
        url,
        parent_url: link_href(entry, "up").map(str::to_string),
        kind,
        object_id: prop_value(&properties, "cmis:objectId").map(str::to_string),
        base_type_id,
        content_url,
        content_length: prop_value(&properties, "cmis:contentStreamLength")
            .and_then(|n| n.parse().ok()),
        author,
        updated,
    };
    Ok((item, properties))
}
