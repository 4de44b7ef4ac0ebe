//! Core data models used throughout CMIS Explorer.
//!
//! These types represent the servers, feed items, repository descriptions,
//! and favorites that flow between the parser, the repository client, the
//! favorite store, and the screens that call them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Base type id (and legacy mimetype marker) of CMIS folders.
pub const FOLDER_TYPE: &str = "cmis:folder";

/// Credentials reference for a configured server.
///
/// The password is either given inline or named by an environment
/// variable; resolution happens when a session is negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CredentialsRef {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_env: Option<String>,
}

/// A configured CMIS server.
///
/// `url` points at the AtomPub service document. Servers are created from
/// user configuration and never mutated while a session is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub url: String,
    pub credentials: Option<CredentialsRef>,
}

/// Folder or document specific attributes of a [`FeedItem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// A folder; always exposes its child-listing link.
    Folder { children_url: String },
    /// A document; `mimetype` is never [`FOLDER_TYPE`].
    Document { mimetype: String },
}

/// A single folder or document decoded from an Atom entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedItem {
    /// Atom entry id.
    pub id: String,
    /// Display name (Atom title, falling back to `cmis:name`).
    pub title: String,
    /// Self link.
    pub url: String,
    /// `rel="up"` link, when the server provides one.
    pub parent_url: Option<String>,
    pub kind: ItemKind,
    /// `cmis:objectId` property.
    pub object_id: Option<String>,
    /// `cmis:baseTypeId` property.
    pub base_type_id: Option<String>,
    /// Content stream location (`atom:content/@src`).
    pub content_url: Option<String>,
    pub content_length: Option<u64>,
    pub author: Option<String>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedItem {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder { .. })
    }

    /// Mimetype of a document, `None` for folders.
    pub fn mimetype(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Document { mimetype } => Some(mimetype),
            ItemKind::Folder { .. } => None,
        }
    }

    pub fn children_url(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::Folder { children_url } => Some(children_url),
            ItemKind::Document { .. } => None,
        }
    }

    /// Rewrite every link of this item as an absolute URL relative to `base`.
    ///
    /// Links that fail to join are left untouched.
    pub fn resolve_links(&mut self, base: &Url) {
        resolve_in_place(&mut self.url, base);
        if let Some(parent) = self.parent_url.as_mut() {
            resolve_in_place(parent, base);
        }
        if let Some(content) = self.content_url.as_mut() {
            resolve_in_place(content, base);
        }
        if let ItemKind::Folder { children_url } = &mut self.kind {
            resolve_in_place(children_url, base);
        }
    }
}

pub(crate) fn resolve_in_place(href: &mut String, base: &Url) {
    if let Ok(joined) = base.join(href) {
        *href = joined.to_string();
    }
}

/// One page of a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPage {
    pub title: Option<String>,
    pub self_url: Option<String>,
    pub items: Vec<FeedItem>,
    /// Feed-level `rel="next"` link; pass it back as the cursor.
    pub next: Option<String>,
    /// `cmisra:numItems`, the total size of the listing if the server knows it.
    pub num_items: Option<u64>,
}

impl FolderPage {
    pub fn resolve_links(&mut self, base: &Url) {
        if let Some(self_url) = self.self_url.as_mut() {
            resolve_in_place(self_url, base);
        }
        if let Some(next) = self.next.as_mut() {
            resolve_in_place(next, base);
        }
        for item in &mut self.items {
            item.resolve_links(base);
        }
    }
}

/// A CMIS property from an entry's `cmis:properties` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    /// `propertyDefinitionId`, e.g. `cmis:name`.
    pub id: String,
    /// Element local name, e.g. `propertyString`.
    pub property_type: String,
    pub display_name: Option<String>,
    pub values: Vec<String>,
}

impl Property {
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}

/// A single item with its full property list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemDetail {
    pub item: FeedItem,
    pub properties: Vec<Property>,
}

impl ItemDetail {
    pub fn property(&self, id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.id == id)
    }
}

/// Repository description decoded from an AtomPub service document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryInfo {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_name: Option<String>,
    pub product_version: Option<String>,
    pub cmis_version: Option<String>,
    pub root_folder_id: Option<String>,
    /// Collection marked `cmisra:collectionType = root`.
    pub root_collection_url: Option<String>,
    /// Collection hrefs keyed by `cmisra:collectionType`.
    pub collections: BTreeMap<String, String>,
    /// URI templates keyed by `cmisra:type`.
    pub uri_templates: BTreeMap<String, String>,
    /// Capabilities with the `capability` prefix stripped, e.g. `ACL -> none`.
    pub capabilities: BTreeMap<String, String>,
}

impl RepositoryInfo {
    /// Flatten into the general/capabilities tabs of the server info screen.
    pub fn to_server_info(&self) -> ServerInfo {
        let mut general = vec![
            ("Repository id".to_string(), self.id.clone()),
            ("Name".to_string(), self.name.clone()),
        ];
        let optional = [
            ("Description", &self.description),
            ("Vendor", &self.vendor),
            ("Product", &self.product_name),
            ("Product version", &self.product_version),
            ("CMIS version", &self.cmis_version),
            ("Root folder id", &self.root_folder_id),
        ];
        for (label, value) in optional {
            if let Some(v) = value {
                general.push((label.to_string(), v.clone()));
            }
        }

        let capabilities = self
            .capabilities
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        ServerInfo {
            general,
            capabilities,
        }
    }

    pub fn resolve_links(&mut self, base: &Url) {
        if let Some(root) = self.root_collection_url.as_mut() {
            resolve_in_place(root, base);
        }
        for href in self.collections.values_mut() {
            resolve_in_place(href, base);
        }
    }
}

/// General information and capabilities, as shown on the server info screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub general: Vec<(String, String)>,
    pub capabilities: Vec<(String, String)>,
}

/// A user bookmark on a server item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Favorite {
    pub id: i64,
    pub server_id: String,
    pub url: String,
    pub display_name: String,
    /// Snapshot of the item's mimetype; empty or `cmis:folder` for folders.
    pub mimetype: String,
    pub created_at: DateTime<Utc>,
}

impl Favorite {
    pub fn is_folder(&self) -> bool {
        self.mimetype.is_empty() || self.mimetype == FOLDER_TYPE
    }
}

/// A favorite that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFavorite {
    pub server_id: String,
    pub url: String,
    pub display_name: String,
    pub mimetype: String,
}

impl NewFavorite {
    /// Snapshot an item for bookmarking. Folders are recorded as `cmis:folder`.
    pub fn from_item(server_id: &str, item: &FeedItem) -> Self {
        Self {
            server_id: server_id.to_string(),
            url: item.url.clone(),
            display_name: item.title.clone(),
            mimetype: item.mimetype().unwrap_or(FOLDER_TYPE).to_string(),
        }
    }
}
