//! # CMIS Explorer
//!
//! A browsing client for CMIS repositories spoken to over the AtomPub
//! binding: list folders page by page, inspect documents and their
//! properties, look at what a repository supports, and keep favorites.
//!
//! The I/O-free parts (data model, error taxonomy, feed parser, favorite
//! store trait) live in the `cmis-explorer-core` crate. This crate adds the
//! network, persistence and task layers on top, plus the `cmisx` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌────────────┐   ┌───────────┐
//! │  cmisx   │──▶│   Tasks    │──▶│ Repository │──▶│ Sessions  │
//! │  (CLI)   │◀──│ (mailbox)  │   │   Client   │   │           │
//! └────┬─────┘   └────────────┘   └─────┬──────┘   └─────┬─────┘
//!      │                                │ parse          │ GET
//!      ▼                                ▼                ▼
//! ┌──────────┐                    ┌──────────┐     ┌───────────┐
//! │ SQLite   │                    │   Feed   │     │ Transport │
//! │favorites │                    │  Parser  │     │ (reqwest) │
//! └──────────┘                    └──────────┘     └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cmisx init                                  # create favorites database
//! cmisx servers                               # configured servers
//! cmisx info demo                             # repository info + capabilities
//! cmisx browse demo                           # root folder
//! cmisx browse demo --folder '<children url>'
//! cmisx favorites add demo '<item url>'
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`transport`] | HTTP seam and status classification |
//! | [`session`] | Per-server session negotiation |
//! | [`repository`] | Folder listing, item detail, capabilities |
//! | [`tasks`] | Keyed background tasks and result delivery |
//! | [`sqlite_store`] | SQLite favorite store |
//! | [`app`] | Application handle |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | `tracing` subscriber setup |

pub mod app;
pub mod browse;
pub mod config;
pub mod db;
pub mod favorites;
pub mod info;
pub mod logging;
pub mod migrate;
pub mod repository;
pub mod session;
pub mod sqlite_store;
pub mod tasks;
pub mod transport;

#[cfg(test)]
mod test_fixtures;

pub use cmis_explorer_core::{CmisError, ErrorKind, FeedError, StoreError};
