//! # CMIS Explorer Core
//!
//! Shared, I/O-free logic for CMIS Explorer: the data model, the error
//! taxonomy, the Atom/AtomPub feed parser, and the favorite store
//! abstraction.
//!
//! This crate contains no tokio, sqlx, HTTP client, or filesystem
//! dependencies. Everything here is deterministic for a given input, which
//! keeps the parser and the in-memory store trivially testable.

pub mod error;
pub mod feed;
pub mod models;
pub mod store;

pub use error::{CmisError, ErrorKind, FeedError, StoreError};
pub use feed::{parse, parse_entry, parse_feed, parse_service, FeedKind, Payload};
