//! Async client for the NetBox REST API.
//!
//! Exposes the backend as a typed object store: every resource kind supports
//! `get` / `filter` / `all` / `create` / `update` / `delete`, with token
//! authentication and transparent `limit`/`offset` pagination.
//!
//! The reconciliation engine in `rackforge-core` builds on exactly this
//! surface and nothing else.

mod client;
mod error;
mod kind;
mod record;
mod transport;

pub use client::NetBoxClient;
pub use error::Error;
pub use kind::ResourceKind;
pub use record::{ChoiceRef, Record, RelationRef, TagRef, Termination};
pub use transport::{TlsMode, TransportConfig};
