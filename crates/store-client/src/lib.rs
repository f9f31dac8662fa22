//! Data store client for the Reelhouse messaging core
//!
//! The messaging subsystem never talks to storage directly. It consumes two
//! narrow collaborator contracts defined here:
//! - [`MessageStore`]: the durable, append-only direct message log
//! - [`ProfileLookup`]: user id to display name / avatar resolution
//!
//! Two implementations ship with the crate: [`RestStore`], which speaks the
//! hosted JSON API over HTTP, and [`MemoryStore`], used by tests and local
//! development.

pub mod error;
pub mod http;
pub mod memory;
pub mod store;
pub mod types;

pub use error::{Result, StoreError};
pub use http::{RestConfig, RestStore};
pub use memory::MemoryStore;
pub use store::{MessageStore, ProfileLookup};
pub use types::{Message, Profile, DIRECT_MESSAGE_SUBJECT, UNKNOWN_USER_NAME};
