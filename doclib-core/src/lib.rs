//! doclib core library — domain types, settings, storage layout, registry.
//!
//! - [`types`] — newtypes and the asset record
//! - [`config`] — [`Settings`] and their resolution order
//! - [`layout`] — where the library, registries and workspaces live
//! - [`registry`] — the per-product [`SignatureRegistry`]
//! - [`error`] — [`RegistryError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod layout;
pub mod registry;
pub mod types;

pub use config::{BranchMatch, Settings};
pub use error::{ConfigError, RegistryError};
pub use layout::Layout;
pub use registry::{compute_key, LoadStatus, Registration, RegistryLock, SignatureRegistry};
pub use types::{AssetRecord, ContentKey, OperationName, ProductCode, Signature, TicketId};
