//! Shared model loading and part extraction.
//!
//! [`ResourceCache`] fetches each model once per key and lets any number of
//! requesters await the same load. [`select_part`] pulls an independently
//! owned copy of a named part out of a cached model. [`PartLoader`] ties the
//! two together for hosts that just want "this part of that model".

pub mod cache;
pub mod error;
pub mod loader;
pub mod request;
pub mod select;

pub use cache::{EntryState, ResourceCache, ResourceKey, ResourceLoader, ResourceRequest};
pub use error::{LoadError, PartError, SelectError};
pub use loader::ObjFileLoader;
pub use request::{PartLoader, PartOptions, SelectedPart};
pub use select::{BufferMode, SelectedAsset, select_part};
