//! Error taxonomy: load failures are scoped to a cache entry, selection
//! failures to the single request that hit them.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::ResourceKey;

/// The loader failed to fetch or parse a resource. Cloned to every waiter.
#[derive(Debug, Clone, Error)]
#[error("Failed to load '{key}': {cause:#}")]
pub struct LoadError {
    key: ResourceKey,
    cause: Arc<anyhow::Error>,
}

impl LoadError {
    pub fn new(key: ResourceKey, cause: anyhow::Error) -> Self {
        Self {
            key,
            cause: Arc::new(cause),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("Part '{part}' not found in model")]
    PartNotFound { part: String },
    #[error("Part '{part}' contains no drawable geometry")]
    NoDrawableFound { part: String },
}

#[derive(Debug, Clone, Error)]
pub enum PartError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Select(#[from] SelectError),
}
