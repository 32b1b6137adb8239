//! OBJ files on disk as a [`ResourceLoader`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use asset::{Scene, obj};
use futures_util::future::{BoxFuture, FutureExt};

use crate::cache::{ResourceKey, ResourceLoader};

/// Resolves keys as paths relative to `root` and parses them as OBJ.
#[derive(Clone, Debug, Default)]
pub struct ObjFileLoader {
    root: PathBuf,
}

impl ObjFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &ResourceKey) -> PathBuf {
        self.root.join(key.as_str())
    }
}

impl ResourceLoader for ObjFileLoader {
    fn load(&self, key: ResourceKey) -> BoxFuture<'static, anyhow::Result<Scene>> {
        let path = self.path_for(&key);
        async move {
            log::debug!("Reading '{key}' from {}", path.display());
            obj::load_obj_from_path(&path).with_context(|| format!("Resource '{key}'"))
        }
        .boxed()
    }
}
