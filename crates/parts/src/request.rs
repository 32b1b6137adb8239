//! Per-request options and the facade hosts call to get a part of a model.

use std::sync::Arc;

use corelib::Vec3;

use crate::{
    cache::{ResourceCache, ResourceKey, ResourceLoader},
    error::PartError,
    select::{BufferMode, SelectedAsset, select_part},
};

/// What a host asks for alongside the model key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartOptions {
    pub buffer_mode: BufferMode,
    pub reset_position: bool,
    /// `None` turns the request into a no-op.
    pub part_name: Option<String>,
}

impl PartOptions {
    pub fn part(name: impl Into<String>) -> Self {
        Self {
            part_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn buffer_mode(mut self, mode: BufferMode) -> Self {
        self.buffer_mode = mode;
        self
    }

    pub fn reset_position(mut self, reset: bool) -> Self {
        self.reset_position = reset;
        self
    }
}

/// A selected part ready to hand to the host.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectedPart {
    pub asset: SelectedAsset,
    /// Where the part sat before `reset_position` moved it to the origin.
    pub original_position: Option<Vec3>,
}

/// Loads models through a shared [`ResourceCache`] and extracts parts from them.
pub struct PartLoader<L> {
    cache: Arc<ResourceCache>,
    loader: L,
}

impl<L: ResourceLoader> PartLoader<L> {
    pub fn new(cache: Arc<ResourceCache>, loader: L) -> Self {
        Self { cache, loader }
    }

    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// Fetch (or reuse) the model behind `key` and copy the requested part out.
    ///
    /// Returns `Ok(None)` without touching the cache when no part is named.
    /// A load failure fails every request waiting on that key; a selection
    /// failure only fails this one.
    pub async fn load_part(
        &self,
        key: impl Into<ResourceKey>,
        options: &PartOptions,
    ) -> Result<Option<SelectedPart>, PartError> {
        let key = key.into();
        let Some(part_name) = options.part_name.as_deref() else {
            log::debug!("No part requested from '{key}'; skipping");
            return Ok(None);
        };

        let scene = self.cache.request(key.clone(), &self.loader).await?;
        let mut asset = select_part(&scene, part_name, options.buffer_mode)
            .inspect_err(|err| log::warn!("'{key}': {err}"))?;
        let original_position = options.reset_position.then(|| asset.reset_position());

        log::debug!(
            "Selected '{part_name}' from '{key}' ({:?}, {} triangles)",
            options.buffer_mode,
            asset.mesh().map_or(0, |mesh| mesh.triangle_count())
        );
        Ok(Some(SelectedPart {
            asset,
            original_position,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use asset::{MeshData, MeshVertex, Node, Scene};
    use corelib::{Transform, vec3};
    use futures_util::future::join;

    use super::*;
    use crate::{cache::EntryState, error::SelectError};

    fn garage(name: &str) -> Scene {
        let tri = MeshData::new(
            vec![
                MeshVertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
                MeshVertex::new([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 0.0]),
                MeshVertex::new([0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0]),
            ],
            vec![0, 1, 2],
        );
        Scene::new(
            Node::new(name)
                .with_child(
                    Node::new("hood")
                        .with_transform(Transform::from_translation(vec3(1.0, 2.0, 3.0)))
                        .with_mesh(tri.clone()),
                )
                .with_child(Node::new("door").with_mesh(tri)),
        )
    }

    fn loader(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(ResourceKey) -> std::future::Ready<anyhow::Result<Scene>> {
        move |key: ResourceKey| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(garage(key.as_str())))
        }
    }

    #[tokio::test]
    async fn two_parts_share_one_fetch_and_get_separate_copies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parts = PartLoader::new(Arc::new(ResourceCache::new()), loader(Arc::clone(&calls)));

        let (hood, door) = join(
            parts.load_part("a.model", &PartOptions::part("hood")),
            parts.load_part("a.model", &PartOptions::part("door")),
        )
        .await;
        let (hood, door) = (hood.unwrap().unwrap(), door.unwrap().unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hood.asset.node.name, "hood");
        assert_eq!(door.asset.node.name, "door");
        assert_eq!(hood.original_position, None);
        assert_eq!(hood.asset.transform().translation, vec3(1.0, 2.0, 3.0));
    }

    #[tokio::test]
    async fn missing_part_leaves_entry_ready() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parts = PartLoader::new(Arc::new(ResourceCache::new()), loader(Arc::clone(&calls)));

        let err = parts
            .load_part("a.model", &PartOptions::part("wheel"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PartError::Select(SelectError::PartNotFound { ref part }) if part == "wheel"
        ));
        assert_eq!(parts.cache().state("a.model"), Some(EntryState::Ready));

        let door = parts.load_part("a.model", &PartOptions::part("door")).await;
        assert!(door.unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reset_position_reports_original_translation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parts = PartLoader::new(Arc::new(ResourceCache::new()), loader(calls));
        let options = PartOptions::part("hood").reset_position(true);

        let hood = parts.load_part("a.model", &options).await.unwrap().unwrap();
        assert_eq!(hood.asset.transform().translation, vec3(0.0, 0.0, 0.0));
        assert_eq!(hood.original_position, Some(vec3(1.0, 2.0, 3.0)));

        let cached = parts.cache().get("a.model").unwrap();
        assert_eq!(
            cached.find("hood").unwrap().transform.translation,
            vec3(1.0, 2.0, 3.0)
        );
    }

    #[tokio::test]
    async fn no_part_name_is_a_no_op() {
        let calls = Arc::new(AtomicUsize::new(0));
        let parts = PartLoader::new(Arc::new(ResourceCache::new()), loader(Arc::clone(&calls)));

        let result = parts.load_part("a.model", &PartOptions::default()).await;
        assert_eq!(result.unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(parts.cache().is_empty());
    }

    #[tokio::test]
    async fn deindexed_option_reaches_the_selector() {
        let parts = PartLoader::new(
            Arc::new(ResourceCache::new()),
            loader(Arc::new(AtomicUsize::new(0))),
        );
        let options = PartOptions::part("door").buffer_mode(BufferMode::Deindexed);

        let door = parts.load_part("a.model", &options).await.unwrap().unwrap();
        assert!(!door.asset.mesh().unwrap().is_indexed());
    }

    #[tokio::test]
    async fn load_failure_is_reported_as_load_error() {
        let parts = PartLoader::new(Arc::new(ResourceCache::new()), |_key: ResourceKey| async {
            Err::<Scene, _>(anyhow::anyhow!("parse error"))
        });

        let err = parts
            .load_part("broken.model", &PartOptions::part("hood"))
            .await
            .unwrap_err();
        assert!(matches!(err, PartError::Load(_)), "expected load error, got {err:?}");
        assert_eq!(parts.cache().state("broken.model"), Some(EntryState::Failed));
    }
}
