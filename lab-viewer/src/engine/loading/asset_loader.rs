use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, TaskPool};
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;

use crate::engine::assets::scene_asset::{ExternalFiles, ExternalRefs, SceneAsset};

/// Why a fetch or decode failed. Cloneable so every waiter on a shared load gets it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetLoadCause {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to load {path}: {cause}")]
pub struct AssetLoadError {
    pub path: String,
    pub cause: AssetLoadCause,
}

pub type LoadResult = Result<Arc<SceneAsset>, AssetLoadError>;

/// Pending or completed load, cloneable by every caller of the same path.
pub type SharedLoad = Shared<BoxFuture<'static, LoadResult>>;

/// Where model bytes come from.
pub trait ModelSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> BoxFuture<'static, Result<Vec<u8>, AssetLoadCause>>;
}

/// Canonical cache key for a model path. `.` and empty segments are dropped and
/// `..` collapses into its parent; query and fragment are kept as given.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().replace('\\', "/");
    let (scheme, rest) = match trimmed.find("://") {
        Some(i) => trimmed.split_at(i + 3),
        None => ("", trimmed.as_str()),
    };
    let rooted = rest.starts_with('/') && scheme.is_empty();
    // The URL host is never popped by `..`.
    let floor = usize::from(!scheme.is_empty());

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." if segments.len() > floor && segments.last() != Some(&"..") => {
                segments.pop();
            }
            // Above the root there is nowhere to go.
            ".." if rooted || !scheme.is_empty() => {}
            other => segments.push(other),
        }
    }

    let mut out = String::with_capacity(trimmed.len());
    out.push_str(scheme);
    if rooted {
        out.push('/');
    }
    out.push_str(&segments.join("/"));
    out
}

/// Resolve a URI referenced from inside a model against the model's directory.
pub fn sibling_path(model_path: &str, uri: &str) -> String {
    if uri.contains("://") {
        return normalize_path(uri);
    }
    match model_path.rfind('/') {
        Some(i) => normalize_path(&format!("{}/{uri}", &model_path[..i])),
        None => normalize_path(uri),
    }
}

/// Path-deduplicating model loader with an indefinite success cache.
///
/// Each path maps to one shared future. Completed successes stay in the map and
/// resolve immediately on later loads. Failed entries are evicted on the next
/// request so a user-initiated retry fetches again.
#[derive(Resource)]
pub struct AssetLoader {
    source: Arc<dyn ModelSource>,
    entries: HashMap<String, SharedLoad>,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn ModelSource>) -> Self {
        Self {
            source,
            entries: HashMap::new(),
        }
    }

    /// Load and decode a model. Concurrent calls for one path share a single fetch.
    pub fn load(&mut self, path: &str) -> SharedLoad {
        let key = normalize_path(path);

        if let Some(existing) = self.entries.get(&key) {
            match existing.peek() {
                Some(Err(_)) => {
                    debug!("Evicting failed load for {key}");
                    self.entries.remove(&key);
                }
                _ => return existing.clone(),
            }
        }

        let load = fetch_and_decode(self.source.clone(), key.clone())
            .boxed()
            .shared();
        self.entries.insert(key, load.clone());
        load
    }

    /// Start a load without waiting for it. A later `load` of the same path joins it.
    pub fn preload(&mut self, path: &str) {
        let load = self.load(path);
        IoTaskPool::get_or_init(TaskPool::new)
            .spawn(async move {
                if let Err(e) = load.await {
                    debug!("Preload failed: {e}");
                }
            })
            .detach();
    }

    /// Already decoded model, if the path finished loading successfully.
    pub fn cached(&self, path: &str) -> Option<Arc<SceneAsset>> {
        match self.entries.get(&normalize_path(path))?.peek()? {
            Ok(asset) => Some(asset.clone()),
            Err(_) => None,
        }
    }

    pub fn tracked_paths(&self) -> usize {
        self.entries.len()
    }
}

async fn fetch_and_decode(source: Arc<dyn ModelSource>, path: String) -> LoadResult {
    let fail = |cause| AssetLoadError {
        path: path.clone(),
        cause,
    };

    let bytes = source.fetch(&path).await.map_err(fail)?;
    let gltf = gltf::Gltf::from_slice(&bytes).map_err(|e| fail(AssetLoadCause::Decode(e.to_string())))?;

    let refs = ExternalRefs::of(&gltf.document);
    let mut files = ExternalFiles::new();
    for uri in refs.buffers {
        let data = source.fetch(&sibling_path(&path, &uri)).await.map_err(fail)?;
        files.insert(uri, data);
    }
    for uri in refs.images {
        match source.fetch(&sibling_path(&path, &uri)).await {
            Ok(data) => {
                files.insert(uri, data);
            }
            Err(e) => warn!("Texture {uri} of {path} unavailable: {e}"),
        }
    }

    let asset = SceneAsset::from_gltf(gltf, &files).map_err(|e| fail(AssetLoadCause::Decode(e.to_string())))?;

    debug!(
        "Decoded {path}: {} surfaces, {} triangles",
        asset.surfaces.len(),
        asset.triangle_count()
    );
    Ok(Arc::new(asset))
}
