use std::path::{Path, PathBuf};

use bevy::prelude::*;
use futures::future::{BoxFuture, FutureExt};

use crate::engine::loading::asset_loader::{AssetLoadCause, ModelSource};

/// Routes `http(s)://` paths to an HTTP GET and everything else to the asset root.
///
/// Fetches block the calling task. Loads run on the IO task pool, never on the
/// frame loop.
pub struct DefaultModelSource {
    asset_root: PathBuf,
    client: reqwest::blocking::Client,
}

impl DefaultModelSource {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn is_remote(path: &str) -> bool {
        path.starts_with("http://") || path.starts_with("https://")
    }

    /// Resolve a model path against the asset root. Leading slashes are
    /// treated as root-relative, matching how the web frontend served models.
    pub fn resolve_local(&self, path: &str) -> PathBuf {
        self.asset_root.join(path.trim_start_matches('/'))
    }
}

impl ModelSource for DefaultModelSource {
    fn fetch(&self, path: &str) -> BoxFuture<'static, Result<Vec<u8>, AssetLoadCause>> {
        let result = if Self::is_remote(path) {
            http_get(&self.client, path)
        } else {
            read_file(&self.resolve_local(path))
        };
        async move { result }.boxed()
    }
}

fn http_get(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>, AssetLoadCause> {
    debug!("GET {url}");
    let response = client
        .get(url)
        .send()
        .map_err(|e| AssetLoadCause::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AssetLoadCause::Fetch(format!("HTTP {status}")));
    }

    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| AssetLoadCause::Fetch(e.to_string()))
}

fn read_file(path: &Path) -> Result<Vec<u8>, AssetLoadCause> {
    debug!("Reading {}", path.display());
    std::fs::read(path).map_err(|e| AssetLoadCause::Fetch(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::scene_asset::fixtures::triangle_gltf;
    use futures::executor::block_on;

    #[test]
    fn reads_root_relative_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/bench.gltf"), triangle_gltf("Bench", "Wood")).unwrap();

        let source = DefaultModelSource::new(dir.path());
        let bytes = block_on(source.fetch("/models/bench.gltf")).unwrap();
        assert_eq!(bytes, triangle_gltf("Bench", "Wood"));
    }

    #[test]
    fn gltf_with_external_buffer_loads_from_disk() {
        use crate::engine::assets::scene_asset::fixtures::{png, textured_triangle};
        use crate::engine::loading::asset_loader::AssetLoader;
        use std::sync::Arc;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("labs/textures")).unwrap();
        let (json, bin) = textured_triangle("erb_202.bin", "textures/plaster.png");
        std::fs::write(dir.path().join("labs/erb_202.gltf"), json).unwrap();
        std::fs::write(dir.path().join("labs/erb_202.bin"), bin).unwrap();
        std::fs::write(
            dir.path().join("labs/textures/plaster.png"),
            png(2, 2, [240, 240, 230, 255]),
        )
        .unwrap();

        let mut loader = AssetLoader::new(Arc::new(DefaultModelSource::new(dir.path())));
        let asset = block_on(loader.load("/labs/erb_202.gltf")).unwrap();
        assert_eq!(asset.triangle_count(), 1);
        let (_, texture) = asset.texture_of(&asset.surfaces[0]).unwrap();
        assert_eq!((texture.width, texture.height), (2, 2));
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DefaultModelSource::new(dir.path());
        let err = block_on(source.fetch("models/none.glb")).unwrap_err();
        assert!(matches!(err, AssetLoadCause::Fetch(_)));
    }
}
