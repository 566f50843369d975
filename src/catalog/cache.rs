use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use super::{AlbumSummary, AssetSummary, Catalog, UserInfo};
use crate::error::CatalogError;

/// Downloaded asset bytes kept on disk, one file per asset id.
#[derive(Debug)]
pub struct AssetCache {
    dir: PathBuf,
    // listing scope -> asset ids last listed for it; `None` until the scope
    // has listed at least once
    listings: Mutex<HashMap<String, Option<HashSet<String>>>>,
}

impl AssetCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            listings: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Declares scopes that will list later. Nothing is pruned until every
    /// declared scope has reported a listing.
    pub fn expect_scopes<'a>(&self, scopes: impl IntoIterator<Item = &'a str>) {
        let mut listings = self.lock_listings();
        for scope in scopes {
            listings.entry(scope.to_string()).or_insert(None);
        }
    }

    fn lock_listings(&self) -> MutexGuard<'_, HashMap<String, Option<HashSet<String>>>> {
        self.listings.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn path_for(&self, asset_id: &str) -> Option<PathBuf> {
        let safe = !asset_id.is_empty()
            && asset_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        safe.then(|| self.dir.join(asset_id))
    }

    pub async fn get(&self, asset_id: &str) -> Option<Vec<u8>> {
        let path = self.path_for(asset_id)?;
        tokio::fs::read(&path).await.ok()
    }

    pub async fn put(&self, asset_id: &str, bytes: &[u8]) -> io::Result<()> {
        let Some(path) = self.path_for(asset_id) else {
            return Ok(());
        };
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await
    }

    /// Records the latest listing for `scope` and removes cached files no
    /// longer referenced by any recorded listing.
    ///
    /// Pruning waits until every expected scope has listed; files belonging
    /// to a scope that has not listed yet are never removed.
    pub async fn retain_listing(&self, scope: &str, assets: &[String]) -> io::Result<usize> {
        let keep: HashSet<String> = {
            let mut listings = self.lock_listings();
            listings.insert(scope.to_string(), Some(assets.iter().cloned().collect()));
            let pending: Vec<&str> = listings
                .iter()
                .filter(|(_, ids)| ids.is_none())
                .map(|(scope, _)| scope.as_str())
                .collect();
            if !pending.is_empty() {
                debug!(?pending, "deferring cache prune until every scope has listed");
                return Ok(0);
            }
            listings.values().flatten().flatten().cloned().collect()
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !keep.contains(name) && entry.file_type().await?.is_file() {
                tokio::fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// A [`Catalog`] that optionally serves repeated downloads from an [`AssetCache`].
#[derive(Debug)]
pub struct CachedCatalog<C> {
    inner: C,
    cache: Option<AssetCache>,
}

impl<C: Catalog> CachedCatalog<C> {
    pub fn new(inner: C, cache: Option<AssetCache>) -> Self {
        Self { inner, cache }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// See [`AssetCache::expect_scopes`]; a no-op without a cache.
    pub fn expect_scopes<'a>(&self, scopes: impl IntoIterator<Item = &'a str>) {
        if let Some(cache) = &self.cache {
            cache.expect_scopes(scopes);
        }
    }
}

impl<C: Catalog> Catalog for CachedCatalog<C> {
    async fn authenticate(&self) -> Result<bool, CatalogError> {
        self.inner.authenticate().await
    }

    async fn current_user(&self) -> Result<UserInfo, CatalogError> {
        self.inner.current_user().await
    }

    async fn list_all_albums(&self) -> Result<Vec<AlbumSummary>, CatalogError> {
        self.inner.list_all_albums().await
    }

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<AssetSummary>, CatalogError> {
        self.inner.list_album_assets(album_id).await
    }

    async fn list_favorite_assets(&self) -> Result<Vec<AssetSummary>, CatalogError> {
        self.inner.list_favorite_assets().await
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Vec<u8>, CatalogError> {
        let Some(cache) = &self.cache else {
            return self.inner.download_asset(asset_id).await;
        };
        if let Some(bytes) = cache.get(asset_id).await {
            debug!(asset = asset_id, "served asset from cache");
            return Ok(bytes);
        }
        let bytes = self.inner.download_asset(asset_id).await?;
        if let Err(err) = cache.put(asset_id, &bytes).await {
            warn!(asset = asset_id, error = %err, "failed to cache asset");
        }
        Ok(bytes)
    }

    async fn assets_listed(&self, scope: &str, assets: &[String]) {
        let Some(cache) = &self.cache else { return };
        match cache.retain_listing(scope, assets).await {
            Ok(0) => {}
            Ok(removed) => debug!(scope, removed, "pruned asset cache"),
            Err(err) => warn!(scope, error = %err, "failed to prune asset cache"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCatalog {
        downloads: AtomicUsize,
    }

    impl Catalog for CountingCatalog {
        async fn authenticate(&self) -> Result<bool, CatalogError> {
            Ok(true)
        }
        async fn current_user(&self) -> Result<UserInfo, CatalogError> {
            Err(CatalogError::InvalidAuth)
        }
        async fn list_all_albums(&self) -> Result<Vec<AlbumSummary>, CatalogError> {
            Ok(Vec::new())
        }
        async fn list_album_assets(&self, _: &str) -> Result<Vec<AssetSummary>, CatalogError> {
            Ok(Vec::new())
        }
        async fn list_favorite_assets(&self) -> Result<Vec<AssetSummary>, CatalogError> {
            Ok(Vec::new())
        }
        async fn download_asset(&self, asset_id: &str) -> Result<Vec<u8>, CatalogError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(asset_id.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn second_download_is_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CachedCatalog::new(
            CountingCatalog::default(),
            Some(AssetCache::new(dir.path().join("assets"))),
        );
        assert_eq!(catalog.download_asset("abc-1").await.unwrap(), b"abc-1");
        assert_eq!(catalog.download_asset("abc-1").await.unwrap(), b"abc-1");
        assert_eq!(catalog.inner().downloads.load(Ordering::SeqCst), 1);
        assert!(dir.path().join("assets").join("abc-1").is_file());
    }

    #[tokio::test]
    async fn unsafe_ids_bypass_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CachedCatalog::new(
            CountingCatalog::default(),
            Some(AssetCache::new(dir.path())),
        );
        catalog.download_asset("../escape").await.unwrap();
        catalog.download_asset("../escape").await.unwrap();
        assert_eq!(catalog.inner().downloads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listings_prune_unreferenced_assets() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AssetCache::new(dir.path());
        for id in ["a", "b", "c"] {
            cache.put(id, b"x").await.unwrap();
        }
        let removed = cache.retain_listing("one", &["a".into()]).await.unwrap();
        assert_eq!(removed, 2);
        cache.put("b", b"x").await.unwrap();
        let removed = cache
            .retain_listing("two", &["b".into()])
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_none());
    }

    #[tokio::test]
    async fn unlisted_scopes_keep_their_files_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        {
            let previous = AssetCache::new(dir.path());
            previous.put("f1", b"x").await.unwrap();
            previous.put("b1", b"x").await.unwrap();
        }

        let cache = AssetCache::new(dir.path());
        cache.expect_scopes(["favorites", "album-1"]);
        let removed = cache
            .retain_listing("favorites", &["f1".into()])
            .await
            .unwrap();
        assert_eq!(removed, 0);
        assert!(cache.get("b1").await.is_some());

        let removed = cache
            .retain_listing("album-1", &["b1".into()])
            .await
            .unwrap();
        assert_eq!(removed, 0);

        // every scope has listed; f1 left favorites
        let removed = cache.retain_listing("favorites", &[]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(cache.get("f1").await.is_none());
        assert!(cache.get("b1").await.is_some());
    }

    #[tokio::test]
    async fn decorator_forwards_expected_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = CachedCatalog::new(
            CountingCatalog::default(),
            Some(AssetCache::new(dir.path())),
        );
        catalog.download_asset("kept").await.unwrap();
        catalog.expect_scopes(["favorites", "album-1"]);
        catalog.assets_listed("favorites", &[]).await;
        assert!(dir.path().join("kept").is_file());
    }
}
