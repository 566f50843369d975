//! The remote photo catalog as seen by the slideshow.
//!
//! [`Catalog`] is the seam between the composition pipeline and the network:
//! [`immich::ImmichClient`] talks to a real server, [`cache::CachedCatalog`]
//! layers the on-disk asset cache on top, and tests substitute in-memory fakes.

pub mod cache;
pub mod immich;

use std::future::Future;

use serde::Deserialize;

use crate::error::CatalogError;

/// One entry of an album or favorites listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub original_file_name: Option<String>,
}

impl AssetSummary {
    /// Videos and other non-still assets are never candidates.
    pub fn is_image(&self) -> bool {
        self.kind.as_deref().is_none_or(|k| k.eq_ignore_ascii_case("IMAGE"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub id: String,
    pub album_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Operations the slideshow consumes from the remote catalog.
pub trait Catalog: Send + Sync + 'static {
    /// `Ok(false)` when the server is reachable but rejects the credentials.
    fn authenticate(&self) -> impl Future<Output = Result<bool, CatalogError>> + Send;

    fn current_user(&self) -> impl Future<Output = Result<UserInfo, CatalogError>> + Send;

    fn list_all_albums(
        &self,
    ) -> impl Future<Output = Result<Vec<AlbumSummary>, CatalogError>> + Send;

    fn list_album_assets(
        &self,
        album_id: &str,
    ) -> impl Future<Output = Result<Vec<AssetSummary>, CatalogError>> + Send;

    fn list_favorite_assets(
        &self,
    ) -> impl Future<Output = Result<Vec<AssetSummary>, CatalogError>> + Send;

    fn download_asset(
        &self,
        asset_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, CatalogError>> + Send;

    /// Called after a surface re-lists its candidates so decorators can drop
    /// state for assets that disappeared.
    fn assets_listed(
        &self,
        _scope: &str,
        _assets: &[String],
    ) -> impl Future<Output = ()> + Send {
        async {}
    }
}
