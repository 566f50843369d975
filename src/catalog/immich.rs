use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{AlbumSummary, AssetSummary, Catalog, UserInfo};
use crate::config::{HttpOptions, PictureType};
use crate::error::CatalogError;

const API_KEY_HEADER: &str = "x-api-key";
const FAVORITES_PAGE_SIZE: u32 = 1000;

/// HTTP client for an Immich server.
#[derive(Debug, Clone)]
pub struct ImmichClient {
    client: Client,
    base_url: String,
    api_key: String,
    picture_type: PictureType,
    retries: u32,
    retry_backoff: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateTokenResponse {
    #[serde(default)]
    auth_status: bool,
}

#[derive(Deserialize)]
struct AlbumDetail {
    #[serde(default)]
    assets: Vec<AssetSummary>,
}

#[derive(Deserialize)]
struct SearchResponse {
    assets: SearchPage,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    items: Vec<AssetSummary>,
    #[serde(default)]
    next_page: Option<String>,
}

impl ImmichClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        picture_type: PictureType,
        http: &HttpOptions,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(http.timeout)
            .connect_timeout(http.timeout)
            .build()
            .map_err(|err| CatalogError::CannotConnect(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            picture_type,
            retries: http.retries,
            retry_backoff: http.retry_backoff,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header(API_KEY_HEADER, &self.api_key)
    }

    /// Sends a request built by `build`, retrying transient failures with
    /// exponential backoff.
    async fn send<F>(&self, build: F) -> Result<Response, CatalogError>
    where
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        with_retries(self.retries, self.retry_backoff, || async move {
            let resp = build().send().await?;
            check_status(resp)
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let resp = self.send(|| self.request(Method::GET, path)).await?;
        Ok(resp.json::<T>().await?)
    }
}

fn check_status(resp: Response) -> Result<Response, CatalogError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(CatalogError::InvalidAuth);
    }
    Err(CatalogError::Status {
        status: status.as_u16(),
        url: resp.url().to_string(),
    })
}

/// Runs `op` up to `retries + 1` times, sleeping `backoff`, `2 * backoff`, ...
/// between attempts. Non-transient errors are returned immediately.
pub(crate) async fn with_retries<T, F, Fut>(
    retries: u32,
    backoff: Duration,
    mut op: F,
) -> Result<T, CatalogError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let mut delay = backoff;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt <= retries => {
                warn!(
                    attempt,
                    error = %err,
                    wait_ms = delay.as_millis() as u64,
                    "catalog request failed; retrying"
                );
                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(err) => return Err(err),
        }
    }
}

impl Catalog for ImmichClient {
    async fn authenticate(&self) -> Result<bool, CatalogError> {
        let result = self
            .send(|| self.request(Method::POST, "auth/validateToken"))
            .await;
        match result {
            Ok(resp) => {
                let body: ValidateTokenResponse = resp.json().await?;
                Ok(body.auth_status)
            }
            Err(CatalogError::InvalidAuth) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn current_user(&self) -> Result<UserInfo, CatalogError> {
        self.get_json("users/me").await
    }

    async fn list_all_albums(&self) -> Result<Vec<AlbumSummary>, CatalogError> {
        self.get_json("albums").await
    }

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<AssetSummary>, CatalogError> {
        let album: AlbumDetail = self.get_json(&format!("albums/{album_id}")).await?;
        let assets: Vec<AssetSummary> = album.assets.into_iter().filter(|a| a.is_image()).collect();
        debug!(album = album_id, count = assets.len(), "listed album assets");
        Ok(assets)
    }

    async fn list_favorite_assets(&self) -> Result<Vec<AssetSummary>, CatalogError> {
        let mut out = Vec::new();
        let mut page: u32 = 1;
        loop {
            let body = json!({
                "isFavorite": true,
                "type": "IMAGE",
                "page": page,
                "size": FAVORITES_PAGE_SIZE,
            });
            let resp = self
                .send(|| self.request(Method::POST, "search/metadata").json(&body))
                .await?;
            let results: SearchResponse = resp.json().await?;
            out.extend(results.assets.items.into_iter().filter(|a| a.is_image()));
            match results.assets.next_page.and_then(|p| p.parse::<u32>().ok()) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        debug!(count = out.len(), "listed favorite assets");
        Ok(out)
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Vec<u8>, CatalogError> {
        let path = format!("assets/{asset_id}/thumbnail");
        let size = self.picture_type.as_str();
        let resp = self
            .send(|| self.request(Method::GET, &path).query(&[("size", size)]))
            .await?;
        let bytes = resp.bytes().await?;
        debug!(asset = asset_id, bytes = bytes.len(), "downloaded asset");
        Ok(bytes.to_vec())
    }
}
