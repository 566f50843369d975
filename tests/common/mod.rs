#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use image::{ImageFormat, Rgba, RgbaImage};
use immich_frame::catalog::{AlbumSummary, AssetSummary, Catalog, UserInfo};
use immich_frame::error::CatalogError;

/// In-memory catalog: albums of asset ids plus the bytes behind each id.
#[derive(Default)]
pub struct FakeCatalog {
    pub albums: HashMap<String, (String, Vec<String>)>,
    pub favorites: Vec<String>,
    pub blobs: HashMap<String, Vec<u8>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn album(mut self, id: &str, name: &str, assets: &[(&str, Vec<u8>)]) -> Self {
        let ids = assets.iter().map(|(id, _)| id.to_string()).collect();
        for (asset, bytes) in assets {
            self.blobs.insert(asset.to_string(), bytes.clone());
        }
        self.albums.insert(id.to_string(), (name.to_string(), ids));
        self
    }

    pub fn downloaded(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

fn summaries(ids: &[String]) -> Vec<AssetSummary> {
    ids.iter()
        .map(|id| AssetSummary {
            id: id.clone(),
            kind: Some("IMAGE".into()),
            original_file_name: None,
        })
        .collect()
}

impl Catalog for FakeCatalog {
    async fn authenticate(&self) -> Result<bool, CatalogError> {
        Ok(true)
    }

    async fn current_user(&self) -> Result<UserInfo, CatalogError> {
        Ok(UserInfo {
            id: "u".into(),
            name: "Test".into(),
            email: String::new(),
        })
    }

    async fn list_all_albums(&self) -> Result<Vec<AlbumSummary>, CatalogError> {
        Ok(self
            .albums
            .iter()
            .map(|(id, (name, _))| AlbumSummary {
                id: id.clone(),
                album_name: name.clone(),
            })
            .collect())
    }

    async fn list_album_assets(&self, album_id: &str) -> Result<Vec<AssetSummary>, CatalogError> {
        match self.albums.get(album_id) {
            Some((_, ids)) => Ok(summaries(ids)),
            None => Err(CatalogError::Status {
                status: 404,
                url: album_id.to_string(),
            }),
        }
    }

    async fn list_favorite_assets(&self) -> Result<Vec<AssetSummary>, CatalogError> {
        Ok(summaries(&self.favorites))
    }

    async fn download_asset(&self, asset_id: &str) -> Result<Vec<u8>, CatalogError> {
        self.downloads.lock().unwrap().push(asset_id.to_string());
        self.blobs
            .get(asset_id)
            .cloned()
            .ok_or(CatalogError::Status {
                status: 404,
                url: asset_id.to_string(),
            })
    }
}

/// Solid-colour PNG of the given size.
pub fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]));
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}
