//! A display surface: one independently refreshed image output.
//!
//! Every refresh runs the whole pipeline under the surface's own lock:
//! select asset ids, download them, normalize orientation, compose, encode.
//! Any failure along the way keeps the previously published image.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::{Configuration, CropMode, SelectionMode};
use crate::processing::compose::Composer;
use crate::processing::encode::encode_jpeg;
use crate::processing::orientation::normalize;
use crate::processing::pairing::PortraitHold;
use crate::selection::{Selector, SurfaceScope};

#[derive(Debug, Clone)]
pub struct SurfaceOptions {
    pub crop_mode: CropMode,
    pub selection_mode: SelectionMode,
    pub jpeg_quality: u8,
    pub background: [u8; 3],
    pub candidate_ttl: Duration,
}

impl From<&Configuration> for SurfaceOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            crop_mode: cfg.crop_mode,
            selection_mode: cfg.image_selection_mode,
            jpeg_quality: cfg.jpeg_quality,
            background: cfg.background,
            candidate_ttl: cfg.candidate_ttl,
        }
    }
}

/// What a single refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new image was published.
    Updated { combined: bool },
    /// A lone portrait is parked until a partner shows up.
    WaitingForPair,
    /// The candidate set is empty or could not be listed.
    NoAssets,
    /// None of the selected assets could be downloaded or decoded.
    NothingDownloaded,
    /// Composition or encoding failed.
    Failed,
    /// The surface has been torn down.
    Closed,
}

struct SurfaceState {
    selector: Selector,
    hold: PortraitHold,
}

#[derive(Debug, Clone, Default)]
struct Published {
    bytes: Option<Arc<Vec<u8>>>,
    last_updated: Option<DateTime<Utc>>,
}

pub struct DisplaySurface<C> {
    scope: SurfaceScope,
    name: String,
    catalog: Arc<C>,
    composer: Composer,
    options: SurfaceOptions,
    state: Mutex<SurfaceState>,
    published: RwLock<Published>,
    cancel: CancellationToken,
}

impl<C: Catalog> DisplaySurface<C> {
    pub fn new(
        scope: SurfaceScope,
        catalog: Arc<C>,
        composer: Composer,
        options: SurfaceOptions,
    ) -> Self {
        let selector = Selector::new(options.candidate_ttl);
        Self::with_selector(scope, catalog, composer, options, selector)
    }

    /// Like [`DisplaySurface::new`] with a caller-provided selector (e.g. seeded).
    pub fn with_selector(
        scope: SurfaceScope,
        catalog: Arc<C>,
        composer: Composer,
        options: SurfaceOptions,
        selector: Selector,
    ) -> Self {
        Self {
            name: scope.display_name(),
            scope,
            catalog,
            composer,
            options,
            state: Mutex::new(SurfaceState {
                selector,
                hold: PortraitHold::new(),
            }),
            published: RwLock::new(Published::default()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.scope.key()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cancelled when the surface is removed; scheduled work stops with it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Last published JPEG, if any.
    pub fn current_image_bytes(&self) -> Option<Arc<Vec<u8>>> {
        self.read_published().bytes
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.read_published().last_updated
    }

    /// Whether a lone portrait is currently waiting for a partner.
    pub async fn is_holding_portrait(&self) -> bool {
        !self.state.lock().await.hold.is_empty()
    }

    pub async fn force_refresh(&self) -> RefreshOutcome {
        self.refresh_at(Utc::now()).await
    }

    /// Runs one pipeline cycle as of `now`.
    ///
    /// Overlapping calls on the same surface are serialized.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshOutcome {
        if self.is_closed() {
            return RefreshOutcome::Closed;
        }
        let mut state = self.state.lock().await;
        if self.is_closed() {
            return RefreshOutcome::Closed;
        }

        let want = self.options.crop_mode.assets_per_cycle();
        let Some(asset_ids) = state
            .selector
            .select_next(
                self.catalog.as_ref(),
                &self.scope,
                self.options.selection_mode,
                want,
                now,
            )
            .await
        else {
            warn!(surface = self.id(), "no asset ids available; keeping current image");
            return RefreshOutcome::NoAssets;
        };
        debug!(surface = self.id(), ?asset_ids, "selected assets");

        let mut downloads = Vec::with_capacity(asset_ids.len());
        for asset_id in &asset_ids {
            match self.catalog.download_asset(asset_id).await {
                Ok(bytes) => downloads.push((asset_id.clone(), bytes)),
                Err(err) => warn!(
                    surface = self.id(),
                    asset = %asset_id,
                    error = %err,
                    "failed to download asset"
                ),
            }
        }
        if downloads.is_empty() {
            warn!(surface = self.id(), "failed to download any images");
            return RefreshOutcome::NothingDownloaded;
        }

        // The job works on a copy; the surface's hold only changes once the
        // cycle completes, so an abandoned refresh leaves it untouched.
        let hold = state.hold.clone();
        let composer = self.composer;
        let mode = self.options.crop_mode;
        let background = self.options.background;
        let quality = self.options.jpeg_quality;
        let job = tokio::task::spawn_blocking(move || {
            run_pipeline(composer, mode, background, quality, downloads, hold)
        })
        .await;

        let (hold, result) = match job {
            Ok(out) => out,
            Err(err) => {
                warn!(surface = self.id(), error = %err, "composition task failed");
                return RefreshOutcome::Failed;
            }
        };
        state.hold = hold;

        match result {
            PipelineResult::Encoded { bytes, combined } => {
                debug!(surface = self.id(), bytes = bytes.len(), combined, "image updated");
                let mut published = self
                    .published
                    .write()
                    .unwrap_or_else(|p| p.into_inner());
                published.bytes = Some(Arc::new(bytes));
                published.last_updated = Some(now);
                RefreshOutcome::Updated { combined }
            }
            PipelineResult::Waiting => {
                info!(
                    surface = self.id(),
                    "no image to display at this time (waiting for another portrait image)"
                );
                RefreshOutcome::WaitingForPair
            }
            PipelineResult::NothingDecoded => RefreshOutcome::NothingDownloaded,
            PipelineResult::Failed(err) => {
                warn!(surface = self.id(), error = ?err, "failed to compose image");
                RefreshOutcome::Failed
            }
        }
    }

    fn read_published(&self) -> Published {
        self.published
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

enum PipelineResult {
    Encoded { bytes: Vec<u8>, combined: bool },
    Waiting,
    NothingDecoded,
    Failed(anyhow::Error),
}

fn run_pipeline(
    composer: Composer,
    mode: CropMode,
    background: [u8; 3],
    quality: u8,
    downloads: Vec<(String, Vec<u8>)>,
    mut hold: PortraitHold,
) -> (PortraitHold, PipelineResult) {
    let batch: Vec<RgbaImage> = downloads
        .into_iter()
        .filter_map(|(asset_id, bytes)| match normalize(&bytes) {
            Ok(img) => Some(img),
            Err(err) => {
                warn!(asset = %asset_id, error = ?err, "dropping undecodable asset");
                None
            }
        })
        .collect();
    if batch.is_empty() {
        return (hold, PipelineResult::NothingDecoded);
    }

    let composition = match composer.compose(batch, mode, &mut hold) {
        Ok(c) => c,
        Err(err) => return (hold, PipelineResult::Failed(err)),
    };
    let result = match composition.image {
        Some(img) => match encode_jpeg(&img, background, quality) {
            Ok(bytes) => PipelineResult::Encoded {
                bytes,
                combined: composition.combined,
            },
            Err(err) => PipelineResult::Failed(err),
        },
        None => PipelineResult::Waiting,
    };
    (hold, result)
}
