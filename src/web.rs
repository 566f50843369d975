//! Read-mostly HTTP view over the running surfaces.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::tasks::scheduler::Slideshow;

#[derive(Debug, Serialize)]
struct SurfaceInfo {
    id: String,
    name: String,
    last_updated: Option<DateTime<Utc>>,
}

pub fn router<C: Catalog>(slideshow: Arc<Slideshow<C>>) -> Router {
    Router::new()
        .route("/surfaces", get(list_surfaces::<C>))
        .route("/surfaces/{id}/image", get(surface_image::<C>))
        .route("/surfaces/{id}/refresh", post(refresh_surface::<C>))
        .with_state(slideshow)
}

pub async fn serve<C: Catalog>(
    addr: SocketAddr,
    slideshow: Arc<Slideshow<C>>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
    info!(?addr, "HTTP server listening");

    axum::serve(listener, router(slideshow).into_make_service())
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("http server exited")?;
    Ok(())
}

async fn list_surfaces<C: Catalog>(
    State(slideshow): State<Arc<Slideshow<C>>>,
) -> Json<Vec<SurfaceInfo>> {
    let surfaces = slideshow
        .list()
        .iter()
        .map(|s| SurfaceInfo {
            id: s.id().to_string(),
            name: s.name().to_string(),
            last_updated: s.last_updated(),
        })
        .collect();
    Json(surfaces)
}

async fn surface_image<C: Catalog>(
    State(slideshow): State<Arc<Slideshow<C>>>,
    Path(id): Path<String>,
) -> Response {
    let Some(surface) = slideshow.get(&id) else {
        return (StatusCode::NOT_FOUND, "unknown surface").into_response();
    };

    if surface.current_image_bytes().is_none() {
        debug!(surface = %id, "image requested before first refresh; refreshing now");
        // detached so a client disconnect cannot abandon the cycle midway
        let refresh = tokio::spawn({
            let surface = surface.clone();
            async move { surface.force_refresh().await }
        });
        if let Err(err) = refresh.await {
            warn!(surface = %id, error = %err, "on-demand refresh task failed");
        }
    }
    let (Some(bytes), Some(updated)) = (surface.current_image_bytes(), surface.last_updated())
    else {
        return (StatusCode::NOT_FOUND, "no image available yet").into_response();
    };

    let last_modified = updated.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    (
        [
            (header::CONTENT_TYPE, "image/jpeg".to_string()),
            (header::LAST_MODIFIED, last_modified),
        ],
        bytes.to_vec(),
    )
        .into_response()
}

async fn refresh_surface<C: Catalog>(
    State(slideshow): State<Arc<Slideshow<C>>>,
    Path(id): Path<String>,
) -> StatusCode {
    let Some(surface) = slideshow.get(&id) else {
        return StatusCode::NOT_FOUND;
    };
    tokio::spawn(async move {
        let outcome = surface.force_refresh().await;
        debug!(surface = surface.id(), ?outcome, "on-demand refresh finished");
    });
    StatusCode::ACCEPTED
}
