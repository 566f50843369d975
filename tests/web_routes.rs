mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::{FakeCatalog, png};
use immich_frame::config::{Canvas, CropMode, SelectionMode};
use immich_frame::processing::compose::Composer;
use immich_frame::selection::SurfaceScope;
use immich_frame::surface::{DisplaySurface, SurfaceOptions};
use immich_frame::tasks::scheduler::Slideshow;
use immich_frame::web;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn slideshow() -> Arc<Slideshow<FakeCatalog>> {
    let catalog = Arc::new(
        FakeCatalog::default()
            .album("full", "Full", &[("x", png(40, 30, 90))])
            .album("empty", "Empty", &[]),
    );
    let options = SurfaceOptions {
        crop_mode: CropMode::None,
        selection_mode: SelectionMode::Random,
        jpeg_quality: 85,
        background: [0, 0, 0],
        candidate_ttl: Duration::from_secs(3600),
    };
    let slideshow = Arc::new(Slideshow::new(
        Duration::from_secs(3600),
        CancellationToken::new(),
    ));
    for (id, name) in [("full", "Full"), ("empty", "Empty")] {
        let scope = SurfaceScope::Album {
            id: id.into(),
            name: name.into(),
        };
        slideshow
            .add(DisplaySurface::new(
                scope,
                catalog.clone(),
                Composer::new(Canvas { width: 80, height: 60 }, [0, 0, 0]),
                options.clone(),
            ))
            .await;
    }
    slideshow
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lists_surfaces_by_id() {
    let slideshow = slideshow().await;
    let resp = web::router(slideshow.clone())
        .oneshot(get("/surfaces"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    let ids: Vec<_> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["empty", "full"]);
    assert_eq!(json[1]["name"], "Immich: Full");
    slideshow.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_current_jpeg() {
    let slideshow = slideshow().await;
    let resp = web::router(slideshow.clone())
        .oneshot(get("/surfaces/full/image"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert!(resp.headers().contains_key(header::LAST_MODIFIED));
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!((img.width(), img.height()), (80, 60));
    slideshow.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_images_and_surfaces_are_404() {
    let slideshow = slideshow().await;
    let router = web::router(slideshow.clone());
    let resp = router
        .clone()
        .oneshot(get("/surfaces/empty/image"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = router.oneshot(get("/surfaces/nope/image")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    slideshow.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refresh_is_accepted_for_known_surfaces() {
    let slideshow = slideshow().await;
    let router = web::router(slideshow.clone());
    let post = |uri: &str| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };
    let resp = router
        .clone()
        .oneshot(post("/surfaces/full/refresh"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let resp = router.oneshot(post("/surfaces/nope/refresh")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    slideshow.shutdown().await;
}
