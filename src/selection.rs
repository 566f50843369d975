//! Which assets a surface shows next.
//!
//! Each surface keeps a [`CandidateSet`] of asset ids that is re-listed from
//! the catalog once it is older than the configured TTL, and a cursor for
//! sequential playback.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, warn};

use crate::catalog::Catalog;
use crate::config::SelectionMode;
use crate::error::CatalogError;

/// Where a surface draws its candidates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceScope {
    Favorites,
    Album { id: String, name: String },
}

impl SurfaceScope {
    /// Stable key used for surface ids and cache bookkeeping.
    pub fn key(&self) -> &str {
        match self {
            Self::Favorites => "favorites",
            Self::Album { id, .. } => id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::Favorites => "Immich: Random favorite image".to_string(),
            Self::Album { name, .. } => format!("Immich: {name}"),
        }
    }

    /// Lists the asset ids currently eligible for this scope.
    pub async fn refresh_candidate_ids<C: Catalog>(
        &self,
        catalog: &C,
    ) -> Result<Vec<String>, CatalogError> {
        let assets = match self {
            Self::Favorites => catalog.list_favorite_assets().await?,
            Self::Album { id, .. } => catalog.list_album_assets(id).await?,
        };
        let ids: Vec<String> = assets.into_iter().map(|a| a.id).collect();
        catalog.assets_listed(self.key(), &ids).await;
        Ok(ids)
    }
}

/// Asset ids eligible for selection, stamped with when they were listed.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    ids: Vec<String>,
    refreshed_at: DateTime<Utc>,
}

impl CandidateSet {
    pub fn new(ids: Vec<String>, refreshed_at: DateTime<Utc>) -> Self {
        Self { ids, refreshed_at }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn refreshed_at(&self) -> DateTime<Utc> {
        self.refreshed_at
    }

    /// Strictly older than `ttl`.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.refreshed_at) > ttl
    }
}

#[derive(Debug)]
pub struct Selector {
    candidates: Option<CandidateSet>,
    // index of the last id handed out in sequential mode
    cursor: Option<usize>,
    ttl: TimeDelta,
    rng: StdRng,
}

impl Selector {
    pub fn new(ttl: Duration) -> Self {
        Self::with_rng(ttl, StdRng::from_os_rng())
    }

    pub fn with_rng(ttl: Duration, rng: StdRng) -> Self {
        Self {
            candidates: None,
            cursor: None,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::hours(1)),
            rng,
        }
    }

    pub fn candidates(&self) -> Option<&CandidateSet> {
        self.candidates.as_ref()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.candidates
            .as_ref()
            .is_none_or(|set| set.is_stale(now, self.ttl))
    }

    pub fn replace_candidates(&mut self, ids: Vec<String>, now: DateTime<Utc>) {
        self.candidates = Some(CandidateSet::new(ids, now));
    }

    /// Refreshes the candidate set when stale, then picks `want` ids.
    ///
    /// `None` means there is nothing to show this cycle: the listing failed or
    /// came back empty.
    pub async fn select_next<C: Catalog>(
        &mut self,
        catalog: &C,
        scope: &SurfaceScope,
        mode: SelectionMode,
        want: usize,
        now: DateTime<Utc>,
    ) -> Option<Vec<String>> {
        if self.needs_refresh(now) {
            match scope.refresh_candidate_ids(catalog).await {
                Ok(ids) => {
                    debug!(scope = scope.key(), count = ids.len(), "refreshed candidate ids");
                    self.replace_candidates(ids, now);
                }
                Err(err) => {
                    warn!(scope = scope.key(), error = %err, "failed to refresh candidate ids");
                    return None;
                }
            }
        }

        let picked = self.pick(mode, want);
        if picked.is_none() {
            error!(scope = scope.key(), "no assets are available");
        }
        picked
    }

    /// Picks from the current candidate set without refreshing it.
    pub fn pick(&mut self, mode: SelectionMode, want: usize) -> Option<Vec<String>> {
        let ids = self.candidates.as_ref().map(CandidateSet::ids)?;
        if ids.is_empty() || want == 0 {
            return None;
        }
        let picked = match mode {
            SelectionMode::Random => {
                let amount = want.min(ids.len());
                rand::seq::index::sample(&mut self.rng, ids.len(), amount)
                    .into_iter()
                    .map(|idx| ids[idx].clone())
                    .collect()
            }
            SelectionMode::Sequential => {
                let len = ids.len();
                let start = self.cursor.map_or(0, |c| c + 1) % len;
                let picked = (0..want).map(|i| ids[(start + i) % len].clone()).collect();
                self.cursor = Some((start + want - 1) % len);
                picked
            }
        };
        Some(picked)
    }
}
