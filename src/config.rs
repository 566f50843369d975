use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde::de::{self, Deserializer};

/// How one or two selected assets are fitted onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Pair portrait shots side by side; landscapes are letterboxed.
    #[default]
    Combine,
    /// Fill the canvas with a single image, clipping the overflow.
    CropSingle,
    /// Letterbox a single image.
    None,
}

impl CropMode {
    const ALL: &'static [Self] = &[Self::Combine, Self::CropSingle, Self::None];
    const NAMES: &'static [&'static str] = &["combine-images", "crop-single-image", "none"];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Combine => "combine-images",
            Self::CropSingle => "crop-single-image",
            Self::None => "none",
        }
    }

    // Human-readable spellings from the older options form.
    fn legacy_name(&self) -> &'static str {
        match self {
            Self::Combine => "Combine images",
            Self::CropSingle => "Crop single image",
            Self::None => "None",
        }
    }

    /// Number of assets a single refresh cycle asks for.
    pub fn assets_per_cycle(&self) -> usize {
        match self {
            Self::Combine => 2,
            Self::CropSingle | Self::None => 1,
        }
    }
}

impl fmt::Display for CropMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CropMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        for mode in Self::ALL {
            if raw == mode.as_str() || raw == mode.legacy_name() {
                return Ok(*mode);
            }
        }
        Err(de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Random,
    Sequential,
}

impl SelectionMode {
    const ALL: &'static [Self] = &[Self::Random, Self::Sequential];
    const NAMES: &'static [&'static str] = &["random", "sequential"];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SelectionMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        for mode in Self::ALL {
            if raw.eq_ignore_ascii_case(mode.as_str()) {
                return Ok(*mode);
            }
        }
        Err(de::Error::unknown_variant(&raw, Self::NAMES))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
}

/// Resolution tier requested when downloading an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PictureType {
    #[default]
    Preview,
    Fullsize,
}

impl PictureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Fullsize => "fullsize",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 2048,
            height: 1536,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpOptions {
    /// Upper bound for any single catalog request.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    #[serde(with = "humantime_serde")]
    pub retry_backoff: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Base URL of the Immich server.
    pub host: String,
    pub api_key: String,
    pub crop_mode: CropMode,
    pub image_selection_mode: SelectionMode,
    /// Refresh period, in `update_interval_unit`s.
    pub update_interval: u64,
    pub update_interval_unit: IntervalUnit,
    /// Album ids that each get their own display surface.
    pub watched_albums: Vec<String>,
    /// Whether the favorites surface is created.
    pub show_favorites: bool,
    pub picture_type: PictureType,
    /// Keep downloaded assets on disk and reuse them.
    pub cache_mode: bool,
    pub cache_dir: PathBuf,
    pub canvas: Canvas,
    pub jpeg_quality: u8,
    /// Colour that transparent pixels and letterbox bars are flattened onto.
    pub background: [u8; 3],
    /// Age after which a surface re-lists its candidate assets.
    #[serde(with = "humantime_serde")]
    pub candidate_ttl: Duration,
    pub http: HttpOptions,
    /// Address the image host listens on.
    pub listen: SocketAddr,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(mut self) -> Result<Self> {
        ensure!(!self.host.trim().is_empty(), "host must be set");
        ensure!(!self.api_key.trim().is_empty(), "api-key must be set");
        ensure!(
            (1..=86_400).contains(&self.update_interval),
            "update-interval must be between 1 and 86400"
        );
        ensure!(
            self.canvas.width >= 2 && self.canvas.height >= 1,
            "canvas must be at least 2x1 pixels"
        );
        ensure!(
            (1..=100).contains(&self.jpeg_quality),
            "jpeg-quality must be between 1 and 100"
        );
        ensure!(
            self.candidate_ttl > Duration::ZERO,
            "candidate-ttl must be positive"
        );
        ensure!(
            self.http.timeout > Duration::ZERO,
            "http.timeout must be positive"
        );
        self.host = crate::setup::normalize_host(&self.host);
        let mut seen = HashSet::new();
        self.watched_albums.retain(|id| seen.insert(id.clone()));
        Ok(self)
    }

    /// Refresh period with the unit applied.
    pub fn refresh_interval(&self) -> Duration {
        let secs = match self.update_interval_unit {
            IntervalUnit::Seconds => self.update_interval,
            IntervalUnit::Minutes => self.update_interval * 60,
        };
        Duration::from_secs(secs)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: String::new(),
            api_key: String::new(),
            crop_mode: CropMode::default(),
            image_selection_mode: SelectionMode::default(),
            update_interval: 60,
            update_interval_unit: IntervalUnit::default(),
            watched_albums: Vec::new(),
            show_favorites: true,
            picture_type: PictureType::default(),
            cache_mode: false,
            cache_dir: PathBuf::from(".immich-frame-cache"),
            canvas: Canvas::default(),
            jpeg_quality: 95,
            background: [0, 0, 0],
            candidate_ttl: Duration::from_secs(60 * 60),
            http: HttpOptions::default(),
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}
