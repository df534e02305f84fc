//! Pipeline configuration
//! Read once from the environment (after `.env` loading) and passed down explicitly.

use log::{debug, info, warn};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::utils::env::env_or;

/// What happens to rows that collapse onto an existing identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Keep the first occurrence in source order, drop the rest.
    #[default]
    KeepFirst,
    /// Keep the first occurrence and mark it for manual review.
    FlagForReview,
}

impl FromStr for DuplicatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep_first" | "keep-first" => Ok(DuplicatePolicy::KeepFirst),
            "flag_for_review" | "flag-for-review" => Ok(DuplicatePolicy::FlagForReview),
            other => Err(format!("unknown duplicate policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Minimum accepted similarity.
    pub threshold: f64,
    /// Query rows scored per block.
    pub chunk_size: usize,
    pub refine_enabled: bool,
    pub refine_top_n: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            chunk_size: 1000,
            refine_enabled: false,
            refine_top_n: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub matcher: MatcherConfig,
    pub duplicate_policy: DuplicatePolicy,
    pub overlay_path: PathBuf,
    pub cache_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            duplicate_policy: DuplicatePolicy::default(),
            overlay_path: default_overlay_path(),
            cache_capacity: 4,
        }
    }
}

/// `~/.sales_assistant_data/activity_status.json`, relative to the working
/// directory when no home directory is known.
pub fn default_overlay_path() -> PathBuf {
    let base = env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_default();
    base.join(".sales_assistant_data").join("activity_status.json")
}

impl PipelineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = MatcherConfig::default();

        let mut threshold = env_or("MATCH_THRESHOLD", defaults.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            warn!("MATCH_THRESHOLD={} is outside [0, 1], using {}", threshold, defaults.threshold);
            threshold = defaults.threshold;
        }
        let chunk_size = env_or("MATCH_CHUNK_SIZE", defaults.chunk_size).max(1);

        let duplicate_policy = match env::var("DUPLICATE_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to keep_first", e);
                DuplicatePolicy::KeepFirst
            }),
            Err(_) => DuplicatePolicy::KeepFirst,
        };

        let overlay_path = env::var_os("OVERLAY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_overlay_path);

        let config = Self {
            matcher: MatcherConfig {
                threshold,
                chunk_size,
                refine_enabled: env_or("MATCH_REFINE_ENABLED", defaults.refine_enabled),
                refine_top_n: env_or("MATCH_REFINE_TOP_N", defaults.refine_top_n).max(1),
            },
            duplicate_policy,
            overlay_path,
            cache_capacity: env_or("PIPELINE_CACHE_CAPACITY", 4usize),
        };
        debug!("Pipeline config: {:?}", config);
        config
    }

    /// Log the current configuration
    pub fn log_config(&self) {
        info!("⚙️  Pipeline configuration:");
        info!(
            "   Matcher: threshold={:.2}, chunk_size={}",
            self.matcher.threshold, self.matcher.chunk_size
        );
        if self.matcher.refine_enabled {
            info!("   Edit-ratio refinement ENABLED (top {})", self.matcher.refine_top_n);
        } else {
            info!("   Edit-ratio refinement DISABLED");
        }
        info!("   Duplicate policy: {:?}", self.duplicate_policy);
        info!("   Overlay store: {}", self.overlay_path.display());
        if self.cache_capacity == 0 {
            info!("   Result cache DISABLED");
        } else {
            info!("   Result cache capacity: {}", self.cache_capacity);
        }
    }
}
