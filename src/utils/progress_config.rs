// src/utils/progress_config.rs

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::env::env_or;

/// Configuration for progress tracking throughout the pipeline
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show per-chunk bars inside the matcher
    pub detailed: bool,
    /// Whether to show memory usage in the run summary
    pub show_memory: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            show_memory: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env_or("PROGRESS_ENABLED", true),
            detailed: env_or("PROGRESS_DETAILED", true),
            show_memory: env_or("PROGRESS_SHOW_MEMORY", true),
        }
    }

    /// Progress bars off, used by tests and library callers.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            detailed: false,
            show_memory: false,
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

/// Adds a styled bar to `multi` when one is present.
pub fn add_bar(multi: Option<&MultiProgress>, len: u64, template: &str) -> Option<ProgressBar> {
    let mp = multi?;
    let pb = mp.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    Some(pb)
}
