//! Game and server configuration.
//!
//! All tunables live in [`GameConfig`] with documented defaults. Runtime
//! reconfiguration goes through [`ConfigPatch`]: only the fields present in
//! the patch are changed, everything else keeps its current value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Live engine configuration. Applied only at phase boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Wait between reveal steps, in milliseconds.
    pub reveal_wait_ms: u64,
    /// How long the results screen stays up, in milliseconds.
    pub result_wait_ms: u64,
    /// Extra wait between results and the reset broadcast, in milliseconds.
    pub reset_wait_ms: u64,
    /// Shortest wait between phases, in milliseconds.
    pub short_wait_ms: u64,
    /// Wait after an error/announcement message, in milliseconds.
    pub message_wait_ms: u64,
    /// Number of reveal circles before the poster is fully shown.
    pub max_circles: usize,
    /// Minimum circle radius as a fraction of max(width, height).
    pub circle_size_min: f64,
    /// Maximum circle radius as a fraction of max(width, height).
    pub circle_size_max: f64,
    /// Filter chain restricting which media may be selected, in
    /// `"name(args);name2(args)"` form.
    pub filters: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            reveal_wait_ms: 5000,
            result_wait_ms: 10000,
            reset_wait_ms: 1000,
            short_wait_ms: 200,
            message_wait_ms: 1000,
            max_circles: 10,
            circle_size_min: 0.01,
            circle_size_max: 0.1,
            filters: String::new(),
        }
    }
}

impl GameConfig {
    pub fn reveal_wait(&self) -> Duration {
        Duration::from_millis(self.reveal_wait_ms)
    }

    pub fn result_wait(&self) -> Duration {
        Duration::from_millis(self.result_wait_ms)
    }

    pub fn reset_wait(&self) -> Duration {
        Duration::from_millis(self.reset_wait_ms)
    }

    pub fn short_wait(&self) -> Duration {
        Duration::from_millis(self.short_wait_ms)
    }

    pub fn message_wait(&self) -> Duration {
        Duration::from_millis(self.message_wait_ms)
    }

    /// Apply a partial update, returning the merged configuration.
    pub fn patched(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        if let Some(v) = patch.reveal_wait_ms {
            next.reveal_wait_ms = v;
        }
        if let Some(v) = patch.result_wait_ms {
            next.result_wait_ms = v;
        }
        if let Some(v) = patch.reset_wait_ms {
            next.reset_wait_ms = v;
        }
        if let Some(v) = patch.short_wait_ms {
            next.short_wait_ms = v;
        }
        if let Some(v) = patch.message_wait_ms {
            next.message_wait_ms = v;
        }
        if let Some(v) = patch.max_circles {
            next.max_circles = v;
        }
        if let Some(v) = patch.circle_size_min {
            next.circle_size_min = v;
        }
        if let Some(v) = patch.circle_size_max {
            next.circle_size_max = v;
        }
        if let Some(ref v) = patch.filters {
            next.filters = v.clone();
        }
        next
    }
}

/// Partial [`GameConfig`] update. Fields left out of the JSON body stay
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub reveal_wait_ms: Option<u64>,
    pub result_wait_ms: Option<u64>,
    pub reset_wait_ms: Option<u64>,
    pub short_wait_ms: Option<u64>,
    pub message_wait_ms: Option<u64>,
    pub max_circles: Option<usize>,
    pub circle_size_min: Option<f64>,
    pub circle_size_max: Option<f64>,
    pub filters: Option<String>,
}

/// Process-level settings read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Path to the media data JSON file. `None` means use the built-in
    /// example dataset.
    pub media_data_path: Option<String>,
    /// Directory served as the frontend.
    pub static_dir: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let media_data_path = match std::env::var("MEDIA_DATA") {
            Ok(path) if path.is_empty() => None,
            Ok(path) => Some(path),
            Err(_) => Some("media.json".to_string()),
        };

        let static_dir = std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string());

        Self {
            port,
            media_data_path,
            static_dir,
        }
    }
}
