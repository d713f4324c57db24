use crate::sequencer::{FALLBACK_TIMEOUT_MS, GRACE_DELAY_MS, SequencerConfig};
use web_sys::Location;

pub const DEFAULT_PARTICLE_COUNT: u32 = 50;
const MAX_PARTICLE_COUNT: u32 = 200;
const MIN_LOADER_TIMEOUT_MS: u32 = 500;
const MAX_LOADER_TIMEOUT_MS: u32 = 30_000;

/// Startup settings: compiled-in defaults, overridable from the query string
/// (`?noloader=1&loader_timeout=2000&particles=20&debug=1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteConfig {
    pub loader_enabled: bool,
    pub fallback_timeout_ms: u32,
    pub grace_delay_ms: u32,
    pub particle_count: u32,
    pub debug: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            loader_enabled: true,
            fallback_timeout_ms: FALLBACK_TIMEOUT_MS,
            grace_delay_ms: GRACE_DELAY_MS,
            particle_count: DEFAULT_PARTICLE_COUNT,
            debug: false,
        }
    }
}

fn query_pairs(search: &str) -> impl Iterator<Item = (&str, &str)> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
}

fn flag(value: &str) -> bool {
    matches!(value, "" | "1" | "true" | "yes")
}

impl SiteConfig {
    pub fn from_query(search: &str) -> Self {
        let mut config = Self::default();

        for (key, value) in query_pairs(search) {
            match key {
                "noloader" => config.loader_enabled = !flag(value),
                "loader_timeout" => {
                    if let Ok(ms) = value.parse::<u32>() {
                        config.fallback_timeout_ms =
                            ms.clamp(MIN_LOADER_TIMEOUT_MS, MAX_LOADER_TIMEOUT_MS);
                    }
                }
                "particles" => {
                    if let Ok(count) = value.parse::<u32>() {
                        config.particle_count = count.min(MAX_PARTICLE_COUNT);
                    }
                }
                "debug" => config.debug = flag(value),
                _ => {}
            }
        }

        config
    }

    pub fn from_location(location: &Location) -> Self {
        Self::from_query(&location.search().unwrap_or_default())
    }

    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            fallback_timeout_ms: self.fallback_timeout_ms,
            grace_delay_ms: self.grace_delay_ms,
        }
    }
}
