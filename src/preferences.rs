use serde::{Deserialize, Serialize};
use web_sys::{Storage, Window};

use crate::{js_value_to_string, warn};

pub const STORAGE_KEY: &str = "meisterco.preferences";
const REDUCED_MOTION_QUERY: &str = "(prefers-reduced-motion: reduce)";

/// The one flat record the site keeps in `localStorage`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// `None` follows the operating system setting.
    pub reduced_motion: Option<bool>,
    pub particles: bool,
    pub last_vehicle: Option<String>,
    pub visits: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            reduced_motion: None,
            particles: true,
            last_vehicle: None,
            visits: 0,
        }
    }
}

fn local_storage(window: &Window) -> Result<Storage, String> {
    window
        .local_storage()
        .map_err(|err| js_value_to_string(&err))?
        .ok_or_else(|| "localStorage unavailable".to_string())
}

fn os_prefers_reduced_motion(window: &Window) -> bool {
    window
        .match_media(REDUCED_MOTION_QUERY)
        .ok()
        .flatten()
        .is_some_and(|query| query.matches())
}

impl Preferences {
    /// Corrupt or missing content yields the defaults.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|err| err.to_string())
    }

    pub fn load(window: &Window) -> Self {
        match local_storage(window).and_then(|storage| {
            storage
                .get_item(STORAGE_KEY)
                .map_err(|err| js_value_to_string(&err))
        }) {
            Ok(raw) => Self::parse(raw.as_deref()),
            Err(reason) => {
                warn(&format!("preferences unavailable ({})", reason));
                Self::default()
            }
        }
    }

    pub fn save(&self, window: &Window) -> Result<(), String> {
        let json = self.to_json()?;
        local_storage(window)?
            .set_item(STORAGE_KEY, &json)
            .map_err(|err| js_value_to_string(&err))
    }

    pub fn record_visit(&mut self) {
        self.visits = self.visits.saturating_add(1);
    }

    pub fn remember_vehicle(&mut self, vehicle: &str) {
        let vehicle = vehicle.trim();
        if !vehicle.is_empty() {
            self.last_vehicle = Some(vehicle.to_string());
        }
    }

    pub fn motion_reduced(&self, window: &Window) -> bool {
        self.reduced_motion
            .unwrap_or_else(|| os_prefers_reduced_motion(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_corrupt_storage_yields_defaults() {
        assert_eq!(Preferences::parse(None), Preferences::default());
        assert_eq!(Preferences::parse(Some("{not json")), Preferences::default());
        assert_eq!(Preferences::parse(Some("[1,2]")), Preferences::default());
    }

    #[test]
    fn partial_records_fill_in_defaults() {
        let prefs = Preferences::parse(Some(r#"{"visits":3,"unknown":"x"}"#));
        assert_eq!(prefs.visits, 3);
        assert!(prefs.particles);
        assert_eq!(prefs.reduced_motion, None);
    }

    #[test]
    fn stored_record_survives_reload() {
        let mut prefs = Preferences::default();
        prefs.reduced_motion = Some(true);
        prefs.particles = false;
        prefs.remember_vehicle("  Roadster GT ");
        prefs.record_visit();

        let json = prefs.to_json().unwrap();
        assert!(json.contains("\"last_vehicle\":\"Roadster GT\""));
        assert_eq!(Preferences::parse(Some(&json)), prefs);
    }

    #[test]
    fn blank_vehicle_is_not_remembered() {
        let mut prefs = Preferences::default();
        prefs.remember_vehicle("Touring S");
        prefs.remember_vehicle("   ");
        assert_eq!(prefs.last_vehicle.as_deref(), Some("Touring S"));
    }

    #[test]
    fn visit_counter_saturates() {
        let mut prefs = Preferences {
            visits: u32::MAX,
            ..Preferences::default()
        };
        prefs.record_visit();
        assert_eq!(prefs.visits, u32::MAX);
    }
}
