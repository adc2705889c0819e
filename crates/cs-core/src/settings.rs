//! Ad-skip agent settings
//!
//! Defaults target the YouTube player. Every field can be overridden from
//! JSON; absent fields keep their default.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Tunables and page selectors for the ad-skip agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentSettings {
    /// The agent only runs on hosts ending with this suffix
    pub host_suffix: String,
    /// Player container carrying the ad indicator class
    pub root_selector: String,
    pub video_selector: String,
    /// Tried in order; the first match is clicked
    pub skip_selectors: Vec<String>,
    /// Class on the player root while an ad plays
    pub ad_class: String,
    pub skip_interval_ms: u64,
    pub recheck_interval_ms: u64,
    /// Playback rate while an ad is on screen
    #[serde(deserialize_with = "positive_rate")]
    pub fast_rate: f64,
    /// Rate restored when nothing was captured
    #[serde(deserialize_with = "positive_rate")]
    pub fallback_rate: f64,
    /// Overlay and banner regions hidden by the injected stylesheet
    pub hidden_selectors: Vec<String>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            host_suffix: ".youtube.com".to_string(),
            root_selector: ".html5-video-player".to_string(),
            video_selector: "video.html5-main-video".to_string(),
            skip_selectors: vec![
                ".ytp-ad-skip-button".to_string(),
                ".ytp-ad-skip-button-modern".to_string(),
            ],
            ad_class: "ad-showing".to_string(),
            skip_interval_ms: 150,
            recheck_interval_ms: 200,
            fast_rate: 16.0,
            fallback_rate: 1.0,
            hidden_selectors: [
                ".ytp-ad-player-overlay",
                ".ytp-ad-overlay-slot",
                ".ytp-ad-image-overlay",
                "#player-ads",
                ".video-ads",
                "ytd-action-companion-ad-renderer",
                "tp-yt-paper-dialog.ytd-popup-container",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AgentSettings {
    pub fn skip_interval(&self) -> Duration {
        Duration::from_millis(self.skip_interval_ms)
    }

    pub fn recheck_interval(&self) -> Duration {
        Duration::from_millis(self.recheck_interval_ms)
    }

    /// Should the agent run on a page served from `host`?
    pub fn is_supported_host(&self, host: &str) -> bool {
        host.to_ascii_lowercase().ends_with(&self.host_suffix)
    }
}

fn positive_rate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let rate = f64::deserialize(deserializer)?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(serde::de::Error::custom(format!("playback rate must be positive, got {}", rate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_host() {
        let settings = AgentSettings::default();
        assert!(settings.is_supported_host("www.youtube.com"));
        assert!(settings.is_supported_host("M.YouTube.com"));
        assert!(!settings.is_supported_host("youtube.com.evil.net"));
        assert!(!settings.is_supported_host("notyoutube.org"));
    }

    #[test]
    fn test_intervals() {
        let settings = AgentSettings::default();
        assert_eq!(settings.skip_interval(), Duration::from_millis(150));
        assert_eq!(settings.recheck_interval(), Duration::from_millis(200));
        assert!(settings.skip_interval() < settings.recheck_interval());
    }

    #[test]
    fn test_rates_from_json() {
        let settings: AgentSettings = serde_json::from_str(r#"{"fastRate": 8, "fallbackRate": 1.5}"#).unwrap();
        assert_eq!(settings.fast_rate, 8.0);
        assert_eq!(settings.fallback_rate, 1.5);
        assert_eq!(settings.ad_class, "ad-showing");

        assert!(serde_json::from_str::<AgentSettings>(r#"{"fastRate": 0}"#).is_err());
        assert!(serde_json::from_str::<AgentSettings>(r#"{"fastRate": -2}"#).is_err());
        assert!(serde_json::from_str::<AgentSettings>(r#"{"fallbackRate": -1.0}"#).is_err());
    }
}
