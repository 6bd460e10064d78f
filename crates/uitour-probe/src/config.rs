//! Harness configuration
//!
//! Every constant the harness relies on (test page location, feature pref,
//! permission grants, poll cadence, well-known chrome element ids) lives here
//! so a suite can point the harness at a different page or host without code
//! changes.

use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Interval between condition checks (100ms)
pub const SINGLE_TRY_TIMEOUT_MS: u64 = 100;

/// Default bound on condition checks
pub const NUMBER_OF_TRIES: u32 = 30;

/// Fixed timeout for panel show/hide events (5 seconds)
pub const PANEL_EVENT_TIMEOUT_MS: u64 = 5000;

/// Poll cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Milliseconds between checks
    pub interval_ms: u64,
    /// Checks before the bound is reached
    pub max_tries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: SINGLE_TRY_TIMEOUT_MS,
            max_tries: NUMBER_OF_TRIES,
        }
    }
}

/// Identifiers of the host UI elements a tour test inspects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromeElementIds {
    /// Highlight container
    pub highlight: String,
    /// Info tooltip popup
    pub tooltip: String,
    /// Main menu panel
    pub menu_panel: String,
    /// Button that toggles the menu panel
    pub menu_button: String,
}

impl Default for ChromeElementIds {
    fn default() -> Self {
        Self {
            highlight: "UITourHighlightContainer".to_string(),
            tooltip: "UITourTooltip".to_string(),
            menu_panel: "PanelUI-popup".to_string(),
            menu_button: "PanelUI-menu-button".to_string(),
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Prefix of harness-served URLs, replaced by the page host
    pub chrome_root: String,
    /// Directory containing the test page
    pub test_directory: String,
    /// Test page filename
    pub page_name: String,
    /// Origin used when a test does not supply one
    pub default_host: String,
    /// Boolean pref enabling the feature under test
    pub enable_pref: String,
    /// Permission type granted to the test origins
    pub permission_type: String,
    /// Origins receiving the permission grant
    pub permission_origins: Vec<String>,
    /// Condition poll cadence
    pub poll: PollConfig,
    /// Timeout for panel show/hide events
    pub panel_event_timeout_ms: u64,
    /// Well-known chrome elements
    pub elements: ChromeElementIds,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            chrome_root: "chrome://mochitests/content/".to_string(),
            test_directory:
                "chrome://mochitests/content/browser/browser/components/uitour/test/"
                    .to_string(),
            page_name: "uitour.html".to_string(),
            default_host: "https://example.com/".to_string(),
            enable_pref: "browser.uitour.enabled".to_string(),
            permission_type: "uitour".to_string(),
            permission_origins: vec![
                "https://example.com".to_string(),
                "http://example.com".to_string(),
            ],
            poll: PollConfig::default(),
            panel_event_timeout_ms: PANEL_EVENT_TIMEOUT_MS,
            elements: ChromeElementIds::default(),
        }
    }
}

impl HarnessConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML; missing keys keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ProbeResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Reject configurations the harness cannot run with
    pub fn validate(&self) -> ProbeResult<()> {
        if self.poll.interval_ms == 0 {
            return Err(ProbeError::Config {
                message: "poll.interval_ms must be greater than zero".to_string(),
            });
        }
        if self.page_name.is_empty() {
            return Err(ProbeError::Config {
                message: "page_name must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Set the default host
    #[must_use]
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    /// Set the test page filename
    #[must_use]
    pub fn with_page_name(mut self, name: impl Into<String>) -> Self {
        self.page_name = name.into();
        self
    }

    /// Set the poll cadence
    #[must_use]
    pub const fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Set the permission origins
    #[must_use]
    pub fn with_permission_origins(mut self, origins: Vec<String>) -> Self {
        self.permission_origins = origins;
        self
    }

    /// Test page URL served from `host`
    ///
    /// The harness prefix is replaced by `host`; a directory outside the
    /// prefix is used unchanged.
    #[must_use]
    pub fn test_page_url(&self, host: &str) -> String {
        let url = format!("{}{}", self.test_directory, self.page_name);
        url.replacen(&self.chrome_root, host, 1)
    }
}

/// Origin (`scheme://host[:port]`) of `url`
#[must_use]
pub fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            let host_end = rest.find('/').unwrap_or(rest.len());
            url[..scheme_end + 3 + host_end].to_string()
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.poll.interval_ms, 100);
        assert_eq!(config.poll.max_tries, 30);
        assert_eq!(config.panel_event_timeout_ms, 5000);
        assert_eq!(config.elements.tooltip, "UITourTooltip");
        assert_eq!(config.permission_origins.len(), 2);
    }

    #[test]
    fn test_page_url_uses_host() {
        let config = HarnessConfig::default();
        assert_eq!(
            config.test_page_url("https://example.com/"),
            "https://example.com/browser/browser/components/uitour/test/uitour.html"
        );
        assert_eq!(
            config.test_page_url("http://example.org/"),
            "http://example.org/browser/browser/components/uitour/test/uitour.html"
        );
    }

    #[test]
    fn test_page_url_outside_prefix_unchanged() {
        let mut config = HarnessConfig::default();
        config.test_directory = "file:///tmp/tour/".to_string();
        assert_eq!(
            config.test_page_url("https://example.com/"),
            "file:///tmp/tour/uitour.html"
        );
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://example.com/browser/uitour.html"),
            "https://example.com"
        );
        assert_eq!(origin_of("http://example.com:8080"), "http://example.com:8080");
        assert_eq!(origin_of("about:blank"), "about:blank");
    }

    #[test]
    fn test_yaml_partial_override() {
        let config = HarnessConfig::from_yaml_str(
            "default_host: http://localhost:8000/\npoll:\n  max_tries: 5\n",
        )
        .unwrap();
        assert_eq!(config.default_host, "http://localhost:8000/");
        assert_eq!(config.poll.max_tries, 5);
        assert_eq!(config.poll.interval_ms, 100);
        assert_eq!(config.page_name, "uitour.html");
    }

    #[test]
    fn test_yaml_rejects_zero_interval() {
        let err = HarnessConfig::from_yaml_str("poll:\n  interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ProbeError::Config { .. }));
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let config = HarnessConfig::default().with_page_name("tour-alt.html");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();

        let loaded = HarnessConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = HarnessConfig::from_yaml_file("/nonexistent/uitour-probe.yaml").unwrap_err();
        assert!(matches!(err, ProbeError::Config { .. }));
    }
}
