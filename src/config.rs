//! Display configuration from the environment

use tracing::debug;

pub const DISPLAY_ENV: &str = "DISPLAY";
pub const FORCE_SCALE_FACTOR_ENV: &str = "X11KIT_FORCE_SCALE_FACTOR";
pub const DESKTOP_SCALE_ENV: &str = "GDK_SCALE";
pub const DEFAULT_DISPLAY: &str = ":0";

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub display: Option<String>,
    /// Forced logical-to-physical scale; wins over the desktop hint.
    pub scale_override: Option<f64>,
    pub desktop_scale: Option<f64>,
    /// Used for `WM_CLASS`.
    pub application_name: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            display: None,
            scale_override: None,
            desktop_scale: None,
            application_name: "x11kit".to_string(),
        }
    }
}

impl DisplayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            display: lookup(DISPLAY_ENV).filter(|d| !d.is_empty()),
            scale_override: lookup(FORCE_SCALE_FACTOR_ENV).as_deref().and_then(parse_scale),
            desktop_scale: lookup(DESKTOP_SCALE_ENV).as_deref().and_then(parse_scale),
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    pub fn with_scale_override(mut self, scale: f64) -> Self {
        self.scale_override = (scale > 0.0).then_some(scale);
        self
    }

    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn display_name(&self) -> String {
        match &self.display {
            Some(display) => display.clone(),
            None => {
                debug!("{DISPLAY_ENV} is not set, falling back to {DEFAULT_DISPLAY}");
                DEFAULT_DISPLAY.to_string()
            }
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale_override.or(self.desktop_scale).unwrap_or(1.0)
    }
}

fn parse_scale(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s > 0.0)
}
