use inspecta_gateway::types::ConfidenceOverrides;

/// Default backend base URL.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// A malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{var} is invalid: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a backend on localhost.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing `/`.
    pub api_base_url: String,
    /// Detector confidence overrides sent with analyze and finalize.
    pub confidence: ConfidenceOverrides,
    /// Ask the backend for debug overlays.
    pub debug_images: bool,
    /// Subscribe to the session socket for server-pushed aborts.
    pub watch_session: bool,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `INSPECTA_API_BASE_URL`  | `http://localhost:8000` |
    /// | `INSPECTA_CONF_DAMAGE`   | unset                   |
    /// | `INSPECTA_CONF_PARTS`    | unset                   |
    /// | `INSPECTA_DEBUG_IMAGES`  | `false`                 |
    /// | `INSPECTA_WATCH_SESSION` | `true`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_base_url = get("INSPECTA_API_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError {
                var: "INSPECTA_API_BASE_URL",
                reason: format!("'{api_base_url}' must start with http:// or https://"),
            });
        }

        let confidence = ConfidenceOverrides {
            damage: parse_confidence("INSPECTA_CONF_DAMAGE", get("INSPECTA_CONF_DAMAGE"))?,
            parts: parse_confidence("INSPECTA_CONF_PARTS", get("INSPECTA_CONF_PARTS"))?,
        };
        let debug_images = parse_flag("INSPECTA_DEBUG_IMAGES", get("INSPECTA_DEBUG_IMAGES"), false)?;
        let watch_session =
            parse_flag("INSPECTA_WATCH_SESSION", get("INSPECTA_WATCH_SESSION"), true)?;

        Ok(Self {
            api_base_url,
            confidence,
            debug_images,
            watch_session,
        })
    }
}

fn parse_confidence(var: &'static str, raw: Option<String>) -> Result<Option<f64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(Some(v)),
        _ => Err(ConfigError {
            var,
            reason: format!("'{raw}' must be a number between 0 and 1"),
        }),
    }
}

fn parse_flag(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError {
            var,
            reason: format!("'{raw}' must be true or false"),
        }),
    }
}
