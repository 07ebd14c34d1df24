/// Platform client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the platform backend (record, action and catalog APIs).
    pub api_url: String,
    /// Path prefix of the platform catalog APIs (default: `platform_core`).
    pub api_prefix: String,
    /// Base URL of the native doc files server.
    pub native_files_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".into(),
            api_prefix: "platform_core".into(),
            native_files_url: "http://localhost:3000".into(),
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `PLATFORM_API_URL`       | `http://localhost:8000` |
    /// | `PLATFORM_API_PREFIX`    | `platform_core`         |
    /// | `NATIVE_FILES_URL`       | `http://localhost:3000` |
    /// | `PLATFORM_TIMEOUT_SECS`  | `30`                    |
    ///
    /// An unparsable timeout falls back to the default with a warning.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };

        let timeout_secs = match std::env::var("PLATFORM_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid PLATFORM_TIMEOUT_SECS, using default");
                defaults.timeout_secs
            }),
            Err(_) => defaults.timeout_secs,
        };

        Self {
            api_url: var("PLATFORM_API_URL", &defaults.api_url),
            api_prefix: var("PLATFORM_API_PREFIX", &defaults.api_prefix),
            native_files_url: var("NATIVE_FILES_URL", &defaults.native_files_url),
            timeout_secs,
        }
    }
}
