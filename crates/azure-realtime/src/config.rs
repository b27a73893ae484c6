use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

/// API version pinned by the realtime endpoint.
pub const DEFAULT_API_VERSION: &str = "2024-10-01-preview";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// How much of the local transcript goes into each `conversation.item.create`.
///
/// The remote side may or may not retain prior turns in session context, so
/// this stays configurable rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// One `input_text` part per stored turn plus the pending user text.
    FullHistory,
    /// Only the pending user text; prior turns are assumed to be retained
    /// server-side.
    LatestOnly,
}

impl FromStr for HistoryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "full_history" => Ok(HistoryMode::FullHistory),
            "latest" | "latest_only" => Ok(HistoryMode::LatestOnly),
            other => Err(format!("'{other}' is not a history mode (full|latest)")),
        }
    }
}

/// Everything the negotiator needs to reach one deployment.
///
/// Values are expected to be validated by the caller's configuration layer;
/// this struct just carries them.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: SecretString,
    pub api_version: String,
    pub connect_timeout: Duration,
    pub receive_timeout: Option<Duration>,
    pub history: HistoryMode,
    /// Send an explicit `session.create` before awaiting `session.created`.
    /// The endpoint confirms the session unprompted, so this is off by
    /// default.
    pub announce_session: bool,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key,
            api_version: DEFAULT_API_VERSION.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            receive_timeout: Some(DEFAULT_RECEIVE_TIMEOUT),
            history: HistoryMode::FullHistory,
            announce_session: false,
        }
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_announce_session(mut self, announce: bool) -> Self {
        self.announce_session = announce;
        self
    }

    /// Derives the websocket URL from the configured endpoint.
    ///
    /// An `https://` endpoint is rewritten to `wss://`; an explicit `ws://`
    /// or `wss://` endpoint is taken as-is, which keeps local test servers
    /// reachable.
    pub(crate) fn websocket_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        let base = if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
            trimmed.to_string()
        } else {
            let host = trimmed
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            format!("wss://{host}")
        };
        // The explicit root path keeps the upgrade request line a valid
        // URI; a bare `host?query` form is rejected by conformant servers.
        format!(
            "{base}/?api-version={}&deployment={}",
            self.api_version, self.deployment
        )
    }
}
