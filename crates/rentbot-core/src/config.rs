use std::{
    env, fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::UserId, errors::Error, model::types::ModelChoice, Result};

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "Netflix", "YouTube", "shared", "rent", "group", "上车", "合租",
];
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Upper bound for every duration setting (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Typed configuration, read once at process start.
///
/// Every key here is also listed in `.env.example`; the deploy manifest test
/// keeps the two in sync.
#[derive(Clone)]
pub struct Config {
    // Required
    pub bot_token: String,
    pub owner_id: UserId,

    // Completion backend
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: ModelChoice,
    pub openai_timeout: Duration,

    // Group watch
    pub keywords: Vec<String>,
    pub history_limit: usize,

    // Behavior flags
    pub admin_only_commands: bool,

    // Rate limiting (completion calls only)
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Telegram
    pub polling_timeout: Duration,
    pub telegram_safe_limit: usize,

    // Outbound proxy
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Option<String>,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    ///
    /// `.env` never overrides variables that are already set, so compose
    /// `environment:` entries win over a stray file baked into the image.
    pub fn load() -> Result<Self> {
        load_env_file();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env(&lookup);

        let bot_token = env
            .first(&["BOT_TOKEN", "TELEGRAM_BOT_TOKEN"])
            .ok_or_else(|| {
                Error::Config("BOT_TOKEN environment variable is required".to_string())
            })?;

        let owner_raw = env.first(&["OWNER_ID", "FORWARD_TO_ID"]).ok_or_else(|| {
            Error::Config("OWNER_ID environment variable is required".to_string())
        })?;
        let owner_id = owner_raw.parse::<i64>().map(UserId).map_err(|_| {
            Error::Config(format!(
                "OWNER_ID must be an integer user id, not @username (got {owner_raw:?})"
            ))
        })?;

        let openai_api_key = env.get("OPENAI_API_KEY");
        let openai_base_url = env
            .get("OPENAI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let openai_model = match env.get("OPENAI_MODEL") {
            Some(name) => name.parse::<ModelChoice>().map_err(Error::Config)?,
            None => ModelChoice::default(),
        };
        let openai_timeout = env.secs("OPENAI_TIMEOUT_SECS").unwrap_or(Duration::from_secs(60));

        let keywords = match env.get("KEYWORDS") {
            Some(raw) => parse_csv(&raw),
            None => DEFAULT_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        };
        let history_limit = env.usize("HISTORY_LIMIT").unwrap_or(5).max(1);

        let admin_only_commands = env.bool("ADMIN_ONLY_COMMANDS").unwrap_or(true);

        let rate_limit_enabled = env.bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env.u32("RATE_LIMIT_REQUESTS").unwrap_or(20).max(1);
        let rate_limit_window = env.secs("RATE_LIMIT_WINDOW").unwrap_or(Duration::from_secs(60));

        let polling_timeout = env
            .secs("POLLING_TIMEOUT_SECS")
            .unwrap_or(Duration::from_secs(60));

        let http_proxy = env.first(&["HTTP_PROXY", "http_proxy"]);
        let https_proxy = env.first(&["HTTPS_PROXY", "https_proxy"]);
        let no_proxy = env.first(&["NO_PROXY", "no_proxy"]);
        for (key, value) in [("HTTP_PROXY", &http_proxy), ("HTTPS_PROXY", &https_proxy)] {
            if let Some(v) = value {
                validate_proxy_url(key, v)?;
            }
        }

        Ok(Self {
            bot_token,
            owner_id,
            openai_api_key,
            openai_base_url,
            openai_model,
            openai_timeout,
            keywords,
            history_limit,
            admin_only_commands,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            polling_timeout,
            telegram_safe_limit: 4000,
            http_proxy,
            https_proxy,
            no_proxy,
        })
    }

    /// Proxy for HTTPS traffic (both Telegram and OpenAI are HTTPS-only).
    pub fn outbound_proxy(&self) -> Option<&str> {
        self.https_proxy.as_deref().or(self.http_proxy.as_deref())
    }

    pub fn completion_available(&self) -> bool {
        self.openai_api_key.is_some()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("openai_timeout", &self.openai_timeout)
            .field("keywords", &self.keywords)
            .field("history_limit", &self.history_limit)
            .field("admin_only_commands", &self.admin_only_commands)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("polling_timeout", &self.polling_timeout)
            .field("http_proxy", &self.http_proxy.as_deref().map(redact_userinfo))
            .field("https_proxy", &self.https_proxy.as_deref().map(redact_userinfo))
            .field("no_proxy", &self.no_proxy)
            .finish()
    }
}

/// Load `.env` from the working directory or a parent into the process
/// environment. Variables that are already set are left alone.
///
/// Runs before logging is initialized so `RUST_LOG` may come from `.env`.
pub fn load_env_file() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Like [`load_env_file`] for an explicit path; `false` if it could not be read.
pub fn load_env_file_from(path: &Path) -> bool {
    dotenvy::from_path(path).is_ok()
}

/// Environment accessor; blank values count as unset.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k))
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|s| s.parse::<u64>().ok())
    }

    /// Whole seconds, clamped to [`MAX_DURATION_SECS`].
    fn secs(&self, key: &str) -> Option<Duration> {
        self.u64(key)
            .map(|n| Duration::from_secs(n.min(MAX_DURATION_SECS)))
    }

    fn u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|s| s.parse::<u32>().ok())
    }

    fn usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|s| s.parse::<usize>().ok())
    }
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn validate_proxy_url(key: &str, value: &str) -> Result<()> {
    const SCHEMES: [&str; 4] = ["http://", "https://", "socks5://", "socks5h://"];
    let lower = value.to_lowercase();
    if let Some(scheme) = SCHEMES.iter().find(|s| lower.starts_with(*s)) {
        if value.len() > scheme.len() {
            return Ok(());
        }
    }
    Err(Error::Config(format!(
        "{key} must be a proxy URL such as http://host:port (got {:?})",
        redact_userinfo(value)
    )))
}

/// Hide `user:pass@` in proxy URLs before they reach logs.
fn redact_userinfo(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    match rest.find('@') {
        Some(at) => format!("{}://***@{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}
