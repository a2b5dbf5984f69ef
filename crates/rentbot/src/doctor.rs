//! `rentbot check`: configuration and connectivity diagnosis for operators.

use rentbot_core::{config::Config, errors::Error};
use rentbot_openai::OpenAiClient;

/// Operator-facing failure categories, each with a fix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    MissingConfig,
    InvalidCredentials,
    Network,
    Other,
}

impl Category {
    pub fn of(e: &Error) -> Self {
        match e {
            Error::Config(_) => Category::MissingConfig,
            Error::Unauthorized(_) => Category::InvalidCredentials,
            Error::Network(_) => Category::Network,
            Error::Json(_) | Error::External(_) => Category::Other,
        }
    }

    pub fn advice(self, service: &str) -> &'static str {
        match (self, service) {
            (Category::MissingConfig, _) => {
                "fix the variable named above in .env (start from .env.example if .env is missing)"
            }
            (Category::InvalidCredentials, "telegram") => {
                "the bot token was rejected; create a new one with @BotFather and update BOT_TOKEN"
            }
            (Category::InvalidCredentials, _) => {
                "the API key was rejected; check OPENAI_API_KEY and the account's billing status"
            }
            (Category::Network, _) => {
                "the API is unreachable from this host; set HTTPS_PROXY (and HTTP_PROXY) in .env"
            }
            (Category::Other, _) => {
                "make sure the image was rebuilt after updating (docker compose build --no-cache)"
            }
        }
    }
}

#[derive(Debug)]
pub struct Finding {
    pub service: &'static str,
    pub outcome: std::result::Result<String, (Category, String)>,
}

impl Finding {
    fn from_result(service: &'static str, r: rentbot_core::Result<String>) -> Self {
        Self {
            service,
            outcome: r.map_err(|e| (Category::of(&e), e.to_string())),
        }
    }

    pub fn render(&self) -> String {
        match &self.outcome {
            Ok(detail) => format!("[ok]   {:<9} {detail}", self.service),
            Err((cat, err)) => format!(
                "[fail] {:<9} {err}\n       -> {}",
                self.service,
                cat.advice(self.service)
            ),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Run every check; never stops at the first failure.
pub async fn run_checks() -> Vec<Finding> {
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => return vec![Finding::from_result("config", Err(e))],
    };

    let mut findings = vec![Finding::from_result(
        "config",
        Ok(format!(
            "owner {}, model {}, proxy {}",
            cfg.owner_id.0,
            cfg.openai_model,
            if cfg.outbound_proxy().is_some() { "set" } else { "none" }
        )),
    )];

    let telegram = match rentbot_telegram::router::build_bot(&cfg) {
        Ok(bot) => rentbot_telegram::router::check_telegram(&bot)
            .await
            .map(|name| format!("@{name} reachable")),
        Err(e) => Err(e),
    };
    findings.push(Finding::from_result("telegram", telegram));

    let openai = match OpenAiClient::from_config(&cfg) {
        Ok(Some(client)) => client
            .probe()
            .await
            .map(|_| format!("{} reachable", cfg.openai_base_url)),
        Ok(None) => Ok("OPENAI_API_KEY not set; chat mode and summaries disabled".to_string()),
        Err(e) => Err(e),
    };
    findings.push(Finding::from_result("openai", openai));

    findings
}
