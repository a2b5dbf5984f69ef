use std::{fmt, str::FromStr};

/// Completion models the owner may switch between with `/model`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModelChoice {
    #[default]
    Gpt5Mini,
    Gpt5,
    Gpt5Pro,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 3] = [ModelChoice::Gpt5Mini, ModelChoice::Gpt5, ModelChoice::Gpt5Pro];

    pub fn api_name(self) -> &'static str {
        match self {
            ModelChoice::Gpt5Mini => "gpt-5-mini",
            ModelChoice::Gpt5 => "gpt-5",
            ModelChoice::Gpt5Pro => "gpt-5-pro",
        }
    }

    /// `gpt-5-mini, gpt-5, gpt-5-pro`
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|m| m.api_name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for ModelChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.api_name() == s)
            .ok_or_else(|| format!("unknown model {s:?}; allowed: {}", Self::allowed_list()))
    }
}

/// Normalized request for a single completion.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub model: ModelChoice,
    pub system_prompt: String,
    pub prompt: String,
}
