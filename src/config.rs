use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;
use std::time::Duration;

use crate::ui::DEFAULT_RENDER_DEBOUNCE;
use crate::util::{is_local_endpoint_url, parse_bool_flag};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4000";
const MAX_RENDER_DEBOUNCE_MS: u64 = 2_000;

/// LLM backend the workbench should route the conversation to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Openai,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Openai => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::Openai),
            other => bail!("Unknown OPENDOC_PROVIDER '{other}': expected 'anthropic' or 'openai'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workbench origin; the chat endpoint is `{base_url}/api/chat`.
    pub base_url: String,
    pub provider: Provider,
    pub render_debounce: Duration,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            provider: Provider::Anthropic,
            render_debounce: DEFAULT_RENDER_DEBOUNCE,
            color: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let base_url = std::env::var("OPENDOC_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let provider = match std::env::var("OPENDOC_PROVIDER") {
            Ok(value) if !value.trim().is_empty() => value.parse()?,
            _ => Provider::Anthropic,
        };

        let render_debounce = match std::env::var("OPENDOC_RENDER_DEBOUNCE_MS") {
            Ok(value) => {
                let millis: u64 = value.trim().parse().with_context(|| {
                    format!("Invalid OPENDOC_RENDER_DEBOUNCE_MS '{value}': expected milliseconds")
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => DEFAULT_RENDER_DEBOUNCE,
        };

        let color = std::env::var("OPENDOC_COLOR")
            .ok()
            .and_then(|value| parse_bool_flag(&value))
            .unwrap_or_else(|| std::io::stdout().is_terminal());

        Ok(Self {
            base_url,
            provider,
            render_debounce,
            color,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "Invalid OPENDOC_URL '{}': expected http:// or https:// URL",
                self.base_url
            );
        }

        if self.base_url.starts_with("http://") && !self.is_local_endpoint() {
            bail!(
                "Plain http:// is only allowed for local workbench endpoints (url: '{}')",
                self.base_url
            );
        }

        let millis = self.render_debounce.as_millis();
        if millis == 0 || millis > u128::from(MAX_RENDER_DEBOUNCE_MS) {
            bail!(
                "OPENDOC_RENDER_DEBOUNCE_MS must be between 1 and {MAX_RENDER_DEBOUNCE_MS} (got {millis})"
            );
        }

        Ok(())
    }

    fn is_local_endpoint(&self) -> bool {
        is_local_endpoint_url(&self.base_url)
    }
}
