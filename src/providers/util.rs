use crate::core::error::ProviderError;
use crate::core::provider::ProviderId;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("fundscope/", env!("CARGO_PKG_VERSION"));

/// Query parameters whose values never reach the logs.
const SECRET_PARAMS: [&str; 3] = ["apikey", "api_token", "token"];

/// Builds the HTTP client shared by every adapter.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Fetches `url` and decodes the JSON body into `T`.
///
/// Transport failures, non-success statuses and undecodable bodies are
/// reported as the matching [`ProviderError`] variant.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    provider: ProviderId,
    symbol: &str,
    url: &str,
) -> Result<T, ProviderError> {
    debug!("Requesting {} data from {}", provider, redact_url(url));

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProviderError::Transport {
            provider,
            symbol: symbol.to_string(),
            message: e.without_url().to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            symbol: symbol.to_string(),
            status: status.as_u16(),
        });
    }

    let text = response.text().await.map_err(|e| ProviderError::Transport {
        provider,
        symbol: symbol.to_string(),
        message: e.without_url().to_string(),
    })?;

    serde_json::from_str(&text).map_err(|e| ProviderError::Parse {
        provider,
        symbol: symbol.to_string(),
        message: e.to_string(),
    })
}

/// API key for a keyed provider, or a rejection naming the missing key.
pub fn require_key<'a>(
    provider: ProviderId,
    api_key: Option<&'a str>,
    symbol: &str,
) -> Result<&'a str, ProviderError> {
    api_key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ProviderError::Rejected {
            provider,
            symbol: symbol.to_string(),
            message: "no API key configured".to_string(),
        })
}

/// Masks secret query parameter values in `url`.
pub fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let params: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((name, _)) if SECRET_PARAMS.contains(&name.to_lowercase().as_str()) => {
                format!("{name}=***")
            }
            _ => pair.to_string(),
        })
        .collect();
    format!("{base}?{}", params.join("&"))
}

/// Parses a `YYYY-MM-DD` date, ignoring any time suffix.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Parses a numeric string as reported by providers that quote every value.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") || trimmed == "-" {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First non-blank string among `candidates`.
pub fn first_non_blank<'a>(
    candidates: impl IntoIterator<Item = Option<&'a str>>,
) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
