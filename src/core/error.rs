//! Error taxonomy for provider calls and request resolution

use crate::core::provider::{Operation, ProviderId};
use crate::core::request::{Field, RequestKey};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure of a single adapter call. Always recoverable by trying the next
/// provider registered for the request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider} request failed for {symbol}: {message}")]
    Transport {
        provider: ProviderId,
        symbol: String,
        message: String,
    },

    #[error("{provider} timed out after {timeout_ms}ms for {symbol}")]
    Timeout {
        provider: ProviderId,
        symbol: String,
        timeout_ms: u64,
    },

    #[error("{provider} returned HTTP {status} for {symbol}")]
    Status {
        provider: ProviderId,
        symbol: String,
        status: u16,
    },

    #[error("{provider} response for {symbol} could not be parsed: {message}")]
    Parse {
        provider: ProviderId,
        symbol: String,
        message: String,
    },

    #[error("{provider} rejected the request for {symbol}: {message}")]
    Rejected {
        provider: ProviderId,
        symbol: String,
        message: String,
    },

    #[error("{provider} response for {symbol} is missing '{field}'")]
    MissingField {
        provider: ProviderId,
        symbol: String,
        field: &'static str,
    },

    #[error("{provider} has no data for {symbol}")]
    NoData { provider: ProviderId, symbol: String },

    #[error("{provider} does not support {operation}")]
    Unsupported {
        provider: ProviderId,
        operation: Operation,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderId {
        match self {
            ProviderError::Transport { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Parse { provider, .. }
            | ProviderError::Rejected { provider, .. }
            | ProviderError::MissingField { provider, .. }
            | ProviderError::NoData { provider, .. }
            | ProviderError::Unsupported { provider, .. } => *provider,
        }
    }
}

/// Failure of a dispatched request.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    /// No route is registered for the action/field. Always a setup defect.
    #[error(
        "no provider configured for action '{action}', field '{}'",
        field.as_deref().unwrap_or("none")
    )]
    Configuration {
        action: String,
        field: Option<String>,
    },

    /// The primary provider failed and nothing is registered behind it.
    #[error(
        "primary provider failed and no backup is configured for action '{action}', field '{}': {cause}",
        field.as_deref().unwrap_or("none")
    )]
    NoBackup {
        action: String,
        field: Option<String>,
        cause: ProviderError,
    },

    /// The backup provider failed as well; carries the backup's error.
    #[error(
        "backup provider failed for action '{action}', field '{}': {source}",
        field.as_deref().unwrap_or("none")
    )]
    ProviderUnavailable {
        action: String,
        field: Option<String>,
        source: ProviderError,
    },
}

impl ResolveError {
    /// User facing hint: configuration defects are fatal, provider failures
    /// mean the caller should try another source later.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ResolveError::Configuration { .. })
    }
}

/// Some fields of a fund record could not be resolved.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{} field(s) unavailable for {symbol}", failures.len())]
pub struct PartialDataError {
    pub symbol: String,
    pub failures: BTreeMap<Field, String>,
}

/// Invalid route table. Raised while building the registry at startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("request key '{key}' has no provider operation")]
    MalformedKey { key: RequestKey },

    #[error("provider '{provider}' is not available")]
    UnknownProvider { provider: ProviderId },

    #[error("provider '{provider}' cannot serve '{key}': {operation} is not supported")]
    Unsupported {
        key: RequestKey,
        provider: ProviderId,
        operation: Operation,
    },
}

/// Invalid raw series construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("series length mismatch: {dates} dates, {values} values in '{column}'")]
    LengthMismatch {
        column: &'static str,
        dates: usize,
        values: usize,
    },
}
