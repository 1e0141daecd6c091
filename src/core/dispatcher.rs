//! Executes registered routes with primary/backup fallback

use crate::core::error::{ProviderError, ResolveError};
use crate::core::payload::Payload;
use crate::core::provider::{ProviderEndpoint, ProviderId, Query, Timeframe};
use crate::core::registry::Registry;
use crate::core::request::{Action, Field, RequestKey};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub payload: Payload,
    /// Provider that produced `payload`.
    pub provider: ProviderId,
    /// True when the backup answered.
    pub fell_back: bool,
}

impl Resolved {
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Resolves request keys against a shared [`Registry`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    timeout: Duration,
    timeframe: Timeframe,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TIMEOUT,
            timeframe: Timeframe::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Timeframe used by [`Dispatcher::resolve`] and [`Dispatcher::resolve_named`].
    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn resolve(
        &self,
        action: Action,
        symbol: &str,
        field: Option<Field>,
    ) -> Result<Resolved, ResolveError> {
        self.resolve_over(action, symbol, field, self.timeframe).await
    }

    /// Resolves wire names such as `("compare", Some("anualVolatility"))`.
    /// Unknown names fail as configuration errors.
    pub async fn resolve_named(
        &self,
        action: &str,
        symbol: &str,
        field: Option<&str>,
    ) -> Result<Resolved, ResolveError> {
        let key = RequestKey::parse(action, field)?;
        let query = Query::new(symbol).with_timeframe(self.timeframe);
        self.resolve_key(key, query).await
    }

    pub async fn resolve_over(
        &self,
        action: Action,
        symbol: &str,
        field: Option<Field>,
        timeframe: Timeframe,
    ) -> Result<Resolved, ResolveError> {
        let key = RequestKey { action, field };
        self.resolve_key(key, Query::new(symbol).with_timeframe(timeframe))
            .await
    }

    #[instrument(name = "Resolve", skip(self, query), fields(key = %key, symbol = %query.symbol))]
    async fn resolve_key(&self, key: RequestKey, query: Query) -> Result<Resolved, ResolveError> {
        let entry = self.registry.lookup(key)?;

        let failure = match self.call(&entry.primary, &query).await {
            Ok(payload) if !payload.is_empty() => {
                return Ok(Resolved {
                    payload,
                    provider: entry.primary.provider_id(),
                    fell_back: false,
                });
            }
            Ok(_) => ProviderError::NoData {
                provider: entry.primary.provider_id(),
                symbol: query.symbol.clone(),
            },
            Err(err) => err,
        };

        let Some(backup) = &entry.backup else {
            debug!("No backup registered for {}: {}", key, failure);
            return Err(ResolveError::NoBackup {
                action: key.action.to_string(),
                field: key.field_name(),
                cause: failure,
            });
        };

        warn!(
            "Primary {} failed for {}: {}. Falling back to {}",
            entry.primary.label(),
            query.symbol,
            failure,
            backup.label()
        );

        match self.call(backup, &query).await {
            Ok(payload) => Ok(Resolved {
                payload,
                provider: backup.provider_id(),
                fell_back: true,
            }),
            Err(source) => Err(ResolveError::ProviderUnavailable {
                action: key.action.to_string(),
                field: key.field_name(),
                source,
            }),
        }
    }

    async fn call(
        &self,
        endpoint: &ProviderEndpoint,
        query: &Query,
    ) -> Result<Payload, ProviderError> {
        debug!("Invoking {} for {}", endpoint.label(), query.symbol);
        let result = tokio::time::timeout(self.timeout, endpoint.invoke(query))
            .await
            .map_err(|_| ProviderError::Timeout {
                provider: endpoint.provider_id(),
                symbol: query.symbol.clone(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })?;

        match &result {
            Ok(payload) => debug!(
                "{} returned {} payload (empty: {})",
                endpoint.label(),
                payload.kind(),
                payload.is_empty()
            ),
            Err(err) => debug!("{} failed: {}", endpoint.label(), err),
        }
        result
    }
}
