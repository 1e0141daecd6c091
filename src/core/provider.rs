//! Provider abstractions: identities, operations and the adapter trait

use crate::core::error::ProviderError;
use crate::core::payload::Payload;
use crate::core::request::{Action, Field, RequestKey};
use async_trait::async_trait;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// External data source identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    Fmp,
    AlphaVantage,
    Eodhd,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Yahoo,
        ProviderId::Fmp,
        ProviderId::AlphaVantage,
        ProviderId::Eodhd,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderId::Yahoo => "yahoo",
            ProviderId::Fmp => "fmp",
            ProviderId::AlphaVantage => "alphavantage",
            ProviderId::Eodhd => "eodhd",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == lowered)
            .ok_or_else(|| anyhow::anyhow!("Unknown provider: {}", s))
    }
}

/// Provider-side operation an endpoint performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Search,
    History,
    Volatility,
    Category,
    Commissions,
    MarketCap,
    AnnualReturns,
    Trends,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::History => "history",
            Operation::Volatility => "volatility",
            Operation::Category => "category",
            Operation::Commissions => "commissions",
            Operation::MarketCap => "market_cap",
            Operation::AnnualReturns => "annual_returns",
            Operation::Trends => "trends",
        }
    }

    /// Operation serving a request key, if the key is well formed.
    pub const fn for_key(key: RequestKey) -> Option<Operation> {
        match (key.action, key.field) {
            (Action::Search, None) => Some(Operation::Search),
            (Action::Compare, Some(field)) => Some(Operation::for_field(field)),
            (Action::Trends, None) => Some(Operation::Trends),
            _ => None,
        }
    }

    pub const fn for_field(field: Field) -> Operation {
        match field {
            Field::HistoricalProfit => Operation::History,
            Field::AnnualVolatility => Operation::Volatility,
            Field::Commissions => Operation::Commissions,
            Field::CategorySector => Operation::Category,
            Field::MarketCap => Operation::MarketCap,
            Field::AnnualReturns => Operation::AnnualReturns,
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window of history requested from a provider.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
    #[default]
    #[serde(rename = "10y")]
    TenYears,
    #[serde(rename = "max")]
    Max,
}

impl Timeframe {
    /// Range string understood by chart style endpoints.
    pub const fn as_range(self) -> &'static str {
        match self {
            Timeframe::OneMonth => "1mo",
            Timeframe::ThreeMonths => "3mo",
            Timeframe::SixMonths => "6mo",
            Timeframe::OneYear => "1y",
            Timeframe::TwoYears => "2y",
            Timeframe::FiveYears => "5y",
            Timeframe::TenYears => "10y",
            Timeframe::Max => "max",
        }
    }

    pub const fn months(self) -> Option<u32> {
        match self {
            Timeframe::OneMonth => Some(1),
            Timeframe::ThreeMonths => Some(3),
            Timeframe::SixMonths => Some(6),
            Timeframe::OneYear => Some(12),
            Timeframe::TwoYears => Some(24),
            Timeframe::FiveYears => Some(60),
            Timeframe::TenYears => Some(120),
            Timeframe::Max => None,
        }
    }

    /// First date inside the window ending at `end`. `None` means unbounded.
    pub fn start_from(self, end: NaiveDate) -> Option<NaiveDate> {
        self.months()
            .and_then(|m| end.checked_sub_months(Months::new(m)))
    }
}

impl Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_range())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1mo" | "1m" => Ok(Timeframe::OneMonth),
            "3mo" | "3m" => Ok(Timeframe::ThreeMonths),
            "6mo" | "6m" => Ok(Timeframe::SixMonths),
            "1y" => Ok(Timeframe::OneYear),
            "2y" => Ok(Timeframe::TwoYears),
            "5y" => Ok(Timeframe::FiveYears),
            "10y" => Ok(Timeframe::TenYears),
            "max" => Ok(Timeframe::Max),
            _ => Err(anyhow::anyhow!("Invalid timeframe: {}", s)),
        }
    }
}

/// Input to an adapter call. For search the `symbol` carries the query text,
/// for trends the wire name of a [`TrendList`](crate::core::payload::TrendList).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl Query {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe: Timeframe::default(),
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }
}

/// A market data source translating its responses into [`Payload`]s.
///
/// Implementations hold no per-request state. Failures are reported as
/// [`ProviderError`] values; an operation with nothing to report returns an
/// empty payload.
#[async_trait]
pub trait DataProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn supports(&self, operation: Operation) -> bool;

    async fn fetch(&self, operation: Operation, query: &Query) -> Result<Payload, ProviderError>;
}

/// One provider bound to one operation.
#[derive(Clone)]
pub struct ProviderEndpoint {
    provider: Arc<dyn DataProvider>,
    operation: Operation,
}

impl ProviderEndpoint {
    /// Binds `operation` to `provider`, refusing operations it cannot serve.
    pub fn new(
        provider: Arc<dyn DataProvider>,
        operation: Operation,
    ) -> Result<Self, ProviderError> {
        if !provider.supports(operation) {
            return Err(ProviderError::Unsupported {
                provider: provider.id(),
                operation,
            });
        }
        Ok(Self {
            provider,
            operation,
        })
    }

    pub fn provider_id(&self) -> ProviderId {
        self.provider.id()
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn label(&self) -> String {
        format!("{}.{}", self.provider.id(), self.operation)
    }

    pub async fn invoke(&self, query: &Query) -> Result<Payload, ProviderError> {
        self.provider.fetch(self.operation, query).await
    }
}

impl std::fmt::Debug for ProviderEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEndpoint")
            .field("provider", &self.provider.id())
            .field("operation", &self.operation)
            .finish()
    }
}
