//! Normalized results returned by provider adapters

use crate::core::provider::Operation;
use crate::core::series::PriceHistory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Calendar year to return over that year, as a fraction.
pub type AnnualReturns = BTreeMap<i32, f64>;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SearchHit {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub kind: Option<String>,
    pub sector: Option<String>,
}

/// Fee and size facts about a fund.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Commissions {
    /// Fraction, 0.0003 = 0.03%
    pub expense_ratio: Option<f64>,
    pub total_assets: Option<f64>,
    pub ytd_return: Option<f64>,
    pub inception_date: Option<String>,
    pub fund_family: Option<String>,
}

impl Commissions {
    pub fn is_empty(&self) -> bool {
        !self.expense_ratio.is_some_and(f64::is_finite)
            && !self.total_assets.is_some_and(f64::is_finite)
            && !self.ytd_return.is_some_and(f64::is_finite)
            && self.inception_date.as_deref().is_none_or(str::is_empty)
            && self.fund_family.as_deref().is_none_or(str::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketCap {
    pub value: f64,
    pub formatted: String,
}

impl MarketCap {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            formatted: format_large_number(value),
        }
    }
}

/// Formats a large amount with a T/B/M suffix, e.g. `2.95T`.
pub fn format_large_number(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else {
        format!("{value:.0}")
    }
}

/// Market-wide list of the day's movers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendList {
    Actives,
    Gainers,
    Losers,
}

impl TrendList {
    pub const ALL: [TrendList; 3] = [TrendList::Actives, TrendList::Gainers, TrendList::Losers];

    pub const fn as_str(self) -> &'static str {
        match self {
            TrendList::Actives => "actives",
            TrendList::Gainers => "gainers",
            TrendList::Losers => "losers",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            TrendList::Actives => "Most active",
            TrendList::Gainers => "Top gainers",
            TrendList::Losers => "Top losers",
        }
    }
}

impl Display for TrendList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendList {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        TrendList::ALL
            .into_iter()
            .find(|list| list.as_str() == lowered)
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown trend list: {s} (expected actives, gainers or losers)")
            })
    }
}

/// One entry of a [`TrendList`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Mover {
    pub symbol: String,
    pub name: Option<String>,
    pub price: Option<f64>,
    /// Absolute price change over the session.
    pub change: Option<f64>,
    /// Percentage points, 1.5 = 1.5%
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Search(Vec<SearchHit>),
    History(PriceHistory),
    /// Annualized, as a fraction.
    Volatility(f64),
    Commissions(Commissions),
    Category(String),
    MarketCap(MarketCap),
    AnnualReturns(AnnualReturns),
    Trends(Vec<Mover>),
}

impl Payload {
    /// Payload an adapter returns when `operation` found nothing.
    pub fn empty(operation: Operation) -> Self {
        match operation {
            Operation::Search => Payload::Search(Vec::new()),
            Operation::History => Payload::History(PriceHistory::default()),
            Operation::Volatility => Payload::Volatility(f64::NAN),
            Operation::Commissions => Payload::Commissions(Commissions::default()),
            Operation::Category => Payload::Category(String::new()),
            Operation::MarketCap => Payload::MarketCap(MarketCap {
                value: 0.0,
                formatted: String::new(),
            }),
            Operation::AnnualReturns => Payload::AnnualReturns(AnnualReturns::new()),
            Operation::Trends => Payload::Trends(Vec::new()),
        }
    }

    /// True when the payload carries nothing a caller could use.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Search(hits) => hits.is_empty(),
            Payload::History(history) => history.series.is_empty(),
            Payload::Volatility(v) => !v.is_finite(),
            Payload::Commissions(c) => c.is_empty(),
            Payload::Category(c) => c.trim().is_empty(),
            Payload::MarketCap(m) => !m.value.is_finite() || m.value <= 0.0,
            Payload::AnnualReturns(r) => r.is_empty(),
            Payload::Trends(movers) => movers.is_empty(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Search(_) => "search",
            Payload::History(_) => "history",
            Payload::Volatility(_) => "volatility",
            Payload::Commissions(_) => "commissions",
            Payload::Category(_) => "category",
            Payload::MarketCap(_) => "market_cap",
            Payload::AnnualReturns(_) => "annual_returns",
            Payload::Trends(_) => "trends",
        }
    }

    pub fn into_search(self) -> Option<Vec<SearchHit>> {
        match self {
            Payload::Search(hits) => Some(hits),
            _ => None,
        }
    }

    pub fn into_history(self) -> Option<PriceHistory> {
        match self {
            Payload::History(history) => Some(history),
            _ => None,
        }
    }

    pub fn as_volatility(&self) -> Option<f64> {
        match self {
            Payload::Volatility(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn into_commissions(self) -> Option<Commissions> {
        match self {
            Payload::Commissions(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_category(self) -> Option<String> {
        match self {
            Payload::Category(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_market_cap(self) -> Option<MarketCap> {
        match self {
            Payload::MarketCap(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_annual_returns(self) -> Option<AnnualReturns> {
        match self {
            Payload::AnnualReturns(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_trends(self) -> Option<Vec<Mover>> {
        match self {
            Payload::Trends(movers) => Some(movers),
            _ => None,
        }
    }
}
