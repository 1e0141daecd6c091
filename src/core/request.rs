//! Logical request keys used to look up provider routes

use crate::core::error::ResolveError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Top level action requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Search,
    Compare,
    Trends,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Compare => "compare",
            Action::Trends => "trends",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "search" => Ok(Action::Search),
            "compare" => Ok(Action::Compare),
            "trends" => Ok(Action::Trends),
            _ => Err(ResolveError::Configuration {
                action: s.to_string(),
                field: None,
            }),
        }
    }
}

/// Sub-metric requested under the `compare` action.
///
/// The wire names are the ones front ends pass around, including the
/// historical `anualVolatility` spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "historicalProfit")]
    HistoricalProfit,
    #[serde(rename = "anualVolatility")]
    AnnualVolatility,
    #[serde(rename = "commissions")]
    Commissions,
    #[serde(rename = "categorySector")]
    CategorySector,
    #[serde(rename = "marketCap")]
    MarketCap,
    #[serde(rename = "annualReturns")]
    AnnualReturns,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::HistoricalProfit,
        Field::AnnualVolatility,
        Field::Commissions,
        Field::CategorySector,
        Field::MarketCap,
        Field::AnnualReturns,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Field::HistoricalProfit => "historicalProfit",
            Field::AnnualVolatility => "anualVolatility",
            Field::Commissions => "commissions",
            Field::CategorySector => "categorySector",
            Field::MarketCap => "marketCap",
            Field::AnnualReturns => "annualReturns",
        }
    }

    /// Human readable label used in tables and failure listings.
    pub const fn label(self) -> &'static str {
        match self {
            Field::HistoricalProfit => "Historical profit",
            Field::AnnualVolatility => "Annual volatility",
            Field::Commissions => "Commissions",
            Field::CategorySector => "Category/sector",
            Field::MarketCap => "Market cap",
            Field::AnnualReturns => "Annual returns",
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown field '{s}'"))
    }
}

/// Registry key: an action and, for `compare`, the field being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub struct RequestKey {
    pub action: Action,
    pub field: Option<Field>,
}

impl RequestKey {
    pub const fn search() -> Self {
        Self {
            action: Action::Search,
            field: None,
        }
    }

    pub const fn compare(field: Field) -> Self {
        Self {
            action: Action::Compare,
            field: Some(field),
        }
    }

    pub const fn trends() -> Self {
        Self {
            action: Action::Trends,
            field: None,
        }
    }

    /// Parses wire names into a key. Unknown names are configuration errors.
    pub fn parse(action: &str, field: Option<&str>) -> Result<Self, ResolveError> {
        let parsed_action = action.parse::<Action>()?;
        let parsed_field = match field {
            Some(name) => Some(name.parse::<Field>().map_err(|_| {
                ResolveError::Configuration {
                    action: action.to_string(),
                    field: Some(name.to_string()),
                }
            })?),
            None => None,
        };
        Ok(Self {
            action: parsed_action,
            field: parsed_field,
        })
    }

    pub fn field_name(&self) -> Option<String> {
        self.field.map(|f| f.as_str().to_string())
    }
}

impl Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.field {
            Some(field) => write!(f, "{}/{}", self.action, field),
            None => write!(f, "{}", self.action),
        }
    }
}
