use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::core::error::ProviderError;
use crate::core::metrics;
use crate::core::payload::Payload;
use crate::core::provider::{DataProvider, Operation, ProviderId, Query};
use crate::core::series::{Bar, PriceHistory, RawSeries};
use crate::providers::util::{get_json, parse_date, parse_number, require_key};

const ID: ProviderId = ProviderId::AlphaVantage;

/// Alpha Vantage daily time series.
pub struct AlphaVantageProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AlphaVantageProvider {
    pub fn new(base_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        AlphaVantageProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// Full daily history, oldest first.
    async fn daily_series(&self, symbol: &str) -> Result<RawSeries, ProviderError> {
        let key = require_key(ID, self.api_key.as_deref(), symbol)?;
        let url = format!(
            "{}/query?function=TIME_SERIES_DAILY&outputsize=full&symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol),
            key
        );
        let data: DailyResponse = get_json(&self.client, ID, symbol, &url).await?;

        // Throttling and unknown symbols still come back as HTTP 200.
        if let Some(message) = data
            .error_message
            .or(data.note)
            .or(data.information)
        {
            return Err(ProviderError::Rejected {
                provider: ID,
                symbol: symbol.to_string(),
                message,
            });
        }

        let Some(rows) = data.series else {
            return Ok(RawSeries::default());
        };

        let bars = rows.into_iter().filter_map(|(date, row)| {
            Some(Bar {
                date: parse_date(&date)?,
                close: parse_number(&row.close)?,
                open: row.open.as_deref().and_then(parse_number),
                high: row.high.as_deref().and_then(parse_number),
                low: row.low.as_deref().and_then(parse_number),
                volume: row
                    .volume
                    .as_deref()
                    .and_then(parse_number)
                    .filter(|v| *v >= 0.0)
                    .map(|v| v as u64),
            })
        });
        let series = RawSeries::from_bars(bars);
        debug!("Parsed {} daily points for {}", series.len(), symbol);
        Ok(series)
    }
}

#[async_trait]
impl DataProvider for AlphaVantageProvider {
    fn id(&self) -> ProviderId {
        ID
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::History | Operation::AnnualReturns)
    }

    #[instrument(
        name = "AlphaVantageFetch",
        skip(self, query),
        fields(symbol = %query.symbol, operation = %operation)
    )]
    async fn fetch(&self, operation: Operation, query: &Query) -> Result<Payload, ProviderError> {
        match operation {
            Operation::History => {
                let series = self.daily_series(&query.symbol).await?;
                let start = series
                    .last()
                    .and_then(|(last, _)| query.timeframe.start_from(last));
                let window = match start {
                    Some(start) => series.since(start),
                    None => series,
                };
                Ok(Payload::History(PriceHistory {
                    name: None,
                    currency: None,
                    series: window,
                }))
            }
            Operation::AnnualReturns => {
                let series = self.daily_series(&query.symbol).await?;
                Ok(Payload::AnnualReturns(metrics::annual_returns(&series)))
            }
            _ => Err(ProviderError::Unsupported {
                provider: ID,
                operation,
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct DailyResponse {
    #[serde(rename = "Time Series (Daily)")]
    series: Option<BTreeMap<String, DailyRow>>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Deserialize, Debug)]
struct DailyRow {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}
