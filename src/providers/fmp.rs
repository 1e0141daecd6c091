use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::error::ProviderError;
use crate::core::metrics;
use crate::core::payload::{Commissions, MarketCap, Mover, Payload, SearchHit, TrendList};
use crate::core::provider::{DataProvider, Operation, ProviderId, Query};
use crate::core::series::{Bar, RawSeries};
use crate::providers::util::{first_non_blank, get_json, parse_date, parse_number, require_key};

const ID: ProviderId = ProviderId::Fmp;

/// Financial Modeling Prep REST API (`/api/v3`).
pub struct FmpProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// FMP answers some failures with HTTP 200 and an error object.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Envelope<T> {
    Error {
        #[serde(rename = "Error Message")]
        message: String,
    },
    Data(T),
}

impl FmpProvider {
    pub fn new(base_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        FmpProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    /// GETs `/api/v3/{endpoint}` with `params` and the API key appended.
    async fn get<T: DeserializeOwned>(
        &self,
        symbol: &str,
        endpoint: &str,
        params: &str,
    ) -> Result<T, ProviderError> {
        let key = require_key(ID, self.api_key.as_deref(), symbol)?;
        let separator = if params.is_empty() { "" } else { "&" };
        let url = format!(
            "{}/api/v3/{}?{}{}apikey={}",
            self.base_url, endpoint, params, separator, key
        );

        match get_json::<Envelope<T>>(&self.client, ID, symbol, &url).await? {
            Envelope::Data(data) => Ok(data),
            Envelope::Error { message } => Err(ProviderError::Rejected {
                provider: ID,
                symbol: symbol.to_string(),
                message,
            }),
        }
    }

    async fn search(&self, query: &str) -> Result<Payload, ProviderError> {
        let params = format!("query={}&limit=10", urlencoding::encode(query));
        let results: Vec<FmpSearchResult> = self.get(query, "search", &params).await?;
        let hits = results
            .into_iter()
            .filter(|r| !r.symbol.is_empty())
            .map(|r| SearchHit {
                symbol: r.symbol,
                name: r.name,
                exchange: r.exchange_short_name.or(r.stock_exchange),
                kind: None,
                sector: None,
            })
            .collect();
        Ok(Payload::Search(hits))
    }

    async fn commissions(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let params = format!("symbol={}", urlencoding::encode(symbol));
        let infos: Vec<EtfInfo> = self.get(symbol, "etf-info", &params).await?;
        let Some(info) = infos.into_iter().next() else {
            return Ok(Payload::empty(Operation::Commissions));
        };

        // FMP quotes expense ratio and YTD as percentages.
        Ok(Payload::Commissions(Commissions {
            expense_ratio: info.expense_ratio.map(|v| v / 100.0),
            total_assets: info.total_assets.or(info.aum),
            ytd_return: info.ytd.map(|v| v / 100.0),
            inception_date: info.inception_date.filter(|d| !d.is_empty()),
            fund_family: first_non_blank([
                info.fund_family.as_deref(),
                info.etf_company.as_deref(),
            ]),
        }))
    }

    async fn category(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let endpoint = format!("profile/{}", urlencoding::encode(symbol));
        let profiles: Vec<Profile> = self.get(symbol, &endpoint, "").await?;
        let profile = profiles
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::NoData {
                provider: ID,
                symbol: symbol.to_string(),
            })?;

        first_non_blank([
            profile.category.as_deref(),
            profile.sector.as_deref(),
            profile.industry.as_deref(),
        ])
        .map(Payload::Category)
        .ok_or_else(|| ProviderError::MissingField {
            provider: ID,
            symbol: symbol.to_string(),
            field: "sector",
        })
    }

    async fn volatility(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let endpoint = format!("historical-price-full/{}", urlencoding::encode(symbol));
        let data: HistoricalPriceFull = self.get(symbol, &endpoint, "timeseries=365").await?;

        // Upstream order is newest first; from_bars reorders.
        let series = RawSeries::from_bars(data.historical.into_iter().filter_map(|row| {
            Some(Bar {
                date: parse_date(&row.date)?,
                close: row.close?,
                open: row.open,
                high: row.high,
                low: row.low,
                volume: row.volume.filter(|v| *v >= 0.0).map(|v| v as u64),
            })
        }));

        let volatility = metrics::trailing_volatility(&series);
        debug!("Computed volatility {:?} from {} points", volatility, series.len());
        Ok(volatility.map_or(Payload::empty(Operation::Volatility), Payload::Volatility))
    }

    async fn market_cap(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let endpoint = format!("market-capitalization/{}", urlencoding::encode(symbol));
        let rows: Vec<MarketCapRow> = self.get(symbol, &endpoint, "").await?;
        Ok(rows
            .into_iter()
            .find_map(|row| row.market_cap)
            .map_or(Payload::empty(Operation::MarketCap), |value| {
                Payload::MarketCap(MarketCap::new(value))
            }))
    }

    async fn trends(&self, list_name: &str) -> Result<Payload, ProviderError> {
        let list = list_name
            .parse::<TrendList>()
            .map_err(|e| ProviderError::Rejected {
                provider: ID,
                symbol: list_name.to_string(),
                message: e.to_string(),
            })?;
        let endpoint = format!("stock/{}", list.as_str());
        let response: MoverResponse = self.get(list_name, &endpoint, "").await?;

        let movers: Vec<Mover> = response
            .into_rows()
            .into_iter()
            .filter_map(|row| {
                Some(Mover {
                    symbol: first_non_blank([row.symbol.as_deref(), row.ticker.as_deref()])?,
                    name: first_non_blank([row.company_name.as_deref(), row.name.as_deref()]),
                    price: row.price.and_then(Quoted::value),
                    change: row.changes.and_then(Quoted::value),
                    change_percent: row.changes_percentage.and_then(Quoted::value),
                })
            })
            .collect();
        debug!("Parsed {} {} movers", movers.len(), list);
        Ok(Payload::Trends(movers))
    }
}

#[async_trait]
impl DataProvider for FmpProvider {
    fn id(&self) -> ProviderId {
        ID
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(
            operation,
            Operation::Search
                | Operation::Commissions
                | Operation::Category
                | Operation::Volatility
                | Operation::MarketCap
                | Operation::Trends
        )
    }

    #[instrument(
        name = "FmpFetch",
        skip(self, query),
        fields(symbol = %query.symbol, operation = %operation)
    )]
    async fn fetch(&self, operation: Operation, query: &Query) -> Result<Payload, ProviderError> {
        let symbol = query.symbol.as_str();
        match operation {
            Operation::Search => self.search(symbol).await,
            Operation::Commissions => self.commissions(symbol).await,
            Operation::Category => self.category(symbol).await,
            Operation::Volatility => self.volatility(symbol).await,
            Operation::MarketCap => self.market_cap(symbol).await,
            Operation::Trends => self.trends(symbol).await,
            Operation::History | Operation::AnnualReturns => Err(ProviderError::Unsupported {
                provider: ID,
                operation,
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FmpSearchResult {
    #[serde(default)]
    symbol: String,
    name: Option<String>,
    stock_exchange: Option<String>,
    exchange_short_name: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct EtfInfo {
    expense_ratio: Option<f64>,
    total_assets: Option<f64>,
    aum: Option<f64>,
    ytd: Option<f64>,
    inception_date: Option<String>,
    fund_family: Option<String>,
    etf_company: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Profile {
    category: Option<String>,
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct HistoricalPriceFull {
    #[serde(default)]
    historical: Vec<HistoricalRow>,
}

#[derive(Deserialize, Debug)]
struct HistoricalRow {
    date: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MarketCapRow {
    market_cap: Option<f64>,
}

/// Mover lists arrive bare or wrapped in a per-list key.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum MoverResponse {
    Rows(Vec<MoverRow>),
    Wrapped {
        #[serde(
            rename = "mostActiveStock",
            alias = "mostGainerStock",
            alias = "mostLoserStock"
        )]
        rows: Vec<MoverRow>,
    },
}

impl MoverResponse {
    fn into_rows(self) -> Vec<MoverRow> {
        match self {
            MoverResponse::Rows(rows) | MoverResponse::Wrapped { rows } => rows,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct MoverRow {
    symbol: Option<String>,
    ticker: Option<String>,
    company_name: Option<String>,
    name: Option<String>,
    price: Option<Quoted>,
    changes: Option<Quoted>,
    changes_percentage: Option<Quoted>,
}

/// A number, or a string such as `"(+1.25%)"`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Quoted {
    Number(f64),
    Text(String),
}

impl Quoted {
    fn value(self) -> Option<f64> {
        match self {
            Quoted::Number(v) => v.is_finite().then_some(v),
            Quoted::Text(text) => {
                parse_number(text.trim_matches(|c: char| matches!(c, '(' | ')' | '%' | '+')))
            }
        }
    }
}
