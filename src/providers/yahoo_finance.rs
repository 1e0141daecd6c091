use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::error::ProviderError;
use crate::core::metrics;
use crate::core::payload::{MarketCap, Payload, SearchHit};
use crate::core::provider::{DataProvider, Operation, ProviderId, Query, Timeframe};
use crate::core::series::{Bar, PriceHistory, RawSeries};
use crate::providers::util::{first_non_blank, get_json};

const ID: ProviderId = ProviderId::Yahoo;

/// Yahoo Finance chart, search and quote summary endpoints.
pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn chart(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<PriceHistory, ProviderError> {
        let url = format!(
            "{}/v8/finance/chart/{}?interval=1d&range={}",
            self.base_url,
            urlencoding::encode(symbol),
            timeframe.as_range()
        );
        let data: ChartResponse = get_json(&self.client, ID, symbol, &url).await?;

        if let Some(error) = data.chart.error {
            return Err(ProviderError::Rejected {
                provider: ID,
                symbol: symbol.to_string(),
                message: error.description.unwrap_or(error.code),
            });
        }

        let Some(item) = data.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(PriceHistory::default());
        };
        Ok(item.into_history())
    }

    async fn search(&self, query: &str) -> Result<Payload, ProviderError> {
        let url = format!(
            "{}/v1/finance/search?q={}&quotesCount=10&newsCount=0",
            self.base_url,
            urlencoding::encode(query)
        );
        let data: SearchResponse = get_json(&self.client, ID, query, &url).await?;

        let hits = data
            .quotes
            .into_iter()
            .filter_map(|quote| {
                let symbol = quote.symbol.filter(|s| !s.is_empty())?;
                Some(SearchHit {
                    symbol,
                    name: first_non_blank([quote.longname.as_deref(), quote.shortname.as_deref()]),
                    exchange: quote.exch_disp.or(quote.exchange),
                    kind: quote.quote_type,
                    sector: quote.sector,
                })
            })
            .collect();
        Ok(Payload::Search(hits))
    }

    async fn quote_summary(
        &self,
        symbol: &str,
        modules: &str,
    ) -> Result<Option<SummaryResult>, ProviderError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url,
            urlencoding::encode(symbol),
            modules
        );
        let data: QuoteSummaryResponse = get_json(&self.client, ID, symbol, &url).await?;
        Ok(data
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next()))
    }

    async fn category(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let summary = self
            .quote_summary(symbol, "assetProfile,fundProfile")
            .await?
            .ok_or_else(|| ProviderError::NoData {
                provider: ID,
                symbol: symbol.to_string(),
            })?;

        let fund_category = summary.fund_profile.and_then(|p| p.category_name);
        let (sector, industry) = summary
            .asset_profile
            .map(|p| (p.sector, p.industry))
            .unwrap_or_default();

        first_non_blank([
            fund_category.as_deref(),
            sector.as_deref(),
            industry.as_deref(),
        ])
        .map(Payload::Category)
        .ok_or_else(|| ProviderError::MissingField {
            provider: ID,
            symbol: symbol.to_string(),
            field: "categoryName",
        })
    }

    async fn market_cap(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let cap = self
            .quote_summary(symbol, "price")
            .await?
            .and_then(|s| s.price)
            .and_then(|p| p.market_cap)
            .and_then(|v| v.raw);

        Ok(match cap {
            Some(value) => Payload::MarketCap(MarketCap::new(value)),
            None => Payload::empty(Operation::MarketCap),
        })
    }
}

#[async_trait]
impl DataProvider for YahooFinanceProvider {
    fn id(&self) -> ProviderId {
        ID
    }

    fn supports(&self, operation: Operation) -> bool {
        !matches!(operation, Operation::Commissions | Operation::Trends)
    }

    #[instrument(
        name = "YahooFetch",
        skip(self, query),
        fields(symbol = %query.symbol, operation = %operation)
    )]
    async fn fetch(&self, operation: Operation, query: &Query) -> Result<Payload, ProviderError> {
        let symbol = query.symbol.as_str();
        match operation {
            Operation::Search => self.search(symbol).await,
            Operation::History => self
                .chart(symbol, query.timeframe)
                .await
                .map(Payload::History),
            Operation::Volatility => {
                let history = self.chart(symbol, Timeframe::OneYear).await?;
                let volatility = metrics::trailing_volatility(&history.series);
                debug!("Computed volatility {:?} from {} points", volatility, history.series.len());
                Ok(volatility.map_or(Payload::empty(operation), Payload::Volatility))
            }
            Operation::AnnualReturns => {
                let history = self.chart(symbol, Timeframe::Max).await?;
                Ok(Payload::AnnualReturns(metrics::annual_returns(&history.series)))
            }
            Operation::Category => self.category(symbol).await,
            Operation::MarketCap => self.market_cap(symbol).await,
            Operation::Commissions | Operation::Trends => Err(ProviderError::Unsupported {
                provider: ID,
                operation,
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    currency: Option<String>,
    #[serde(alias = "longName")]
    long_name: Option<String>,
    #[serde(alias = "shortName")]
    short_name: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartItem {
    fn into_history(self) -> PriceHistory {
        let timestamps = self.timestamp.unwrap_or_default();
        let columns = self
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .unwrap_or_default();
        let offset = self.meta.gmtoffset;

        // Bars without a close (holidays, halted sessions) are skipped.
        let bars = timestamps.iter().enumerate().filter_map(|(i, ts)| {
            let close = columns.close.get(i).copied().flatten()?;
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(Bar {
                date,
                close,
                open: columns.open.get(i).copied().flatten(),
                high: columns.high.get(i).copied().flatten(),
                low: columns.low.get(i).copied().flatten(),
                volume: columns.volume.get(i).copied().flatten(),
            })
        });

        PriceHistory {
            name: first_non_blank([
                self.meta.long_name.as_deref(),
                self.meta.short_name.as_deref(),
            ]),
            currency: self.meta.currency,
            series: RawSeries::from_bars(bars),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Deserialize, Debug)]
struct SearchQuote {
    symbol: Option<String>,
    shortname: Option<String>,
    longname: Option<String>,
    exchange: Option<String>,
    #[serde(alias = "exchDisp")]
    exch_disp: Option<String>,
    #[serde(alias = "quoteType")]
    quote_type: Option<String>,
    sector: Option<String>,
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(alias = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Deserialize, Debug)]
struct QuoteSummary {
    result: Option<Vec<SummaryResult>>,
}

#[derive(Deserialize, Debug)]
struct SummaryResult {
    #[serde(alias = "assetProfile")]
    asset_profile: Option<AssetProfile>,
    #[serde(alias = "fundProfile")]
    fund_profile: Option<FundProfile>,
    price: Option<PriceModule>,
}

#[derive(Deserialize, Debug)]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FundProfile {
    #[serde(alias = "categoryName")]
    category_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct PriceModule {
    #[serde(alias = "marketCap")]
    market_cap: Option<RawValue>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}`.
#[derive(Deserialize, Debug)]
struct RawValue {
    raw: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(
        request_path: &str,
        status: u16,
        mock_response: &str,
    ) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> YahooFinanceProvider {
        YahooFinanceProvider::new(&server.uri(), reqwest::Client::new())
    }

    // 2024-01-02, 2024-01-03, 2024-01-04 14:30 UTC
    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "USD",
                    "longName": "Vanguard Total Stock Market Index Fund ETF",
                    "shortName": "Vanguard Total Stock Market",
                    "regularMarketPrice": 236.2,
                    "gmtoffset": -18000
                },
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open": [229.1, 231.0, null],
                        "close": [230.0, 232.5, null],
                        "volume": [3100000, 2900000, null]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[tokio::test]
    async fn test_history_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/VTI"))
            .and(query_param("range", "5y"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHART))
            .mount(&mock_server)
            .await;

        let query = Query::new("VTI").with_timeframe(Timeframe::FiveYears);
        let payload = provider(&mock_server)
            .fetch(Operation::History, &query)
            .await
            .unwrap();
        let history = payload.into_history().unwrap();

        assert_eq!(history.currency.as_deref(), Some("USD"));
        assert_eq!(
            history.name.as_deref(),
            Some("Vanguard Total Stock Market Index Fund ETF")
        );
        assert_eq!(history.series.len(), 2);
        assert_eq!(
            history.series.first(),
            Some((NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 230.0))
        );
        let ohlcv = history.series.ohlcv().unwrap();
        assert_eq!(ohlcv.volume, vec![Some(3_100_000), Some(2_900_000)]);
    }

    #[tokio::test]
    async fn test_empty_chart_is_empty_payload() {
        let mock_server = create_mock_server(
            "/v8/finance/chart/NONE",
            200,
            r#"{"chart": {"result": [], "error": null}}"#,
        )
        .await;

        let payload = provider(&mock_server)
            .fetch(Operation::History, &Query::new("NONE"))
            .await
            .unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_symbol_maps_to_status_error() {
        let mock_server = create_mock_server(
            "/v8/finance/chart/ZZZZ",
            404,
            r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#,
        )
        .await;

        let err = provider(&mock_server)
            .fetch(Operation::History, &Query::new("ZZZZ"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Status {
                provider: ProviderId::Yahoo,
                symbol: "ZZZZ".to_string(),
                status: 404
            }
        );
    }

    #[tokio::test]
    async fn test_volatility_uses_one_year_chart() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/VTI"))
            .and(query_param("range", "1y"))
            .respond_with(ResponseTemplate::new(200).set_body_string(CHART))
            .expect(1)
            .mount(&mock_server)
            .await;

        let payload = provider(&mock_server)
            .fetch(Operation::Volatility, &Query::new("VTI"))
            .await
            .unwrap();
        // Two closes give one return, so no dispersion yet.
        assert_eq!(payload, Payload::Volatility(0.0));
    }

    #[tokio::test]
    async fn test_search_skips_quotes_without_symbol() {
        let body = r#"{
            "quotes": [
                {"symbol": "VTI", "shortname": "Vanguard Total Stock Market", "longname": "Vanguard Total Stock Market Index Fund ETF", "exchange": "PCX", "exchDisp": "NYSEArca", "quoteType": "ETF"},
                {"shortname": "news item"},
                {"symbol": "VTSAX", "shortname": "Vanguard Total Stock Mkt Idx Adm", "exchange": "NAS", "quoteType": "MUTUALFUND"}
            ],
            "news": []
        }"#;
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "vanguard total"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let hits = provider(&mock_server)
            .fetch(Operation::Search, &Query::new("vanguard total"))
            .await
            .unwrap()
            .into_search()
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].symbol, "VTI");
        assert_eq!(hits[0].exchange.as_deref(), Some("NYSEArca"));
        assert_eq!(hits[0].kind.as_deref(), Some("ETF"));
        assert_eq!(hits[1].name.as_deref(), Some("Vanguard Total Stock Mkt Idx Adm"));
    }

    #[tokio::test]
    async fn test_category_prefers_fund_category_then_sector() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/VTI"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteSummary": {"result": [{"fundProfile": {"categoryName": "Large Blend"}, "assetProfile": {"sector": "Financial"}}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteSummary": {"result": [{"assetProfile": {"sector": "Technology", "industry": "Consumer Electronics"}}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/BARE"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteSummary": {"result": [{"assetProfile": {}}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;

        let yahoo = provider(&mock_server);

        let fund = yahoo
            .fetch(Operation::Category, &Query::new("VTI"))
            .await
            .unwrap();
        assert_eq!(fund, Payload::Category("Large Blend".to_string()));

        let stock = yahoo
            .fetch(Operation::Category, &Query::new("AAPL"))
            .await
            .unwrap();
        assert_eq!(stock, Payload::Category("Technology".to_string()));

        let err = yahoo
            .fetch(Operation::Category, &Query::new("BARE"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingField { .. }));
    }

    #[tokio::test]
    async fn test_market_cap() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/AAPL"))
            .and(query_param("modules", "price"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"quoteSummary": {"result": [{"price": {"marketCap": {"raw": 2950000000000, "fmt": "2.95T"}}}], "error": null}}"#,
            ))
            .mount(&mock_server)
            .await;

        let payload = provider(&mock_server)
            .fetch(Operation::MarketCap, &Query::new("AAPL"))
            .await
            .unwrap();
        assert_eq!(payload.into_market_cap().unwrap().formatted, "2.95T");
    }

    #[tokio::test]
    async fn test_commissions_unsupported() {
        let mock_server = MockServer::start().await;
        let yahoo = provider(&mock_server);
        assert!(!yahoo.supports(Operation::Commissions));
        assert!(!yahoo.supports(Operation::Trends));
        assert!(yahoo.supports(Operation::AnnualReturns));
    }
}
