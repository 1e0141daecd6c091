//! Builds per-symbol fund records out of independently dispatched fields

use crate::core::dispatcher::{Dispatcher, Resolved};
use crate::core::error::{PartialDataError, ResolveError};
use crate::core::metrics::{self, StarRating};
use crate::core::payload::{
    AnnualReturns, Commissions, MarketCap, Mover, Payload, SearchHit, TrendList,
};
use crate::core::provider::ProviderId;
use crate::core::request::{Action, Field};
use crate::core::series::RawSeries;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Order in which a report dispatches its fields.
pub const REPORT_FIELDS: [Field; 6] = [
    Field::HistoricalProfit,
    Field::AnnualVolatility,
    Field::MarketCap,
    Field::CategorySector,
    Field::Commissions,
    Field::AnnualReturns,
];

/// Comparison row for one symbol. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub volatility: Option<f64>,
    pub commissions: Option<Commissions>,
    pub market_cap: Option<MarketCap>,
    pub total_return: Option<f64>,
    pub growth_last_year: Option<f64>,
    pub cagr_5y: Option<f64>,
    pub rating: StarRating,
}

/// Record plus the raw data and per-field failures behind it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundReport {
    pub record: FundRecord,
    #[serde(skip)]
    pub series: Option<RawSeries>,
    pub annual_returns: Option<AnnualReturns>,
    pub sources: BTreeMap<Field, ProviderId>,
    pub failures: BTreeMap<Field, String>,
}

impl FundReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn partial_error(&self) -> Option<PartialDataError> {
        (!self.failures.is_empty()).then(|| PartialDataError {
            symbol: self.record.symbol.clone(),
            failures: self.failures.clone(),
        })
    }

    fn apply(&mut self, field: Field, resolved: Resolved) -> Result<(), String> {
        if resolved.is_empty() {
            return Err(format!("{} returned no data", resolved.provider));
        }
        let provider = resolved.provider;
        let kind = resolved.payload.kind();
        let record = &mut self.record;

        let applied = match (field, resolved.payload) {
            (Field::HistoricalProfit, Payload::History(history)) => {
                record.name = record.name.take().or(history.name);
                record.currency = history.currency;
                record.price = history.series.last().map(|(_, price)| price);
                self.series = Some(history.series);
                true
            }
            (Field::AnnualVolatility, payload @ Payload::Volatility(_)) => {
                record.volatility = payload.as_volatility();
                true
            }
            (Field::MarketCap, Payload::MarketCap(cap)) => {
                record.market_cap = Some(cap);
                true
            }
            (Field::CategorySector, Payload::Category(category)) => {
                record.category = Some(category.trim().to_string());
                true
            }
            (Field::Commissions, Payload::Commissions(commissions)) => {
                record.commissions = Some(commissions);
                true
            }
            (Field::AnnualReturns, Payload::AnnualReturns(returns)) => {
                self.annual_returns = Some(returns);
                true
            }
            _ => false,
        };

        if !applied {
            return Err(format!("{provider} returned an unexpected {kind} payload"));
        }
        self.sources.insert(field, provider);
        Ok(())
    }

    fn derive_metrics(&mut self, today: NaiveDate) {
        let record = &mut self.record;
        if let Some(series) = &self.series {
            record.total_return = metrics::total_return(series);
            record.growth_last_year = metrics::growth_last_year(series, today);
            record.cagr_5y = metrics::cagr_5y(series, today);
        }
        record.rating = StarRating::rate(record.total_return, record.volatility);
    }
}

/// Dispatches every report field for `symbol` in turn. Field failures are
/// collected on the report and never abort the remaining fields.
pub async fn build_report(dispatcher: &Dispatcher, symbol: &str, today: NaiveDate) -> FundReport {
    let mut report = FundReport {
        record: FundRecord {
            symbol: symbol.to_string(),
            ..Default::default()
        },
        ..Default::default()
    };

    for field in REPORT_FIELDS {
        let outcome = dispatcher
            .resolve(Action::Compare, symbol, Some(field))
            .await
            .map_err(|err| err.to_string())
            .and_then(|resolved| report.apply(field, resolved));

        if let Err(reason) = outcome {
            debug!("{} unavailable for {}: {}", field, symbol, reason);
            report.failures.insert(field, reason);
        }
    }

    report.derive_metrics(today);
    info!(
        "Built report for {} ({} of {} fields)",
        symbol,
        REPORT_FIELDS.len() - report.failures.len(),
        REPORT_FIELDS.len()
    );
    report
}

/// Reports for several symbols, fetched concurrently, in input order.
pub async fn compare(
    dispatcher: &Dispatcher,
    symbols: &[String],
    today: NaiveDate,
) -> Vec<FundReport> {
    compare_with_progress(dispatcher, symbols, today, &|| ()).await
}

/// Same as [`compare`], calling `on_report` as each report completes.
pub async fn compare_with_progress(
    dispatcher: &Dispatcher,
    symbols: &[String],
    today: NaiveDate,
    on_report: &(dyn Fn() + Sync),
) -> Vec<FundReport> {
    join_all(symbols.iter().map(|symbol| async move {
        let report = build_report(dispatcher, symbol, today).await;
        on_report();
        report
    }))
    .await
}

/// Search hits for `query`; an empty list means nothing matched.
pub async fn search(
    dispatcher: &Dispatcher,
    query: &str,
) -> Result<Vec<SearchHit>, ResolveError> {
    let resolved = dispatcher.resolve(Action::Search, query, None).await?;
    Ok(resolved.payload.into_search().unwrap_or_default())
}

/// Today's movers on `list`; an empty list means the provider had none.
pub async fn trends(
    dispatcher: &Dispatcher,
    list: TrendList,
) -> Result<Vec<Mover>, ResolveError> {
    let resolved = dispatcher.resolve(Action::Trends, list.as_str(), None).await?;
    Ok(resolved.payload.into_trends().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::testing::{Script, ScriptedProvider};
    use crate::core::error::ProviderError;
    use crate::core::provider::{DataProvider, Operation};
    use crate::core::registry::Registry;
    use crate::core::request::RequestKey;
    use crate::core::series::PriceHistory;
    use std::sync::Arc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn history() -> Payload {
        Payload::History(PriceHistory {
            name: Some("Vanguard Total Stock Market ETF".to_string()),
            currency: Some("USD".to_string()),
            series: RawSeries::new(
                vec![d(2019, 6, 28), d(2023, 6, 30), d(2024, 6, 28)],
                vec![100.0, 110.0, 121.0],
            )
            .unwrap(),
        })
    }

    fn dispatcher_for(provider: Arc<ScriptedProvider>) -> Dispatcher {
        let mut builder = Registry::builder()
            .route(RequestKey::search(), provider.clone(), None)
            .unwrap()
            .route(RequestKey::trends(), provider.clone(), None)
            .unwrap();
        for field in Field::ALL {
            builder = builder
                .route(
                    RequestKey::compare(field),
                    provider.clone() as Arc<dyn DataProvider>,
                    None,
                )
                .unwrap();
        }
        Dispatcher::new(Arc::new(builder.build()))
    }

    #[tokio::test]
    async fn test_partial_report_collects_failures() {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderId::Yahoo)
                .on(Operation::History, "VTI", Script::Respond(history()))
                .on(Operation::Volatility, "VTI", Script::Respond(Payload::Volatility(0.2)))
                .on(
                    Operation::Category,
                    "VTI",
                    Script::Respond(Payload::Category("Large Blend".to_string())),
                )
                .on(
                    Operation::MarketCap,
                    "VTI",
                    Script::Fail(ProviderError::Status {
                        provider: ProviderId::Yahoo,
                        symbol: "VTI".to_string(),
                        status: 502,
                    }),
                ),
        );
        let dispatcher = dispatcher_for(provider.clone());

        let report = build_report(&dispatcher, "VTI", d(2024, 6, 30)).await;
        let record = &report.record;

        assert_eq!(provider.calls(), REPORT_FIELDS.len());
        assert_eq!(record.price, Some(121.0));
        assert_eq!(record.category.as_deref(), Some("Large Blend"));
        assert!((record.total_return.unwrap() - 0.21).abs() < 1e-12);
        assert!((record.growth_last_year.unwrap() - 0.1).abs() < 1e-12);
        assert!(record.cagr_5y.is_some());
        // 0.21 / 0.2 * 100 = 105
        assert_eq!(record.rating.stars(), 4);

        let failed: Vec<_> = report.failures.keys().copied().collect();
        assert_eq!(
            failed,
            vec![Field::Commissions, Field::MarketCap, Field::AnnualReturns]
        );
        let partial = report.partial_error().unwrap();
        assert_eq!(partial.symbol, "VTI");
        assert_eq!(report.sources[&Field::HistoricalProfit], ProviderId::Yahoo);
    }

    #[tokio::test]
    async fn test_report_without_history_has_zero_stars() {
        let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo).on(
            Operation::Volatility,
            "ZZZZ",
            Script::Respond(Payload::Volatility(0.3)),
        ));
        let dispatcher = dispatcher_for(provider);

        let report = build_report(&dispatcher, "ZZZZ", d(2024, 6, 30)).await;
        assert_eq!(report.record.rating.stars(), 0);
        assert!(report.failures.contains_key(&Field::HistoricalProfit));
        assert_eq!(report.record.volatility, Some(0.3));
    }

    #[tokio::test]
    async fn test_compare_keeps_input_order() {
        let provider = Arc::new(
            ScriptedProvider::new(ProviderId::Yahoo)
                .on(Operation::History, "VTI", Script::Respond(history()))
                .on(Operation::History, "VOO", Script::Respond(history())),
        );
        let dispatcher = dispatcher_for(provider);
        let symbols = vec!["VOO".to_string(), "VTI".to_string(), "BAD".to_string()];

        let reports = compare(&dispatcher, &symbols, d(2024, 6, 30)).await;
        let order: Vec<_> = reports.iter().map(|r| r.record.symbol.as_str()).collect();
        assert_eq!(order, vec!["VOO", "VTI", "BAD"]);
        assert_eq!(reports[2].failures.len(), REPORT_FIELDS.len());

        let done = std::sync::atomic::AtomicUsize::new(0);
        let reports = compare_with_progress(&dispatcher, &symbols, d(2024, 6, 30), &|| {
            done.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        })
        .await;
        assert_eq!(reports.len(), 3);
        assert_eq!(done.into_inner(), 3);
    }

    #[tokio::test]
    async fn test_search_returns_hits() {
        let hit = SearchHit {
            symbol: "VTI".to_string(),
            name: Some("Vanguard Total Stock Market ETF".to_string()),
            ..Default::default()
        };
        let provider = Arc::new(ScriptedProvider::new(ProviderId::Yahoo).on(
            Operation::Search,
            "vanguard",
            Script::Respond(Payload::Search(vec![hit.clone()])),
        ));
        let dispatcher = dispatcher_for(provider);

        assert_eq!(search(&dispatcher, "vanguard").await.unwrap(), vec![hit]);
        assert!(search(&dispatcher, "nothing").await.is_err());
    }

    #[tokio::test]
    async fn test_trends_resolve_by_list_name() {
        let mover = Mover {
            symbol: "NVDA".to_string(),
            price: Some(123.5),
            change_percent: Some(2.1),
            ..Default::default()
        };
        let provider = Arc::new(ScriptedProvider::new(ProviderId::Fmp).on(
            Operation::Trends,
            "gainers",
            Script::Respond(Payload::Trends(vec![mover.clone()])),
        ));
        let dispatcher = dispatcher_for(provider.clone());

        let movers = trends(&dispatcher, TrendList::Gainers).await.unwrap();
        assert_eq!(movers, vec![mover]);

        let err = trends(&dispatcher, TrendList::Losers).await.unwrap_err();
        assert!(matches!(err, ResolveError::NoBackup { .. }));
        assert_eq!(provider.calls(), 2);
    }
}
