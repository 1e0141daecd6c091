pub mod alphavantage;
pub mod eodhd;
pub mod fmp;
pub mod util;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::provider::{DataProvider, ProviderId};
use crate::core::registry::ProviderSet;
use std::sync::Arc;
use tracing::debug;

pub use alphavantage::AlphaVantageProvider;
pub use eodhd::EodhdProvider;
pub use fmp::FmpProvider;
pub use yahoo_finance::YahooFinanceProvider;

/// Instantiates every adapter against the configured base URLs and keys.
pub fn build_provider_set(config: &AppConfig, client: reqwest::Client) -> ProviderSet {
    let providers: Vec<Arc<dyn DataProvider>> = ProviderId::ALL
        .into_iter()
        .map(|id| {
            let base_url = config.base_url(id);
            let api_key = config.api_key(id);
            debug!(
                "Configuring {} at {} (api key: {})",
                id,
                base_url,
                if api_key.is_some() { "set" } else { "none" }
            );
            let provider: Arc<dyn DataProvider> = match id {
                ProviderId::Yahoo => Arc::new(YahooFinanceProvider::new(&base_url, client.clone())),
                ProviderId::Fmp => Arc::new(FmpProvider::new(&base_url, api_key, client.clone())),
                ProviderId::AlphaVantage => Arc::new(AlphaVantageProvider::new(
                    &base_url,
                    api_key,
                    client.clone(),
                )),
                ProviderId::Eodhd => {
                    Arc::new(EodhdProvider::new(&base_url, api_key, client.clone()))
                }
            };
            provider
        })
        .collect();
    ProviderSet::new(providers)
}
