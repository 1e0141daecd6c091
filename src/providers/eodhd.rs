use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::error::ProviderError;
use crate::core::payload::{Payload, SearchHit};
use crate::core::provider::{DataProvider, Operation, ProviderId, Query};
use crate::providers::util::{first_non_blank, get_json, require_key};

const ID: ProviderId = ProviderId::Eodhd;

/// EOD Historical Data search and fundamentals.
pub struct EodhdProvider {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl EodhdProvider {
    pub fn new(base_url: &str, api_key: Option<String>, client: reqwest::Client) -> Self {
        EodhdProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn search(&self, query: &str) -> Result<Payload, ProviderError> {
        let key = require_key(ID, self.api_key.as_deref(), query)?;
        let url = format!(
            "{}/api/search/{}?api_token={}&fmt=json",
            self.base_url,
            urlencoding::encode(query),
            key
        );
        let items: Vec<SearchItem> = get_json(&self.client, ID, query, &url).await?;

        let hits: Vec<SearchHit> = items
            .into_iter()
            .filter(|item| !item.code.trim().is_empty())
            .map(|item| SearchHit {
                symbol: item.code,
                name: item.name.filter(|n| !n.is_empty()),
                exchange: item.exchange.filter(|e| !e.is_empty()),
                kind: item.kind.filter(|k| !k.is_empty()),
                sector: None,
            })
            .collect();
        debug!("EODHD search for '{}' returned {} hits", query, hits.len());
        Ok(Payload::Search(hits))
    }

    async fn category(&self, symbol: &str) -> Result<Payload, ProviderError> {
        let key = require_key(ID, self.api_key.as_deref(), symbol)?;
        let url = format!(
            "{}/api/fundamentals/{}?api_token={}&filter=General&fmt=json",
            self.base_url,
            urlencoding::encode(symbol),
            key
        );
        let general: General = get_json(&self.client, ID, symbol, &url).await?;

        first_non_blank([
            general.category.as_deref(),
            general.sector.as_deref(),
            general.industry.as_deref(),
        ])
        .map(Payload::Category)
        .ok_or(ProviderError::MissingField {
            provider: ID,
            symbol: symbol.to_string(),
            field: "Category",
        })
    }
}

#[async_trait]
impl DataProvider for EodhdProvider {
    fn id(&self) -> ProviderId {
        ID
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Search | Operation::Category)
    }

    #[instrument(
        name = "EodhdFetch",
        skip(self, query),
        fields(symbol = %query.symbol, operation = %operation)
    )]
    async fn fetch(&self, operation: Operation, query: &Query) -> Result<Payload, ProviderError> {
        match operation {
            Operation::Search => self.search(&query.symbol).await,
            Operation::Category => self.category(&query.symbol).await,
            _ => Err(ProviderError::Unsupported {
                provider: ID,
                operation,
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SearchItem {
    #[serde(rename = "Code", default)]
    code: String,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Exchange")]
    exchange: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct General {
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "Sector")]
    sector: Option<String>,
    #[serde(rename = "Industry")]
    industry: Option<String>,
}
