//! Route table mapping request keys to ordered provider endpoints

use crate::core::error::{RegistryError, ResolveError};
use crate::core::provider::{DataProvider, Operation, ProviderEndpoint, ProviderId};
use crate::core::request::{Field, RequestKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Adapters available to the registry, one per provider id.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderId, Arc<dyn DataProvider>>,
}

impl ProviderSet {
    pub fn new(providers: Vec<Arc<dyn DataProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|provider| (provider.id(), provider))
            .collect();
        Self { providers }
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn DataProvider>> {
        self.providers.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.providers.keys().copied().collect();
        ids.sort();
        ids
    }
}

/// Provider ids making up one route. Deserialized from the `routes` config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub primary: ProviderId,
    #[serde(default)]
    pub backup: Option<ProviderId>,
}

impl Route {
    pub const fn new(primary: ProviderId, backup: Option<ProviderId>) -> Self {
        Self { primary, backup }
    }
}

/// Built-in routes.
pub const STANDARD_ROUTES: [(RequestKey, Route); 8] = [
    (
        RequestKey::search(),
        Route::new(ProviderId::Yahoo, Some(ProviderId::Eodhd)),
    ),
    (
        RequestKey::compare(Field::HistoricalProfit),
        Route::new(ProviderId::Yahoo, Some(ProviderId::AlphaVantage)),
    ),
    (
        RequestKey::compare(Field::AnnualVolatility),
        Route::new(ProviderId::Yahoo, Some(ProviderId::Fmp)),
    ),
    (
        RequestKey::compare(Field::Commissions),
        Route::new(ProviderId::Fmp, None),
    ),
    (
        RequestKey::compare(Field::CategorySector),
        Route::new(ProviderId::Fmp, Some(ProviderId::Yahoo)),
    ),
    (
        RequestKey::compare(Field::MarketCap),
        Route::new(ProviderId::Yahoo, Some(ProviderId::Fmp)),
    ),
    (
        RequestKey::compare(Field::AnnualReturns),
        Route::new(ProviderId::Yahoo, Some(ProviderId::AlphaVantage)),
    ),
    (RequestKey::trends(), Route::new(ProviderId::Fmp, None)),
];

/// Primary endpoint and optional backup for one request key.
#[derive(Debug, Clone)]
pub struct ResolutionEntry {
    pub primary: ProviderEndpoint,
    pub backup: Option<ProviderEndpoint>,
}

/// Immutable lookup table from request key to resolution entry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<RequestKey, ResolutionEntry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with every built-in route.
    pub fn standard(providers: &ProviderSet) -> Result<Self, RegistryError> {
        Self::with_overrides(providers, &BTreeMap::new())
    }

    /// Built-in routes with `overrides` replacing the route of a field.
    pub fn with_overrides(
        providers: &ProviderSet,
        overrides: &BTreeMap<Field, Route>,
    ) -> Result<Self, RegistryError> {
        let mut builder = Self::builder();
        for (key, route) in STANDARD_ROUTES {
            let route = key
                .field
                .and_then(|field| overrides.get(&field))
                .copied()
                .unwrap_or(route);
            builder = builder.route_ids(providers, key, route)?;
        }
        Ok(builder.build())
    }

    /// Entry for `key`, or a configuration error naming it.
    pub fn lookup(&self, key: RequestKey) -> Result<&ResolutionEntry, ResolveError> {
        self.entries
            .get(&key)
            .ok_or_else(|| ResolveError::Configuration {
                action: key.action.to_string(),
                field: key.field_name(),
            })
    }

    pub fn contains(&self, key: RequestKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Keys from `required` that have no entry.
    pub fn missing(&self, required: &[RequestKey]) -> Vec<RequestKey> {
        required
            .iter()
            .filter(|key| !self.contains(**key))
            .copied()
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = RequestKey> + '_ {
        self.entries.keys().copied()
    }
}

/// Collects routes before freezing them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<RequestKey, ResolutionEntry>,
}

impl RegistryBuilder {
    /// Registers `primary` and `backup` for `key`, replacing any earlier
    /// route. Providers must support the operation behind the key.
    pub fn route(
        mut self,
        key: RequestKey,
        primary: Arc<dyn DataProvider>,
        backup: Option<Arc<dyn DataProvider>>,
    ) -> Result<Self, RegistryError> {
        let operation =
            Operation::for_key(key).ok_or(RegistryError::MalformedKey { key })?;

        let primary = bind(key, primary, operation)?;
        let backup = backup
            .map(|provider| bind(key, provider, operation))
            .transpose()?;

        self.entries
            .insert(key, ResolutionEntry { primary, backup });
        Ok(self)
    }

    /// Same as [`RegistryBuilder::route`] with providers looked up by id.
    pub fn route_ids(
        self,
        providers: &ProviderSet,
        key: RequestKey,
        route: Route,
    ) -> Result<Self, RegistryError> {
        let find = |id: ProviderId| {
            providers
                .get(id)
                .ok_or(RegistryError::UnknownProvider { provider: id })
        };
        let primary = find(route.primary)?;
        let backup = route.backup.map(find).transpose()?;
        self.route(key, primary, backup)
    }

    pub fn build(self) -> Registry {
        Registry {
            entries: self.entries,
        }
    }
}

fn bind(
    key: RequestKey,
    provider: Arc<dyn DataProvider>,
    operation: Operation,
) -> Result<ProviderEndpoint, RegistryError> {
    let id = provider.id();
    ProviderEndpoint::new(provider, operation).map_err(|_| RegistryError::Unsupported {
        key,
        provider: id,
        operation,
    })
}
