//! Core business logic abstractions

pub mod aggregate;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod metrics;
pub mod payload;
pub mod provider;
pub mod registry;
pub mod request;
pub mod series;

// Re-export main types for cleaner imports
pub use aggregate::{FundRecord, FundReport, build_report, compare, compare_with_progress, search};
pub use dispatcher::{Dispatcher, Resolved};
pub use error::{PartialDataError, ProviderError, RegistryError, ResolveError, SeriesError};
pub use payload::{AnnualReturns, Commissions, MarketCap, Payload, SearchHit};
pub use provider::{DataProvider, Operation, ProviderEndpoint, ProviderId, Query, Timeframe};
pub use registry::{ProviderSet, Registry, RegistryBuilder, ResolutionEntry, Route};
pub use request::{Action, Field, RequestKey};
pub use series::{Bar, PriceHistory, RawSeries};
