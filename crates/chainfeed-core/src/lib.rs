//! Core contracts for chainfeed.
//!
//! This crate contains:
//! - Canonical domain model (tabular frames, symbols, intervals, timestamps)
//! - The uniform provider contract and structured provider errors
//! - Per-provider response caching and request pacing
//! - Concrete providers (Dune analytics, Hyperliquid exchange)
//! - The provider registry with explicit health tracking

pub mod cache;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod pacing;
pub mod provider;
pub mod providers;
pub mod query;
pub mod registry;
pub mod retry;

pub use cache::ResponseCache;
pub use domain::{Frame, Interval, Symbol, UtcDateTime};
pub use error::{CoreError, ValidationError};
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};
pub use pacing::{PacingPolicy, RequestPacer};
pub use provider::{
    CollectionTarget, DataProvider, MarketDataRequest, ProviderError, ProviderErrorKind,
    ProviderFuture, TargetRequest,
};
pub use providers::{DuneProvider, HyperliquidProvider};
pub use query::{Fingerprint, QuerySpec};
pub use registry::{HealthOutcome, ProviderRegistry, ProviderState, RegistryError};
pub use retry::{Backoff, RetryPolicy};
