use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::http_client::HttpAuth;
use crate::query::QuerySpec;
use crate::{Frame, Interval, Symbol};

/// Boxed future returned by provider contract methods.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Provider error classification.
///
/// `Timeout` is handled identically to `Upstream` by retry policy;
/// `RateLimited` means the pacer's hard wait cap was exceeded (shorter
/// waits are absorbed locally and never surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Auth,
    RateLimited,
    Upstream,
    Timeout,
    Malformed,
}

impl ProviderErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimited => "rate_limited",
            Self::Upstream => "upstream",
            Self::Timeout => "timeout",
            Self::Malformed => "malformed",
        }
    }
}

impl Display for ProviderErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured provider error surfaced through the uniform contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    retryable: bool,
}

impl ProviderError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Auth,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::RateLimited,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Upstream,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            ProviderErrorKind::Auth => "provider.auth",
            ProviderErrorKind::RateLimited => "provider.rate_limited",
            ProviderErrorKind::Upstream => "provider.upstream",
            ProviderErrorKind::Timeout => "provider.timeout",
            ProviderErrorKind::Malformed => "provider.malformed",
        }
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for ProviderError {}

/// Request payload for the market-data capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDataRequest {
    pub symbol: Symbol,
    pub interval: Interval,
}

impl MarketDataRequest {
    pub fn new(symbol: Symbol, interval: Interval) -> Self {
        Self { symbol, interval }
    }
}

/// The concrete request behind a collection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRequest {
    MarketData(MarketDataRequest),
    Raw(QuerySpec),
}

/// One dataset a provider contributes to a collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub dataset: String,
    pub request: TargetRequest,
}

impl CollectionTarget {
    pub fn market_data(dataset: impl Into<String>, request: MarketDataRequest) -> Self {
        Self {
            dataset: dataset.into(),
            request: TargetRequest::MarketData(request),
        }
    }

    pub fn raw(dataset: impl Into<String>, spec: QuerySpec) -> Self {
        Self {
            dataset: dataset.into(),
            request: TargetRequest::Raw(spec),
        }
    }
}

/// Uniform provider contract.
///
/// Callers interact only through this trait; provider-specific auth
/// schemes and response shapes stay behind it. `fetch_raw` and
/// `market_data` must consult the provider's own cache and pacer
/// before any network call.
pub trait DataProvider: Send + Sync {
    /// Stable identifier; registry key and `{source}` file segment.
    fn name(&self) -> &str;

    /// Builds the provider's auth material. A required secret that is
    /// absent yields an auth error here rather than a degraded
    /// unauthenticated call later.
    fn authenticate(&self) -> Result<HttpAuth, ProviderError>;

    /// Minimal authenticated (or public) round trip.
    fn validate_connection(&self) -> ProviderFuture<'_, ()>;

    /// Normalized candle data for a symbol and interval.
    fn market_data(&self, request: MarketDataRequest) -> ProviderFuture<'_, Frame>;

    /// Executes an arbitrary logical query against this provider.
    fn fetch_raw(&self, spec: QuerySpec) -> ProviderFuture<'_, Frame>;

    /// Datasets this provider contributes to a default collection
    /// cycle.
    fn collection_targets(&self) -> Vec<CollectionTarget>;

    /// Evicts every cached response. Pacing state is untouched.
    fn clear_cache(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl std::fmt::Debug for dyn DataProvider + '_ {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("name", &self.name())
            .finish()
    }
}
