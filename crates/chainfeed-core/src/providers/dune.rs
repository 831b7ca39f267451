//! Dune analytics adapter: keyed HTTP access to saved query results.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::pacing::{PacingPolicy, RequestPacer};
use crate::provider::{
    CollectionTarget, DataProvider, MarketDataRequest, ProviderError, ProviderFuture,
};
use crate::providers::{fetch_json, frame_from_objects};
use crate::query::QuerySpec;
use crate::Frame;

const NAME: &str = "dune";
const DEFAULT_BASE_URL: &str = "https://api.dune.com/api/v1";
const API_KEY_ENV: &str = "CHAINFEED_DUNE_API_KEY";
const API_KEY_HEADER: &str = "X-Dune-API-Key";
const BOT_VOLUME_QUERY_ID: u64 = 5_745_512;
const REQUESTS_PER_MINUTE: u32 = 30;
const CACHE_TTL: Duration = Duration::from_secs(3_600);

/// Adapter for the Dune saved-query API.
///
/// Every fetch resolves a saved query id and reads its latest result
/// set. Results change slowly upstream, hence the one-hour cache TTL.
#[derive(Clone)]
pub struct DuneProvider {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    base_url: String,
    cache: ResponseCache,
    pacer: RequestPacer,
    catalog: BTreeMap<String, u64>,
}

impl DuneProvider {
    /// Production construction; the API key comes from the
    /// `CHAINFEED_DUNE_API_KEY` environment variable.
    pub fn new() -> Self {
        Self::with_http_client(
            Arc::new(ReqwestHttpClient::new()),
            std::env::var(API_KEY_ENV).ok(),
        )
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let mut catalog = BTreeMap::new();
        catalog.insert(String::from("bot_volume"), BOT_VOLUME_QUERY_ID);
        Self {
            http_client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: String::from(DEFAULT_BASE_URL),
            cache: ResponseCache::new(CACHE_TTL),
            pacer: RequestPacer::new(PacingPolicy::per_minute(REQUESTS_PER_MINUTE)),
            catalog,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Registers an additional dataset name → saved query id mapping.
    pub fn with_query(mut self, dataset: impl Into<String>, query_id: u64) -> Self {
        self.catalog.insert(dataset.into(), query_id);
        self
    }

    /// Spec for the latest results of a saved query.
    pub fn query_results(query_id: u64) -> QuerySpec {
        QuerySpec::new("query_results").with_param("query_id", query_id.to_string())
    }

    fn resolve_dataset(&self, dataset: &str) -> Result<u64, ProviderError> {
        self.catalog
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(dataset))
            .map(|(_, id)| *id)
            .ok_or_else(|| {
                ProviderError::malformed(format!("no dune query mapped for dataset {dataset}"))
            })
    }

    fn results_url(&self, spec: &QuerySpec) -> Result<String, ProviderError> {
        let query_id = spec
            .param("query_id")
            .ok_or_else(|| ProviderError::malformed("dune query spec is missing query_id"))?;

        let mut url = format!("{}/query/{}/results", self.base_url, query_id);
        let extras = spec
            .params()
            .filter(|(name, _)| *name != "query_id")
            .map(|(name, value)| {
                format!("{}={}", urlencoding::encode(name), urlencoding::encode(value))
            })
            .collect::<Vec<_>>();
        if !extras.is_empty() {
            url.push('?');
            url.push_str(&extras.join("&"));
        }
        Ok(url)
    }

    async fn fetch(&self, spec: QuerySpec) -> Result<Frame, ProviderError> {
        let fingerprint = spec.fingerprint(NAME);
        if let Some(frame) = self.cache.get(&fingerprint).await {
            debug!(key = %fingerprint, "dune: cache hit");
            return Ok(frame);
        }

        let auth = self.authenticate()?;
        let url = self.results_url(&spec)?;

        self.pacer.acquire().await?;
        let body = fetch_json(
            self.http_client.as_ref(),
            NAME,
            HttpRequest::get(url).with_auth(&auth),
        )
        .await?;
        self.pacer.record_call();

        let frame = parse_results(&body)?;
        info!(rows = frame.row_count(), endpoint = spec.endpoint(), "dune: fetched result set");
        self.cache.put(fingerprint, frame.clone(), None).await;
        Ok(frame)
    }
}

impl Default for DuneProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for DuneProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn authenticate(&self) -> Result<HttpAuth, ProviderError> {
        match &self.api_key {
            Some(key) => Ok(HttpAuth::ApiKeyHeader {
                name: String::from(API_KEY_HEADER),
                value: key.clone(),
            }),
            None => Err(ProviderError::auth(format!("{API_KEY_ENV} is not set"))),
        }
    }

    fn validate_connection(&self) -> ProviderFuture<'_, ()> {
        Box::pin(async move {
            let spec = Self::query_results(BOT_VOLUME_QUERY_ID).with_param("limit", "1");
            self.fetch(spec).await.map(|_| ())
        })
    }

    fn market_data(&self, request: MarketDataRequest) -> ProviderFuture<'_, Frame> {
        Box::pin(async move {
            // Dune serves saved analytics queries, so the symbol names a
            // dataset in the catalog; the interval is fixed by the query.
            let query_id = self.resolve_dataset(request.symbol.as_str())?;
            self.fetch(Self::query_results(query_id)).await
        })
    }

    fn fetch_raw(&self, spec: QuerySpec) -> ProviderFuture<'_, Frame> {
        Box::pin(self.fetch(spec))
    }

    fn collection_targets(&self) -> Vec<CollectionTarget> {
        self.catalog
            .iter()
            .map(|(dataset, query_id)| {
                CollectionTarget::raw(dataset.clone(), Self::query_results(*query_id))
            })
            .collect()
    }

    fn clear_cache(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.cache.clear())
    }
}

/// Pulls `result.rows` out of a Dune response body, keeping
/// `result.metadata.column_names` as the schema for empty result sets.
fn parse_results(body: &Value) -> Result<Frame, ProviderError> {
    let result = body
        .get("result")
        .ok_or_else(|| ProviderError::malformed("dune response has no result object"))?;
    let rows = result
        .get("rows")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::malformed("dune response has no result.rows array"))?;

    let column_names = result
        .get("metadata")
        .and_then(|meta| meta.get("column_names"))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    frame_from_objects(NAME, rows, &column_names)
}
