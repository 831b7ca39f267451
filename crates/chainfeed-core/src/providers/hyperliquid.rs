//! Hyperliquid exchange adapter: public perpetuals data over POST /info.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::http_client::{HttpAuth, HttpClient, HttpRequest, ReqwestHttpClient};
use crate::pacing::{PacingPolicy, RequestPacer};
use crate::provider::{
    CollectionTarget, DataProvider, MarketDataRequest, ProviderError, ProviderFuture,
};
use crate::providers::{fetch_json, frame_from_objects};
use crate::query::QuerySpec;
use crate::{Frame, Interval, Symbol, UtcDateTime};

const NAME: &str = "hyperliquid";
const DEFAULT_BASE_URL: &str = "https://api.hyperliquid.xyz";
const REQUESTS_PER_MINUTE: u32 = 100;
const CACHE_TTL: Duration = Duration::from_secs(60);
const CANDLE_WINDOW: Duration = Duration::from_secs(24 * 3_600);
const TRADES_LIMIT: usize = 100;

const CANDLE_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Adapter for the public Hyperliquid info API.
///
/// Everything is served from a single POST `/info` endpoint whose body
/// selects the dataset. No secret is required; public access is the
/// documented capability.
#[derive(Clone)]
pub struct HyperliquidProvider {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    cache: ResponseCache,
    pacer: RequestPacer,
    symbols: Vec<Symbol>,
    interval: Interval,
}

impl HyperliquidProvider {
    pub fn new() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(DEFAULT_BASE_URL),
            cache: ResponseCache::new(CACHE_TTL),
            pacer: RequestPacer::new(PacingPolicy::per_minute(REQUESTS_PER_MINUTE)),
            symbols: default_symbols(),
            interval: Interval::OneHour,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the default ETH/BTC collection symbols.
    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    /// Candle interval used by the default collection targets.
    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn candle_snapshot(symbol: &Symbol, interval: Interval) -> QuerySpec {
        QuerySpec::new("candle_snapshot")
            .with_param("coin", symbol.as_str())
            .with_param("interval", interval.as_str())
    }

    pub fn funding(symbol: &Symbol) -> QuerySpec {
        QuerySpec::new("funding").with_param("coin", symbol.as_str())
    }

    pub fn recent_trades(symbol: &Symbol) -> QuerySpec {
        QuerySpec::new("recent_trades").with_param("coin", symbol.as_str())
    }

    pub fn meta() -> QuerySpec {
        QuerySpec::new("meta")
    }

    fn info_body(spec: &QuerySpec) -> Result<Value, ProviderError> {
        let coin = |spec: &QuerySpec| {
            spec.param("coin").map(str::to_owned).ok_or_else(|| {
                ProviderError::malformed(format!(
                    "hyperliquid {} spec is missing coin",
                    spec.endpoint()
                ))
            })
        };

        match spec.endpoint() {
            "candle_snapshot" => {
                let interval = spec.param("interval").unwrap_or("1h");
                let start = UtcDateTime::now().saturating_sub(CANDLE_WINDOW).unix_millis();
                Ok(json!({
                    "type": "candleSnapshot",
                    "req": {"coin": coin(spec)?, "interval": interval, "startTime": start}
                }))
            }
            "funding" => Ok(json!({"type": "funding", "coin": coin(spec)?})),
            "recent_trades" => Ok(json!({"type": "recentTrades", "coin": coin(spec)?})),
            "meta" => Ok(json!({"type": "meta"})),
            other => Err(ProviderError::malformed(format!(
                "hyperliquid has no endpoint {other}"
            ))),
        }
    }

    /// Some info responses are bare arrays, some wrap the payload in a
    /// `data` field.
    fn unwrap_rows(body: Value) -> Vec<Value> {
        match body {
            Value::Array(rows) => rows,
            Value::Object(mut object) => match object.remove("data") {
                Some(Value::Array(rows)) => rows,
                Some(other) => vec![other],
                None => vec![Value::Object(object)],
            },
            other => vec![other],
        }
    }

    async fn fetch(&self, spec: QuerySpec) -> Result<Frame, ProviderError> {
        let fingerprint = spec.fingerprint(NAME);
        if let Some(frame) = self.cache.get(&fingerprint).await {
            debug!(key = %fingerprint, "hyperliquid: cache hit");
            return Ok(frame);
        }

        let body = Self::info_body(&spec)?;
        self.pacer.acquire().await?;
        let response = fetch_json(
            self.http_client.as_ref(),
            NAME,
            HttpRequest::post_json(format!("{}/info", self.base_url), &body),
        )
        .await?;
        self.pacer.record_call();

        let frame = self.normalize(&spec, response)?;
        info!(rows = frame.row_count(), endpoint = spec.endpoint(), "hyperliquid: fetched");
        self.cache.put(fingerprint, frame.clone(), None).await;
        Ok(frame)
    }

    fn normalize(&self, spec: &QuerySpec, response: Value) -> Result<Frame, ProviderError> {
        match spec.endpoint() {
            "candle_snapshot" => candle_frame(Self::unwrap_rows(response)),
            "funding" => funding_frame(spec, response),
            "recent_trades" => trades_frame(Self::unwrap_rows(response)),
            "meta" => meta_frame(response),
            other => Err(ProviderError::malformed(format!(
                "hyperliquid has no endpoint {other}"
            ))),
        }
    }
}

impl Default for HyperliquidProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for HyperliquidProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn authenticate(&self) -> Result<HttpAuth, ProviderError> {
        // Public endpoints, no secret required.
        Ok(HttpAuth::None)
    }

    fn validate_connection(&self) -> ProviderFuture<'_, ()> {
        Box::pin(async move { self.fetch(Self::meta()).await.map(|_| ()) })
    }

    fn market_data(&self, request: MarketDataRequest) -> ProviderFuture<'_, Frame> {
        Box::pin(async move {
            self.fetch(Self::candle_snapshot(&request.symbol, request.interval))
                .await
        })
    }

    fn fetch_raw(&self, spec: QuerySpec) -> ProviderFuture<'_, Frame> {
        Box::pin(self.fetch(spec))
    }

    fn collection_targets(&self) -> Vec<CollectionTarget> {
        let mut targets = Vec::with_capacity(self.symbols.len() * 3);
        for symbol in &self.symbols {
            targets.push(CollectionTarget::market_data(
                format!("{}_ohlcv", symbol.as_str().to_ascii_lowercase()),
                MarketDataRequest::new(symbol.clone(), self.interval),
            ));
            targets.push(CollectionTarget::raw(
                format!("{}_funding", symbol.as_str().to_ascii_lowercase()),
                Self::funding(symbol),
            ));
            targets.push(CollectionTarget::raw(
                format!("{}_trades", symbol.as_str().to_ascii_lowercase()),
                Self::recent_trades(symbol),
            ));
        }
        targets
    }

    fn clear_cache(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.cache.clear())
    }
}

fn default_symbols() -> Vec<Symbol> {
    ["ETH", "BTC"]
        .iter()
        .filter_map(|raw| raw.parse().ok())
        .collect()
}

/// Candles arrive either as objects keyed `t/o/h/l/c/v` or as
/// positional arrays; both normalize to the standard OHLCV columns
/// with numeric cells (prices come back as strings upstream).
fn candle_frame(rows: Vec<Value>) -> Result<Frame, ProviderError> {
    let mut cells = Vec::with_capacity(rows.len());
    for row in rows {
        let cell_row = match &row {
            Value::Object(object) => ["t", "o", "h", "l", "c", "v"]
                .iter()
                .map(|key| object.get(*key).cloned().unwrap_or(Value::Null))
                .collect::<Vec<_>>(),
            Value::Array(values) if values.len() >= 6 => values[..6].to_vec(),
            _ => {
                return Err(ProviderError::malformed(
                    "hyperliquid candle row has an unexpected shape",
                ))
            }
        };
        cells.push(
            cell_row
                .into_iter()
                .enumerate()
                // Column 0 is the millisecond timestamp; the rest are
                // numeric, often serialized as strings.
                .map(|(index, value)| if index == 0 { value } else { to_number(value) })
                .collect(),
        );
    }

    Frame::new(
        CANDLE_COLUMNS.iter().map(|c| (*c).to_owned()).collect(),
        cells,
    )
    .map_err(|e| ProviderError::malformed(format!("hyperliquid candles are not tabular: {e}")))
}

/// A funding response is a single object; the frame carries one row
/// tagged with the symbol and the observation time.
fn funding_frame(spec: &QuerySpec, response: Value) -> Result<Frame, ProviderError> {
    let rows = HyperliquidProvider::unwrap_rows(response);
    let observed_at = UtcDateTime::now().format_rfc3339();
    let symbol = spec.param("coin").unwrap_or_default().to_owned();

    let tagged = rows
        .into_iter()
        .map(|row| match row {
            Value::Object(mut object) => {
                object.insert(String::from("symbol"), Value::String(symbol.clone()));
                object.insert(
                    String::from("timestamp"),
                    Value::String(observed_at.clone()),
                );
                Ok(Value::Object(object))
            }
            _ => Err(ProviderError::malformed(
                "hyperliquid funding row is not a json object",
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    frame_from_objects(NAME, &tagged, &["symbol", "timestamp"])
}

fn trades_frame(rows: Vec<Value>) -> Result<Frame, ProviderError> {
    let bounded = if rows.len() > TRADES_LIMIT {
        &rows[..TRADES_LIMIT]
    } else {
        &rows[..]
    };
    frame_from_objects(NAME, bounded, &["coin", "side", "px", "sz", "time"])
}

/// The meta response lists tradable assets under `universe`.
fn meta_frame(response: Value) -> Result<Frame, ProviderError> {
    let universe = response
        .get("universe")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| ProviderError::malformed("hyperliquid meta response has no universe"))?;
    frame_from_objects(NAME, &universe, &["name"])
}

fn to_number(value: Value) -> Value {
    match value {
        Value::String(raw) => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::ProviderErrorKind;

    struct StaticHttpClient {
        body: String,
    }

    impl StaticHttpClient {
        fn ok(body: Value) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
            })
        }
    }

    impl HttpClient for StaticHttpClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = HttpResponse::ok_json(self.body.clone());
            Box::pin(async move { Ok(response) })
        }
    }

    fn eth() -> Symbol {
        "ETH".parse().expect("valid symbol")
    }

    #[tokio::test]
    async fn candles_normalize_to_ohlcv_columns() {
        let body = json!([
            {"t": 1714_560_000_000_i64, "o": "3000.5", "h": "3050", "l": "2990", "c": "3020.25", "v": "812.4", "n": 42}
        ]);
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(body));

        let frame = provider
            .market_data(MarketDataRequest::new(eth(), Interval::OneHour))
            .await
            .expect("candles fetch");

        assert_eq!(frame.columns(), CANDLE_COLUMNS);
        assert_eq!(
            frame.rows()[0],
            vec![
                json!(1714_560_000_000_i64),
                json!(3000.5),
                json!(3050.0),
                json!(2990.0),
                json!(3020.25),
                json!(812.4),
            ]
        );
    }

    #[tokio::test]
    async fn data_wrapped_candles_are_accepted() {
        let body = json!({"data": [{"t": 1, "o": "1", "h": "2", "l": "0.5", "c": "1.5", "v": "10"}]});
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(body));

        let frame = provider
            .fetch_raw(HyperliquidProvider::candle_snapshot(&eth(), Interval::OneHour))
            .await
            .expect("wrapped candles fetch");
        assert_eq!(frame.row_count(), 1);
    }

    #[tokio::test]
    async fn funding_is_a_single_tagged_row() {
        let body = json!({"fundingRate": "0.0000125", "premium": "0.00002"});
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(body));

        let frame = provider
            .fetch_raw(HyperliquidProvider::funding(&eth()))
            .await
            .expect("funding fetch");

        assert_eq!(frame.row_count(), 1);
        let symbol_index = frame.column_index("symbol").expect("symbol column");
        assert_eq!(frame.rows()[0][symbol_index], json!("ETH"));
        assert!(frame.column_index("timestamp").is_some());
        assert!(frame.column_index("fundingRate").is_some());
    }

    #[tokio::test]
    async fn meta_lists_the_universe() {
        let body = json!({"universe": [{"name": "ETH"}, {"name": "BTC"}]});
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(body));

        let frame = provider
            .fetch_raw(HyperliquidProvider::meta())
            .await
            .expect("meta fetch");
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.columns(), ["name"]);
    }

    #[tokio::test]
    async fn unknown_endpoint_is_malformed() {
        let provider =
            HyperliquidProvider::with_http_client(StaticHttpClient::ok(json!({})));
        let err = provider
            .fetch_raw(QuerySpec::new("order_book"))
            .await
            .expect_err("endpoint not served");
        assert_eq!(err.kind(), ProviderErrorKind::Malformed);
    }

    #[test]
    fn default_targets_cover_both_symbols() {
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(json!({})));
        let targets = provider.collection_targets();
        let datasets = targets.iter().map(|t| t.dataset.as_str()).collect::<Vec<_>>();
        assert_eq!(
            datasets,
            [
                "eth_ohlcv",
                "eth_funding",
                "eth_trades",
                "btc_ohlcv",
                "btc_funding",
                "btc_trades",
            ]
        );
    }

    #[test]
    fn public_api_authenticates_without_a_secret() {
        let provider = HyperliquidProvider::with_http_client(StaticHttpClient::ok(json!({})));
        assert_eq!(provider.authenticate().expect("public"), HttpAuth::None);
    }
}
