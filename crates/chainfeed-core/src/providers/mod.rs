//! Concrete provider adapters behind the uniform contract.

mod dune;
mod hyperliquid;

pub use dune::DuneProvider;
pub use hyperliquid::HyperliquidProvider;

use serde_json::Value;

use crate::http_client::{HttpClient, HttpRequest};
use crate::provider::ProviderError;
use crate::Frame;

/// Issues a request and returns the parsed JSON body.
///
/// Transport and status failures are classified here so every adapter
/// maps upstream conditions the same way: 401/403 is an auth problem,
/// 429 an upstream rate limit, 5xx a retryable upstream fault, and an
/// unparseable body is malformed.
pub(crate) async fn fetch_json(
    client: &dyn HttpClient,
    provider: &str,
    request: HttpRequest,
) -> Result<Value, ProviderError> {
    let response = client.execute(request).await.map_err(|e| {
        if e.timed_out() {
            ProviderError::timeout(format!("{provider} request timed out: {e}"))
        } else {
            ProviderError::upstream(format!("{provider} transport error: {e}"))
        }
    })?;

    if !response.is_success() {
        return Err(match response.status {
            401 | 403 => ProviderError::auth(format!(
                "{provider} rejected credentials (status {})",
                response.status
            )),
            429 => ProviderError::rate_limited(format!("{provider} returned status 429")),
            status => ProviderError::upstream(format!("{provider} returned status {status}")),
        });
    }

    serde_json::from_str(&response.body)
        .map_err(|e| ProviderError::malformed(format!("{provider} returned invalid json: {e}")))
}

/// Builds a tabular frame from an array of JSON objects.
///
/// Columns are the union of keys in first-seen order; a row missing a
/// key gets a null cell. An empty result set keeps `fallback_columns`
/// as its schema. Anything that is not an array of objects is
/// malformed.
pub(crate) fn frame_from_objects(
    provider: &str,
    rows: &[Value],
    fallback_columns: &[&str],
) -> Result<Frame, ProviderError> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        let object = row.as_object().ok_or_else(|| {
            ProviderError::malformed(format!("{provider} row is not a json object"))
        })?;
        for key in object.keys() {
            if !columns.iter().any(|existing| existing == key) {
                columns.push(key.clone());
            }
        }
    }

    if columns.is_empty() {
        columns = fallback_columns.iter().map(|c| (*c).to_owned()).collect();
    }

    let mut cells = Vec::with_capacity(rows.len());
    for row in rows {
        let object = row.as_object().ok_or_else(|| {
            ProviderError::malformed(format!("{provider} row is not a json object"))
        })?;
        cells.push(
            columns
                .iter()
                .map(|column| object.get(column).cloned().unwrap_or(Value::Null))
                .collect(),
        );
    }

    Frame::new(columns, cells)
        .map_err(|e| ProviderError::malformed(format!("{provider} rows are not tabular: {e}")))
}
