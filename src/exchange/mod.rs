// =============================================================================
// Exchange adapters — one capability interface per data source
// =============================================================================
//
// Every source implements the same three-method contract; the router and
// everything above it depend only on the trait, never on a concrete exchange.
// Adapters perform no retries of their own: they classify each failure and
// hand the policy decision to the SourceRouter.

pub mod binance;
pub mod bybit;
pub mod dominance;

pub use binance::BinanceClient;
pub use bybit::BybitClient;
pub use dominance::DominanceClient;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Candle, ExchangeId, MetricKind, SampleInterval};

/// Classification of a failed fetch.  The router's failover policy is an
/// exhaustive match over these variants.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The source asked us to slow down (HTTP 429/418).  Retry the same
    /// source after a backoff.
    #[error("rate limited (retry_after={retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport, server, or auth failure.  Fail over to the next source
    /// immediately.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The source answered but the payload was not what the API documents.
    /// Treated like `SourceUnavailable` by the router.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Router-level terminal error: every configured source failed.  The
    /// coordinator marks the metric stale and carries the last value forward.
    #[error("all sources exhausted for {symbol}/{metric}")]
    AllSourcesExhausted { symbol: String, metric: MetricKind },
}

impl FetchError {
    /// Map a reqwest transport error to the taxonomy.
    pub fn from_transport(err: reqwest::Error) -> Self {
        Self::SourceUnavailable(err.to_string())
    }

    /// Map an HTTP status to the taxonomy.  429 and 418 (Binance's IP-ban
    /// teapot) are rate limits; everything else non-2xx is unavailability.
    pub fn from_status(status: reqwest::StatusCode, retry_after: Option<Duration>) -> Self {
        if status.as_u16() == 429 || status.as_u16() == 418 {
            Self::RateLimited { retry_after }
        } else {
            Self::SourceUnavailable(format!("http status {status}"))
        }
    }
}

/// Read the Retry-After header, if the source sent one, as a duration.
pub(crate) fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
/// Exchanges habitually ship numeric fields as strings.
pub(crate) fn parse_str_f64(val: &serde_json::Value, name: &str) -> Result<f64, FetchError> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .map_err(|_| FetchError::InvalidResponse(format!("failed to parse {name}: {s}")))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        Err(FetchError::InvalidResponse(format!(
            "field {name} is neither string nor number"
        )))
    }
}

/// Capability interface every market-data source implements.
///
/// `fetch_candles` returns closed candles in chronological order, bounded by
/// the exchange page limit; `since` (exclusive, close-time ms) narrows the
/// request for gap backfills.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    fn id(&self) -> ExchangeId;

    async fn fetch_candles(
        &self,
        pair: &str,
        interval: SampleInterval,
        since: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError>;

    async fn fetch_open_interest(&self, pair: &str) -> Result<f64, FetchError>;

    async fn fetch_funding_rate(&self, pair: &str) -> Result<f64, FetchError>;
}

/// Build the reqwest client shared by the adapters: JSON only, bounded
/// timeout so a stalled source cannot hold a cycle hostage.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("failed to build reqwest client")
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_maps_to_rate_limited() {
        let err = FetchError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, None);
        assert!(matches!(err, FetchError::RateLimited { .. }));
    }

    #[test]
    fn status_418_maps_to_rate_limited() {
        let err = FetchError::from_status(reqwest::StatusCode::IM_A_TEAPOT, None);
        assert!(matches!(err, FetchError::RateLimited { .. }));
    }

    #[test]
    fn status_5xx_maps_to_unavailable() {
        let err = FetchError::from_status(reqwest::StatusCode::BAD_GATEWAY, None);
        assert!(matches!(err, FetchError::SourceUnavailable(_)));
    }

    #[test]
    fn parse_str_f64_accepts_both_shapes() {
        let s = serde_json::json!("37020.5");
        let n = serde_json::json!(37020.5);
        assert!((parse_str_f64(&s, "x").unwrap() - 37020.5).abs() < f64::EPSILON);
        assert!((parse_str_f64(&n, "x").unwrap() - 37020.5).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_str_f64_rejects_garbage() {
        let v = serde_json::json!({"nested": true});
        assert!(matches!(
            parse_str_f64(&v, "x"),
            Err(FetchError::InvalidResponse(_))
        ));
    }
}
