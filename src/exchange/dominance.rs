// =============================================================================
// Dominance adapter — composite index from an aggregated-data provider
// =============================================================================
//
// The dominance entry is not an exchange pair: its "price" is the BTC share
// of total crypto market capitalisation, served by CoinGecko's global
// endpoint.  The adapter synthesises a flat candle (o = h = l = c) stamped at
// the current interval boundary so the value flows through the same series
// store and indicator pipeline as every real coin.
//
// Open interest and funding rate do not exist for an index; those fetches
// report the source unavailable and the coordinator simply never asks.
// =============================================================================

use async_trait::async_trait;
use tracing::debug;

use crate::types::{Candle, ExchangeId, SampleInterval};

use super::{retry_after_header, ExchangeClient, FetchError};

pub struct DominanceClient {
    client: reqwest::Client,
    base_url: String,
}

impl DominanceClient {
    pub fn new() -> Self {
        Self::with_base_url("https://api.coingecko.com")
    }

    /// Override the base URL (tests point this at a local stub).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            base_url: base_url.into(),
        }
    }

    /// Truncate `now_ms` to the most recent closed interval boundary, then
    /// stamp the close time the way exchanges do (boundary − 1 ms).
    fn close_time(now_ms: i64, interval: SampleInterval) -> i64 {
        let interval_ms = interval.as_millis();
        (now_ms / interval_ms) * interval_ms - 1
    }
}

impl Default for DominanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for DominanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::GlobalIndex
    }

    async fn fetch_candles(
        &self,
        _pair: &str,
        interval: SampleInterval,
        since: Option<i64>,
        _limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let url = format!("{}/api/v3/global", self.base_url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_header(resp.headers());
            return Err(FetchError::from_status(status, retry_after));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;

        let dominance = body["data"]["market_cap_percentage"]["btc"]
            .as_f64()
            .ok_or_else(|| {
                FetchError::InvalidResponse("global payload missing market_cap_percentage.btc".into())
            })?;

        let ts = Self::close_time(chrono::Utc::now().timestamp_millis(), interval);

        // The provider has no history endpoint at this cadence, so a backfill
        // request (since set) can only re-offer the current point; stale slots
        // stay as markers.
        if let Some(since) = since {
            if ts <= since {
                debug!(dominance, "dominance point already covered by stored history");
                return Ok(Vec::new());
            }
        }

        debug!(dominance, ts, "dominance fetched");
        Ok(vec![Candle::new(ts, dominance, dominance, dominance, dominance, 0.0)])
    }

    async fn fetch_open_interest(&self, _pair: &str) -> Result<f64, FetchError> {
        Err(FetchError::SourceUnavailable(
            "open interest is not defined for an index".into(),
        ))
    }

    async fn fetch_funding_rate(&self, _pair: &str) -> Result<f64, FetchError> {
        Err(FetchError::SourceUnavailable(
            "funding rate is not defined for an index".into(),
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_time_lands_on_previous_boundary() {
        let interval = SampleInterval::OneMinute;
        // 90 s past the epoch minute boundary.
        let now_ms = 1_700_000_000_000_i64 + 90_000;
        let ts = DominanceClient::close_time(now_ms, interval);
        assert_eq!(ts % interval.as_millis(), interval.as_millis() - 1);
        assert!(ts <= now_ms);
        assert!(now_ms - ts < 2 * interval.as_millis());
    }

    #[test]
    fn scalar_fetches_are_unavailable() {
        let client = DominanceClient::new();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let oi = rt.block_on(client.fetch_open_interest("BTC.D"));
        let funding = rt.block_on(client.fetch_funding_rate("BTC.D"));
        assert!(matches!(oi, Err(FetchError::SourceUnavailable(_))));
        assert!(matches!(funding, Err(FetchError::SourceUnavailable(_))));
    }
}
