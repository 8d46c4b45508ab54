// =============================================================================
// Binance adapter — spot klines, futures open interest & funding rate
// =============================================================================
//
// Klines come from the spot REST API as arrays-of-arrays with numeric strings
// inside:
//   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
//   [6] closeTime, ...
// Open interest and funding rate come from the USDT-margined futures API.
// All three endpoints are public; no request signing is involved.
// =============================================================================

use async_trait::async_trait;
use tracing::debug;

use crate::types::{Candle, ExchangeId, SampleInterval};

use super::{parse_str_f64, retry_after_header, ExchangeClient, FetchError};

/// Largest kline page Binance serves in one request.
const PAGE_LIMIT: u32 = 1000;

pub struct BinanceClient {
    client: reqwest::Client,
    spot_url: String,
    futures_url: String,
}

impl BinanceClient {
    pub fn new() -> Self {
        Self::with_urls("https://api.binance.com", "https://fapi.binance.com")
    }

    /// Override the base URLs (tests point these at a local stub).
    pub fn with_urls(spot_url: impl Into<String>, futures_url: impl Into<String>) -> Self {
        Self {
            client: super::http_client(),
            spot_url: spot_url.into(),
            futures_url: futures_url.into(),
        }
    }

    /// Issue a GET and classify transport / status failures, returning the
    /// parsed JSON body on success.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_header(resp.headers());
            return Err(FetchError::from_status(status, retry_after));
        }

        resp.json()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))
    }
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    fn id(&self) -> ExchangeId {
        ExchangeId::Binance
    }

    async fn fetch_candles(
        &self,
        pair: &str,
        interval: SampleInterval,
        since: Option<i64>,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.spot_url,
            pair,
            interval.binance_code(),
            limit.min(PAGE_LIMIT)
        );
        if let Some(since) = since {
            // startTime is inclusive of the candle open; asking from the last
            // known close time yields only candles after it.
            url.push_str(&format!("&startTime={since}"));
        }

        let body = self.get_json(&url).await?;
        let raw = body
            .as_array()
            .ok_or_else(|| FetchError::InvalidResponse("klines response is not an array".into()))?;

        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry
                .as_array()
                .ok_or_else(|| FetchError::InvalidResponse("kline entry is not an array".into()))?;
            if arr.len() < 7 {
                return Err(FetchError::InvalidResponse(format!(
                    "kline entry has {} elements",
                    arr.len()
                )));
            }

            let open = parse_str_f64(&arr[1], "kline.open")?;
            let high = parse_str_f64(&arr[2], "kline.high")?;
            let low = parse_str_f64(&arr[3], "kline.low")?;
            let close = parse_str_f64(&arr[4], "kline.close")?;
            let volume = parse_str_f64(&arr[5], "kline.volume")?;
            let close_time = arr[6]
                .as_i64()
                .ok_or_else(|| FetchError::InvalidResponse("kline.closeTime missing".into()))?;

            candles.push(Candle::new(close_time, open, high, low, close, volume));
        }

        debug!(pair, interval = %interval, count = candles.len(), "binance klines fetched");
        Ok(candles)
    }

    async fn fetch_open_interest(&self, pair: &str) -> Result<f64, FetchError> {
        let url = format!("{}/fapi/v1/openInterest?symbol={}", self.futures_url, pair);
        let body = self.get_json(&url).await?;

        let oi = parse_str_f64(&body["openInterest"], "openInterest")?;
        debug!(pair, open_interest = oi, "binance open interest fetched");
        Ok(oi)
    }

    async fn fetch_funding_rate(&self, pair: &str) -> Result<f64, FetchError> {
        let url = format!(
            "{}/fapi/v1/fundingRate?symbol={}&limit=1",
            self.futures_url, pair
        );
        let body = self.get_json(&url).await?;

        let entry = body
            .as_array()
            .and_then(|arr| arr.last())
            .ok_or_else(|| FetchError::InvalidResponse("funding rate array is empty".into()))?;

        let rate = parse_str_f64(&entry["fundingRate"], "fundingRate")?;
        debug!(pair, rate, "binance funding rate fetched");
        Ok(rate)
    }
}
