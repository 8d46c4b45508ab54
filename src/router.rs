// =============================================================================
// SourceRouter — priority-ordered failover across exchange adapters
// =============================================================================
//
// Policy, per metric fetch:
//   RateLimited        -> exponential backoff (base 1 s, doubling, 30 s cap),
//                         retry the SAME source, bounded attempt count
//   SourceUnavailable  -> next source immediately, no delay
//   InvalidResponse    -> treated as unavailable, next source immediately
//   everything failed  -> AllSourcesExhausted (caller marks the metric stale)
//
// Source order is static per coin. A source that failed this cycle is tried
// again from scratch next cycle; no penalty survives the cycle boundary.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::BackoffParams;
use crate::exchange::{ExchangeClient, FetchError};
use crate::types::{Candle, ExchangeId, MetricKind, SampleInterval};

/// Priority router over the configured sources of every coin.
pub struct SourceRouter {
    routes: HashMap<String, Vec<Arc<dyn ExchangeClient>>>,
    backoff: BackoffParams,
}

impl SourceRouter {
    pub fn new(backoff: BackoffParams) -> Self {
        Self {
            routes: HashMap::new(),
            backoff,
        }
    }

    /// Register the priority-ordered source list for one coin symbol.
    pub fn add_route(&mut self, symbol: impl Into<String>, sources: Vec<Arc<dyn ExchangeClient>>) {
        self.routes.insert(symbol.into(), sources);
    }

    fn sources(&self, symbol: &str) -> &[Arc<dyn ExchangeClient>] {
        self.routes.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Backoff delay before retry number `retry` (0-based) against one source.
    fn backoff_delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let cap = Duration::from_millis(self.backoff.cap_ms);
        if let Some(hint) = retry_after {
            return hint.min(cap);
        }
        let exp = self
            .backoff
            .base_ms
            .saturating_mul(1u64 << retry.min(16));
        Duration::from_millis(exp).min(cap)
    }

    /// Fetch candles for `symbol`, failing over through its source list.
    /// Returns the data together with the source that served it.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        pair: &str,
        interval: SampleInterval,
        since: Option<i64>,
        limit: u32,
    ) -> Result<(ExchangeId, Vec<Candle>), FetchError> {
        self.fetch_with(symbol, MetricKind::Price, |client| {
            let pair = pair.to_string();
            async move { client.fetch_candles(&pair, interval, since, limit).await }
        })
        .await
    }

    /// Fetch the current open interest for `symbol`.
    pub async fn fetch_open_interest(
        &self,
        symbol: &str,
        pair: &str,
    ) -> Result<(ExchangeId, f64), FetchError> {
        self.fetch_with(symbol, MetricKind::OpenInterest, |client| {
            let pair = pair.to_string();
            async move { client.fetch_open_interest(&pair).await }
        })
        .await
    }

    /// Fetch the latest funding rate for `symbol`.
    pub async fn fetch_funding_rate(
        &self,
        symbol: &str,
        pair: &str,
    ) -> Result<(ExchangeId, f64), FetchError> {
        self.fetch_with(symbol, MetricKind::FundingRate, |client| {
            let pair = pair.to_string();
            async move { client.fetch_funding_rate(&pair).await }
        })
        .await
    }

    /// Walk the source list applying the failover policy to one operation.
    async fn fetch_with<T, F, Fut>(
        &self,
        symbol: &str,
        metric: MetricKind,
        op: F,
    ) -> Result<(ExchangeId, T), FetchError>
    where
        F: Fn(Arc<dyn ExchangeClient>) -> Fut,
        Fut: std::future::Future<Output = Result<T, FetchError>>,
    {
        for client in self.sources(symbol) {
            let source = client.id();
            let mut attempt: u32 = 0;

            loop {
                match op(Arc::clone(client)).await {
                    Ok(value) => {
                        debug!(symbol, %metric, %source, attempt, "fetch succeeded");
                        return Ok((source, value));
                    }
                    Err(FetchError::RateLimited { retry_after }) => {
                        attempt += 1;
                        if attempt >= self.backoff.max_attempts {
                            warn!(
                                symbol, %metric, %source,
                                attempts = attempt,
                                "rate limited past attempt budget, failing over"
                            );
                            break;
                        }
                        let delay = self.backoff_delay(attempt - 1, retry_after);
                        warn!(
                            symbol, %metric, %source,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, backing off before retrying same source"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(err @ (FetchError::SourceUnavailable(_) | FetchError::InvalidResponse(_))) => {
                        warn!(symbol, %metric, %source, error = %err, "source failed, failing over");
                        break;
                    }
                    Err(err @ FetchError::AllSourcesExhausted { .. }) => {
                        // A client never produces this router-level variant.
                        warn!(symbol, %metric, %source, error = %err, "unexpected terminal error from source");
                        break;
                    }
                }
            }
        }

        Err(FetchError::AllSourcesExhausted {
            symbol: symbol.to_string(),
            metric,
        })
    }
}
