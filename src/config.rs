// =============================================================================
// Pipeline Configuration — read once at startup
// =============================================================================
//
// Central configuration for the Meridian feed pipeline.  Every field carries a
// serde default so that older JSON files missing new fields still deserialise
// correctly.  Unlike hot-reloadable engines, nothing here watches the file:
// the pipeline reads its configuration exactly once during startup.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{ExchangeId, SampleInterval};

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_coins() -> Vec<CoinConfig> {
    let mut coins: Vec<CoinConfig> = ["BTC", "ETH", "BNB", "XRP", "DOGE"]
        .iter()
        .map(|s| CoinConfig {
            symbol: s.to_string(),
            index: false,
            sources: default_sources(),
        })
        .collect();

    // Composite index entry: BTC dominance from an aggregated-data provider.
    coins.push(CoinConfig {
        symbol: "BTC.D".to_string(),
        index: true,
        sources: vec![ExchangeId::GlobalIndex],
    });

    coins
}

fn default_sources() -> Vec<ExchangeId> {
    vec![ExchangeId::Binance, ExchangeId::Bybit]
}

fn default_lookback_len() -> usize {
    50
}

fn default_published_len() -> usize {
    10
}

fn default_cycle_timeout_secs() -> u64 {
    45
}

fn default_persistence_path() -> String {
    "snapshots.jsonl".to_string()
}

fn default_ema_period() -> usize {
    20
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_rsi_fast() -> usize {
    7
}

fn default_rsi_slow() -> usize {
    14
}

fn default_atr_period() -> usize {
    14
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    3
}

// =============================================================================
// CoinConfig
// =============================================================================

/// One tracked coin and the priority-ordered sources that serve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinConfig {
    /// Bare symbol, e.g. "BTC" (paired against USDT for exchange calls) or
    /// "BTC.D" for the dominance index.
    pub symbol: String,

    /// Composite-index entry: price only, no open interest or funding rate.
    #[serde(default)]
    pub index: bool,

    /// Sources tried in order; the first is the primary. Static per coin.
    #[serde(default = "default_sources")]
    pub sources: Vec<ExchangeId>,
}

impl CoinConfig {
    /// Symbol as sent to sources: exchange coins pair against USDT, index
    /// entries pass through unchanged.
    pub fn pair(&self) -> String {
        if self.index {
            self.symbol.clone()
        } else {
            format!("{}USDT", self.symbol)
        }
    }
}

// =============================================================================
// IndicatorPeriods
// =============================================================================

/// Look-back periods for every derived indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    #[serde(default = "default_ema_period")]
    pub ema: usize,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    #[serde(default = "default_rsi_fast")]
    pub rsi_fast: usize,

    #[serde(default = "default_rsi_slow")]
    pub rsi_slow: usize,

    #[serde(default = "default_atr_period")]
    pub atr: usize,
}

impl IndicatorPeriods {
    /// Longest warm-up any indicator needs before producing a defined value,
    /// in candles.  The long buffer must hold at least this many entries.
    pub fn longest_warmup(&self) -> usize {
        let macd_warmup = self.macd_slow + self.macd_signal;
        let rsi_warmup = self.rsi_slow + 1;
        let atr_warmup = self.atr + 1;
        self.ema
            .max(macd_warmup)
            .max(rsi_warmup)
            .max(atr_warmup)
    }
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            ema: default_ema_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            rsi_fast: default_rsi_fast(),
            rsi_slow: default_rsi_slow(),
            atr: default_atr_period(),
        }
    }
}

// =============================================================================
// BackoffParams
// =============================================================================

/// Retry/backoff policy the router applies to rate-limited sources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffParams {
    /// First backoff delay in milliseconds; doubles on each retry.
    #[serde(default = "default_backoff_base_ms")]
    pub base_ms: u64,

    /// Upper bound on any single backoff delay.
    #[serde(default = "default_backoff_cap_ms")]
    pub cap_ms: u64,

    /// Attempts against one source before falling to the next.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            base_ms: default_backoff_base_ms(),
            cap_ms: default_backoff_cap_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Top-level configuration for the Meridian feed pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Coins tracked by the pipeline, including the composite index entry.
    #[serde(default = "default_coins")]
    pub coins: Vec<CoinConfig>,

    /// Candle sampling interval; also the cycle cadence.
    #[serde(default)]
    pub interval: SampleInterval,

    /// Long calculation buffer length per series (entries).
    #[serde(default = "default_lookback_len")]
    pub lookback_len: usize,

    /// Published tail length per series (entries).
    #[serde(default = "default_published_len")]
    pub published_len: usize,

    /// Indicator look-back periods.
    #[serde(default)]
    pub periods: IndicatorPeriods,

    /// Rate-limit backoff policy.
    #[serde(default)]
    pub backoff: BackoffParams,

    /// Hard per-cycle timeout; a cycle still running past this is abandoned
    /// and emitted with whatever completed.
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,

    /// Path of the JSONL file the persistence sink appends to.
    #[serde(default = "default_persistence_path")]
    pub persistence_path: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            coins: default_coins(),
            interval: SampleInterval::default(),
            lookback_len: default_lookback_len(),
            published_len: default_published_len(),
            periods: IndicatorPeriods::default(),
            backoff: BackoffParams::default(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            persistence_path: default_persistence_path(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist or is malformed, returns an error so the
    /// caller can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse pipeline config from {}", path.display()))?;

        config.validate()?;

        info!(
            path = %path.display(),
            coins = config.coins.len(),
            interval = %config.interval,
            "pipeline config loaded"
        );

        Ok(config)
    }

    /// Reject configurations that cannot produce correct indicator output.
    ///
    /// A long buffer shorter than the longest warm-up would silently yield
    /// undefined indicators forever, so it is a startup error, not a runtime
    /// condition.
    pub fn validate(&self) -> Result<()> {
        let warmup = self.periods.longest_warmup();
        if self.lookback_len < warmup {
            anyhow::bail!(
                "lookback_len {} is below the longest indicator warm-up {}",
                self.lookback_len,
                warmup
            );
        }
        if self.published_len > self.lookback_len {
            anyhow::bail!(
                "published_len {} exceeds lookback_len {}",
                self.published_len,
                self.lookback_len
            );
        }
        if self.coins.is_empty() {
            anyhow::bail!("no coins configured");
        }
        for coin in &self.coins {
            if coin.sources.is_empty() {
                anyhow::bail!("coin {} has no sources configured", coin.symbol);
            }
        }
        Ok(())
    }
}
