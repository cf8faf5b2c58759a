use anyhow::{anyhow, Context};
use std::str::FromStr;
use std::time::Duration;

use emaflow_core::constants::{DEFAULT_EMA_PERIODS, DEFAULT_MAX_GAP_DAYS, DEFAULT_MAX_WORKERS};
use emaflow_core::pipeline::RefreshRequest;

pub struct Config {
    pub db_path: String,
    pub asset_ids: Vec<String>,
    pub timeframe_codes: Vec<String>,
    pub periods: Vec<u32>,
    pub max_workers: usize,
    pub max_gap_days: i64,
    /// Overrides the per-timeframe dirty-window lookback when set.
    pub lookback_days: Option<i64>,
    pub validate: bool,
    pub alerts: bool,
    pub alert_webhook_url: Option<String>,
    /// Zero runs once and exits.
    pub refresh_interval: Duration,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let db_path = var("EMAFLOW_DB_PATH").unwrap_or_else(|| "./db/emaflow.db".into());
        let asset_ids = split_list(var("EMAFLOW_ASSET_IDS"));
        let timeframe_codes = split_list(var("EMAFLOW_TIMEFRAMES"));
        let periods = match var("EMAFLOW_PERIODS") {
            Some(raw) => split_list(Some(raw))
                .iter()
                .map(|p| {
                    p.parse::<u32>()
                        .with_context(|| format!("Invalid EMAFLOW_PERIODS entry '{}'", p))
                })
                .collect::<anyhow::Result<Vec<_>>>()?,
            None => DEFAULT_EMA_PERIODS.to_vec(),
        };
        let max_workers = parse_or(
            var("EMAFLOW_MAX_WORKERS"),
            "EMAFLOW_MAX_WORKERS",
            DEFAULT_MAX_WORKERS,
        )?;
        let max_gap_days = parse_or(
            var("EMAFLOW_MAX_GAP_DAYS"),
            "EMAFLOW_MAX_GAP_DAYS",
            DEFAULT_MAX_GAP_DAYS,
        )?;
        let lookback_days = var("EMAFLOW_LOOKBACK_DAYS")
            .map(|raw| parse_value::<i64>(&raw, "EMAFLOW_LOOKBACK_DAYS"))
            .transpose()?;
        let validate = parse_bool(var("EMAFLOW_VALIDATE"), "EMAFLOW_VALIDATE", true)?;
        let alerts = parse_bool(var("EMAFLOW_ALERTS"), "EMAFLOW_ALERTS", true)?;
        let alert_webhook_url = var("EMAFLOW_ALERT_WEBHOOK_URL");
        let interval_secs: u64 = parse_or(
            var("EMAFLOW_REFRESH_INTERVAL_SECS"),
            "EMAFLOW_REFRESH_INTERVAL_SECS",
            0,
        )?;
        let log_format = var("EMAFLOW_LOG_FORMAT").unwrap_or_else(|| "text".into());

        if max_workers == 0 {
            return Err(anyhow!("EMAFLOW_MAX_WORKERS must be at least 1"));
        }
        if max_gap_days < 0 {
            return Err(anyhow!("EMAFLOW_MAX_GAP_DAYS must not be negative"));
        }

        Ok(Self {
            db_path,
            asset_ids,
            timeframe_codes,
            periods,
            max_workers,
            max_gap_days,
            lookback_days,
            validate,
            alerts,
            alert_webhook_url,
            refresh_interval: Duration::from_secs(interval_secs),
            log_format,
        })
    }

    pub fn run_once(&self) -> bool {
        self.refresh_interval.is_zero()
    }

    pub fn refresh_request(&self) -> RefreshRequest {
        RefreshRequest {
            asset_ids: self.asset_ids.clone(),
            timeframe_codes: self.timeframe_codes.clone(),
            periods: self.periods.clone(),
            max_workers: self.max_workers,
            validate: self.validate,
            alert: self.alerts,
        }
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_value<T: FromStr>(raw: &str, name: &str) -> anyhow::Result<T> {
    raw.parse::<T>()
        .map_err(|_| anyhow!("Invalid {} value '{}'", name, raw))
}

fn parse_or<T: FromStr>(raw: Option<String>, name: &str, default: T) -> anyhow::Result<T> {
    match raw {
        Some(raw) => parse_value(&raw, name),
        None => Ok(default),
    }
}

fn parse_bool(raw: Option<String>, name: &str, default: bool) -> anyhow::Result<bool> {
    match raw.map(|s| s.to_lowercase()) {
        None => Ok(default),
        Some(s) => match s.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("Invalid {} value '{}'", name, s)),
        },
    }
}
