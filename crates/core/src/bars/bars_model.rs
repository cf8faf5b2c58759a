//! Source price-bar models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DataQualityError;
use crate::sessions::SessionKey;

/// One daily OHLCV bar as delivered by the upstream price store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub asset_id: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Last time the upstream store wrote this bar. Moves forward on corrections.
    pub updated_at: DateTime<Utc>,
}

impl PriceBar {
    /// Rejects bars whose close cannot enter an EMA.
    pub fn check(&self) -> Result<(), DataQualityError> {
        let malformed = |reason: &str| DataQualityError::MalformedBar {
            asset_id: self.asset_id.clone(),
            timestamp: self.timestamp,
            reason: reason.to_string(),
        };
        if !self.close.is_finite() {
            return Err(malformed("close is not a finite number"));
        }
        if self.close <= 0.0 {
            return Err(malformed("close must be positive"));
        }
        if self.high.is_finite() && self.low.is_finite() && self.high < self.low {
            return Err(malformed("high is below low"));
        }
        Ok(())
    }
}

/// Where an asset trades. Used to resolve its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProfile {
    pub asset_id: String,
    pub asset_class: String,
    pub region: String,
    pub venue: String,
    pub asset_key_type: String,
    pub asset_key: String,
}

impl AssetProfile {
    pub fn session_key(&self, session_type: &str) -> SessionKey {
        SessionKey::new(
            self.asset_class.clone(),
            self.region.clone(),
            self.venue.clone(),
            self.asset_key_type.clone(),
            self.asset_key.clone(),
            session_type,
        )
    }
}

/// First/last bar timestamps and the number of bars stored for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarBounds {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub count: i64,
}
