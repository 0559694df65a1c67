//! Fraud-score snapshots attached to orders after creation.
//!
//! The remote fraud service answers in one of two shapes. [`FraudReport`]
//! accepts either and [`FraudReport::normalize`] folds both into a single
//! [`FraudSnapshot`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delivery-risk classification derived from courier history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl RiskTier {
    /// Classifies a success rate given as a percentage (0-100).
    ///
    /// With no parcels on record the tier is `Unknown`.
    pub fn from_success_rate(total_parcels: u64, success_rate: f64) -> Self {
        if total_parcels == 0 {
            RiskTier::Unknown
        } else if success_rate >= 80.0 {
            RiskTier::Low
        } else if success_rate >= 50.0 {
            RiskTier::Medium
        } else {
            RiskTier::High
        }
    }
}

/// Per-courier delivery counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourierStat {
    pub courier: String,
    #[serde(default)]
    pub total_parcels: u64,
    #[serde(default)]
    pub successful_deliveries: u64,
    #[serde(default)]
    pub failed_deliveries: u64,
}

/// Normalized fraud-check result stored on the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudSnapshot {
    pub total_parcels: u64,
    pub successful_deliveries: u64,
    pub failed_deliveries: u64,
    /// Percentage, rounded to two decimals.
    pub success_rate: f64,
    pub risk_tier: RiskTier,
    #[serde(default)]
    pub courier_history: Vec<CourierStat>,
    pub checked_at: DateTime<Utc>,
}

/// Current response shape of the fraud service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentReport {
    pub total_parcels: u64,
    #[serde(default)]
    pub successful_deliveries: u64,
    #[serde(default)]
    pub failed_deliveries: u64,
    #[serde(default)]
    pub success_rate: Option<f64>,
    #[serde(default)]
    pub risk_tier: Option<RiskTier>,
    #[serde(default)]
    pub courier_history: Vec<CourierStat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyCounts {
    #[serde(default)]
    pub total_parcel: u64,
    #[serde(default)]
    pub success_parcel: u64,
    #[serde(default)]
    pub cancelled_parcel: u64,
}

/// Legacy response shape: a summary plus a map of per-courier counts.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyReport {
    pub summary: LegacyCounts,
    #[serde(default, rename = "courierData")]
    pub courier_data: BTreeMap<String, Value>,
}

/// Either response shape of the fraud service.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FraudReport {
    Current(CurrentReport),
    Legacy(LegacyReport),
}

fn success_rate(total: u64, success: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = success as f64 / total as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

impl FraudReport {
    /// Parses either shape from a raw JSON body.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Folds the report into the stored snapshot shape.
    pub fn normalize(self, checked_at: DateTime<Utc>) -> FraudSnapshot {
        match self {
            FraudReport::Current(report) => {
                let rate = report.success_rate.unwrap_or_else(|| {
                    success_rate(report.total_parcels, report.successful_deliveries)
                });
                FraudSnapshot {
                    total_parcels: report.total_parcels,
                    successful_deliveries: report.successful_deliveries,
                    failed_deliveries: report.failed_deliveries,
                    success_rate: rate,
                    risk_tier: report
                        .risk_tier
                        .unwrap_or_else(|| RiskTier::from_success_rate(report.total_parcels, rate)),
                    courier_history: report.courier_history,
                    checked_at,
                }
            }
            FraudReport::Legacy(report) => {
                let summary = report.summary;
                let rate = success_rate(summary.total_parcel, summary.success_parcel);
                let courier_history = report
                    .courier_data
                    .into_iter()
                    .filter(|(name, _)| name != "summary")
                    .filter_map(|(name, value)| {
                        let counts: LegacyCounts = serde_json::from_value(value).ok()?;
                        Some(CourierStat {
                            courier: name,
                            total_parcels: counts.total_parcel,
                            successful_deliveries: counts.success_parcel,
                            failed_deliveries: counts.cancelled_parcel,
                        })
                    })
                    .collect();
                FraudSnapshot {
                    total_parcels: summary.total_parcel,
                    successful_deliveries: summary.success_parcel,
                    failed_deliveries: summary.cancelled_parcel,
                    success_rate: rate,
                    risk_tier: RiskTier::from_success_rate(summary.total_parcel, rate),
                    courier_history,
                    checked_at,
                }
            }
        }
    }
}
