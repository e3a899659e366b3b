use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Bucketed label for the average interval between occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum Frequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

impl Frequency {
    /// Bucket a rounded mean interval (days)
    pub fn from_interval_days(days: i64) -> Self {
        match days {
            1..=2 => Self::Daily,
            6..=8 => Self::Weekly,
            13..=16 => Self::Biweekly,
            28..=32 => Self::Monthly,
            88..=92 => Self::Quarterly,
            360..=370 => Self::Yearly,
            _ => Self::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "biweekly" => Self::Biweekly,
            "monthly" => Self::Monthly,
            "quarterly" => Self::Quarterly,
            "yearly" => Self::Yearly,
            _ => Self::Custom,
        }
    }
}

/// Periodic payment derived from a merchant's debit history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecurringTransaction {
    pub id: i64,
    pub merchant: String,
    pub category: String,
    pub average_amount: f64,
    pub average_interval_days: f64,
    pub first_occurrence: i64,
    pub last_occurrence: i64,
    pub next_expected: Option<i64>,
    pub occurrence_count: i64,
    pub is_active: bool,
    pub frequency: Frequency,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecurringTransactionsResponse {
    pub recurring: Vec<RecurringTransaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateRecurringRequest {
    pub is_active: bool,
}
