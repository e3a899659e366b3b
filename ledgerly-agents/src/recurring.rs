//! Recurring payment detection over the stored debit history.

use crate::storage::{RecurringStore, TransactionStore};
use anyhow::Result;
use chrono::Utc;
use shared_types::{Frequency, RecurringTransaction, Transaction, TransactionType};
use std::collections::HashMap;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone)]
pub struct RecurringDetector {
    pub min_occurrences: usize,
    /// Allowed relative deviation of each gap from the mean gap
    pub interval_tolerance: f64,
    pub min_confidence: f64,
}

impl Default for RecurringDetector {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            interval_tolerance: 0.2,
            min_confidence: 0.6,
        }
    }
}

impl RecurringDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Periodic merchants among `transactions`, strongest first
    pub fn detect(&self, transactions: &[Transaction]) -> Vec<RecurringTransaction> {
        let mut groups: HashMap<String, Vec<&Transaction>> = HashMap::new();
        for txn in transactions {
            if txn.transaction_type != TransactionType::Debit || !txn.has_known_merchant() {
                continue;
            }
            groups
                .entry(txn.merchant.trim().to_lowercase())
                .or_default()
                .push(txn);
        }

        let mut found: Vec<RecurringTransaction> = groups
            .into_values()
            .filter_map(|mut group| {
                group.sort_by_key(|t| t.occurred_at);
                self.analyze(&group)
            })
            .collect();

        found.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.merchant.cmp(&b.merchant))
        });
        found
    }

    /// `group` is one merchant's debits in chronological order
    fn analyze(&self, group: &[&Transaction]) -> Option<RecurringTransaction> {
        if group.len() < self.min_occurrences {
            return None;
        }
        let first = group.first()?;
        let last = group.last()?;

        let gaps: Vec<f64> = group
            .windows(2)
            .map(|pair| (pair[1].occurred_on() - pair[0].occurred_on()).num_days() as f64)
            .collect();
        let mean_gap = mean(&gaps);
        if mean_gap <= 0.0 {
            return None;
        }

        let tolerance = mean_gap * self.interval_tolerance;
        if gaps.iter().any(|gap| (gap - mean_gap).abs() > tolerance) {
            tracing::debug!(
                "{}: irregular intervals {:?}, not recurring",
                last.merchant,
                gaps
            );
            return None;
        }

        let amounts: Vec<f64> = group.iter().map(|t| t.amount).collect();
        let mean_amount = mean(&amounts);

        let occurrence_score = (group.len() as f64 / 12.0).min(1.0);
        let interval_score = (1.0 - mean_abs_deviation(&gaps, mean_gap) / mean_gap).clamp(0.0, 1.0);
        let amount_score = if mean_amount > 0.0 {
            (1.0 - mean_abs_deviation(&amounts, mean_amount) / mean_amount).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let confidence = 0.3 * occurrence_score + 0.4 * interval_score + 0.3 * amount_score;

        if confidence < self.min_confidence {
            tracing::debug!(
                "{}: confidence {:.2} below threshold",
                last.merchant,
                confidence
            );
            return None;
        }

        let rounded_gap = mean_gap.round() as i64;
        Some(RecurringTransaction {
            id: 0,
            merchant: last.merchant.trim().to_string(),
            category: dominant_category(group),
            average_amount: mean_amount,
            average_interval_days: mean_gap,
            first_occurrence: first.occurred_at,
            last_occurrence: last.occurred_at,
            next_expected: Some(last.occurred_at + rounded_gap * SECONDS_PER_DAY),
            occurrence_count: group.len() as i64,
            is_active: true,
            frequency: Frequency::from_interval_days(rounded_gap),
            confidence,
        })
    }

    /// Full sweep: scan the store, detect, upsert by merchant
    pub async fn sweep(
        &self,
        transactions: &dyn TransactionStore,
        recurring: &dyn RecurringStore,
    ) -> Result<Vec<RecurringTransaction>> {
        let started = Utc::now();
        let history = transactions.list_transactions().await?;
        let detected = self.detect(&history);

        let mut stored = Vec::with_capacity(detected.len());
        for item in &detected {
            stored.push(recurring.upsert_recurring(item).await?);
        }

        tracing::info!(
            "Recurring sweep over {} transactions found {} patterns in {}ms",
            history.len(),
            stored.len(),
            (Utc::now() - started).num_milliseconds()
        );
        Ok(stored)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_abs_deviation(values: &[f64], center: f64) -> f64 {
    mean(&values.iter().map(|v| (v - center).abs()).collect::<Vec<_>>())
}

/// Most frequent category; ties go to the most recent one
fn dominant_category(group: &[&Transaction]) -> String {
    let mut counts: HashMap<&str, (usize, i64)> = HashMap::new();
    for txn in group {
        let entry = counts.entry(txn.category.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 = entry.1.max(txn.occurred_at);
    }
    counts
        .into_iter()
        .max_by_key(|(_, (count, latest))| (*count, *latest))
        .map(|(category, _)| category.to_string())
        .unwrap_or_default()
}
