use super::{
    account_patterns, amount_patterns, balance_patterns, counterparty_credit_clause,
    is_holder_reference, limit_patterns, reference_patterns, type_patterns, AccountMatch,
    AmountMatch, MerchantDirectory, PatternCascade, TypeSignal,
};
use super::dates::{find_date, midnight_utc};
use crate::category_classifier::CategoryClassifier;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use shared_types::{
    ExtractedField, ExtractionMethod, MatchedPattern, Transaction, TransactionType,
    UNKNOWN_MERCHANT,
};
use std::ops::Range;

/// Everything the pattern cascades recovered from one message
#[derive(Debug, Clone, PartialEq)]
pub struct FieldExtraction {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub transaction_type: TransactionType,
    /// Type came from holder-perspective phrasing rather than a bare keyword
    pub type_is_decisive: bool,
    pub merchant: Option<String>,
    pub transaction_ref: Option<String>,
    pub account_suffix: Option<String>,
    /// Suffix came from a printed card/account number
    pub account_is_explicit: bool,
    pub balance: Option<f64>,
    pub date: Option<NaiveDate>,
    pub matched: Vec<MatchedPattern>,
}

impl FieldExtraction {
    fn empty() -> Self {
        Self {
            amount: None,
            currency: None,
            transaction_type: TransactionType::Unknown,
            type_is_decisive: false,
            merchant: None,
            transaction_ref: None,
            account_suffix: None,
            account_is_explicit: false,
            balance: None,
            date: None,
            matched: Vec::new(),
        }
    }

    /// Parsed means an amount and a direction were both found
    pub fn is_parsed(&self) -> bool {
        self.amount.is_some() && self.transaction_type != TransactionType::Unknown
    }

    pub fn has_field(&self, field: ExtractedField) -> bool {
        match field {
            ExtractedField::Type => self.transaction_type != TransactionType::Unknown,
            ExtractedField::Amount => self.amount.is_some(),
            ExtractedField::Merchant => self.merchant.is_some(),
            ExtractedField::TransactionRef => self.transaction_ref.is_some(),
            ExtractedField::Date => self.date.is_some(),
            ExtractedField::Account => self.account_suffix.is_some(),
        }
    }

    pub fn matched_field_count(&self) -> usize {
        ExtractedField::ALL
            .iter()
            .filter(|field| self.has_field(**field))
            .count()
    }

    /// Fraction of the six expected fields that were found
    pub fn field_confidence(&self) -> f64 {
        self.matched_field_count() as f64 / ExtractedField::ALL.len() as f64
    }

    /// Whether anything beyond the direction was recovered
    pub fn has_non_type_field(&self) -> bool {
        ExtractedField::ALL
            .iter()
            .filter(|field| **field != ExtractedField::Type)
            .any(|field| self.has_field(*field))
    }

    fn record(&mut self, field: ExtractedField, pattern: &str, value: impl ToString) {
        let value = value.to_string();
        tracing::debug!("{} matched by '{}': {}", field.as_str(), pattern, value);
        self.matched.push(MatchedPattern {
            field: field.as_str().to_string(),
            pattern: pattern.to_string(),
            value,
        });
    }
}

/// Pattern-cascade extractor; pure and synchronous
pub struct DeterministicExtractor {
    amounts: PatternCascade<AmountMatch>,
    balances: PatternCascade<f64>,
    limits: PatternCascade<f64>,
    types: PatternCascade<TypeSignal>,
    counterparty_credit: Regex,
    accounts: PatternCascade<AccountMatch>,
    references: PatternCascade<String>,
    merchants: MerchantDirectory,
    classifier: CategoryClassifier,
}

impl DeterministicExtractor {
    pub fn new() -> Self {
        Self::with_classifier(CategoryClassifier::new())
    }

    pub fn with_classifier(classifier: CategoryClassifier) -> Self {
        Self {
            amounts: amount_patterns(),
            balances: balance_patterns(),
            limits: limit_patterns(),
            types: type_patterns(),
            counterparty_credit: counterparty_credit_clause(),
            accounts: account_patterns(),
            references: reference_patterns(),
            merchants: MerchantDirectory::new(),
            classifier,
        }
    }

    pub fn classifier(&self) -> &CategoryClassifier {
        &self.classifier
    }

    pub fn merchants(&self) -> &MerchantDirectory {
        &self.merchants
    }

    /// Runs every cascade over `text`
    pub fn extract_fields(&self, text: &str) -> FieldExtraction {
        let mut fields = FieldExtraction::empty();

        let balance_hit = self.balances.first_match(text);
        let mut masked: Vec<Range<usize>> = self.balances.all_spans(text);
        masked.extend(self.limits.all_spans(text));

        if let Some(hit) = &balance_hit {
            fields.balance = Some(hit.value);
        }

        if let Some(hit) = self.amounts.first_match_where(text, |span| {
            !masked.iter().any(|m| m.start < span.end && span.start < m.end)
        }) {
            fields.record(ExtractedField::Amount, hit.pattern, hit.value.value);
            fields.amount = Some(hit.value.value);
            fields.currency = Some(hit.value.currency);
        }

        if let Some(signal) = self.infer_type(text) {
            fields.record(
                ExtractedField::Type,
                signal.pattern,
                signal.value.transaction_type.as_str(),
            );
            fields.transaction_type = signal.value.transaction_type;
            fields.type_is_decisive = signal.value.decisive;
        }

        if let Some((merchant, pattern)) = self.merchants.find(text) {
            fields.record(ExtractedField::Merchant, pattern, &merchant);
            fields.merchant = Some(merchant);
        }

        if let Some(hit) = self.references.first_match(text) {
            fields.record(ExtractedField::TransactionRef, hit.pattern, &hit.value);
            fields.transaction_ref = Some(hit.value);
        }

        if let Some(hit) = self.accounts.first_match(text) {
            fields.record(ExtractedField::Account, hit.pattern, &hit.value.suffix);
            fields.account_is_explicit = hit.value.explicit;
            fields.account_suffix = Some(hit.value.suffix);
        }

        if let Some(date) = find_date(text) {
            fields.record(ExtractedField::Date, "calendar_date", date);
            fields.date = Some(date);
        }

        fields
    }

    /// Holder-perspective direction; "credited to <merchant>" clauses are ignored
    pub fn infer_type(&self, text: &str) -> Option<super::CascadeMatch<TypeSignal>> {
        let neutralized = self
            .counterparty_credit
            .replace_all(text, |caps: &Captures| {
                let target = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                if is_holder_reference(target) {
                    caps[0].to_string()
                } else {
                    " ".repeat(caps[0].len())
                }
            });
        self.types.first_match(&neutralized)
    }

    /// Deterministic-only transaction for `text`, categorized against `active`
    pub fn quick_parse(&self, text: &str, active_categories: &[String]) -> Transaction {
        let fields = self.extract_fields(text);
        let mut transaction = self.build_transaction(text, &fields, active_categories);
        transaction.confidence = fields.field_confidence();
        transaction
    }

    /// Transaction populated from `fields`; confidence is left to the caller
    pub fn build_transaction(
        &self,
        text: &str,
        fields: &FieldExtraction,
        active_categories: &[String],
    ) -> Transaction {
        let mut transaction = Transaction::blank(text, ExtractionMethod::Deterministic);
        transaction.amount = fields.amount.unwrap_or(0.0);
        transaction.transaction_type = fields.transaction_type;
        transaction.balance = fields.balance;
        transaction.merchant = fields
            .merchant
            .clone()
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
        transaction.category = self
            .classifier
            .classify(&transaction.merchant, active_categories);
        transaction.account_suffix = fields.account_suffix.clone();
        transaction.transaction_ref = fields.transaction_ref.clone();
        if let Some(ts) = fields.date.and_then(midnight_utc) {
            transaction.occurred_at = ts;
        }
        transaction.is_parsed = fields.is_parsed();
        transaction
    }
}

impl Default for DeterministicExtractor {
    fn default() -> Self {
        Self::new()
    }
}
