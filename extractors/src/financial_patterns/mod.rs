mod dates;
mod extractor;
mod merchants;

pub use dates::{find_date, midnight_utc, parse_date};
pub use extractor::{DeterministicExtractor, FieldExtraction};
pub use merchants::MerchantDirectory;

use regex::{Captures, Regex};
use shared_types::{TransactionType, UPI_ACCOUNT_SUFFIX};
use std::ops::Range;

/// One entry of a cascade: a regex and the mapper that turns its captures
/// into a field value. A mapper returning `None` rejects that match.
pub struct FieldPattern<T> {
    pub name: &'static str,
    pub regex: Regex,
    pub map: fn(&Captures) -> Option<T>,
}

impl<T> FieldPattern<T> {
    fn new(name: &'static str, pattern: &str, map: fn(&Captures) -> Option<T>) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).unwrap(),
            map,
        }
    }
}

/// Ordered list of patterns evaluated first-match-wins
pub struct PatternCascade<T> {
    patterns: Vec<FieldPattern<T>>,
}

/// Value recovered by a cascade, with the pattern and span that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeMatch<T> {
    pub value: T,
    pub pattern: &'static str,
    pub span: Range<usize>,
}

impl<T> PatternCascade<T> {
    pub fn new(patterns: Vec<FieldPattern<T>>) -> Self {
        Self { patterns }
    }

    pub fn first_match(&self, text: &str) -> Option<CascadeMatch<T>> {
        self.first_match_where(text, |_| true)
    }

    /// First accepted match; `accept` sees the span of the whole match
    pub fn first_match_where(
        &self,
        text: &str,
        accept: impl Fn(&Range<usize>) -> bool,
    ) -> Option<CascadeMatch<T>> {
        for pattern in &self.patterns {
            for captures in pattern.regex.captures_iter(text) {
                let Some(whole) = captures.get(0) else {
                    continue;
                };
                let span = whole.range();
                if !accept(&span) {
                    continue;
                }
                if let Some(value) = (pattern.map)(&captures) {
                    return Some(CascadeMatch {
                        value,
                        pattern: pattern.name,
                        span,
                    });
                }
            }
        }
        None
    }

    /// Spans of every match of every pattern, used to mask regions of text
    pub fn all_spans(&self, text: &str) -> Vec<Range<usize>> {
        self.patterns
            .iter()
            .flat_map(|p| p.regex.find_iter(text).map(|m| m.range()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmountMatch {
    pub value: f64,
    /// ISO 4217 code implied by the marker next to the number
    pub currency: String,
}

/// Direction signal; `decisive` marks account-holder phrasing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeSignal {
    pub transaction_type: TransactionType,
    pub decisive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountMatch {
    pub suffix: String,
    /// Card or account number printed in the text, as opposed to a UPI marker
    pub explicit: bool,
}

const NUMBER: &str = r"([\d,]*\d(?:\.\d{1,2})?)";
const FOREIGN_CODES: &str =
    "USD|EUR|GBP|AED|SGD|AUD|CAD|JPY|CHF|CNY|SAR|HKD|THB|MYR|QAR|KWD|OMR|BHD|NZD|ZAR";

/// Strips thousands separators and requires a positive finite number
pub fn parse_amount(raw: &str) -> Option<f64> {
    let value: f64 = raw.replace(',', "").parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

fn amount_with(captures: &Captures, group: usize, currency: &str) -> Option<AmountMatch> {
    let value = parse_amount(captures.get(group)?.as_str())?;
    Some(AmountMatch {
        value,
        currency: currency.to_string(),
    })
}

fn amount_with_code(captures: &Captures, amount_group: usize, code_group: usize) -> Option<AmountMatch> {
    let code = captures.get(code_group)?.as_str().to_ascii_uppercase();
    amount_with(captures, amount_group, &code)
}

pub(crate) fn amount_patterns() -> PatternCascade<AmountMatch> {
    PatternCascade::new(vec![
        FieldPattern::new(
            "inr_prefix",
            &format!(r"(?i)(?:\brs\.?|\binr\.?|₹)\s*{NUMBER}"),
            |c| amount_with(c, 1, "INR"),
        ),
        FieldPattern::new(
            "inr_suffix",
            &format!(r"(?i)\b{NUMBER}\s*(?:inr\b|rs\b\.?|₹|rupees\b)"),
            |c| amount_with(c, 1, "INR"),
        ),
        FieldPattern::new(
            "symbol_prefix",
            &format!(r"([$€£¥])\s*{NUMBER}"),
            |c| {
                let code = match c.get(1)?.as_str() {
                    "$" => "USD",
                    "€" => "EUR",
                    "£" => "GBP",
                    "¥" => "JPY",
                    _ => return None,
                };
                amount_with(c, 2, code)
            },
        ),
        FieldPattern::new(
            "code_prefix",
            &format!(r"(?i)\b({FOREIGN_CODES})\.?\s*{NUMBER}"),
            |c| amount_with_code(c, 2, 1),
        ),
        FieldPattern::new(
            "code_suffix",
            &format!(r"(?i)\b{NUMBER}\s*({FOREIGN_CODES})\b"),
            |c| amount_with_code(c, 1, 2),
        ),
    ])
}

/// Available balance and credit-limit phrases; their numbers are never the amount
pub(crate) fn balance_patterns() -> PatternCascade<f64> {
    PatternCascade::new(vec![FieldPattern::new(
        "available_balance",
        &format!(
            r"(?i)\b(?:avbl|avl|available|aval)\.?\s*(?:bal(?:ance)?|bl)\.?\s*(?:is|:|-|of)?\s*(?:rs\.?|inr|₹)?\s*{NUMBER}"
        ),
        |c| parse_amount(c.get(1)?.as_str()),
    )])
}

pub(crate) fn limit_patterns() -> PatternCascade<f64> {
    PatternCascade::new(vec![FieldPattern::new(
        "available_limit",
        &format!(
            r"(?i)\b(?:avbl|avl|available)\.?\s*(?:credit\s+)?(?:lmt|limit)\.?\s*(?:is|:|-|of)?\s*(?:rs\.?|inr|₹)?\s*{NUMBER}"
        ),
        |c| parse_amount(c.get(1)?.as_str()),
    )])
}

fn signal(transaction_type: TransactionType, decisive: bool) -> Option<TypeSignal> {
    Some(TypeSignal {
        transaction_type,
        decisive,
    })
}

const HOLDER_INSTRUMENT: &str = r"(?:your\s+)?(?:a/?c|acct|account|card|credit\s+card|debit\s+card)";

/// Holder-perspective phrases first, then the credit set, then the debit set.
/// Money landing in the holder's account outranks how the sender paid it.
pub(crate) fn type_patterns() -> PatternCascade<TypeSignal> {
    use TransactionType::{Credit, Debit};
    PatternCascade::new(vec![
        FieldPattern::new(
            "debited_from_holder",
            &format!(r"(?i)\bdebited\s+(?:from|to|on)?\s*{HOLDER_INSTRUMENT}\b"),
            |_| signal(Debit, true),
        ),
        FieldPattern::new(
            "holder_debited",
            r"(?i)\b(?:a/?c|acct|account|card)\s*(?:no\.?)?\s*[x*]*\d*\s+(?:is\s+|has\s+been\s+|was\s+)?debited\b",
            |_| signal(Debit, true),
        ),
        FieldPattern::new(
            "credited_to_holder",
            &format!(r"(?i)\bcredited\s+(?:to|in|into)\s+(?:your\b|{HOLDER_INSTRUMENT}\b|wallet\b)"),
            |_| signal(Credit, true),
        ),
        FieldPattern::new(
            "holder_credited",
            r"(?i)\b(?:a/?c|acct|account)\s*(?:no\.?)?\s*[x*]*\d*\s+(?:is\s+|has\s+been\s+|was\s+)?credited\b",
            |_| signal(Credit, true),
        ),
        FieldPattern::new(
            "received_in_holder",
            r"(?i)\breceived\s+(?:in|into|on)\s+(?:your\s+)?(?:a/?c|acct|account|wallet)\b",
            |_| signal(Credit, true),
        ),
        FieldPattern::new(
            "spent_using",
            r"(?i)\bspent\s+(?:using|on|via|from|at)\b",
            |_| signal(Debit, true),
        ),
        FieldPattern::new(
            "paid_via",
            r"(?i)\b(?:paid|sent|withdrawn)\s+(?:via|using|from|through)\b",
            |_| signal(Debit, true),
        ),
        FieldPattern::new("credited", r"(?i)\bcredited\b", |_| signal(Credit, false)),
        FieldPattern::new("received", r"(?i)\breceived\b", |_| signal(Credit, false)),
        FieldPattern::new("deposited", r"(?i)\bdeposit(?:ed)?\b", |_| signal(Credit, false)),
        FieldPattern::new("refund", r"(?i)\brefund(?:ed)?\b", |_| signal(Credit, false)),
        FieldPattern::new("cashback", r"(?i)\bcash\s?back\b", |_| signal(Credit, false)),
        FieldPattern::new("reversal", r"(?i)\brevers(?:al|ed)\b", |_| signal(Credit, false)),
        FieldPattern::new("added_to", r"(?i)\badded\s+to\b", |_| signal(Credit, false)),
        FieldPattern::new("debited", r"(?i)\bdebit(?:ed)?\b", |_| signal(Debit, false)),
        FieldPattern::new("spent", r"(?i)\bspent\b", |_| signal(Debit, false)),
        FieldPattern::new("paid", r"(?i)\bpaid\b", |_| signal(Debit, false)),
        FieldPattern::new("withdrawn", r"(?i)\bwithdra(?:wn|wal)\b", |_| signal(Debit, false)),
        FieldPattern::new("purchase", r"(?i)\bpurchased?\b", |_| signal(Debit, false)),
        FieldPattern::new("charged", r"(?i)\bcharged\b", |_| signal(Debit, false)),
        FieldPattern::new("sent", r"(?i)\bsent\b", |_| signal(Debit, false)),
        FieldPattern::new("transferred", r"(?i)\btransferred\b", |_| signal(Debit, false)),
        FieldPattern::new("payment_of", r"(?i)\bpayment\s+of\b", |_| signal(Debit, false)),
        FieldPattern::new("used_at", r"(?i)\bused\s+(?:at|for)\b", |_| signal(Debit, false)),
    ])
}

/// "credited to X" where X is not the holder; removed before type matching
pub(crate) fn counterparty_credit_clause() -> Regex {
    Regex::new(r"(?i)\b(?:and\s+)?credited\s+to\s+([A-Za-z0-9/]+)").unwrap()
}

pub(crate) fn is_holder_reference(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "your" | "a/c" | "ac" | "acct" | "account" | "card" | "wallet" | "the" | "you"
    )
}

fn suffix(captures: &Captures, explicit: bool) -> Option<AccountMatch> {
    Some(AccountMatch {
        suffix: captures.get(1)?.as_str().to_string(),
        explicit,
    })
}

/// Card before account before generic masked digits; the UPI sentinel last
pub(crate) fn account_patterns() -> PatternCascade<AccountMatch> {
    PatternCascade::new(vec![
        FieldPattern::new(
            "card_number",
            r"(?i)\bcard\s*(?:no\.?|number)?\s*(?:ending\s*(?:with|in)?)?\s*[x*]*\d*?(\d{4})\b",
            |c| suffix(c, true),
        ),
        FieldPattern::new(
            "account_number",
            r"(?i)\b(?:a/c|acct|account|ac)\.?\s*(?:no\.?|number)?\s*(?:ending\s*(?:with|in)?)?\s*[x*]*\d*?(\d{4})\b",
            |c| suffix(c, true),
        ),
        FieldPattern::new("masked_digits", r"(?i)\b[x*]{2,}(\d{4})\b", |c| suffix(c, true)),
        FieldPattern::new(
            "upi_marker",
            r"(?i)\bupi\b|\bvpa\b|@(?:okaxis|okhdfcbank|okicici|oksbi|ybl|paytm|axl|ibl|upi|apl)\b",
            |_| {
                Some(AccountMatch {
                    suffix: UPI_ACCOUNT_SUFFIX.to_string(),
                    explicit: false,
                })
            },
        ),
    ])
}

fn reference(captures: &Captures) -> Option<String> {
    let value = captures.get(1)?.as_str();
    value
        .chars()
        .any(|c| c.is_ascii_digit())
        .then(|| value.to_string())
}

pub(crate) fn reference_patterns() -> PatternCascade<String> {
    PatternCascade::new(vec![
        FieldPattern::new(
            "upi_ref",
            r"(?i)\b(?:upi\s*ref(?:erence)?|upi\s*txn|utr|rrn|imps\s*ref|neft\s*ref)\.?\s*(?:no\.?|number|id)?\s*[:.\-#]?\s*([A-Za-z0-9]{6,})\b",
            reference,
        ),
        FieldPattern::new(
            "txn_id",
            r"(?i)\b(?:ref(?:erence)?|txn|transaction)\.?\s*(?:no\.?|number|id)\s*[:.\-#]?\s*([A-Za-z0-9]{6,})\b",
            reference,
        ),
        FieldPattern::new(
            "ref",
            r"(?i)\bref(?:erence)?\b\.?\s*[:#]?\s*([A-Za-z0-9]{6,})\b",
            reference,
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_cascade_prefers_rupee_marker() {
        let cascade = amount_patterns();
        let hit = cascade.first_match("Rs 1,400.00 spent at ZOMATO").unwrap();
        assert_eq!(hit.value.value, 1400.0);
        assert_eq!(hit.value.currency, "INR");
        assert_eq!(hit.pattern, "inr_prefix");
    }

    #[test]
    fn test_amount_cascade_reads_foreign_codes() {
        let cascade = amount_patterns();
        let hit = cascade.first_match("USD 20.50 spent on card XX1234").unwrap();
        assert_eq!(hit.value.value, 20.5);
        assert_eq!(hit.value.currency, "USD");

        let hit = cascade.first_match("You paid €12 to Uber").unwrap();
        assert_eq!(hit.value.currency, "EUR");
    }

    #[test]
    fn test_first_match_where_skips_rejected_spans() {
        let cascade = amount_patterns();
        let text = "Avl Bal Rs 5,000.00. USD 20 spent";
        let balance = balance_patterns().all_spans(text);
        let hit = cascade
            .first_match_where(text, |span| {
                !balance.iter().any(|b| b.start < span.end && span.start < b.end)
            })
            .unwrap();
        assert_eq!(hit.value.value, 20.0);
        assert_eq!(hit.value.currency, "USD");
    }

    #[test]
    fn test_reference_requires_a_digit() {
        let cascade = reference_patterns();
        assert!(cascade.first_match("Ref: ABCDEFGH").is_none());
        let hit = cascade.first_match("UPI Ref No 523912345678.").unwrap();
        assert_eq!(hit.value, "523912345678");
    }

    #[test]
    fn test_card_suffix_wins_over_upi_marker() {
        let cascade = account_patterns();
        let hit = cascade
            .first_match("Rs 250 paid via UPI using Card XX9006")
            .unwrap();
        assert_eq!(hit.value.suffix, "9006");
        assert!(hit.value.explicit);

        let hit = cascade.first_match("Rs 250 paid via UPI to zomato@ybl").unwrap();
        assert_eq!(hit.value.suffix, UPI_ACCOUNT_SUFFIX);
        assert!(!hit.value.explicit);
    }

    #[test]
    fn test_parse_amount_rejects_zero() {
        assert_eq!(parse_amount("1,23,456.50"), Some(123456.5));
        assert_eq!(parse_amount("0.00"), None);
    }
}
