//! Merchant to category mapping
//!
//! A keyword dictionary is tried first, then a fuzzy comparison of merchant
//! tokens against the same keywords. Keywords match whole words, with an
//! optional plural or possessive "s". The result is always one of the
//! active category names handed in by the caller.

use regex::Regex;
use shared_types::{FALLBACK_CATEGORY, UNKNOWN_MERCHANT};
use similar::TextDiff;

/// Category name and the merchant keywords that imply it
const KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Food & Dining",
        &[
            "zomato", "swiggy", "restaurant", "cafe", "coffee", "starbucks", "mcdonald",
            "domino", "pizza", "burger", "kfc", "dine", "food", "bakery", "eatery", "kitchen",
        ],
    ),
    (
        "Groceries",
        &[
            "bigbasket", "blinkit", "zepto", "dmart", "grocery", "grocer", "supermarket",
            "mart", "fresh", "dunzo", "kirana",
        ],
    ),
    (
        "Shopping",
        &[
            "amazon", "flipkart", "myntra", "ajio", "nykaa", "meesho", "store", "retail",
            "shop", "mall", "fashion", "lifestyle", "decathlon",
        ],
    ),
    (
        "Transportation",
        &[
            "uber", "ola", "rapido", "metro", "fuel", "petrol", "diesel", "fastag", "parking",
            "hpcl", "bpcl", "iocl", "indian oil", "shell",
        ],
    ),
    (
        "Travel",
        &[
            "irctc", "makemytrip", "goibibo", "indigo", "airline", "airways", "hotel",
            "cleartrip", "yatra", "airbnb", "booking.com",
        ],
    ),
    (
        "Bills & Utilities",
        &[
            "airtel", "jio", "vodafone", "bsnl", "electricity", "bescom", "power", "water",
            "gas", "broadband", "recharge", "bill", "insurance", "tata power",
        ],
    ),
    (
        "Entertainment",
        &[
            "netflix", "spotify", "hotstar", "prime video", "youtube", "bookmyshow", "pvr",
            "inox", "cinema", "movie", "gaming", "steam",
        ],
    ),
    (
        "Health & Fitness",
        &[
            "apollo", "pharmeasy", "pharmacy", "medical", "hospital", "clinic", "cult.fit",
            "gym", "fitness", "health", "diagnostic", "1mg",
        ],
    ),
    (
        "Education",
        &["school", "college", "university", "udemy", "coursera", "byju", "tuition", "academy"],
    ),
    (
        "Investments",
        &["zerodha", "groww", "mutual fund", "sip", "upstox", "securities", "nps", "ppf"],
    ),
    (
        "Transfers",
        &["transfer", "neft", "imps", "rtgs", "self", "wallet"],
    ),
    (
        "Income",
        &["salary", "payroll", "employer", "interest", "dividend", "refund", "cashback"],
    ),
];

const DEFAULT_FUZZY_THRESHOLD: f32 = 0.8;

pub struct CategoryClassifier {
    fuzzy_threshold: Option<f32>,
    keyword_patterns: Vec<(&'static str, Vec<Regex>)>,
}

fn keyword_patterns() -> Vec<(&'static str, Vec<Regex>)> {
    KEYWORDS
        .iter()
        .map(|(category, keywords)| {
            let patterns = keywords
                .iter()
                .map(|kw| Regex::new(&format!(r"\b{}(?:'?s)?\b", regex::escape(kw))).unwrap())
                .collect();
            (*category, patterns)
        })
        .collect()
}

impl CategoryClassifier {
    pub fn new() -> Self {
        Self {
            fuzzy_threshold: Some(DEFAULT_FUZZY_THRESHOLD),
            keyword_patterns: keyword_patterns(),
        }
    }

    /// Keyword matching only
    pub fn exact_only() -> Self {
        Self {
            fuzzy_threshold: None,
            keyword_patterns: keyword_patterns(),
        }
    }

    /// Category for `merchant`, restricted to `active` categories
    pub fn classify(&self, merchant: &str, active: &[String]) -> String {
        let merchant_lower = merchant.trim().to_lowercase();

        if !merchant_lower.is_empty() && !merchant.trim().eq_ignore_ascii_case(UNKNOWN_MERCHANT) {
            for (category, patterns) in &self.keyword_patterns {
                let Some(name) = find_active(category, active) else {
                    continue;
                };
                if patterns.iter().any(|p| p.is_match(&merchant_lower)) {
                    return name;
                }
            }

            if let Some(name) = self.fuzzy_match(&merchant_lower, active) {
                return name;
            }
        }

        fallback_category(active)
    }

    fn fuzzy_match(&self, merchant_lower: &str, active: &[String]) -> Option<String> {
        let threshold = self.fuzzy_threshold?;
        let mut best: Option<(f32, String)> = None;

        for token in merchant_lower.split(|c: char| !c.is_alphanumeric()) {
            if token.len() < 4 {
                continue;
            }
            for (category, keywords) in KEYWORDS {
                let Some(name) = find_active(category, active) else {
                    continue;
                };
                for keyword in keywords.iter().filter(|kw| kw.len() >= 4) {
                    let ratio = TextDiff::from_chars(token, *keyword).ratio();
                    if ratio >= threshold && best.as_ref().map_or(true, |(r, _)| ratio > *r) {
                        best = Some((ratio, name.clone()));
                    }
                }
            }
        }

        best.map(|(_, name)| name)
    }
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// The active entry matching `category`, in the caller's spelling
fn find_active(category: &str, active: &[String]) -> Option<String> {
    active
        .iter()
        .find(|a| a.eq_ignore_ascii_case(category))
        .cloned()
}

/// "Other" when active, otherwise the last active category
pub fn fallback_category(active: &[String]) -> String {
    find_active(FALLBACK_CATEGORY, active)
        .or_else(|| active.last().cloned())
        .unwrap_or_else(|| FALLBACK_CATEGORY.to_string())
}

/// Case-insensitive membership in the active list, returning its spelling
pub fn resolve_category(candidate: &str, active: &[String]) -> Option<String> {
    find_active(candidate.trim(), active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::default_category_names;

    #[test]
    fn test_keyword_match() {
        let classifier = CategoryClassifier::new();
        let active = default_category_names();
        assert_eq!(classifier.classify("Zomato", &active), "Food & Dining");
        assert_eq!(classifier.classify("UBER INDIA", &active), "Transportation");
        assert_eq!(classifier.classify("Netflix", &active), "Entertainment");
    }

    #[test]
    fn test_keywords_do_not_match_inside_words() {
        let classifier = CategoryClassifier::exact_only();
        let active = default_category_names();
        assert_eq!(classifier.classify("Coca Cola Bottlers", &active), "Other");
        assert_eq!(classifier.classify("Gossip Lounge", &active), "Other");
        assert_eq!(classifier.classify("Vegas Nights", &active), "Other");
        assert_eq!(classifier.classify("OLA CABS", &active), "Transportation");
        assert_eq!(classifier.classify("McDonald's", &active), "Food & Dining");
        assert_eq!(classifier.classify("Dominos Pizza", &active), "Food & Dining");
    }

    #[test]
    fn test_fuzzy_match_catches_misspellings() {
        let classifier = CategoryClassifier::new();
        let active = default_category_names();
        assert_eq!(classifier.classify("Swigy", &active), "Food & Dining");
        assert_eq!(
            CategoryClassifier::exact_only().classify("Swigy", &active),
            "Other"
        );
    }

    #[test]
    fn test_result_is_always_active() {
        let classifier = CategoryClassifier::new();
        let active = vec!["Groceries".to_string(), "Misc".to_string()];
        // Food & Dining is not active, so the keyword hit is skipped
        assert_eq!(classifier.classify("Zomato", &active), "Misc");
        assert_eq!(classifier.classify("BigBasket", &active), "Groceries");
    }

    #[test]
    fn test_unknown_merchant_falls_back() {
        let classifier = CategoryClassifier::new();
        let active = default_category_names();
        assert_eq!(classifier.classify("Unknown Merchant", &active), "Other");
        assert_eq!(classifier.classify("", &active), "Other");
    }

    #[test]
    fn test_resolve_category_is_case_insensitive() {
        let active = default_category_names();
        assert_eq!(
            resolve_category("food & dining", &active),
            Some("Food & Dining".to_string())
        );
        assert_eq!(resolve_category("Crypto", &active), None);
    }
}
