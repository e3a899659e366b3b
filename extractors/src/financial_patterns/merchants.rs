use super::{FieldPattern, PatternCascade};
use regex::{Captures, Regex};

/// Brands recognized by name anywhere in a message, with their display form
const KNOWN_BRANDS: &[(&str, &str)] = &[
    ("zomato", "Zomato"),
    ("swiggy", "Swiggy"),
    ("zepto", "Zepto"),
    ("blinkit", "Blinkit"),
    ("bigbasket", "BigBasket"),
    ("dunzo", "Dunzo"),
    ("amazon", "Amazon"),
    ("flipkart", "Flipkart"),
    ("myntra", "Myntra"),
    ("ajio", "Ajio"),
    ("nykaa", "Nykaa"),
    ("meesho", "Meesho"),
    ("uber", "Uber"),
    ("ola", "Ola"),
    ("rapido", "Rapido"),
    ("irctc", "IRCTC"),
    ("makemytrip", "MakeMyTrip"),
    ("goibibo", "Goibibo"),
    ("indigo", "IndiGo"),
    ("netflix", "Netflix"),
    ("spotify", "Spotify"),
    ("hotstar", "Hotstar"),
    ("youtube", "YouTube"),
    ("bookmyshow", "BookMyShow"),
    ("airtel", "Airtel"),
    ("jio", "Jio"),
    ("vodafone", "Vodafone"),
    ("bescom", "BESCOM"),
    ("tata power", "Tata Power"),
    ("apollo", "Apollo"),
    ("pharmeasy", "PharmEasy"),
    ("cult.fit", "Cult.fit"),
    ("starbucks", "Starbucks"),
    ("mcdonald", "McDonald's"),
    ("dominos", "Domino's"),
    ("domino's", "Domino's"),
    ("dmart", "DMart"),
    ("reliance", "Reliance"),
    ("zerodha", "Zerodha"),
    ("groww", "Groww"),
    ("google", "Google"),
    ("apple", "Apple"),
];

/// Words that name the holder's own instrument or the rail, never a merchant
const NON_MERCHANT_WORDS: &[&str] = &[
    "your", "you", "a/c", "ac", "acct", "account", "card", "the", "rs", "rs.", "inr", "upi",
    "imps", "neft", "rtgs", "vpa", "bank", "beneficiary", "mobile", "wallet", "credit",
    "debit", "ref", "txn", "p2m", "p2a", "dr", "cr", "info", "on", "via", "of", "no", "id",
    "amount", "is", "ending",
];

const CANDIDATE: &str = r"([A-Za-z0-9][A-Za-z0-9&'._@\-*/ ]{1,60}?)";

fn candidate(captures: &Captures) -> Option<String> {
    Some(captures.get(1)?.as_str().to_string())
}

fn upi_handle(captures: &Captures) -> Option<String> {
    handle_name(captures.get(1)?.as_str())
}

/// UPI handle "zomato.payu@ybl" names "zomato"
fn handle_name(handle: &str) -> Option<String> {
    let handle = handle.split('@').next()?;
    let name: String = handle
        .split(['.', '-', '_'])
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    (name.len() >= 3).then_some(name)
}

fn merchant_patterns() -> PatternCascade<String> {
    let stop = r"(?:\s+(?:on|via|using|with|from|ref|txn|upi|avl|avbl|is|has|was|dated|for|by)\b|[.,;:()]|\s*$|\s+\d)";
    PatternCascade::new(vec![
        FieldPattern::new(
            "at_or_to",
            &format!(r"(?i)\b(?:at|to|towards)\s+(?:vpa\s+)?{CANDIDATE}{stop}"),
            candidate,
        ),
        FieldPattern::new(
            "info_field",
            &format!(r"(?i)\b(?:info|descr(?:iption)?|narration|remarks?)\s*[:\-]\s*{CANDIDATE}(?:[.,;]|\s{{2,}}|\s*$)"),
            candidate,
        ),
        FieldPattern::new(
            "upi_path",
            r"(?i)\bupi/(?:p2m|p2a|cr|dr)?/?\d+/([A-Za-z][A-Za-z .&]{2,40})",
            candidate,
        ),
        FieldPattern::new(
            "upi_handle",
            r"(?i)\b([A-Za-z][A-Za-z0-9._\-]{2,})@(?:ok[a-z]+|ybl|paytm|axl|ibl|upi|apl|yapl|icici|hdfcbank|sbi|axisbank|kotak|pt[a-z]+)(?:[\s,;)]|$)",
            upi_handle,
        ),
        FieldPattern::new(
            "card_transaction",
            r"(?i)\b(?:pos|ecom|txn)\s+(?:at\s+)?([A-Za-z][A-Za-z0-9&'. *\-]{2,40}?)(?:\s+on\b|[.,]|\s*$)",
            candidate,
        ),
        FieldPattern::new(
            "for_purpose",
            &format!(r"(?i)\bfor\s+{CANDIDATE}{stop}"),
            candidate,
        ),
        FieldPattern::new(
            "from_counterparty",
            &format!(r"(?i)\bfrom\s+{CANDIDATE}{stop}"),
            candidate,
        ),
    ])
}

/// Ordered merchant cascade plus the curated brand list
pub struct MerchantDirectory {
    cascade: PatternCascade<String>,
    brands: Vec<(Regex, &'static str)>,
}

impl MerchantDirectory {
    pub fn new() -> Self {
        let brands = KNOWN_BRANDS
            .iter()
            .map(|(needle, display)| {
                let regex = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(needle))).unwrap();
                (regex, *display)
            })
            .collect();

        Self {
            cascade: merchant_patterns(),
            brands,
        }
    }

    /// Merchant named by the text, with the pattern that produced it
    pub fn find(&self, text: &str) -> Option<(String, &'static str)> {
        for pattern in &self.cascade.patterns {
            for captures in pattern.regex.captures_iter(text) {
                let Some(raw) = (pattern.map)(&captures) else {
                    continue;
                };
                if let Some(name) = self.normalize(&raw) {
                    return Some((name, pattern.name));
                }
            }
        }

        self.brand_in(text).map(|name| (name.to_string(), "known_brand"))
    }

    /// First curated brand mentioned in `text`
    pub fn brand_in(&self, text: &str) -> Option<&'static str> {
        self.brands
            .iter()
            .find(|(regex, _)| regex.is_match(text))
            .map(|(_, display)| *display)
    }

    /// Cleans a raw candidate; `None` when it does not look like a merchant
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let first_token = raw.split_whitespace().next()?;
        if is_non_merchant(first_token) || raw.split_whitespace().any(is_masked_number) {
            return None;
        }

        let segment = if raw.contains('/') {
            raw.split('/')
                .map(str::trim)
                .filter(|s| s.chars().any(|c| c.is_ascii_alphabetic()))
                .filter(|s| !is_non_merchant(s))
                .last()?
        } else {
            raw.trim()
        };

        let cleaned = segment
            .trim_matches(|c: char| c == '*' || c == '-' || c == '.' || c == '\'' || c.is_whitespace())
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let cleaned = if cleaned.contains('@') && !cleaned.contains(' ') {
            handle_name(&cleaned)?
        } else {
            cleaned
        };

        if cleaned.len() < 2 || is_non_merchant(&cleaned) {
            return None;
        }
        let first = cleaned.split_whitespace().next().unwrap_or_default();
        if is_non_merchant(first) {
            return None;
        }
        if !cleaned.chars().any(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        if let Some(brand) = self.brand_in(&cleaned) {
            return Some(brand.to_string());
        }
        Some(display_case(&cleaned))
    }
}

impl Default for MerchantDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// "XX1234", "**1234"
fn is_masked_number(token: &str) -> bool {
    let digits = token.trim_start_matches(|c: char| matches!(c, 'x' | 'X' | '*'));
    digits.len() < token.len()
        && token.len() - digits.len() >= 2
        && digits.len() >= 3
        && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_non_merchant(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    NON_MERCHANT_WORDS.contains(&lower.as_str())
}

/// ALL-CAPS bank spellings become title case; mixed case is kept
fn display_case(value: &str) -> String {
    if value.chars().any(|c| c.is_ascii_lowercase()) {
        return value.to_string();
    }
    value
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
