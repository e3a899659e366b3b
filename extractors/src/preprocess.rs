//! Reduces an email or SMS body to the few lines that carry transaction facts.

use regex::Regex;

const MAX_LINES: usize = 3;

const GREETINGS: &[&str] = &["dear", "hello", "hi"];

/// Lines at and after these markers are footer text
const BOILERPLATE_MARKERS: &[&str] = &["in case", "if you", "available credit", "total credit"];

pub struct ContentPreprocessor {
    script_blocks: Regex,
    style_blocks: Regex,
    line_breaks: Regex,
    tags: Regex,
    numeric_entities: Regex,
    spaces: Regex,
    otp_markers: Regex,
}

impl ContentPreprocessor {
    pub fn new() -> Self {
        Self {
            script_blocks: Regex::new(r"(?is)<script\b.*?</script\s*>").unwrap(),
            style_blocks: Regex::new(r"(?is)<style\b.*?</style\s*>").unwrap(),
            line_breaks: Regex::new(r"(?i)<\s*(?:br|/p|/div|/tr|/li|/h[1-6]|/table)\b[^>]*>")
                .unwrap(),
            tags: Regex::new(r"(?s)<[^>]+>").unwrap(),
            numeric_entities: Regex::new(r"&#(x?[0-9A-Fa-f]+);").unwrap(),
            spaces: Regex::new(r"[ \t\u{a0}\r\f\v]+").unwrap(),
            otp_markers: Regex::new(r"(?i)\b(?:otp|one[\s-]time\s+password|verification\s+code)\b")
                .unwrap(),
        }
    }

    /// Markup-free text with whitespace collapsed; line structure is kept
    pub fn to_plain_text(&self, raw: &str) -> String {
        let text = self.script_blocks.replace_all(raw, " ");
        let text = self.style_blocks.replace_all(&text, " ");
        let text = self.line_breaks.replace_all(&text, "\n");
        let text = self.tags.replace_all(&text, " ");
        let text = self.decode_entities(&text);

        text.lines()
            .map(|line| self.spaces.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The first few informative lines of `body`, or `snippet` when none survive
    pub fn preprocess(&self, body: &str, snippet: Option<&str>) -> String {
        let plain = self.to_plain_text(body);
        let mut selected = Vec::with_capacity(MAX_LINES);

        for line in plain.lines() {
            let lower = line.to_lowercase();
            if BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m)) {
                break;
            }
            if is_greeting(&lower) {
                continue;
            }
            selected.push(line);
            if selected.len() == MAX_LINES {
                break;
            }
        }

        if selected.is_empty() {
            return snippet.unwrap_or(body).to_string();
        }
        selected.join(" ")
    }

    /// OTP and verification-code messages mention amounts but are not transactions
    pub fn is_one_time_code(&self, text: &str) -> bool {
        self.otp_markers.is_match(text)
    }

    fn decode_entities(&self, text: &str) -> String {
        let named = text
            .replace("&nbsp;", " ")
            .replace("&#8377;", "₹")
            .replace("&rupee;", "₹")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&rsquo;", "'")
            .replace("&lsquo;", "'")
            .replace("&ndash;", "-")
            .replace("&mdash;", "-");

        let numeric = self
            .numeric_entities
            .replace_all(&named, |caps: &regex::Captures| {
                let raw = &caps[1];
                let code = match raw.strip_prefix('x') {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => raw.parse::<u32>().ok(),
                };
                code.and_then(char::from_u32)
                    .map(String::from)
                    .unwrap_or_else(|| caps[0].to_string())
            });

        // last, so "&amp;lt;" stays literal
        numeric.replace("&amp;", "&")
    }
}

impl Default for ContentPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn is_greeting(lower: &str) -> bool {
    GREETINGS.iter().any(|greeting| {
        lower == *greeting
            || lower
                .strip_prefix(greeting)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| !c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup_and_greeting() {
        let html = r#"<html><head><style>p { color: red; }</style></head>
            <body><p>Dear Customer,</p>
            <p>Rs&nbsp;1,400.00 spent using Card XX2008 at ZOMATO.</p>
            <script>track();</script>
            <p>If you did not make this transaction, call us.</p></body></html>"#;

        let preprocessor = ContentPreprocessor::new();
        assert_eq!(
            preprocessor.preprocess(html, None),
            "Rs 1,400.00 spent using Card XX2008 at ZOMATO."
        );
    }

    #[test]
    fn test_keeps_at_most_three_lines() {
        let body = "Hi Priya\nline one\nline two\nline three\nline four";
        let preprocessor = ContentPreprocessor::new();
        assert_eq!(
            preprocessor.preprocess(body, None),
            "line one line two line three"
        );
    }

    #[test]
    fn test_stops_at_boilerplate() {
        let body = "Rs 500 debited from A/c XX1234.\nAvailable credit limit: Rs 40,000\nline after";
        let preprocessor = ContentPreprocessor::new();
        assert_eq!(
            preprocessor.preprocess(body, None),
            "Rs 500 debited from A/c XX1234."
        );
    }

    #[test]
    fn test_falls_back_to_snippet() {
        let preprocessor = ContentPreprocessor::new();
        let body = "<p>Dear Customer,</p><p>In case of queries call 1800</p>";
        assert_eq!(
            preprocessor.preprocess(body, Some("Transaction alert")),
            "Transaction alert"
        );
    }

    #[test]
    fn test_greeting_requires_word_boundary() {
        assert!(is_greeting("hi,"));
        assert!(is_greeting("hello there"));
        assert!(!is_greeting("hdfc bank: highway toll rs 95"));
        assert!(!is_greeting("dearness allowance credited"));
    }

    #[test]
    fn test_decodes_numeric_entities() {
        let preprocessor = ContentPreprocessor::new();
        assert_eq!(
            preprocessor.to_plain_text("&#8377;250 &amp; &#x20B9;10"),
            "₹250 & ₹10"
        );
    }

    #[test]
    fn test_one_time_code_detection() {
        let preprocessor = ContentPreprocessor::new();
        assert!(preprocessor.is_one_time_code("482913 is your OTP for txn of Rs 500"));
        assert!(!preprocessor.is_one_time_code("Rs 500 spent at Zomato"));
    }
}
