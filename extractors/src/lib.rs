//! Extractors Crate
//!
//! Synchronous, network-free extraction for financial notification text:
//! content preprocessing, the deterministic field extractor (ordered regex
//! cascades), merchant-to-category classification and SMS export reading.
//!
//! Model-backed extraction lives in `ledgerly-agents`; this crate is the
//! fallback it relies on and the quick-parse path for callers that cannot
//! await.
//!
//! # Example
//!
//! ```rust,ignore
//! use extractors::DeterministicExtractor;
//! use shared_types::default_category_names;
//!
//! let extractor = DeterministicExtractor::new();
//! let txn = extractor.quick_parse("Rs 250 spent using Card XX2008 at ZOMATO.", &default_category_names());
//! assert!(txn.is_parsed);
//! ```

pub mod category_classifier;
pub mod financial_patterns;
pub mod preprocess;
pub mod sms_export;

pub use category_classifier::{fallback_category, resolve_category, CategoryClassifier};
pub use financial_patterns::{DeterministicExtractor, FieldExtraction, MerchantDirectory};
pub use preprocess::ContentPreprocessor;
pub use sms_export::{SmsExportError, SmsExportParser};
