use serde::{Deserialize, Serialize};

pub mod category;
pub mod exchange_rate;
pub mod extraction;
pub mod recurring;
pub mod settings;
pub mod source_message;
pub mod transaction;

pub use category::{
    default_category_names, CategoriesResponse, Category, UpsertCategoryRequest,
    DEFAULT_CATEGORIES, FALLBACK_CATEGORY,
};
pub use exchange_rate::{ExchangeRateCacheEntry, ExchangeRatesResponse};
pub use extraction::{ExtractedField, ExtractionError};
pub use recurring::{
    Frequency, RecurringTransaction, RecurringTransactionsResponse, UpdateRecurringRequest,
};
pub use settings::{ApiKeyConfig, SettingsResponse, UpdateApiKeysRequest};
pub use source_message::{
    CreateSourceMessagesRequest, EnqueueMessagesResponse, ExtractionAttempt,
    ExtractionAttemptsResponse, NewSourceMessage, SourceKind, SourceMessage, SyncReport,
};
pub use transaction::{
    DeleteTransactionsResponse, ExtractionMethod, IngestTextRequest, IngestTextResponse,
    MatchedPattern, ParseStatementImageRequest, ParseTextRequest, ParsingDiagnostics,
    ParsingResult, StatementCandidate, StatementImageResponse, Transaction, TransactionFilter,
    TransactionType, TransactionsResponse, UpdateTransactionRequest, UNKNOWN_MERCHANT,
    UPI_ACCOUNT_SUFFIX,
};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
