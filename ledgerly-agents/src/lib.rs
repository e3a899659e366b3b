pub mod currency;
pub mod dedup;
pub mod llm;
pub mod recurring;
pub mod storage;
pub mod transaction_extractor;
pub mod vision;

pub use currency::{CurrencyRateCache, OpenErApiSource, RateCacheConfig, RateError, RateSource};
pub use dedup::{DeduplicationEngine, DuplicateRule, InsertOutcome};
pub use llm::{GeminiClient, LlmClient, LlmError};
pub use recurring::RecurringDetector;
pub use storage::{
    CategoryProvider, CategoryStore, RateStore, RecurringStore, SqliteLedgerStorage,
    TransactionStore,
};
pub use transaction_extractor::{HybridExtractionPipeline, PipelineConfig};
pub use vision::{StatementPage, VisionConfig, VisionStatementExtractor};
