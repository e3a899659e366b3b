pub mod config;
pub mod pipeline;
pub mod system_prompt;
pub mod types;

pub use config::PipelineConfig;
pub use pipeline::HybridExtractionPipeline;
pub use types::{ModelTransaction, ModelTransactionType};
