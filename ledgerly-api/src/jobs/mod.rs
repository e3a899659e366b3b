pub mod ingestion_manager;
