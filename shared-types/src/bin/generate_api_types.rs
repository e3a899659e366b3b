use shared_types::*;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for API types
    let mut types = Vec::new();

    // Transaction types
    types.push(clean_type(Transaction::export_to_string()?));
    types.push(clean_type(TransactionType::export_to_string()?));
    types.push(clean_type(ExtractionMethod::export_to_string()?));
    types.push(clean_type(TransactionFilter::export_to_string()?));
    types.push(clean_type(UpdateTransactionRequest::export_to_string()?));
    types.push(clean_type(TransactionsResponse::export_to_string()?));

    // Parsing types
    types.push(clean_type(ParsingResult::export_to_string()?));
    types.push(clean_type(ParsingDiagnostics::export_to_string()?));
    types.push(clean_type(MatchedPattern::export_to_string()?));
    types.push(clean_type(ExtractedField::export_to_string()?));
    types.push(clean_type(ParseTextRequest::export_to_string()?));
    types.push(clean_type(IngestTextRequest::export_to_string()?));
    types.push(clean_type(IngestTextResponse::export_to_string()?));
    types.push(clean_type(DeleteTransactionsResponse::export_to_string()?));
    types.push(clean_type(ParseStatementImageRequest::export_to_string()?));
    types.push(clean_type(StatementCandidate::export_to_string()?));
    types.push(clean_type(StatementImageResponse::export_to_string()?));

    // Recurring types
    types.push(clean_type(Frequency::export_to_string()?));
    types.push(clean_type(RecurringTransaction::export_to_string()?));
    types.push(clean_type(RecurringTransactionsResponse::export_to_string()?));
    types.push(clean_type(UpdateRecurringRequest::export_to_string()?));

    // Exchange rate types
    types.push(clean_type(ExchangeRateCacheEntry::export_to_string()?));
    types.push(clean_type(ExchangeRatesResponse::export_to_string()?));

    // Category types
    types.push(clean_type(Category::export_to_string()?));
    types.push(clean_type(CategoriesResponse::export_to_string()?));
    types.push(clean_type(UpsertCategoryRequest::export_to_string()?));

    // Ingestion types
    types.push(clean_type(SourceKind::export_to_string()?));
    types.push(clean_type(SourceMessage::export_to_string()?));
    types.push(clean_type(NewSourceMessage::export_to_string()?));
    types.push(clean_type(CreateSourceMessagesRequest::export_to_string()?));
    types.push(clean_type(SyncReport::export_to_string()?));
    types.push(clean_type(EnqueueMessagesResponse::export_to_string()?));
    types.push(clean_type(ExtractionAttempt::export_to_string()?));
    types.push(clean_type(ExtractionAttemptsResponse::export_to_string()?));

    // Settings types
    types.push(clean_type(ApiKeyConfig::export_to_string()?));
    types.push(clean_type(SettingsResponse::export_to_string()?));
    types.push(clean_type(UpdateApiKeysRequest::export_to_string()?));

    let output_dir = Path::new("../web/src/api-types");
    fs::create_dir_all(output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // Some definitions import their field types (Transaction imports TransactionType)
    let lines: Vec<&str> = type_def.lines().collect();
    let has_import = lines
        .iter()
        .any(|line| line.trim().starts_with("import type"));

    let filtered: Vec<&str> = lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            // Keep import lines only for definitions that reference other types
            if trimmed.starts_with("import type") {
                return has_import;
            }
            // Filter out the generated comment line
            !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .cloned()
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
