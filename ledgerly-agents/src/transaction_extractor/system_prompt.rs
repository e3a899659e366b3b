use super::types::ModelTransaction;
use shared_types::UPI_ACCOUNT_SUFFIX;

pub fn build_extraction_prompt() -> String {
    r#"You isolate financial transactions from bank notifications (SMS and email).

## Your Task

Read the message and rewrite the single transaction it reports as one short plain-text statement.
Keep only facts that are printed in the message:
- the amount and its currency
- whether money left or entered the account holder's account
- the merchant or counterparty
- the card or account number (last digits), or that UPI was used
- the reference number and the date

Drop greetings, disclaimers, offers, balances and helpline text.
If the message is not a transaction (OTP, promotion, statement reminder), reply with exactly: NO_TRANSACTION

Reply with the statement only, no Markdown."#
        .to_string()
}

pub fn build_structuring_prompt(categories: &[String], base_currency: &str) -> String {
    let schema = schemars::schema_for!(ModelTransaction);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        r#"You convert a transaction statement into JSON.

## Output Schema

{}

## Field Rules

- **amount**: a plain number without separators or symbols, never negative
- **type**: "debit" when money was debited from, spent using or paid via the account holder's card or account; "credit" when money was credited to or received into the account holder's account. Decide from the holder's side even when another party is said to be "credited". Use "unknown" only if neither applies
- **category**: exactly one of [{}], or null
- **currency**: ISO 4217 code; assume {} when none is printed
- **account_last_digits**: the last four digits of the card or account; "{}" if only a UPI id is given; null otherwise. A printed card or account number always wins over a UPI id
- **date**: YYYY-MM-DD, or null
- **confidence**: your confidence between 0 and 1

Reply with a single JSON object and nothing else."#,
        schema_json,
        categories.join(", "),
        base_currency,
        UPI_ACCOUNT_SUFFIX,
    )
}
