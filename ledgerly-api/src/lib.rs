pub mod config;
pub mod database;
pub mod handlers;
pub mod helpers;
pub mod jobs;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use database::Database;
pub use services::AppServices;
