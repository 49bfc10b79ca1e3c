//! Environment-backed settings.
//!
//! Secrets stay out of the CLI: the private key and wallet address are read
//! from the environment (or a .env file) only.

use anyhow::Result;

/// Runtime settings loaded from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Signing key for live order placement. Absent in simulation mode.
    pub private_key: Option<String>,

    /// Our wallet address, used to bound closing orders by what we hold.
    pub wallet_address: Option<String>,

    /// SQLite database URL.
    pub database_url: String,
}

impl Settings {
    /// Load settings, reading a .env file first if one exists.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            private_key: std::env::var("HYPERCOPY_PRIVATE_KEY").ok(),
            wallet_address: std::env::var("HYPERCOPY_WALLET_ADDRESS").ok(),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:hypercopy.db?mode=rwc".to_string()),
        })
    }
}
