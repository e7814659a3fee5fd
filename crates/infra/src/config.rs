//! Pool configuration loading and validation.

use forgelend_core::{DomainError, DomainResult};

const DEFAULT_CLAIM_NAME: &str = "Forgelend Claim";
const DEFAULT_CLAIM_SYMBOL: &str = "cTKN";
const MAX_SYMBOL_LEN: usize = 11;

/// Claim-token metadata for one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    claim_name: String,
    claim_symbol: String,
}

impl PoolConfig {
    /// Claim units use the same 1e18 scale as the exchange rate.
    pub const DECIMALS: u8 = 18;

    pub fn new(claim_name: impl Into<String>, claim_symbol: impl Into<String>) -> DomainResult<Self> {
        let config = Self {
            claim_name: claim_name.into().trim().to_string(),
            claim_symbol: claim_symbol.into().trim().to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from `FORGELEND_CLAIM_NAME` / `FORGELEND_CLAIM_SYMBOL`, falling
    /// back to defaults for unset variables.
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DomainResult<Self> {
        let name = lookup("FORGELEND_CLAIM_NAME").unwrap_or_else(|| {
            tracing::debug!("FORGELEND_CLAIM_NAME not set; using default");
            DEFAULT_CLAIM_NAME.to_string()
        });
        let symbol = lookup("FORGELEND_CLAIM_SYMBOL").unwrap_or_else(|| {
            tracing::debug!("FORGELEND_CLAIM_SYMBOL not set; using default");
            DEFAULT_CLAIM_SYMBOL.to_string()
        });
        Self::new(name, symbol)
    }

    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }

    pub fn claim_symbol(&self) -> &str {
        &self.claim_symbol
    }

    fn validate(&self) -> DomainResult<()> {
        if self.claim_name.is_empty() {
            return Err(DomainError::invalid_config("claim_name", "cannot be empty"));
        }
        if self.claim_symbol.is_empty() {
            return Err(DomainError::invalid_config("claim_symbol", "cannot be empty"));
        }
        if self.claim_symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(DomainError::invalid_config(
                "claim_symbol",
                format!("longer than {MAX_SYMBOL_LEN} characters"),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            claim_name: DEFAULT_CLAIM_NAME.to_string(),
            claim_symbol: DEFAULT_CLAIM_SYMBOL.to_string(),
        }
    }
}
