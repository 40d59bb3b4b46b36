//! Dossier configuration management.

use std::collections::HashMap;
use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::types::money::{currency_digits, tolerance_for_digits};

/// Dossier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dossier-wide settings.
    pub dossier: DossierConfig,
    /// Operation templates used by the closing workflow.
    pub closing: ClosingConfig,
    /// Balance comparison settings.
    pub balance: BalanceConfig,
    /// Snapshot storage settings.
    pub storage: StorageConfig,
}

/// Dossier-wide settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DossierConfig {
    /// User recorded on entries created by the engine.
    pub user: String,
    /// Ledger assigned to imported rows that name none.
    pub import_ledger: String,
}

impl Default for DossierConfig {
    fn default() -> Self {
        Self {
            user: "admin".to_string(),
            import_ledger: "OD".to_string(),
        }
    }
}

/// An operation template used to synthesize entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateConfig {
    /// Template identifier stamped on generated entries.
    pub id: String,
    /// Ledger generated entries are posted into.
    pub ledger: String,
    /// Label of generated entries.
    pub label: String,
}

/// Closing workflow templates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClosingConfig {
    /// Template for the balancing entry dated at period end.
    pub closing_template: TemplateConfig,
    /// Template for the carried-forward entry dated at next period begin.
    pub forward_template: TemplateConfig,
}

impl Default for ClosingConfig {
    fn default() -> Self {
        Self {
            closing_template: TemplateConfig {
                id: "SOLDE".to_string(),
                ledger: "CLO".to_string(),
                label: "Closing balance".to_string(),
            },
            forward_template: TemplateConfig {
                id: "REPORT".to_string(),
                ledger: "AN".to_string(),
                label: "Balance brought forward".to_string(),
            },
        }
    }
}

/// Balance comparison settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Fixed tolerance overriding the per-currency one.
    pub tolerance: Option<Decimal>,
    /// Fractional digits per currency code, overriding the ISO defaults.
    pub currency_digits: HashMap<String, u32>,
}

impl BalanceConfig {
    /// Tolerance used to compare amounts in `currency`.
    #[must_use]
    pub fn tolerance_for(&self, currency: &str) -> Decimal {
        if let Some(fixed) = self.tolerance {
            return fixed;
        }
        let digits = self
            .currency_digits
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or_else(|| currency_digits(currency));
        tolerance_for_digits(digits)
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the JSON snapshot of the dossier.
    pub snapshot_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("carnet.json"),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("CARNET").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("EUR", dec!(0.001))]
    #[case("JPY", dec!(0.1))]
    #[case("TND", dec!(0.0001))]
    fn test_default_tolerance(#[case] currency: &str, #[case] expected: Decimal) {
        assert_eq!(BalanceConfig::default().tolerance_for(currency), expected);
    }

    #[test]
    fn test_fixed_tolerance_wins() {
        let balance = BalanceConfig {
            tolerance: Some(dec!(0.01)),
            currency_digits: HashMap::new(),
        };
        assert_eq!(balance.tolerance_for("JPY"), dec!(0.01));
    }

    #[test]
    fn test_currency_digits_override() {
        let mut digits = HashMap::new();
        digits.insert("XBT".to_string(), 8);
        let balance = BalanceConfig {
            tolerance: None,
            currency_digits: digits,
        };
        assert_eq!(balance.tolerance_for("xbt"), dec!(0.000000001));
    }

    #[test]
    fn test_load_with_environment_override() {
        temp_env::with_vars(
            [
                ("CARNET__DOSSIER__USER", Some("marie")),
                ("CARNET__DOSSIER__IMPORT_LEDGER", Some("BQ")),
            ],
            || {
                let config = AppConfig::load().unwrap();
                assert_eq!(config.dossier.user, "marie");
                assert_eq!(config.dossier.import_ledger, "BQ");
                assert_eq!(config.closing.closing_template.id, "SOLDE");
            },
        );
    }
}
