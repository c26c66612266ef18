//! Ledger configuration loading and representation.

use std::str::FromStr;

pub const MAX_CONFLICT_RETRIES_ENV: &str = "STOCKLEDGER_MAX_CONFLICT_RETRIES";
pub const SALE_NUMBER_PREFIX_ENV: &str = "STOCKLEDGER_SALE_NUMBER_PREFIX";
pub const SEQUENCE_WIDTH_ENV: &str = "STOCKLEDGER_SEQUENCE_WIDTH";
pub const DEFAULT_CURRENCY_ENV: &str = "STOCKLEDGER_DEFAULT_CURRENCY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Optimistic-concurrency retries per aggregate write before giving up.
    pub max_conflict_retries: u32,
    pub sale_number_prefix: String,
    /// Minimum digits of the per-day sequence in a sale number.
    pub sequence_width: usize,
    /// Currency applied to documents that do not name one.
    pub default_currency: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            sale_number_prefix: "SALE".to_string(),
            sequence_width: 4,
            default_currency: "UZS".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Read overrides from the process environment.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and
    /// ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            max_conflict_retries: parse_or(
                &lookup,
                MAX_CONFLICT_RETRIES_ENV,
                defaults.max_conflict_retries,
            ),
            sale_number_prefix: non_blank_or(
                &lookup,
                SALE_NUMBER_PREFIX_ENV,
                defaults.sale_number_prefix,
            ),
            sequence_width: parse_or(&lookup, SEQUENCE_WIDTH_ENV, defaults.sequence_width),
            default_currency: non_blank_or(&lookup, DEFAULT_CURRENCY_ENV, defaults.default_currency),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + core::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, ?default, "invalid configuration value, using default");
            default
        }
    }
}

fn non_blank_or<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().to_string(),
        Some(_) => {
            tracing::warn!(key, %default, "blank configuration value, using default");
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(LedgerConfig::from_lookup(lookup(&[])), LedgerConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (MAX_CONFLICT_RETRIES_ENV, "9"),
            (SALE_NUMBER_PREFIX_ENV, "S"),
            (SEQUENCE_WIDTH_ENV, "6"),
            (DEFAULT_CURRENCY_ENV, "USD"),
        ]));

        assert_eq!(config.max_conflict_retries, 9);
        assert_eq!(config.sale_number_prefix, "S");
        assert_eq!(config.sequence_width, 6);
        assert_eq!(config.default_currency, "USD");
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = LedgerConfig::from_lookup(lookup(&[
            (MAX_CONFLICT_RETRIES_ENV, "many"),
            (SEQUENCE_WIDTH_ENV, "-1"),
            (DEFAULT_CURRENCY_ENV, "  "),
        ]));

        assert_eq!(config, LedgerConfig::default());
    }
}
