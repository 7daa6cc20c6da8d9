//! Settings for the dashboard binary.
//!
//! The library itself takes explicit parameters; only the binaries read this.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::processor::{NegotiationType, ProcessorError};

pub const CONFIG_FILE: &str = "dashboard.toml";
pub const ENV_PREFIX: &str = "DASHBOARD_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub csv_path: PathBuf,
    pub negotiation_type: NegotiationType,
    /// District to report on; the first district in sort order when unset
    pub district: Option<String>,
    /// Number of districts listed in the price ranking
    pub top_n: usize,
    pub log_filter: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("imoveis-sao-paulo.csv"),
            negotiation_type: NegotiationType::Sale,
            district: None,
            top_n: 10,
            log_filter: "info".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Defaults, then `dashboard.toml` if present, then `DASHBOARD_*` variables
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(DashboardConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ProcessorError> {
        figment
            .extract()
            .map_err(|e| ProcessorError::Config(e.to_string()))
    }

    pub fn load() -> Result<Self, ProcessorError> {
        Self::from_figment(&Self::figment())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::from_figment(&Figment::from(Serialized::defaults(
            DashboardConfig::default(),
        )))
        .unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.top_n, 10);
    }

    #[test]
    fn test_overrides_merge() {
        let figment = Figment::from(Serialized::defaults(DashboardConfig::default()))
            .merge(Serialized::default("negotiation_type", "rent"))
            .merge(Serialized::default("district", "Moema"))
            .merge(Serialized::default("top_n", 3));
        let config = DashboardConfig::from_figment(&figment).unwrap();
        assert_eq!(config.negotiation_type, NegotiationType::Rent);
        assert_eq!(config.district.as_deref(), Some("Moema"));
        assert_eq!(config.top_n, 3);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_toml_layer() {
        let figment = Figment::from(Serialized::defaults(DashboardConfig::default()))
            .merge(Toml::string("csv_path = \"data/listings.csv\"\ntop_n = 5\n"));
        let config = DashboardConfig::from_figment(&figment).unwrap();
        assert_eq!(config.csv_path, PathBuf::from("data/listings.csv"));
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_bad_value_is_config_error() {
        let figment = Figment::from(Serialized::defaults(DashboardConfig::default()))
            .merge(Serialized::default("negotiation_type", "lease"));
        assert!(matches!(
            DashboardConfig::from_figment(&figment),
            Err(ProcessorError::Config(_))
        ));
    }
}
