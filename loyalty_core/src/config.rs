use std::env;

use serde::{Deserialize, Serialize};

use crate::error::{LoyaltyError, Result};

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub sms_provider: String,
    pub use_mock_sas: bool,
    pub sas_api_base: Option<String>,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 4000,
            sms_provider: "stub".to_string(),
            use_mock_sas: true,
            sas_api_base: None,
            twilio: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` (if any) and reads the environment on top of the defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = AppConfig::default();

        let port = match env::var("PORT") {
            Ok(p) => p
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("invalid PORT {p:?}: {e}"))?,
            Err(_) => defaults.port,
        };

        let twilio = match (
            env::var("TWILIO_ACCOUNT_SID"),
            env::var("TWILIO_AUTH_TOKEN"),
            env::var("TWILIO_FROM"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(from)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port,
            sms_provider: env::var("SMS_PROVIDER").unwrap_or(defaults.sms_provider),
            use_mock_sas: env::var("USE_MOCK_SAS").map(|v| v != "false").unwrap_or(true),
            sas_api_base: env::var("SAS_API_BASE").ok().filter(|s| !s.trim().is_empty()),
            twilio,
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    PercentOff,
    DollarsOff,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardMode {
    Disabled,
    #[serde(rename = "Points Only")]
    PointsOnly,
    #[serde(rename = "Tiers Only")]
    TiersOnly,
    Both,
}

impl RewardMode {
    pub fn issues_coupons(self) -> bool {
        matches!(self, RewardMode::PointsOnly | RewardMode::Both)
    }

    pub fn tracks_tiers(self) -> bool {
        matches!(self, RewardMode::TiersOnly | RewardMode::Both)
    }
}

/// Merchant-editable loyalty program settings. Mutable at runtime.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgramConfig {
    pub points_name: String,
    pub program_name: String,
    pub reward_type: RewardType,
    /// Coupon value handed out when the threshold is reached.
    pub reward_value: f64,
    /// Points threshold (one point per dollar spent).
    pub dollars_spent: i64,
    pub reward_mode: RewardMode,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            points_name: "Points".to_string(),
            program_name: "Loyalty".to_string(),
            reward_type: RewardType::DollarsOff,
            reward_value: 10.0,
            dollars_spent: 100,
            reward_mode: RewardMode::PointsOnly,
        }
    }
}

impl ProgramConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.reward_value.is_finite() || self.reward_value < 0.0 {
            return Err(LoyaltyError::invalid("rewardValue must be a non-negative number"));
        }
        if self.dollars_spent <= 0 {
            return Err(LoyaltyError::invalid("dollarsSpent must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_config_uses_ui_field_names() {
        let json = serde_json::to_value(ProgramConfig::default()).unwrap();
        assert_eq!(json["dollarsSpent"], 100);
        assert_eq!(json["rewardType"], "dollars_off");
        assert_eq!(json["rewardMode"], "Points Only");
    }

    #[test]
    fn rejects_non_positive_threshold() {
        let cfg = ProgramConfig {
            dollars_spent: 0,
            ..ProgramConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(LoyaltyError::InvalidRequest(_))));
    }
}
