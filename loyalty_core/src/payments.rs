use serde::{Deserialize, Serialize};

use crate::{
    config::{ProgramConfig, RewardMode},
    error::{LoyaltyError, Result},
    ledger::Attestation,
};

/// Balance seeded by the `returningWithDistribute` demo flow.
pub const DISTRIBUTE_SEED_POINTS: i64 = 95;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PaymentFlow {
    New,
    Returning,
    ReturningWithDistribute,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentRequest {
    /// Order total in dollars.
    pub amount: f64,
    pub flow: PaymentFlow,
    pub phone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub ok: bool,
    pub attestation: Attestation,
    pub coupon: Option<String>,
    pub coupon_value: Option<f64>,
    pub tier: Option<Tier>,
    pub wallet_address: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Tier {
    pub name: String,
    pub threshold: i64,
    pub perk: String,
}

/// Largest order total accepted, in dollars.
pub const MAX_PAYMENT_AMOUNT: f64 = 1_000_000_000.0;

/// One point per whole dollar.
pub fn points_for_amount(amount: f64) -> Result<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LoyaltyError::invalid("amount must be a non-negative number"));
    }
    if amount > MAX_PAYMENT_AMOUNT {
        return Err(LoyaltyError::invalid(format!(
            "amount must not exceed {}",
            MAX_PAYMENT_AMOUNT
        )));
    }
    Ok(amount.floor() as i64)
}

/// Threshold check run after every points-issuing payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CouponPolicy {
    pub threshold: i64,
    pub coupon_value: f64,
    pub enabled: bool,
}

impl CouponPolicy {
    pub fn new(threshold: i64, coupon_value: f64) -> Self {
        Self {
            threshold,
            coupon_value,
            enabled: true,
        }
    }

    /// Does not debit the balance, so every payment that leaves the balance at
    /// or over the threshold earns another coupon.
    pub fn coupon_for(&self, balance: i64) -> Option<f64> {
        (self.enabled && balance >= self.threshold).then_some(self.coupon_value)
    }
}

impl From<&ProgramConfig> for CouponPolicy {
    fn from(cfg: &ProgramConfig) -> Self {
        Self {
            threshold: cfg.dollars_spent,
            coupon_value: cfg.reward_value,
            enabled: cfg.reward_mode.issues_coupons(),
        }
    }
}

pub fn default_tiers() -> Vec<Tier> {
    vec![
        Tier {
            name: "Silver".into(),
            threshold: 500,
            perk: "15% off".into(),
        },
        Tier {
            name: "Gold".into(),
            threshold: 1000,
            perk: "25% off".into(),
        },
    ]
}

/// Highest tier reached, if the program tracks tiers at all.
pub fn tier_for_balance(mode: RewardMode, balance: i64) -> Option<Tier> {
    if !mode.tracks_tiers() {
        return None;
    }
    default_tiers()
        .into_iter()
        .filter(|t| balance >= t.threshold)
        .max_by_key(|t| t.threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_dollars_become_points() {
        assert_eq!(points_for_amount(10.99).unwrap(), 10);
        assert_eq!(points_for_amount(0.0).unwrap(), 0);
        assert!(points_for_amount(-1.0).is_err());
        assert!(points_for_amount(f64::NAN).is_err());
        assert_eq!(points_for_amount(MAX_PAYMENT_AMOUNT).unwrap(), 1_000_000_000);
        assert!(points_for_amount(MAX_PAYMENT_AMOUNT + 1.0).is_err());
        assert!(points_for_amount(1e19).is_err());
        assert!(points_for_amount(1e300).is_err());
    }

    #[test]
    fn coupon_at_or_above_threshold() {
        let policy = CouponPolicy::new(100, 10.0);
        assert_eq!(policy.coupon_for(99), None);
        assert_eq!(policy.coupon_for(100), Some(10.0));
        assert_eq!(policy.coupon_for(250), Some(10.0));
    }

    #[test]
    fn tiers_only_disables_coupons() {
        let cfg = ProgramConfig {
            reward_mode: RewardMode::TiersOnly,
            ..ProgramConfig::default()
        };
        assert_eq!(CouponPolicy::from(&cfg).coupon_for(1_000), None);
        assert_eq!(
            tier_for_balance(cfg.reward_mode, 1_200).map(|t| t.name),
            Some("Gold".to_string())
        );
        assert_eq!(tier_for_balance(RewardMode::PointsOnly, 1_200), None);
        assert_eq!(tier_for_balance(RewardMode::Both, 499), None);
    }

    #[test]
    fn flow_names_match_web_ui() {
        let flow: PaymentFlow = serde_json::from_str("\"returningWithDistribute\"").unwrap();
        assert_eq!(flow, PaymentFlow::ReturningWithDistribute);
    }
}
