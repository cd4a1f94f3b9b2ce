use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    config::{AppConfig, ProgramConfig, RewardType},
    customers::CustomerDirectory,
    error::{LoyaltyError, Result},
    ledger::{reason, Attestation, PointsBackend, PointsSummary},
    notify::Outbox,
    payments::{
        points_for_amount, tier_for_balance, CouponPolicy, PaymentFlow, PaymentOutcome,
        PaymentRequest, DISTRIBUTE_SEED_POINTS,
    },
    redemption::RedemptionCodes,
};

/// Points debited from the redeemer when a code is applied.
pub const REDEEM_DEBIT_POINTS: i64 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IssuedCoupon {
    pub code: String,
    pub value: f64,
}

/// Owns every piece of mutable state. Share it behind `web::Data`/`Arc`;
/// there are no process-wide singletons.
pub struct LoyaltyService {
    ledger: PointsBackend,
    codes: RedemptionCodes,
    customers: CustomerDirectory,
    program: RwLock<ProgramConfig>,
    outbox: Outbox,
}

impl LoyaltyService {
    pub fn new(ledger: PointsBackend, outbox: Outbox) -> Self {
        Self {
            ledger,
            codes: RedemptionCodes::default(),
            customers: CustomerDirectory::default(),
            program: RwLock::new(ProgramConfig::default()),
            outbox,
        }
    }

    pub fn from_config(config: &AppConfig, outbox: Outbox) -> Self {
        let ledger = PointsBackend::from_config(config.use_mock_sas, config.sas_api_base.clone());
        Self::new(ledger, outbox)
    }

    pub fn with_program(self, program: ProgramConfig) -> Self {
        *self.program.write() = program;
        self
    }

    pub fn codes(&self) -> &RedemptionCodes {
        &self.codes
    }

    pub fn customers(&self) -> &CustomerDirectory {
        &self.customers
    }

    pub fn program_config(&self) -> ProgramConfig {
        self.program.read().clone()
    }

    pub fn set_program_config(&self, program: ProgramConfig) -> Result<ProgramConfig> {
        program.validate()?;
        log::info!("program config updated: {:?}", program);
        *self.program.write() = program.clone();
        Ok(program)
    }

    pub async fn issue_points(
        &self,
        phone: &str,
        points: i64,
        message: Option<String>,
    ) -> Result<Attestation> {
        let phone = require_phone(phone)?;
        if points == 0 {
            return Err(LoyaltyError::invalid("phone and points required"));
        }

        let attestation = self
            .ledger
            .issue_points_attestation(phone, points, reason("purchase"))
            .await?;
        let text = message.unwrap_or_else(|| {
            format!(
                "You earned {} point(s). Balance: {}.",
                points, attestation.balance
            )
        });
        self.outbox.queue(phone, text);
        Ok(attestation)
    }

    pub async fn read_balance(&self, phone: &str) -> Result<PointsSummary> {
        let phone = require_phone(phone)?;
        self.ledger.get_attestations(phone).await
    }

    pub fn create_redemption(&self, phone: &str, amount: Option<f64>) -> Result<String> {
        let phone = require_phone(phone)?;
        let amount = amount.unwrap_or(0.0);
        if !amount.is_finite() || amount < 0.0 {
            return Err(LoyaltyError::invalid("amount must be a non-negative number"));
        }
        Ok(self.codes.create(amount, Some(phone.to_string())))
    }

    /// Consumes `code` for `phone` and debits the redemption cost. A ledger
    /// failure after consumption is surfaced; the code stays consumed.
    pub async fn redeem(&self, code: &str, phone: &str) -> Result<f64> {
        let phone = require_phone(phone)?;
        let value = self
            .codes
            .verify_and_consume(code.trim(), Some(phone))
            .ok_or(LoyaltyError::CodeRejected)?;

        if let Err(e) = self
            .ledger
            .issue_points_attestation(phone, -REDEEM_DEBIT_POINTS, reason("redeem"))
            .await
        {
            log::error!("code {} consumed but debit for {} failed: {}", code, phone, e);
            return Err(e);
        }
        Ok(value)
    }

    /// Mints a coupon bound to `phone` when `balance` meets the program threshold.
    pub fn check_threshold(&self, phone: &str, balance: i64) -> Option<IssuedCoupon> {
        let program = self.program_config();
        self.check_threshold_with(&program, phone, balance)
    }

    /// Same as [`check_threshold`](Self::check_threshold) against a config
    /// snapshot the caller already holds.
    pub fn check_threshold_with(
        &self,
        program: &ProgramConfig,
        phone: &str,
        balance: i64,
    ) -> Option<IssuedCoupon> {
        let policy = CouponPolicy::from(program);
        let value = policy.coupon_for(balance)?;
        let code = self.codes.create(value, Some(phone.to_string()));
        Some(IssuedCoupon { code, value })
    }

    pub async fn process_payment(&self, req: PaymentRequest) -> Result<PaymentOutcome> {
        let phone = require_phone(&req.phone)?;
        let points = points_for_amount(req.amount)?;

        let wallet = match req.flow {
            PaymentFlow::New => Some(self.customers.ensure_wallet_for_phone(phone)),
            _ => None,
        };

        if req.flow == PaymentFlow::ReturningWithDistribute {
            self.ledger
                .issue_points_attestation(phone, DISTRIBUTE_SEED_POINTS, reason("seed"))
                .await?;
        }

        let mut metadata = reason("purchase");
        metadata.insert("amount".into(), serde_json::json!(req.amount));
        metadata.insert("flow".into(), serde_json::json!(req.flow));
        let attestation = self
            .ledger
            .issue_points_attestation(phone, points, metadata)
            .await?;

        let program = self.program_config();
        let coupon = self.check_threshold_with(&program, phone, attestation.balance);
        let tier = tier_for_balance(program.reward_mode, attestation.balance);

        let earned = format!(
            "You earned {} {}. Balance: {}.",
            points, program.points_name, attestation.balance
        );
        match req.flow {
            PaymentFlow::New => self.outbox.queue(
                phone,
                format!("Welcome to {}! {}", program.program_name, earned),
            ),
            _ => self.outbox.queue(phone, earned),
        }
        if let Some(c) = &coupon {
            self.outbox.queue(
                phone,
                format!(
                    "You've unlocked a reward! Use code {} for {} off your next order.",
                    c.code,
                    reward_label(program.reward_type, c.value)
                ),
            );
        }

        log::info!(
            "payment processed for {}: {:+} -> {} (coupon: {})",
            phone,
            points,
            attestation.balance,
            coupon.is_some()
        );

        Ok(PaymentOutcome {
            ok: true,
            attestation,
            coupon_value: coupon.as_ref().map(|c| c.value),
            coupon: coupon.map(|c| c.code),
            tier,
            wallet_address: wallet.map(|w| w.wallet_address),
        })
    }
}

fn require_phone(phone: &str) -> Result<&str> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err(LoyaltyError::invalid("phone required"));
    }
    Ok(phone)
}

fn reward_label(kind: RewardType, value: f64) -> String {
    match kind {
        RewardType::DollarsOff => format!("${}", value),
        RewardType::PercentOff => format!("{}%", value),
    }
}
