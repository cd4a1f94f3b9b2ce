use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};

const CODE_LEN: usize = 6;
const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RedemptionCode {
    pub code: String,
    pub value: f64,
    pub owner: Option<String>,
    pub consumed: bool,
}

impl RedemptionCode {
    /// Unconsumed, and either unowned or owned by `requester`.
    fn redeemable_by(&self, requester: Option<&str>) -> bool {
        if self.consumed {
            return false;
        }
        match &self.owner {
            Some(owner) => requester == Some(owner.as_str()),
            None => true,
        }
    }
}

/// Single-use codes. A code moves Active -> Consumed once and is never removed.
#[derive(Debug, Default)]
pub struct RedemptionCodes {
    codes: Mutex<HashMap<String, RedemptionCode>>,
}

impl RedemptionCodes {
    pub fn create(&self, value: f64, owner: Option<String>) -> String {
        let mut codes = self.codes.lock();
        let mut rng = rand::rng();
        let code = loop {
            let candidate: String = (0..CODE_LEN)
                .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
                .collect();
            if !codes.contains_key(&candidate) {
                break candidate;
            }
        };

        log::info!("redemption: created {} (value {}, owner {:?})", code, value, owner);
        codes.insert(
            code.clone(),
            RedemptionCode {
                code: code.clone(),
                value,
                owner,
                consumed: false,
            },
        );
        code
    }

    /// Non-consuming check.
    pub fn verify(&self, code: &str, requester: Option<&str>) -> bool {
        self.codes
            .lock()
            .get(code)
            .is_some_and(|c| c.redeemable_by(requester))
    }

    /// Returns the bound value and marks the code consumed, or `None` when the
    /// code is unknown, spent, or owned by someone else.
    pub fn verify_and_consume(&self, code: &str, requester: Option<&str>) -> Option<f64> {
        let mut codes = self.codes.lock();
        let entry = codes.get_mut(code)?;
        if !entry.redeemable_by(requester) {
            log::warn!("redemption: rejected {} for {:?}", code, requester);
            return None;
        }
        entry.consumed = true;
        log::info!("redemption: consumed {} (value {})", code, entry.value);
        Some(entry.value)
    }

    pub fn get(&self, code: &str) -> Option<RedemptionCode> {
        self.codes.lock().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.codes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
