use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Placeholder until wallets are provisioned by a real custody provider.
pub const STUB_WALLET_ADDRESS: &str = "StubWallet111111111111111111111111111111111";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WalletRef {
    pub wallet_address: String,
}

#[derive(Debug, Default)]
pub struct CustomerDirectory {
    wallets: Mutex<HashMap<String, WalletRef>>,
}

impl CustomerDirectory {
    pub fn ensure_wallet_for_phone(&self, phone: &str) -> WalletRef {
        let mut wallets = self.wallets.lock();
        wallets
            .entry(phone.to_string())
            .or_insert_with(|| {
                log::info!("[stub-wallet] ensure wallet for {}", phone);
                WalletRef {
                    wallet_address: STUB_WALLET_ADDRESS.to_string(),
                }
            })
            .clone()
    }

    pub fn is_onboarded(&self, phone: &str) -> bool {
        self.wallets.lock().contains_key(phone)
    }
}
