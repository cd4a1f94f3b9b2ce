use std::collections::HashMap;

use anyhow::{anyhow, Result};
use loyalty_core::{
    config::ProgramConfig,
    frontend::{
        CreateRedemptionRequest, CreateRedemptionResponse, IssueRequest, IssueResponse,
        RedeemRequest, RedeemResponse,
    },
    ledger::PointsSummary,
    payments::{PaymentFlow, PaymentOutcome, PaymentRequest},
};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

/// Turn a non-2xx reply into an error carrying the server's `{ "error": .. }` text.
async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<HashMap<String, String>>(&body)
            .ok()
            .and_then(|m| m.get("error").cloned())
            .unwrap_or(body);
        return Err(anyhow!("{}: {}", status, message));
    }
    Ok(resp.json::<T>().await?)
}

/// Thin typed wrapper over the loyalty REST API
pub struct LoyaltyClient {
    client: Client,
    base_url: String,
}

impl LoyaltyClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health_check(&self) -> Result<HashMap<String, bool>> {
        let resp = self.client.get(self.url("/health")).send().await?;
        read_json(resp).await
    }

    /// Issue points and text the customer
    pub async fn issue(
        &self,
        phone: &str,
        points: i64,
        message: Option<&str>,
    ) -> Result<IssueResponse> {
        let body = IssueRequest {
            phone: phone.to_string(),
            points,
            message: message.map(str::to_string),
        };
        let resp = self
            .client
            .post(self.url("/rewards/issue"))
            .json(&body)
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn get_rewards(&self, phone: &str) -> Result<PointsSummary> {
        let resp = self
            .client
            .get(self.url(&format!("/rewards/{}", phone)))
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn create_redemption(&self, phone: &str, amount: f64) -> Result<String> {
        let resp = self
            .client
            .post(self.url(&format!("/rewards/{}/redemption", phone)))
            .json(&CreateRedemptionRequest {
                amount: Some(amount),
            })
            .send()
            .await?;
        Ok(read_json::<CreateRedemptionResponse>(resp).await?.code)
    }

    /// Returns the coupon value on success
    pub async fn redeem(&self, code: &str, phone: &str) -> Result<f64> {
        let resp = self
            .client
            .post(self.url("/rewards/redeem"))
            .json(&RedeemRequest {
                code: code.to_string(),
                phone: phone.to_string(),
            })
            .send()
            .await?;
        Ok(read_json::<RedeemResponse>(resp).await?.value)
    }

    pub async fn process_payment(
        &self,
        phone: &str,
        amount: f64,
        flow: PaymentFlow,
    ) -> Result<PaymentOutcome> {
        let resp = self
            .client
            .post(self.url("/payments/process"))
            .json(&PaymentRequest {
                amount,
                flow,
                phone: phone.to_string(),
            })
            .send()
            .await?;
        read_json(resp).await
    }

    pub async fn get_program_config(&self) -> Result<ProgramConfig> {
        let resp = self.client.get(self.url("/config/points")).send().await?;
        read_json(resp).await
    }

    pub async fn save_program_config(&self, config: &ProgramConfig) -> Result<ProgramConfig> {
        let resp = self
            .client
            .post(self.url("/config/points"))
            .json(config)
            .send()
            .await?;
        read_json(resp).await
    }
}
