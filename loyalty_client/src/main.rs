use anyhow::Result;
use loyalty_client::LoyaltyClient;
use loyalty_core::payments::PaymentFlow;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let base_url =
        std::env::var("LOYALTY_API_BASE").unwrap_or_else(|_| "http://127.0.0.1:4000".to_string());
    let phone = std::env::var("DEMO_PHONE").unwrap_or_else(|_| "+15551234567".to_string());

    let client = LoyaltyClient::new(base_url);

    println!("checking server health...");
    let health = client.health_check().await?;
    println!("{health:#?}");

    let config = client.get_program_config().await?;
    println!("program: {config:#?}");

    println!("paying and distributing (seed 95 + $10 order)...");
    let outcome = client
        .process_payment(&phone, 10.0, PaymentFlow::ReturningWithDistribute)
        .await?;
    println!("{outcome:#?}");

    if let Some(code) = outcome.coupon {
        println!("redeeming coupon {code}...");
        let value = client.redeem(&code, &phone).await?;
        println!("coupon worth {value}");
    }

    let rewards = client.get_rewards(&phone).await?;
    println!("balance: {} ({} attestations)", rewards.balance, rewards.history.len());

    Ok(())
}
