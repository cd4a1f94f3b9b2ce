use std::net::TcpListener;

use actix_web::{dev::ServerHandle, web};
use anyhow::Result;
use async_channel::Receiver;
use loyalty_client::LoyaltyClient;
use loyalty_core::{
    config::{ProgramConfig, RewardMode},
    ledger::{InMemoryLedger, PointsBackend},
    notify::{Notification, Outbox},
    payments::PaymentFlow,
    LoyaltyService,
};

const PHONE: &str = "5551234567";

/// In-process loyalty_core server bound to an ephemeral port
struct TestServer {
    handle: ServerHandle,
    client: LoyaltyClient,
    outbox: Receiver<Notification>,
}

impl TestServer {
    async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;

        let (outbox, receiver) = Outbox::unbounded();
        let service = web::Data::new(LoyaltyService::new(
            PointsBackend::InMemory(InMemoryLedger::default()),
            outbox,
        ));

        let server = loyalty_core::http_server(listener, service, 1)?;
        let handle = server.handle();
        actix_web::rt::spawn(server);

        let client = LoyaltyClient::new(format!("http://{}", addr));
        client.health_check().await?;

        Ok(TestServer {
            handle,
            client,
            outbox: receiver,
        })
    }

    fn client(&self) -> &LoyaltyClient {
        &self.client
    }

    fn sent(&self) -> Vec<Notification> {
        std::iter::from_fn(|| self.outbox.try_recv().ok()).collect()
    }

    async fn stop(self) {
        self.handle.stop(true).await;
    }
}

#[actix_web::test]
async fn test_complete_loyalty_flow() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.client();

    let health = client.health_check().await?;
    assert_eq!(health.get("ok"), Some(&true));

    let first = client
        .process_payment(PHONE, 95.0, PaymentFlow::New)
        .await?;
    assert_eq!(first.attestation.balance, 95);
    assert!(first.coupon.is_none());

    let second = client
        .process_payment(PHONE, 10.0, PaymentFlow::Returning)
        .await?;
    assert_eq!(second.attestation.balance, 105);
    let code = second.coupon.expect("threshold crossed");

    let messages = server.sent();
    assert!(messages.iter().any(|n| n.body.contains(&code)));

    assert_eq!(client.redeem(&code, PHONE).await?, 10.0);
    let again = client.redeem(&code, PHONE).await.unwrap_err();
    assert!(again.to_string().contains("invalid or consumed code"));

    let rewards = client.get_rewards(PHONE).await?;
    assert_eq!(rewards.balance, 104);
    assert_eq!(rewards.history.len(), 3);

    server.stop().await;
    Ok(())
}

#[actix_web::test]
async fn test_repeated_threshold_crossings() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.client();

    let a = client
        .process_payment(PHONE, 10.0, PaymentFlow::ReturningWithDistribute)
        .await?;
    let b = client
        .process_payment(PHONE, 5.0, PaymentFlow::Returning)
        .await?;

    let (a, b) = (a.coupon.unwrap(), b.coupon.unwrap());
    assert_ne!(a, b);

    server.stop().await;
    Ok(())
}

#[actix_web::test]
async fn test_program_config_and_manual_codes() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.client();

    let saved = client
        .save_program_config(&ProgramConfig {
            reward_mode: RewardMode::Disabled,
            ..ProgramConfig::default()
        })
        .await?;
    assert_eq!(saved.reward_mode, RewardMode::Disabled);
    assert_eq!(client.get_program_config().await?, saved);

    let outcome = client
        .process_payment(PHONE, 250.0, PaymentFlow::Returning)
        .await?;
    assert!(outcome.coupon.is_none());

    let issued = client.issue(PHONE, 5, Some("thanks!")).await?;
    assert_eq!(issued.attestation.balance, 255);
    assert!(server.sent().iter().any(|n| n.body == "thanks!"));

    let code = client.create_redemption(PHONE, 2.5).await?;
    assert!(client.redeem(&code, "5550000000").await.is_err());
    assert_eq!(client.redeem(&code, PHONE).await?, 2.5);
    assert!(client.redeem("ABC123", PHONE).await.is_err());

    server.stop().await;
    Ok(())
}
