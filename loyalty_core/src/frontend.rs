use std::collections::HashMap;

use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::{
    config::ProgramConfig,
    error::LoyaltyError,
    ledger::Attestation,
    payments::PaymentRequest,
    service::LoyaltyService,
};

#[derive(Serialize, Deserialize, Debug)]
pub struct IssueRequest {
    pub phone: String,
    pub points: i64,
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IssueResponse {
    pub ok: bool,
    pub attestation: Attestation,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct CreateRedemptionRequest {
    pub amount: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateRedemptionResponse {
    pub code: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RedeemRequest {
    pub code: String,
    pub phone: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RedeemResponse {
    pub ok: bool,
    pub value: f64,
}

fn ok_json<T: Serialize>(v: T) -> actix_web::Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(v))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/rewards/issue", web::post().to(issue_points))
        .route("/rewards/redeem", web::post().to(redeem))
        .route("/rewards/{phone}", web::get().to(get_rewards))
        .route("/rewards/{phone}/redemption", web::post().to(create_redemption))
        .route("/payments/process", web::post().to(process_payment))
        .route("/config/points", web::get().to(get_program_config))
        .route("/config/points", web::post().to(save_program_config));
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HashMap::from([("ok", true)]))
}

pub async fn issue_points(
    body: web::Json<IssueRequest>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    log::info!("issue points: {:?}", body);
    let IssueRequest {
        phone,
        points,
        message,
    } = body.into_inner();

    let attestation = service.issue_points(&phone, points, message).await?;
    ok_json(IssueResponse {
        ok: true,
        attestation,
    })
}

pub async fn get_rewards(
    path: web::Path<String>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    let summary = service.read_balance(&path).await?;
    ok_json(summary)
}

pub async fn create_redemption(
    path: web::Path<String>,
    body: Option<web::Json<CreateRedemptionRequest>>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    let amount = body.and_then(|b| b.amount);
    let code = service.create_redemption(&path, amount)?;
    ok_json(CreateRedemptionResponse { code })
}

pub async fn redeem(
    body: web::Json<RedeemRequest>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    log::info!("redeem {} for {}", body.code, body.phone);
    let value = service
        .redeem(&body.code, &body.phone)
        .await
        .inspect_err(|e| {
            if !matches!(e, LoyaltyError::CodeRejected) {
                log::error!("redeem failed: {}", e);
            }
        })?;
    ok_json(RedeemResponse { ok: true, value })
}

pub async fn process_payment(
    body: web::Json<PaymentRequest>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    log::info!("process payment: {:?}", body);
    let outcome = service.process_payment(body.into_inner()).await?;
    ok_json(outcome)
}

pub async fn get_program_config(service: web::Data<LoyaltyService>) -> impl Responder {
    HttpResponse::Ok().json(service.program_config())
}

pub async fn save_program_config(
    body: web::Json<ProgramConfig>,
    service: web::Data<LoyaltyService>,
) -> actix_web::Result<HttpResponse> {
    let saved = service.set_program_config(body.into_inner())?;
    ok_json(saved)
}
