//! Loyalty points backend: a per-phone points ledger, single-use redemption
//! codes, and the payment flow that turns spend into points and coupons.

pub mod config;
pub mod customers;
pub mod error;
pub mod frontend;
pub mod ledger;
pub mod notify;
pub mod payments;
pub mod redemption;
pub mod service;

use std::net::TcpListener;

use actix_web::{dev::Server, web, App, HttpServer};

pub use error::{LoyaltyError, Result};
pub use service::LoyaltyService;

/// Builds the HTTP server on an already-bound listener. The caller drives it.
pub fn http_server(
    listener: TcpListener,
    service: web::Data<LoyaltyService>,
    workers: usize,
) -> std::io::Result<Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .configure(frontend::configure)
    })
    .workers(workers)
    .listen(listener)?
    .run();
    Ok(server)
}
