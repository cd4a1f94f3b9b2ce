use std::{net::TcpListener, thread};

use actix_web::web;
use loyalty_core::{
    config::AppConfig,
    notify::{self, Outbox, SmsProvider},
    LoyaltyService,
};
use tokio::{runtime::Builder, signal, time::Duration};
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    let sms = SmsProvider::from_config(&config)?;

    let shutdown_token = CancellationToken::new();

    let (outbox, outbox_receiver) = Outbox::unbounded();
    let service = web::Data::new(LoyaltyService::from_config(&config, outbox));

    let shutdown_token_notify = shutdown_token.clone();
    let notifier_handle = thread::spawn(move || -> anyhow::Result<()> {
        log::info!("Notification worker starting...");
        let rt = Builder::new_current_thread().enable_all().build()?;

        rt.block_on(async move {
            match notify::run_notification_worker(outbox_receiver, sms, shutdown_token_notify).await {
                Ok(sent) => log::info!("Notification worker delivered {} message(s)", sent),
                Err(e) => log::error!("Notification worker error: {}", e),
            }
        });

        log::info!("Notification worker stopped");
        Ok(())
    });

    let listener = TcpListener::bind((config.bind_addr.as_str(), config.port))?;
    log::info!("[server] listening on http://{}", listener.local_addr()?);

    let shutdown_token_server = shutdown_token.clone();
    let server_thread = thread::spawn(move || -> anyhow::Result<()> {
        let rt = Builder::new_multi_thread()
            .worker_threads(4)
            .enable_all()
            .build()?;

        rt.block_on(async {
            let server = loyalty_core::http_server(listener, service, 4)?;
            tokio::select! {
                server_result = server => {
                    if let Err(e) = server_result {
                        log::error!("HTTP server error: {}", e);
                    }
                }
                _ = shutdown_token_server.cancelled() => {
                    log::info!("HTTP server received shutdown signal");
                }
            }
            Ok::<(), anyhow::Error>(())
        })
    });

    let rt_main = Builder::new_current_thread().enable_all().build()?;
    rt_main.block_on(async {
        match signal::ctrl_c().await {
            Ok(()) => {
                log::info!("SIGINT received; starting shutdown...");
                shutdown_token.cancel();
            }
            Err(err) => {
                log::error!("Unable to listen for shutdown signal: {}", err);
                shutdown_token.cancel();
            }
        }
    });

    log::info!("Waiting for threads to shutdown...");

    // Forced exit if a worker refuses to stop.
    thread::spawn(|| {
        thread::sleep(Duration::from_secs(5));
        log::warn!("Shutdown timeout reached, forcing exit");
        std::process::exit(0);
    });

    match server_thread.join() {
        Ok(Err(e)) => log::error!("HTTP server thread failed: {}", e),
        Err(e) => log::error!("HTTP server thread panicked: {:?}", e),
        Ok(Ok(())) => {}
    }
    match notifier_handle.join() {
        Ok(Err(e)) => log::error!("notification thread failed: {}", e),
        Err(e) => log::error!("notification thread panicked: {:?}", e),
        Ok(Ok(())) => {}
    }

    log::info!("All threads stopped. Exiting.");
    Ok(())
}
