mod auth;
mod chat_server;
mod config;
mod db;
mod error;
mod handler;
mod server;
mod social;
mod store;
#[cfg(test)]
mod testing;
mod types;
mod utils;
mod views;

use std::io::{Error, ErrorKind, Result};
use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::Config;
use db::{ensure_indexes, get_db_client};
use dotenvy::dotenv;
use server::{AppState, rest_scope};
use store::mongo::MongoStore;
use tokio::signal::unix::{SignalKind, signal};
use tokio::spawn;

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|err| Error::new(ErrorKind::InvalidInput, err))?;

    let db_client = get_db_client(&config.mongodb_uri)
        .await
        .map_err(Error::other)?;
    let db = db_client.database(&config.database_name);
    ensure_indexes(&db)
        .await
        .map_err(Error::other)?;
    log::info!("Connected to database {}", config.database_name);

    let (state, chat_server) = AppState::new(Arc::new(MongoStore::new(db)), &config);
    let state = web::Data::new(state);

    let chat_server_handle = spawn(chat_server.run());

    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(web::scope("/api").configure(rest_scope))
            .wrap(Logger::default())
    })
    .workers(config.workers)
    .bind(config.http_addr)?
    .run();
    log::info!("Listening on {}", config.http_addr);

    let mut term_signal = signal(SignalKind::terminate())?;
    let mut int_signal = signal(SignalKind::interrupt())?;

    tokio::select! {
        res = http_server => {
            if let Err(err) = res {
                log::error!("HTTP server failed: {}", err);
            }
            log::info!("HTTP server stopped");
        }
        _ = chat_server_handle => log::warn!("Chat server stopped"),
        _ = term_signal.recv() => log::info!("Received SIGTERM"),
        _ = int_signal.recv() => log::info!("Received SIGINT"),
    }

    log::info!("Shutting down...");

    Ok(())
}
