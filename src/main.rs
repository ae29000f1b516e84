mod auth;
mod catalog;
mod config;
mod error;
mod models;
mod routes;
mod state;
mod store;
mod templates;
mod uploads;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{error::InternalError, middleware, web, App, HttpResponse, HttpServer};
use actix_web_httpauth::extractors::basic;
use serde_json::json;

use crate::{auth::AUTH_REALM, config::Config, state::AppState, uploads::UPLOAD_URL_PREFIX};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    let state = AppState::from_config(&config).await?;
    log::info!(
        "Appointments stored in {}, uploads in {}",
        state.store.path().display(),
        config.upload_dir.display()
    );

    let address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting booking service on http://{address}");

    let upload_dir = config.upload_dir.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(basic::Config::default().realm(AUTH_REALM))
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                let message = format!("JSON inválido: {err}");
                InternalError::from_response(err, bad_request(message)).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                let message = format!("Parâmetros inválidos: {err}");
                InternalError::from_response(err, bad_request(message)).into()
            }))
            .wrap(middleware::Logger::default())
            .wrap(Cors::permissive())
            .service(Files::new(UPLOAD_URL_PREFIX, upload_dir.clone()))
            .configure(routes::admin::configure)
            .configure(routes::public::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

fn bad_request(message: String) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": message }))
}
