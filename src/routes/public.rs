use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::ApiError,
    models::ReservationPayload,
    state::AppState,
    store::StoreError,
    uploads,
};

#[derive(Deserialize)]
struct SlotsQuery {
    date: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/api/dates").route(web::get().to(list_dates)))
        .service(web::resource("/api/slots").route(web::get().to(list_slots)))
        .service(web::resource("/api/reservations").route(web::post().to(create_reservation)))
        .service(web::resource("/api/reservations/{id}/upload").route(web::post().to(upload_file)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

async fn list_dates(state: web::Data<AppState>) -> HttpResponse {
    let dates: Vec<String> = state
        .catalog
        .dates(Utc::now())
        .into_iter()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .collect();
    HttpResponse::Ok().json(json!({ "dates": dates }))
}

async fn list_slots(state: web::Data<AppState>, query: web::Query<SlotsQuery>) -> Result<HttpResponse, ApiError> {
    let raw = query
        .date
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::bad_request("Data é obrigatória."))?;
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Data inválida: {raw}")))?;

    let taken = state.store.taken_slots(date, Utc::now()).await?;
    let available = state.catalog.available(&taken);
    Ok(HttpResponse::Ok().json(json!({ "availableSlots": available })))
}

async fn create_reservation(
    state: web::Data<AppState>,
    payload: web::Json<ReservationPayload>,
) -> Result<HttpResponse, ApiError> {
    let reservation = payload
        .into_inner()
        .validate(&state.catalog)
        .map_err(ApiError::BadRequest)?;

    let appointment = state.store.create_reservation(reservation, Utc::now()).await?;
    log::info!(
        "Reservation {} created for {} {} ({})",
        appointment.id,
        appointment.date,
        appointment.slot,
        appointment.trade_name
    );
    Ok(HttpResponse::Created().json(json!({ "reservation": appointment })))
}

async fn upload_file(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let upload = uploads::receive(payload, &state.uploads.dir, state.uploads.max_bytes).await?;

    match state
        .store
        .attach_upload(&appointment_id, upload.descriptor(), Utc::now())
        .await
    {
        Ok(appointment) => {
            log::info!("Reservation {} confirmed with {}", appointment.id, upload.file_name);
            Ok(HttpResponse::Ok().json(json!({
                "message": "Upload concluído com sucesso.",
                "reservation": appointment,
            })))
        }
        Err(err) => {
            if !matches!(err, StoreError::Io(_) | StoreError::Corrupt(_)) {
                log::info!("Discarding upload for {appointment_id}: {err}");
            }
            upload.discard().await;
            Err(err.into())
        }
    }
}
