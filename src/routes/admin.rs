use actix_web::{web, HttpResponse, Result};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::{admin_validator, AuthUser},
    error::ApiError,
    models::{AdminPayload, AgendaFilter, AppointmentStatus},
    state::AppState,
    templates::{render, AdminAgendaTemplate, AgendaRow, StatusOption},
};

const STATUSES: [AppointmentStatus; 4] = [
    AppointmentStatus::AwaitingUpload,
    AppointmentStatus::Reserved,
    AppointmentStatus::Cancelled,
    AppointmentStatus::Available,
];

/// Form-style filter for the HTML page, where empty inputs arrive as "".
#[derive(Deserialize)]
struct PageFilter {
    date: Option<String>,
    status: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .service(
                web::resource("/agenda")
                    .route(web::get().to(list_agenda))
                    .route(web::post().to(upsert_appointment)),
            )
            .service(
                web::resource("/agenda/{id}")
                    .route(web::put().to(update_appointment))
                    .route(web::delete().to(delete_appointment)),
            ),
    )
    .service(
        web::scope("/admin")
            .wrap(HttpAuthentication::basic(admin_validator))
            .service(web::resource("").route(web::get().to(agenda_page)))
            .service(web::resource("/").route(web::get().to(agenda_page))),
    );
}

async fn list_agenda(
    state: web::Data<AppState>,
    query: web::Query<AgendaFilter>,
) -> Result<HttpResponse, ApiError> {
    let agenda = state.store.list(&query, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(json!({ "agenda": agenda })))
}

async fn upsert_appointment(
    state: web::Data<AppState>,
    payload: web::Json<AdminPayload>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    save(&state, payload.into_inner(), &auth).await
}

async fn update_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<AdminPayload>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let mut payload = payload.into_inner();
    payload.id = Some(path.into_inner());
    save(&state, payload, &auth).await
}

async fn save(state: &AppState, payload: AdminPayload, auth: &AuthUser) -> Result<HttpResponse, ApiError> {
    let (appointment, created) = state
        .store
        .admin_upsert(payload, &state.catalog, Utc::now())
        .await?;

    if created {
        log::info!("{} created appointment {}", auth.username, appointment.id);
        Ok(HttpResponse::Created().json(json!({ "reservation": appointment })))
    } else {
        log::info!("{} updated appointment {}", auth.username, appointment.id);
        Ok(HttpResponse::Ok().json(json!({ "reservation": appointment })))
    }
}

async fn delete_appointment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let appointment_id = path.into_inner();
    let deleted = state.store.admin_delete(&appointment_id, Utc::now()).await?;
    log::info!("{} deleted appointment {}", auth.username, deleted.id);
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}

async fn agenda_page(
    state: web::Data<AppState>,
    query: web::Query<PageFilter>,
    auth: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let date_filter = query.date.unwrap_or_default().trim().to_string();
    let status_filter = query
        .status
        .as_deref()
        .and_then(AppointmentStatus::parse);

    let filter = AgendaFilter {
        date: NaiveDate::parse_from_str(&date_filter, "%Y-%m-%d").ok(),
        status: status_filter,
    };
    let rows = state
        .store
        .list(&filter, Utc::now())
        .await?
        .into_iter()
        .map(AgendaRow::from)
        .collect();

    let statuses = STATUSES
        .iter()
        .map(|status| StatusOption {
            value: status.as_str(),
            selected: Some(*status) == status_filter,
        })
        .collect();

    Ok(render(AdminAgendaTemplate {
        admin_name: auth.username.clone(),
        rows,
        statuses,
        date_filter,
    }))
}
