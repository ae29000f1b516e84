use actix_web::HttpResponse;
use askama::Template;

use crate::models::Appointment;

pub fn render<T: Template>(template: T) -> HttpResponse {
    match template.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(body),
        Err(err) => {
            log::error!("Template render error: {err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Clone, Debug)]
pub struct AgendaRow {
    pub id: String,
    pub date: String,
    pub slot: String,
    pub shopping: String,
    pub trade_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: String,
    pub notes: String,
    pub has_notes: bool,
    pub status: String,
    pub file_url: String,
    pub has_file: bool,
    pub expires_at: String,
}

impl From<Appointment> for AgendaRow {
    fn from(appt: Appointment) -> Self {
        let file_url = appt.upload.url.unwrap_or_default();
        AgendaRow {
            id: appt.id,
            date: appt.date.format("%d/%m/%Y").to_string(),
            slot: appt.slot,
            shopping: appt.shopping,
            trade_name: appt.trade_name,
            contact_name: appt.contact_name,
            phone: appt.phone,
            email: appt.email,
            has_notes: !appt.notes.trim().is_empty(),
            notes: appt.notes,
            status: appt.status.as_str().to_string(),
            has_file: !file_url.is_empty(),
            file_url,
            expires_at: appt
                .expires_at
                .map(|expires_at| expires_at.format("%d/%m/%Y %H:%M UTC").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatusOption {
    pub value: &'static str,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "admin_agenda.html")]
pub struct AdminAgendaTemplate {
    pub admin_name: String,
    pub rows: Vec<AgendaRow>,
    pub statuses: Vec<StatusOption>,
    pub date_filter: String,
}
