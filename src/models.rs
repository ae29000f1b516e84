use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{auth::new_id, catalog::SlotCatalog};

pub const NOTES_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[serde(rename = "aguardando_upload")]
    AwaitingUpload,
    #[serde(rename = "reservado")]
    Reserved,
    #[serde(rename = "cancelado")]
    Cancelled,
    #[serde(rename = "disponivel")]
    Available,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::AwaitingUpload => "aguardando_upload",
            AppointmentStatus::Reserved => "reservado",
            AppointmentStatus::Cancelled => "cancelado",
            AppointmentStatus::Available => "disponivel",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "aguardando_upload" => Some(AppointmentStatus::AwaitingUpload),
            "reservado" => Some(AppointmentStatus::Reserved),
            "cancelado" => Some(AppointmentStatus::Cancelled),
            "disponivel" => Some(AppointmentStatus::Available),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        *self != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "imagem")]
    Image,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime.contains("pdf") {
            FileKind::Pdf
        } else {
            FileKind::Image
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub url: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: Option<FileKind>,
    #[serde(rename = "tamanho_mb")]
    pub size_mb: Option<f64>,
}

impl UploadInfo {
    pub fn is_empty(&self) -> bool {
        self.url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "horario")]
    pub slot: String,
    pub shopping: String,
    #[serde(rename = "nome_fantasia")]
    pub trade_name: String,
    #[serde(rename = "nome_contato")]
    pub contact_name: String,
    #[serde(rename = "telefone_whatsapp")]
    pub phone: String,
    pub email: String,
    #[serde(rename = "informacoes_adicionais", default)]
    pub notes: String,
    pub status: AppointmentStatus,
    #[serde(rename = "upload_arquivo", default)]
    pub upload: UploadInfo,
    #[serde(rename = "data_hora_reserva")]
    pub reserved_at: DateTime<Utc>,
    #[serde(rename = "expira_em", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn occupies(&self, date: NaiveDate, slot: &str) -> bool {
        self.status.is_active() && self.date == date && self.slot == slot
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::AwaitingUpload
            && self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

/// A validated booking request, ready to be stored.
#[derive(Debug, Clone)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub slot: String,
    pub shopping: String,
    pub trade_name: String,
    pub contact_name: String,
    pub phone: String,
    pub email: String,
    pub notes: String,
}

impl NewReservation {
    pub fn into_appointment(self, now: DateTime<Utc>, hold: Duration) -> Appointment {
        Appointment {
            id: new_id(),
            date: self.date,
            slot: self.slot,
            shopping: self.shopping,
            trade_name: self.trade_name,
            contact_name: self.contact_name,
            phone: self.phone,
            email: self.email,
            notes: self.notes,
            status: AppointmentStatus::AwaitingUpload,
            upload: UploadInfo::default(),
            reserved_at: now,
            expires_at: Some(now + hold),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReservationPayload {
    #[serde(rename = "data")]
    pub date: Option<String>,
    #[serde(rename = "horario")]
    pub slot: Option<String>,
    pub shopping: Option<String>,
    #[serde(rename = "nome_fantasia")]
    pub trade_name: Option<String>,
    #[serde(rename = "nome_contato")]
    pub contact_name: Option<String>,
    #[serde(rename = "telefone_whatsapp")]
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "informacoes_adicionais")]
    pub notes: Option<String>,
}

impl ReservationPayload {
    pub fn validate(self, catalog: &SlotCatalog) -> Result<NewReservation, String> {
        let date = required("data", self.date)?;
        let slot = required("horario", self.slot)?;
        let shopping = required("shopping", self.shopping)?;
        let trade_name = required("nome_fantasia", self.trade_name)?;
        let contact_name = required("nome_contato", self.contact_name)?;
        let phone = required("telefone_whatsapp", self.phone)?;
        let email = required("email", self.email)?;

        let date = parse_date(&date)?;
        check_slot(catalog, &slot)?;

        Ok(NewReservation {
            date,
            slot,
            shopping,
            trade_name,
            contact_name,
            phone,
            email,
            notes: truncate_notes(self.notes.as_deref().unwrap_or_default()),
        })
    }
}

/// Admin edit payload. Every field is optional so updates only touch what was sent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminPayload {
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: ReservationPayload,
    pub status: Option<AppointmentStatus>,
    #[serde(rename = "upload_arquivo")]
    pub upload: Option<UploadInfo>,
    #[serde(rename = "data_hora_reserva")]
    pub reserved_at: Option<DateTime<Utc>>,
    #[serde(rename = "expira_em")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AdminPayload {
    pub fn into_new(self, catalog: &SlotCatalog, now: DateTime<Utc>, hold: Duration) -> Result<Appointment, String> {
        let reserved_at = self.reserved_at.unwrap_or(now);
        let mut appointment = self.fields.validate(catalog)?.into_appointment(reserved_at, hold);
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(upload) = self.upload {
            appointment.upload = upload;
        }
        if let Some(expires_at) = self.expires_at {
            appointment.expires_at = Some(expires_at);
        }
        Ok(appointment)
    }

    pub fn apply_to(self, appointment: &mut Appointment, catalog: &SlotCatalog) -> Result<(), String> {
        let fields = self.fields;
        if let Some(date) = non_blank(fields.date) {
            appointment.date = parse_date(&date)?;
        }
        if let Some(slot) = non_blank(fields.slot) {
            check_slot(catalog, &slot)?;
            appointment.slot = slot;
        }
        if let Some(shopping) = non_blank(fields.shopping) {
            appointment.shopping = shopping;
        }
        if let Some(trade_name) = non_blank(fields.trade_name) {
            appointment.trade_name = trade_name;
        }
        if let Some(contact_name) = non_blank(fields.contact_name) {
            appointment.contact_name = contact_name;
        }
        if let Some(phone) = non_blank(fields.phone) {
            appointment.phone = phone;
        }
        if let Some(email) = non_blank(fields.email) {
            appointment.email = email;
        }
        if let Some(notes) = fields.notes {
            appointment.notes = truncate_notes(&notes);
        }
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(upload) = self.upload {
            appointment.upload = upload;
        }
        if let Some(reserved_at) = self.reserved_at {
            appointment.reserved_at = reserved_at;
        }
        if let Some(expires_at) = self.expires_at {
            appointment.expires_at = Some(expires_at);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgendaFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

impl AgendaFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.date.map_or(true, |date| appointment.date == date)
            && self.status.map_or(true, |status| appointment.status == status)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(field: &str, value: Option<String>) -> Result<String, String> {
    non_blank(value).ok_or_else(|| format!("Campo obrigatório ausente: {field}"))
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| format!("Data inválida: {value}"))
}

fn check_slot(catalog: &SlotCatalog, slot: &str) -> Result<(), String> {
    if catalog.contains_slot(slot) {
        Ok(())
    } else {
        Err(format!("Horário inválido: {slot}"))
    }
}

fn truncate_notes(notes: &str) -> String {
    notes.chars().take(NOTES_MAX_CHARS).collect()
}
