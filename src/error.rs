use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

pub const MSG_SLOT_TAKEN: &str = "Horário indisponível. Escolha outro horário.";
pub const MSG_NOT_FOUND: &str = "Agendamento não encontrado ou expirado.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(message) => ApiError::BadRequest(message),
            StoreError::SlotTaken { .. } => ApiError::Conflict(MSG_SLOT_TAKEN.to_string()),
            StoreError::NotFound(_) => ApiError::NotFound(MSG_NOT_FOUND.to_string()),
            StoreError::Cancelled(_) => ApiError::Conflict(
                "Agendamento cancelado não pode ser alterado, apenas excluído.".to_string(),
            ),
            StoreError::AlreadyUploaded(_) => {
                ApiError::Conflict("Este agendamento já possui arquivo enviado.".to_string())
            }
            StoreError::Io(_) | StoreError::Corrupt(_) => ApiError::internal(err),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Internal(detail) => {
                log::error!("Request failed: {detail}");
                "Erro interno do servidor.".to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({ "message": message }))
    }
}
