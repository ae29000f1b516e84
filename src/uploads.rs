use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use futures_util::StreamExt;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    auth::new_id,
    error::ApiError,
    models::{FileKind, UploadInfo},
};

pub const UPLOAD_FIELD: &str = "arquivo";
pub const UPLOAD_URL_PREFIX: &str = "/uploads";
pub const ALLOWED_MIME_TYPES: [&str; 5] = [
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
];

/// A file written to the upload directory but not yet attached to an appointment.
#[derive(Debug)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
    pub mime: String,
    pub size: u64,
}

impl StoredUpload {
    pub fn descriptor(&self) -> UploadInfo {
        let size_mb = self.size as f64 / (1024.0 * 1024.0);
        UploadInfo {
            url: Some(format!("{UPLOAD_URL_PREFIX}/{}", self.file_name)),
            kind: Some(FileKind::from_mime(&self.mime)),
            size_mb: Some((size_mb * 100.0).round() / 100.0),
        }
    }

    /// Best-effort removal; a failure only leaves an orphaned file behind.
    pub async fn discard(self) {
        remove_quietly(&self.path).await;
    }
}

/// Streams the `arquivo` field of a multipart body into `dir`.
///
/// If any later part fails to read, the stored file is removed before the error is returned.
pub async fn receive(mut payload: Multipart, dir: &Path, max_bytes: u64) -> Result<StoredUpload, ApiError> {
    let mut stored = None;

    if let Err(err) = read_parts(&mut payload, dir, max_bytes, &mut stored).await {
        if let Some(upload) = stored.take() {
            upload.discard().await;
        }
        return Err(err);
    }

    stored.ok_or_else(|| ApiError::bad_request("Nenhum arquivo recebido."))
}

async fn read_parts(
    payload: &mut Multipart,
    dir: &Path,
    max_bytes: u64,
    stored: &mut Option<StoredUpload>,
) -> Result<(), ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|err| ApiError::bad_request(format!("Upload inválido: {err}")))?;
        let is_file_field = field.name() == Some(UPLOAD_FIELD);
        if !is_file_field || stored.is_some() {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|err| ApiError::bad_request(format!("Upload inválido: {err}")))?;
            }
            continue;
        }

        let mime = field
            .content_type()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_default();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(ApiError::bad_request("Formato inválido. Envie PDF ou imagem."));
        }

        let extension = field
            .content_disposition()
            .and_then(|disposition| disposition.get_filename())
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        let file_name = format!("{}{extension}", new_id());
        let path = dir.join(&file_name);

        let mut file = fs::File::create(&path).await.map_err(ApiError::internal)?;
        let mut size: u64 = 0;
        while let Some(chunk) = field.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    remove_quietly(&path).await;
                    return Err(ApiError::bad_request(format!("Upload inválido: {err}")));
                }
            };
            size += chunk.len() as u64;
            if size > max_bytes {
                drop(file);
                remove_quietly(&path).await;
                return Err(ApiError::bad_request(format!(
                    "Arquivo excede o limite de {} MB.",
                    max_bytes / (1024 * 1024)
                )));
            }
            if let Err(err) = file.write_all(&chunk).await {
                drop(file);
                remove_quietly(&path).await;
                return Err(ApiError::internal(err));
            }
        }
        if let Err(err) = file.flush().await {
            drop(file);
            remove_quietly(&path).await;
            return Err(ApiError::internal(err));
        }

        log::info!("Stored upload {} ({} bytes, {mime})", path.display(), size);
        *stored = Some(StoredUpload {
            file_name,
            path,
            mime,
            size,
        });
    }

    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        log::warn!("Failed to remove upload {}: {err}", path.display());
    }
}
