use std::{path::PathBuf, sync::Arc};

use crate::{
    auth::AdminCredentials,
    catalog::SlotCatalog,
    config::Config,
    store::AppointmentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AppointmentStore>,
    pub catalog: SlotCatalog,
    pub admin: AdminCredentials,
    pub uploads: UploadSettings,
}

#[derive(Clone, Debug)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub max_bytes: u64,
}

impl AppState {
    pub async fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        tokio::fs::create_dir_all(&config.upload_dir).await?;
        let store = AppointmentStore::open(config.data_file(), config.hold()).await?;
        let admin = AdminCredentials::new(&config.admin_user, &config.admin_password)
            .map_err(|err| format!("admin password hash failed: {err}"))?;

        Ok(Self {
            store: Arc::new(store),
            catalog: config.catalog(),
            admin,
            uploads: UploadSettings {
                dir: config.upload_dir.clone(),
                max_bytes: config.max_upload_bytes(),
            },
        })
    }
}
