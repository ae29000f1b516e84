use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tokio::{fs, sync::Mutex};

use crate::{
    catalog::SlotCatalog,
    models::{AdminPayload, AgendaFilter, Appointment, AppointmentStatus, NewReservation, UploadInfo},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("appointment file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("appointment file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("{0}")]
    Invalid(String),

    #[error("slot {date} {slot} is already taken")]
    SlotTaken { date: NaiveDate, slot: String },

    #[error("appointment {0} not found")]
    NotFound(String),

    #[error("appointment {0} is cancelled")]
    Cancelled(String),

    #[error("appointment {0} already has an uploaded file")]
    AlreadyUploaded(String),
}

enum Commit {
    Write,
    Skip,
}

/// File-backed appointment list. Every operation runs under one lock and
/// reloads, sweeps and (when something changed) rewrites the whole file.
pub struct AppointmentStore {
    path: PathBuf,
    hold: Duration,
    lock: Mutex<()>,
}

impl AppointmentStore {
    pub async fn open(path: impl Into<PathBuf>, hold: Duration) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        if !fs::try_exists(&path).await? {
            fs::write(&path, b"[]").await?;
            log::info!("Created empty appointment file at {}", path.display());
        }
        Ok(Self {
            path,
            hold,
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn taken_slots(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        self.transact(now, |appointments| {
            let taken = appointments
                .iter()
                .filter(|appt| appt.status.is_active() && appt.date == date)
                .map(|appt| appt.slot.clone())
                .collect();
            Ok((taken, Commit::Skip))
        })
        .await
    }

    pub async fn create_reservation(
        &self,
        reservation: NewReservation,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let hold = self.hold;
        self.transact(now, move |appointments| {
            ensure_free(appointments, reservation.date, &reservation.slot, None)?;
            let appointment = reservation.into_appointment(now, hold);
            appointments.push(appointment.clone());
            Ok((appointment, Commit::Write))
        })
        .await
    }

    pub async fn attach_upload(
        &self,
        id: &str,
        upload: UploadInfo,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        self.transact(now, |appointments| {
            let appointment = appointments
                .iter_mut()
                .find(|appt| appt.id == id)
                .filter(|appt| appt.status.is_active())
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            if !appointment.upload.is_empty() {
                return Err(StoreError::AlreadyUploaded(id.to_string()));
            }
            appointment.upload = upload;
            appointment.status = AppointmentStatus::Reserved;
            Ok((appointment.clone(), Commit::Write))
        })
        .await
    }

    pub async fn list(&self, filter: &AgendaFilter, now: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError> {
        self.transact(now, |appointments| {
            let mut listed: Vec<Appointment> = appointments
                .iter()
                .filter(|appt| filter.matches(appt))
                .cloned()
                .collect();
            listed.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.slot.cmp(&b.slot)));
            Ok((listed, Commit::Skip))
        })
        .await
    }

    /// Creates a record when the payload has no id, otherwise overwrites the
    /// supplied fields of the existing one. Returns the record and whether it was created.
    pub async fn admin_upsert(
        &self,
        payload: AdminPayload,
        catalog: &SlotCatalog,
        now: DateTime<Utc>,
    ) -> Result<(Appointment, bool), StoreError> {
        let hold = self.hold;
        self.transact(now, move |appointments| {
            let id = payload
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string);

            let Some(id) = id else {
                let appointment = payload.into_new(catalog, now, hold).map_err(StoreError::Invalid)?;
                if appointment.status.is_active() {
                    ensure_free(appointments, appointment.date, &appointment.slot, None)?;
                }
                appointments.push(appointment.clone());
                return Ok(((appointment, true), Commit::Write));
            };

            let index = appointments
                .iter()
                .position(|appt| appt.id == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            if !appointments[index].status.is_active() {
                return Err(StoreError::Cancelled(id));
            }

            let mut updated = appointments[index].clone();
            payload.apply_to(&mut updated, catalog).map_err(StoreError::Invalid)?;
            if updated.status.is_active() {
                ensure_free(appointments, updated.date, &updated.slot, Some(&id))?;
            }
            appointments[index] = updated.clone();
            Ok(((updated, false), Commit::Write))
        })
        .await
    }

    pub async fn admin_delete(&self, id: &str, now: DateTime<Utc>) -> Result<Appointment, StoreError> {
        self.transact(now, |appointments| {
            let index = appointments
                .iter()
                .position(|appt| appt.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            Ok((appointments.remove(index), Commit::Write))
        })
        .await
    }

    async fn transact<T, F>(&self, now: DateTime<Utc>, apply: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Appointment>) -> Result<(T, Commit), StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut appointments = self.load().await?;
        let expired = expire_overdue(&mut appointments, now);
        let (value, commit) = apply(&mut appointments)?;
        if expired > 0 || matches!(commit, Commit::Write) {
            self.save(&appointments).await?;
        }
        Ok(value)
    }

    async fn load(&self) -> Result<Vec<Appointment>, StoreError> {
        let raw = fs::read(&self.path).await?;
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn save(&self, appointments: &[Appointment]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(appointments)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Cancels every appointment still awaiting upload whose hold has run out.
pub fn expire_overdue(appointments: &mut [Appointment], now: DateTime<Utc>) -> usize {
    let mut expired = 0;
    for appointment in appointments.iter_mut().filter(|appt| appt.is_overdue(now)) {
        appointment.status = AppointmentStatus::Cancelled;
        expired += 1;
        log::info!(
            "Hold expired for appointment {} ({} {})",
            appointment.id,
            appointment.date,
            appointment.slot
        );
    }
    expired
}

fn ensure_free(
    appointments: &[Appointment],
    date: NaiveDate,
    slot: &str,
    except: Option<&str>,
) -> Result<(), StoreError> {
    let taken = appointments
        .iter()
        .filter(|appt| Some(appt.id.as_str()) != except)
        .any(|appt| appt.occupies(date, slot));
    if taken {
        return Err(StoreError::SlotTaken {
            date,
            slot: slot.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::models::{FileKind, ReservationPayload};

    fn catalog() -> SlotCatalog {
        SlotCatalog::new(FixedOffset::west_opt(3 * 3600).unwrap(), 10, SlotCatalog::default_slots())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    fn reservation(date: NaiveDate, slot: &str) -> NewReservation {
        NewReservation {
            date,
            slot: slot.to_string(),
            shopping: "Shopping Sul".into(),
            trade_name: "Padaria Sol".into(),
            contact_name: "Marta".into(),
            phone: "11912345678".into(),
            email: "marta@example.com".into(),
            notes: String::new(),
        }
    }

    fn pdf() -> UploadInfo {
        UploadInfo {
            url: Some("/uploads/abc.pdf".into()),
            kind: Some(FileKind::Pdf),
            size_mb: Some(0.5),
        }
    }

    async fn open_store(dir: &tempfile::TempDir) -> AppointmentStore {
        AppointmentStore::open(dir.path().join("data/agendamentos.json"), Duration::hours(24))
            .await
            .unwrap()
    }

    async fn stored(store: &AppointmentStore) -> Vec<Appointment> {
        let raw = std::fs::read(store.path()).unwrap();
        serde_json::from_slice(&raw).unwrap()
    }

    #[tokio::test]
    async fn open_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(stored(&store).await.is_empty());
    }

    #[tokio::test]
    async fn occupied_slot_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let err = store
            .create_reservation(reservation(day(20), "09:00"), now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken { .. }));
        assert_eq!(std::fs::read(store.path()).unwrap(), before);

        store.create_reservation(reservation(day(20), "10:00"), now()).await.unwrap();
        store.create_reservation(reservation(day(21), "09:00"), now()).await.unwrap();
        assert_eq!(stored(&store).await.len(), 3);
    }

    #[tokio::test]
    async fn taken_slots_ignore_cancelled_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        store.create_reservation(reservation(day(20), "14:00"), now()).await.unwrap();
        assert_eq!(store.taken_slots(day(20), now()).await.unwrap(), vec!["09:00", "14:00"]);

        let later = now() + Duration::hours(25);
        assert!(store.taken_slots(day(20), later).await.unwrap().is_empty());
        assert!(stored(&store)
            .await
            .iter()
            .all(|appt| appt.status == AppointmentStatus::Cancelled));
    }

    #[tokio::test]
    async fn expired_hold_frees_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let first = store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        let later = now() + Duration::hours(24) + Duration::seconds(1);
        let second = store
            .create_reservation(reservation(day(20), "09:00"), later)
            .await
            .unwrap();
        assert_ne!(first.id, second.id);

        let all = stored(&store).await;
        let active: Vec<_> = all.iter().filter(|appt| appt.status.is_active()).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.id);
    }

    #[tokio::test]
    async fn reserved_appointments_survive_the_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let appt = store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        store.attach_upload(&appt.id, pdf(), now()).await.unwrap();

        let later = now() + Duration::days(3);
        let listed = store.list(&AgendaFilter::default(), later).await.unwrap();
        assert_eq!(listed[0].status, AppointmentStatus::Reserved);
    }

    #[tokio::test]
    async fn first_upload_reserves_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let appt = store.create_reservation(reservation(day(20), "11:00"), now()).await.unwrap();
        let reserved = store.attach_upload(&appt.id, pdf(), now()).await.unwrap();
        assert_eq!(reserved.status, AppointmentStatus::Reserved);
        assert_eq!(reserved.upload, pdf());

        let other = UploadInfo {
            url: Some("/uploads/other.png".into()),
            kind: Some(FileKind::Image),
            size_mb: Some(1.0),
        };
        let err = store.attach_upload(&appt.id, other, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyUploaded(_)));
        assert_eq!(stored(&store).await[0].upload, pdf());
    }

    #[tokio::test]
    async fn upload_to_missing_or_expired_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = store.attach_upload("nope", pdf(), now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        let appt = store.create_reservation(reservation(day(20), "13:00"), now()).await.unwrap();
        let later = now() + Duration::hours(30);
        let err = store.attach_upload(&appt.id, pdf(), later).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));

        assert!(stored(&store).await[0].upload.is_empty());
    }

    #[tokio::test]
    async fn concurrent_bookings_for_one_slot_admit_a_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open_store(&dir).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create_reservation(reservation(day(22), "15:00"), now()).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StoreError::SlotTaken { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(stored(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn admin_upsert_creates_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let catalog = catalog();

        let payload = AdminPayload {
            fields: ReservationPayload {
                date: Some("2026-10-23".into()),
                slot: Some("16:00".into()),
                shopping: Some("Shopping Leste".into()),
                trade_name: Some("Ótica Visão".into()),
                contact_name: Some("Paulo".into()),
                phone: Some("11955554444".into()),
                email: Some("paulo@example.com".into()),
                notes: Some("entrada pelos fundos".into()),
            },
            status: Some(AppointmentStatus::Reserved),
            ..Default::default()
        };
        let (created, was_created) = store.admin_upsert(payload, &catalog, now()).await.unwrap();
        assert!(was_created);
        assert_eq!(created.status, AppointmentStatus::Reserved);
        assert_eq!(created.expires_at, Some(now() + Duration::hours(24)));

        let update = AdminPayload {
            id: Some(created.id.clone()),
            fields: ReservationPayload {
                slot: Some("17:00".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let (updated, was_created) = store.admin_upsert(update, &catalog, now()).await.unwrap();
        assert!(!was_created);
        assert_eq!(updated.slot, "17:00");
        assert_eq!(updated.trade_name, "Ótica Visão");
        assert_eq!(updated.notes, "entrada pelos fundos");
        assert_eq!(stored(&store).await, vec![updated]);
    }

    #[tokio::test]
    async fn admin_upsert_respects_slot_and_cancellation_rules() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let catalog = catalog();

        let a = store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        let b = store.create_reservation(reservation(day(20), "10:00"), now()).await.unwrap();

        let move_b = AdminPayload {
            id: Some(b.id.clone()),
            fields: ReservationPayload {
                slot: Some("09:00".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = store.admin_upsert(move_b, &catalog, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::SlotTaken { .. }));

        let cancel_a = AdminPayload {
            id: Some(a.id.clone()),
            status: Some(AppointmentStatus::Cancelled),
            ..Default::default()
        };
        store.admin_upsert(cancel_a, &catalog, now()).await.unwrap();

        let revive_a = AdminPayload {
            id: Some(a.id.clone()),
            status: Some(AppointmentStatus::Reserved),
            ..Default::default()
        };
        let err = store.admin_upsert(revive_a, &catalog, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled(_)));

        let unknown = AdminPayload {
            id: Some("missing".into()),
            ..Default::default()
        };
        let err = store.admin_upsert(unknown, &catalog, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn admin_delete_removes_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let appt = store.create_reservation(reservation(day(20), "09:00"), now()).await.unwrap();
        let deleted = store.admin_delete(&appt.id, now()).await.unwrap();
        assert_eq!(deleted.id, appt.id);
        assert!(stored(&store).await.is_empty());

        let err = store.admin_delete(&appt.id, now()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.create_reservation(reservation(day(21), "09:00"), now()).await.unwrap();
        store.create_reservation(reservation(day(20), "15:00"), now()).await.unwrap();
        let first = store.create_reservation(reservation(day(20), "10:00"), now()).await.unwrap();
        store.attach_upload(&first.id, pdf(), now()).await.unwrap();

        let all = store.list(&AgendaFilter::default(), now()).await.unwrap();
        let order: Vec<_> = all.iter().map(|appt| (appt.date, appt.slot.as_str())).collect();
        assert_eq!(order, vec![(day(20), "10:00"), (day(20), "15:00"), (day(21), "09:00")]);

        let filter = AgendaFilter {
            date: Some(day(20)),
            status: Some(AppointmentStatus::Reserved),
        };
        let reserved = store.list(&filter, now()).await.unwrap();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].id, first.id);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        std::fs::write(store.path(), b"{not json").unwrap();

        let err = store.taken_slots(day(20), now()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
