// src/store/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::appointment::status::AppointmentStatus;

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PatientRecord {
    pub patient_id: Uuid,
    pub owner_user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub appointment_date: Option<NaiveDate>,
    /// Last direct write of `appointment_date`. A diagnosis only overrides
    /// the date when it was updated after this.
    pub appointment_date_set_at: Option<DateTime<Utc>>,
    /// Last persisted status label; may be stale until reconciled.
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Patient-record collaborator used by the status engine.
///
/// Writes are always scoped by owner and report rows affected, so a zero
/// count ("not yours or gone") stays distinguishable from a backend error.
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn fetch_by_id(&self, patient_id: Uuid) -> StoreResult<Option<PatientRecord>>;

    async fn update_status(
        &self,
        patient_id: Uuid,
        owner_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<u64>;

    /// Move a visit: the diagnosis' next visit and the patient's appointment
    /// date change together or not at all. Returns 0 when either row is
    /// missing for this owner.
    async fn reschedule_visit(
        &self,
        owner_id: Uuid,
        patient_id: Uuid,
        diagnosis_id: Uuid,
        next_visit: NaiveDate,
    ) -> StoreResult<u64>;

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<PatientRecord>>;

    /// Copy the latest diagnosis next-visit date onto patients whose
    /// appointment date disagrees with it and was set before that diagnosis
    /// changed. Returns patients touched.
    async fn repair_date_drift(&self, owner_id: Uuid) -> StoreResult<u64>;
}
