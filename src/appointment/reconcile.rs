// src/appointment/reconcile.rs

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::status::{AppointmentStatus, derive_status};
use crate::store::{PatientRecord, PatientStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Patient record not found for this owner")]
    RecordNotFound,
    #[error("Patient store unavailable: {0}")]
    Connectivity(String),
}

impl ReconcileError {
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::Unauthenticated => "UNAUTHENTICATED",
            ReconcileError::RecordNotFound => "RECORD_NOT_FOUND",
            ReconcileError::Connectivity(_) => "CONNECTIVITY_FAILURE",
        }
    }
}

impl From<StoreError> for ReconcileError {
    fn from(e: StoreError) -> Self {
        ReconcileError::Connectivity(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No appointment date, nothing to persist.
    NoAppointment,
    Unchanged {
        status: AppointmentStatus,
    },
    Updated {
        previous: Option<String>,
        current: AppointmentStatus,
    },
}

/// Persist the derived status on `record` when its stored label is stale.
///
/// At most one `update_status` call is issued. The owner is only required
/// when a write is actually needed. On success `record.status` is refreshed
/// in place so the caller does not need to re-fetch.
pub async fn reconcile_status<S>(
    store: &S,
    owner: Option<Uuid>,
    record: &mut PatientRecord,
    today: NaiveDate,
) -> Result<ReconcileOutcome, ReconcileError>
where
    S: PatientStore + ?Sized,
{
    let Some(report) = derive_status(record.appointment_date, today) else {
        debug!(patient_id = %record.patient_id, "no appointment date, skipping status sync");
        return Ok(ReconcileOutcome::NoAppointment);
    };

    if report.status.matches_label(record.status.as_deref()) {
        debug!(patient_id = %record.patient_id, status = %report.status, "status already current");
        return Ok(ReconcileOutcome::Unchanged {
            status: report.status,
        });
    }

    let owner_id = owner.ok_or(ReconcileError::Unauthenticated)?;

    let affected = store
        .update_status(record.patient_id, owner_id, report.status)
        .await
        .map_err(|e| {
            warn!(patient_id = %record.patient_id, error = %e, "status sync failed");
            ReconcileError::from(e)
        })?;

    if affected == 0 {
        warn!(
            patient_id = %record.patient_id,
            owner_id = %owner_id,
            "status sync matched no record for this owner"
        );
        return Err(ReconcileError::RecordNotFound);
    }

    let previous = record.status.replace(report.status.as_str().to_string());
    info!(
        patient_id = %record.patient_id,
        from = previous.as_deref().unwrap_or("-"),
        to = %report.status,
        "appointment status updated"
    );

    Ok(ReconcileOutcome::Updated {
        previous,
        current: report.status,
    })
}

/// Load a patient for `owner` and reconcile it.
///
/// A record that is missing or belongs to another owner is `RecordNotFound`;
/// the two are not told apart.
pub async fn reconcile_patient<S>(
    store: &S,
    owner: Option<Uuid>,
    patient_id: Uuid,
    today: NaiveDate,
) -> Result<(PatientRecord, ReconcileOutcome), ReconcileError>
where
    S: PatientStore + ?Sized,
{
    let owner_id = owner.ok_or(ReconcileError::Unauthenticated)?;

    let mut record = store
        .fetch_by_id(patient_id)
        .await?
        .filter(|r| r.owner_user_id == owner_id)
        .ok_or(ReconcileError::RecordNotFound)?;

    let outcome = reconcile_status(store, Some(owner_id), &mut record, today).await?;
    Ok((record, outcome))
}

#[derive(Debug, Serialize)]
pub struct SweepFailure {
    pub patient_id: Uuid,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub repaired_dates: u64,
    pub checked: usize,
    pub updated: usize,
    pub failures: Vec<SweepFailure>,
}

/// Repair date drift, then reconcile every patient the owner holds.
/// A failure on one patient is recorded and the sweep moves on.
pub async fn reconcile_owned<S>(
    store: &S,
    owner: Option<Uuid>,
    today: NaiveDate,
) -> Result<SweepReport, ReconcileError>
where
    S: PatientStore + ?Sized,
{
    let owner_id = owner.ok_or(ReconcileError::Unauthenticated)?;

    let mut report = SweepReport {
        repaired_dates: store.repair_date_drift(owner_id).await?,
        ..SweepReport::default()
    };
    if report.repaired_dates > 0 {
        info!(owner_id = %owner_id, repaired = report.repaired_dates, "appointment dates repaired");
    }

    for mut record in store.list_owned(owner_id).await? {
        report.checked += 1;
        match reconcile_status(store, Some(owner_id), &mut record, today).await {
            Ok(ReconcileOutcome::Updated { .. }) => report.updated += 1,
            Ok(_) => {}
            Err(e) => report.failures.push(SweepFailure {
                patient_id: record.patient_id,
                code: e.code(),
                message: e.to_string(),
            }),
        }
    }

    Ok(report)
}
