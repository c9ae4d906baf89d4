// src/appointment/reschedule.rs

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use super::reconcile::{ReconcileError, ReconcileOutcome, reconcile_patient};
use crate::store::{PatientRecord, PatientStore};

/// Move a patient's next visit.
///
/// The diagnosis next-visit date and the patient's appointment date are
/// written by the store as a single unit; afterwards the status label is
/// reconciled against the new date.
pub async fn reschedule_visit<S>(
    store: &S,
    owner: Option<Uuid>,
    patient_id: Uuid,
    diagnosis_id: Uuid,
    next_visit: NaiveDate,
    today: NaiveDate,
) -> Result<(PatientRecord, ReconcileOutcome), ReconcileError>
where
    S: PatientStore + ?Sized,
{
    let owner_id = owner.ok_or(ReconcileError::Unauthenticated)?;

    let affected = store
        .reschedule_visit(owner_id, patient_id, diagnosis_id, next_visit)
        .await?;
    if affected == 0 {
        warn!(
            patient_id = %patient_id,
            diagnosis_id = %diagnosis_id,
            "reschedule matched no patient/diagnosis pair for this owner"
        );
        return Err(ReconcileError::RecordNotFound);
    }

    info!(patient_id = %patient_id, next_visit = %next_visit, "visit rescheduled");
    reconcile_patient(store, Some(owner_id), patient_id, today).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::status::AppointmentStatus;
    use crate::store::memory::MemoryPatientStore;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn moves_both_dates_and_resyncs_status() {
        let store = MemoryPatientStore::new();
        let owner = Uuid::new_v4();
        let patient = store.insert_patient(owner, Some(today() - Duration::days(2)), Some("Completed"));
        let diagnosis = store.insert_diagnosis(&patient, Some(today() - Duration::days(2)));
        let next = today() + Duration::days(14);

        let (record, outcome) = reschedule_visit(
            &store,
            Some(owner),
            patient.patient_id,
            diagnosis.diagnosis_id,
            next,
            today(),
        )
        .await
        .unwrap();

        assert_eq!(record.appointment_date, Some(next));
        assert_eq!(record.status.as_deref(), Some("Scheduled"));
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated {
                previous: Some("Completed".into()),
                current: AppointmentStatus::Scheduled,
            }
        );
        assert_eq!(store.diagnosis(diagnosis.diagnosis_id).unwrap().next_visit_date, Some(next));
    }

    #[tokio::test]
    async fn mismatched_diagnosis_changes_nothing() {
        let store = MemoryPatientStore::new();
        let owner = Uuid::new_v4();
        let patient = store.insert_patient(owner, Some(today()), Some("Pending"));
        let other = store.insert_patient(owner, Some(today()), Some("Pending"));
        let foreign_diagnosis = store.insert_diagnosis(&other, Some(today()));

        let err = reschedule_visit(
            &store,
            Some(owner),
            patient.patient_id,
            foreign_diagnosis.diagnosis_id,
            today() + Duration::days(3),
            today(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ReconcileError::RecordNotFound));
        assert_eq!(store.patient(patient.patient_id).unwrap().appointment_date, Some(today()));
        assert_eq!(
            store.diagnosis(foreign_diagnosis.diagnosis_id).unwrap().next_visit_date,
            Some(today())
        );
        assert!(store.status_writes().is_empty());
    }

    #[tokio::test]
    async fn requires_an_owner() {
        let store = MemoryPatientStore::new();
        let err = reschedule_visit(
            &store,
            None,
            Uuid::new_v4(),
            Uuid::new_v4(),
            today(),
            today(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReconcileError::Unauthenticated));
    }
}
