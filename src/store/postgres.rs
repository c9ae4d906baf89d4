// src/store/postgres.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PatientRecord, PatientStore, StoreResult};
use crate::appointment::status::AppointmentStatus;

#[derive(Clone)]
pub struct PgPatientStore {
    pool: PgPool,
}

impl PgPatientStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PatientStore for PgPatientStore {
    async fn fetch_by_id(&self, patient_id: Uuid) -> StoreResult<Option<PatientRecord>> {
        let row = sqlx::query_as::<_, PatientRecord>(
            r#"
            SELECT patient_id, owner_user_id, first_name, last_name,
                   appointment_date, appointment_date_set_at, status, created_at, updated_at
            FROM patient
            WHERE patient_id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update_status(
        &self,
        patient_id: Uuid,
        owner_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE patient
            SET status = $1, updated_at = now()
            WHERE patient_id = $2
              AND owner_user_id = $3
            "#,
        )
        .bind(status.as_str())
        .bind(patient_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    async fn reschedule_visit(
        &self,
        owner_id: Uuid,
        patient_id: Uuid,
        diagnosis_id: Uuid,
        next_visit: NaiveDate,
    ) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        let diagnosis = sqlx::query(
            r#"
            UPDATE diagnosis
            SET next_visit_date = $1, updated_at = now()
            WHERE diagnosis_id = $2
              AND patient_id = $3
              AND owner_user_id = $4
            "#,
        )
        .bind(next_visit)
        .bind(diagnosis_id)
        .bind(patient_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if diagnosis.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        let patient = sqlx::query(
            r#"
            UPDATE patient
            SET appointment_date = $1,
                appointment_date_set_at = now(),
                updated_at = now()
            WHERE patient_id = $2
              AND owner_user_id = $3
            "#,
        )
        .bind(next_visit)
        .bind(patient_id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        if patient.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(0);
        }

        tx.commit().await?;
        Ok(patient.rows_affected())
    }

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<PatientRecord>> {
        let rows = sqlx::query_as::<_, PatientRecord>(
            r#"
            SELECT patient_id, owner_user_id, first_name, last_name,
                   appointment_date, appointment_date_set_at, status, created_at, updated_at
            FROM patient
            WHERE owner_user_id = $1
            ORDER BY appointment_date ASC NULLS LAST, last_name ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn repair_date_drift(&self, owner_id: Uuid) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE patient p
            SET appointment_date = d.next_visit_date,
                appointment_date_set_at = now(),
                updated_at = now()
            FROM (
              SELECT DISTINCT ON (patient_id) patient_id, next_visit_date, updated_at
              FROM diagnosis
              WHERE owner_user_id = $1
                AND next_visit_date IS NOT NULL
              ORDER BY patient_id, updated_at DESC
            ) d
            WHERE p.patient_id = d.patient_id
              AND p.owner_user_id = $1
              AND p.appointment_date IS DISTINCT FROM d.next_visit_date
              AND (p.appointment_date_set_at IS NULL
                   OR d.updated_at > p.appointment_date_set_at)
            "#,
        )
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }
}
