// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    appointment::{
        reconcile::{ReconcileOutcome, SweepReport, reconcile_owned, reconcile_patient},
        reschedule::reschedule_visit,
        status::{StatusReport, derive_status, derive_status_from},
    },
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    routes::patient_routes::parse_date_field,
    store::PatientRecord,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointment-status/preview", post(preview_status))
        .route("/appointment-status/sync", post(sync_owned))
        .route("/diagnoses", post(create_diagnosis))
        .route("/diagnoses/{diagnosis_id}/reschedule", post(reschedule_diagnosis))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub appointment_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDiagnosisRequest {
    pub patient_id: Uuid,
    pub summary: String,
    pub next_visit_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub next_visit_date: String,
}

#[derive(Debug, Serialize)]
pub struct VisitData {
    pub diagnosis_id: Uuid,
    pub patient: PatientRecord,
    pub appointment: Option<StatusReport>,
    pub sync: ReconcileOutcome,
}

/* ============================================================
   POST /appointment-status/preview
   ============================================================ */

/// Pure derivation; absent or malformed dates come back as `data: null`.
pub async fn preview_status(
    State(state): State<AppState>,
    _auth: AuthContext,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<ApiOk<Option<StatusReport>>>, ApiError> {
    let report = derive_status_from(
        req.appointment_date.as_deref(),
        state.today(),
        state.clinic_offset,
    );
    Ok(Json(ApiOk { data: report }))
}

/* ============================================================
   POST /appointment-status/sync  (owner-wide repair pass)
   ============================================================ */

pub async fn sync_owned(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<SweepReport>>, ApiError> {
    let report = reconcile_owned(&*state.patients, Some(auth.user_id), state.today()).await?;

    tracing::info!(
        owner_id = %auth.user_id,
        checked = report.checked,
        updated = report.updated,
        failed = report.failures.len(),
        "appointment status sweep finished"
    );

    Ok(Json(ApiOk { data: report }))
}

/* ============================================================
   POST /diagnoses
   ============================================================ */

pub async fn create_diagnosis(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateDiagnosisRequest>,
) -> Result<Json<ApiOk<VisitData>>, ApiError> {
    let summary = req.summary.trim();
    if summary.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "summary is required".into(),
        ));
    }
    let next_visit = req
        .next_visit_date
        .as_deref()
        .map(|raw| parse_date_field(&state, raw, "next_visit_date"))
        .transpose()?;

    let mut tx = state
        .db
        .begin()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    // owner check happens in the INSERT ... SELECT
    let diagnosis_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO diagnosis (patient_id, owner_user_id, summary, next_visit_date)
        SELECT p.patient_id, p.owner_user_id, $3, $4
        FROM patient p
        WHERE p.patient_id = $1
          AND p.owner_user_id = $2
        RETURNING diagnosis_id
        "#,
    )
    .bind(req.patient_id)
    .bind(auth.user_id)
    .bind(summary)
    .bind(next_visit)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::patient_not_found)?;

    if let Some(date) = next_visit {
        sqlx::query(
            r#"
            UPDATE patient
            SET appointment_date = $1,
                appointment_date_set_at = now(),
                updated_at = now()
            WHERE patient_id = $2
              AND owner_user_id = $3
            "#,
        )
        .bind(date)
        .bind(req.patient_id)
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;
    }

    tx.commit()
        .await
        .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    let today = state.today();
    let (patient, outcome) =
        reconcile_patient(&*state.patients, Some(auth.user_id), req.patient_id, today).await?;

    Ok(Json(ApiOk {
        data: VisitData {
            diagnosis_id,
            appointment: derive_status(patient.appointment_date, today),
            patient,
            sync: outcome,
        },
    }))
}

/* ============================================================
   POST /diagnoses/{id}/reschedule
   ============================================================ */

pub async fn reschedule_diagnosis(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(diagnosis_id): Path<Uuid>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiOk<VisitData>>, ApiError> {
    let next_visit = parse_date_field(&state, &req.next_visit_date, "next_visit_date")?;

    let patient_id: Uuid = sqlx::query_scalar(
        r#"
        SELECT patient_id
        FROM diagnosis
        WHERE diagnosis_id = $1
          AND owner_user_id = $2
        "#,
    )
    .bind(diagnosis_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(|| ApiError::NotFound("RECORD_NOT_FOUND", "diagnosis not found".into()))?;

    let today = state.today();
    let (patient, outcome) = reschedule_visit(
        &*state.patients,
        Some(auth.user_id),
        patient_id,
        diagnosis_id,
        next_visit,
        today,
    )
    .await?;

    Ok(Json(ApiOk {
        data: VisitData {
            diagnosis_id,
            appointment: derive_status(patient.appointment_date, today),
            patient,
            sync: outcome,
        },
    }))
}
