// src/routes/patient_routes.rs

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    appointment::{
        reconcile::{ReconcileError, ReconcileOutcome, reconcile_patient, reconcile_status},
        status::{StatusReport, derive_status, parse_appointment_date},
    },
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
    store::PatientRecord,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patients", post(create_patient).get(list_patients))
        .route("/patients/{patient_id}", get(get_patient).patch(update_patient))
        .route("/patients/{patient_id}/appointment-status", get(get_appointment_status))
        .route(
            "/patients/{patient_id}/appointment-status/sync",
            post(sync_appointment_status),
        )
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize)]
pub struct PatientView {
    pub patient: PatientRecord,
    /// Freshly derived; `None` when the patient has no appointment date.
    pub appointment: Option<StatusReport>,
}

impl PatientView {
    fn new(patient: PatientRecord, today: NaiveDate) -> Self {
        let appointment = derive_status(patient.appointment_date, today);
        Self {
            patient,
            appointment,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResult {
    pub ok: bool,
    pub outcome: Option<ReconcileOutcome>,
    pub error: Option<SyncError>,
}

#[derive(Debug, Serialize)]
pub struct SyncError {
    pub code: &'static str,
    pub message: String,
}

impl From<Result<ReconcileOutcome, ReconcileError>> for SyncResult {
    fn from(res: Result<ReconcileOutcome, ReconcileError>) -> Self {
        match res {
            Ok(outcome) => SyncResult {
                ok: true,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => SyncResult {
                ok: false,
                outcome: None,
                error: Some(SyncError {
                    code: e.code(),
                    message: e.to_string(),
                }),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentStatusData {
    #[serde(flatten)]
    pub view: PatientView,
    pub sync: SyncResult,
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub appointment_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    // absent => keep, null => clear
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub appointment_date: Option<Option<String>>,
}

fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // only called when the field is present, so null => Some(None)
    let inner = Option::<T>::deserialize(deserializer)?;
    Ok(Some(inner))
}

/* ============================================================
   Helpers
   ============================================================ */

fn required_name(value: &str, field: &str) -> Result<String, ApiError> {
    let t = value.trim();
    if t.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        ));
    }
    if t.len() > 128 {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} is too long (max 128)"),
        ));
    }
    Ok(t.to_string())
}

/// Writes reject what reads tolerate: an unparseable date here is a 400.
pub(crate) fn parse_date_field(
    state: &AppState,
    raw: &str,
    field: &str,
) -> Result<NaiveDate, ApiError> {
    parse_appointment_date(raw, state.clinic_offset).ok_or_else(|| {
        ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("{field} must be an ISO-8601 date or date-time"),
        )
    })
}

async fn load_owned_patient(
    state: &AppState,
    auth: &AuthContext,
    patient_id: Uuid,
) -> Result<PatientRecord, ApiError> {
    state
        .patients
        .fetch_by_id(patient_id)
        .await?
        .filter(|p| p.owner_user_id == auth.user_id)
        .ok_or_else(ApiError::patient_not_found)
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn create_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreatePatientRequest>,
) -> Result<Json<ApiOk<PatientView>>, ApiError> {
    let first_name = required_name(&req.first_name, "first_name")?;
    let last_name = required_name(&req.last_name, "last_name")?;
    let appointment_date = req
        .appointment_date
        .as_deref()
        .map(|raw| parse_date_field(&state, raw, "appointment_date"))
        .transpose()?;

    let today = state.today();
    let status = derive_status(appointment_date, today).map(|r| r.status.as_str());

    let row: PatientRecord = sqlx::query_as::<_, PatientRecord>(
        r#"
        INSERT INTO patient
            (owner_user_id, first_name, last_name, appointment_date, appointment_date_set_at, status)
        VALUES ($1, $2, $3, $4, now(), $5)
        RETURNING patient_id, owner_user_id, first_name, last_name,
                  appointment_date, appointment_date_set_at, status, created_at, updated_at
        "#,
    )
    .bind(auth.user_id)
    .bind(first_name)
    .bind(last_name)
    .bind(appointment_date)
    .bind(status)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?;

    Ok(Json(ApiOk {
        data: PatientView::new(row, today),
    }))
}

pub async fn list_patients(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<PatientView>>>, ApiError> {
    let today = state.today();
    let rows = state.patients.list_owned(auth.user_id).await?;

    Ok(Json(ApiOk {
        data: rows
            .into_iter()
            .map(|p| PatientView::new(p, today))
            .collect(),
    }))
}

pub async fn get_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<PatientView>>, ApiError> {
    let patient = load_owned_patient(&state, &auth, patient_id).await?;

    Ok(Json(ApiOk {
        data: PatientView::new(patient, state.today()),
    }))
}

pub async fn update_patient(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
    Json(req): Json<UpdatePatientRequest>,
) -> Result<Json<ApiOk<AppointmentStatusData>>, ApiError> {
    let existing = load_owned_patient(&state, &auth, patient_id).await?;

    let first_name = match req.first_name.as_deref() {
        Some(s) => required_name(s, "first_name")?,
        None => existing.first_name.clone(),
    };
    let last_name = match req.last_name.as_deref() {
        Some(s) => required_name(s, "last_name")?,
        None => existing.last_name.clone(),
    };
    let appointment_date = match req.appointment_date {
        None => existing.appointment_date,
        Some(None) => None,
        Some(Some(raw)) => Some(parse_date_field(&state, &raw, "appointment_date")?),
    };

    let mut updated: PatientRecord = sqlx::query_as::<_, PatientRecord>(
        r#"
        UPDATE patient
        SET first_name = $1,
            last_name = $2,
            appointment_date = $3,
            appointment_date_set_at = CASE
                WHEN appointment_date IS DISTINCT FROM $3 THEN now()
                ELSE appointment_date_set_at
            END,
            updated_at = now()
        WHERE patient_id = $4
          AND owner_user_id = $5
        RETURNING patient_id, owner_user_id, first_name, last_name,
                  appointment_date, appointment_date_set_at, status, created_at, updated_at
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(appointment_date)
    .bind(patient_id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::Internal(format!("db error: {e}")))?
    .ok_or_else(ApiError::patient_not_found)?;

    // the date may have moved; bring the label along
    let today = state.today();
    let sync = reconcile_status(&*state.patients, Some(auth.user_id), &mut updated, today).await;

    Ok(Json(ApiOk {
        data: AppointmentStatusData {
            view: PatientView::new(updated, today),
            sync: sync.into(),
        },
    }))
}

/// Viewing a patient's status reconciles it. A failed write never fails the
/// read: the stored (stale) label is returned with the sync error attached.
pub async fn get_appointment_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentStatusData>>, ApiError> {
    let mut patient = load_owned_patient(&state, &auth, patient_id).await?;
    let today = state.today();

    let sync = reconcile_status(&*state.patients, Some(auth.user_id), &mut patient, today).await;
    if let Err(e) = &sync {
        tracing::warn!(patient_id = %patient_id, code = e.code(), "status sync deferred: {e}");
    }

    Ok(Json(ApiOk {
        data: AppointmentStatusData {
            view: PatientView::new(patient, today),
            sync: sync.into(),
        },
    }))
}

pub async fn sync_appointment_status(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentStatusData>>, ApiError> {
    let today = state.today();
    let (patient, outcome) =
        reconcile_patient(&*state.patients, Some(auth.user_id), patient_id, today).await?;

    Ok(Json(ApiOk {
        data: AppointmentStatusData {
            view: PatientView::new(patient, today),
            sync: Ok::<_, ReconcileError>(outcome).into(),
        },
    }))
}
