// src/store/memory.rs
//
// In-process store for tests. Counts every status write so reconciliation
// properties can be asserted without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

use super::{PatientRecord, PatientStore, StoreError, StoreResult};
use crate::appointment::status::AppointmentStatus;

#[derive(Debug, Clone)]
pub struct DiagnosisEntry {
    pub diagnosis_id: Uuid,
    pub patient_id: Uuid,
    pub owner_user_id: Uuid,
    pub next_visit_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    patients: HashMap<Uuid, PatientRecord>,
    diagnoses: Vec<DiagnosisEntry>,
    status_writes: Vec<(Uuid, Uuid, AppointmentStatus)>,
    offline: bool,
    read_only: bool,
    last_stamp: Option<DateTime<Utc>>,
}

impl Inner {
    /// Strictly increasing timestamps, so write order survives a coarse clock.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(next);
        next
    }
}

#[derive(Default)]
pub struct MemoryPatientStore {
    inner: Mutex<Inner>,
}

impl MemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_patient(
        &self,
        owner_user_id: Uuid,
        appointment_date: Option<NaiveDate>,
        status: Option<&str>,
    ) -> PatientRecord {
        let mut inner = self.inner.lock().unwrap();
        let now = inner.stamp();
        let record = PatientRecord {
            patient_id: Uuid::new_v4(),
            owner_user_id,
            first_name: "Ana".into(),
            last_name: "Lopez".into(),
            appointment_date,
            appointment_date_set_at: Some(now),
            status: status.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        inner.patients.insert(record.patient_id, record.clone());
        record
    }

    pub fn insert_diagnosis(
        &self,
        patient: &PatientRecord,
        next_visit_date: Option<NaiveDate>,
    ) -> DiagnosisEntry {
        let mut inner = self.inner.lock().unwrap();
        let entry = DiagnosisEntry {
            diagnosis_id: Uuid::new_v4(),
            patient_id: patient.patient_id,
            owner_user_id: patient.owner_user_id,
            next_visit_date,
            updated_at: inner.stamp(),
        };
        inner.diagnoses.push(entry.clone());
        entry
    }

    /// Direct date edit, as `PATCH /patients/{id}` stores it.
    pub fn set_appointment_date(&self, patient_id: Uuid, appointment_date: Option<NaiveDate>) {
        let mut inner = self.inner.lock().unwrap();
        let now = inner.stamp();
        if let Some(p) = inner.patients.get_mut(&patient_id) {
            if p.appointment_date != appointment_date {
                p.appointment_date = appointment_date;
                p.appointment_date_set_at = Some(now);
            }
            p.updated_at = now;
        }
    }

    pub fn patient(&self, patient_id: Uuid) -> Option<PatientRecord> {
        self.inner.lock().unwrap().patients.get(&patient_id).cloned()
    }

    pub fn diagnosis(&self, diagnosis_id: Uuid) -> Option<DiagnosisEntry> {
        self.inner
            .lock()
            .unwrap()
            .diagnoses
            .iter()
            .find(|d| d.diagnosis_id == diagnosis_id)
            .cloned()
    }

    pub fn status_writes(&self) -> Vec<(Uuid, Uuid, AppointmentStatus)> {
        self.inner.lock().unwrap().status_writes.clone()
    }

    /// Every call after this fails like a dropped connection.
    pub fn go_offline(&self) {
        self.inner.lock().unwrap().offline = true;
    }

    /// Reads keep working, writes fail like a dropped connection.
    pub fn fail_writes(&self) {
        self.inner.lock().unwrap().read_only = true;
    }

    fn check_writable(inner: &Inner) -> StoreResult<()> {
        Self::check_online(inner)?;
        if inner.read_only {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn check_online(inner: &Inner) -> StoreResult<()> {
        if inner.offline {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PatientStore for MemoryPatientStore {
    async fn fetch_by_id(&self, patient_id: Uuid) -> StoreResult<Option<PatientRecord>> {
        let inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;
        Ok(inner.patients.get(&patient_id).cloned())
    }

    async fn update_status(
        &self,
        patient_id: Uuid,
        owner_id: Uuid,
        status: AppointmentStatus,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;
        inner.status_writes.push((patient_id, owner_id, status));
        let now = inner.stamp();

        match inner.patients.get_mut(&patient_id) {
            Some(p) if p.owner_user_id == owner_id => {
                p.status = Some(status.as_str().to_string());
                p.updated_at = now;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn reschedule_visit(
        &self,
        owner_id: Uuid,
        patient_id: Uuid,
        diagnosis_id: Uuid,
        next_visit: NaiveDate,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;

        let patient_ok = inner
            .patients
            .get(&patient_id)
            .is_some_and(|p| p.owner_user_id == owner_id);
        let diagnosis_idx = inner.diagnoses.iter().position(|d| {
            d.diagnosis_id == diagnosis_id && d.patient_id == patient_id && d.owner_user_id == owner_id
        });

        let (true, Some(idx)) = (patient_ok, diagnosis_idx) else {
            return Ok(0);
        };

        let now = inner.stamp();
        inner.diagnoses[idx].next_visit_date = Some(next_visit);
        inner.diagnoses[idx].updated_at = now;
        if let Some(p) = inner.patients.get_mut(&patient_id) {
            p.appointment_date = Some(next_visit);
            p.appointment_date_set_at = Some(now);
            p.updated_at = now;
        }
        Ok(1)
    }

    async fn list_owned(&self, owner_id: Uuid) -> StoreResult<Vec<PatientRecord>> {
        let inner = self.inner.lock().unwrap();
        Self::check_online(&inner)?;
        let mut rows: Vec<PatientRecord> = inner
            .patients
            .values()
            .filter(|p| p.owner_user_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by_key(|p| (p.appointment_date.is_none(), p.appointment_date));
        Ok(rows)
    }

    async fn repair_date_drift(&self, owner_id: Uuid) -> StoreResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        Self::check_writable(&inner)?;

        let mut latest: HashMap<Uuid, (NaiveDate, DateTime<Utc>)> = HashMap::new();
        for d in inner.diagnoses.iter().filter(|d| d.owner_user_id == owner_id) {
            let Some(date) = d.next_visit_date else {
                continue;
            };
            let newer = latest
                .get(&d.patient_id)
                .is_none_or(|(_, seen)| d.updated_at > *seen);
            if newer {
                latest.insert(d.patient_id, (date, d.updated_at));
            }
        }

        let now = inner.stamp();
        let mut touched = 0;
        for (patient_id, (date, diagnosed_at)) in latest {
            let Some(p) = inner.patients.get_mut(&patient_id) else {
                continue;
            };
            let set_before = p.appointment_date_set_at.is_none_or(|at| diagnosed_at > at);
            if p.owner_user_id == owner_id && p.appointment_date != Some(date) && set_before {
                p.appointment_date = Some(date);
                p.appointment_date_set_at = Some(now);
                p.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }
}
