//! View synchronizer: filter state, the three server-backed collections and
//! form submissions.
//!
//! Every refresh runs as a spawned task; results are applied on `poll()`
//! from the UI tick. Each collection is a [`Query`], so only the response of
//! the most recently issued request is ever shown.

mod filter;
mod forms;

pub use filter::{FilterPatch, FilterState};
pub use forms::{PatientForm, VitalSignsForm};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::api::{OverviewStats, Patient, VitalSigns, WardClient};
use crate::cache::CacheResult;
use crate::error::{ApiError, FormError};
use crate::query::{Query, QueryUpdate};

/// Things the views may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
  PatientsLoaded,
  VitalSignsLoaded,
  StatsLoaded,
  LoadFailed {
    collection: &'static str,
    error: String,
  },
  PatientCreated(Patient),
  PatientUpdated(Patient),
  VitalSignsRecorded(VitalSigns),
  /// Server or network rejected a submission; the form is left as it was
  SubmitFailed(String),
}

enum Submitted {
  PatientCreated(Patient),
  PatientUpdated(Patient),
  VitalSigns(VitalSigns),
}

type SubmitResult = Result<Submitted, String>;

/// Client-side state mirrored from the server.
pub struct WardSync {
  api: WardClient,
  filter: FilterState,
  /// Patient record id the vital signs list is scoped to
  vital_signs_scope: Option<String>,
  vital_signs_limit: u32,
  patients: Query<CacheResult<Vec<Patient>>>,
  vital_signs: Query<CacheResult<Vec<VitalSigns>>>,
  stats: Query<CacheResult<OverviewStats>>,
  submit_tx: mpsc::UnboundedSender<SubmitResult>,
  submit_rx: mpsc::UnboundedReceiver<SubmitResult>,
  pending_submits: usize,
}

impl WardSync {
  pub fn new(api: WardClient, vital_signs_limit: u32) -> Self {
    let (submit_tx, submit_rx) = mpsc::unbounded_channel();
    Self {
      api,
      filter: FilterState::default(),
      vital_signs_scope: None,
      vital_signs_limit,
      patients: Query::new("patients"),
      vital_signs: Query::new("vital signs"),
      stats: Query::new("stats"),
      submit_tx,
      submit_rx,
      pending_submits: 0,
    }
  }

  pub fn api(&self) -> &WardClient {
    &self.api
  }

  pub fn filter(&self) -> &FilterState {
    &self.filter
  }

  pub fn patients(&self) -> &[Patient] {
    self.patients.data().map(|r| r.data.as_slice()).unwrap_or(&[])
  }

  pub fn patients_query(&self) -> &Query<CacheResult<Vec<Patient>>> {
    &self.patients
  }

  pub fn vital_signs(&self) -> &[VitalSigns] {
    self
      .vital_signs
      .data()
      .map(|r| r.data.as_slice())
      .unwrap_or(&[])
  }

  pub fn vital_signs_query(&self) -> &Query<CacheResult<Vec<VitalSigns>>> {
    &self.vital_signs
  }

  pub fn vital_signs_scope(&self) -> Option<&str> {
    self.vital_signs_scope.as_deref()
  }

  pub fn stats(&self) -> Option<&OverviewStats> {
    self.stats.data().map(|r| &r.data)
  }

  pub fn stats_query(&self) -> &Query<CacheResult<OverviewStats>> {
    &self.stats
  }

  /// Whether any shown collection was served from the offline cache.
  pub fn is_offline(&self) -> bool {
    self.patients.data().is_some_and(|r| r.is_offline())
      || self.vital_signs.data().is_some_and(|r| r.is_offline())
      || self.stats.data().is_some_and(|r| r.is_offline())
  }

  pub fn is_submitting(&self) -> bool {
    self.pending_submits > 0
  }

  /// Merge `patch` into the filters and refetch the patient list.
  pub fn set_filter(&mut self, patch: FilterPatch) {
    self.filter.apply(patch);
    self.refresh_patients();
  }

  pub fn refresh_patients(&mut self) {
    let api = self.api.clone();
    let filter = self.filter.clone();
    self.patients.start(async move {
      api.get_patients(&filter).await.map_err(|e| e.to_string())
    });
  }

  /// Refetch vital signs, scoped to one patient record or global.
  pub fn refresh_vital_signs(&mut self, patient_id: Option<String>) {
    self.vital_signs_scope = patient_id.filter(|id| !id.is_empty());
    self.reload_vital_signs();
  }

  fn reload_vital_signs(&mut self) {
    let api = self.api.clone();
    let scope = self.vital_signs_scope.clone();
    let limit = self.vital_signs_limit;
    self.vital_signs.start(async move {
      api
        .get_vital_signs(scope.as_deref(), limit)
        .await
        .map_err(|e| e.to_string())
    });
  }

  pub fn refresh_stats(&mut self) {
    let api = self.api.clone();
    self
      .stats
      .start(async move { api.get_stats().await.map_err(|e| e.to_string()) });
  }

  /// Validate and POST a new patient. Conversion errors return before any request.
  pub fn submit_patient(&mut self, form: &PatientForm) -> Result<(), FormError> {
    let payload = form.to_create()?;
    let api = self.api.clone();
    self.submit(async move {
      api
        .create_patient(&payload)
        .await
        .map(Submitted::PatientCreated)
    });
    Ok(())
  }

  /// Validate and PUT changes to the patient with record id `id`.
  pub fn update_patient(&mut self, id: &str, form: &PatientForm) -> Result<(), FormError> {
    let payload = form.to_update()?;
    let api = self.api.clone();
    let id = id.to_string();
    self.submit(async move {
      api
        .update_patient(&id, &payload)
        .await
        .map(Submitted::PatientUpdated)
    });
    Ok(())
  }

  pub fn submit_vital_signs(&mut self, form: &VitalSignsForm) -> Result<(), FormError> {
    let payload = form.to_create()?;
    let api = self.api.clone();
    self.submit(async move {
      api
        .create_vital_signs(&payload)
        .await
        .map(Submitted::VitalSigns)
    });
    Ok(())
  }

  fn submit<F>(&mut self, future: F)
  where
    F: std::future::Future<Output = Result<Submitted, ApiError>> + Send + 'static,
  {
    self.pending_submits += 1;
    let tx = self.submit_tx.clone();
    tokio::spawn(async move {
      let result = future.await.map_err(|e| match e {
        ApiError::Rejected { detail, .. } => detail,
        other => other.to_string(),
      });
      let _ = tx.send(result);
    });
  }

  /// Apply everything that completed since the last call.
  pub fn poll(&mut self) -> Vec<SyncEvent> {
    let mut events = Vec::new();

    while let Ok(result) = self.submit_rx.try_recv() {
      self.pending_submits = self.pending_submits.saturating_sub(1);
      events.push(self.on_submitted(result));
    }
    self.poll_queries(&mut events);
    events
  }

  fn poll_queries(&mut self, events: &mut Vec<SyncEvent>) {
    if let Some(update) = self.patients.poll() {
      events.push(load_event("patients", update, SyncEvent::PatientsLoaded));
    }
    if let Some(update) = self.vital_signs.poll() {
      events.push(load_event("vital signs", update, SyncEvent::VitalSignsLoaded));
    }
    if let Some(update) = self.stats.poll() {
      events.push(load_event("stats", update, SyncEvent::StatsLoaded));
    }
  }

  fn on_submitted(&mut self, result: SubmitResult) -> SyncEvent {
    match result {
      Ok(Submitted::PatientCreated(patient)) => {
        info!("Created patient {}", patient.patient_id);
        self.refresh_patients();
        self.refresh_stats();
        SyncEvent::PatientCreated(patient)
      }
      Ok(Submitted::PatientUpdated(patient)) => {
        info!("Updated patient {}", patient.patient_id);
        self.refresh_patients();
        self.refresh_stats();
        SyncEvent::PatientUpdated(patient)
      }
      Ok(Submitted::VitalSigns(vital_signs)) => {
        info!("Recorded vital signs for {}", vital_signs.patient_name);
        self.reload_vital_signs();
        self.refresh_stats();
        SyncEvent::VitalSignsRecorded(vital_signs)
      }
      Err(error) => {
        warn!("Submission failed: {}", error);
        SyncEvent::SubmitFailed(error)
      }
    }
  }

  /// Wait until every submission and refresh has completed.
  #[cfg(test)]
  pub async fn settle(&mut self) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    loop {
      if self.pending_submits > 0 {
        if let Some(result) = self.submit_rx.recv().await {
          self.pending_submits -= 1;
          events.push(self.on_submitted(result));
        }
        continue;
      }
      if self.patients.is_loading() {
        if let Some(update) = self.patients.settle().await {
          events.push(load_event("patients", update, SyncEvent::PatientsLoaded));
        }
        continue;
      }
      if self.vital_signs.is_loading() {
        if let Some(update) = self.vital_signs.settle().await {
          events.push(load_event("vital signs", update, SyncEvent::VitalSignsLoaded));
        }
        continue;
      }
      if self.stats.is_loading() {
        if let Some(update) = self.stats.settle().await {
          events.push(load_event("stats", update, SyncEvent::StatsLoaded));
        }
        continue;
      }
      return events;
    }
  }
}

fn load_event(collection: &'static str, update: QueryUpdate, loaded: SyncEvent) -> SyncEvent {
  match update {
    QueryUpdate::Updated => loaded,
    QueryUpdate::Failed(error) => {
      warn!("Loading {} failed: {}", collection, error);
      SyncEvent::LoadFailed { collection, error }
    }
  }
}
