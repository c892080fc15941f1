//! Transport fakes shared by the unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use url::Url;

use crate::cache::{ActiveGeneration, CacheStorage, FetchPolicy, SqliteStorage};
use crate::error::FetchError;
use crate::worker::lifecycle::{LifecycleConfig, LifecycleController};
use crate::worker::transport::{FetchRequest, FetchResponse, Transport};
use crate::worker::{ClientHandle, ServiceWorker, WorkerHandle, WorkerState};

pub const BASE_URL: &str = "http://ward.local/";

/// "METHOD /path?query" label used to match scripted routes.
pub fn route_label(request: &FetchRequest) -> String {
  match request.url.query() {
    Some(q) => format!("{} {}?{}", request.method, request.url.path(), q),
    None => format!("{} {}", request.method, request.url.path()),
  }
}

#[derive(Clone)]
struct Route {
  status: u16,
  body: Vec<u8>,
  delay: Duration,
}

/// Transport answering from a fixed table of routes. Unknown routes get 404.
#[derive(Default)]
pub struct ScriptedTransport {
  routes: Mutex<HashMap<String, Route>>,
  offline: AtomicBool,
  calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn respond(&self, label: &str, status: u16, body: &str) {
    self.respond_after(label, status, body, Duration::ZERO);
  }

  pub fn respond_after(&self, label: &str, status: u16, body: &str, delay: Duration) {
    self.routes.lock().unwrap().insert(
      label.to_string(),
      Route {
        status,
        body: body.as_bytes().to_vec(),
        delay,
      },
    );
  }

  /// While offline every request fails at the transport level.
  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let label = route_label(request);
    self.calls.lock().unwrap().push(label.clone());

    if self.offline.load(Ordering::SeqCst) {
      return Err(FetchError::network(request.url.as_str(), "offline"));
    }

    let route = self.routes.lock().unwrap().get(&label).cloned();
    match route {
      Some(route) => {
        if !route.delay.is_zero() {
          tokio::time::sleep(route.delay).await;
        }
        Ok(FetchResponse::from_network(
          route.status,
          vec![("content-type".to_string(), "application/json".to_string())],
          route.body,
        ))
      }
      None => Ok(FetchResponse::from_network(
        404,
        Vec::new(),
        br#"{"detail":"Not Found"}"#.to_vec(),
      )),
    }
  }
}

/// In-memory imitation of the ward backend's REST API.
#[derive(Default)]
pub struct FakeWardServer {
  state: Mutex<ServerState>,
}

#[derive(Default)]
struct ServerState {
  patients: Vec<Value>,
  vital_signs: Vec<Value>,
  next_id: u64,
  bodies: Vec<Value>,
}

impl FakeWardServer {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// JSON bodies received by POST/PUT, in order.
  pub fn received_bodies(&self) -> Vec<Value> {
    self.state.lock().unwrap().bodies.clone()
  }

  pub fn patient_db_id(&self, patient_id: &str) -> Option<String> {
    self
      .state
      .lock()
      .unwrap()
      .patients
      .iter()
      .find(|p| p["patient_id"] == patient_id)
      .and_then(|p| p["id"].as_str().map(String::from))
  }

  fn handle(&self, request: &FetchRequest) -> (u16, Value) {
    let mut state = self.state.lock().unwrap();
    let path = request.url.path().to_string();
    let params: HashMap<String, String> = request.url.query_pairs().into_owned().collect();
    let body: Option<Value> = request
      .body
      .as_ref()
      .and_then(|b| serde_json::from_slice(b).ok());
    if let Some(b) = &body {
      state.bodies.push(b.clone());
    }

    match (request.method.as_str(), path.as_str()) {
      ("GET", "/api/patients") => {
        let list: Vec<Value> = state
          .patients
          .iter()
          .filter(|p| matches_patient(p, &params))
          .cloned()
          .collect();
        (200, Value::Array(list))
      }
      ("POST", "/api/patients") => {
        let mut patient = body.unwrap_or(Value::Null);
        if state
          .patients
          .iter()
          .any(|p| p["patient_id"] == patient["patient_id"])
        {
          return (400, json!({"detail": "Patient ID already exists"}));
        }
        state.next_id += 1;
        patient["id"] = json!(format!("db-{}", state.next_id));
        patient["age"] = json!(30);
        if patient.get("discharged").is_none() {
          patient["discharged"] = json!("No");
        }
        state.patients.push(patient.clone());
        (200, patient)
      }
      ("PUT", p) if p.starts_with("/api/patients/") => {
        let id = p.trim_start_matches("/api/patients/");
        let update = body.unwrap_or(Value::Null);
        match state.patients.iter_mut().find(|p| p["id"] == id) {
          Some(patient) => {
            if let (Some(target), Some(fields)) = (patient.as_object_mut(), update.as_object()) {
              for (k, v) in fields {
                if !v.is_null() {
                  target.insert(k.clone(), v.clone());
                }
              }
            }
            (200, patient.clone())
          }
          None => (404, json!({"detail": "Patient not found"})),
        }
      }
      ("GET", "/api/vital-signs") => {
        let limit: usize = params
          .get("limit")
          .and_then(|l| l.parse().ok())
          .unwrap_or(100);
        let list: Vec<Value> = state
          .vital_signs
          .iter()
          .rev()
          .filter(|v| {
            params
              .get("patient_id")
              .map_or(true, |id| v["patient_id"] == id.as_str())
          })
          .take(limit)
          .cloned()
          .collect();
        (200, Value::Array(list))
      }
      ("POST", "/api/vital-signs") => {
        let mut record = body.unwrap_or(Value::Null);
        let patient = state
          .patients
          .iter()
          .find(|p| p["id"] == record["patient_id"])
          .cloned();
        match patient {
          Some(patient) => {
            state.next_id += 1;
            record["id"] = json!(format!("vs-{}", state.next_id));
            record["patient_name"] = patient["full_name"].clone();
            record["ward_number"] = patient["ward_number"].clone();
            record["bed_number"] = patient["bed_number"].clone();
            state.vital_signs.push(record.clone());
            (200, record)
          }
          None => (404, json!({"detail": "Patient not found"})),
        }
      }
      ("GET", "/api/stats/overview") => {
        let active: Vec<&Value> = state
          .patients
          .iter()
          .filter(|p| p["discharged"] == "No")
          .collect();
        let high_risk = active.iter().filter(|p| p["high_risk"] == "Yes").count();
        let mut wards: Vec<String> = active
          .iter()
          .filter_map(|p| p["ward_number"].as_str().map(String::from))
          .collect();
        wards.sort();
        let mut ward_statistics: Vec<Value> = Vec::new();
        for ward in &wards {
          match ward_statistics.iter_mut().find(|w| w["_id"] == ward.as_str()) {
            Some(w) => w["count"] = json!(w["count"].as_u64().unwrap_or(0) + 1),
            None => ward_statistics.push(json!({"_id": ward, "count": 1})),
          }
        }
        (
          200,
          json!({
            "total_patients": active.len(),
            "high_risk_patients": high_risk,
            "discharged_patients": state.patients.len() - active.len(),
            "ward_statistics": ward_statistics,
            "recent_vital_signs": state.vital_signs.len(),
          }),
        )
      }
      _ => (404, json!({"detail": "Not Found"})),
    }
  }
}

fn matches_patient(patient: &Value, params: &HashMap<String, String>) -> bool {
  if let Some(search) = params.get("search") {
    let needle = search.to_lowercase();
    let hit = ["full_name", "patient_id", "ward_number"].iter().any(|field| {
      patient[*field]
        .as_str()
        .is_some_and(|v| v.to_lowercase().contains(&needle))
    });
    if !hit {
      return false;
    }
  }
  if let Some(high_risk) = params.get("high_risk") {
    let expected = if high_risk == "true" { "Yes" } else { "No" };
    if patient["high_risk"] != expected {
      return false;
    }
  }
  if let Some(discharged) = params.get("discharged") {
    let expected = if discharged == "true" { "Yes" } else { "No" };
    if patient["discharged"] != expected {
      return false;
    }
  }
  if let Some(ward) = params.get("ward") {
    if patient["ward_number"] != ward.as_str() {
      return false;
    }
  }
  true
}

#[async_trait]
impl Transport for FakeWardServer {
  async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let (status, body) = self.handle(request);
    Ok(FetchResponse::from_network(
      status,
      vec![("content-type".to_string(), "application/json".to_string())],
      serde_json::to_vec(&body).unwrap_or_default(),
    ))
  }
}

/// Connect a client to a worker that activates an empty generation right away.
pub async fn connect_client(transport: Arc<dyn Transport>) -> (WorkerHandle, ClientHandle) {
  let storage: Arc<dyn CacheStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());
  let active = ActiveGeneration::default();
  let lifecycle = LifecycleController::new(
    LifecycleConfig {
      generation: "ward-tracker-test".to_string(),
      manifest: Vec::new(),
      fast_activate: true,
    },
    storage.clone(),
    transport.clone(),
    active.clone(),
  );
  let base = Url::parse(BASE_URL).unwrap();
  let policy = FetchPolicy::new(storage, transport.clone(), active, "/api/", base);
  let (worker, _host) = ServiceWorker::spawn(lifecycle, policy, transport);

  for _ in 0..200 {
    if worker.status().await.unwrap().state == WorkerState::Activated {
      break;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  let client = worker.connect().unwrap();
  (worker, client)
}

/// View synchronizer talking to `transport` through a connected worker.
pub async fn ward_sync(transport: Arc<dyn Transport>) -> (crate::sync::WardSync, WorkerHandle) {
  let (worker, client) = connect_client(transport).await;
  let api = crate::api::WardClient::new(client, Url::parse(BASE_URL).unwrap());
  (crate::sync::WardSync::new(api, 50), worker)
}
