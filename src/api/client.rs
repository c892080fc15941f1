use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::types::{
  ErrorBody, OverviewStats, Patient, PatientCreate, PatientUpdate, VitalSigns, VitalSignsCreate,
};
use crate::cache::{CacheResult, CacheSource};
use crate::error::ApiError;
use crate::sync::FilterState;
use crate::worker::transport::{FetchRequest, FetchResponse};
use crate::worker::ClientHandle;

/// Typed client for the ward backend. Every call goes through the worker.
#[derive(Clone)]
pub struct WardClient {
  client: ClientHandle,
  base_url: Url,
}

impl WardClient {
  pub fn new(client: ClientHandle, mut base_url: Url) -> Self {
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }
    Self { client, base_url }
  }

  fn url(&self, path: &str, query: &str) -> Result<Url, ApiError> {
    let mut url = self.base_url.join(path.trim_start_matches('/'))?;
    if !query.is_empty() {
      url.set_query(Some(query));
    }
    Ok(url)
  }

  /// GET `/api/patients` with the active filters.
  pub async fn get_patients(
    &self,
    filter: &FilterState,
  ) -> Result<CacheResult<Vec<Patient>>, ApiError> {
    let url = self.url("api/patients", &filter.query_string())?;
    self.get_json(url).await
  }

  /// GET `/api/vital-signs`, newest first, optionally for one patient.
  pub async fn get_vital_signs(
    &self,
    patient_id: Option<&str>,
    limit: u32,
  ) -> Result<CacheResult<Vec<VitalSigns>>, ApiError> {
    // The serializer must not live across the await
    let query = {
      let mut query = url::form_urlencoded::Serializer::new(String::new());
      if let Some(id) = patient_id.filter(|id| !id.is_empty()) {
        query.append_pair("patient_id", id);
      }
      query.append_pair("limit", &limit.to_string());
      query.finish()
    };

    let url = self.url("api/vital-signs", &query)?;
    self.get_json(url).await
  }

  pub async fn get_stats(&self) -> Result<CacheResult<OverviewStats>, ApiError> {
    let url = self.url("api/stats/overview", "")?;
    self.get_json(url).await
  }

  pub async fn create_patient(&self, patient: &PatientCreate) -> Result<Patient, ApiError> {
    let url = self.url("api/patients", "")?;
    self.send_json(Method::POST, url, patient).await
  }

  /// PUT `/api/patients/{id}` where `id` is the record id.
  pub async fn update_patient(&self, id: &str, update: &PatientUpdate) -> Result<Patient, ApiError> {
    let url = self.url(&format!("api/patients/{}", id), "")?;
    self.send_json(Method::PUT, url, update).await
  }

  pub async fn create_vital_signs(
    &self,
    vital_signs: &VitalSignsCreate,
  ) -> Result<VitalSigns, ApiError> {
    let url = self.url("api/vital-signs", "")?;
    self.send_json(Method::POST, url, vital_signs).await
  }

  /// Navigate to a page of the web front end. Reports where the document came from.
  pub async fn open_page(&self, path: &str) -> Result<CacheSource, ApiError> {
    let url = self.url(path, "")?;
    let response = self.client.fetch(FetchRequest::navigate(url)).await?;
    check_status(&response)?;
    Ok(response.source)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<CacheResult<T>, ApiError> {
    let request = FetchRequest::get(url).with_header("accept", "application/json");
    let response = self.client.fetch(request).await?;
    check_status(&response)?;

    let data = serde_json::from_slice(&response.body)?;
    Ok(CacheResult::from_response(data, &response))
  }

  async fn send_json<B: Serialize, T: DeserializeOwned>(
    &self,
    method: Method,
    url: Url,
    body: &B,
  ) -> Result<T, ApiError> {
    let request = FetchRequest::json(method, url, body)?.with_header("accept", "application/json");
    let response = self.client.fetch(request).await?;
    check_status(&response)?;

    Ok(serde_json::from_slice(&response.body)?)
  }
}

/// Map a non-2xx response to [`ApiError::Rejected`] with the server's message.
fn check_status(response: &FetchResponse) -> Result<(), ApiError> {
  if response.is_success() {
    return Ok(());
  }

  let detail = match serde_json::from_slice::<ErrorBody>(&response.body) {
    Ok(body) => body.detail.message(),
    Err(_) => {
      let text = String::from_utf8_lossy(&response.body).trim().to_string();
      if text.is_empty() {
        format!("HTTP {}", response.status)
      } else {
        text
      }
    }
  };
  debug!("Request rejected with {}: {}", response.status, detail);

  Err(ApiError::Rejected {
    status: response.status,
    detail,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::YesNo;
  use crate::testing::{connect_client, FakeWardServer, ScriptedTransport, BASE_URL};
  use chrono::NaiveDate;

  fn patient_create(patient_id: &str, ward: &str) -> PatientCreate {
    PatientCreate {
      patient_id: patient_id.to_string(),
      full_name: "Ana Cruz".to_string(),
      birthdate: NaiveDate::from_ymd_opt(1995, 3, 2).unwrap(),
      address: "12 Rizal St".to_string(),
      ward_number: ward.to_string(),
      bed_number: "B4".to_string(),
      admission_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
      diagnosis: "PIH".to_string(),
      high_risk: YesNo::No,
      discharged: YesNo::No,
      notes: String::new(),
    }
  }

  #[tokio::test]
  async fn test_create_and_list_patients() {
    let server = FakeWardServer::new();
    let (_worker, client) = connect_client(server.clone()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());

    let created = api.create_patient(&patient_create("MAT001", "2")).await.unwrap();
    assert_eq!(created.patient_id, "MAT001");
    assert_eq!(created.age, Some(30));

    let filter = FilterState {
      ward_filter: "2".to_string(),
      ..Default::default()
    };
    let listed = api.get_patients(&filter).await.unwrap();
    assert_eq!(listed.source, CacheSource::Network);
    assert_eq!(listed.data.len(), 1);
  }

  #[tokio::test]
  async fn test_duplicate_patient_is_rejected_with_server_message() {
    let server = FakeWardServer::new();
    let (_worker, client) = connect_client(server).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());

    api.create_patient(&patient_create("MAT001", "1")).await.unwrap();
    let err = api
      .create_patient(&patient_create("MAT001", "1"))
      .await
      .unwrap_err();
    match err {
      ApiError::Rejected { status, detail } => {
        assert_eq!(status, 400);
        assert_eq!(detail, "Patient ID already exists");
      }
      other => panic!("unexpected error {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_vital_signs_query() {
    let transport = ScriptedTransport::new();
    transport.respond("GET /api/vital-signs?patient_id=db-1&limit=50", 200, "[]");
    let (_worker, client) = connect_client(transport.clone()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());

    api.get_vital_signs(Some("db-1"), 50).await.unwrap();
    api.get_vital_signs(None, 50).await.unwrap_err();

    assert_eq!(
      transport.calls(),
      vec![
        "GET /api/vital-signs?patient_id=db-1&limit=50".to_string(),
        "GET /api/vital-signs?limit=50".to_string(),
      ]
    );
  }

  #[tokio::test]
  async fn test_vital_signs_fetch_runs_on_spawned_task() {
    let (_worker, client) = connect_client(FakeWardServer::new()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());

    let listed = tokio::spawn(async move { api.get_vital_signs(Some("db-1"), 5).await })
      .await
      .unwrap()
      .unwrap();
    assert!(listed.data.is_empty());
  }

  #[tokio::test]
  async fn test_offline_list_is_marked() {
    let transport = ScriptedTransport::new();
    transport.respond("GET /api/stats/overview", 200, r#"{"total_patients": 2, "high_risk_patients": 1, "discharged_patients": 0, "recent_vital_signs": 4}"#);
    let (_worker, client) = connect_client(transport.clone()).await;
    let api = WardClient::new(client, Url::parse(BASE_URL).unwrap());

    assert!(!api.get_stats().await.unwrap().is_offline());
    transport.set_offline(true);
    let stats = api.get_stats().await.unwrap();
    assert!(stats.is_offline());
    assert_eq!(stats.data.total_patients, 2);
  }

  #[tokio::test]
  async fn test_base_url_with_path() {
    let transport = ScriptedTransport::new();
    let (_worker, client) = connect_client(transport).await;
    let api = WardClient::new(client, Url::parse("http://ward.local/tracker").unwrap());
    assert_eq!(
      api.url("api/patients", "ward=1").unwrap().as_str(),
      "http://ward.local/tracker/api/patients?ward=1"
    );
  }
}
