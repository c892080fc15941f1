use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Yes/No flag as the backend spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum YesNo {
  Yes,
  #[default]
  No,
}

impl YesNo {
  pub fn is_yes(&self) -> bool {
    *self == YesNo::Yes
  }
}

impl From<bool> for YesNo {
  fn from(value: bool) -> Self {
    if value {
      YesNo::Yes
    } else {
      YesNo::No
    }
  }
}

impl fmt::Display for YesNo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      YesNo::Yes => write!(f, "Yes"),
      YesNo::No => write!(f, "No"),
    }
  }
}

/// IV fluid administration status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FluidStatus {
  #[default]
  Running,
  Completed,
  Stopped,
}

impl FluidStatus {
  pub const ALL: [FluidStatus; 3] = [
    FluidStatus::Running,
    FluidStatus::Completed,
    FluidStatus::Stopped,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      FluidStatus::Running => "running",
      FluidStatus::Completed => "completed",
      FluidStatus::Stopped => "stopped",
    }
  }

  pub fn parse(value: &str) -> Option<Self> {
    Self::ALL
      .into_iter()
      .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
  }
}

/// Admission record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Patient {
  /// Server-assigned record id (used in update URLs)
  pub id: String,
  /// Hospital patient id, unique
  pub patient_id: String,
  pub full_name: String,
  /// Computed by the server from the birthdate
  pub age: Option<u32>,
  pub birthdate: NaiveDate,
  pub address: String,
  pub ward_number: String,
  pub bed_number: String,
  pub admission_date: NaiveDate,
  pub diagnosis: String,
  #[serde(default)]
  pub high_risk: YesNo,
  #[serde(default)]
  pub discharged: YesNo,
  #[serde(default)]
  pub notes: Option<String>,
}

impl Patient {
  pub fn is_high_risk(&self) -> bool {
    self.high_risk.is_yes()
  }

  pub fn is_discharged(&self) -> bool {
    self.discharged.is_yes()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientCreate {
  pub patient_id: String,
  pub full_name: String,
  pub birthdate: NaiveDate,
  pub address: String,
  pub ward_number: String,
  pub bed_number: String,
  pub admission_date: NaiveDate,
  pub diagnosis: String,
  pub high_risk: YesNo,
  pub discharged: YesNo,
  pub notes: String,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub full_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub address: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ward_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub bed_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub admission_date: Option<NaiveDate>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub diagnosis: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub high_risk: Option<YesNo>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub discharged: Option<YesNo>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

/// Nursing observation record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VitalSigns {
  pub id: String,
  /// Record id of the patient
  pub patient_id: String,
  pub patient_name: String,
  pub ward_number: String,
  pub bed_number: String,
  /// Kept verbatim; the server does not promise a timezone suffix
  pub monitoring_datetime: String,
  pub blood_pressure: String,
  pub heart_rate: i32,
  pub temperature: f64,
  pub respiratory_rate: i32,
  pub spo2: i32,
  pub pain_score: i32,
  #[serde(default)]
  pub iv_fluids_type: Option<String>,
  #[serde(default)]
  pub iv_fluids_volume: Option<i32>,
  #[serde(default)]
  pub iv_fluids_status: Option<FluidStatus>,
  #[serde(default)]
  pub iv_medications: Option<String>,
  #[serde(default)]
  pub oral_intake: Option<String>,
  #[serde(default)]
  pub urine_output: Option<i32>,
  #[serde(default)]
  pub other_output: Option<String>,
  #[serde(default)]
  pub additional_notes: Option<String>,
}

impl VitalSigns {
  /// One-line BP/HR/T/RR/SpO2 summary.
  pub fn summary(&self) -> String {
    format!(
      "BP {}  HR {}  T {:.1}°C  RR {}  SpO2 {}%",
      self.blood_pressure, self.heart_rate, self.temperature, self.respiratory_rate, self.spo2
    )
  }

  /// Monitoring time without seconds, for display.
  pub fn monitored_at(&self) -> String {
    let s = self.monitoring_datetime.replace('T', " ");
    s.chars().take(16).collect()
  }
}

/// Payload of a new observation. Optional numerics serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VitalSignsCreate {
  pub patient_id: String,
  pub monitoring_datetime: NaiveDateTime,
  pub blood_pressure: String,
  pub heart_rate: i32,
  pub temperature: f64,
  pub respiratory_rate: i32,
  pub spo2: i32,
  pub pain_score: i32,
  pub iv_fluids_type: String,
  pub iv_fluids_volume: Option<i32>,
  pub iv_fluids_status: FluidStatus,
  pub iv_medications: String,
  pub oral_intake: String,
  pub urine_output: Option<i32>,
  pub other_output: String,
  pub additional_notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WardStat {
  #[serde(rename = "_id")]
  pub ward: String,
  pub count: u64,
}

/// Dashboard counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OverviewStats {
  pub total_patients: u64,
  pub high_risk_patients: u64,
  pub discharged_patients: u64,
  #[serde(default)]
  pub ward_statistics: Vec<WardStat>,
  pub recent_vital_signs: u64,
}

/// FastAPI error body: a plain message or a list of validation errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
  pub detail: ErrorDetail,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorDetail {
  Message(String),
  Validation(Vec<ValidationError>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ValidationError {
  #[serde(default)]
  pub loc: Vec<serde_json::Value>,
  pub msg: String,
}

impl ErrorDetail {
  pub fn message(&self) -> String {
    match self {
      ErrorDetail::Message(m) => m.clone(),
      ErrorDetail::Validation(errors) => errors
        .iter()
        .map(|e| {
          let field = e.loc.last().map(|l| match l {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
          });
          match field {
            Some(field) => format!("{}: {}", field, e.msg),
            None => e.msg.clone(),
          }
        })
        .collect::<Vec<_>>()
        .join("; "),
    }
  }
}
