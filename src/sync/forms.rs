//! Textual form input and its conversion to typed payloads.
//!
//! Forms hold exactly what the user typed. Conversion trims every field,
//! rejects missing required fields, parses required numerics and turns empty
//! optional numerics into `None` (JSON `null`), never `0`.

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::api::{FluidStatus, Patient, PatientCreate, PatientUpdate, VitalSignsCreate, YesNo};
use crate::error::FormError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATETIME_FORMATS: [&str; 4] = [
  "%Y-%m-%dT%H:%M",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M",
  "%Y-%m-%d %H:%M:%S",
];

/// Patient admission form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientForm {
  pub patient_id: String,
  pub full_name: String,
  pub birthdate: String,
  pub address: String,
  pub ward_number: String,
  pub bed_number: String,
  pub admission_date: String,
  pub diagnosis: String,
  /// "Yes" or "No"
  pub high_risk: String,
  /// "Yes" or "No"
  pub discharged: String,
  pub notes: String,
}

impl PatientForm {
  /// Empty form admitting today.
  pub fn new(today: NaiveDate) -> Self {
    Self {
      admission_date: today.format(DATE_FORMAT).to_string(),
      high_risk: YesNo::No.to_string(),
      discharged: YesNo::No.to_string(),
      ..Default::default()
    }
  }

  /// Form prefilled from an existing record, for editing.
  pub fn from_patient(patient: &Patient) -> Self {
    Self {
      patient_id: patient.patient_id.clone(),
      full_name: patient.full_name.clone(),
      birthdate: patient.birthdate.format(DATE_FORMAT).to_string(),
      address: patient.address.clone(),
      ward_number: patient.ward_number.clone(),
      bed_number: patient.bed_number.clone(),
      admission_date: patient.admission_date.format(DATE_FORMAT).to_string(),
      diagnosis: patient.diagnosis.clone(),
      high_risk: patient.high_risk.to_string(),
      discharged: patient.discharged.to_string(),
      notes: patient.notes.clone().unwrap_or_default(),
    }
  }

  pub fn to_create(&self) -> Result<PatientCreate, FormError> {
    Ok(PatientCreate {
      patient_id: required("Patient ID", &self.patient_id)?,
      full_name: required("Full name", &self.full_name)?,
      birthdate: date("Birthdate", &self.birthdate)?,
      address: required("Address", &self.address)?,
      ward_number: required("Ward", &self.ward_number)?,
      bed_number: required("Bed", &self.bed_number)?,
      admission_date: date("Admission date", &self.admission_date)?,
      diagnosis: required("Diagnosis", &self.diagnosis)?,
      high_risk: yes_no("High risk", &self.high_risk)?,
      discharged: yes_no("Discharged", &self.discharged)?,
      notes: self.notes.trim().to_string(),
    })
  }

  /// Update payload carrying every editable field.
  pub fn to_update(&self) -> Result<PatientUpdate, FormError> {
    Ok(PatientUpdate {
      full_name: Some(required("Full name", &self.full_name)?),
      address: Some(required("Address", &self.address)?),
      ward_number: Some(required("Ward", &self.ward_number)?),
      bed_number: Some(required("Bed", &self.bed_number)?),
      admission_date: Some(date("Admission date", &self.admission_date)?),
      diagnosis: Some(required("Diagnosis", &self.diagnosis)?),
      high_risk: Some(yes_no("High risk", &self.high_risk)?),
      discharged: Some(yes_no("Discharged", &self.discharged)?),
      notes: Some(self.notes.trim().to_string()),
    })
  }
}

/// Vital signs entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VitalSignsForm {
  /// Record id of the observed patient
  pub patient_id: String,
  pub monitoring_datetime: String,
  pub blood_pressure: String,
  pub heart_rate: String,
  pub temperature: String,
  pub respiratory_rate: String,
  pub spo2: String,
  pub pain_score: String,
  pub iv_fluids_type: String,
  pub iv_fluids_volume: String,
  pub iv_fluids_status: String,
  pub iv_medications: String,
  pub oral_intake: String,
  pub urine_output: String,
  pub other_output: String,
  pub additional_notes: String,
}

impl VitalSignsForm {
  /// Empty form monitored at `now`.
  pub fn new(now: NaiveDateTime) -> Self {
    Self {
      monitoring_datetime: now.format(DATETIME_FORMAT).to_string(),
      iv_fluids_status: FluidStatus::default().as_str().to_string(),
      ..Default::default()
    }
  }

  pub fn now() -> Self {
    Self::new(Local::now().naive_local())
  }

  pub fn to_create(&self) -> Result<VitalSignsCreate, FormError> {
    let status = self.iv_fluids_status.trim();
    let iv_fluids_status = if status.is_empty() {
      FluidStatus::default()
    } else {
      FluidStatus::parse(status).ok_or_else(|| FormError::InvalidChoice {
        field: "IV status",
        value: status.to_string(),
      })?
    };

    Ok(VitalSignsCreate {
      patient_id: required("Patient", &self.patient_id)?,
      monitoring_datetime: datetime("Monitoring time", &self.monitoring_datetime)?,
      blood_pressure: required("Blood pressure", &self.blood_pressure)?,
      heart_rate: number("Heart rate", &self.heart_rate)?,
      temperature: number("Temperature", &self.temperature)?,
      respiratory_rate: number("Respiratory rate", &self.respiratory_rate)?,
      spo2: number("SpO2", &self.spo2)?,
      pain_score: number("Pain score", &self.pain_score)?,
      iv_fluids_type: self.iv_fluids_type.trim().to_string(),
      iv_fluids_volume: optional_number("IV volume", &self.iv_fluids_volume)?,
      iv_fluids_status,
      iv_medications: self.iv_medications.trim().to_string(),
      oral_intake: self.oral_intake.trim().to_string(),
      urine_output: optional_number("Urine output", &self.urine_output)?,
      other_output: self.other_output.trim().to_string(),
      additional_notes: self.additional_notes.trim().to_string(),
    })
  }
}

fn required(field: &'static str, value: &str) -> Result<String, FormError> {
  let value = value.trim();
  if value.is_empty() {
    Err(FormError::Missing(field))
  } else {
    Ok(value.to_string())
  }
}

fn number<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, FormError> {
  let value = required(field, value)?;
  value
    .parse()
    .map_err(|_| FormError::InvalidNumber { field, value })
}

fn optional_number<T: std::str::FromStr>(
  field: &'static str,
  value: &str,
) -> Result<Option<T>, FormError> {
  if value.trim().is_empty() {
    Ok(None)
  } else {
    number(field, value).map(Some)
  }
}

fn date(field: &'static str, value: &str) -> Result<NaiveDate, FormError> {
  let value = required(field, value)?;
  NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|_| FormError::InvalidDate { field, value })
}

fn datetime(field: &'static str, value: &str) -> Result<NaiveDateTime, FormError> {
  let value = required(field, value)?;
  DATETIME_FORMATS
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(&value, format).ok())
    .ok_or(FormError::InvalidDateTime { field, value })
}

fn yes_no(field: &'static str, value: &str) -> Result<YesNo, FormError> {
  match value.trim() {
    v if v.eq_ignore_ascii_case("yes") => Ok(YesNo::Yes),
    v if v.eq_ignore_ascii_case("no") || v.is_empty() => Ok(YesNo::No),
    v => Err(FormError::InvalidChoice {
      field,
      value: v.to_string(),
    }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn vitals_form() -> VitalSignsForm {
    VitalSignsForm {
      patient_id: "db-1".to_string(),
      blood_pressure: "120/80".to_string(),
      heart_rate: "72".to_string(),
      temperature: "36.8".to_string(),
      respiratory_rate: "18".to_string(),
      spo2: "98".to_string(),
      pain_score: "3".to_string(),
      ..VitalSignsForm::new(
        NaiveDate::from_ymd_opt(2024, 5, 1)
          .unwrap()
          .and_hms_opt(10, 30, 0)
          .unwrap(),
      )
    }
  }

  fn patient_form() -> PatientForm {
    PatientForm {
      patient_id: " MAT001 ".to_string(),
      full_name: "Ana Cruz".to_string(),
      birthdate: "1995-03-02".to_string(),
      address: "12 Rizal St".to_string(),
      ward_number: "2".to_string(),
      bed_number: "B4".to_string(),
      diagnosis: "PIH".to_string(),
      ..PatientForm::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    }
  }

  #[test]
  fn test_vital_signs_numeric_conversion() {
    let payload = vitals_form().to_create().unwrap();
    let value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["heart_rate"], json!(72));
    assert_eq!(value["temperature"], json!(36.8));
    assert_eq!(value["urine_output"], serde_json::Value::Null);
    assert_eq!(value["iv_fluids_volume"], serde_json::Value::Null);
    assert_eq!(value["iv_fluids_status"], json!("running"));
    assert_eq!(value["monitoring_datetime"], json!("2024-05-01T10:30:00"));
  }

  #[test]
  fn test_optional_numeric_is_parsed_when_present() {
    let form = VitalSignsForm {
      urine_output: "250".to_string(),
      ..vitals_form()
    };
    assert_eq!(form.to_create().unwrap().urine_output, Some(250));
  }

  #[test]
  fn test_invalid_numbers_are_reported() {
    let form = VitalSignsForm {
      heart_rate: "seventy".to_string(),
      ..vitals_form()
    };
    assert_eq!(
      form.to_create().unwrap_err(),
      FormError::InvalidNumber {
        field: "Heart rate",
        value: "seventy".to_string()
      }
    );

    let form = VitalSignsForm {
      urine_output: "lots".to_string(),
      ..vitals_form()
    };
    assert!(matches!(
      form.to_create().unwrap_err(),
      FormError::InvalidNumber {
        field: "Urine output",
        ..
      }
    ));
  }

  #[test]
  fn test_missing_required_vital() {
    let form = VitalSignsForm {
      spo2: "  ".to_string(),
      ..vitals_form()
    };
    assert_eq!(form.to_create().unwrap_err(), FormError::Missing("SpO2"));
  }

  #[test]
  fn test_monitoring_time_formats() {
    let form = VitalSignsForm {
      monitoring_datetime: "2024-05-01 08:15".to_string(),
      ..vitals_form()
    };
    assert_eq!(
      form.to_create().unwrap().monitoring_datetime,
      NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(8, 15, 0)
        .unwrap()
    );

    let form = VitalSignsForm {
      monitoring_datetime: "yesterday".to_string(),
      ..vitals_form()
    };
    assert!(matches!(
      form.to_create().unwrap_err(),
      FormError::InvalidDateTime { .. }
    ));
  }

  #[test]
  fn test_unknown_iv_status() {
    let form = VitalSignsForm {
      iv_fluids_status: "paused".to_string(),
      ..vitals_form()
    };
    assert!(matches!(
      form.to_create().unwrap_err(),
      FormError::InvalidChoice { .. }
    ));
  }

  #[test]
  fn test_patient_create_conversion() {
    let payload = patient_form().to_create().unwrap();
    assert_eq!(payload.patient_id, "MAT001");
    assert_eq!(payload.high_risk, YesNo::No);

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["admission_date"], json!("2024-05-01"));
    assert_eq!(value["birthdate"], json!("1995-03-02"));
  }

  #[test]
  fn test_patient_form_errors() {
    let form = PatientForm {
      full_name: String::new(),
      ..patient_form()
    };
    assert_eq!(form.to_create().unwrap_err(), FormError::Missing("Full name"));

    let form = PatientForm {
      birthdate: "02/03/1995".to_string(),
      ..patient_form()
    };
    assert!(matches!(
      form.to_create().unwrap_err(),
      FormError::InvalidDate {
        field: "Birthdate",
        ..
      }
    ));
  }

  #[test]
  fn test_patient_update_round_trips_record() {
    let patient: Patient = serde_json::from_value(json!({
      "id": "db-1", "patient_id": "MAT001", "full_name": "Ana Cruz", "age": 29,
      "birthdate": "1995-03-02", "address": "12 Rizal St", "ward_number": "2",
      "bed_number": "B4", "admission_date": "2024-05-01", "diagnosis": "PIH",
      "high_risk": "Yes", "discharged": "No", "notes": null
    }))
    .unwrap();

    let mut form = PatientForm::from_patient(&patient);
    form.discharged = "Yes".to_string();
    let update = form.to_update().unwrap();

    assert_eq!(update.high_risk, Some(YesNo::Yes));
    assert_eq!(update.discharged, Some(YesNo::Yes));
    assert_eq!(update.notes.as_deref(), Some(""));
    assert_eq!(update.ward_number.as_deref(), Some("2"));
  }
}
