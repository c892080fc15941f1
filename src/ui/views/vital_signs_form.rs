use crate::api::FluidStatus;
use crate::sync::{SyncEvent, VitalSignsForm, WardSync};
use crate::ui::components::{form_block, Form, FormEvent, FormField, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

const HINT: &str = "Time as YYYY-MM-DDTHH:MM; empty volume/output is sent as no value.  Ctrl-S save  Esc cancel";

/// Entry form for one set of observations
pub struct VitalSignsFormView {
  form: Form,
  message: Option<(String, Color)>,
}

impl VitalSignsFormView {
  /// Form prefilled from `values`; patients to choose from come from the loaded list
  pub fn new(values: VitalSignsForm, sync: &WardSync) -> Self {
    let mut patients: Vec<(String, String)> = sync
      .patients()
      .iter()
      .map(|p| {
        (
          p.id.clone(),
          format!("{} {} (W{} B{})", p.patient_id, p.full_name, p.ward_number, p.bed_number),
        )
      })
      .collect();
    if !values.patient_id.is_empty() && !patients.iter().any(|(id, _)| *id == values.patient_id) {
      patients.push((values.patient_id.clone(), values.patient_id.clone()));
    }

    let statuses = FluidStatus::ALL
      .iter()
      .map(|s| (s.as_str().to_string(), capitalize(s.as_str())))
      .collect();

    let text = |key, label, value: &String| FormField::text(key, label, value.clone());
    let form = Form::new(vec![
      FormField::choice("patient_id", "Patient", patients, &values.patient_id).required(),
      text("monitoring_datetime", "Monitoring time", &values.monitoring_datetime).required(),
      text("blood_pressure", "Blood pressure", &values.blood_pressure).required(),
      text("heart_rate", "Heart rate", &values.heart_rate).required(),
      text("temperature", "Temperature", &values.temperature).required(),
      text("respiratory_rate", "Respiratory rate", &values.respiratory_rate).required(),
      text("spo2", "SpO2", &values.spo2).required(),
      text("pain_score", "Pain score", &values.pain_score).required(),
      text("iv_fluids_type", "IV fluids", &values.iv_fluids_type),
      text("iv_fluids_volume", "IV volume", &values.iv_fluids_volume),
      FormField::choice(
        "iv_fluids_status",
        "IV status",
        statuses,
        &values.iv_fluids_status,
      ),
      text("iv_medications", "IV medications", &values.iv_medications),
      text("oral_intake", "Oral intake", &values.oral_intake),
      text("urine_output", "Urine output", &values.urine_output),
      text("other_output", "Other output", &values.other_output),
      text("additional_notes", "Notes", &values.additional_notes),
    ]);

    Self {
      form,
      message: None,
    }
  }

  fn read(&self) -> VitalSignsForm {
    let value = |key| self.form.value(key).unwrap_or_default().to_string();
    VitalSignsForm {
      patient_id: value("patient_id"),
      monitoring_datetime: value("monitoring_datetime"),
      blood_pressure: value("blood_pressure"),
      heart_rate: value("heart_rate"),
      temperature: value("temperature"),
      respiratory_rate: value("respiratory_rate"),
      spo2: value("spo2"),
      pain_score: value("pain_score"),
      iv_fluids_type: value("iv_fluids_type"),
      iv_fluids_volume: value("iv_fluids_volume"),
      iv_fluids_status: value("iv_fluids_status"),
      iv_medications: value("iv_medications"),
      oral_intake: value("oral_intake"),
      urine_output: value("urine_output"),
      other_output: value("other_output"),
      additional_notes: value("additional_notes"),
    }
  }

  fn submit(&mut self, sync: &mut WardSync) {
    if sync.is_submitting() {
      self.message = Some(("Still saving...".to_string(), Color::DarkGray));
      return;
    }
    self.message = Some(match sync.submit_vital_signs(&self.read()) {
      Ok(()) => ("Saving...".to_string(), Color::DarkGray),
      Err(e) => {
        self.form.focus_label(e.field());
        (e.to_string(), Color::Red)
      }
    });
  }
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

impl View for VitalSignsFormView {
  fn handle_key(&mut self, key: KeyEvent, sync: &mut WardSync) -> ViewAction {
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submit) => {
        self.submit(sync);
        ViewAction::None
      }
      KeyResult::Event(FormEvent::Cancel) => ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, _sync: &WardSync) {
    let message = match &self.message {
      Some((text, color)) => Line::styled(text.clone(), Style::default().fg(*color)),
      None => Line::styled(HINT, Style::default().fg(Color::DarkGray)),
    };
    self.form.render(
      frame,
      area,
      form_block(" Record vital signs ".to_string()),
      Some(message),
    );
  }

  fn breadcrumb_label(&self) -> String {
    "Record".to_string()
  }

  fn on_sync_event(&mut self, event: &SyncEvent, _sync: &mut WardSync) -> ViewAction {
    match event {
      SyncEvent::VitalSignsRecorded(_) => ViewAction::Pop,
      SyncEvent::SubmitFailed(error) => {
        self.message = Some((error.clone(), Color::Red));
        ViewAction::None
      }
      _ => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("Ctrl-S", "save").with_priority(10),
      ShortcutInfo::new("←/→", "choose").with_priority(20),
      ShortcutInfo::new("Esc", "cancel").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{ward_sync, FakeWardServer};
  use chrono::NaiveDate;
  use crossterm::event::{KeyCode, KeyModifiers};
  use serde_json::Value;

  fn ctrl_s() -> KeyEvent {
    KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL)
  }

  fn values(patient_id: &str) -> VitalSignsForm {
    VitalSignsForm {
      patient_id: patient_id.to_string(),
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

  #[test]
  fn test_capitalize() {
    assert_eq!(capitalize("running"), "Running");
    assert_eq!(capitalize(""), "");
  }

  #[tokio::test]
  async fn test_form_round_trips_values() {
    let (sync, _worker) = ward_sync(FakeWardServer::new()).await;
    let view = VitalSignsFormView::new(values("db-1"), &sync);
    assert_eq!(view.read(), values("db-1"));
  }

  #[tokio::test]
  async fn test_bad_number_is_reported_on_its_field() {
    let server = FakeWardServer::new();
    let (mut sync, _worker) = ward_sync(server.clone()).await;
    let mut view = VitalSignsFormView::new(
      VitalSignsForm {
        heart_rate: "7x".to_string(),
        ..values("db-1")
      },
      &sync,
    );

    view.handle_key(ctrl_s(), &mut sync);
    assert_eq!(view.form.selected_key(), Some("heart_rate"));
    assert!(matches!(&view.message, Some((_, Color::Red))));
    assert!(server.received_bodies().is_empty());
  }

  #[tokio::test]
  async fn test_recorded_pops_and_sends_nulls() {
    let server = FakeWardServer::new();
    let (mut sync, _worker) = ward_sync(server.clone()).await;
    let admission = crate::sync::PatientForm {
      patient_id: "MAT-010".to_string(),
      full_name: "Rosa Lim".to_string(),
      birthdate: "1992-11-20".to_string(),
      address: "8 Mabini St".to_string(),
      ward_number: "1".to_string(),
      bed_number: "C2".to_string(),
      diagnosis: "Post-CS".to_string(),
      ..crate::sync::PatientForm::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
    };
    sync.submit_patient(&admission).unwrap();
    sync.settle().await;
    let id = server.patient_db_id("MAT-010").unwrap();

    let mut view = VitalSignsFormView::new(values(&id), &sync);
    assert_eq!(view.form.value("patient_id"), Some(id.as_str()));

    view.handle_key(ctrl_s(), &mut sync);
    let mut popped = false;
    for event in sync.settle().await {
      if let ViewAction::Pop = view.on_sync_event(&event, &mut sync) {
        popped = true;
      }
    }
    assert!(popped);

    let bodies = server.received_bodies();
    let body = &bodies[1];
    assert_eq!(body["urine_output"], Value::Null);
    assert_eq!(body["iv_fluids_volume"], Value::Null);
    assert_eq!(body["heart_rate"], 72);
    assert_eq!(body["iv_fluids_status"], "running");
  }
}
