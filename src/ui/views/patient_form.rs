use crate::api::{Patient, YesNo};
use crate::sync::{PatientForm, SyncEvent, WardSync};
use crate::ui::components::{form_block, Form, FormEvent, FormField, KeyResult};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use chrono::Local;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;

const HINT: &str = "Dates as YYYY-MM-DD.  Tab/↑↓ move  ←/→ choose  Ctrl-S save  Esc cancel";

enum Mode {
  Add,
  /// Editing the record with this id; the patient ID and birthdate are fixed
  Edit { id: String, patient_id: String },
}

/// Admission form, or the edit form of an existing patient
pub struct PatientFormView {
  mode: Mode,
  base: PatientForm,
  wards: Vec<String>,
  form: Form,
  message: Option<(String, Color)>,
}

impl PatientFormView {
  pub fn add(base: PatientForm, wards: Vec<String>) -> Self {
    let form = build_form(true, &base, &wards);
    Self {
      mode: Mode::Add,
      base,
      wards,
      form,
      message: None,
    }
  }

  pub fn edit(patient: &Patient, wards: Vec<String>) -> Self {
    let base = PatientForm::from_patient(patient);
    let form = build_form(false, &base, &wards);
    Self {
      mode: Mode::Edit {
        id: patient.id.clone(),
        patient_id: patient.patient_id.clone(),
      },
      base,
      wards,
      form,
      message: None,
    }
  }

  /// Current form contents; fields the form does not show keep their base value
  fn read(&self) -> PatientForm {
    let mut values = self.base.clone();
    let slots = [
      ("patient_id", &mut values.patient_id),
      ("full_name", &mut values.full_name),
      ("birthdate", &mut values.birthdate),
      ("address", &mut values.address),
      ("ward_number", &mut values.ward_number),
      ("bed_number", &mut values.bed_number),
      ("admission_date", &mut values.admission_date),
      ("diagnosis", &mut values.diagnosis),
      ("high_risk", &mut values.high_risk),
      ("discharged", &mut values.discharged),
      ("notes", &mut values.notes),
    ];
    for (key, slot) in slots {
      if let Some(value) = self.form.value(key) {
        *slot = value.to_string();
      }
    }
    values
  }

  fn submit(&mut self, sync: &mut WardSync) {
    if sync.is_submitting() {
      self.message = Some(("Still saving...".to_string(), Color::DarkGray));
      return;
    }

    let values = self.read();
    let result = match &self.mode {
      Mode::Add => sync.submit_patient(&values),
      Mode::Edit { id, .. } => sync.update_patient(id, &values),
    };
    self.message = Some(match result {
      Ok(()) => ("Saving...".to_string(), Color::DarkGray),
      Err(e) => {
        self.form.focus_label(e.field());
        (e.to_string(), Color::Red)
      }
    });
  }

  /// Start over with an empty admission form
  fn reset(&mut self) {
    self.base = PatientForm::new(Local::now().date_naive());
    self.form = build_form(true, &self.base, &self.wards);
  }
}

fn build_form(adding: bool, base: &PatientForm, wards: &[String]) -> Form {
  let yes_no = || {
    [YesNo::No, YesNo::Yes]
      .iter()
      .map(|v| (v.to_string(), v.to_string()))
      .collect::<Vec<_>>()
  };

  let mut fields = Vec::new();
  if adding {
    fields.push(FormField::text("patient_id", "Patient ID", base.patient_id.clone()).required());
  }
  fields.push(FormField::text("full_name", "Full name", base.full_name.clone()).required());
  if adding {
    fields.push(FormField::text("birthdate", "Birthdate", base.birthdate.clone()).required());
  }
  fields.push(FormField::text("address", "Address", base.address.clone()).required());
  fields.push(ward_field(base, wards));
  fields.push(FormField::text("bed_number", "Bed", base.bed_number.clone()).required());
  fields.push(
    FormField::text("admission_date", "Admission date", base.admission_date.clone()).required(),
  );
  fields.push(FormField::text("diagnosis", "Diagnosis", base.diagnosis.clone()).required());
  fields.push(FormField::choice("high_risk", "High risk", yes_no(), &base.high_risk));
  fields.push(FormField::choice("discharged", "Discharged", yes_no(), &base.discharged));
  fields.push(FormField::text("notes", "Notes", base.notes.clone()));
  Form::new(fields)
}

/// Choice of the configured wards, free text when none are configured
fn ward_field(base: &PatientForm, wards: &[String]) -> FormField {
  if wards.is_empty() {
    return FormField::text("ward_number", "Ward", base.ward_number.clone()).required();
  }
  let mut choices: Vec<(String, String)> = wards.iter().map(|w| (w.clone(), w.clone())).collect();
  if !base.ward_number.is_empty() && !wards.contains(&base.ward_number) {
    choices.push((base.ward_number.clone(), base.ward_number.clone()));
  }
  FormField::choice("ward_number", "Ward", choices, &base.ward_number).required()
}

impl View for PatientFormView {
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
    let title = match &self.mode {
      Mode::Add => " Admit patient ".to_string(),
      Mode::Edit { patient_id, .. } => format!(" Edit patient {} ", patient_id),
    };
    let message = match &self.message {
      Some((text, color)) => Line::styled(text.clone(), Style::default().fg(*color)),
      None => Line::styled(HINT, Style::default().fg(Color::DarkGray)),
    };
    self.form.render(frame, area, form_block(title), Some(message));
  }

  fn breadcrumb_label(&self) -> String {
    match &self.mode {
      Mode::Add => "Admit".to_string(),
      Mode::Edit { patient_id, .. } => format!("Edit [{}]", patient_id),
    }
  }

  fn on_sync_event(&mut self, event: &SyncEvent, _sync: &mut WardSync) -> ViewAction {
    let editing = match &self.mode {
      Mode::Add => None,
      Mode::Edit { id, .. } => Some(id.clone()),
    };
    match event {
      SyncEvent::PatientCreated(patient) if editing.is_none() => {
        self.reset();
        self.message = Some((
          format!("Admitted {} ({})", patient.full_name, patient.patient_id),
          Color::Green,
        ));
        ViewAction::None
      }
      SyncEvent::PatientUpdated(patient) if editing.as_deref() == Some(patient.id.as_str()) => {
        ViewAction::Pop
      }
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
      ShortcutInfo::new("Tab", "next field").with_priority(20),
      ShortcutInfo::new("Esc", "cancel").with_priority(90),
    ]
  }
}
