use crate::api::Patient;
use crate::sync::{FilterPatch, PatientForm, VitalSignsForm, WardSync};
use crate::ui::components::{KeyResult, SearchEvent, SearchInput};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{PatientFormView, VitalSignsFormView, VitalSignsListView};
use crate::ui::{collection_title, ensure_valid_selection};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Filterable list of patients
pub struct PatientListView {
  wards: Vec<String>,
  list_state: ListState,
  search: SearchInput,
}

impl PatientListView {
  pub fn new(wards: Vec<String>) -> Self {
    Self {
      wards,
      list_state: ListState::default(),
      search: SearchInput::new(),
    }
  }

  fn selected<'a>(&self, sync: &'a WardSync) -> Option<&'a Patient> {
    self
      .list_state
      .selected()
      .and_then(|idx| sync.patients().get(idx))
  }

  /// All wards -> first configured ward -> ... -> last -> all wards
  fn next_ward(&self, current: &str) -> String {
    match self.wards.iter().position(|w| w == current) {
      None if current.is_empty() => self.wards.first().cloned().unwrap_or_default(),
      Some(i) if i + 1 < self.wards.len() => self.wards[i + 1].clone(),
      _ => String::new(),
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    let patients = sync.patients();
    ensure_valid_selection(&mut self.list_state, patients.len());

    let filter = sync.filter().describe();
    let name = if filter.is_empty() {
      "Patients".to_string()
    } else {
      format!("Patients [{}]", filter)
    };

    let block = Block::default()
      .title(collection_title(&name, sync.patients_query(), patients.len()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if patients.is_empty() && !sync.patients_query().is_loading() {
      let content = if sync.patients_query().error().is_some() {
        "Failed to load patients. Press 'r' to retry."
      } else if !filter.is_empty() {
        "No patients match the current filters."
      } else {
        "No patients found. Press 'a' to admit one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = patients.iter().map(patient_item).collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn handle_overlays(&mut self, key: KeyEvent, sync: &mut WardSync) -> Option<ViewAction> {
    let current = sync.filter().search_query.clone();
    match self.search.handle_key(key, &current) {
      KeyResult::Handled => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(query)) => {
        sync.set_filter(FilterPatch::search(query));
        Some(ViewAction::None)
      }
      KeyResult::Event(SearchEvent::Submitted) => Some(ViewAction::None),
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
        Some(ViewAction::None)
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
        Some(ViewAction::None)
      }
      _ => None,
    }
  }

  fn handle_filters(&mut self, key: KeyEvent, sync: &mut WardSync) -> Option<ViewAction> {
    let filter = sync.filter().clone();
    let patch = match key.code {
      KeyCode::Char('h') => FilterPatch::high_risk(!filter.high_risk_only),
      KeyCode::Char('d') => FilterPatch::discharge(filter.discharge_filter.next()),
      KeyCode::Char('w') => FilterPatch::ward(self.next_ward(&filter.ward_filter)),
      _ => return None,
    };
    sync.set_filter(patch);
    Some(ViewAction::None)
  }

  fn handle_actions(&mut self, key: KeyEvent, sync: &mut WardSync) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        sync.refresh_patients();
        Some(ViewAction::None)
      }
      KeyCode::Char('a') => Some(ViewAction::Push(Box::new(PatientFormView::add(
        PatientForm::new(Local::now().date_naive()),
        self.wards.clone(),
      )))),
      KeyCode::Char('e') => {
        let Some(patient) = self.selected(sync) else {
          return Some(no_selection());
        };
        Some(ViewAction::Push(Box::new(PatientFormView::edit(
          patient,
          self.wards.clone(),
        ))))
      }
      KeyCode::Enter | KeyCode::Char('v') => {
        let Some(patient) = self.selected(sync) else {
          return Some(no_selection());
        };
        Some(ViewAction::Push(Box::new(VitalSignsListView::for_patient(
          patient,
        ))))
      }
      KeyCode::Char('n') => {
        let Some(patient) = self.selected(sync) else {
          return Some(no_selection());
        };
        let form = VitalSignsForm {
          patient_id: patient.id.clone(),
          ..VitalSignsForm::now()
        };
        Some(ViewAction::Push(Box::new(VitalSignsFormView::new(form, sync))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

fn no_selection() -> ViewAction {
  ViewAction::Status("No patient selected".to_string())
}

fn patient_item(patient: &Patient) -> ListItem<'static> {
  let mut spans = vec![
    Span::styled(
      format!("{:<10}", truncate(&patient.patient_id, 10)),
      Style::default().fg(Color::Cyan),
    ),
    Span::raw(" "),
    Span::raw(format!("{:<24}", truncate(&patient.full_name, 24))),
    Span::raw(" "),
    Span::styled(
      format!(
        "{:<10}",
        format!("W{} B{}", patient.ward_number, patient.bed_number)
      ),
      Style::default().fg(Color::Yellow),
    ),
    Span::raw(" "),
    Span::raw(format!(
      "{:<4}",
      patient.age.map(|a| a.to_string()).unwrap_or_default()
    )),
    Span::raw(" "),
    Span::raw(format!("{:<30}", truncate(&patient.diagnosis, 30))),
  ];

  if patient.is_high_risk() {
    spans.push(Span::styled(
      " HIGH RISK",
      Style::default().fg(Color::Red).bold(),
    ));
  }
  if patient.is_discharged() {
    spans.push(Span::styled(
      " discharged",
      Style::default().fg(Color::DarkGray),
    ));
  }
  ListItem::new(Line::from(spans))
}

impl View for PatientListView {
  fn handle_key(&mut self, key: KeyEvent, sync: &mut WardSync) -> ViewAction {
    self
      .handle_overlays(key, sync)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_filters(key, sync))
      .or_else(|| self.handle_actions(key, sync))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    self.render_list(frame, area, sync);
    // Let search component render its overlay
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Patients".to_string()
  }

  fn on_enter(&mut self, sync: &mut WardSync) {
    sync.refresh_patients();
  }

  fn captures_input(&self) -> bool {
    self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("/", "search").with_priority(10),
      ShortcutInfo::new("h", "high-risk").with_priority(20),
      ShortcutInfo::new("d", "discharged").with_priority(21),
      ShortcutInfo::new("w", "ward").with_priority(22),
      ShortcutInfo::new("a", "admit").with_priority(30),
      ShortcutInfo::new("e", "edit").with_priority(31),
      ShortcutInfo::new("v", "vitals").with_priority(32),
      ShortcutInfo::new("n", "record").with_priority(33),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ward_cycle() {
    let view = PatientListView::new(vec!["1".to_string(), "2".to_string()]);
    assert_eq!(view.next_ward(""), "1");
    assert_eq!(view.next_ward("1"), "2");
    assert_eq!(view.next_ward("2"), "");
    // A ward typed elsewhere that is not configured resets to all
    assert_eq!(view.next_ward("9"), "");
  }

  #[test]
  fn test_ward_cycle_without_wards() {
    let view = PatientListView::new(Vec::new());
    assert_eq!(view.next_ward(""), "");
  }
}
