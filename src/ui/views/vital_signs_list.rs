use crate::api::{Patient, VitalSigns};
use crate::sync::{VitalSignsForm, WardSync};
use crate::ui::renderfns::{pain_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::VitalSignsFormView;
use crate::ui::{collection_title, ensure_valid_selection};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

/// Patient the list is limited to
struct Scope {
  id: String,
  label: String,
}

/// Latest vital signs, for one patient or across all wards
pub struct VitalSignsListView {
  scope: Option<Scope>,
  list_state: ListState,
}

impl VitalSignsListView {
  pub fn all() -> Self {
    Self {
      scope: None,
      list_state: ListState::default(),
    }
  }

  pub fn for_patient(patient: &Patient) -> Self {
    Self {
      scope: Some(Scope {
        id: patient.id.clone(),
        label: patient.patient_id.clone(),
      }),
      list_state: ListState::default(),
    }
  }

  fn selected<'a>(&self, sync: &'a WardSync) -> Option<&'a VitalSigns> {
    self
      .list_state
      .selected()
      .and_then(|idx| sync.vital_signs().get(idx))
  }

  /// Records still showing another scope's data (from before the refresh) are hidden
  fn in_scope(&self, sync: &WardSync) -> bool {
    sync.vital_signs_scope() == self.scope.as_ref().map(|s| s.id.as_str())
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    let records = if self.in_scope(sync) {
      sync.vital_signs()
    } else {
      &[]
    };
    ensure_valid_selection(&mut self.list_state, records.len());

    let block = Block::default()
      .title(collection_title(
        &self.breadcrumb_label(),
        sync.vital_signs_query(),
        records.len(),
      ))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if records.is_empty() {
      let content = if sync.vital_signs_query().is_loading() {
        "Loading..."
      } else if sync.vital_signs_query().error().is_some() {
        "Failed to load vital signs. Press 'r' to retry."
      } else {
        "No vital signs recorded. Press 'n' to record."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = records
      .iter()
      .map(|record| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<16}", record.monitored_at()),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<20}", truncate(&record.patient_name, 20))),
          Span::raw(" "),
          Span::styled(
            format!("{:<10}", format!("W{} B{}", record.ward_number, record.bed_number)),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw(" "),
          Span::raw(record.summary()),
          Span::raw("  "),
          Span::styled(
            format!("pain {}", record.pain_score),
            Style::default().fg(pain_color(record.pain_score)),
          ),
        ]))
      })
      .collect();

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

  fn render_detail(&self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    let block = Block::default()
      .borders(Borders::TOP)
      .border_style(Style::default().fg(Color::DarkGray));

    let Some(record) = self.selected(sync).filter(|_| self.in_scope(sync)) else {
      frame.render_widget(block, area);
      return;
    };

    let volume = record
      .iv_fluids_volume
      .map(|v| format!("{} mL", v))
      .unwrap_or_else(|| "-".to_string());
    let urine = record
      .urine_output
      .map(|v| format!("{} mL", v))
      .unwrap_or_else(|| "-".to_string());
    let status = record
      .iv_fluids_status
      .as_ref()
      .map(|s| s.as_str())
      .unwrap_or("-");

    let lines = vec![
      detail_line(&[
        ("IV fluids", text_or_dash(record.iv_fluids_type.as_deref())),
        ("Volume", volume),
        ("Status", status.to_string()),
        ("Medications", text_or_dash(record.iv_medications.as_deref())),
      ]),
      detail_line(&[
        ("Oral intake", text_or_dash(record.oral_intake.as_deref())),
        ("Urine", urine),
        ("Other output", text_or_dash(record.other_output.as_deref())),
      ]),
      detail_line(&[("Notes", text_or_dash(record.additional_notes.as_deref()))]),
    ];
    frame.render_widget(
      Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
      area,
    );
  }
}

fn text_or_dash(value: Option<&str>) -> String {
  match value.map(str::trim) {
    Some(v) if !v.is_empty() => v.to_string(),
    _ => "-".to_string(),
  }
}

fn detail_line(parts: &[(&str, String)]) -> Line<'static> {
  let mut spans = Vec::new();
  for (label, value) in parts {
    spans.push(Span::styled(
      format!(" {}: ", label),
      Style::default().fg(Color::DarkGray),
    ));
    spans.push(Span::raw(format!("{}  ", value)));
  }
  Line::from(spans)
}

impl View for VitalSignsListView {
  fn handle_key(&mut self, key: KeyEvent, sync: &mut WardSync) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('r') => sync.refresh_vital_signs(self.scope.as_ref().map(|s| s.id.clone())),
      KeyCode::Char('n') => {
        let patient_id = match &self.scope {
          Some(scope) => scope.id.clone(),
          None => self
            .selected(sync)
            .map(|r| r.patient_id.clone())
            .unwrap_or_default(),
        };
        let form = VitalSignsForm {
          patient_id,
          ..VitalSignsForm::now()
        };
        return ViewAction::Push(Box::new(VitalSignsFormView::new(form, sync)));
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Min(3),    // Records
        Constraint::Length(4), // Selected record
      ])
      .split(area);

    self.render_list(frame, chunks[0], sync);
    self.render_detail(frame, chunks[1], sync);
  }

  fn breadcrumb_label(&self) -> String {
    match &self.scope {
      Some(scope) => format!("Vital signs [{}]", scope.label),
      None => "Vital signs".to_string(),
    }
  }

  fn on_enter(&mut self, sync: &mut WardSync) {
    sync.refresh_vital_signs(self.scope.as_ref().map(|s| s.id.clone()));
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "record").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(30),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
