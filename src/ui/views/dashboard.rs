use crate::api::OverviewStats;
use crate::query::QueryState;
use crate::sync::{PatientForm, WardSync};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{PatientFormView, PatientListView, VitalSignsListView};
use chrono::Local;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph};

/// Ward overview: headline counters and patients per ward
pub struct DashboardView {
  wards: Vec<String>,
}

impl DashboardView {
  pub fn new(wards: Vec<String>) -> Self {
    Self { wards }
  }

  fn render_counters(&self, frame: &mut Frame, area: Rect, stats: Option<&OverviewStats>) {
    let counters = [
      ("Patients", stats.map(|s| s.total_patients), Color::Cyan),
      ("High risk", stats.map(|s| s.high_risk_patients), Color::Red),
      ("Discharged", stats.map(|s| s.discharged_patients), Color::Green),
      ("Vitals (24h)", stats.map(|s| s.recent_vital_signs), Color::Yellow),
    ];

    let cells = Layout::default()
      .direction(Direction::Horizontal)
      .constraints([Constraint::Ratio(1, 4); 4])
      .split(area);

    for ((label, value, color), cell) in counters.into_iter().zip(cells.iter()) {
      let text = value.map_or_else(|| "-".to_string(), |v| v.to_string());
      let paragraph = Paragraph::new(Line::styled(text, Style::default().fg(color).bold()))
        .alignment(Alignment::Center)
        .block(
          Block::default()
            .title(format!(" {} ", label))
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Blue)),
        );
      frame.render_widget(paragraph, *cell);
    }
  }

  fn render_wards(&self, frame: &mut Frame, area: Rect, stats: Option<&OverviewStats>) {
    let block = Block::default()
      .title(" Patients per ward ")
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let wards = stats.map(|s| s.ward_statistics.as_slice()).unwrap_or(&[]);
    if wards.is_empty() {
      let paragraph = Paragraph::new("No ward statistics.")
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let max = wards.iter().map(|w| w.count).max().unwrap_or(1).max(1);
    let bar_width = area.width.saturating_sub(20) as u64;
    let items: Vec<ListItem> = wards
      .iter()
      .map(|ward| {
        let bar = "█".repeat((ward.count * bar_width / max) as usize);
        ListItem::new(Line::from(vec![
          Span::styled(
            format!(" Ward {:<6}", ward.ward),
            Style::default().fg(Color::Cyan),
          ),
          Span::styled(format!("{:>4} ", ward.count), Style::default().bold()),
          Span::styled(bar, Style::default().fg(Color::Blue)),
        ]))
      })
      .collect();

    frame.render_widget(List::new(items).block(block), area);
  }
}

impl View for DashboardView {
  fn handle_key(&mut self, key: KeyEvent, sync: &mut WardSync) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        sync.refresh_stats();
        ViewAction::None
      }
      KeyCode::Char('p') => ViewAction::Push(Box::new(PatientListView::new(self.wards.clone()))),
      KeyCode::Char('v') => ViewAction::Push(Box::new(VitalSignsListView::all())),
      KeyCode::Char('a') => ViewAction::Push(Box::new(PatientFormView::add(
        PatientForm::new(Local::now().date_naive()),
        self.wards.clone(),
      ))),
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect, sync: &WardSync) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Status line
        Constraint::Length(3), // Counters
        Constraint::Min(3),    // Wards
      ])
      .split(area);

    let status = match sync.stats_query().state() {
      QueryState::Loading => Span::styled(" Loading...", Style::default().fg(Color::DarkGray)),
      QueryState::Error(e) => Span::styled(format!(" Error: {}", e), Style::default().fg(Color::Red)),
      QueryState::Idle if sync.stats_query().data().is_some_and(|s| s.is_offline()) => {
        Span::styled(" Offline: showing cached figures", Style::default().fg(Color::Yellow))
      }
      QueryState::Idle => Span::raw(""),
    };
    frame.render_widget(Paragraph::new(Line::from(status)), chunks[0]);

    let stats = sync.stats();
    self.render_counters(frame, chunks[1], stats);
    self.render_wards(frame, chunks[2], stats);
  }

  fn breadcrumb_label(&self) -> String {
    "Dashboard".to_string()
  }

  fn on_enter(&mut self, sync: &mut WardSync) {
    sync.refresh_stats();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("p", "patients").with_priority(20),
      ShortcutInfo::new("v", "vitals").with_priority(30),
      ShortcutInfo::new("a", "admit").with_priority(40),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}
