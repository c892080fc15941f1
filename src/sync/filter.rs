//! Patient list filter state and its query string.

/// Discharge filter; `Any` sends no parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DischargeFilter {
  #[default]
  Any,
  Active,
  Discharged,
}

impl DischargeFilter {
  /// Any -> Active -> Discharged -> Any
  pub fn next(self) -> Self {
    match self {
      DischargeFilter::Any => DischargeFilter::Active,
      DischargeFilter::Active => DischargeFilter::Discharged,
      DischargeFilter::Discharged => DischargeFilter::Any,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      DischargeFilter::Any => "all",
      DischargeFilter::Active => "active",
      DischargeFilter::Discharged => "discharged",
    }
  }
}

/// User-controlled patient filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
  pub search_query: String,
  pub high_risk_only: bool,
  /// Empty means all wards
  pub ward_filter: String,
  pub discharge_filter: DischargeFilter,
}

/// Partial update of [`FilterState`]; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
  pub search_query: Option<String>,
  pub high_risk_only: Option<bool>,
  pub ward_filter: Option<String>,
  pub discharge_filter: Option<DischargeFilter>,
}

impl FilterPatch {
  pub fn search(query: impl Into<String>) -> Self {
    Self {
      search_query: Some(query.into()),
      ..Default::default()
    }
  }

  pub fn high_risk(only: bool) -> Self {
    Self {
      high_risk_only: Some(only),
      ..Default::default()
    }
  }

  pub fn ward(ward: impl Into<String>) -> Self {
    Self {
      ward_filter: Some(ward.into()),
      ..Default::default()
    }
  }

  pub fn discharge(filter: DischargeFilter) -> Self {
    Self {
      discharge_filter: Some(filter),
      ..Default::default()
    }
  }
}

impl FilterState {
  pub fn apply(&mut self, patch: FilterPatch) {
    if let Some(search) = patch.search_query {
      self.search_query = search;
    }
    if let Some(high_risk) = patch.high_risk_only {
      self.high_risk_only = high_risk;
    }
    if let Some(ward) = patch.ward_filter {
      self.ward_filter = ward;
    }
    if let Some(discharge) = patch.discharge_filter {
      self.discharge_filter = discharge;
    }
  }

  /// Parameters for the non-empty filters, in a fixed order.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    let search = self.search_query.trim();
    if !search.is_empty() {
      pairs.push(("search", search.to_string()));
    }
    if self.high_risk_only {
      pairs.push(("high_risk", "true".to_string()));
    }
    match self.discharge_filter {
      DischargeFilter::Any => {}
      DischargeFilter::Active => pairs.push(("discharged", "false".to_string())),
      DischargeFilter::Discharged => pairs.push(("discharged", "true".to_string())),
    }
    let ward = self.ward_filter.trim();
    if !ward.is_empty() {
      pairs.push(("ward", ward.to_string()));
    }
    pairs
  }

  /// Encoded query string without the leading `?`; empty when nothing is set.
  pub fn query_string(&self) -> String {
    url::form_urlencoded::Serializer::new(String::new())
      .extend_pairs(self.query_pairs())
      .finish()
  }

  /// Short description for the list title.
  pub fn describe(&self) -> String {
    let mut parts = Vec::new();
    if !self.search_query.trim().is_empty() {
      parts.push(format!("/{}", self.search_query.trim()));
    }
    if self.high_risk_only {
      parts.push("high-risk".to_string());
    }
    if self.discharge_filter != DischargeFilter::Any {
      parts.push(self.discharge_filter.label().to_string());
    }
    if !self.ward_filter.trim().is_empty() {
      parts.push(format!("ward {}", self.ward_filter.trim()));
    }
    parts.join(" ")
  }
}
