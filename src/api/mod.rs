//! REST client for the ward backend.

mod client;
mod types;

pub use client::WardClient;
pub use types::{
  FluidStatus, OverviewStats, Patient, PatientCreate, PatientUpdate, VitalSigns, VitalSignsCreate,
  YesNo,
};
