mod dashboard;
mod patient_form;
mod patient_list;
mod vital_signs_form;
mod vital_signs_list;

pub use dashboard::DashboardView;
pub use patient_form::PatientFormView;
pub use patient_list::PatientListView;
pub use vital_signs_form::VitalSignsFormView;
pub use vital_signs_list::VitalSignsListView;
