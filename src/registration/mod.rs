//! Provider registration wizard
//!
//! Contact details, metadata permissions, provider basics, then either the
//! OAI-PMH finish (set and property selection) or the plain finish.

mod forms;
mod service;

pub use forms::{
    ContactInfoForm, InitialProviderForm, MetadataQuestionsForm, OaiProviderForm,
    OtherProviderForm, PropertyInput,
};
pub use service::{ProviderStep, Registrar, SaveOutcome, SetChoice};
