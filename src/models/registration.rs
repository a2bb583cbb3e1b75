use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One registered (or in-progress) provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub id: i64,

    // Basic information
    pub base_url: String,
    pub description: String,
    pub contact_email: String,
    pub contact_name: String,
    pub oai_provider: bool,
    pub provider_short_name: String,
    pub provider_long_name: String,

    // Terms of service and metadata permissions
    pub meta_tos: bool,
    pub meta_license: String,
    pub meta_privacy: bool,
    pub meta_sharing_tos: bool,
    pub meta_license_extended: bool,
    pub meta_future_license: bool,

    // Harvester information
    pub property_list: String,
    pub approved_sets: String,
    pub registration_date: DateTime<Utc>,
}

impl RegistrationInfo {
    pub fn new(id: i64, registration_date: DateTime<Utc>) -> Self {
        Self {
            id,
            base_url: String::new(),
            description: String::new(),
            contact_email: String::new(),
            contact_name: String::new(),
            oai_provider: false,
            provider_short_name: String::new(),
            provider_long_name: String::new(),
            meta_tos: false,
            meta_license: String::new(),
            meta_privacy: false,
            meta_sharing_tos: false,
            meta_license_extended: false,
            meta_future_license: false,
            property_list: String::new(),
            approved_sets: String::new(),
            registration_date,
        }
    }

    pub fn was_registered_recently(&self, days: i64) -> bool {
        self.was_registered_recently_at(days, Utc::now())
    }

    /// `now - days <= registration_date <= now`; future dates are never recent.
    pub fn was_registered_recently_at(&self, days: i64, now: DateTime<Utc>) -> bool {
        if days < 0 {
            return false;
        }
        let since = recent_cutoff(now, days).unwrap_or(DateTime::<Utc>::MIN_UTC);
        since <= self.registration_date && self.registration_date <= now
    }
}

/// Start of the `days` long window ending at `now`, or `None` when it falls
/// outside the representable date range.
pub fn recent_cutoff(now: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    TimeDelta::try_days(days).and_then(|window| now.checked_sub_signed(window))
}

impl fmt::Display for RegistrationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.provider_long_name)
    }
}

/// Fields a new registration starts with (the contact step).
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub contact_name: String,
    pub contact_email: String,
}
