//! In-process store backed by `DashMap`s. Used by the test suite and for
//! `STORAGE_BACKEND=memory` deployments; nothing survives a restart.

use super::RegistrationFilter;
use crate::error::{RegistryError, Result};
use crate::models::{NewRegistration, PushedData, PushedFields, RegistrationInfo, User};
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    registrations: DashMap<i64, RegistrationInfo>,
    users: DashMap<i64, User>,
    usernames: DashMap<String, i64>,
    pushed: DashMap<i64, PushedData>,
    next_registration_id: AtomicI64,
    next_user_id: AtomicI64,
    next_pushed_id: AtomicI64,
}

fn next_id(counter: &AtomicI64) -> i64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_registration(&self, new: NewRegistration) -> RegistrationInfo {
        let id = next_id(&self.next_registration_id);
        let registration = RegistrationInfo {
            contact_name: new.contact_name,
            contact_email: new.contact_email,
            ..RegistrationInfo::new(id, Utc::now())
        };
        self.registrations.insert(id, registration.clone());
        registration
    }

    /// Stores a fully-formed registration, assigning an id when `id` is 0.
    #[cfg(test)]
    fn insert_registration(&self, mut registration: RegistrationInfo) -> RegistrationInfo {
        if registration.id == 0 {
            registration.id = next_id(&self.next_registration_id);
        } else {
            self.next_registration_id
                .fetch_max(registration.id, Ordering::Relaxed);
        }
        self.registrations
            .insert(registration.id, registration.clone());
        registration
    }

    pub fn get_registration(&self, id: i64) -> Option<RegistrationInfo> {
        self.registrations.get(&id).map(|r| r.clone())
    }

    pub fn save_registration(&self, registration: &RegistrationInfo) -> Result<()> {
        match self.registrations.get_mut(&registration.id) {
            Some(mut existing) => {
                *existing = registration.clone();
                Ok(())
            }
            None => Err(RegistryError::RegistrationNotFound {
                reg_id: registration.id,
            }),
        }
    }

    pub fn find_registration_by_name(&self, name: &str) -> Option<RegistrationInfo> {
        let mut matches: Vec<RegistrationInfo> = self
            .registrations
            .iter()
            .filter(|r| r.provider_long_name == name)
            .map(|r| r.clone())
            .collect();
        matches.sort_by_key(|r| r.id);
        matches.into_iter().next()
    }

    pub fn list_registrations(&self, filter: &RegistrationFilter) -> Vec<RegistrationInfo> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());

        let mut found: Vec<RegistrationInfo> = self
            .registrations
            .iter()
            .filter(|r| {
                needle
                    .as_ref()
                    .map(|n| r.provider_long_name.to_lowercase().contains(n.as_str()))
                    .unwrap_or(true)
            })
            .filter(|r| {
                filter
                    .registered_since
                    .map(|since| r.registration_date >= since)
                    .unwrap_or(true)
            })
            .map(|r| r.clone())
            .collect();

        found.sort_by(|a, b| {
            a.registration_date
                .cmp(&b.registration_date)
                .then(a.id.cmp(&b.id))
        });
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        found
    }

    pub fn create_user(&self, username: &str, token_hash: &str) -> Result<User> {
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(_) => Err(RegistryError::UsernameTaken {
                username: username.to_string(),
            }),
            Entry::Vacant(slot) => {
                let id = next_id(&self.next_user_id);
                let user = User {
                    id,
                    username: username.to_string(),
                    token_hash: token_hash.to_string(),
                    date_joined: Utc::now(),
                };
                self.users.insert(id, user.clone());
                slot.insert(id);
                Ok(user)
            }
        }
    }

    pub fn get_user(&self, id: i64) -> Option<User> {
        self.users.get(&id).map(|u| u.clone())
    }

    pub fn find_user_by_token(&self, token_hash: &str) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.token_hash == token_hash)
            .map(|u| u.clone())
    }

    pub fn set_user_token(&self, id: i64, token_hash: &str) -> Result<()> {
        match self.users.get_mut(&id) {
            Some(mut user) => {
                user.token_hash = token_hash.to_string();
                Ok(())
            }
            None => Err(RegistryError::NotFound { resource: "User", id }),
        }
    }

    pub fn list_users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn create_pushed(&self, source_id: i64, fields: PushedFields, today: NaiveDate) -> PushedData {
        let id = next_id(&self.next_pushed_id);
        let data = PushedData {
            id,
            url: fields.url,
            doi: fields.doi,
            tags: fields.tags,
            title: fields.title,
            service_id: fields.service_id,
            description: fields.description,
            contributors: fields.contributors,
            date_updated: today,
            source_id,
        };
        self.pushed.insert(id, data.clone());
        data
    }

    pub fn get_pushed(&self, id: i64) -> Option<PushedData> {
        self.pushed.get(&id).map(|d| d.clone())
    }

    pub fn list_pushed(&self, source_id: Option<i64>) -> Vec<PushedData> {
        let mut data: Vec<PushedData> = self
            .pushed
            .iter()
            .filter(|d| source_id.map(|s| d.source_id == s).unwrap_or(true))
            .map(|d| d.clone())
            .collect();
        data.sort_by_key(|d| d.id);
        data
    }

    pub fn save_pushed(&self, data: &PushedData) -> Result<()> {
        match self.pushed.get_mut(&data.id) {
            Some(mut existing) => {
                *existing = data.clone();
                Ok(())
            }
            None => Err(RegistryError::NotFound {
                resource: "PushedData",
                id: data.id,
            }),
        }
    }

    pub fn save_pushed_many(&self, records: &[PushedData]) -> Result<()> {
        if let Some(missing) = records.iter().find(|d| !self.pushed.contains_key(&d.id)) {
            return Err(RegistryError::NotFound {
                resource: "PushedData",
                id: missing.id,
            });
        }
        for data in records {
            self.pushed.insert(data.id, data.clone());
        }
        Ok(())
    }

    pub fn delete_pushed(&self, id: i64) -> bool {
        self.pushed.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn named(store: &MemoryStore, name: &str, days_ago: i64) -> RegistrationInfo {
        store.insert_registration(RegistrationInfo {
            provider_long_name: name.to_string(),
            ..RegistrationInfo::new(0, Utc::now() - Duration::days(days_ago))
        })
    }

    #[test]
    fn test_registration_ids_increase() {
        let store = MemoryStore::new();
        let a = store.create_registration(NewRegistration {
            contact_name: "BubbaRay Dudley".to_string(),
            contact_email: "BullyRay@dudleyboyz.net".to_string(),
        });
        let b = named(&store, "Stardust Weekly", 0);
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(store.get_registration(1).unwrap().contact_name, "BubbaRay Dudley");
    }

    #[test]
    fn test_insert_with_explicit_id_advances_counter() {
        let store = MemoryStore::new();
        named(&store, "zero", 0);
        store.insert_registration(RegistrationInfo::new(10, Utc::now()));
        assert_eq!(named(&store, "next", 0).id, 11);
    }

    #[test]
    fn test_save_missing_registration() {
        let store = MemoryStore::new();
        let err = store
            .save_registration(&RegistrationInfo::new(42, Utc::now()))
            .unwrap_err();
        assert!(matches!(err, RegistryError::RegistrationNotFound { reg_id: 42 }));
    }

    #[test]
    fn test_list_registrations_filters_and_orders() {
        let store = MemoryStore::new();
        named(&store, "Stardust Weekly", 3);
        named(&store, "Golddust Monthly", 1);
        named(&store, "The COSMIC KEEEEEY", 10);

        let earliest = store.list_registrations(&RegistrationFilter {
            limit: Some(2),
            ..Default::default()
        });
        let names: Vec<&str> = earliest.iter().map(|r| r.provider_long_name.as_str()).collect();
        assert_eq!(names, vec!["The COSMIC KEEEEEY", "Stardust Weekly"]);

        let dusty = store.list_registrations(&RegistrationFilter {
            search: Some("DUST".to_string()),
            ..Default::default()
        });
        assert_eq!(dusty.len(), 2);
        assert_eq!(dusty[0].provider_long_name, "Stardust Weekly");

        let recent = store.list_registrations(&RegistrationFilter {
            registered_since: Some(Utc::now() - Duration::days(5)),
            ..Default::default()
        });
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_usernames_are_unique() {
        let store = MemoryStore::new();
        store.create_user("bubbaray", "h1").unwrap();
        assert!(matches!(
            store.create_user("bubbaray", "h2"),
            Err(RegistryError::UsernameTaken { .. })
        ));
        assert_eq!(store.find_user_by_token("h1").unwrap().username, "bubbaray");
    }

    #[test]
    fn test_pushed_lifecycle() {
        let store = MemoryStore::new();
        let user = store.create_user("bubbaray", "h").unwrap();
        let today = Utc::now().date_naive();
        let fields = PushedFields {
            url: "http://dudley.net".to_string(),
            doi: "10.1/x".to_string(),
            tags: String::new(),
            title: "All About Ducks".to_string(),
            service_id: "DuckID11".to_string(),
            description: String::new(),
            contributors: "Shawn Michaels".to_string(),
        };

        let mut data = store.create_pushed(user.id, fields, today);
        data.title = "More About Ducks".to_string();
        store.save_pushed(&data).unwrap();

        assert_eq!(store.get_pushed(data.id).unwrap().title, "More About Ducks");
        assert_eq!(store.list_pushed(Some(user.id)).len(), 1);
        assert!(store.list_pushed(Some(user.id + 1)).is_empty());
        assert!(store.delete_pushed(data.id));
        assert!(!store.delete_pushed(data.id));
    }

    #[test]
    fn test_save_pushed_many_is_all_or_nothing() {
        let store = MemoryStore::new();
        let user = store.create_user("devon", "h").unwrap();
        let today = Utc::now().date_naive();
        let fields = PushedFields {
            url: "http://dudley.net".to_string(),
            doi: "10.1/x".to_string(),
            tags: String::new(),
            title: "Tables".to_string(),
            service_id: "Table1".to_string(),
            description: String::new(),
            contributors: "D-Von".to_string(),
        };

        let mut first = store.create_pushed(user.id, fields.clone(), today);
        let mut second = store.create_pushed(user.id, fields, today);
        first.title = "Broken Tables".to_string();
        let mut ghost = second.clone();
        ghost.id = 999;

        let err = store
            .save_pushed_many(&[first.clone(), ghost])
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { id: 999, .. }));
        assert_eq!(store.get_pushed(first.id).unwrap().title, "Tables");

        second.title = "Stacked Tables".to_string();
        store.save_pushed_many(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(store.get_pushed(first.id).unwrap().title, "Broken Tables");
        assert_eq!(store.get_pushed(second.id).unwrap().title, "Stacked Tables");
    }
}
