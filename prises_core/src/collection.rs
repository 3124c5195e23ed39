//! Normalized entity collection keyed by uuid.
//!
//! One instance per entity kind. The collection is pure storage: it enforces
//! identifier rules and replace-not-merge semantics, nothing else.

use crate::{Medication, Shot};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A record that can live in a [`Collection`]
pub trait Record: Clone {
    fn uuid(&self) -> Option<Uuid>;
    fn set_uuid(&mut self, uuid: Uuid);
}

impl Record for Medication {
    fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    fn set_uuid(&mut self, uuid: Uuid) {
        self.uuid = Some(uuid);
    }
}

impl Record for Shot {
    fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    fn set_uuid(&mut self, uuid: Uuid) {
        self.uuid = Some(uuid);
    }
}

/// Mapping from uuid to record; iteration order carries no meaning
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct Collection<T> {
    records: HashMap<Uuid, T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under a freshly generated uuid, ignoring any uuid in `fields`
    pub fn create(&mut self, mut fields: T) -> Uuid {
        let uuid = Uuid::new_v4();
        fields.set_uuid(uuid);
        self.records.insert(uuid, fields);
        uuid
    }

    /// Replace the record at `fields.uuid` wholesale
    ///
    /// Fields omitted from `fields` are gone afterwards; callers submit the
    /// full record. Without a uuid this is a silent no-op.
    pub fn edit(&mut self, fields: T) -> bool {
        match fields.uuid() {
            Some(uuid) => {
                self.records.insert(uuid, fields);
                true
            }
            None => {
                tracing::debug!("Ignoring edit without uuid");
                false
            }
        }
    }

    /// Remove the record if present; returns whether anything was removed
    pub fn delete(&mut self, uuid: &Uuid) -> bool {
        self.records.remove(uuid).is_some()
    }

    /// Discard every record, then insert `records` keyed by their own uuid
    pub fn bulk_init(&mut self, records: Vec<T>) {
        self.records.clear();
        for record in records {
            match record.uuid() {
                Some(uuid) => {
                    self.records.insert(uuid, record);
                }
                None => tracing::warn!("Skipping bulk-init record without uuid"),
            }
        }
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&T> {
        self.records.get(uuid)
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.records.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unordered iteration; sort before displaying
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.values()
    }

    /// Rebuild from a persisted map, trusting the map key as identity
    pub(crate) fn from_keyed(records: HashMap<Uuid, T>) -> Self {
        let records = records
            .into_iter()
            .map(|(uuid, mut record)| {
                record.set_uuid(uuid);
                (uuid, record)
            })
            .collect();
        Self { records }
    }
}

impl<'de, T> Deserialize<'de> for Collection<T>
where
    T: Record + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        HashMap::<Uuid, T>::deserialize(deserializer).map(Self::from_keyed)
    }
}
