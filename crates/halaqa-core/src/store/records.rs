//! Indexed record collection shared by the stores

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{LocalId, Payload, Record};
use crate::sync::Accepted;

/// Records of one kind indexed by local id.
///
/// Each record exists once; the synced collection is an ordered list of
/// local ids into the same index, so reconciliation never copies data.
#[derive(Debug, Clone)]
pub struct RecordSet<P> {
    records: HashMap<LocalId, Record<P>>,
    /// Creation order
    order: Vec<LocalId>,
    /// Order in which records were first reconciled
    synced: Vec<LocalId>,
}

impl<P> Default for RecordSet<P> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            synced: Vec::new(),
        }
    }
}

impl<P: Payload> RecordSet<P> {
    /// Rebuild from persisted records; `synced_order` lists synced ids in
    /// reconciliation order and unknown ids are ignored.
    pub fn from_records(records: Vec<Record<P>>, synced_order: Vec<LocalId>) -> Self {
        let mut set = Self::default();
        for record in records {
            let local_id = record.local_id;
            if set.records.insert(local_id, record).is_none() {
                set.order.push(local_id);
            }
        }
        for local_id in synced_order {
            if set.records.get(&local_id).is_some_and(Record::is_synced)
                && !set.synced.contains(&local_id)
            {
                set.synced.push(local_id);
            }
        }
        // Synced records missing from the order list go last.
        let missing: Vec<LocalId> = set
            .order
            .iter()
            .filter(|id| set.records[*id].is_synced() && !set.synced.contains(id))
            .copied()
            .collect();
        set.synced.extend(missing);
        set
    }

    pub fn insert(&mut self, record: Record<P>) -> LocalId {
        let local_id = record.local_id;
        let synced = record.is_synced();
        if self.records.insert(local_id, record).is_none() {
            self.order.push(local_id);
        }
        if synced && !self.synced.contains(&local_id) {
            self.synced.push(local_id);
        }
        local_id
    }

    pub fn get(&self, local_id: &LocalId) -> Option<&Record<P>> {
        self.records.get(local_id)
    }

    pub(crate) fn get_mut(&mut self, local_id: &LocalId) -> Option<&mut Record<P>> {
        self.records.get_mut(local_id)
    }

    pub fn contains(&self, local_id: &LocalId) -> bool {
        self.records.contains_key(local_id)
    }

    pub(crate) fn remove(&mut self, local_id: &LocalId) -> Option<Record<P>> {
        let record = self.records.remove(local_id)?;
        self.order.retain(|id| id != local_id);
        self.synced.retain(|id| id != local_id);
        Some(record)
    }

    /// Apply a successful submission and file the record as synced.
    pub(crate) fn reconcile(
        &mut self,
        local_id: &LocalId,
        accepted: Accepted,
    ) -> Result<&mut Record<P>> {
        let record = self
            .records
            .get_mut(local_id)
            .ok_or_else(|| Error::NotFound(local_id.to_string()))?;
        record.reconcile(accepted.server_id, &accepted.fields);
        if !self.synced.contains(local_id) {
            self.synced.push(*local_id);
        }
        self.records
            .get_mut(local_id)
            .ok_or_else(|| Error::NotFound(local_id.to_string()))
    }

    /// All records in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Record<P>> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Synced records in reconciliation order
    pub fn synced(&self) -> impl Iterator<Item = &Record<P>> {
        self.synced.iter().filter_map(|id| self.records.get(id))
    }

    pub fn synced_ids(&self) -> &[LocalId] {
        &self.synced
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendanceSheet, RecordStatus, ServerId};
    use chrono::NaiveDate;

    fn record() -> Record<AttendanceSheet> {
        Record::new(AttendanceSheet::new(
            "class-1",
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ))
    }

    #[test]
    fn reconcile_appends_to_synced_once() {
        let mut set = RecordSet::default();
        let id = set.insert(record());

        set.reconcile(&id, Accepted::new(ServerId::new("srv-1").unwrap()))
            .unwrap();
        set.reconcile(&id, Accepted::new(ServerId::new("srv-1").unwrap()))
            .unwrap();

        assert_eq!(set.synced_ids(), &[id]);
        assert_eq!(set.get(&id).unwrap().status(), RecordStatus::Synced);
    }

    #[test]
    fn reconcile_missing_record_is_not_found() {
        let mut set = RecordSet::<AttendanceSheet>::default();
        let result = set.reconcile(
            &LocalId::new(),
            Accepted::new(ServerId::new("srv-1").unwrap()),
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn remove_clears_every_index() {
        let mut set = RecordSet::default();
        let id = set.insert(record());
        set.reconcile(&id, Accepted::new(ServerId::new("srv-1").unwrap()))
            .unwrap();

        assert!(set.remove(&id).is_some());
        assert!(set.is_empty());
        assert!(set.synced_ids().is_empty());
        assert_eq!(set.iter().count(), 0);
    }

    #[test]
    fn from_records_restores_synced_order() {
        let mut first = record();
        let mut second = record();
        first.reconcile(ServerId::new("srv-1").unwrap(), &serde_json::Map::new());
        second.reconcile(ServerId::new("srv-2").unwrap(), &serde_json::Map::new());
        let (first_id, second_id) = (first.local_id, second.local_id);
        let draft = record();

        let set = RecordSet::from_records(vec![first, second, draft], vec![second_id]);

        assert_eq!(set.len(), 3);
        assert_eq!(set.synced_ids(), &[second_id, first_id]);
    }
}
