use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::event::StatusEvent;
use crate::models::order::Order;

#[derive(Debug, Clone)]
pub struct OrderRecord {
    pub order: Order,
    pub assignments: Vec<Assignment>,
    pub events: Vec<StatusEvent>,
}

impl OrderRecord {
    fn new(order: Order) -> Self {
        Self {
            order,
            assignments: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn bound_assignment(&self) -> Option<&Assignment> {
        self.assignments.iter().rev().find(|a| !a.is_released())
    }

    pub fn bound_assignment_mut(&mut self) -> Option<&mut Assignment> {
        self.assignments.iter_mut().rev().find(|a| !a.is_released())
    }

    pub fn active_assignment(&self) -> Option<&Assignment> {
        if self.order.status.is_terminal() {
            return None;
        }
        self.bound_assignment()
    }

    pub fn next_event_seq(&self) -> u64 {
        self.events.len() as u64 + 1
    }
}

#[derive(Debug)]
pub enum Write<T> {
    Changed(T),
    Unchanged(T),
}

impl<T> Write<T> {
    pub fn into_inner(self) -> T {
        match self {
            Write::Changed(out) | Write::Unchanged(out) => out,
        }
    }
}

#[derive(Default)]
pub struct OrderStore {
    records: DashMap<Uuid, OrderRecord>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) -> Result<(), AppError> {
        match self.records.entry(order.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AppError::Conflict(format!("order {} already exists", order.id)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(OrderRecord::new(order));
                Ok(())
            }
        }
    }

    pub fn snapshot(&self, order_id: Uuid) -> Result<OrderRecord, AppError> {
        self.records
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
    }

    /// Applies `mutate` to a draft of the record under the entry's write lock.
    ///
    /// With `expected_version`, the commit fails with `ConcurrentModification` if
    /// another writer got there first. The stored version is bumped on success and
    /// the committed record is returned next to the closure's output.
    pub fn commit<T, F>(
        &self,
        order_id: Uuid,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<(T, OrderRecord), AppError>
    where
        F: FnOnce(&mut OrderRecord) -> Result<T, AppError>,
    {
        let (write, record) = self.write(order_id, expected_version, |record| {
            mutate(record).map(Write::Changed)
        })?;
        Ok((write.into_inner(), record))
    }

    /// Like [`OrderStore::commit`], but the closure may decide under the lock that
    /// nothing needs writing. `Write::Unchanged` keeps the stored record and version.
    pub fn commit_or_keep<T, F>(
        &self,
        order_id: Uuid,
        mutate: F,
    ) -> Result<(Write<T>, OrderRecord), AppError>
    where
        F: FnOnce(&mut OrderRecord) -> Result<Write<T>, AppError>,
    {
        self.write(order_id, None, mutate)
    }

    fn write<T, F>(
        &self,
        order_id: Uuid,
        expected_version: Option<u64>,
        mutate: F,
    ) -> Result<(Write<T>, OrderRecord), AppError>
    where
        F: FnOnce(&mut OrderRecord) -> Result<Write<T>, AppError>,
    {
        let mut entry = self
            .records
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        let actual = entry.order.version;
        match expected_version {
            Some(expected) if expected != actual => {
                return Err(AppError::ConcurrentModification {
                    order_id,
                    expected,
                    actual,
                });
            }
            _ => {}
        }

        let mut draft = entry.value().clone();
        let out = mutate(&mut draft)?;
        if let Write::Unchanged(_) = out {
            return Ok((out, entry.value().clone()));
        }

        draft.order.version = actual + 1;
        *entry.value_mut() = draft.clone();
        Ok((out, draft))
    }

    pub fn scan<F>(&self, predicate: F) -> Vec<OrderRecord>
    where
        F: Fn(&OrderRecord) -> bool,
    {
        self.records
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn all_assignments(&self) -> Vec<Assignment> {
        self.records
            .iter()
            .flat_map(|entry| entry.value().assignments.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
