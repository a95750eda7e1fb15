use std::collections::{BTreeMap, BTreeSet};

use questlog_storage::EntityRef;

pub type Ticket = u64;

/// A write batch handed to the writer and not yet acknowledged.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub ticket: Ticket,
    pub op: &'static str,
    pub entities: Vec<EntityRef>,
}

/// Bookkeeping for optimistic writes: what is in flight, what must be
/// re-fetched, and what is known not to be saved.
///
/// Only the latest local value of an entity is kept (in the game state
/// itself); this just tracks which entities may diverge from the store.
#[derive(Debug, Default)]
pub struct PendingWrites {
    next_ticket: Ticket,
    in_flight: BTreeMap<Ticket, InFlight>,
    needs_reload: BTreeSet<EntityRef>,
    /// Entities whose write failed and whose authoritative value has not
    /// been reloaded yet.
    unsaved: BTreeSet<EntityRef>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, op: &'static str, entities: Vec<EntityRef>) -> Ticket {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.in_flight.insert(
            ticket,
            InFlight {
                ticket,
                op,
                entities,
            },
        );
        ticket
    }

    /// The store acknowledged the batch.
    pub fn complete(&mut self, ticket: Ticket) -> Option<InFlight> {
        self.in_flight.remove(&ticket)
    }

    /// The batch did not land; its entities must be re-fetched.
    pub fn fail(&mut self, ticket: Ticket) -> Option<InFlight> {
        let in_flight = self.in_flight.remove(&ticket)?;
        for entity in &in_flight.entities {
            self.needs_reload.insert(entity.clone());
            self.unsaved.insert(entity.clone());
        }
        Some(in_flight)
    }

    pub fn fail_all(&mut self) -> Vec<InFlight> {
        let tickets: Vec<Ticket> = self.in_flight.keys().copied().collect();
        tickets.into_iter().filter_map(|t| self.fail(t)).collect()
    }

    pub fn mark_for_reload(&mut self, entity: EntityRef) {
        self.needs_reload.insert(entity);
    }

    /// True when an in-flight write will overwrite `entity` at the store.
    pub fn covers(&self, entity: &EntityRef) -> bool {
        if matches!(entity, EntityRef::Account) {
            return !self.in_flight.is_empty();
        }
        self.in_flight.values().any(|w| {
            w.entities
                .iter()
                .any(|e| e == entity || matches!(e, EntityRef::Account))
        })
    }

    /// Entities due for a reload that no in-flight write still covers. A
    /// pending full reload subsumes everything else.
    pub fn reloadable(&self) -> Vec<EntityRef> {
        if self.needs_reload.contains(&EntityRef::Account) {
            return if self.covers(&EntityRef::Account) {
                Vec::new()
            } else {
                vec![EntityRef::Account]
            };
        }
        self.needs_reload
            .iter()
            .filter(|e| !self.covers(e))
            .cloned()
            .collect()
    }

    pub fn reloaded(&mut self, entity: &EntityRef) {
        if matches!(entity, EntityRef::Account) {
            self.needs_reload.clear();
            self.unsaved.clear();
            return;
        }
        self.needs_reload.remove(entity);
        self.unsaved.remove(entity);
    }

    pub fn is_unsaved(&self, entity: &EntityRef) -> bool {
        self.unsaved.contains(entity)
    }

    pub fn unsaved(&self) -> impl Iterator<Item = &EntityRef> {
        self.unsaved.iter()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn awaiting_reload(&self) -> usize {
        self.needs_reload.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty() && self.needs_reload.is_empty()
    }
}
