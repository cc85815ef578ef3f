//! Synchronous state of one menu: the extracted items, the extraction status, and
//! for every item index two independent action slots (web search, generation).
//!
//! Everything here is plain data mutated through `&mut self`; the async owner in
//! [`crate::controller`] serializes access and performs the remote calls between
//! [`MenuSession::begin_action`] and [`MenuSession::complete_action`].
//!
//! Two counters keep late responses out:
//! * the table *generation* advances on every [`MenuSession::reset`], so nothing
//!   started against an earlier item list can land on the current one;
//! * every action start takes a fresh sequence number and the slot remembers the
//!   latest one, so when two requests for the same slot overlap only the one
//!   started last is applied, whatever order the responses arrive in.
use std::collections::HashMap;

use shared::domain::{ActionKind, MenuItem};

use crate::error::ServiceError;

pub type Generation = u64;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ActionState {
    #[default]
    Idle,
    Pending,
    Resolved { url: String },
    Failed { message: String },
}

impl ActionState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionState::Pending)
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ActionState::Resolved { url } => Some(url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ActionState::Failed { message } => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    state: ActionState,
    latest: u64,
}

#[derive(Debug, Clone, Default)]
struct ItemActions {
    search: Slot,
    generate: Slot,
}

impl ItemActions {
    fn slot(&self, kind: ActionKind) -> &Slot {
        match kind {
            ActionKind::Search => &self.search,
            ActionKind::Generate => &self.generate,
        }
    }

    fn slot_mut(&mut self, kind: ActionKind) -> &mut Slot {
        match kind {
            ActionKind::Search => &mut self.search,
            ActionKind::Generate => &mut self.generate,
        }
    }
}

/// Issued when an action starts; handed back with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTicket {
    pub generation: Generation,
    pub index: usize,
    pub kind: ActionKind,
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionTicket {
    seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// The result belonged to a superseded start and was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtractionStatus {
    #[default]
    Idle,
    InProgress,
    Ready {
        count: usize,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemView {
    pub index: usize,
    pub item: MenuItem,
    pub search: ActionState,
    pub generate: ActionState,
}

impl ItemView {
    pub fn state(&self, kind: ActionKind) -> &ActionState {
        match kind {
            ActionKind::Search => &self.search,
            ActionKind::Generate => &self.generate,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.search.is_pending() || self.generate.is_pending()
    }
}

/// Everything a presentation layer needs to draw the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub generation: Generation,
    pub extraction: ExtractionStatus,
    pub items: Vec<ItemView>,
}

#[derive(Debug, Default)]
pub struct MenuSession {
    items: Vec<MenuItem>,
    actions: HashMap<usize, ItemActions>,
    generation: Generation,
    next_action_seq: u64,
    extraction_seq: u64,
    extraction: ExtractionStatus,
}

impl MenuSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn extraction(&self) -> &ExtractionStatus {
        &self.extraction
    }

    /// Clears the item list, every action slot and the last error, and marks an
    /// extraction as running. A running extraction is superseded: its result will
    /// come back as [`Completion::Stale`].
    pub fn begin_extraction(&mut self) -> ExtractionTicket {
        self.items.clear();
        self.reset();
        self.extraction_seq += 1;
        self.extraction = ExtractionStatus::InProgress;
        ExtractionTicket {
            seq: self.extraction_seq,
        }
    }

    pub fn finish_extraction(
        &mut self,
        ticket: ExtractionTicket,
        result: Result<Vec<MenuItem>, ServiceError>,
    ) -> Completion {
        if ticket.seq != self.extraction_seq || self.extraction != ExtractionStatus::InProgress {
            return Completion::Stale;
        }
        match result {
            Ok(items) => {
                self.extraction = ExtractionStatus::Ready { count: items.len() };
                self.items = items;
            }
            Err(err) => {
                self.extraction = ExtractionStatus::Failed {
                    message: err.message(),
                };
            }
        }
        Completion::Applied
    }

    /// Marks the slot pending and returns the ticket plus the item to build the request
    /// from. `None` when `generation` is out of date or `index` is out of range.
    ///
    /// A slot that is already pending is restarted; the earlier request becomes stale.
    pub fn begin_action(
        &mut self,
        generation: Generation,
        index: usize,
        kind: ActionKind,
    ) -> Option<(ActionTicket, MenuItem)> {
        if generation != self.generation {
            return None;
        }
        let item = self.items.get(index)?.clone();

        self.next_action_seq += 1;
        let seq = self.next_action_seq;
        let slot = self.actions.entry(index).or_default().slot_mut(kind);
        slot.latest = seq;
        slot.state = ActionState::Pending;

        Some((
            ActionTicket {
                generation,
                index,
                kind,
                seq,
            },
            item,
        ))
    }

    pub fn complete_action(
        &mut self,
        ticket: ActionTicket,
        result: Result<String, ServiceError>,
    ) -> Completion {
        if ticket.generation != self.generation {
            return Completion::Stale;
        }
        let Some(actions) = self.actions.get_mut(&ticket.index) else {
            return Completion::Stale;
        };
        let slot = actions.slot_mut(ticket.kind);
        if slot.latest != ticket.seq {
            return Completion::Stale;
        }

        slot.state = match result {
            Ok(url) => ActionState::Resolved { url },
            Err(err) => ActionState::Failed {
                message: err.message(),
            },
        };
        Completion::Applied
    }

    pub fn get(&self, index: usize, kind: ActionKind) -> ActionState {
        self.actions
            .get(&index)
            .map(|actions| actions.slot(kind).state.clone())
            .unwrap_or_default()
    }

    /// Drops every action slot and advances the generation.
    pub fn reset(&mut self) {
        self.actions.clear();
        self.generation += 1;
    }

    pub fn view(&self) -> MenuView {
        MenuView {
            generation: self.generation,
            extraction: self.extraction.clone(),
            items: self
                .items
                .iter()
                .enumerate()
                .map(|(index, item)| ItemView {
                    index,
                    item: item.clone(),
                    search: self.get(index, ActionKind::Search),
                    generate: self.get(index, ActionKind::Generate),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
