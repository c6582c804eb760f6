use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use torrentdeck_rpc::types::{TorrentRecord, TorrentStatus};

use crate::error::DeckError;
use crate::intent::IntentSink;
use crate::models::{Torrent, TorrentId};

/// What a merge did to the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// Aggregate transfer figures across the whole list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferTotals {
    pub rate_download: i64,
    pub rate_upload: i64,
    pub peers_up: i64,
    pub peers_down: i64,
}

/// The live torrent collection, sorted by queue position.
///
/// Handles are created once per id and then updated in place, so an
/// `Arc<Torrent>` taken from the list stays the one the list uses until
/// its id disappears from a snapshot.
#[derive(Debug, Default)]
pub struct TorrentList {
    items: Vec<Arc<Torrent>>,
    intents: IntentSink,
}

impl TorrentList {
    /// New handles are wired to `intents`.
    pub fn new(intents: IntentSink) -> Self {
        Self {
            items: Vec::new(),
            intents,
        }
    }

    /// Reconcile with a complete `torrent-get` snapshot.
    pub fn merge(&mut self, records: &[TorrentRecord]) -> MergeSummary {
        let mut existing: HashMap<TorrentId, Arc<Torrent>> =
            self.items.drain(..).map(|t| (t.id(), t)).collect();
        let mut merged: Vec<Arc<Torrent>> = Vec::with_capacity(records.len());
        let mut seen: HashMap<TorrentId, usize> = HashMap::with_capacity(records.len());
        let mut summary = MergeSummary::default();

        for record in records {
            // A repeated id in one snapshot: last record wins, same handle.
            if let Some(&index) = seen.get(&record.id) {
                merged[index].apply(record);
                continue;
            }

            let torrent = match existing.remove(&record.id) {
                Some(torrent) => {
                    torrent.apply(record);
                    summary.updated += 1;
                    torrent
                }
                None => {
                    summary.added += 1;
                    Arc::new(Torrent::new(record, self.intents.clone()))
                }
            };
            seen.insert(record.id, merged.len());
            merged.push(torrent);
        }

        summary.removed = existing.len();
        merged.sort_by_cached_key(|t| t.queue_position());
        self.items = merged;

        tracing::trace!(
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "torrent list merged"
        );
        summary
    }

    pub fn items(&self) -> &[Arc<Torrent>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: TorrentId) -> Option<&Arc<Torrent>> {
        self.items.iter().find(|t| t.id() == id)
    }

    pub fn ids(&self) -> Vec<TorrentId> {
        self.items.iter().map(|t| t.id()).collect()
    }

    pub fn remove(&mut self, id: TorrentId) -> Option<Arc<Torrent>> {
        let index = self.items.iter().position(|t| t.id() == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Set every torrent's status; returns the ids touched.
    pub fn set_all_status(&self, status: TorrentStatus) -> Vec<TorrentId> {
        self.items
            .iter()
            .map(|t| {
                t.set_status(status);
                t.id()
            })
            .collect()
    }

    /// Renumber queue positions to follow `order`.
    ///
    /// Listed ids come first in the given order; the rest keep their
    /// relative order after them. Positions become `0..len`. Returns the
    /// `(id, position)` pairs that actually changed.
    pub fn reorder(&mut self, order: &[TorrentId]) -> Result<Vec<(TorrentId, i64)>, DeckError> {
        if let Some(unknown) = order.iter().find(|id| self.get(**id).is_none()) {
            return Err(DeckError::Validation(format!("unknown torrent id {unknown}")));
        }

        let mut listed = HashSet::with_capacity(order.len());
        let mut reordered: Vec<Arc<Torrent>> = Vec::with_capacity(self.items.len());
        for id in order {
            if listed.insert(*id) {
                if let Some(torrent) = self.get(*id) {
                    reordered.push(torrent.clone());
                }
            }
        }
        reordered.extend(
            self.items
                .iter()
                .filter(|t| !listed.contains(&t.id()))
                .cloned(),
        );

        let mut changed = Vec::new();
        for (position, torrent) in reordered.iter().enumerate() {
            let position = position as i64;
            if torrent.queue_position() != position {
                torrent.set_queue_position(position);
                changed.push((torrent.id(), position));
            }
        }
        self.items = reordered;
        Ok(changed)
    }

    /// Move one torrent to `index` (clamped to the end of the list).
    pub fn move_to(&mut self, id: TorrentId, index: usize) -> Result<Vec<(TorrentId, i64)>, DeckError> {
        let mut order = self.ids();
        let from = order
            .iter()
            .position(|t| *t == id)
            .ok_or_else(|| DeckError::Validation(format!("unknown torrent id {id}")))?;
        order.remove(from);
        order.insert(index.min(order.len()), id);
        self.reorder(&order)
    }

    pub fn can_start_all(&self) -> bool {
        self.items.iter().any(|t| t.read().is_stopped())
    }

    pub fn can_stop_all(&self) -> bool {
        self.items.iter().any(|t| !t.read().is_stopped())
    }

    pub fn totals(&self) -> TransferTotals {
        self.items.iter().fold(TransferTotals::default(), |mut acc, t| {
            let state = t.read();
            acc.rate_download += state.rate_download;
            acc.rate_upload += state.rate_upload;
            acc.peers_up += state.peers_up;
            acc.peers_down += state.peers_down;
            acc
        })
    }
}
