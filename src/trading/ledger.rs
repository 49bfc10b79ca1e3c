//! Seen-fill ledger.
//!
//! Fills are fetched with an overlapping lookback window, so the same fill
//! id arrives on several consecutive ticks. The ledger is the only thing
//! standing between that overlap and duplicate orders: a fill id that is
//! already recorded for a trader produces no intents.

use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
struct TraderLedger {
    seen: HashSet<u64>,
    /// Insertion order, oldest first. Drives eviction and persistence.
    order: VecDeque<u64>,
}

/// Bounded per-trader record of processed fill ids.
#[derive(Debug)]
pub struct SeenFillLedger {
    cap: usize,
    traders: HashMap<String, TraderLedger>,
}

impl SeenFillLedger {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            traders: HashMap::new(),
        }
    }

    pub fn has_seen(&self, trader: &str, fill_id: u64) -> bool {
        self.traders
            .get(trader)
            .map(|t| t.seen.contains(&fill_id))
            .unwrap_or(false)
    }

    /// Record a fill id. Returns true if it was newly inserted, false if it
    /// was already present. The cap is enforced here, so the ledger never
    /// holds more than `cap` ids between explicit trims either.
    pub fn mark_seen(&mut self, trader: &str, fill_id: u64) -> bool {
        let entry = self.traders.entry(trader.to_string()).or_default();
        if !entry.seen.insert(fill_id) {
            return false;
        }
        entry.order.push_back(fill_id);
        if entry.order.len() > self.cap {
            Self::evict_to(entry, self.cap / 2);
        }
        true
    }

    /// Mark a batch of ids seen without caring whether they were new.
    /// Used when initializing a trader from the lookback window.
    pub fn mark_all(&mut self, trader: &str, fill_ids: impl IntoIterator<Item = u64>) {
        for id in fill_ids {
            self.mark_seen(trader, id);
        }
    }

    /// If a trader's ledger exceeds `max`, drop the oldest entries down to
    /// half of `max`, keeping the most recent.
    pub fn trim(&mut self, trader: &str, max: usize) {
        if let Some(entry) = self.traders.get_mut(trader) {
            if entry.order.len() > max {
                Self::evict_to(entry, max / 2);
            }
        }
    }

    fn evict_to(entry: &mut TraderLedger, keep: usize) {
        while entry.order.len() > keep {
            if let Some(old) = entry.order.pop_front() {
                entry.seen.remove(&old);
            }
        }
    }

    pub fn len(&self, trader: &str) -> usize {
        self.traders.get(trader).map(|t| t.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, trader: &str) -> bool {
        self.len(trader) == 0
    }

    /// Ids for a trader in insertion order, oldest first. Used to persist
    /// the ledger across restarts.
    pub fn ids(&self, trader: &str) -> Vec<u64> {
        self.traders
            .get(trader)
            .map(|t| t.order.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rebuild a trader's ledger from persisted ids, oldest first.
    pub fn restore(&mut self, trader: &str, ids: impl IntoIterator<Item = u64>) {
        self.traders.remove(trader);
        self.mark_all(trader, ids);
    }
}
