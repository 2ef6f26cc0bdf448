use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::models::{CacheEntry, MealPlanDay, ViewingSlot};

pub const DEFAULT_WINDOW_SIZE: usize = 7;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Window size must be odd and at least 3 (got {0})")]
    InvalidWindowSize(usize),

    #[error("Viewing window needs exactly {expected} slots, got {got}")]
    WindowLength { expected: usize, got: usize },

    #[error("{0} is not in the viewing window")]
    DateNotInWindow(NaiveDate),
}

/// Map any signed index onto `0..len`.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn wrap_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    (((index % len) + len) % len) as usize
}

/// Session-wide plan state: an unbounded cache of loaded days keyed by date
/// and a fixed ring of viewing slots.
#[derive(Debug)]
pub struct PlanCacheStore {
    cache: HashMap<NaiveDate, Option<MealPlanDay>>,
    viewing: Vec<ViewingSlot>,
}

pub type SharedStore = Arc<Mutex<PlanCacheStore>>;

/// Lock the shared store, recovering from a poisoned lock.
pub fn lock(store: &SharedStore) -> MutexGuard<'_, PlanCacheStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PlanCacheStore {
    /// Build a store whose window holds loading placeholders for the
    /// consecutive dates centered on `center`, with `center` at index
    /// `window_size / 2`.
    pub fn new(window_size: usize, center: NaiveDate) -> Result<Self, StoreError> {
        if window_size < 3 || window_size % 2 == 0 {
            return Err(StoreError::InvalidWindowSize(window_size));
        }
        let half = window_size / 2;
        let viewing = (0..window_size)
            .map(|i| {
                #[allow(clippy::cast_possible_wrap)]
                let offset = i as i64 - half as i64;
                ViewingSlot::placeholder(center + Duration::days(offset))
            })
            .collect();
        Ok(Self {
            cache: HashMap::new(),
            viewing,
        })
    }

    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    #[must_use]
    pub fn window_size(&self) -> usize {
        self.viewing.len()
    }

    #[must_use]
    pub fn viewing(&self) -> &[ViewingSlot] {
        &self.viewing
    }

    #[must_use]
    pub fn slot(&self, index: isize) -> &ViewingSlot {
        &self.viewing[wrap_index(index, self.viewing.len())]
    }

    #[must_use]
    pub fn position_of(&self, date: NaiveDate) -> Option<usize> {
        self.viewing.iter().position(|s| s.date() == date)
    }

    /// `None` when the date was never cached, `Some(None)` when it is known
    /// to have no day yet.
    #[must_use]
    pub fn cached(&self, date: NaiveDate) -> Option<Option<&MealPlanDay>> {
        self.cache.get(&date).map(Option::as_ref)
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Most recent local copy of a day: the viewing slot if the date is on
    /// screen and loaded, otherwise the cache.
    #[must_use]
    pub fn latest(&self, date: NaiveDate) -> Option<MealPlanDay> {
        self.position_of(date)
            .and_then(|i| self.viewing[i].entry.day.clone())
            .or_else(|| self.cache.get(&date).cloned().flatten())
    }

    /// Replace the whole window. Used on mount and explicit range refetches.
    pub fn set_viewing_window(&mut self, slots: Vec<ViewingSlot>) -> Result<(), StoreError> {
        if slots.len() != self.viewing.len() {
            return Err(StoreError::WindowLength {
                expected: self.viewing.len(),
                got: slots.len(),
            });
        }
        self.viewing = slots;
        Ok(())
    }

    pub fn update_viewing_at(&mut self, index: isize, slot: ViewingSlot) {
        let i = wrap_index(index, self.viewing.len());
        self.viewing[i] = slot;
    }

    /// Replace the slot showing `entry.date`. The window may have scrolled
    /// past the date, in which case nothing is written.
    pub fn update_viewing_by_date(&mut self, entry: CacheEntry) -> Result<usize, StoreError> {
        let Some(i) = self.position_of(entry.date) else {
            return Err(StoreError::DateNotInWindow(entry.date));
        };
        self.viewing[i] = ViewingSlot::ready(entry);
        Ok(i)
    }

    /// Overwrite cache entries date by date. A day is always replaced whole.
    pub fn merge_into_cache<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = CacheEntry>,
    {
        for entry in entries {
            self.cache.insert(entry.date, entry.day);
        }
    }

    /// Write a locally mutated or freshly fetched day into the cache and, if
    /// it is on screen, into its viewing slot. Returns whether a viewing
    /// slot was updated.
    pub fn write_day(&mut self, day: MealPlanDay) -> bool {
        let entry = CacheEntry::loaded(day);
        self.merge_into_cache([entry.clone()]);
        self.update_viewing_by_date(entry).is_ok()
    }
}
