use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, NaiveDate};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::MealPlanApi;
use crate::cache::{SharedStore, lock, wrap_index};
use crate::error::{Reporter, SyncError, WindowError};
use crate::models::{CacheEntry, ViewingSlot};

/// Signed distance from `center` to `index` on a ring of `len` slots, in
/// `-(len / 2)..=len / 2`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn signed_offset(index: usize, center: usize, len: usize) -> i64 {
    let d = wrap_index(index as isize - center as isize, len) as i64;
    let half = (len / 2) as i64;
    if d > half { d - len as i64 } else { d }
}

/// Everything a background fetch needs to land its result.
#[derive(Clone)]
struct Loader {
    store: SharedStore,
    api: Arc<dyn MealPlanApi>,
    user_id: Arc<str>,
    reporter: Reporter,
    mounted: Arc<AtomicBool>,
}

impl Loader {
    /// Fetch `from..=to` and fill cache and window in one pass. Dates the
    /// backend does not return are recorded as known-empty. On failure
    /// nothing is written, so every slot keeps its loading placeholder.
    async fn load_range(&self, from: NaiveDate, to: NaiveDate) -> Result<(), SyncError> {
        let days = match self.api.fetch_day_range(from, to, &self.user_id).await {
            Ok(days) => days,
            Err(e) => {
                let err = SyncError::FetchRange {
                    from,
                    to,
                    reason: format!("{e:#}"),
                };
                self.reporter.report(err.clone());
                return Err(err);
            }
        };

        let mut by_date: HashMap<NaiveDate, _> = days.into_iter().map(|d| (d.date, d)).collect();
        let entries: Vec<CacheEntry> = from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| CacheEntry {
                date,
                day: by_date.remove(&date),
            })
            .collect();

        let mut store = lock(&self.store);
        store.merge_into_cache(entries.iter().cloned());
        for entry in entries {
            let date = entry.date;
            if store.update_viewing_by_date(entry).is_err() {
                debug!(%date, "range result scrolled out of the window");
            }
        }
        drop(store);

        self.mounted.store(true, Ordering::SeqCst);
        info!(%from, %to, "meal plan window loaded");
        Ok(())
    }

    /// Fetch one day. The cache is always written; the viewing slot only if
    /// the date is still on screen.
    async fn load_day(&self, date: NaiveDate) -> Result<(), SyncError> {
        let day = match self.api.fetch_single_day(date, &self.user_id).await {
            Ok(day) => day,
            Err(e) => {
                let err = SyncError::FetchDay {
                    date,
                    reason: format!("{e:#}"),
                };
                self.reporter.report(err.clone());
                return Err(err);
            }
        };

        let entry = CacheEntry { date, day };
        let mut store = lock(&self.store);
        store.merge_into_cache([entry.clone()]);
        if store.update_viewing_by_date(entry).is_err() {
            debug!(%date, "prefetched day scrolled out of the window");
        }
        Ok(())
    }
}

/// Ring of `W` viewing slots. Each step recycles the slot at the far edge
/// for the next calendar day, filled from the cache or fetched.
pub struct SlidingWindowController {
    loader: Loader,
    current: usize,
}

impl SlidingWindowController {
    /// The controller starts on the store's center slide.
    pub fn new(
        store: SharedStore,
        api: Arc<dyn MealPlanApi>,
        user_id: &str,
        reporter: Reporter,
    ) -> Self {
        let current = lock(&store).window_size() / 2;
        Self {
            loader: Loader {
                store,
                api,
                user_id: Arc::from(user_id),
                reporter,
                mounted: Arc::new(AtomicBool::new(false)),
            },
            current,
        }
    }

    #[must_use]
    pub fn window_size(&self) -> usize {
        lock(&self.loader.store).window_size()
    }

    /// Slots kept on either side of the current slide.
    #[must_use]
    pub fn adjust_distance(&self) -> usize {
        self.window_size() / 2
    }

    #[must_use]
    pub fn current(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.loader.mounted.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn selected_date(&self) -> NaiveDate {
        lock(&self.loader.store).viewing()[self.current].date()
    }

    fn window_span(&self, center: NaiveDate) -> (NaiveDate, NaiveDate) {
        #[allow(clippy::cast_possible_wrap)]
        let ad = Duration::days(self.adjust_distance() as i64);
        (center - ad, center + ad)
    }

    /// Initial load: lay out placeholders for `selected ± ADJUST_DISTANCE`
    /// around the current slide, then fill them with one range fetch.
    pub async fn mount(&mut self, selected: NaiveDate) -> Result<(), SyncError> {
        {
            let mut store = lock(&self.loader.store);
            let len = store.window_size();
            let slots = (0..len)
                .map(|i| {
                    let offset = signed_offset(i, self.current, len);
                    ViewingSlot::placeholder(selected + Duration::days(offset))
                })
                .collect();
            if let Err(e) = store.set_viewing_window(slots) {
                debug!("{e}");
            }
        }
        let (from, to) = self.window_span(selected);
        self.loader.load_range(from, to).await
    }

    /// Synchronous part of a navigation step: move to slide `next`, recycle
    /// the edge slot in the direction of travel, and return its date if it
    /// still needs fetching.
    pub fn advance(&mut self, next: usize) -> Result<Option<NaiveDate>, WindowError> {
        let len = self.window_size();
        if next >= len {
            return Err(WindowError::SlideOutOfRange(next));
        }
        if next == self.current {
            return Ok(None);
        }
        let forward = (self.current + 1) % len == next;
        let backward = (next + 1) % len == self.current;
        if !forward && !backward {
            return Err(WindowError::NotAdjacent {
                current: self.current,
                next,
            });
        }

        #[allow(clippy::cast_possible_wrap)]
        let (dir, ad, next_i) = (
            if forward { 1_isize } else { -1 },
            (len / 2) as isize,
            next as isize,
        );
        let edge = next_i + dir * ad;
        let inner = next_i + dir * (ad - 1);

        let mut store = lock(&self.loader.store);
        let date = store.slot(inner).date() + Duration::days(dir as i64);
        let slot = match store.cached(date) {
            Some(day) => ViewingSlot::ready(CacheEntry {
                date,
                day: day.cloned(),
            }),
            None => ViewingSlot::placeholder(date),
        };
        let loading = slot.loading;
        store.update_viewing_at(edge, slot);
        drop(store);

        self.current = next;
        debug!(slide = next, forward, %date, loading, "window advanced");
        Ok(loading.then_some(date))
    }

    /// Fetch a single day into the cache and, if still visible, the window.
    pub async fn prefetch(&self, date: NaiveDate) -> Result<(), SyncError> {
        self.loader.load_day(date).await
    }

    /// Full navigation step. Fetches run in the background so the next step
    /// can be taken before they resolve. An unmounted controller (failed
    /// initial load) retries the whole range around the new slide instead.
    pub fn navigate(
        &mut self,
        next: usize,
    ) -> Result<Option<JoinHandle<Result<(), SyncError>>>, WindowError> {
        let prefetch = self.advance(next)?;
        let loader = self.loader.clone();

        if !self.is_mounted() {
            let (from, to) = self.window_span(self.selected_date());
            return Ok(Some(tokio::spawn(
                async move { loader.load_range(from, to).await },
            )));
        }

        Ok(prefetch.map(|date| tokio::spawn(async move { loader.load_day(date).await })))
    }
}
