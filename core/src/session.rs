use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::MealPlanApi;
use crate::cache::{SharedStore, lock};
use crate::day_ops;
use crate::drag::MoveDescriptor;
use crate::error::{Reporter, SyncError};
use crate::models::{MealItem, MealPlanDay, MealSlot, PantryItem, to_dto};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistStatus {
    Pending,
    Confirmed,
    /// The last persist failed; local state is ahead of the backend.
    Diverged,
}

/// Latest persist outcome per date. Each persist gets a generation so a
/// slow, superseded request cannot overwrite the status of a newer one.
#[derive(Debug, Default)]
struct Ledger {
    generation: u64,
    dates: HashMap<NaiveDate, (u64, PersistStatus)>,
}

impl Ledger {
    fn begin(&mut self, date: NaiveDate) -> u64 {
        self.generation += 1;
        self.dates
            .insert(date, (self.generation, PersistStatus::Pending));
        self.generation
    }

    fn settle(&mut self, date: NaiveDate, generation: u64, status: PersistStatus) {
        match self.dates.get_mut(&date) {
            Some(entry) if entry.0 == generation => entry.1 = status,
            _ => debug!(%date, generation, "persist result superseded"),
        }
    }
}

/// Edits are written to the store right away and persisted in the
/// background. A failed persist is recorded in the ledger; the local edit
/// is never rolled back.
#[derive(Clone)]
pub struct PlanSession {
    store: SharedStore,
    api: Arc<dyn MealPlanApi>,
    reporter: Reporter,
    auto_deduct: bool,
    ledger: Arc<Mutex<Ledger>>,
}

impl PlanSession {
    /// With `auto_deduct`, marking an item eaten also consumes it from the
    /// pantry.
    pub fn new(
        store: SharedStore,
        api: Arc<dyn MealPlanApi>,
        reporter: Reporter,
        auto_deduct: bool,
    ) -> Self {
        Self {
            store,
            api,
            reporter,
            auto_deduct,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn status(&self, date: NaiveDate) -> Option<PersistStatus> {
        self.ledger().dates.get(&date).map(|(_, s)| *s)
    }

    /// Dates whose local copy the backend has not accepted.
    #[must_use]
    pub fn diverged_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .ledger()
            .dates
            .iter()
            .filter(|(_, (_, s))| *s == PersistStatus::Diverged)
            .map(|(d, _)| *d)
            .collect();
        dates.sort_unstable();
        dates
    }

    /// Run `op` on the latest copy of `date` (a virtual empty day if there
    /// is none) and write the result to the store. `None` when `op` changed
    /// nothing.
    fn commit<F>(&self, date: NaiveDate, op: F) -> Option<MealPlanDay>
    where
        F: for<'a> FnOnce(&'a MealPlanDay) -> Cow<'a, MealPlanDay>,
    {
        let mut store = lock(&self.store);
        let current = store
            .latest(date)
            .unwrap_or_else(|| MealPlanDay::virtual_empty(date));
        let Cow::Owned(next) = op(&current) else {
            debug!(%date, "edit was a no-op, nothing to persist");
            return None;
        };
        store.write_day(next.clone());
        Some(next)
    }

    /// Apply an edit optimistically and persist the resulting day. Returns
    /// the spawned background tasks; empty when the edit was a no-op.
    pub fn apply<F>(&self, date: NaiveDate, op: F) -> Vec<JoinHandle<()>>
    where
        F: for<'a> FnOnce(&'a MealPlanDay) -> Cow<'a, MealPlanDay>,
    {
        self.commit(date, op)
            .map(|day| self.persist(day))
            .into_iter()
            .collect()
    }

    fn persist(&self, day: MealPlanDay) -> JoinHandle<()> {
        let date = day.date;
        let generation = self.ledger().begin(date);
        let dto = to_dto(&day);
        let session = self.clone();
        tokio::spawn(async move {
            match session.api.persist_day(&dto).await {
                Ok(ack) => {
                    session
                        .ledger()
                        .settle(date, generation, PersistStatus::Confirmed);
                    if let Some(id) = ack.id {
                        session.adopt_id(date, id);
                    }
                    info!(%date, "meal plan saved");
                }
                Err(e) => {
                    session
                        .ledger()
                        .settle(date, generation, PersistStatus::Diverged);
                    session.reporter.report(SyncError::Persist {
                        date,
                        reason: format!("{e:#}"),
                    });
                }
            }
        })
    }

    /// Record the backend id of a day that was created locally.
    fn adopt_id(&self, date: NaiveDate, id: String) {
        let mut store = lock(&self.store);
        if let Some(mut day) = store.latest(date)
            && day.id.is_none()
        {
            debug!(%date, %id, "adopting backend id");
            day.id = Some(id);
            store.write_day(day);
        }
    }

    fn consume(&self, date: NaiveDate, items: Vec<PantryItem>) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            match session.api.consume_pantry_items(&items).await {
                Ok(_) => info!(%date, count = items.len(), "pantry updated"),
                Err(e) => session.reporter.report(SyncError::PantryConsume {
                    date,
                    reason: format!("{e:#}"),
                }),
            }
        })
    }

    pub fn add_item(
        &self,
        date: NaiveDate,
        slot: MealSlot,
        item: MealItem,
        at_index: Option<usize>,
    ) -> Vec<JoinHandle<()>> {
        self.apply(date, |d| {
            Cow::Owned(day_ops::add_item(Some(d), date, slot, item, at_index))
        })
    }

    pub fn remove_item(&self, date: NaiveDate, slot: MealSlot, index: usize) -> Vec<JoinHandle<()>> {
        self.apply(date, |d| day_ops::remove_item(d, slot, index))
    }

    pub fn change_amount(
        &self,
        date: NaiveDate,
        slot: MealSlot,
        item_id: &str,
        amount: f64,
        unit_index: usize,
    ) -> Vec<JoinHandle<()>> {
        self.apply(date, |d| {
            day_ops::change_amount(d, slot, item_id, amount, unit_index)
        })
    }

    pub fn duplicate_item(
        &self,
        date: NaiveDate,
        slot: MealSlot,
        index: usize,
    ) -> Vec<JoinHandle<()>> {
        self.apply(date, |d| day_ops::duplicate_item(d, slot, index))
    }

    pub fn clear_slot(&self, date: NaiveDate, slot: MealSlot) -> Vec<JoinHandle<()>> {
        self.apply(date, |d| day_ops::clear_slot(d, slot))
    }

    pub fn clear_day(&self, date: NaiveDate) -> Vec<JoinHandle<()>> {
        self.apply(date, day_ops::clear_day)
    }

    /// Set the eaten flag. With auto-deduct on, marking eaten also consumes
    /// the item from the pantry; that call fails independently of the
    /// persist and never touches the flag.
    pub fn toggle_eaten(
        &self,
        date: NaiveDate,
        slot: MealSlot,
        item_id: &str,
        eaten: bool,
    ) -> Vec<JoinHandle<()>> {
        let Some(day) = self.commit(date, |d| day_ops::toggle_eaten(d, slot, item_id, eaten))
        else {
            return Vec::new();
        };
        let consumed = (eaten && self.auto_deduct)
            .then(|| day.position_of(slot, item_id))
            .flatten()
            .map(|pos| PantryItem::from_meal_item(&day.slots.get(slot)[pos]));

        let mut tasks = vec![self.persist(day)];
        if let Some(item) = consumed {
            tasks.push(self.consume(date, vec![item]));
        }
        tasks
    }

    /// Apply a finished drag. Moves across days remove from the source day
    /// and insert into the destination day, persisting both.
    pub fn apply_move(&self, mv: &MoveDescriptor) -> Vec<JoinHandle<()>> {
        if mv.same_day {
            return self.apply(mv.source_date, |d| {
                day_ops::move_item(
                    d,
                    mv.source_slot,
                    mv.source_index,
                    mv.dest_slot,
                    mv.dest_index,
                )
            });
        }

        let (source, dest) = {
            let mut store = lock(&self.store);
            let current = store
                .latest(mv.source_date)
                .unwrap_or_else(|| MealPlanDay::virtual_empty(mv.source_date));
            let Some((source, item)) =
                day_ops::take_item(&current, mv.source_slot, mv.source_index)
            else {
                return Vec::new();
            };
            let dest = day_ops::add_item(
                store.latest(mv.dest_date).as_ref(),
                mv.dest_date,
                mv.dest_slot,
                item.with_fresh_id(),
                Some(mv.dest_index),
            );
            store.write_day(source.clone());
            store.write_day(dest.clone());
            (source, dest)
        };
        vec![self.persist(source), self.persist(dest)]
    }
}

/// Wait for background tasks spawned by an edit.
pub async fn settle(tasks: Vec<JoinHandle<()>>) {
    for task in tasks {
        if let Err(e) = task.await {
            debug!("background task ended abnormally: {e}");
        }
    }
}
