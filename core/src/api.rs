use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{
    DATE_FORMAT, FoodSnapshot, MealPlanDay, MealPlanDayDto, PantryItem, PersistAck, from_dto,
    validate_day_dto,
};

/// Remote meal plan backend.
///
/// The CLI implements this over REST with reqwest; tests use
/// [`InMemoryPlanApi`]. Calls may resolve in any order relative to each
/// other and to user input.
#[async_trait]
pub trait MealPlanApi: Send + Sync {
    /// Days that exist in `from..=to`. Missing dates are implicitly empty.
    async fn fetch_day_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        user_id: &str,
    ) -> Result<Vec<MealPlanDay>>;

    async fn fetch_single_day(&self, date: NaiveDate, user_id: &str)
    -> Result<Option<MealPlanDay>>;

    async fn persist_day(&self, dto: &MealPlanDayDto) -> Result<PersistAck>;

    async fn consume_pantry_items(&self, items: &[PantryItem]) -> Result<PersistAck>;
}

#[derive(Debug, Default)]
struct InMemoryState {
    days: BTreeMap<NaiveDate, MealPlanDay>,
    foods: Vec<FoodSnapshot>,
    persisted: Vec<MealPlanDayDto>,
    consumed: Vec<PantryItem>,
    next_id: u64,
}

/// Backend kept in process memory, with switches to make individual calls
/// fail. Persisted DTOs are resolved back into days through the foods it
/// was seeded with.
#[derive(Debug, Default)]
pub struct InMemoryPlanApi {
    state: Mutex<InMemoryState>,
    pub fail_fetch: AtomicBool,
    pub fail_persist: AtomicBool,
    pub fail_pantry: AtomicBool,
    pub range_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl InMemoryPlanApi {
    #[must_use]
    pub fn new(foods: Vec<FoodSnapshot>) -> Self {
        Self {
            state: Mutex::new(InMemoryState {
                foods,
                ..InMemoryState::default()
            }),
            ..Self::default()
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_day(&self, day: MealPlanDay) {
        self.state().days.insert(day.date, day);
    }

    #[must_use]
    pub fn day(&self, date: NaiveDate) -> Option<MealPlanDay> {
        self.state().days.get(&date).cloned()
    }

    #[must_use]
    pub fn persisted(&self) -> Vec<MealPlanDayDto> {
        self.state().persisted.clone()
    }

    #[must_use]
    pub fn consumed(&self) -> Vec<PantryItem> {
        self.state().consumed.clone()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_persist(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_pantry(&self, fail: bool) {
        self.fail_pantry.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MealPlanApi for InMemoryPlanApi {
    async fn fetch_day_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        _user_id: &str,
    ) -> Result<Vec<MealPlanDay>> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            bail!("range fetch {from}..{to} refused");
        }
        Ok(self
            .state()
            .days
            .range(from..=to)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn fetch_single_day(
        &self,
        date: NaiveDate,
        _user_id: &str,
    ) -> Result<Option<MealPlanDay>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            bail!("fetch of {date} refused");
        }
        Ok(self.day(date))
    }

    async fn persist_day(&self, dto: &MealPlanDayDto) -> Result<PersistAck> {
        if self.fail_persist.load(Ordering::SeqCst) {
            bail!("persist of {} refused", dto.date);
        }
        validate_day_dto(dto)?;
        let mut state = self.state();
        let id = match &dto.id {
            Some(id) => id.clone(),
            None => {
                state.next_id += 1;
                format!("plan-{}", state.next_id)
            }
        };
        let mut stored = dto.clone();
        stored.id = Some(id.clone());
        let foods = state.foods.clone();
        let day = from_dto(&stored, |food_id| {
            foods.iter().find(|f| f.id == food_id).cloned()
        })?;
        let date = NaiveDate::parse_from_str(&stored.date, DATE_FORMAT)?;
        state.days.insert(date, day);
        state.persisted.push(stored);
        Ok(PersistAck { id: Some(id) })
    }

    async fn consume_pantry_items(&self, items: &[PantryItem]) -> Result<PersistAck> {
        if self.fail_pantry.load(Ordering::SeqCst) {
            bail!("pantry refused {} items", items.len());
        }
        self.state().consumed.extend_from_slice(items);
        Ok(PersistAck::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::*;
    use crate::models::to_dto;

    fn api() -> InMemoryPlanApi {
        InMemoryPlanApi::new(vec![oats(), chicken()])
    }

    #[tokio::test]
    async fn test_fetch_range_only_returns_existing_days() {
        let api = api();
        api.insert_day(sample_day());
        let days = api
            .fetch_day_range(date(2024, 6, 12), date(2024, 6, 18), "u1")
            .await
            .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, date(2024, 6, 15));
        assert_eq!(api.range_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_single_missing_day() {
        let api = api();
        let day = api.fetch_single_day(date(2024, 6, 1), "u1").await.unwrap();
        assert!(day.is_none());
    }

    #[tokio::test]
    async fn test_persist_assigns_id_once() {
        let api = api();
        let mut day = sample_day();
        day.id = None;
        let ack = api.persist_day(&to_dto(&day)).await.unwrap();
        let id = ack.id.unwrap();

        day.id = Some(id.clone());
        let again = api.persist_day(&to_dto(&day)).await.unwrap();
        assert_eq!(again.id.as_deref(), Some(id.as_str()));

        let stored = api.day(day.date).unwrap();
        assert_eq!(stored.slots.lunch.len(), 3);
        assert_eq!(api.persisted().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let api = api();
        api.set_fail_fetch(true);
        assert!(api.fetch_single_day(date(2024, 6, 1), "u1").await.is_err());
        api.set_fail_persist(true);
        assert!(api.persist_day(&to_dto(&sample_day())).await.is_err());
        api.set_fail_pantry(true);
        assert!(api.consume_pantry_items(&[]).await.is_err());
        assert!(api.consumed().is_empty());
    }
}
