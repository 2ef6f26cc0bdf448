use std::borrow::Cow;

use chrono::NaiveDate;
use tracing::debug;

use crate::models::{MealItem, MealPlanDay, MealSlot, MealSlotSet};

/// Splice-style insert: `None` appends, an index past the end clamps to the end.
fn splice_insert(items: &mut Vec<MealItem>, at_index: Option<usize>, item: MealItem) {
    let index = at_index.map_or(items.len(), |i| i.min(items.len()));
    items.insert(index, item);
}

fn materialize(day: Option<&MealPlanDay>, date: NaiveDate) -> MealPlanDay {
    day.cloned()
        .unwrap_or_else(|| MealPlanDay::virtual_empty(date))
}

/// Insert `item` into `slot`. A missing day is materialized as a virtual
/// empty day for `date`.
#[must_use]
pub fn add_item(
    day: Option<&MealPlanDay>,
    date: NaiveDate,
    slot: MealSlot,
    item: MealItem,
    at_index: Option<usize>,
) -> MealPlanDay {
    let mut next = materialize(day, date);
    splice_insert(next.slots.get_mut(slot), at_index, item);
    next
}

#[must_use]
pub fn remove_item(day: &MealPlanDay, slot: MealSlot, index: usize) -> Cow<'_, MealPlanDay> {
    match take_item(day, slot, index) {
        Some((next, _)) => Cow::Owned(next),
        None => Cow::Borrowed(day),
    }
}

/// Remove the item at `index` and hand it back alongside the new day.
#[must_use]
pub fn take_item(day: &MealPlanDay, slot: MealSlot, index: usize) -> Option<(MealPlanDay, MealItem)> {
    if index >= day.slots.get(slot).len() {
        debug!(%slot, index, date = %day.date, "stale index, nothing removed");
        return None;
    }
    let mut next = day.clone();
    let item = next.slots.get_mut(slot).remove(index);
    Some((next, item))
}

/// Remove then re-insert under a fresh id. `dest_index` is interpreted
/// against the destination list after the removal.
#[must_use]
pub fn move_item(
    day: &MealPlanDay,
    source_slot: MealSlot,
    source_index: usize,
    dest_slot: MealSlot,
    dest_index: usize,
) -> Cow<'_, MealPlanDay> {
    let Some((mut next, item)) = take_item(day, source_slot, source_index) else {
        return Cow::Borrowed(day);
    };
    splice_insert(
        next.slots.get_mut(dest_slot),
        Some(dest_index),
        item.with_fresh_id(),
    );
    Cow::Owned(next)
}

/// Change amount and unit of the item with `item_id`. Ids survive reorders,
/// indices do not, so lookup is by id. Invalid amounts or units are ignored.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn change_amount<'a>(
    day: &'a MealPlanDay,
    slot: MealSlot,
    item_id: &str,
    amount: f64,
    unit_index: usize,
) -> Cow<'a, MealPlanDay> {
    let Some(pos) = day.position_of(slot, item_id) else {
        debug!(%slot, item_id, "item gone, amount unchanged");
        return Cow::Borrowed(day);
    };
    let current = &day.slots.get(slot)[pos];
    if !amount.is_finite() || amount <= 0.0 || current.food.unit(unit_index).is_none() {
        return Cow::Borrowed(day);
    }
    if current.amount == amount && current.unit_index == unit_index {
        return Cow::Borrowed(day);
    }
    let mut next = day.clone();
    let item = &mut next.slots.get_mut(slot)[pos];
    item.amount = amount;
    item.unit_index = unit_index;
    Cow::Owned(next)
}

/// Insert a copy with a new id directly after the original.
#[must_use]
pub fn duplicate_item(day: &MealPlanDay, slot: MealSlot, index: usize) -> Cow<'_, MealPlanDay> {
    let Some(original) = day.slots.get(slot).get(index) else {
        return Cow::Borrowed(day);
    };
    let copy = original.with_fresh_id();
    let mut next = day.clone();
    next.slots.get_mut(slot).insert(index + 1, copy);
    Cow::Owned(next)
}

#[must_use]
pub fn toggle_eaten<'a>(
    day: &'a MealPlanDay,
    slot: MealSlot,
    item_id: &str,
    eaten: bool,
) -> Cow<'a, MealPlanDay> {
    let Some(pos) = day.position_of(slot, item_id) else {
        debug!(%slot, item_id, "item gone, eaten flag unchanged");
        return Cow::Borrowed(day);
    };
    if day.slots.get(slot)[pos].is_eaten == eaten {
        return Cow::Borrowed(day);
    }
    let mut next = day.clone();
    next.slots.get_mut(slot)[pos].is_eaten = eaten;
    Cow::Owned(next)
}

#[must_use]
pub fn clear_slot(day: &MealPlanDay, slot: MealSlot) -> Cow<'_, MealPlanDay> {
    if day.slots.get(slot).is_empty() {
        return Cow::Borrowed(day);
    }
    let mut next = day.clone();
    next.slots.get_mut(slot).clear();
    Cow::Owned(next)
}

#[must_use]
pub fn clear_day(day: &MealPlanDay) -> Cow<'_, MealPlanDay> {
    if day.slots.is_empty() {
        return Cow::Borrowed(day);
    }
    Cow::Owned(MealPlanDay {
        slots: MealSlotSet::default(),
        ..day.clone()
    })
}
