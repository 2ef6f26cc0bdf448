use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DATE_FORMAT, MealItem, MealPlanDay, MealSlot, NutrientTable};

impl NutrientTable {
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
            fiber: self.fiber * factor,
            sugar: self.sugar * factor,
            sodium: self.sodium * factor,
        }
    }

    /// Every field rounded to 2 decimals, for display.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            calories: round2(self.calories),
            protein: round2(self.protein),
            carbs: round2(self.carbs),
            fat: round2(self.fat),
            fiber: round2(self.fiber),
            sugar: round2(self.sugar),
            sodium: round2(self.sodium),
        }
    }
}

impl Add for NutrientTable {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
            fiber: self.fiber + rhs.fiber,
            sugar: self.sugar + rhs.sugar,
            sodium: self.sodium + rhs.sodium,
        }
    }
}

impl AddAssign for NutrientTable {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for NutrientTable {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[must_use]
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Nutrition contributed by one item. Items whose unit cannot be resolved
/// contribute nothing.
#[must_use]
pub fn item_nutrition(item: &MealItem) -> NutrientTable {
    item.base_factor()
        .map_or_else(NutrientTable::default, |factor| {
            item.food.nutrients.scaled(factor)
        })
}

#[must_use]
pub fn total_calories(items: &[MealItem]) -> f64 {
    round2(items.iter().map(|i| item_nutrition(i).calories).sum())
}

#[must_use]
pub fn total_nutrition(items: &[MealItem]) -> NutrientTable {
    items.iter().map(item_nutrition).sum()
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotSummary {
    pub slot: MealSlot,
    pub item_count: usize,
    pub subtotal: NutrientTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub slots: Vec<SlotSummary>,
    pub total: NutrientTable,
    /// Part of `total` contributed by items already marked eaten.
    pub eaten: NutrientTable,
}

/// Per-slot subtotals and day totals. A missing day summarizes as empty.
#[must_use]
pub fn summarize_day(date: NaiveDate, day: Option<&MealPlanDay>) -> DaySummary {
    let slots: Vec<SlotSummary> = MealSlot::ALL
        .into_iter()
        .map(|slot| {
            let items = day.map_or(&[][..], |d| d.slots.get(slot));
            SlotSummary {
                slot,
                item_count: items.len(),
                subtotal: total_nutrition(items).rounded(),
            }
        })
        .collect();

    let (total, eaten) = day.map_or_else(Default::default, |d| {
        let total: NutrientTable = d.slots.items().map(item_nutrition).sum();
        let eaten: NutrientTable = d
            .slots
            .items()
            .filter(|i| i.is_eaten)
            .map(item_nutrition)
            .sum();
        (total, eaten)
    });

    DaySummary {
        date: date.format(DATE_FORMAT).to_string(),
        slots,
        total: total.rounded(),
        eaten: eaten.rounded(),
    }
}
