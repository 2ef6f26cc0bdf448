use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Nutrient values for one base quantity of a food. Fields missing from a
/// payload deserialize as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NutrientTable {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub fiber: f64,
    pub sugar: f64,
    pub sodium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodUnit {
    pub name: String,
    /// Base amount this unit stands for, e.g. 100 for "100 g".
    pub amount: f64,
}

/// Frozen copy of a food taken when it was added to a plan. Nutrition shown
/// for a meal item always comes from this snapshot, never from a live lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodSnapshot {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<i64>,
    #[serde(default)]
    pub nutrients: NutrientTable,
    pub units: Vec<FoodUnit>,
}

impl FoodSnapshot {
    #[must_use]
    pub fn unit(&self, index: usize) -> Option<&FoodUnit> {
        self.units.get(index)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealItem {
    pub id: String,
    pub food: FoodSnapshot,
    pub amount: f64,
    pub unit_index: usize,
    #[serde(default)]
    pub is_eaten: bool,
}

impl MealItem {
    #[must_use]
    pub fn new(food: FoodSnapshot, amount: f64, unit_index: usize) -> Self {
        Self {
            id: new_item_id(),
            food,
            amount,
            unit_index,
            is_eaten: false,
        }
    }

    /// Deep copy carrying a freshly generated id.
    #[must_use]
    pub fn with_fresh_id(&self) -> Self {
        Self {
            id: new_item_id(),
            ..self.clone()
        }
    }

    /// Quantity expressed in base units of the selected unit, or `None` when
    /// the unit index does not resolve to a usable unit.
    #[must_use]
    pub fn base_factor(&self) -> Option<f64> {
        let unit = self.food.unit(self.unit_index)?;
        if unit.amount <= 0.0 || !unit.amount.is_finite() {
            return None;
        }
        Some(self.amount / unit.amount)
    }
}

#[must_use]
pub fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealSlot {
    pub const ALL: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealSlot {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        validate_meal_slot(s)
    }
}

pub fn validate_meal_slot(slot: &str) -> Result<MealSlot> {
    match slot.trim().to_lowercase().as_str() {
        "breakfast" => Ok(MealSlot::Breakfast),
        "lunch" => Ok(MealSlot::Lunch),
        "dinner" => Ok(MealSlot::Dinner),
        _ => bail!(
            "Invalid meal slot '{slot}'. Must be one of: {}",
            MealSlot::ALL.map(MealSlot::as_str).join(", ")
        ),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealSlotSet {
    #[serde(default)]
    pub breakfast: Vec<MealItem>,
    #[serde(default)]
    pub lunch: Vec<MealItem>,
    #[serde(default)]
    pub dinner: Vec<MealItem>,
}

impl MealSlotSet {
    #[must_use]
    pub fn get(&self, slot: MealSlot) -> &[MealItem] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
        }
    }

    pub fn get_mut(&mut self, slot: MealSlot) -> &mut Vec<MealItem> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        MealSlot::ALL.iter().all(|s| self.get(*s).is_empty())
    }

    pub fn items(&self) -> impl Iterator<Item = &MealItem> {
        MealSlot::ALL.into_iter().flat_map(|s| self.get(s).iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlanDay {
    /// Assigned by the persistence layer on first save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub slots: MealSlotSet,
}

impl MealPlanDay {
    /// A day that has never been persisted.
    #[must_use]
    pub fn virtual_empty(date: NaiveDate) -> Self {
        Self {
            id: None,
            date,
            slots: MealSlotSet::default(),
        }
    }

    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.id.is_none()
    }

    #[must_use]
    pub fn position_of(&self, slot: MealSlot, item_id: &str) -> Option<usize> {
        self.slots.get(slot).iter().position(|i| i.id == item_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub date: NaiveDate,
    /// `None` means the day is known not to be loaded or created yet.
    pub day: Option<MealPlanDay>,
}

impl CacheEntry {
    #[must_use]
    pub fn empty(date: NaiveDate) -> Self {
        Self { date, day: None }
    }

    #[must_use]
    pub fn loaded(day: MealPlanDay) -> Self {
        Self {
            date: day.date,
            day: Some(day),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewingSlot {
    pub entry: CacheEntry,
    pub loading: bool,
}

impl ViewingSlot {
    #[must_use]
    pub fn ready(entry: CacheEntry) -> Self {
        Self {
            entry,
            loading: false,
        }
    }

    #[must_use]
    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            entry: CacheEntry::empty(date),
            loading: true,
        }
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.entry.date
    }
}

// --- Persistence types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealItemDto {
    pub food_id: i64,
    pub amount: f64,
    pub unit_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealSlotsDto {
    #[serde(default)]
    pub breakfast: Vec<MealItemDto>,
    #[serde(default)]
    pub lunch: Vec<MealItemDto>,
    #[serde(default)]
    pub dinner: Vec<MealItemDto>,
}

impl MealSlotsDto {
    #[must_use]
    pub fn get(&self, slot: MealSlot) -> &[MealItemDto] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
        }
    }

    fn get_mut(&mut self, slot: MealSlot) -> &mut Vec<MealItemDto> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
        }
    }
}

/// Wire shape written through `persist_day`: food snapshots are reduced to
/// `{foodId, amount, unitIndex}` triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanDayDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: String,
    #[serde(default)]
    pub slots: MealSlotsDto,
}

#[must_use]
pub fn to_dto(day: &MealPlanDay) -> MealPlanDayDto {
    let mut slots = MealSlotsDto::default();
    for slot in MealSlot::ALL {
        *slots.get_mut(slot) = day
            .slots
            .get(slot)
            .iter()
            .map(|item| MealItemDto {
                food_id: item.food.id,
                amount: item.amount,
                unit_index: item.unit_index,
            })
            .collect();
    }
    MealPlanDayDto {
        id: day.id.clone(),
        date: day.date.format(DATE_FORMAT).to_string(),
        slots,
    }
}

/// Rebuild a day from its DTO, resolving food snapshots through `lookup`.
/// Item ids are not part of the DTO and are generated fresh.
pub fn from_dto<F>(dto: &MealPlanDayDto, lookup: F) -> Result<MealPlanDay>
where
    F: Fn(i64) -> Option<FoodSnapshot>,
{
    validate_day_dto(dto)?;
    let date = NaiveDate::parse_from_str(&dto.date, DATE_FORMAT)?;
    let mut slots = MealSlotSet::default();
    for slot in MealSlot::ALL {
        for entry in dto.slots.get(slot) {
            let Some(food) = lookup(entry.food_id) else {
                bail!("Unknown food {} in {slot} on {}", entry.food_id, dto.date);
            };
            slots
                .get_mut(slot)
                .push(MealItem::new(food, entry.amount, entry.unit_index));
        }
    }
    Ok(MealPlanDay {
        id: dto.id.clone(),
        date,
        slots,
    })
}

/// Validate a persistence DTO: ISO date and strictly positive amounts.
pub fn validate_day_dto(dto: &MealPlanDayDto) -> Result<()> {
    NaiveDate::parse_from_str(&dto.date, DATE_FORMAT).map_err(|_| {
        anyhow::anyhow!(
            "Invalid meal plan date '{}'. Must be YYYY-MM-DD",
            dto.date
        )
    })?;
    for slot in MealSlot::ALL {
        if dto.slots.get(slot).iter().any(|i| i.amount <= 0.0) {
            bail!("{slot} amounts must be greater than 0");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<i64>,
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

impl PantryItem {
    #[must_use]
    pub fn from_meal_item(item: &MealItem) -> Self {
        let unit = item
            .food
            .unit(item.unit_index)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        Self {
            ingredient_id: item.food.ingredient_id,
            name: item.food.name.clone(),
            quantity: item.amount,
            unit,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistAck {
    #[serde(default)]
    pub id: Option<String>,
}
