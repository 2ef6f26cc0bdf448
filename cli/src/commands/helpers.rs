use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use platter_core::models::{DATE_FORMAT, MealItem, MealPlanDay, MealSlot, validate_meal_slot};
use platter_core::nutrition::{item_nutrition, summarize_day};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => parse_date_str(&s),
    }
}

fn parse_date_str(s: &str) -> Result<NaiveDate> {
    match s {
        "today" => Ok(Local::now().date_naive()),
        "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
        "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, DATE_FORMAT).with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// A `date[:slot[:index]]` reference into the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlanRef {
    pub date: NaiveDate,
    pub slot: Option<MealSlot>,
    pub index: Option<usize>,
}

impl PlanRef {
    pub(crate) fn slot(&self, raw: &str) -> Result<MealSlot> {
        self.slot.with_context(|| {
            format!("Missing meal slot in '{raw}'. Use format 'date:slot' (e.g. 'today:lunch')")
        })
    }

    pub(crate) fn index(&self, raw: &str) -> Result<usize> {
        self.index.with_context(|| {
            format!("Missing item index in '{raw}'. Use format 'date:slot:index' (e.g. 'today:lunch:0')")
        })
    }
}

pub(crate) fn parse_plan_ref(s: &str) -> Result<PlanRef> {
    let mut parts = s.splitn(3, ':');
    let date = parse_date_str(parts.next().unwrap_or_default())?;
    let slot = parts.next().map(validate_meal_slot).transpose()?;
    let index = parts
        .next()
        .map(|i| {
            i.parse::<usize>()
                .with_context(|| format!("Invalid item index '{i}' in '{s}'"))
        })
        .transpose()?;
    Ok(PlanRef { date, slot, index })
}

/// First eight characters of an item id, as shown in tables.
pub(crate) fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map_or(id, |(i, _)| &id[..i])
}

/// Find the item in `slot` whose id is `prefix` or starts with it.
pub(crate) fn resolve_item_id(day: &MealPlanDay, slot: MealSlot, prefix: &str) -> Result<String> {
    let items = day.slots.get(slot);
    if let Some(item) = items.iter().find(|i| i.id == prefix) {
        return Ok(item.id.clone());
    }
    let matches: Vec<&MealItem> = items.iter().filter(|i| i.id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [item] => Ok(item.id.clone()),
        [] => bail!("No item '{prefix}' in {slot} on {}", day.date),
        _ => bail!("Item id '{prefix}' is ambiguous in {slot} on {}", day.date),
    }
}

pub(crate) fn format_amount(item: &MealItem) -> String {
    let unit = item
        .food
        .unit(item.unit_index)
        .map_or("?", |u| u.name.as_str());
    if item.amount.fract() == 0.0 {
        format!("{:.0} {unit}", item.amount)
    } else {
        format!("{} {unit}", item.amount)
    }
}

pub(crate) fn print_day(date: NaiveDate, day: Option<&MealPlanDay>) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Food")]
        name: String,
        #[tabled(rename = "Amount")]
        amount: String,
        #[tabled(rename = "kcal")]
        calories: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
        #[tabled(rename = "Eaten")]
        eaten: String,
    }

    let summary = summarize_day(date, day);
    println!("=== {} ===\n", summary.date);

    for slot_summary in &summary.slots {
        let label = slot_summary.slot.as_str().to_uppercase();
        let sub_cal = no_neg_zero(slot_summary.subtotal.calories);
        println!("  {label} ({sub_cal:.0} kcal)");

        let items = day.map_or(&[][..], |d| d.slots.get(slot_summary.slot));
        if items.is_empty() {
            println!("    (nothing planned)\n");
            continue;
        }

        let rows: Vec<ItemRow> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let n = item_nutrition(item);
                ItemRow {
                    idx: i,
                    id: short_id(&item.id).to_string(),
                    name: truncate(&item.food.name, 30),
                    amount: format_amount(item),
                    calories: format!("{:.0}", n.calories),
                    protein: format!("{:.1}", n.protein),
                    carbs: format!("{:.1}", n.carbs),
                    fat: format!("{:.1}", n.fat),
                    eaten: if item.is_eaten { "yes" } else { "" }.to_string(),
                }
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(4..8)).with(Alignment::right()))
            .to_string();
        println!("{table}\n");
    }

    let t = &summary.total;
    let (cal, p, c, f) = (
        no_neg_zero(t.calories),
        no_neg_zero(t.protein),
        no_neg_zero(t.carbs),
        no_neg_zero(t.fat),
    );
    println!("  TOTAL: {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g");
    let eaten = no_neg_zero(summary.eaten.calories);
    println!("  EATEN: {eaten:.0} kcal");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platter_core::models::{FoodSnapshot, FoodUnit, NutrientTable};

    fn day_with(ids: &[&str]) -> MealPlanDay {
        let food = FoodSnapshot {
            id: 1,
            name: "Rolled oats".to_string(),
            ingredient_id: None,
            nutrients: NutrientTable::default(),
            units: vec![FoodUnit {
                name: "g".to_string(),
                amount: 100.0,
            }],
        };
        let mut day = MealPlanDay::virtual_empty(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        for id in ids {
            let mut item = MealItem::new(food.clone(), 40.0, 0);
            item.id = (*id).to_string();
            day.slots.lunch.push(item);
        }
        day
    }

    #[test]
    fn test_parse_date_none() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(None).unwrap(), today);
    }

    #[test]
    fn test_parse_date_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date(Some("today".to_string())).unwrap(), today);
        assert_eq!(
            parse_date(Some("yesterday".to_string())).unwrap(),
            today - chrono::Duration::days(1)
        );
        assert_eq!(
            parse_date(Some("tomorrow".to_string())).unwrap(),
            today + chrono::Duration::days(1)
        );
    }

    #[test]
    fn test_parse_date_iso() {
        let date = parse_date(Some("2024-01-15".to_string())).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date(Some("nope".to_string())).is_err());
    }

    #[test]
    fn test_parse_plan_ref() {
        let r = parse_plan_ref("2024-06-15:lunch:2").unwrap();
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert_eq!(r.slot, Some(MealSlot::Lunch));
        assert_eq!(r.index, Some(2));

        let r = parse_plan_ref("today:dinner").unwrap();
        assert_eq!(r.date, Local::now().date_naive());
        assert_eq!(r.slot, Some(MealSlot::Dinner));
        assert!(r.index.is_none());
        assert!(r.index("today:dinner").is_err());

        let r = parse_plan_ref("tomorrow").unwrap();
        assert!(r.slot.is_none());
        assert!(r.slot("tomorrow").is_err());
    }

    #[test]
    fn test_parse_plan_ref_invalid() {
        assert!(parse_plan_ref("today:snack").is_err());
        assert!(parse_plan_ref("today:lunch:first").is_err());
        assert!(parse_plan_ref("today:lunch:-1").is_err());
        assert!(parse_plan_ref("2024-13-01:lunch").is_err());
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0f8c2a6e-91b4-4c1e"), "0f8c2a6e");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_resolve_item_id() {
        let day = day_with(&["0f8c2a6e-1111", "0f8c9999-2222", "77aa0000-3333"]);
        assert_eq!(
            resolve_item_id(&day, MealSlot::Lunch, "77aa").unwrap(),
            "77aa0000-3333"
        );
        assert_eq!(
            resolve_item_id(&day, MealSlot::Lunch, "0f8c2a6e-1111").unwrap(),
            "0f8c2a6e-1111"
        );
        let err = resolve_item_id(&day, MealSlot::Lunch, "0f8c").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
        assert!(resolve_item_id(&day, MealSlot::Dinner, "77aa").is_err());
    }

    #[test]
    fn test_format_amount() {
        let day = day_with(&["a"]);
        let mut item = day.slots.lunch[0].clone();
        assert_eq!(format_amount(&item), "40 g");
        item.amount = 2.5;
        assert_eq!(format_amount(&item), "2.5 g");
        item.unit_index = 3;
        assert_eq!(format_amount(&item), "2.5 ?");
    }

    #[test]
    fn test_json_error() {
        assert_eq!(json_error("nope"), r#"{"error":"nope"}"#);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(5.0), 5.0);
    }
}
