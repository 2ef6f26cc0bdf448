use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::process;
use std::sync::Arc;
use tokio::task::JoinHandle;

use platter_core::api::MealPlanApi;
use platter_core::models::MealSlot;

use super::Workspace;
use super::helpers::{format_amount, json_error, parse_plan_ref, resolve_item_id, short_id};
use crate::config::Config;

/// Wait for the save of an edit and print the outcome. An edit that changed
/// nothing exits with code 2.
async fn finish_edit(
    ws: &mut Workspace,
    date: NaiveDate,
    tasks: Vec<JoinHandle<()>>,
    json: bool,
    done: &str,
    unchanged: &str,
) -> Result<()> {
    if tasks.is_empty() {
        if json {
            println!("{}", json_error(unchanged));
        } else {
            eprintln!("{unchanged}");
        }
        process::exit(2);
    }

    ws.finish(tasks).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ws.day(date))?);
    } else {
        println!("{done}");
    }
    Ok(())
}

fn not_found(json: bool, message: &str) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) async fn cmd_amount(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    slot_ref: &str,
    item_id: &str,
    amount: f64,
    unit: Option<usize>,
    json: bool,
) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("Amount must be greater than 0");
    }
    let r = parse_plan_ref(slot_ref)?;
    let slot = r.slot(slot_ref)?;

    let mut ws = Workspace::open(config, api, r.date).await?;
    let Some(day) = ws.day(r.date) else {
        not_found(json, &format!("Nothing planned for {}", r.date));
    };
    let id = resolve_item_id(&day, slot, item_id)?;
    let item = day
        .slots
        .get(slot)
        .iter()
        .find(|i| i.id == id)
        .context("Item disappeared")?;
    let unit = unit.unwrap_or(item.unit_index);
    if item.food.unit(unit).is_none() {
        bail!(
            "Unit {unit} does not exist for {} (it has {} units)",
            item.food.name,
            item.food.units.len()
        );
    }
    let name = item.food.name.clone();

    let tasks = ws.session.change_amount(r.date, slot, &id, amount, unit);
    let updated = ws
        .day(r.date)
        .and_then(|d| d.slots.get(slot).iter().find(|i| i.id == id).cloned());
    let done = match updated {
        Some(item) => format!("Updated {name} in {slot} on {}: {}", r.date, format_amount(&item)),
        None => format!("Updated {name}"),
    };
    finish_edit(
        &mut ws,
        r.date,
        tasks,
        json,
        &done,
        &format!("{name} already has that amount"),
    )
    .await
}

pub(crate) async fn cmd_remove(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    item_ref: &str,
    json: bool,
) -> Result<()> {
    let r = parse_plan_ref(item_ref)?;
    let (slot, index) = (r.slot(item_ref)?, r.index(item_ref)?);

    let mut ws = Workspace::open(config, api, r.date).await?;
    let name = ws
        .day(r.date)
        .and_then(|d| d.slots.get(slot).get(index).map(|i| i.food.name.clone()));
    let tasks = ws.session.remove_item(r.date, slot, index);
    finish_edit(
        &mut ws,
        r.date,
        tasks,
        json,
        &format!(
            "Removed {} from {slot} on {}",
            name.unwrap_or_default(),
            r.date
        ),
        &format!("No item at {item_ref}"),
    )
    .await
}

pub(crate) async fn cmd_duplicate(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    item_ref: &str,
    json: bool,
) -> Result<()> {
    let r = parse_plan_ref(item_ref)?;
    let (slot, index) = (r.slot(item_ref)?, r.index(item_ref)?);

    let mut ws = Workspace::open(config, api, r.date).await?;
    let tasks = ws.session.duplicate_item(r.date, slot, index);
    let copy = ws
        .day(r.date)
        .and_then(|d| d.slots.get(slot).get(index + 1).cloned());
    let done = match copy {
        Some(item) => format!(
            "Duplicated {} as [{}] in {slot} on {}",
            item.food.name,
            short_id(&item.id),
            r.date
        ),
        None => format!("Duplicated {item_ref}"),
    };
    finish_edit(
        &mut ws,
        r.date,
        tasks,
        json,
        &done,
        &format!("No item at {item_ref}"),
    )
    .await
}

pub(crate) async fn cmd_eat(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    slot_ref: &str,
    item_id: &str,
    undo: bool,
    json: bool,
) -> Result<()> {
    let r = parse_plan_ref(slot_ref)?;
    let slot = r.slot(slot_ref)?;

    let mut ws = Workspace::open(config, api, r.date).await?;
    let Some(day) = ws.day(r.date) else {
        not_found(json, &format!("Nothing planned for {}", r.date));
    };
    let id = resolve_item_id(&day, slot, item_id)?;
    let eaten = !undo;

    let tasks = ws.session.toggle_eaten(r.date, slot, &id, eaten);
    let state = if eaten { "eaten" } else { "not eaten" };
    finish_edit(
        &mut ws,
        r.date,
        tasks,
        json,
        &format!("Marked [{}] {state}", short_id(&id)),
        &format!("[{}] is already {state}", short_id(&id)),
    )
    .await
}

pub(crate) async fn cmd_clear(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    target: &str,
    json: bool,
) -> Result<()> {
    let r = parse_plan_ref(target)?;
    if r.index.is_some() {
        bail!("Use 'remove' to delete a single item");
    }

    let mut ws = Workspace::open(config, api, r.date).await?;
    let (tasks, what): (_, String) = match r.slot {
        Some(slot) => (ws.session.clear_slot(r.date, slot), format!("{slot}")),
        None => (
            ws.session.clear_day(r.date),
            MealSlot::ALL.map(MealSlot::as_str).join(", "),
        ),
    };
    finish_edit(
        &mut ws,
        r.date,
        tasks,
        json,
        &format!("Cleared {what} on {}", r.date),
        &format!("Nothing to clear on {}", r.date),
    )
    .await
}
