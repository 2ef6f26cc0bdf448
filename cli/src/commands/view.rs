use anyhow::Result;
use serde::Serialize;
use std::process;
use std::sync::Arc;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use tokio::task::JoinHandle;
use tracing::debug;

use platter_core::api::MealPlanApi;
use platter_core::cache::lock;
use platter_core::error::SyncError;
use platter_core::models::ViewingSlot;
use platter_core::nutrition::summarize_day;
use platter_core::window::signed_offset;

use super::Workspace;
use super::helpers::{json_error, no_neg_zero, parse_date, print_day};
use crate::config::Config;

/// Wait for window fetches. A fetch error has already gone to the reporter;
/// returns how many tasks panicked or were cancelled.
async fn await_fetches(fetches: Vec<JoinHandle<Result<(), SyncError>>>) -> usize {
    let mut aborted = 0;
    for fetch in fetches {
        if let Err(e) = fetch.await {
            debug!("window fetch ended abnormally: {e}");
            aborted += 1;
        }
    }
    aborted
}

pub(crate) async fn cmd_show(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let ws = Workspace::open(config, api, date).await?;
    let day = ws.day(date);

    if json {
        let summary = summarize_day(date, day.as_ref());
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "day": day, "summary": summary }))?
        );
        return Ok(());
    }

    if day.as_ref().is_none_or(|d| d.slots.is_empty()) {
        eprintln!("Nothing planned for {date}");
        process::exit(2);
    }

    print_day(date, day.as_ref());
    Ok(())
}

#[derive(Debug, Serialize)]
struct WindowRow {
    slide: usize,
    offset: i64,
    date: String,
    current: bool,
    loading: bool,
    items: usize,
    calories: f64,
}

fn window_rows(viewing: &[ViewingSlot], current: usize) -> Vec<WindowRow> {
    let mut rows: Vec<WindowRow> = viewing
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let day = slot.entry.day.as_ref();
            let calories = summarize_day(slot.date(), day).total.calories;
            WindowRow {
                slide: i,
                offset: signed_offset(i, current, viewing.len()),
                date: slot.date().to_string(),
                current: i == current,
                loading: slot.loading,
                items: day.map_or(0, |d| d.slots.items().count()),
                calories: no_neg_zero(calories),
            }
        })
        .collect();
    rows.sort_by_key(|r| r.offset);
    rows
}

pub(crate) async fn cmd_window(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    date: Option<String>,
    steps: usize,
    back: bool,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "")]
        marker: String,
        #[tabled(rename = "Slide")]
        slide: usize,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "State")]
        state: String,
        #[tabled(rename = "kcal")]
        calories: String,
    }

    let date = parse_date(date)?;
    let mut ws = Workspace::open(config, api, date).await?;

    let len = ws.controller.window_size();
    let mut fetches = Vec::new();
    for _ in 0..steps {
        let current = ws.controller.current();
        let next = if back {
            (current + len - 1) % len
        } else {
            (current + 1) % len
        };
        if let Some(fetch) = ws.controller.navigate(next)? {
            fetches.push(fetch);
        }
    }
    await_fetches(fetches).await;

    let viewing = lock(ws.session.store()).viewing().to_vec();
    let rows = window_rows(&viewing, ws.controller.current());

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        let table_rows: Vec<Row> = rows
            .iter()
            .map(|r| Row {
                marker: if r.current { "*" } else { "" }.to_string(),
                slide: r.slide,
                date: r.date.clone(),
                state: match (r.loading, r.items) {
                    (true, _) => "loading".to_string(),
                    (false, 0) => "empty".to_string(),
                    (false, 1) => "1 item".to_string(),
                    (false, n) => format!("{n} items"),
                },
                calories: format!("{:.0}", r.calories),
            })
            .collect();
        let table = Table::new(&table_rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(4..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }

    if let Err(e) = ws.finish(Vec::new()).await {
        if json {
            eprintln!("{}", json_error(&format!("{e:#}")));
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use platter_core::models::{CacheEntry, MealPlanDay};

    #[test]
    fn test_window_rows_ordered_around_current() {
        let center = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        // ring after one forward step: slide 4 is current, slide 0 was recycled
        let viewing: Vec<ViewingSlot> = (0..7_i64)
            .map(|i| {
                let offset = if i == 0 { 3 } else { i - 4 };
                let date = center + Duration::days(offset);
                if i == 0 {
                    ViewingSlot::placeholder(date)
                } else {
                    ViewingSlot::ready(CacheEntry::loaded(MealPlanDay::virtual_empty(date)))
                }
            })
            .collect();

        let rows = window_rows(&viewing, 4);
        let offsets: Vec<i64> = rows.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![-3, -2, -1, 0, 1, 2, 3]);
        assert!(rows[3].current);
        assert_eq!(rows[3].date, "2024-06-15");
        assert_eq!(rows[6].slide, 0);
        assert!(rows[6].loading);
        assert_eq!(rows[6].date, "2024-06-18");
    }

    #[tokio::test]
    async fn test_await_fetches_counts_abnormal_tasks() {
        let done = tokio::spawn(async { Ok(()) });
        let failed = tokio::spawn(async {
            Err(SyncError::FetchDay {
                date: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                reason: "offline".to_string(),
            })
        });
        let stuck = tokio::spawn(std::future::pending::<Result<(), SyncError>>());
        stuck.abort();

        assert_eq!(await_fetches(vec![done, failed, stuck]).await, 1);
        assert_eq!(await_fetches(Vec::new()).await, 0);
    }
}
