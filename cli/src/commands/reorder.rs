use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::ValueEnum;
use std::process;
use std::sync::Arc;

use platter_core::api::MealPlanApi;
use platter_core::drag::{DragEngine, DragSource, DropTarget, Edge, MoveDescriptor, Point, Rect};
use platter_core::models::{MealItem, MealSlot};

use super::Workspace;
use super::helpers::{json_error, parse_plan_ref};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum DropEdge {
    Top,
    Bottom,
}

impl From<DropEdge> for Edge {
    fn from(edge: DropEdge) -> Self {
        match edge {
            DropEdge::Top => Edge::Top,
            DropEdge::Bottom => Edge::Bottom,
        }
    }
}

/// A unit box for the target; the pointer goes in the half matching `edge`.
fn pointer_for(edge: Edge) -> (Rect, Point) {
    let rect = Rect {
        left: 0.0,
        top: 0.0,
        width: 1.0,
        height: 1.0,
    };
    let y = match edge {
        Edge::Top => 0.25,
        Edge::Bottom => 0.75,
    };
    (rect, Point { x: 0.5, y })
}

/// Resolve the drop target for `date:slot[:index]`. Without an index the
/// item goes below the last one, or into the slot when it is empty. `None`
/// means there is no item at `index`.
fn drop_target(
    date: NaiveDate,
    slot: MealSlot,
    index: Option<usize>,
    items: &[MealItem],
    edge: Option<DropEdge>,
) -> Option<(DropTarget, Edge)> {
    match index {
        Some(index) => {
            let at = items.get(index)?;
            let target = DropTarget::Item {
                date,
                slot,
                index,
                card_id: at.id.clone(),
            };
            Some((target, edge.map_or(Edge::Top, Edge::from)))
        }
        None => match items.last() {
            Some(last) => Some((
                DropTarget::Item {
                    date,
                    slot,
                    index: items.len() - 1,
                    card_id: last.id.clone(),
                },
                Edge::Bottom,
            )),
            None => Some((DropTarget::EmptySlot { date, slot }, Edge::Top)),
        },
    }
}

/// Drive a drag from `source` onto `target`. `None` when the item would end
/// up where it already is.
fn plan_move(source: DragSource, target: DropTarget, edge: Edge) -> Option<MoveDescriptor> {
    let mut engine = DragEngine::new();
    engine.start(source, 1.0);
    let (rect, pointer) = pointer_for(edge);
    engine.drag_over(target, rect, pointer)?;
    let mv = engine.drop()?;
    let unchanged = mv.same_day
        && mv.source_slot == mv.dest_slot
        && mv.source_index == mv.dest_index;
    (!unchanged).then_some(mv)
}

pub(crate) async fn cmd_move(
    config: &Config,
    api: Arc<dyn MealPlanApi>,
    from: &str,
    to: &str,
    edge: Option<DropEdge>,
    json: bool,
) -> Result<()> {
    let src = parse_plan_ref(from)?;
    let (src_slot, src_index) = (src.slot(from)?, src.index(from)?);
    let dst = parse_plan_ref(to)?;
    let dst_slot = dst.slot(to)?;

    let mut ws = Workspace::open(config, api, src.date).await?;
    ws.ensure_loaded(dst.date).await?;

    let source_day = ws.day(src.date);
    let Some(item) = source_day
        .as_ref()
        .and_then(|d| d.slots.get(src_slot).get(src_index))
    else {
        bail!("No item at {from}");
    };

    let dest_items = ws
        .day(dst.date)
        .map(|d| d.slots.get(dst_slot).to_vec())
        .unwrap_or_default();
    let Some((target, edge)) = drop_target(dst.date, dst_slot, dst.index, &dest_items, edge) else {
        bail!("No item at {to}");
    };

    let source = DragSource {
        date: src.date,
        slot: src_slot,
        index: src_index,
        card_id: item.id.clone(),
    };
    let Some(mv) = plan_move(source, target, edge) else {
        let message = format!("{} is already at {to}", item.food.name);
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    };
    let name = item.food.name.clone();

    let tasks = ws.session.apply_move(&mv);
    if tasks.is_empty() {
        bail!("No item at {from}");
    }
    ws.finish(tasks).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&mv)?);
    } else {
        println!(
            "Moved {name} to {}:{}:{}",
            mv.dest_date, mv.dest_slot, mv.dest_index
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use platter_core::drag::closest_edge;
    use platter_core::models::{FoodSnapshot, FoodUnit, NutrientTable};

    #[test]
    fn test_pointer_lands_on_requested_edge() {
        for edge in [Edge::Top, Edge::Bottom] {
            let (rect, pointer) = pointer_for(edge);
            assert_eq!(closest_edge(rect, pointer), edge);
        }
    }

    fn lunch(ids: &[&str]) -> Vec<MealItem> {
        let food = FoodSnapshot {
            id: 1,
            name: "Rice".to_string(),
            ingredient_id: None,
            nutrients: NutrientTable::default(),
            units: vec![FoodUnit {
                name: "g".to_string(),
                amount: 100.0,
            }],
        };
        ids.iter()
            .map(|id| {
                let mut item = MealItem::new(food.clone(), 100.0, 0);
                item.id = (*id).to_string();
                item
            })
            .collect()
    }

    fn source(items: &[MealItem], index: usize) -> DragSource {
        DragSource {
            date: day(),
            slot: MealSlot::Lunch,
            index,
            card_id: items[index].id.clone(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_append_targets_below_last_item() {
        let items = lunch(&["a", "b"]);
        let (target, edge) = drop_target(day(), MealSlot::Lunch, None, &items, None).unwrap();
        assert_eq!(edge, Edge::Bottom);
        assert!(matches!(target, DropTarget::Item { index: 1, ref card_id, .. } if card_id == "b"));

        let (target, edge) = drop_target(day(), MealSlot::Dinner, None, &[], None).unwrap();
        assert_eq!(edge, Edge::Top);
        assert!(matches!(target, DropTarget::EmptySlot { slot: MealSlot::Dinner, .. }));

        assert!(drop_target(day(), MealSlot::Lunch, Some(5), &items, None).is_none());
    }

    #[test]
    fn test_appending_last_item_is_unchanged() {
        let items = lunch(&["a", "b"]);
        let (target, edge) = drop_target(day(), MealSlot::Lunch, None, &items, None).unwrap();
        assert!(plan_move(source(&items, 1), target, edge).is_none());

        let (target, edge) = drop_target(day(), MealSlot::Lunch, None, &items, None).unwrap();
        let mv = plan_move(source(&items, 0), target, edge).unwrap();
        assert_eq!(mv.dest_index, 1);
    }

    #[test]
    fn test_drop_that_keeps_position_is_unchanged() {
        let items = lunch(&["a", "b", "c"]);
        // top of the next item lands back on the same index
        let (target, edge) =
            drop_target(day(), MealSlot::Lunch, Some(1), &items, Some(DropEdge::Top)).unwrap();
        assert!(plan_move(source(&items, 0), target, edge).is_none());

        let (target, edge) =
            drop_target(day(), MealSlot::Lunch, Some(2), &items, Some(DropEdge::Bottom)).unwrap();
        let mv = plan_move(source(&items, 0), target, edge).unwrap();
        assert_eq!(mv.dest_index, 2);
    }

    #[test]
    fn test_drop_edge_conversion() {
        assert_eq!(Edge::from(DropEdge::Top), Edge::Top);
        assert_eq!(Edge::from(DropEdge::Bottom), Edge::Bottom);
    }
}
