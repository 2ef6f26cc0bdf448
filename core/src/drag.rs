use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::models::MealSlot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Top,
    Bottom,
}

/// Top half of the box → `Top`, anything else → `Bottom`.
#[must_use]
pub fn closest_edge(rect: Rect, pointer: Point) -> Edge {
    if pointer.y < rect.top + rect.height / 2.0 {
        Edge::Top
    } else {
        Edge::Bottom
    }
}

/// Payload recorded when an item starts being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSource {
    pub date: NaiveDate,
    pub slot: MealSlot,
    pub index: usize,
    pub card_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Item {
        date: NaiveDate,
        slot: MealSlot,
        index: usize,
        card_id: String,
    },
    EmptySlot {
        date: NaiveDate,
        slot: MealSlot,
    },
}

impl DropTarget {
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        match self {
            DropTarget::Item { date, .. } | DropTarget::EmptySlot { date, .. } => *date,
        }
    }

    #[must_use]
    pub fn slot(&self) -> MealSlot {
        match self {
            DropTarget::Item { slot, .. } | DropTarget::EmptySlot { slot, .. } => *slot,
        }
    }

    fn is_source(&self, source: &DragSource) -> bool {
        matches!(self, DropTarget::Item { card_id, .. } if *card_id == source.card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveDescriptor {
    pub source_date: NaiveDate,
    pub source_slot: MealSlot,
    pub source_index: usize,
    pub dest_date: NaiveDate,
    pub dest_slot: MealSlot,
    pub dest_index: usize,
    pub same_day: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: DragSource,
        height: f64,
    },
    Hovering {
        source: DragSource,
        height: f64,
        target: DropTarget,
        edge: Edge,
    },
}

/// Drag state for one pointer. Dropping yields a [`MoveDescriptor`] that the
/// session turns into a day edit; nothing here is persisted.
#[derive(Debug, Default)]
pub struct DragEngine {
    state: DragState,
}

impl DragEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> &DragState {
        &self.state
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    /// Start dragging `source`. `height` is the source element's height,
    /// published so the drop indicator can reserve the same space.
    pub fn start(&mut self, source: DragSource, height: f64) {
        debug!(card = %source.card_id, slot = %source.slot, index = source.index, "drag start");
        self.state = DragState::Dragging { source, height };
    }

    #[must_use]
    pub fn placeholder_height(&self) -> Option<f64> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging { height, .. } | DragState::Hovering { height, .. } => {
                Some(*height)
            }
        }
    }

    /// Pointer moved over `target`. Called for every move, not just on
    /// enter. Returns the highlighted edge, or `None` when nothing is being
    /// dragged or the source hovers over itself.
    pub fn drag_over(&mut self, target: DropTarget, rect: Rect, pointer: Point) -> Option<Edge> {
        let (source, height) = match std::mem::take(&mut self.state) {
            DragState::Idle => return None,
            DragState::Dragging { source, height } | DragState::Hovering { source, height, .. } => {
                (source, height)
            }
        };

        if target.is_source(&source) {
            self.state = DragState::Dragging { source, height };
            return None;
        }

        let edge = closest_edge(rect, pointer);
        self.state = DragState::Hovering {
            source,
            height,
            target,
            edge,
        };
        Some(edge)
    }

    /// Pointer left `target`; clears its highlight if it was the hovered one.
    pub fn leave(&mut self, target: &DropTarget) {
        if let DragState::Hovering {
            source,
            height,
            target: hovered,
            ..
        } = &self.state
            && hovered == target
        {
            self.state = DragState::Dragging {
                source: source.clone(),
                height: *height,
            };
        }
    }

    /// Edge currently highlighted on `target`, if any.
    #[must_use]
    pub fn highlighted(&self, target: &DropTarget) -> Option<Edge> {
        match &self.state {
            DragState::Hovering {
                target: hovered,
                edge,
                ..
            } if hovered == target => Some(*edge),
            _ => None,
        }
    }

    /// End the gesture. A drop outside any target is a cancel and yields
    /// nothing. Transient state is always cleared.
    pub fn drop(&mut self) -> Option<MoveDescriptor> {
        let DragState::Hovering {
            source,
            target,
            edge,
            ..
        } = std::mem::take(&mut self.state)
        else {
            debug!("drag ended outside any target");
            return None;
        };
        Some(describe_move(&source, &target, edge))
    }

    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Build the move for dropping `source` on `edge` of `target`.
///
/// The destination index is relative to the list after the source has been
/// removed, so a downward move within one slot is shifted up by one.
#[must_use]
pub fn describe_move(source: &DragSource, target: &DropTarget, edge: Edge) -> MoveDescriptor {
    let same_day = source.date == target.date();
    let mut dest_index = match target {
        DropTarget::EmptySlot { .. } => 0,
        DropTarget::Item { index, .. } => match edge {
            Edge::Top => *index,
            Edge::Bottom => index + 1,
        },
    };
    if same_day && source.slot == target.slot() && source.index < dest_index {
        dest_index -= 1;
    }
    MoveDescriptor {
        source_date: source.date,
        source_slot: source.slot,
        source_index: source.index,
        dest_date: target.date(),
        dest_slot: target.slot(),
        dest_index,
        same_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::date;

    fn rect() -> Rect {
        Rect {
            left: 0.0,
            top: 100.0,
            width: 300.0,
            height: 40.0,
        }
    }

    fn at(y: f64) -> Point {
        Point { x: 10.0, y }
    }

    fn source(slot: MealSlot, index: usize, card: &str) -> DragSource {
        DragSource {
            date: date(2024, 6, 15),
            slot,
            index,
            card_id: card.to_string(),
        }
    }

    fn item_target(slot: MealSlot, index: usize, card: &str) -> DropTarget {
        DropTarget::Item {
            date: date(2024, 6, 15),
            slot,
            index,
            card_id: card.to_string(),
        }
    }

    #[test]
    fn test_closest_edge() {
        assert_eq!(closest_edge(rect(), at(100.0)), Edge::Top);
        assert_eq!(closest_edge(rect(), at(119.9)), Edge::Top);
        assert_eq!(closest_edge(rect(), at(120.0)), Edge::Bottom);
        assert_eq!(closest_edge(rect(), at(139.0)), Edge::Bottom);
    }

    #[test]
    fn test_drop_on_top_half_of_other_slot() {
        // lunch[0] onto dinner[1], pointer in the top half
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 0, "a"), 40.0);
        let target = item_target(MealSlot::Dinner, 1, "x");
        assert_eq!(engine.drag_over(target, rect(), at(105.0)), Some(Edge::Top));

        let mv = engine.drop().unwrap();
        assert_eq!(mv.source_slot, MealSlot::Lunch);
        assert_eq!(mv.source_index, 0);
        assert_eq!(mv.dest_slot, MealSlot::Dinner);
        assert_eq!(mv.dest_index, 1);
        assert!(mv.same_day);
        assert!(!engine.is_dragging());
    }

    #[test]
    fn test_bottom_edge_inserts_after() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Breakfast, 0, "a"), 40.0);
        engine.drag_over(item_target(MealSlot::Dinner, 1, "x"), rect(), at(130.0));
        assert_eq!(engine.drop().unwrap().dest_index, 2);
    }

    #[test]
    fn test_edge_rederived_on_every_move() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 0, "a"), 40.0);
        let target = item_target(MealSlot::Lunch, 2, "c");
        assert_eq!(engine.drag_over(target.clone(), rect(), at(101.0)), Some(Edge::Top));
        assert_eq!(engine.highlighted(&target), Some(Edge::Top));
        assert_eq!(engine.drag_over(target.clone(), rect(), at(135.0)), Some(Edge::Bottom));
        assert_eq!(engine.highlighted(&target), Some(Edge::Bottom));
    }

    #[test]
    fn test_self_target_has_no_edge() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 1, "b"), 40.0);
        let own = item_target(MealSlot::Lunch, 1, "b");
        assert_eq!(engine.drag_over(own.clone(), rect(), at(101.0)), None);
        assert_eq!(engine.highlighted(&own), None);
        assert!(engine.drop().is_none());
    }

    #[test]
    fn test_drop_on_empty_slot() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 2, "c"), 40.0);
        let empty = DropTarget::EmptySlot {
            date: date(2024, 6, 15),
            slot: MealSlot::Breakfast,
        };
        engine.drag_over(empty, rect(), at(139.0));
        let mv = engine.drop().unwrap();
        assert_eq!(mv.dest_slot, MealSlot::Breakfast);
        assert_eq!(mv.dest_index, 0);
    }

    #[test]
    fn test_downward_move_in_same_slot_is_adjusted() {
        let mv = describe_move(
            &source(MealSlot::Lunch, 0, "a"),
            &item_target(MealSlot::Lunch, 2, "c"),
            Edge::Bottom,
        );
        assert_eq!(mv.dest_index, 2);

        let up = describe_move(
            &source(MealSlot::Lunch, 2, "c"),
            &item_target(MealSlot::Lunch, 0, "a"),
            Edge::Top,
        );
        assert_eq!(up.dest_index, 0);
    }

    #[test]
    fn test_cross_day_move() {
        let target = DropTarget::Item {
            date: date(2024, 6, 16),
            slot: MealSlot::Lunch,
            index: 0,
            card_id: "z".to_string(),
        };
        let mv = describe_move(&source(MealSlot::Lunch, 0, "a"), &target, Edge::Bottom);
        assert!(!mv.same_day);
        assert_eq!(mv.dest_date, date(2024, 6, 16));
        assert_eq!(mv.dest_index, 1);
    }

    #[test]
    fn test_drop_outside_targets_is_cancel() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 0, "a"), 40.0);
        let target = item_target(MealSlot::Dinner, 0, "x");
        engine.drag_over(target.clone(), rect(), at(101.0));
        engine.leave(&target);
        assert_eq!(engine.highlighted(&target), None);
        assert_eq!(engine.placeholder_height(), Some(40.0));
        assert!(engine.drop().is_none());
        assert_eq!(*engine.state(), DragState::Idle);
        assert_eq!(engine.placeholder_height(), None);
    }

    #[test]
    fn test_drag_over_while_idle() {
        let mut engine = DragEngine::new();
        assert_eq!(
            engine.drag_over(item_target(MealSlot::Dinner, 0, "x"), rect(), at(101.0)),
            None
        );
        assert_eq!(*engine.state(), DragState::Idle);
    }

    #[test]
    fn test_cancel_clears_state() {
        let mut engine = DragEngine::new();
        engine.start(source(MealSlot::Lunch, 0, "a"), 32.0);
        engine.drag_over(item_target(MealSlot::Dinner, 0, "x"), rect(), at(101.0));
        engine.cancel();
        assert!(!engine.is_dragging());
        assert!(engine.drop().is_none());
    }
}
