//! Drag-and-drop position reconciliation.
//!
//! Given the board's ordered columns, the dragged task, and where it was
//! dropped, [`plan_move`] computes the destination slot and every sibling
//! whose position must change. Planning is pure; the caller turns the plan
//! into one batch of `v1.TaskMoved` events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::projection::Columns;
use crate::task::{BoardEvent, Column, TaskRow};

/// Where a dragged task was released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DropTarget {
    /// Empty area of a column: append at the end.
    Column(Column),
    /// Another task card.
    Task(String),
}

impl DropTarget {
    /// Column names take precedence over task ids.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<Column>() {
            Ok(column) => Self::Column(column),
            Err(_) => Self::Task(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for DropTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(column) => write!(f, "column {column}"),
            Self::Task(id) => write!(f, "task {id}"),
        }
    }
}

/// How siblings are renumbered around a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// Renumber the destination column (and the source column on
    /// cross-column moves) to a dense `0..n-1`.
    #[default]
    Compact,
    /// Bump destination siblings at or after the slot by one and leave the
    /// source column untouched. Gaps accumulate.
    GapTolerant,
}

impl ReorderPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::GapTolerant => "gap_tolerant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiblingShift {
    pub task_id: String,
    pub column: Column,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovePlan {
    pub task_id: String,
    pub from_column: Column,
    pub from_position: u32,
    pub destination_column: Column,
    pub destination_position: u32,
    pub sibling_shifts: Vec<SiblingShift>,
}

impl MovePlan {
    /// The dragged task already sits at the destination.
    pub fn is_noop(&self) -> bool {
        self.from_column == self.destination_column
            && self.from_position == self.destination_position
    }

    /// Events for the plan: the dragged task first, then sibling shifts.
    pub fn into_events(self, now: DateTime<Utc>) -> Vec<BoardEvent> {
        if self.is_noop() {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(1 + self.sibling_shifts.len());
        events.push(BoardEvent::task_moved(
            self.task_id,
            self.destination_column,
            self.destination_position,
            now,
        ));
        events.extend(
            self.sibling_shifts
                .into_iter()
                .map(|shift| BoardEvent::task_moved(shift.task_id, shift.column, shift.position, now)),
        );
        events
    }
}

pub fn plan_move(
    columns: &Columns,
    task_id: &str,
    target: &DropTarget,
    policy: ReorderPolicy,
) -> Result<MovePlan> {
    let (dragged, _) =
        find_task(columns, task_id).ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

    let (destination_column, slot) = match target {
        DropTarget::Column(column) => {
            let rows = column_rows(columns, *column);
            let slot = match policy {
                ReorderPolicy::GapTolerant => rows.len(),
                ReorderPolicy::Compact => rows.iter().filter(|row| row.id != task_id).count(),
            };
            (*column, slot)
        }
        DropTarget::Task(over_id) => {
            let (over, over_index) = find_task(columns, over_id)
                .ok_or_else(|| Error::UnknownDropTarget(over_id.clone()))?;
            if over.column == dragged.column {
                (over.column, over_index)
            } else {
                // Cross-column drops land just after the hovered card.
                (over.column, over_index + 1)
            }
        }
    };

    let mut plan = MovePlan {
        task_id: dragged.id.clone(),
        from_column: dragged.column,
        from_position: dragged.position,
        destination_column,
        destination_position: to_position(slot)?,
        sibling_shifts: Vec::new(),
    };

    if plan.is_noop() {
        tracing::debug!(task = task_id, %target, "drop onto current slot");
        return Ok(plan);
    }

    plan.sibling_shifts = match policy {
        ReorderPolicy::GapTolerant => {
            gap_tolerant_shifts(columns, task_id, destination_column, plan.destination_position)
        }
        ReorderPolicy::Compact => {
            let (index, shifts) = compact_shifts(columns, dragged, destination_column, slot)?;
            plan.destination_position = index;
            shifts
        }
    };

    tracing::debug!(
        task = task_id,
        %target,
        column = %plan.destination_column,
        position = plan.destination_position,
        shifts = plan.sibling_shifts.len(),
        policy = policy.as_str(),
        "planned move"
    );
    Ok(plan)
}

fn gap_tolerant_shifts(
    columns: &Columns,
    task_id: &str,
    column: Column,
    position: u32,
) -> Vec<SiblingShift> {
    column_rows(columns, column)
        .iter()
        .filter(|row| row.id != task_id && row.position >= position)
        .map(|row| SiblingShift {
            task_id: row.id.clone(),
            column,
            position: row.position + 1,
        })
        .collect()
}

fn compact_shifts(
    columns: &Columns,
    dragged: &TaskRow,
    destination: Column,
    slot: usize,
) -> Result<(u32, Vec<SiblingShift>)> {
    let mut ordered: Vec<&TaskRow> = column_rows(columns, destination)
        .iter()
        .filter(|row| row.id != dragged.id)
        .collect();
    let index = slot.min(ordered.len());
    ordered.insert(index, dragged);

    let mut shifts = renumber(&ordered, destination, &dragged.id)?;

    if dragged.column != destination {
        let source: Vec<&TaskRow> = column_rows(columns, dragged.column)
            .iter()
            .filter(|row| row.id != dragged.id)
            .collect();
        shifts.extend(renumber(&source, dragged.column, &dragged.id)?);
    }

    Ok((to_position(index)?, shifts))
}

fn renumber(ordered: &[&TaskRow], column: Column, skip_id: &str) -> Result<Vec<SiblingShift>> {
    let mut shifts = Vec::new();
    for (index, row) in ordered.iter().enumerate() {
        if row.id == skip_id {
            continue;
        }
        let position = to_position(index)?;
        if row.position != position {
            shifts.push(SiblingShift {
                task_id: row.id.clone(),
                column,
                position,
            });
        }
    }
    Ok(shifts)
}

fn column_rows(columns: &Columns, column: Column) -> &[TaskRow] {
    columns.get(&column).map(Vec::as_slice).unwrap_or(&[])
}

fn find_task<'a>(columns: &'a Columns, id: &str) -> Option<(&'a TaskRow, usize)> {
    columns.values().find_map(|rows| {
        rows.iter()
            .position(|row| row.id == id)
            .map(|index| (&rows[index], index))
    })
}

fn to_position(index: usize) -> Result<u32> {
    u32::try_from(index)
        .map_err(|_| Error::OperationFailed(format!("column position {index} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::{BoardState, TaskQuery};

    fn board(layout: &[(Column, &[&str])]) -> BoardState {
        let now = Utc::now();
        let mut state = BoardState::new();
        for (column, ids) in layout {
            for (position, id) in ids.iter().enumerate() {
                state
                    .apply(&BoardEvent::task_created(
                        *id,
                        *id,
                        "",
                        *column,
                        position as u32,
                        now,
                    ))
                    .expect("create");
            }
        }
        state
    }

    fn apply_plan(state: &mut BoardState, plan: MovePlan) {
        for event in plan.into_events(Utc::now()) {
            state.apply(&event).expect("apply");
        }
    }

    fn layout(state: &BoardState, column: Column) -> Vec<(String, u32)> {
        state
            .tasks(&TaskQuery::Column(column))
            .into_iter()
            .map(|row| (row.id, row.position))
            .collect()
    }

    fn slots(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(id, pos)| (id.to_string(), *pos)).collect()
    }

    fn assert_dense(state: &BoardState, column: Column) {
        let positions: Vec<u32> = layout(state, column).into_iter().map(|(_, p)| p).collect();
        let expected: Vec<u32> = (0..positions.len() as u32).collect();
        assert_eq!(positions, expected, "column {column} not dense");
    }

    #[test]
    fn column_drop_moves_across_and_compacts_source() {
        let mut state = board(&[(Column::Todo, &["a", "b"])]);
        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Column(Column::Doing),
            ReorderPolicy::Compact,
        )
        .expect("plan");
        assert_eq!(plan.destination_column, Column::Doing);
        assert_eq!(plan.destination_position, 0);

        apply_plan(&mut state, plan);
        assert_eq!(layout(&state, Column::Todo), slots(&[("b", 0)]));
        assert_eq!(layout(&state, Column::Doing), slots(&[("a", 0)]));
    }

    #[test]
    fn same_column_drop_onto_later_task_takes_its_slot() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Task("c".to_string()),
            ReorderPolicy::Compact,
        )
        .expect("plan");
        assert_eq!(plan.destination_position, 2);

        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Todo),
            slots(&[("b", 0), ("c", 1), ("a", 2)])
        );
    }

    #[test]
    fn same_column_drop_onto_earlier_task_takes_its_slot() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "c",
            &DropTarget::Task("a".to_string()),
            ReorderPolicy::Compact,
        )
        .expect("plan");

        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Todo),
            slots(&[("c", 0), ("a", 1), ("b", 2)])
        );
    }

    #[test]
    fn gap_tolerant_same_column_reorder_bumps_later_siblings() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Task("c".to_string()),
            ReorderPolicy::GapTolerant,
        )
        .expect("plan");
        assert_eq!(plan.destination_position, 2);
        assert_eq!(
            plan.sibling_shifts,
            vec![SiblingShift {
                task_id: "c".to_string(),
                column: Column::Todo,
                position: 3,
            }]
        );

        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Todo),
            slots(&[("b", 1), ("a", 2), ("c", 3)])
        );
    }

    #[test]
    fn cross_column_drop_onto_task_inserts_after_it() {
        for policy in [ReorderPolicy::Compact, ReorderPolicy::GapTolerant] {
            let mut state = board(&[(Column::Todo, &["a"]), (Column::Doing, &["x", "y"])]);
            let plan = plan_move(&state.columns(), "a", &DropTarget::Task("x".to_string()), policy)
                .expect("plan");
            assert_eq!(plan.destination_position, 1);

            apply_plan(&mut state, plan);
            assert_eq!(
                layout(&state, Column::Doing),
                slots(&[("x", 0), ("a", 1), ("y", 2)])
            );
            assert!(layout(&state, Column::Todo).is_empty());
        }
    }

    #[test]
    fn gap_tolerant_leaves_source_gap() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "b",
            &DropTarget::Column(Column::Done),
            ReorderPolicy::GapTolerant,
        )
        .expect("plan");
        assert!(plan.sibling_shifts.is_empty());

        apply_plan(&mut state, plan);
        assert_eq!(layout(&state, Column::Todo), slots(&[("a", 0), ("c", 2)]));
    }

    #[test]
    fn gap_tolerant_column_drop_appends_past_full_length() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "c",
            &DropTarget::Column(Column::Todo),
            ReorderPolicy::GapTolerant,
        )
        .expect("plan");
        assert!(!plan.is_noop());
        assert_eq!(plan.destination_position, 3);
        assert!(plan.sibling_shifts.is_empty());

        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Todo),
            slots(&[("a", 0), ("b", 1), ("c", 3)])
        );
    }

    #[test]
    fn drop_onto_own_slot_is_a_noop() {
        let state = board(&[(Column::Todo, &["a", "b", "c"])]);
        for (id, target) in [
            ("b", DropTarget::Task("b".to_string())),
            ("c", DropTarget::Column(Column::Todo)),
        ] {
            let plan = plan_move(&state.columns(), id, &target, ReorderPolicy::Compact)
                .expect("plan");
            assert!(plan.is_noop());
            assert!(plan.into_events(Utc::now()).is_empty());
        }
    }

    #[test]
    fn drop_onto_own_column_moves_to_end() {
        let mut state = board(&[(Column::Todo, &["a", "b", "c"])]);
        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Column(Column::Todo),
            ReorderPolicy::Compact,
        )
        .expect("plan");
        assert_eq!(plan.destination_position, 2);

        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Todo),
            slots(&[("b", 0), ("c", 1), ("a", 2)])
        );
    }

    #[test]
    fn dragged_move_precedes_sibling_shifts() {
        let state = board(&[(Column::Todo, &["a"]), (Column::Doing, &["x", "y"])]);
        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Task("x".to_string()),
            ReorderPolicy::Compact,
        )
        .expect("plan");
        let events = plan.into_events(Utc::now());
        let ids: Vec<&str> = events.iter().filter_map(|event| event.task_id()).collect();
        assert_eq!(ids, vec!["a", "y"]);
    }

    #[test]
    fn unknown_ids_fail_closed() {
        let state = board(&[(Column::Todo, &["a"])]);
        let err = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Task("ghost".to_string()),
            ReorderPolicy::Compact,
        )
        .expect_err("unknown target");
        assert!(matches!(err, Error::UnknownDropTarget(_)));

        let err = plan_move(
            &state.columns(),
            "ghost",
            &DropTarget::Column(Column::Done),
            ReorderPolicy::Compact,
        )
        .expect_err("unknown dragged");
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[test]
    fn compact_moves_keep_every_column_dense() {
        let ids = ["a", "b", "c", "x", "y", "z"];
        let mut targets: Vec<DropTarget> = Column::ALL.iter().map(|c| DropTarget::Column(*c)).collect();
        targets.extend(ids.iter().map(|id| DropTarget::Task(id.to_string())));

        for dragged in ids {
            for target in &targets {
                let mut state = board(&[
                    (Column::Todo, &["a", "b", "c"]),
                    (Column::Doing, &["x", "y"]),
                    (Column::Done, &["z"]),
                ]);
                let plan = plan_move(&state.columns(), dragged, target, ReorderPolicy::Compact)
                    .expect("plan");
                let destination = plan.destination_column;
                let position = plan.destination_position;
                apply_plan(&mut state, plan);

                for column in Column::ALL {
                    assert_dense(&state, column);
                }
                let row = state.task(dragged).expect("row");
                assert_eq!((row.column, row.position), (destination, position));
            }
        }
    }

    #[test]
    fn compact_repairs_existing_gaps_in_destination() {
        let now = Utc::now();
        let mut state = BoardState::new();
        for (id, position) in [("x", 0), ("y", 4), ("z", 9)] {
            state
                .apply(&BoardEvent::task_created(id, id, "", Column::Doing, position, now))
                .expect("create");
        }
        state
            .apply(&BoardEvent::task_created("a", "a", "", Column::Todo, 0, now))
            .expect("create");

        let plan = plan_move(
            &state.columns(),
            "a",
            &DropTarget::Task("y".to_string()),
            ReorderPolicy::Compact,
        )
        .expect("plan");
        apply_plan(&mut state, plan);
        assert_eq!(
            layout(&state, Column::Doing),
            slots(&[("x", 0), ("y", 1), ("a", 2), ("z", 3)])
        );
    }

    #[test]
    fn drop_target_parse_prefers_columns() {
        assert_eq!(DropTarget::parse("doing"), DropTarget::Column(Column::Doing));
        assert_eq!(
            DropTarget::parse("7f3c"),
            DropTarget::Task("7f3c".to_string())
        );
    }
}
