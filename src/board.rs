//! Board controller: transient interaction state over a [`TaskStore`].
//!
//! Drag, add-task, and edit state live here and are never persisted. Only
//! their outcomes reach the store, as event batches.

use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::log::EventLog;
use crate::reconcile::{plan_move, DropTarget, MovePlan, ReorderPolicy};
use crate::store::{CommitReport, TaskStore};
use crate::task::{new_task_id, BoardEvent, Column};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Dragging { active_task_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddTaskModal {
    Closed,
    Open {
        column: Column,
        draft_title: String,
        draft_description: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EditDraft {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardMode<'a> {
    Viewing,
    Editing(&'a EditDraft),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DragOutcome {
    /// `drag_end` without a preceding `drag_start`
    NotDragging,
    /// Dropped outside any target
    Cancelled,
    /// Dropped onto the task's current slot
    Unchanged { plan: MovePlan },
    Moved { plan: MovePlan, report: CommitReport },
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Created { id: String, report: CommitReport },
    /// Blank title; nothing emitted and the modal stays open
    Rejected,
    /// No modal was open
    Closed,
}

pub struct BoardController<L: EventLog> {
    store: TaskStore<L>,
    policy: ReorderPolicy,
    drag: DragState,
    add_task: AddTaskModal,
    edits: HashMap<String, EditDraft>,
}

impl<L: EventLog> BoardController<L> {
    pub fn new(store: TaskStore<L>, policy: ReorderPolicy) -> Self {
        Self {
            store,
            policy,
            drag: DragState::Idle,
            add_task: AddTaskModal::Closed,
            edits: HashMap::new(),
        }
    }

    pub fn store(&self) -> &TaskStore<L> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TaskStore<L> {
        &mut self.store
    }

    pub fn into_store(self) -> TaskStore<L> {
        self.store
    }

    pub fn policy(&self) -> ReorderPolicy {
        self.policy
    }

    // =========================================================================
    // Drag lifecycle
    // =========================================================================

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    pub fn drag_start(&mut self, task_id: impl Into<String>) {
        self.drag = DragState::Dragging {
            active_task_id: task_id.into(),
        };
    }

    /// Finish a drag. The controller is back to idle whatever the outcome;
    /// on error nothing was committed.
    pub fn drag_end(&mut self, target: Option<DropTarget>) -> Result<DragOutcome> {
        let active = match std::mem::replace(&mut self.drag, DragState::Idle) {
            DragState::Idle => return Ok(DragOutcome::NotDragging),
            DragState::Dragging { active_task_id } => active_task_id,
        };

        let target = match target {
            Some(target) => target,
            None => return Ok(DragOutcome::Cancelled),
        };

        // Plan against the latest log so shifts never rewrite newer moves.
        self.store.pull()?;
        let plan = plan_move(&self.store.columns(), &active, &target, self.policy)?;
        if plan.is_noop() {
            return Ok(DragOutcome::Unchanged { plan });
        }

        let report = self.store.commit(plan.clone().into_events(Utc::now()))?;
        Ok(DragOutcome::Moved { plan, report })
    }

    /// Drag `task_id` and drop it on `target` in one step.
    pub fn move_task(&mut self, task_id: &str, target: DropTarget) -> Result<DragOutcome> {
        self.drag_start(task_id);
        self.drag_end(Some(target))
    }

    // =========================================================================
    // Add-task modal
    // =========================================================================

    pub fn add_task_modal(&self) -> &AddTaskModal {
        &self.add_task
    }

    pub fn open_add_task(&mut self, column: Column) {
        self.add_task = AddTaskModal::Open {
            column,
            draft_title: String::new(),
            draft_description: String::new(),
        };
    }

    pub fn set_add_task_title(&mut self, title: impl Into<String>) {
        if let AddTaskModal::Open { draft_title, .. } = &mut self.add_task {
            *draft_title = title.into();
        }
    }

    pub fn set_add_task_description(&mut self, description: impl Into<String>) {
        if let AddTaskModal::Open {
            draft_description, ..
        } = &mut self.add_task
        {
            *draft_description = description.into();
        }
    }

    pub fn cancel_add_task(&mut self) {
        self.add_task = AddTaskModal::Closed;
    }

    pub fn submit_add_task(&mut self) -> Result<SubmitOutcome> {
        let (column, title, description) = match &self.add_task {
            AddTaskModal::Closed => return Ok(SubmitOutcome::Closed),
            AddTaskModal::Open {
                column,
                draft_title,
                draft_description,
            } => (*column, draft_title.clone(), draft_description.clone()),
        };
        let outcome = self.create_task(column, &title, description)?;
        if matches!(outcome, SubmitOutcome::Created { .. }) {
            self.add_task = AddTaskModal::Closed;
        }
        Ok(outcome)
    }

    /// Create a task at the end of `column`. The title is trimmed; a blank
    /// one is `Rejected` and nothing is committed.
    pub fn create_task(
        &mut self,
        column: Column,
        title: &str,
        description: String,
    ) -> Result<SubmitOutcome> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(SubmitOutcome::Rejected);
        }

        self.store.pull()?;
        let id = new_task_id();
        let position = self.store.next_position(column);
        let report = self.store.commit(vec![BoardEvent::task_created(
            id.clone(),
            title.to_string(),
            description,
            column,
            position,
            Utc::now(),
        )])?;
        Ok(SubmitOutcome::Created { id, report })
    }

    // =========================================================================
    // Card editing
    // =========================================================================

    pub fn card_mode(&self, task_id: &str) -> CardMode<'_> {
        match self.edits.get(task_id) {
            Some(draft) => CardMode::Editing(draft),
            None => CardMode::Viewing,
        }
    }

    /// Enter editing, seeding the draft from the current row.
    pub fn begin_edit(&mut self, task_id: &str) -> Result<&EditDraft> {
        let row = self
            .store
            .task(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;
        let draft = EditDraft {
            title: row.title.clone(),
            description: row.description.clone(),
        };
        let entry = self.edits.entry(task_id.to_string()).or_default();
        *entry = draft;
        Ok(&*entry)
    }

    pub fn edit_draft(
        &mut self,
        task_id: &str,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let draft = self.editing(task_id)?;
        if let Some(title) = title {
            draft.title = title;
        }
        if let Some(description) = description {
            draft.description = description;
        }
        Ok(())
    }

    /// Emit the draft as `v1.TaskUpdated` and return to viewing.
    pub fn save_edit(&mut self, task_id: &str) -> Result<CommitReport> {
        let draft = self.editing(task_id)?.clone();
        let report = self.store.commit(vec![BoardEvent::task_updated(
            task_id,
            Some(draft.title),
            Some(draft.description),
            Utc::now(),
        )])?;
        self.edits.remove(task_id);
        Ok(report)
    }

    /// Discard the draft. Returns false if the card was not being edited.
    pub fn cancel_edit(&mut self, task_id: &str) -> bool {
        self.edits.remove(task_id).is_some()
    }

    pub fn delete_task(&mut self, task_id: &str) -> Result<CommitReport> {
        self.edits.remove(task_id);
        self.store.commit(vec![BoardEvent::task_deleted(task_id)])
    }

    fn editing(&mut self, task_id: &str) -> Result<&mut EditDraft> {
        self.edits.get_mut(task_id).ok_or_else(|| {
            Error::InvalidArgument(format!("task {task_id} is not being edited"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::projection::TaskQuery;

    fn controller() -> (BoardController<MemoryLog>, MemoryLog) {
        let log = MemoryLog::new();
        let store = TaskStore::open(log.clone(), Some("tab".to_string())).expect("open");
        (BoardController::new(store, ReorderPolicy::Compact), log)
    }

    fn add(board: &mut BoardController<MemoryLog>, column: Column, title: &str) -> String {
        board.open_add_task(column);
        board.set_add_task_title(title);
        match board.submit_add_task().expect("submit") {
            SubmitOutcome::Created { id, .. } => id,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    fn titles(board: &BoardController<MemoryLog>, column: Column) -> Vec<(String, u32)> {
        board
            .store()
            .tasks(&TaskQuery::Column(column))
            .into_iter()
            .map(|row| (row.title, row.position))
            .collect()
    }

    #[test]
    fn add_task_appends_to_column_and_closes_modal() {
        let (mut board, _) = controller();
        add(&mut board, Column::Todo, "  first ");
        add(&mut board, Column::Todo, "second");

        assert_eq!(board.add_task_modal(), &AddTaskModal::Closed);
        assert_eq!(
            titles(&board, Column::Todo),
            vec![("first".to_string(), 0), ("second".to_string(), 1)]
        );
    }

    #[test]
    fn add_task_carries_description() {
        let (mut board, log) = controller();
        board.open_add_task(Column::Doing);
        board.set_add_task_title("with notes");
        board.set_add_task_description("details");
        let id = match board.submit_add_task().expect("submit") {
            SubmitOutcome::Created { id, .. } => id,
            other => panic!("unexpected outcome: {other:?}"),
        };

        assert_eq!(board.store().task(&id).expect("row").description, "details");
        assert_eq!(log.len().expect("len"), 1);
    }

    #[test]
    fn blank_title_is_rejected_locally() {
        let (mut board, log) = controller();
        board.open_add_task(Column::Doing);
        board.set_add_task_title("   ");

        assert!(matches!(
            board.submit_add_task().expect("submit"),
            SubmitOutcome::Rejected
        ));
        assert!(matches!(board.add_task_modal(), AddTaskModal::Open { .. }));
        assert!(log.is_empty().expect("empty"));
    }

    #[test]
    fn cancel_add_task_discards_input() {
        let (mut board, log) = controller();
        board.open_add_task(Column::Done);
        board.set_add_task_title("never");
        board.cancel_add_task();

        assert!(matches!(
            board.submit_add_task().expect("submit"),
            SubmitOutcome::Closed
        ));
        assert!(log.is_empty().expect("empty"));
    }

    #[test]
    fn drag_lifecycle_moves_and_returns_to_idle() {
        let (mut board, log) = controller();
        let a = add(&mut board, Column::Todo, "A");
        add(&mut board, Column::Todo, "B");

        board.drag_start(a.clone());
        assert_eq!(
            board.drag_state(),
            &DragState::Dragging {
                active_task_id: a.clone()
            }
        );
        let outcome = board
            .drag_end(Some(DropTarget::Column(Column::Doing)))
            .expect("drag end");
        assert!(matches!(outcome, DragOutcome::Moved { .. }));
        assert_eq!(board.drag_state(), &DragState::Idle);

        assert_eq!(titles(&board, Column::Todo), vec![("B".to_string(), 0)]);
        assert_eq!(titles(&board, Column::Doing), vec![("A".to_string(), 0)]);
        // two creates + dragged move + source compaction
        assert_eq!(log.len().expect("len"), 4);
    }

    #[test]
    fn drop_outside_any_target_emits_nothing() {
        let (mut board, log) = controller();
        let a = add(&mut board, Column::Todo, "A");

        board.drag_start(a);
        let outcome = board.drag_end(None).expect("drag end");
        assert!(matches!(outcome, DragOutcome::Cancelled));
        assert_eq!(board.drag_state(), &DragState::Idle);
        assert_eq!(log.len().expect("len"), 1);
    }

    #[test]
    fn drag_end_without_start_is_ignored() {
        let (mut board, _) = controller();
        let outcome = board
            .drag_end(Some(DropTarget::Column(Column::Done)))
            .expect("drag end");
        assert!(matches!(outcome, DragOutcome::NotDragging));
    }

    #[test]
    fn drop_onto_own_slot_emits_nothing() {
        let (mut board, log) = controller();
        let a = add(&mut board, Column::Todo, "A");
        let before = board.store().state().clone();

        let outcome = board
            .move_task(&a, DropTarget::Task(a.clone()))
            .expect("move");
        assert!(matches!(outcome, DragOutcome::Unchanged { .. }));
        assert_eq!(log.len().expect("len"), 1);
        assert_eq!(board.store().state(), &before);
    }

    #[test]
    fn unknown_drop_target_aborts_without_events() {
        let (mut board, log) = controller();
        let a = add(&mut board, Column::Todo, "A");

        board.drag_start(a);
        let err = board
            .drag_end(Some(DropTarget::Task("ghost".to_string())))
            .expect_err("unknown target");
        assert!(matches!(err, Error::UnknownDropTarget(_)));
        assert_eq!(board.drag_state(), &DragState::Idle);
        assert_eq!(log.len().expect("len"), 1);
    }

    #[test]
    fn edit_save_emits_update_and_returns_to_viewing() {
        let (mut board, _) = controller();
        let a = add(&mut board, Column::Todo, "A");

        let draft = board.begin_edit(&a).expect("begin");
        assert_eq!(draft.title, "A");
        assert!(matches!(board.card_mode(&a), CardMode::Editing(_)));

        board
            .edit_draft(&a, Some("Renamed".to_string()), Some("details".to_string()))
            .expect("edit");
        board.save_edit(&a).expect("save");

        assert_eq!(board.card_mode(&a), CardMode::Viewing);
        let row = board.store().task(&a).expect("row");
        assert_eq!(row.title, "Renamed");
        assert_eq!(row.description, "details");
    }

    #[test]
    fn edit_cancel_discards_draft() {
        let (mut board, log) = controller();
        let a = add(&mut board, Column::Todo, "A");

        board.begin_edit(&a).expect("begin");
        board
            .edit_draft(&a, Some("Nope".to_string()), None)
            .expect("edit");
        assert!(board.cancel_edit(&a));
        assert!(!board.cancel_edit(&a));

        assert_eq!(board.store().task(&a).expect("row").title, "A");
        assert_eq!(log.len().expect("len"), 1);
        assert!(board.save_edit(&a).is_err());
    }

    #[test]
    fn begin_edit_unknown_task_fails() {
        let (mut board, _) = controller();
        let err = board.begin_edit("ghost").expect_err("unknown");
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[test]
    fn drag_plans_against_moves_from_other_sessions() {
        let (mut first, log) = controller();
        let a = add(&mut first, Column::Todo, "A");
        let b = add(&mut first, Column::Todo, "B");
        add(&mut first, Column::Todo, "C");

        let store = TaskStore::open(log.clone(), Some("tab-2".to_string())).expect("open");
        let mut second = BoardController::new(store, ReorderPolicy::Compact);

        first
            .move_task(&b, DropTarget::Column(Column::Done))
            .expect("first move");
        second
            .move_task(&a, DropTarget::Column(Column::Doing))
            .expect("second move");
        first.store_mut().pull().expect("pull");

        for board in [&first, &second] {
            assert_eq!(titles(board, Column::Todo), vec![("C".to_string(), 0)]);
            assert_eq!(titles(board, Column::Doing), vec![("A".to_string(), 0)]);
            assert_eq!(titles(board, Column::Done), vec![("B".to_string(), 0)]);
        }
        assert_eq!(first.store().state(), second.store().state());
    }

    #[test]
    fn create_task_appends_after_tasks_from_other_sessions() {
        let (mut first, log) = controller();
        let store = TaskStore::open(log.clone(), Some("tab-2".to_string())).expect("open");
        let mut second = BoardController::new(store, ReorderPolicy::Compact);

        add(&mut first, Column::Todo, "mine");
        let outcome = second
            .create_task(Column::Todo, "  theirs ", String::new())
            .expect("create");
        assert!(matches!(outcome, SubmitOutcome::Created { .. }));
        assert_eq!(
            titles(&second, Column::Todo),
            vec![("mine".to_string(), 0), ("theirs".to_string(), 1)]
        );

        let blank = second
            .create_task(Column::Todo, " \t ", String::new())
            .expect("blank");
        assert!(matches!(blank, SubmitOutcome::Rejected));
        assert_eq!(log.len().expect("len"), 2);
    }

    #[test]
    fn delete_then_stale_move_is_harmless() {
        let (mut board, _) = controller();
        let a = add(&mut board, Column::Todo, "A");
        board.delete_task(&a).expect("delete");

        let report = board
            .store_mut()
            .commit(vec![BoardEvent::task_moved(&a, Column::Done, 0, Utc::now())])
            .expect("stale move");
        assert_eq!(report.materialized.missing, 1);
        assert!(board.store().tasks(&TaskQuery::All).is_empty());
    }
}
