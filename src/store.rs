//! Task store: a projection kept in step with an event log.
//!
//! Every write goes through [`TaskStore::commit`]. The batch is validated
//! against a scratch copy of the projection, appended to the log, and then
//! materialized by reading the log back from the store's cursor. Local and
//! foreign events are therefore applied in exactly the log's order.
//!
//! Reads are reactive: [`TaskStore::subscribe`] registers a query whose
//! callback runs synchronously whenever a commit or pull changes its result.

use serde::Serialize;

use crate::error::Result;
use crate::log::EventLog;
use crate::projection::{BoardState, Columns, Materialized, TaskQuery};
use crate::task::{BoardEvent, ChatMessage, Column, StoredEvent, TaskRow};

pub type SubscriptionId = u64;

type Callback = Box<dyn FnMut(&[TaskRow])>;

struct Subscription {
    id: SubscriptionId,
    query: TaskQuery,
    last: Vec<TaskRow>,
    callback: Callback,
}

/// An event from the log that could not be materialized.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedEvent {
    pub event_id: String,
    pub name: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PullReport {
    /// Events that changed the projection
    pub applied: usize,
    /// Events that targeted rows which no longer exist
    pub missing: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedEvent>,
}

impl PullReport {
    pub fn total(&self) -> usize {
        self.applied + self.missing + self.rejected.len()
    }

    fn merge(&mut self, other: PullReport) {
        self.applied += other.applied;
        self.missing += other.missing;
        self.rejected.extend(other.rejected);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub events: Vec<StoredEvent>,
    /// Everything materialized during the commit, foreign events included
    pub materialized: PullReport,
}

impl CommitReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub struct TaskStore<L: EventLog> {
    log: L,
    state: BoardState,
    cursor: usize,
    session: Option<String>,
    subscriptions: Vec<Subscription>,
    next_subscription: SubscriptionId,
    rejected: Vec<RejectedEvent>,
}

impl<L: EventLog> TaskStore<L> {
    /// Open a store on `log`, replaying everything already in it.
    pub fn open(log: L, session: Option<String>) -> Result<Self> {
        let mut store = Self {
            log,
            state: BoardState::new(),
            cursor: 0,
            session,
            subscriptions: Vec::new(),
            next_subscription: 1,
            rejected: Vec::new(),
        };
        let report = store.ingest()?;
        tracing::info!(
            events = report.total(),
            tasks = store.state.task_count(),
            rejected = report.rejected.len(),
            "store opened"
        );
        Ok(store)
    }

    /// Validate and append a batch of events as one unit.
    ///
    /// Any event failing against the current projection rejects the whole
    /// batch and nothing is appended.
    pub fn commit(&mut self, events: Vec<BoardEvent>) -> Result<CommitReport> {
        let mut materialized = self.ingest()?;

        if events.is_empty() {
            self.notify();
            return Ok(CommitReport {
                batch_id: None,
                events: Vec::new(),
                materialized,
            });
        }

        let validated = self.validate(&events);
        if let Err(err) = validated {
            self.notify();
            return Err(err);
        }

        let batch = StoredEvent::batch(events, self.session.as_deref());
        self.log.append(&batch)?;
        materialized.merge(self.ingest()?);
        self.notify();

        let batch_id = batch.first().map(|stored| stored.batch_id.clone());
        tracing::info!(
            batch = batch_id.as_deref().unwrap_or(""),
            events = batch.len(),
            session = self.session.as_deref().unwrap_or(""),
            "committed"
        );

        Ok(CommitReport {
            batch_id,
            events: batch,
            materialized,
        })
    }

    /// Materialize events other sessions appended since the last read.
    pub fn pull(&mut self) -> Result<PullReport> {
        let report = self.ingest()?;
        if report.total() > 0 {
            tracing::info!(events = report.total(), "pulled");
            self.notify();
        }
        Ok(report)
    }

    /// Register a reactive query. The callback runs once immediately with the
    /// current rows, then after every change to the query's result.
    pub fn subscribe<F>(&mut self, query: TaskQuery, callback: F) -> SubscriptionId
    where
        F: FnMut(&[TaskRow]) + 'static,
    {
        let id = self.next_subscription;
        self.next_subscription += 1;

        let rows = self.state.tasks(&query);
        let mut callback: Callback = Box::new(callback);
        callback(&rows);
        self.subscriptions.push(Subscription {
            id,
            query,
            last: rows,
            callback,
        });
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        before != self.subscriptions.len()
    }

    pub fn tasks(&self, query: &TaskQuery) -> Vec<TaskRow> {
        self.state.tasks(query)
    }

    pub fn task(&self, id: &str) -> Option<&TaskRow> {
        self.state.task(id)
    }

    pub fn columns(&self) -> Columns {
        self.state.columns()
    }

    pub fn next_position(&self, column: Column) -> u32 {
        self.state.next_position(column)
    }

    pub fn chat_messages(&self) -> &[ChatMessage] {
        self.state.chat_messages()
    }

    pub fn chat_session(&self) -> Option<&str> {
        self.state.chat_session()
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Number of log events this store has read.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Events skipped since the store was opened.
    pub fn rejected(&self) -> &[RejectedEvent] {
        &self.rejected
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// The full log, for replay checks and export.
    pub fn events(&self) -> Result<Vec<StoredEvent>> {
        self.log.read_all()
    }

    fn validate(&self, events: &[BoardEvent]) -> Result<()> {
        let mut scratch = self.state.clone();
        for event in events {
            scratch.apply(event)?;
        }
        Ok(())
    }

    fn ingest(&mut self) -> Result<PullReport> {
        let pending = self.log.read_from(self.cursor)?;
        let mut report = PullReport::default();

        for stored in pending {
            match self.state.apply(&stored.event) {
                Ok(Materialized::Missing) => report.missing += 1,
                Ok(_) => report.applied += 1,
                Err(err) => {
                    tracing::warn!(
                        event_id = %stored.event_id,
                        event = stored.event.name(),
                        error = %err,
                        "skipping event that cannot be materialized"
                    );
                    let rejected = RejectedEvent {
                        event_id: stored.event_id.clone(),
                        name: stored.event.name(),
                        reason: err.to_string(),
                    };
                    self.rejected.push(rejected.clone());
                    report.rejected.push(rejected);
                }
            }
            self.cursor += 1;
        }

        Ok(report)
    }

    fn notify(&mut self) {
        let state = &self.state;
        for subscription in &mut self.subscriptions {
            let rows = state.tasks(&subscription.query);
            if rows != subscription.last {
                (subscription.callback)(&rows);
                subscription.last = rows;
            }
        }
    }
}
