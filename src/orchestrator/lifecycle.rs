//! Per-query state machine.
//!
//! `Idle -> Submitting -> Answered | Malformed | Failed`. Only one query is in
//! flight per controller; the progress stage is simulated and never gates
//! completion.

use crate::client::{QueryBackend, QueryError};
use crate::model::{
    clock_time, AnswerResult, HistoryEntry, LifecycleEvent, MalformedResult, Notification,
    ProgressStage, Query,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Instant, MissedTickBehavior};

/// Number of answered queries kept for re-display.
pub const HISTORY_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    Idle,
    Submitting { query: Query },
    Answered,
    /// The server answered but the payload broke its route's invariants.
    Malformed,
    Failed,
}

impl LifecycleState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, LifecycleState::Submitting { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("question is empty")]
    EmptyQuestion,
    #[error("a query is already in flight")]
    InFlight,
}

/// How a submitted query ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Answered(HistoryEntry),
    Malformed(MalformedResult),
    Failed(String),
    /// The outcome belonged to a query that is no longer in flight.
    Stale,
}

pub struct LifecycleController {
    state: LifecycleState,
    stage: ProgressStage,
    history: VecDeque<HistoryEntry>,
    current: Option<AnswerResult>,
    tick_interval: Duration,
    event_tx: UnboundedSender<LifecycleEvent>,
}

impl LifecycleController {
    pub fn new(tick_interval: Duration, event_tx: UnboundedSender<LifecycleEvent>) -> Self {
        Self {
            state: LifecycleState::Idle,
            stage: ProgressStage::Idle,
            history: VecDeque::with_capacity(HISTORY_LIMIT + 1),
            current: None,
            tick_interval,
            event_tx,
        }
    }

    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    pub fn stage(&self) -> ProgressStage {
        self.stage
    }

    /// Answered entries, most recent first.
    pub fn history(&self) -> &VecDeque<HistoryEntry> {
        &self.history
    }

    /// Result currently on display, if any.
    pub fn current(&self) -> Option<&AnswerResult> {
        self.current.as_ref()
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    fn emit(&self, ev: LifecycleEvent) {
        let _ = self.event_tx.send(ev);
    }

    fn set_stage(&mut self, stage: ProgressStage) {
        if self.stage != stage {
            self.stage = stage;
            self.emit(LifecycleEvent::StageChanged { stage });
        }
    }

    /// Start a query. Blank questions are inert; a second query while one is
    /// in flight is refused.
    pub fn begin(&mut self, question: &str) -> Result<Query, SubmitRejected> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SubmitRejected::EmptyQuestion);
        }
        if self.state.is_submitting() {
            let rejected = SubmitRejected::InFlight;
            self.emit(LifecycleEvent::Rejected {
                reason: rejected.to_string(),
            });
            return Err(rejected);
        }

        let query = Query::new(question);
        tracing::debug!(question = %query.question, "query submitted");
        self.state = LifecycleState::Submitting {
            query: query.clone(),
        };
        self.current = None;
        self.emit(LifecycleEvent::Submitted {
            query: query.clone(),
        });
        self.set_stage(ProgressStage::IntentDetection);
        Ok(query)
    }

    /// One simulated ticker step. No-op unless a query is in flight.
    pub fn advance_stage(&mut self) {
        if !self.state.is_submitting() {
            return;
        }
        let next = self.stage.simulated_next();
        self.set_stage(next);
    }

    /// Record the outcome of `query`.
    pub fn settle(
        &mut self,
        query: &Query,
        outcome: Result<AnswerResult, QueryError>,
    ) -> Settlement {
        match &self.state {
            LifecycleState::Submitting { query: active } if active == query => {}
            _ => {
                tracing::warn!(question = %query.question, "dropping outcome of a query that is not in flight");
                return Settlement::Stale;
            }
        }

        match outcome {
            Ok(result) => match result.classify() {
                Ok(_) => {
                    let entry = HistoryEntry {
                        question: query.question.clone(),
                        answered_at: clock_time(),
                        result: result.clone(),
                    };
                    tracing::info!(
                        question = %entry.question,
                        route = %result.route.label(),
                        "query answered"
                    );
                    self.history.push_front(entry.clone());
                    self.history.truncate(HISTORY_LIMIT);
                    self.current = Some(result);
                    self.state = LifecycleState::Answered;
                    self.set_stage(ProgressStage::Complete);
                    self.emit(LifecycleEvent::Answered {
                        entry: Box::new(entry.clone()),
                        history: self.history.iter().cloned().collect(),
                    });
                    Settlement::Answered(entry)
                }
                Err(reason) => {
                    tracing::warn!(question = %query.question, %reason, "malformed answer");
                    self.current = Some(result.clone());
                    self.state = LifecycleState::Malformed;
                    self.set_stage(ProgressStage::Idle);
                    self.emit(LifecycleEvent::Malformed {
                        question: query.question.clone(),
                        result: Box::new(result),
                        reason: reason.clone(),
                    });
                    self.emit(LifecycleEvent::Notify(Notification::error(format!(
                        "Answer could not be displayed: {reason}"
                    ))));
                    Settlement::Malformed(reason)
                }
            },
            Err(err) => {
                tracing::warn!(question = %query.question, error = %err, "query failed");
                let message = err.user_message();
                self.current = None;
                self.state = LifecycleState::Failed;
                self.set_stage(ProgressStage::Idle);
                self.emit(LifecycleEvent::Failed {
                    question: query.question.clone(),
                    error: err.to_string(),
                });
                self.emit(LifecycleEvent::Notify(Notification::error(message.clone())));
                Settlement::Failed(message)
            }
        }
    }

    /// Re-display a stored answer without contacting the backend.
    ///
    /// Ignored while a query is in flight.
    pub fn select_history(&mut self, index: usize) -> Option<&AnswerResult> {
        if self.state.is_submitting() {
            return None;
        }
        let entry = self.history.get(index)?.clone();
        self.current = Some(entry.result.clone());
        self.emit(LifecycleEvent::Displayed {
            entry: Box::new(entry),
        });
        self.current.as_ref()
    }

    /// Ticker for one in-flight query; the first step fires one interval after submission.
    pub(crate) fn ticker(&self) -> tokio::time::Interval {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Submit a question and drive it to settlement.
    ///
    /// The request and the progress ticker run side by side; the ticker is
    /// dropped as soon as the request resolves, on every path.
    pub async fn submit(
        &mut self,
        backend: &dyn QueryBackend,
        question: &str,
    ) -> Result<Settlement, SubmitRejected> {
        let query = self.begin(question)?;
        let outcome = {
            let request = backend.submit(&query.question);
            tokio::pin!(request);
            let mut ticker = self.ticker();
            loop {
                tokio::select! {
                    biased;
                    outcome = &mut request => break outcome,
                    _ = ticker.tick() => self.advance_stage(),
                }
            }
        };
        Ok(self.settle(&query, outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Route, StructuredEvidence};
    use tokio::sync::mpsc;

    fn controller() -> (LifecycleController, mpsc::UnboundedReceiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (LifecycleController::new(Duration::from_millis(800), tx), rx)
    }

    fn sql_answer() -> AnswerResult {
        AnswerResult {
            route: Route::Sql.into(),
            narrative: String::new(),
            structured_evidence: Some(StructuredEvidence::default()),
            document_evidence: None,
        }
    }

    #[test]
    fn blank_question_is_inert() {
        let (mut c, mut rx) = controller();
        assert_eq!(c.begin("   \t"), Err(SubmitRejected::EmptyQuestion));
        assert_eq!(c.state(), &LifecycleState::Idle);
        assert_eq!(c.stage(), ProgressStage::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn second_begin_while_in_flight_is_rejected() {
        let (mut c, _rx) = controller();
        let q = c.begin("How many customers?").unwrap();
        assert_eq!(q.question, "How many customers?");
        assert_eq!(c.begin("another"), Err(SubmitRejected::InFlight));
        assert!(matches!(c.state(), LifecycleState::Submitting { query } if query == &q));
    }

    #[test]
    fn begin_trims_and_sets_first_stage() {
        let (mut c, _rx) = controller();
        let q = c.begin("  refund policy  ").unwrap();
        assert_eq!(q.question, "refund policy");
        assert_eq!(c.stage(), ProgressStage::IntentDetection);
    }

    #[test]
    fn advance_is_capped_and_ignored_when_idle() {
        let (mut c, _rx) = controller();
        c.advance_stage();
        assert_eq!(c.stage(), ProgressStage::Idle);
        c.begin("q").unwrap();
        for _ in 0..6 {
            c.advance_stage();
        }
        assert_eq!(c.stage(), ProgressStage::DocumentRetrieval);
    }

    #[test]
    fn stale_outcome_is_dropped() {
        let (mut c, _rx) = controller();
        let first = c.begin("first").unwrap();
        c.settle(&first, Ok(sql_answer()));
        assert_eq!(c.settle(&first, Ok(sql_answer())), Settlement::Stale);
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn malformed_answer_is_not_recorded() {
        let (mut c, _rx) = controller();
        let q = c.begin("hybrid question").unwrap();
        let mut result = sql_answer();
        result.route = Route::Hybrid.into();
        let settled = c.settle(&q, Ok(result));
        assert!(matches!(settled, Settlement::Malformed(_)));
        assert!(c.history().is_empty());
        assert_eq!(c.state(), &LifecycleState::Malformed);
        assert_eq!(c.stage(), ProgressStage::Idle);
        assert!(c.current().is_some());
    }

    #[test]
    fn failure_notifies_with_server_detail() {
        let (mut c, mut rx) = controller();
        let q = c.begin("q").unwrap();
        let settled = c.settle(
            &q,
            Err(QueryError::Server {
                status: 500,
                message: Some("SQL generation failed".into()),
            }),
        );
        assert_eq!(settled, Settlement::Failed("SQL generation failed".into()));
        let mut notified = None;
        while let Ok(ev) = rx.try_recv() {
            if let LifecycleEvent::Notify(n) = ev {
                notified = Some(n);
            }
        }
        assert_eq!(
            notified,
            Some(Notification::error("SQL generation failed"))
        );
    }

    #[test]
    fn select_history_is_refused_while_submitting() {
        let (mut c, _rx) = controller();
        let q = c.begin("q").unwrap();
        c.settle(&q, Ok(sql_answer()));
        c.begin("next").unwrap();
        assert!(c.select_history(0).is_none());
    }

    #[test]
    fn answer_time_is_clock_formatted() {
        let t = clock_time();
        assert_eq!(t.len(), 8);
        assert_eq!(t.as_bytes()[2], b':');
    }
}
