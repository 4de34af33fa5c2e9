//! Long-lived controller task for interactive surfaces.
//!
//! Receives commands from the UI, runs at most one query at a time, and
//! emits lifecycle events back to the presentation layer.

use super::lifecycle::{LifecycleController, SubmitRejected};
use crate::client::{QueryBackend, QueryError};
use crate::model::{AnswerResult, Query};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Submit(String),
    SelectHistory(usize),
    Quit,
}

/// Internal handle for the query currently in flight.
struct InFlight {
    query: Query,
    handle: tokio::task::JoinHandle<Result<AnswerResult, QueryError>>,
}

fn start_query(backend: &Arc<dyn QueryBackend>, query: Query) -> InFlight {
    let backend = Arc::clone(backend);
    let question = query.question.clone();
    let handle = tokio::spawn(async move { backend.submit(&question).await });
    InFlight { query, handle }
}

/// Drive `controller` from UI commands until `Quit` or the command channel closes.
pub async fn run_controller(
    backend: Arc<dyn QueryBackend>,
    mut controller: LifecycleController,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut in_flight: Option<InFlight> = None;
    let mut ticker = controller.ticker();

    let res = loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Submit(question)) => match controller.begin(&question) {
                        Ok(query) => {
                            in_flight = Some(start_query(&backend, query));
                            ticker = controller.ticker();
                        }
                        Err(SubmitRejected::EmptyQuestion) => {}
                        Err(e) => tracing::debug!(error = %e, "submit refused"),
                    },
                    Some(UiCommand::SelectHistory(index)) => {
                        if controller.select_history(index).is_none() {
                            tracing::debug!(index, "history selection ignored");
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // No cancel contract with the backend; the request is simply abandoned.
                        if let Some(f) = in_flight.take() {
                            f.handle.abort();
                        }
                        break Ok(());
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(f) = &mut in_flight {
                    return Some((&mut f.handle).await);
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    if let Some(f) = in_flight.take() {
                        let outcome = match join_res {
                            Ok(outcome) => outcome,
                            Err(e) => Err(QueryError::Network(format!("query task failed: {e}"))),
                        };
                        controller.settle(&f.query, outcome);
                    }
                }
            }
            _ = ticker.tick(), if in_flight.is_some() => {
                controller.advance_stage();
            }
        }
    };

    tracing::debug!(entries = controller.history().len(), "controller stopped");
    res
}
