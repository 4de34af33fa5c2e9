use crate::model::{
    AnswerResult, HistoryEntry, LifecycleEvent, Notification, ProgressStage, Severity,
};
use crate::presenter::{render, ResultView};
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};

pub const TAB_ANSWER: usize = 0;
pub const TAB_HISTORY: usize = 1;
pub const TAB_HELP: usize = 2;

#[derive(Default)]
pub struct UiState {
    pub tab: usize,
    /// Question being typed.
    pub input: String,
    pub submitting: bool,
    /// Question of the query in flight or last settled.
    pub asked: Option<String>,
    pub stage: ProgressStage,

    pub current: Option<AnswerResult>,
    // Rendered once per displayed result; drawing only reads it.
    pub view: Option<ResultView>,
    pub disclosure_open: bool,

    pub history: Vec<HistoryEntry>,
    pub history_selected: usize, // 0 = most recent
    pub notice: Option<Notification>,
}

impl UiState {
    fn show(&mut self, result: AnswerResult) {
        self.view = Some(render(&result));
        self.current = Some(result);
        self.disclosure_open = false;
    }

    pub fn notify(&mut self, n: Notification) {
        self.notice = Some(n);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(Notification::success(message));
    }

    pub fn selected_entry(&self) -> Option<&HistoryEntry> {
        self.history.get(self.history_selected)
    }

    /// Generated SQL of the displayed answer, if it has one.
    pub fn current_statement(&self) -> Option<&str> {
        self.current
            .as_ref()?
            .structured_evidence
            .as_ref()
            .map(|s| s.statement.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn select_up(&mut self) {
        self.history_selected = self.history_selected.saturating_sub(1);
    }

    pub fn select_down(&mut self) {
        if self.history_selected + 1 < self.history.len() {
            self.history_selected += 1;
        }
    }
}

pub fn apply_event(state: &mut UiState, ev: LifecycleEvent) {
    match ev {
        LifecycleEvent::Submitted { query } => {
            state.submitting = true;
            state.asked = Some(query.question);
            state.current = None;
            state.view = None;
            state.notice = None;
        }
        LifecycleEvent::StageChanged { stage } => state.stage = stage,
        LifecycleEvent::Answered { entry, history } => {
            state.submitting = false;
            state.history = history;
            state.history_selected = 0;
            state.show(entry.result);
        }
        LifecycleEvent::Malformed { result, .. } => {
            state.submitting = false;
            state.show(*result);
        }
        LifecycleEvent::Failed { .. } => {
            state.submitting = false;
        }
        LifecycleEvent::Rejected { reason } => {
            state.notify(Notification::error(reason));
        }
        LifecycleEvent::Displayed { entry } => {
            state.asked = Some(entry.question);
            state.show(entry.result);
            state.tab = TAB_ANSWER;
        }
        LifecycleEvent::Notify(n) => state.notify(n),
    }
}

pub fn notice_line(n: &Notification) -> Line<'static> {
    let (marker, color) = match n.severity {
        Severity::Success => ("✓ ", Color::Green),
        Severity::Error => ("✗ ", Color::Red),
    };
    Line::from(vec![
        Span::styled(marker, Style::default().fg(color)),
        Span::raw(n.message.clone()),
    ])
}
