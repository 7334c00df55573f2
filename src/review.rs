use crossterm::event::KeyCode;

use crate::models::{Job, JobStatus};
use crate::status::StatusHook;

/// Where keyboard input is currently going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFocus {
    #[default]
    Normal,
    /// A text field owns the keyboard; shortcuts must not fire.
    TextInput,
}

/// Something the caller has to carry out after a review shortcut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Navigated,
    /// The key was consumed but nothing changed.
    Unchanged,
    Exited,
    SetStatus { job_id: String, status: JobStatus },
    OpenOriginal { url: String },
}

#[derive(Debug, Clone)]
struct Session {
    snapshot: Vec<Job>,
    index: usize,
}

/// One-job-at-a-time review over a frozen copy of the filtered list.
///
/// The snapshot ignores later fetches; only `advance_with_update` may touch
/// it, and only by swapping a single record in place.
#[derive(Debug, Clone, Default)]
pub struct ReviewMode {
    session: Option<Session>,
}

impl ReviewMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn enter(&mut self, jobs: &[Job], start: &Job) {
        if jobs.is_empty() {
            return;
        }
        let index = jobs.iter().position(|j| j.id == start.id).unwrap_or(0);
        self.session = Some(Session {
            snapshot: jobs.to_vec(),
            index,
        });
    }

    pub fn exit(&mut self) {
        self.session = None;
    }

    pub fn go_next(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.index + 1 < session.snapshot.len() {
                session.index += 1;
            }
        }
    }

    pub fn go_prev(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.index = session.index.saturating_sub(1);
        }
    }

    /// Swap in the updated record and move on, unless already at the end.
    pub fn advance_with_update(&mut self, updated: &Job) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for job in session.snapshot.iter_mut().filter(|j| j.id == updated.id) {
            *job = updated.clone();
        }
        if session.index + 1 < session.snapshot.len() {
            session.index += 1;
        }
    }

    pub fn current_job(&self) -> Option<&Job> {
        self.session.as_ref().and_then(|s| s.snapshot.get(s.index))
    }

    pub fn current_index(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.index)
    }

    pub fn total(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.snapshot.len())
    }

    pub fn has_prev(&self) -> bool {
        self.current_index() > 0
    }

    pub fn has_next(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.index + 1 < s.snapshot.len())
    }

    /// Dispatch a review shortcut. Returns `None` when the key was not
    /// intercepted: review is inactive, a text field has focus, or the key
    /// is not a review shortcut.
    pub fn handle_key(&mut self, key: KeyCode, focus: InputFocus) -> Option<ReviewAction> {
        if focus == InputFocus::TextInput || !self.is_active() {
            return None;
        }

        match key {
            KeyCode::Right | KeyCode::Char('e') | KeyCode::Char('E') => {
                self.go_next();
                Some(ReviewAction::Navigated)
            }
            KeyCode::Left | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.go_prev();
                Some(ReviewAction::Navigated)
            }
            KeyCode::Esc => {
                self.exit();
                Some(ReviewAction::Exited)
            }
            KeyCode::Char('a') | KeyCode::Char('A') => self.status_action(JobStatus::Applied),
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Char('x') | KeyCode::Char('X') => {
                self.status_action(JobStatus::Irrelevant)
            }
            KeyCode::Char('r') | KeyCode::Char('R') => self.status_action(JobStatus::Reviewed),
            KeyCode::Char('o') | KeyCode::Char('O') => {
                self.current_job().map(|job| ReviewAction::OpenOriginal {
                    url: job.url.clone(),
                })
            }
            _ => None,
        }
    }

    fn status_action(&self, status: JobStatus) -> Option<ReviewAction> {
        let job = self.current_job()?;
        if job.status == status {
            return Some(ReviewAction::Unchanged);
        }
        Some(ReviewAction::SetStatus {
            job_id: job.job_id.clone(),
            status,
        })
    }
}

impl StatusHook for ReviewMode {
    fn after_status_change(&mut self, updated: &Job) {
        self.advance_with_update(updated);
    }
}
