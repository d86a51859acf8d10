use crate::orchestrator::{CloseReason, ReviewView, Status, UiCommand};
use crossterm::event::{KeyCode, KeyModifiers};

/// What a key press means for the dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Up,
    Down,
    ToggleHelp,
    Command(UiCommand),
    None,
}

pub(crate) struct UiState {
    pub title: String,
    pub view: Option<ReviewView>,
    /// Index into the flattened, section-ordered change list.
    pub cursor: usize,
    pub show_help: bool,
    pub closed: Option<CloseReason>,
}

impl UiState {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            view: None,
            cursor: 0,
            show_help: false,
            closed: None,
        }
    }

    pub fn apply_view(&mut self, view: ReviewView) {
        let len = ordered_ids(&view).len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
        self.view = Some(view);
    }

    pub fn move_cursor(&mut self, down: bool) {
        let len = self.view.as_ref().map(|v| ordered_ids(v).len()).unwrap_or(0);
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = if down {
            (self.cursor + 1).min(len - 1)
        } else {
            self.cursor.saturating_sub(1)
        };
    }

    /// Change id under the cursor, if the review list is showing.
    pub fn cursor_id(&self) -> Option<String> {
        let view = self.view.as_ref()?;
        if !view.show_review_list() {
            return None;
        }
        ordered_ids(view).into_iter().nth(self.cursor)
    }

    /// Map a key press to an action. `r` retries the failed operation and
    /// rescans otherwise.
    pub fn action_for(&self, modifiers: KeyModifiers, code: KeyCode) -> KeyAction {
        match (modifiers, code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c'))
            | (_, KeyCode::Char('q'))
            | (_, KeyCode::Esc) => KeyAction::Command(UiCommand::Close),
            (_, KeyCode::Up) | (_, KeyCode::Char('k')) => KeyAction::Up,
            (_, KeyCode::Down) | (_, KeyCode::Char('j')) => KeyAction::Down,
            (_, KeyCode::Char('?')) => KeyAction::ToggleHelp,
            (_, KeyCode::Char(' ')) => match self.cursor_id() {
                Some(id) => KeyAction::Command(UiCommand::Toggle(id)),
                None => KeyAction::None,
            },
            (_, KeyCode::Enter) | (_, KeyCode::Char('a')) => KeyAction::Command(UiCommand::Apply),
            (_, KeyCode::Char('r')) => match self.view.as_ref() {
                Some(v) if v.apply_failed() => KeyAction::Command(UiCommand::Apply),
                Some(v) if v.status == Status::Failed => KeyAction::Command(UiCommand::Run),
                Some(_) => KeyAction::Command(UiCommand::Rescan),
                None => KeyAction::None,
            },
            _ => KeyAction::None,
        }
    }
}

/// Change ids in the order the sections render them.
pub(crate) fn ordered_ids(view: &ReviewView) -> Vec<String> {
    view.sections()
        .into_iter()
        .flat_map(|s| s.changes.into_iter().map(|c| c.id.clone()))
        .collect()
}
