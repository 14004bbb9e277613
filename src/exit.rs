use crate::config::{EXIT_CONFIRM_WORD, EXIT_INPUT_MAX_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseState {
    Idle,
    Pending,
    Confirmed,
}

/// Two-phase close: a request only opens the confirmation prompt,
/// teardown happens after `confirm_close`.
#[derive(Debug)]
pub struct ExitGuard {
    state: CloseState,
    input: String,
}

impl Default for ExitGuard {
    fn default() -> Self {
        Self {
            state: CloseState::Idle,
            input: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Confirmed,
    Cancelled,
    Rejected,
}

impl ExitGuard {
    pub fn state(&self) -> CloseState {
        self.state
    }

    pub fn is_pending(&self) -> bool {
        self.state == CloseState::Pending
    }

    /// True once the window may really close.
    pub fn may_close(&self) -> bool {
        self.state == CloseState::Confirmed
    }

    pub fn request_close(&mut self) -> CloseState {
        if self.state == CloseState::Idle {
            self.state = CloseState::Pending;
            self.input.clear();
        }
        self.state
    }

    pub fn confirm_close(&mut self) {
        if self.state == CloseState::Pending {
            self.state = CloseState::Confirmed;
        }
    }

    pub fn cancel(&mut self) {
        if self.state == CloseState::Pending {
            self.state = CloseState::Idle;
            self.input.clear();
        }
    }

    pub fn input_mut(&mut self) -> &mut String {
        &mut self.input
    }

    /// Handles Enter in the prompt: the confirmation word closes, anything else clears the field.
    pub fn submit(&mut self) -> PromptOutcome {
        if !self.is_pending() {
            return PromptOutcome::Cancelled;
        }
        if self.input.trim().eq_ignore_ascii_case(EXIT_CONFIRM_WORD) {
            self.confirm_close();
            PromptOutcome::Confirmed
        } else {
            self.input.clear();
            PromptOutcome::Rejected
        }
    }

    pub fn clamp_input(&mut self) {
        if self.input.chars().count() > EXIT_INPUT_MAX_LEN {
            self.input = self.input.chars().take(EXIT_INPUT_MAX_LEN).collect();
        }
    }
}
