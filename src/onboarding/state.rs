//! Onboarding position: which step the user is on, or complete.

use serde::{Deserialize, Serialize};

/// Persisted onboarding position.
///
/// Stored under the `onboarding-step` and `onboarding-complete` session keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingState {
    /// Index of the step awaiting input.
    pub step_index: usize,
    /// Set once the terminal step is reached; never cleared except by reset.
    pub completed: bool,
}

impl OnboardingState {
    /// A state that starts already complete, pointing at the terminal step.
    pub fn completed_at(terminal_index: usize) -> Self {
        Self {
            step_index: terminal_index,
            completed: true,
        }
    }

    /// Whether moving to `target` keeps the index monotonic.
    pub fn can_transition_to(&self, target: usize) -> bool {
        !self.completed && target > self.step_index
    }

    /// Move to `target`. Fails when complete or when `target` is not ahead.
    pub fn advance_to(&mut self, target: usize, terminal_index: usize) -> Result<usize, String> {
        if self.completed {
            return Err("Onboarding already complete".to_string());
        }
        if !self.can_transition_to(target) {
            return Err(format!(
                "Cannot move from step {} to step {}",
                self.step_index, target
            ));
        }
        self.step_index = target.min(terminal_index);
        if self.step_index == terminal_index {
            self.completed = true;
        }
        Ok(self.step_index)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
