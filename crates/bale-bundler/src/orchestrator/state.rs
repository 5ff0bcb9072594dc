//! Build lifecycle states.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildState {
    #[default]
    Idle,
    Resolving,
    Transforming,
    GraphComplete,
    Splitting,
    Emitting,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid build state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: BuildState,
    pub to: BuildState,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }

    pub fn can_transition_to(self, next: BuildState) -> bool {
        use BuildState::*;
        match (self, next) {
            (Idle, Resolving)
            | (Resolving, Transforming)
            | (Transforming, GraphComplete)
            | (GraphComplete, Splitting)
            | (Splitting, Emitting)
            | (Emitting, Done) => true,
            // incremental rebuild
            (Done, Resolving) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Current state plus every state visited in this build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateMachine {
    state: BuildState,
    history: Vec<BuildState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            state: BuildState::Idle,
            history: vec![BuildState::Idle],
        }
    }
}

impl StateMachine {
    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn history(&self) -> &[BuildState] {
        &self.history
    }

    pub fn advance(&mut self, next: BuildState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    /// Back to `Idle` for a full build, forgetting the previous history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start an incremental pass from `Done`, keeping `Done` as the first
    /// recorded state.
    pub fn restart_incremental(&mut self) -> Result<(), InvalidTransition> {
        if self.state != BuildState::Done {
            return Err(InvalidTransition {
                from: self.state,
                to: BuildState::Resolving,
            });
        }
        self.history = vec![BuildState::Done];
        self.advance(BuildState::Resolving)
    }
}
