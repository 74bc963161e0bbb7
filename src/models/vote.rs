//! Helpfulness votes on a gouge.
//!
//! Each (gouge, user) pair is in one of three states. [`apply_vote`] is the
//! pure transition function; `Database::cast_vote` executes the resulting
//! ledger action and counter deltas inside one transaction.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, FieldError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    None,
    Up,
    Down,
}

impl VoteState {
    /// Interpret the `vote_type` column, where a missing row means no vote.
    pub fn from_ledger(vote_type: Option<i64>) -> Result<Self, AppError> {
        match vote_type {
            None => Ok(VoteState::None),
            Some(1) => Ok(VoteState::Up),
            Some(-1) => Ok(VoteState::Down),
            Some(other) => Err(AppError::Internal(format!(
                "vote ledger holds invalid value {other}"
            ))),
        }
    }

    /// Interpret a requested vote from a request body.
    pub fn from_request(vote: i64) -> Result<Self, AppError> {
        match vote {
            0 => Ok(VoteState::None),
            1 => Ok(VoteState::Up),
            -1 => Ok(VoteState::Down),
            _ => Err(AppError::Validation(vec![FieldError::new(
                "vote",
                "must be -1, 0 or 1",
            )])),
        }
    }

    /// The signed ledger value, `None` when there is no ledger row.
    pub fn value(self) -> Option<i64> {
        match self {
            VoteState::None => None,
            VoteState::Up => Some(1),
            VoteState::Down => Some(-1),
        }
    }

    fn counts(self) -> (i64, i64) {
        match self {
            VoteState::None => (0, 0),
            VoteState::Up => (1, 0),
            VoteState::Down => (0, 1),
        }
    }
}

/// What has to happen to the `votes` row for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    Keep,
    Insert(i64),
    Update(i64),
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub ledger: LedgerAction,
    pub up_delta: i64,
    pub down_delta: i64,
}

impl VoteTransition {
    pub fn is_noop(&self) -> bool {
        self.ledger == LedgerAction::Keep
    }
}

/// Move a voter from `current` to `requested`.
///
/// Requesting the state the voter is already in changes nothing; toggling a
/// vote off is the caller sending `0`.
pub fn apply_vote(current: VoteState, requested: VoteState) -> VoteTransition {
    let ledger = match (current.value(), requested.value()) {
        (a, b) if a == b => LedgerAction::Keep,
        (None, Some(v)) => LedgerAction::Insert(v),
        (Some(_), Some(v)) => LedgerAction::Update(v),
        (Some(_), None) => LedgerAction::Delete,
        (None, None) => LedgerAction::Keep,
    };

    let (old_up, old_down) = current.counts();
    let (new_up, new_down) = requested.counts();

    VoteTransition {
        ledger,
        up_delta: new_up - old_up,
        down_delta: new_down - old_down,
    }
}

#[derive(Deserialize, Debug)]
pub struct VoteBody {
    pub vote: i64,
}

/// Counters of a gouge after a vote, plus the voter's own state.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub thumbs_up: i64,
    pub thumbs_down: i64,
    pub user_vote: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(VoteState::None, VoteState::Up, LedgerAction::Insert(1), 1, 0)]
    #[case(VoteState::None, VoteState::Down, LedgerAction::Insert(-1), 0, 1)]
    #[case(VoteState::Up, VoteState::None, LedgerAction::Delete, -1, 0)]
    #[case(VoteState::Down, VoteState::None, LedgerAction::Delete, 0, -1)]
    #[case(VoteState::Up, VoteState::Down, LedgerAction::Update(-1), -1, 1)]
    #[case(VoteState::Down, VoteState::Up, LedgerAction::Update(1), 1, -1)]
    #[case(VoteState::Up, VoteState::Up, LedgerAction::Keep, 0, 0)]
    #[case(VoteState::Down, VoteState::Down, LedgerAction::Keep, 0, 0)]
    #[case(VoteState::None, VoteState::None, LedgerAction::Keep, 0, 0)]
    fn transitions(
        #[case] current: VoteState,
        #[case] requested: VoteState,
        #[case] ledger: LedgerAction,
        #[case] up: i64,
        #[case] down: i64,
    ) {
        assert_eq!(
            apply_vote(current, requested),
            VoteTransition {
                ledger,
                up_delta: up,
                down_delta: down,
            }
        );
    }

    #[test]
    fn up_then_clear_then_up_returns_to_up() {
        let mut counters = (0, 0);
        let mut state = VoteState::None;
        for next in [VoteState::Up, VoteState::None, VoteState::Up] {
            let t = apply_vote(state, next);
            counters.0 += t.up_delta;
            counters.1 += t.down_delta;
            state = next;
        }
        assert_eq!(counters, (1, 0));
    }

    #[test]
    fn request_values_are_checked() {
        assert_eq!(VoteState::from_request(0).unwrap(), VoteState::None);
        assert_eq!(VoteState::from_request(-1).unwrap(), VoteState::Down);
        assert!(matches!(
            VoteState::from_request(2),
            Err(AppError::Validation(_))
        ));
        assert!(VoteState::from_ledger(Some(3)).is_err());
    }
}
