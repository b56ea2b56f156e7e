//! Auto-start decisions.
//!
//! Re-evaluated after every lobby change. The decision only depends on the
//! current counts and which countdown (if any) is armed:
//!
//! ```text
//!             all ready                      ready < need
//! Disarmed ─────────────→ ArmedFast ──────────────────────→ (cancel, re-check majority)
//!    │                        ↑
//!    │ ready ≥ half, ≥ 2      │ all ready
//!    ↓                        │
//! ArmedMajority ──────────────┘
//!    │ ready < half
//!    ↓
//! Disarmed (cancel)
//! ```

use lobbybot_lobby::LobbySnapshot;
use lobbybot_timer::TimerKind;

/// What the scheduler should do after a re-evaluation.
///
/// `cancel` runs before `arm`: a fast countdown that breaks down can be
/// replaced by a majority countdown in the same evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Disarm the armed countdown and announce the abort.
    pub cancel: bool,
    /// Arm this countdown (replacing anything armed).
    pub arm: Option<TimerKind>,
}

impl Evaluation {
    pub fn is_noop(&self) -> bool {
        !self.cancel && self.arm.is_none()
    }
}

/// Decides what to do given the lobby counts and the armed countdown.
pub fn evaluate(snapshot: LobbySnapshot, armed: Option<TimerKind>) -> Evaluation {
    let need = snapshot.need_for_start();
    let need_half = snapshot.need_half();
    let ready = snapshot.ready;

    let mut eval = Evaluation::default();
    let mut armed = armed;

    if armed == Some(TimerKind::Fast) {
        if ready != need {
            eval.cancel = true;
            armed = None;
        }
    } else if snapshot.all_ready() {
        eval.arm = Some(TimerKind::Fast);
        return eval;
    }

    match armed {
        Some(_) => {
            if ready < need_half {
                eval.cancel = true;
            }
        }
        None => {
            if ready >= need_half && ready >= 2 {
                eval.arm = Some(TimerKind::Majority);
            }
        }
    }

    eval
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(players: usize, ready: usize, spectating: usize) -> LobbySnapshot {
        LobbySnapshot {
            players,
            ready,
            spectating,
        }
    }

    #[test]
    fn test_nobody_ready_does_nothing() {
        assert!(evaluate(snap(4, 0, 0), None).is_noop());
        assert!(evaluate(LobbySnapshot::default(), None).is_noop());
    }

    #[test]
    fn test_half_of_four_arms_majority() {
        let eval = evaluate(snap(4, 2, 0), None);
        assert_eq!(eval.arm, Some(TimerKind::Majority));
        assert!(!eval.cancel);
    }

    #[test]
    fn test_majority_stays_armed_at_three_of_four() {
        assert!(evaluate(snap(4, 3, 0), Some(TimerKind::Majority)).is_noop());
    }

    #[test]
    fn test_all_ready_arms_fast_over_majority() {
        let eval = evaluate(snap(4, 4, 0), Some(TimerKind::Majority));
        assert_eq!(eval.arm, Some(TimerKind::Fast));
        assert!(!eval.cancel);
    }

    #[test]
    fn test_single_player_ready_arms_fast() {
        let eval = evaluate(snap(1, 1, 0), None);
        assert_eq!(eval.arm, Some(TimerKind::Fast));
    }

    #[test]
    fn test_spectators_excluded_from_need() {
        // 3 players, 1 spectating: both others ready is everyone.
        let eval = evaluate(snap(3, 2, 1), None);
        assert_eq!(eval.arm, Some(TimerKind::Fast));
    }

    #[test]
    fn test_fast_stays_while_all_ready() {
        assert!(evaluate(snap(4, 4, 0), Some(TimerKind::Fast)).is_noop());
    }

    #[test]
    fn test_fast_abort_falls_back_to_majority() {
        let eval = evaluate(snap(4, 3, 0), Some(TimerKind::Fast));
        assert!(eval.cancel);
        assert_eq!(eval.arm, Some(TimerKind::Majority));
    }

    #[test]
    fn test_fast_abort_below_half_just_cancels() {
        let eval = evaluate(snap(4, 1, 0), Some(TimerKind::Fast));
        assert!(eval.cancel);
        assert_eq!(eval.arm, None);
    }

    #[test]
    fn test_majority_cancelled_below_half() {
        let eval = evaluate(snap(4, 1, 0), Some(TimerKind::Majority));
        assert!(eval.cancel);
        assert_eq!(eval.arm, None);
    }

    #[test]
    fn test_majority_needs_two_ready() {
        // need 2, half 1, but one ready player is not a majority countdown.
        assert!(evaluate(snap(2, 1, 0), None).is_noop());
    }
}
