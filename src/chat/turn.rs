use crate::error::{ChatError, ChatResult};

pub const MAX_UNANSWERED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Ready,
    Blocked,
}

/// One participant's side of the alternating-send cadence within a room.
///
/// Each side may send at most [`MAX_UNANSWERED`] messages in a row; a message
/// from the partner refills the allowance immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnState {
    credits: u8,
    awaiting_reply: bool,
}

impl Default for TurnState {
    fn default() -> Self {
        Self {
            credits: MAX_UNANSWERED,
            awaiting_reply: false,
        }
    }
}

impl TurnState {
    pub fn phase(&self) -> TurnPhase {
        if self.credits == 0 && self.awaiting_reply {
            TurnPhase::Blocked
        } else {
            TurnPhase::Ready
        }
    }

    pub fn credits(&self) -> u8 {
        self.credits
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    pub fn on_send(&mut self) -> ChatResult<()> {
        if self.phase() == TurnPhase::Blocked {
            return Err(ChatError::TurnLimitExceeded);
        }

        self.credits = self.credits.saturating_sub(1);
        if self.credits == 0 {
            self.awaiting_reply = true;
        }
        Ok(())
    }

    /// The partner got a message through.
    pub fn on_receive(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_ready_with_full_credits() {
        let turn = TurnState::default();
        assert_eq!(turn.phase(), TurnPhase::Ready);
        assert_eq!(turn.credits(), 2);
        assert!(!turn.awaiting_reply());
    }

    #[test]
    fn third_unanswered_send_is_rejected() {
        let mut turn = TurnState::default();
        turn.on_send().unwrap();
        assert_eq!(turn.phase(), TurnPhase::Ready);
        turn.on_send().unwrap();
        assert_eq!(turn.phase(), TurnPhase::Blocked);

        for _ in 0..5 {
            assert_eq!(turn.on_send(), Err(ChatError::TurnLimitExceeded));
        }
        assert_eq!(turn.credits(), 0);
        assert!(turn.awaiting_reply());
    }

    #[test]
    fn receive_unblocks() {
        let mut turn = TurnState::default();
        turn.on_send().unwrap();
        turn.on_send().unwrap();
        turn.on_receive();

        assert_eq!(turn.phase(), TurnPhase::Ready);
        assert_eq!(turn.credits(), 2);
        turn.on_send().unwrap();
        turn.on_send().unwrap();
        assert!(turn.on_send().is_err());
    }

    #[test]
    fn receive_always_refills() {
        let mut turn = TurnState::default();
        turn.on_send().unwrap();
        assert_eq!(turn.credits(), 1);

        turn.on_receive();
        turn.on_receive();
        assert_eq!(turn, TurnState::default());
    }
}
