/// Typed notification events for external subscribers
///
/// Delivery is fire-and-forget over a broadcast channel: events carry the
/// relevant row, subscribers get their own receiver, and an event emitted
/// with no listeners is simply dropped.
use crate::db::models::{SignupCode, SignupCodeResult};
use tokio::sync::broadcast;

/// Events emitted by the account module
#[derive(Debug, Clone)]
pub enum AccountEvent {
    /// An invitation email for this code was handed to the mail hook
    SignupCodeSent { signup_code: SignupCode },
    /// A signup code was redeemed
    SignupCodeUsed { result: SignupCodeResult },
}

/// Broadcast bus for account events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AccountEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to account events
    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; no listeners is not an error
    pub fn emit(&self, event: AccountEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.emit(AccountEvent::SignupCodeUsed {
            result: SignupCodeResult {
                id: 1,
                signup_code_id: 7,
                user_id: 42,
                timestamp: Utc::now(),
            },
        });

        match rx.recv().await.unwrap() {
            AccountEvent::SignupCodeUsed { result } => assert_eq!(result.signup_code_id, 7),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.emit(AccountEvent::SignupCodeUsed {
            result: SignupCodeResult {
                id: 1,
                signup_code_id: 1,
                user_id: 1,
                timestamp: Utc::now(),
            },
        });
    }
}
