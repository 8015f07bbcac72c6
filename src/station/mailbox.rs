//! # Mailbox
//!
//! Single-slot handoff between the link reader task and the station tick.
//! Each payload class has one slot; a newer arrival replaces an unread one.

use parking_lot::Mutex;
use tracing::debug;

/// Payload class carried by the mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Telemetry,
    Message,
}

/// One slot per payload class
#[derive(Debug, Default)]
pub struct Mailbox {
    telemetry: Mutex<Option<String>>,
    message: Mutex<Option<String>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: PayloadKind) -> &Mutex<Option<String>> {
        match kind {
            PayloadKind::Telemetry => &self.telemetry,
            PayloadKind::Message => &self.message,
        }
    }

    /// Post a payload, discarding any unread one of the same class
    ///
    /// Returns `true` if an unread payload was replaced.
    pub fn submit(&self, kind: PayloadKind, payload: impl Into<String>) -> bool {
        let replaced = self.slot(kind).lock().replace(payload.into());
        if let Some(old) = &replaced {
            debug!("Unread {:?} payload superseded: {:?}", kind, old);
        }
        replaced.is_some()
    }

    /// Take the pending payload of a class, leaving the slot empty
    pub fn take(&self, kind: PayloadKind) -> Option<String> {
        self.slot(kind).lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_submit_then_take() {
        let mb = Mailbox::new();
        assert!(!mb.submit(PayloadKind::Telemetry, "R1"));
        assert_eq!(mb.take(PayloadKind::Telemetry), Some("R1".to_string()));
        assert_eq!(mb.take(PayloadKind::Telemetry), None);
    }

    #[test]
    fn test_newest_wins() {
        let mb = Mailbox::new();
        mb.submit(PayloadKind::Telemetry, "R1");
        assert!(mb.submit(PayloadKind::Telemetry, "R2"));
        assert_eq!(mb.take(PayloadKind::Telemetry), Some("R2".to_string()));
    }

    #[test]
    fn test_slots_are_independent() {
        let mb = Mailbox::new();
        mb.submit(PayloadKind::Telemetry, "R1");
        mb.submit(PayloadKind::Message, "Mhello");
        assert_eq!(mb.take(PayloadKind::Message), Some("Mhello".to_string()));
        assert_eq!(mb.take(PayloadKind::Telemetry), Some("R1".to_string()));
    }

    #[test]
    fn test_cross_thread_handoff() {
        let mb = Arc::new(Mailbox::new());
        let writer = Arc::clone(&mb);
        std::thread::spawn(move || {
            for i in 0..100 {
                writer.submit(PayloadKind::Telemetry, format!("R{}", i));
            }
        })
        .join()
        .unwrap();

        assert_eq!(mb.take(PayloadKind::Telemetry), Some("R99".to_string()));
    }
}
