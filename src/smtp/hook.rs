//! Hand-off point for completed envelopes

use std::sync::mpsc;

use log::info;

use crate::smtp::envelope::Envelope;

/// Receives every envelope a session completes. Ownership passes to the hook.
pub trait ProcessingHook: Send + Sync {
    fn process(&self, envelope: Envelope);
}

/// Forward envelopes over a channel.
///
/// A dropped receiver is not an error for the session.
impl ProcessingHook for mpsc::Sender<Envelope> {
    fn process(&self, envelope: Envelope) {
        let _ = self.send(envelope);
    }
}

impl<F> ProcessingHook for F
where
    F: Fn(Envelope) + Send + Sync,
{
    fn process(&self, envelope: Envelope) {
        self(envelope)
    }
}

/// Logs a summary of each message and drops it
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHook;

impl LogHook {
    fn summary(envelope: &Envelope) -> String {
        format!(
            "received message from <{}> to {:?}, {} lines",
            envelope.sender,
            envelope.recipients,
            envelope.line_count()
        )
    }
}

impl ProcessingHook for LogHook {
    fn process(&self, envelope: Envelope) {
        info!("{}", Self::summary(&envelope));
    }
}
