//! SMTP session state management

use std::mem;
use std::time::SystemTime;

use crate::smtp::envelope::Envelope;
use crate::smtp::error::SmtpError;

/// Represents the current state of an SMTP session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpState {
    /// Initial state - waiting for HELO/EHLO
    Init,
    /// Greeting received - ready for MAIL command
    Mail,
    /// MAIL FROM received - ready for RCPT commands
    Rcpt,
    /// At least one RCPT TO accepted - ready for DATA or more RCPT commands
    Data,
}

/// Manages the state and data for a single SMTP session
#[derive(Debug)]
pub struct SmtpSession {
    /// Current state of the session
    pub state: SmtpState,
    /// Envelope of the transaction in progress
    pub envelope: Envelope,
    /// Whether we're currently collecting body lines
    pub in_data_mode: bool,
}

impl SmtpSession {
    /// Create a new SMTP session
    pub fn new() -> Self {
        Self {
            state: SmtpState::Init,
            envelope: Envelope::new(),
            in_data_mode: false,
        }
    }

    /// Handle HELO/EHLO. Accepted in any state and starts a fresh transaction.
    pub fn greet(&mut self) {
        self.envelope = Envelope::new();
        self.in_data_mode = false;
        self.state = SmtpState::Mail;
    }

    /// Set the sender address
    pub fn set_sender(&mut self, sender: String) -> Result<(), SmtpError> {
        if self.state != SmtpState::Mail {
            return Err(SmtpError::InvalidState(
                "MAIL command requires HELO first".to_string(),
            ));
        }

        self.envelope.sender = sender;
        self.state = SmtpState::Rcpt;
        Ok(())
    }

    /// Add a recipient address if it belongs to `local_domain`
    pub fn add_recipient(
        &mut self,
        recipient: String,
        local_domain: &str,
    ) -> Result<(), SmtpError> {
        if !self.can_execute_command("RCPT") {
            return Err(SmtpError::InvalidState(
                "RCPT command requires MAIL first".to_string(),
            ));
        }

        if !is_local_recipient(&recipient, local_domain) {
            return Err(SmtpError::UnknownUser(recipient));
        }

        self.envelope.recipients.push(recipient);
        self.state = SmtpState::Data;
        Ok(())
    }

    /// Start data collection mode
    pub fn start_data_mode(&mut self) -> Result<(), SmtpError> {
        if self.state != SmtpState::Data {
            return Err(SmtpError::InvalidState(
                "DATA command requires RCPT first".to_string(),
            ));
        }

        self.in_data_mode = true;
        Ok(())
    }

    /// Add a line of data during data collection
    pub fn add_data_line(&mut self, line: String) {
        self.envelope.body_lines.push(line);
    }

    /// Finish data collection, hand back the completed envelope and return to `Init`.
    ///
    /// An empty recipient list is not rejected here.
    pub fn finish_data_collection(&mut self) -> Result<Envelope, SmtpError> {
        if !self.in_data_mode {
            return Err(SmtpError::InvalidState(
                "Not in data collection mode".to_string(),
            ));
        }

        let mut envelope = mem::take(&mut self.envelope);
        envelope.received_at = Some(SystemTime::now());

        self.in_data_mode = false;
        self.state = SmtpState::Init;
        Ok(envelope)
    }

    /// Check if the session is ready for a specific command
    pub fn can_execute_command(&self, command: &str) -> bool {
        match command.to_uppercase().as_str() {
            "HELO" | "EHLO" | "QUIT" => true,
            "MAIL" => self.state == SmtpState::Mail,
            "RCPT" => self.state == SmtpState::Rcpt || self.state == SmtpState::Data,
            "DATA" => self.state == SmtpState::Data,
            _ => false,
        }
    }

    /// Get the current recipient count
    pub fn recipient_count(&self) -> usize {
        self.envelope.recipients.len()
    }
}

impl Default for SmtpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain acceptance rule: the address must end with `@<local_domain>`, compared case-sensitively.
pub fn is_local_recipient(recipient: &str, local_domain: &str) -> bool {
    recipient
        .strip_suffix(local_domain)
        .is_some_and(|rest| rest.ends_with('@'))
}
