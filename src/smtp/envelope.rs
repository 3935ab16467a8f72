//! Message envelope built up during one session

use std::time::SystemTime;

/// Sender, recipients and body lines of one message
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Reverse path from `MAIL FROM`
    pub sender: String,

    /// Accepted forward paths, in the order they were accepted
    pub recipients: Vec<String>,

    /// Raw body lines, without the terminating `.` line
    pub body_lines: Vec<String>,

    /// When the terminator line was seen, `None` while still being built
    pub received_at: Option<SystemTime>,
}

impl Envelope {
    /// Create an empty envelope
    pub fn new() -> Self {
        Self {
            sender: String::new(),
            recipients: Vec::new(),
            body_lines: Vec::new(),
            received_at: None,
        }
    }

    /// Create an envelope for outbound use
    pub fn with_parts(sender: &str, recipients: Vec<String>, body_lines: Vec<String>) -> Self {
        Self {
            sender: sender.to_string(),
            recipients,
            body_lines,
            received_at: None,
        }
    }

    /// Check if this message was addressed to a specific recipient
    pub fn has_recipient(&self, recipient: &str) -> bool {
        self.recipients.iter().any(|addr| addr == recipient)
    }

    /// Number of body lines
    pub fn line_count(&self) -> usize {
        self.body_lines.len()
    }

    /// Get the subject line from the message headers (if present)
    pub fn subject(&self) -> Option<&str> {
        for line in &self.body_lines {
            if line.is_empty() {
                // End of headers
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("subject") {
                    return Some(value.trim_start());
                }
            }
        }
        None
    }

    /// Body lines joined with the wire line terminator
    pub fn body_text(&self) -> String {
        self.body_lines.join("\r\n")
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
