//! SMTP response handling

/// Represents an SMTP response that can be sent to a client
#[derive(Debug, Clone)]
pub struct SmtpResponse {
    /// The SMTP response code (e.g., "250", "354", "500")
    pub code: String,
    /// The human-readable message
    pub message: String,
}

impl SmtpResponse {
    /// Create a new SMTP response
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a success response (250 OK)
    pub fn ok() -> Self {
        Self::new("250", "Ok")
    }

    /// Create a greeting response (220)
    pub fn greeting(domain: &str) -> Self {
        Self::new("220", &format!("{domain} SMTP server ready"))
    }

    /// Create a HELO/EHLO response (250)
    pub fn helo(domain: &str) -> Self {
        Self::new("250", &format!("{domain} Hello"))
    }

    /// Create a DATA intermediate response (354)
    pub fn data_start() -> Self {
        Self::new("354", "End data with <CR><LF>.<CR><LF>")
    }

    /// Create the response sent once the terminator line is seen (250)
    pub fn accepted() -> Self {
        Self::new("250", "Ok: message received")
    }

    /// Create a QUIT response (221)
    pub fn quit() -> Self {
        Self::new("221", "Bye")
    }

    /// Create an error response from an error
    pub fn error(code: &str, message: &str) -> Self {
        Self::new(code, message)
    }

    /// Format the response for sending over the wire
    pub fn format(&self) -> String {
        format!("{} {}\r\n", self.code, self.message)
    }
}

/// Extract the leading three-digit status code of a reply line.
pub fn reply_code(line: &str) -> Option<&str> {
    let code = line.get(..3)?;
    code.bytes().all(|b| b.is_ascii_digit()).then_some(code)
}
