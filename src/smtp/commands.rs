//! Implementation of SMTP commands

use std::fmt;

use log::debug;

use crate::smtp::error::{SmtpError, SmtpLimits};
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

/// A command line, as sent by either party
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(Option<String>),
    Ehlo(Option<String>),
    Mail(Option<String>),
    Rcpt(Option<String>),
    Data,
    Quit,
    Unknown(String),
}

impl Command {
    /// Parse a command line. The verb is matched case-insensitively.
    pub fn parse(line: &str) -> Self {
        let Some(verb) = line.split_whitespace().next() else {
            return Command::Unknown(String::new());
        };

        let second_token = || line.split_whitespace().nth(1).map(str::to_string);
        let address = || extract_address(line).map(str::to_string);

        match verb.to_uppercase().as_str() {
            "HELO" => Command::Helo(second_token()),
            "EHLO" => Command::Ehlo(second_token()),
            "MAIL" => Command::Mail(address()),
            "RCPT" => Command::Rcpt(address()),
            "DATA" => Command::Data,
            "QUIT" => Command::Quit,
            _ => Command::Unknown(verb.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Helo(Some(domain)) => write!(f, "HELO {domain}"),
            Command::Helo(None) => f.write_str("HELO"),
            Command::Ehlo(Some(domain)) => write!(f, "EHLO {domain}"),
            Command::Ehlo(None) => f.write_str("EHLO"),
            Command::Mail(addr) => write!(f, "MAIL FROM:<{}>", addr.as_deref().unwrap_or("")),
            Command::Rcpt(addr) => write!(f, "RCPT TO:<{}>", addr.as_deref().unwrap_or("")),
            Command::Data => f.write_str("DATA"),
            Command::Quit => f.write_str("QUIT"),
            Command::Unknown(verb) => f.write_str(verb),
        }
    }
}

/// Pull the address argument out of a `MAIL`/`RCPT` line.
///
/// Takes whatever sits between the first `<` and the next `>`. Senders that leave out the
/// brackets get the second whitespace-separated token instead, so `MAIL FROM:a@b` yields
/// `FROM:a@b`.
pub fn extract_address(line: &str) -> Option<&str> {
    if let Some(start) = line.find('<') {
        let rest = &line[start + 1..];
        if let Some(end) = rest.find('>') {
            return Some(&rest[..end]);
        }
    }
    line.split_whitespace().nth(1)
}

/// Handles SMTP commands and returns appropriate responses
#[derive(Debug, Clone)]
pub struct SmtpCommandHandler {
    local_domain: String,
}

impl SmtpCommandHandler {
    /// Create a new command handler accepting recipients of `local_domain`
    pub fn new(local_domain: &str) -> Self {
        Self {
            local_domain: local_domain.to_string(),
        }
    }

    /// The domain recipients must belong to
    pub fn local_domain(&self) -> &str {
        &self.local_domain
    }

    /// Process a command line (without its CRLF) and return a response
    pub fn process_command(
        &self,
        command_line: &str,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        // The limit counts the terminating CRLF
        if command_line.len() + "\r\n".len() > SmtpLimits::COMMAND_LINE_MAX_LENGTH {
            return Err(SmtpError::LineTooLong {
                max: SmtpLimits::COMMAND_LINE_MAX_LENGTH,
            });
        }

        let command = Command::parse(command_line);
        debug!("command {command:?} in state {:?}", session.state);

        match command {
            Command::Helo(_) | Command::Ehlo(_) => self.handle_helo(session),
            Command::Mail(addr) => self.handle_mail(addr, session),
            Command::Rcpt(addr) => self.handle_rcpt(addr, session),
            Command::Data => self.handle_data(session),
            Command::Quit => Ok(SmtpResponse::quit()),
            Command::Unknown(_) => Err(SmtpError::InvalidCommand),
        }
    }

    /// Handle HELO/EHLO command
    fn handle_helo(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        session.greet();
        Ok(SmtpResponse::helo(&self.local_domain))
    }

    /// Handle MAIL command
    fn handle_mail(
        &self,
        addr: Option<String>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("MAIL") {
            return Err(SmtpError::InvalidState(
                "MAIL command requires HELO first".to_string(),
            ));
        }

        let addr = addr.ok_or_else(|| {
            SmtpError::InvalidSyntax("MAIL requires a sender address".to_string())
        })?;

        session.set_sender(addr)?;
        Ok(SmtpResponse::ok())
    }

    /// Handle RCPT command
    fn handle_rcpt(
        &self,
        addr: Option<String>,
        session: &mut SmtpSession,
    ) -> Result<SmtpResponse, SmtpError> {
        if !session.can_execute_command("RCPT") {
            return Err(SmtpError::InvalidState(
                "RCPT command requires MAIL first".to_string(),
            ));
        }

        let addr = addr.ok_or_else(|| {
            SmtpError::InvalidSyntax("RCPT requires a recipient address".to_string())
        })?;

        session.add_recipient(addr, &self.local_domain)?;
        Ok(SmtpResponse::ok())
    }

    /// Handle DATA command
    fn handle_data(&self, session: &mut SmtpSession) -> Result<SmtpResponse, SmtpError> {
        session.start_data_mode()?;
        Ok(SmtpResponse::data_start())
    }
}
