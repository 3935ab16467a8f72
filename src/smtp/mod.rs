//! Receiving side: session state machine and server

pub mod commands;
pub mod envelope;
pub mod error;
pub mod hook;
pub mod response;
pub mod server;
pub mod session;

pub use commands::{Command, SmtpCommandHandler, extract_address};
pub use envelope::Envelope;
pub use error::{SmtpError, SmtpLimits};
pub use hook::{LogHook, ProcessingHook};
pub use response::SmtpResponse;
pub use server::SmtpServer;
pub use session::{SmtpSession, SmtpState};
