//! # mxpost
//!
//! A small SMTP receiver for one local domain, plus an outbound relay that
//! delivers to the recipient domain's mail exchangers.
//!
//! ## Receiving
//!
//! ```rust
//! use mxpost::SmtpServer;
//! use std::sync::mpsc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let (tx, rx) = mpsc::channel();
//! let server = SmtpServer::new("local.domain");
//!
//! thread::spawn(move || {
//!     server.start("127.0.0.1:2525", tx).unwrap();
//! });
//!
//! // Clients deliver to <user@local.domain> on 127.0.0.1:2525
//! // ...
//!
//! if let Ok(envelope) = rx.recv_timeout(Duration::from_millis(100)) {
//!     println!("Received message from: {}", envelope.sender);
//! }
//! ```
//!
//! Every connection gets its own thread and session. The accepted command
//! sequence is `HELO`/`EHLO`, `MAIL`, one or more `RCPT`, `DATA`, body lines
//! and a lone `.`; after that the session is back at its initial state and
//! expects a new greeting. `QUIT` closes the connection at any point.
//!
//! Recipients outside the local domain are refused with `550`. Commands sent
//! out of order get `503`, unknown ones `500`.
//!
//! ## Relaying
//!
//! ```rust,no_run
//! use mxpost::{DeliveryConfig, Deliverer, DnsResolver};
//!
//! let resolver = DnsResolver::from_system_conf().unwrap();
//! let deliverer = Deliverer::new(resolver, DeliveryConfig::new("local.domain"));
//!
//! let body = vec!["Subject: hi".to_string(), "".to_string(), "Hello".to_string()];
//! let host = deliverer.deliver("me@local.domain", "you@example.com", &body).unwrap();
//! println!("accepted by {host}");
//! ```
//!
//! One recipient per call. Mail exchangers are tried in preference order
//! until one accepts the message.
//!
//! ## Not supported
//!
//! - SMTP authentication
//! - SSL/TLS
//! - Persistent queueing and retries

mod delivery;
mod smtp;

pub use delivery::{
    Deliverer, DeliveryConfig, DeliveryError, DnsResolver, LookupError, MxCandidate, MxLookup,
    StaticResolver, deliver_to_host, resolve_candidates, split_address,
};
pub use smtp::{
    Command, Envelope, LogHook, ProcessingHook, SmtpError, SmtpLimits, SmtpResponse, SmtpServer,
    SmtpSession, SmtpState, extract_address,
};
