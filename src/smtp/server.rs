//! SMTP server implementation

use crate::smtp::commands::SmtpCommandHandler;
use crate::smtp::error::SmtpError;
use crate::smtp::hook::ProcessingHook;
use crate::smtp::response::SmtpResponse;
use crate::smtp::session::SmtpSession;

use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;

/// SMTP server accepting mail for one local domain.
///
/// Every connection runs on its own thread with its own session. Completed envelopes go to the
/// processing hook.
#[derive(Debug, Clone)]
pub struct SmtpServer {
    handler: SmtpCommandHandler,
}

impl SmtpServer {
    /// Create a new SMTP server for `local_domain`
    pub fn new(local_domain: &str) -> Self {
        Self {
            handler: SmtpCommandHandler::new(local_domain),
        }
    }

    /// The domain recipients must belong to
    pub fn local_domain(&self) -> &str {
        self.handler.local_domain()
    }

    /// Bind `addr` and serve forever (blocking)
    pub fn start<A, H>(&self, addr: A, hook: H) -> Result<(), SmtpError>
    where
        A: ToSocketAddrs,
        H: ProcessingHook + 'static,
    {
        let listener = TcpListener::bind(addr)?;
        self.start_with_listener(listener, hook)
    }

    /// Serve forever on an existing listener (blocking)
    pub fn start_with_listener<H>(&self, listener: TcpListener, hook: H) -> Result<(), SmtpError>
    where
        H: ProcessingHook + 'static,
    {
        info!(
            "SMTP server listening on {} for domain {}",
            listener.local_addr()?,
            self.local_domain()
        );

        let hook: Arc<dyn ProcessingHook> = Arc::new(hook);

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let handler = self.handler.clone();
                    let hook = Arc::clone(&hook);
                    thread::spawn(move || {
                        let peer = stream
                            .peer_addr()
                            .map(|addr| addr.to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        info!("connection from {peer}");
                        if let Err(e) = handle_client(stream, &handler, hook.as_ref()) {
                            warn!("error handling client {peer}: {e}");
                        }
                        debug!("connection from {peer} closed");
                    });
                }
                Err(e) => {
                    warn!("error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }
}

/// Run one session to completion on `stream`
fn handle_client(
    mut stream: TcpStream,
    handler: &SmtpCommandHandler,
    hook: &dyn ProcessingHook,
) -> Result<(), SmtpError> {
    let mut session = SmtpSession::new();
    let mut reader = BufReader::new(stream.try_clone()?);

    send_response(&mut stream, &SmtpResponse::greeting(handler.local_domain()))?;

    let mut line_buffer = Vec::new();
    loop {
        line_buffer.clear();

        match read_crlf_line(&mut reader, &mut line_buffer) {
            Ok(0) => break,
            Ok(_) => {
                let raw = String::from_utf8_lossy(&line_buffer);
                let line = strip_line_ending(&raw);

                if session.in_data_mode {
                    if line == "." {
                        let envelope = session.finish_data_collection()?;
                        info!(
                            "message from <{}> complete, {} lines",
                            envelope.sender,
                            envelope.line_count()
                        );
                        hook.process(envelope);
                        send_response(&mut stream, &SmtpResponse::accepted())?;
                    } else {
                        session.add_data_line(line.to_string());
                    }
                    continue;
                }

                let response = match handler.process_command(line, &mut session) {
                    Ok(response) => response,
                    Err(e) => SmtpResponse::error(e.to_response_code(), &e.to_response_message()),
                };
                send_response(&mut stream, &response)?;
                if response.code == "221" {
                    break;
                }
            }
            Err(e) => {
                warn!("error reading from client: {e}");
                let error = SmtpError::from(e);
                let response =
                    SmtpResponse::error(error.to_response_code(), &error.to_response_message());
                // The peer may already be gone
                let _ = send_response(&mut stream, &response);
                break;
            }
        }
    }

    Ok(())
}

/// Read up to and including the next CRLF into `buf`.
///
/// A bare LF does not end a line. At end of stream whatever is left comes back as the last line.
fn read_crlf_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize> {
    let mut total = 0;
    loop {
        let read = reader.read_until(b'\n', buf)?;
        total += read;
        if read == 0 || buf.ends_with(b"\r\n") {
            return Ok(total);
        }
    }
}

/// Drop the trailing CRLF; everything else is kept verbatim.
fn strip_line_ending(line: &str) -> &str {
    line.strip_suffix("\r\n").unwrap_or(line)
}

/// Send a response to the client
fn send_response(stream: &mut TcpStream, response: &SmtpResponse) -> Result<(), SmtpError> {
    debug!("reply {} {}", response.code, response.message);
    stream.write_all(response.format().as_bytes())?;
    stream.flush()?;
    Ok(())
}
