//! One outbound SMTP exchange against a single host

use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;

use crate::delivery::error::DeliveryError;
use crate::smtp::commands::Command;
use crate::smtp::response::reply_code;

/// Standard SMTP relay port
pub const SMTP_PORT: u16 = 25;

/// Fixed connect timeout and overall deadline of one host attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by every host attempt of a [`Deliverer`](crate::delivery::Deliverer)
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Domain announced in `HELO`
    pub helo_domain: String,
    /// Port dialed on each mail exchanger
    pub port: u16,
    /// Bound on establishing the TCP connection
    pub connect_timeout: Duration,
    /// Bound on the whole exchange, connect included
    pub deadline: Duration,
}

impl DeliveryConfig {
    pub fn new(helo_domain: &str) -> Self {
        Self {
            helo_domain: helo_domain.to_string(),
            port: SMTP_PORT,
            connect_timeout: DEFAULT_TIMEOUT,
            deadline: DEFAULT_TIMEOUT,
        }
    }
}

/// Run the full exchange against `host`: greeting, HELO, MAIL, RCPT, DATA, body, terminator,
/// and a best-effort QUIT.
pub fn deliver_to_host(
    host: &str,
    config: &DeliveryConfig,
    sender: &str,
    recipient: &str,
    body_lines: &[String],
) -> Result<(), DeliveryError> {
    let deadline = Instant::now() + config.deadline;
    let mut conn = Connection::open(host, config, deadline)?;

    conn.read_reply("greeting")?;

    let steps = [
        (Command::Helo(Some(config.helo_domain.clone())), "250"),
        (Command::Mail(Some(sender.to_string())), "250"),
        (Command::Rcpt(Some(recipient.to_string())), "250"),
        (Command::Data, "354"),
    ];
    for (command, expected) in steps {
        let command = command.to_string();
        conn.write_line(&command, &command)?;
        let reply = conn.read_reply(&command)?;
        expect_code(&command, &reply, expected)?;
    }

    for line in body_lines {
        conn.write_line(line, "email data")?;
    }
    conn.write_line(".", "end of data")?;

    let reply = conn.read_reply("end of data")?;
    expect_code("end of data", &reply, "250")?;

    if let Err(e) = conn.write_line(&Command::Quit.to_string(), "QUIT") {
        debug!("QUIT to {host} failed: {e}");
    }

    Ok(())
}

fn expect_code(command: &str, reply: &str, expected: &str) -> Result<(), DeliveryError> {
    if reply_code(reply) == Some(expected) {
        Ok(())
    } else {
        Err(DeliveryError::UnexpectedReply {
            command: command.to_string(),
            reply: reply.to_string(),
        })
    }
}

/// Socket addresses for `host`. A host that already is `ip:port` is dialed as given.
fn host_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    Ok((host, port).to_socket_addrs()?.collect())
}

struct Connection<'a> {
    host: &'a str,
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    deadline: Instant,
}

impl<'a> Connection<'a> {
    fn open(
        host: &'a str,
        config: &DeliveryConfig,
        deadline: Instant,
    ) -> Result<Self, DeliveryError> {
        let connect_error = |source| DeliveryError::Connect {
            host: host.to_string(),
            source,
        };

        let addrs = host_addrs(host, config.port).map_err(connect_error)?;
        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no addresses for host");

        for addr in addrs {
            let timeout = config
                .connect_timeout
                .min(deadline.saturating_duration_since(Instant::now()));
            if timeout.is_zero() {
                return Err(DeliveryError::Timeout {
                    host: host.to_string(),
                });
            }

            debug!("connecting to {host} at {addr}");
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let reader = BufReader::new(stream.try_clone().map_err(connect_error)?);
                    return Ok(Self {
                        host,
                        stream,
                        reader,
                        deadline,
                    });
                }
                Err(e) => last_error = e,
            }
        }

        Err(connect_error(last_error))
    }

    /// Time left before the deadline, or a timeout error once it has passed
    fn remaining(&self) -> Result<Duration, DeliveryError> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            Err(self.timeout())
        } else {
            Ok(remaining)
        }
    }

    fn timeout(&self) -> DeliveryError {
        DeliveryError::Timeout {
            host: self.host.to_string(),
        }
    }

    fn io_error(&self, stage: String, source: io::Error) -> DeliveryError {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => self.timeout(),
            _ => DeliveryError::Io { stage, source },
        }
    }

    fn write_line(&mut self, line: &str, what: &str) -> Result<(), DeliveryError> {
        let remaining = self.remaining()?;
        debug!("{} > {line}", self.host);

        let result = self
            .stream
            .set_write_timeout(Some(remaining))
            .and_then(|()| self.stream.write_all(format!("{line}\r\n").as_bytes()))
            .and_then(|()| self.stream.flush());
        let stage = format!("failed to send {what}");
        result.map_err(|e| self.io_error(stage, e))
    }

    fn read_reply(&mut self, what: &str) -> Result<String, DeliveryError> {
        let remaining = self.remaining()?;

        let mut reply = String::new();
        let result = self
            .reader
            .get_ref()
            .set_read_timeout(Some(remaining))
            .and_then(|()| self.reader.read_line(&mut reply));

        let stage = format!("failed to read response for {what}");
        match result {
            Ok(0) => Err(DeliveryError::Io {
                stage,
                source: io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"),
            }),
            Ok(_) => {
                let reply = reply.trim_end().to_string();
                debug!("{} < {reply}", self.host);
                Ok(reply)
            }
            Err(e) => Err(self.io_error(stage, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Serves one connection, answering each received line from `replies` in order.
    fn scripted_server(
        greeting: &'static str,
        replies: Vec<&'static str>,
    ) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            write!(stream, "{greeting}\r\n").unwrap();

            let mut received = Vec::new();
            let mut replies = replies.into_iter();
            let mut in_data = false;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                received.push(line.clone());

                if in_data && line != "." {
                    continue;
                }
                in_data = false;
                match replies.next() {
                    Some(reply) => {
                        if reply.starts_with("354") {
                            in_data = true;
                        }
                        write!(stream, "{reply}\r\n").unwrap();
                    }
                    None => break,
                }
            }
            received
        });

        (addr, handle)
    }

    fn config() -> DeliveryConfig {
        DeliveryConfig::new("relay.test")
    }

    fn body(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn test_default_config() {
        let config = config();
        assert_eq!(config.helo_domain, "relay.test");
        assert_eq!(config.port, 25);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.deadline, Duration::from_secs(30));
    }

    #[test]
    fn test_host_addrs_explicit_port() {
        let explicit: SocketAddr = "127.0.0.1:2525".parse().unwrap();
        assert_eq!(host_addrs("127.0.0.1:2525", 25).unwrap(), vec![explicit]);

        let defaulted: SocketAddr = "127.0.0.1:25".parse().unwrap();
        assert_eq!(host_addrs("127.0.0.1", 25).unwrap(), vec![defaulted]);
    }

    #[test]
    fn test_successful_exchange() {
        let (addr, handle) = scripted_server(
            "220 mx ready",
            vec!["250 hi", "250 ok", "250 ok", "354 go", "250 queued"],
        );

        deliver_to_host(
            &addr,
            &config(),
            "a@b.com",
            "u@local.domain",
            &body(&["Hello", "World"]),
        )
        .unwrap();

        let received = handle.join().unwrap();
        assert_eq!(
            received,
            vec![
                "HELO relay.test",
                "MAIL FROM:<a@b.com>",
                "RCPT TO:<u@local.domain>",
                "DATA",
                "Hello",
                "World",
                ".",
                "QUIT",
            ]
        );
    }

    #[test]
    fn test_rejected_recipient() {
        let (addr, handle) = scripted_server(
            "220 mx ready",
            vec!["250 hi", "250 ok", "550 no such user"],
        );

        let err = deliver_to_host(&addr, &config(), "a@b.com", "u@local.domain", &[]).unwrap_err();
        match err {
            DeliveryError::UnexpectedReply { command, reply } => {
                assert_eq!(command, "RCPT TO:<u@local.domain>");
                assert_eq!(reply, "550 no such user");
            }
            other => panic!("unexpected error: {other}"),
        }

        let received = handle.join().unwrap();
        assert!(!received.contains(&"DATA".to_string()));
    }

    #[test]
    fn test_final_reply_must_be_250() {
        let (addr, _handle) = scripted_server(
            "220 mx ready",
            vec!["250 hi", "250 ok", "250 ok", "354 go", "554 rejected"],
        );

        let err = deliver_to_host(&addr, &config(), "a@b.com", "u@local.domain", &body(&["x"]))
            .unwrap_err();
        match err {
            DeliveryError::UnexpectedReply { command, .. } => assert_eq!(command, "end of data"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_connection_closed_mid_exchange() {
        let (addr, _handle) = scripted_server("220 mx ready", vec!["250 hi"]);

        let err = deliver_to_host(&addr, &config(), "a@b.com", "u@local.domain", &[]).unwrap_err();
        assert!(matches!(err, DeliveryError::Io { .. }));
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = deliver_to_host(&addr, &config(), "a@b.com", "u@local.domain", &[]).unwrap_err();
        assert!(matches!(err, DeliveryError::Connect { .. }));
    }

    #[test]
    fn test_deadline_applies_to_silent_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let config = DeliveryConfig {
            deadline: Duration::from_millis(100),
            ..config()
        };
        let err = deliver_to_host(&addr, &config, "a@b.com", "u@local.domain", &[]).unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout { .. }));
        handle.join().unwrap();
    }
}
