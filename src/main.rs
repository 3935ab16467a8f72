use anyhow::{Context, Result, bail};
use log::{error, info};
use mxpost::{Deliverer, DeliveryConfig, DnsResolver, LogHook, SmtpServer};
use std::io::{self, BufRead};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "mxpost", about = "Minimal SMTP receiver and MX relay")]
enum Opt {
    /// Accept mail for one local domain
    Serve {
        /// Listening address
        #[structopt(short = "l", long = "listen", default_value = "0.0.0.0:25")]
        listen: String,

        /// Domain to accept mail for
        #[structopt(short = "d", long = "domain")]
        domain: String,
    },

    /// Relay a message read from stdin to the recipients' mail exchangers
    Send {
        /// Envelope sender
        #[structopt(short = "f", long = "from")]
        from: String,

        /// Recipient (can be specified multiple times)
        #[structopt(short = "t", long = "to", required = true, number_of_values = 1)]
        to: Vec<String>,

        /// Domain announced in HELO
        #[structopt(long = "helo", default_value = "localhost")]
        helo: String,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Opt::from_args() {
        Opt::Serve { listen, domain } => {
            let server = SmtpServer::new(&domain);
            server
                .start(listen.as_str(), LogHook)
                .with_context(|| format!("Failed to start server on {listen}"))?;
        }
        Opt::Send { from, to, helo } => {
            let body = io::stdin()
                .lock()
                .lines()
                .collect::<io::Result<Vec<String>>>()
                .context("Failed to read message from stdin")?;

            let resolver = DnsResolver::from_system_conf().context("Failed to create resolver")?;
            let deliverer = Deliverer::new(resolver, DeliveryConfig::new(&helo));

            let mut failed = 0;
            for recipient in &to {
                match deliverer.deliver(&from, recipient, &body) {
                    Ok(host) => info!("<{recipient}>: accepted by {host}"),
                    Err(e) => {
                        error!("<{recipient}>: {e}");
                        failed += 1;
                    }
                }
            }

            if failed > 0 {
                bail!("{failed} of {} recipient(s) failed", to.len());
            }
        }
    }

    Ok(())
}
