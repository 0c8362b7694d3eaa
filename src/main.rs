//! IPK25-CHAT client binary.
//!
//! # Usage
//!
//! ```bash
//! ipk25chat-client -t tcp -s 127.0.0.1
//! ipk25chat-client -t udp -s ipk.fit.vutbr.cz -p 10000 -d 100 -r 1
//! ```

use std::io;
use std::process;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use ipk25_chat::core::{exit_code, DEFAULT_PORT, DEFAULT_UDP_RETRIES, DEFAULT_UDP_TIMEOUT_MS};
use ipk25_chat::network::resolve;
use ipk25_chat::{Config, Session, TcpTransport, Termination, TransportKind, UdpTransport};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// IPK25-CHAT client
#[derive(Parser, Debug)]
#[command(name = "ipk25chat-client")]
#[command(about = "Chat client for the IPK25-CHAT protocol")]
#[command(version)]
struct Args {
    /// Transport protocol (tcp or udp)
    #[arg(short = 't')]
    transport: TransportKind,

    /// Server IP address or hostname
    #[arg(short = 's')]
    server: String,

    /// Server port
    #[arg(short = 'p', default_value_t = DEFAULT_PORT)]
    port: u16,

    /// UDP confirmation timeout in milliseconds
    #[arg(short = 'd', default_value_t = DEFAULT_UDP_TIMEOUT_MS as u16)]
    timeout: u16,

    /// Maximum number of UDP retransmissions
    #[arg(short = 'r', default_value_t = DEFAULT_UDP_RETRIES)]
    retries: u8,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config::new(self.transport, self.server);
        config.port = self.port;
        config.udp_timeout = Duration::from_millis(u64::from(self.timeout));
        config.udp_retries = self.retries;
        config
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code::SUCCESS,
                ErrorKind::MissingRequiredArgument => exit_code::MISSING_ARGUMENT,
                _ => exit_code::INVALID_ARGUMENT,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    let config = args.into_config();
    tracing::debug!(?config, "starting client");

    process::exit(run(config).await);
}

/// Connects and runs one session, returning the process exit status
async fn run(config: Config) -> i32 {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let server = match resolve(&config.host, config.port).await {
        Ok(addr) => addr,
        Err(e) => return report(e),
    };

    let input = BufReader::new(tokio::io::stdin());
    let termination = match config.transport {
        TransportKind::Tcp => match TcpTransport::connect(server).await {
            Ok(transport) => {
                Session::new(transport, io::stdout(), config.reply_timeout)
                    .run(input, cancel)
                    .await
            }
            Err(e) => return report(e),
        },
        TransportKind::Udp => {
            match UdpTransport::bind(server, config.udp_timeout, config.udp_retries).await {
                Ok(transport) => {
                    Session::new(transport, io::stdout(), config.reply_timeout)
                        .run(input, cancel)
                        .await
                }
                Err(e) => return report(e),
            }
        }
    };

    if let Termination::Failed(e) = &termination {
        tracing::error!(error = %e, "session failed");
    }
    termination.exit_code()
}

fn report(e: ipk25_chat::Error) -> i32 {
    println!("ERROR: {}", e);
    e.exit_code()
}
