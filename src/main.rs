use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod net;
mod wol;

use error::WakeError;

const USAGE_EXAMPLES: &str = "\
Examples:
  wol 18-18-18-18-18-18 192.168.1.255
  wol 18-18-18-18-18-18

Note: BROADCAST_IP default is 255.255.255.255";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None, after_help = USAGE_EXAMPLES)]
struct Args {
    /// MAC address to wake, e.g. 18-18-18-18-18-18 or 01:02:03:04:05:06.
    #[arg(value_name = "MAC_ADDRESS")]
    mac: String,

    /// IPv4 address or hostname to send the magic packet to.
    #[arg(value_name = "BROADCAST_IP")]
    broadcast_ip: Option<String>,

    /// Send from the first IPv4 address of this network interface (e.g. eth0).
    #[arg(short, long, env = "WOL_INTERFACE")]
    interface: Option<String>,

    /// Increase log output, may be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), WakeError> {
    let packet = wol::create_magic_packet(&args.mac)?;
    let destination = net::resolve_destination(args.broadcast_ip.as_deref())?;
    let source = match args.interface.as_deref().filter(|name| !name.is_empty()) {
        Some(interface) => Some(net::resolve_source(interface)?),
        None => None,
    };

    info!("Attempting to send a magic packet to MAC {}", packet.target());
    info!("... Broadcasting to: {}", destination);
    net::send(&packet.to_bytes(), destination, source)?;

    println!("Magic packet sent successfully to {}", args.mac);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut message = err.to_string();
            let mut cause = std::error::Error::source(&err);
            while let Some(inner) = cause {
                message.push_str(&format!(": {}", inner));
                cause = inner.source();
            }
            eprintln!("error: {}", message);
            ExitCode::FAILURE
        }
    }
}
