//! Lists the DNS-SD service instances advertised on the local network.
//!
//! Prints one tab-separated line per response: protocol, service, `host:port`, instance name.

use std::{io, process::ExitCode, time::Duration};

use clap::Parser;
use log::LevelFilter;
use sdbrowse::{
    browser::{self, Browser, Config},
    cancel::Watcher,
    transport::UdpTransport,
    Error, MDNS_GROUP_V4, MDNS_GROUP_V6,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Seconds to wait for responses; 0 waits until interrupted
    #[arg(short, long, value_name = "SECONDS", default_value = "2", value_parser = parse_timeout)]
    timeout: Timeout,
    /// Query the IPv6 mDNS group instead of the IPv4 one
    #[arg(long)]
    ipv6: bool,
    /// Append a column with the addresses of each instance
    #[arg(short, long)]
    addresses: bool,
    /// Log more (repeat for even more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy)]
struct Timeout(Option<Duration>);

fn parse_timeout(s: &str) -> Result<Timeout, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if secs == 0.0 {
        return Ok(Timeout(None));
    }
    Duration::try_from_secs_f64(secs)
        .map(|d| Timeout(Some(d)))
        .map_err(|_| format!("`{s}` is not a valid number of seconds"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_module(env!("CARGO_CRATE_NAME"), level)
        .parse_default_env()
        .init();

    match browse(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("could not query: {e}");
            ExitCode::FAILURE
        }
    }
}

fn browse(cli: &Cli) -> Result<(), Error> {
    let group = if cli.ipv6 {
        MDNS_GROUP_V6
    } else {
        MDNS_GROUP_V4
    };
    let transport = UdpTransport::new(group)?;
    let (watcher, stop) = Watcher::spawn(cli.timeout.0, transport.close_handle())?;
    if let Err(e) = ctrlc::set_handler(move || stop.stop()) {
        log::warn!("failed to install Ctrl-C handler: {e}");
    }

    let mut browser = Browser::new(
        Config::new()
            .group(group)
            .show_addresses(cli.addresses),
    );
    browser::run(&mut browser, &transport, io::stdout().lock())?;
    watcher.join();
    Ok(())
}
