use std::process;

use clap::{Arg, Command};
use gshare_client::Client;
use gshare_config::load_tracker_addrs;
use gshare_core::utils::Logger;

static LOGGER: Logger = Logger::verbose("Client");

fn create_command() -> Command {
    Command::new("client")
        .about("Group file-sharing client")
        .arg(
            Arg::new("TRACKER_INFO")
                .help("Path to the tracker info file (two host:port lines)")
                .required(true)
                .value_name("FILE"),
        )
}

fn main() {
    let matches = match create_command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let _ = e.print();
            process::exit(1);
        }
    };
    let info_file = matches.get_one::<String>("TRACKER_INFO").unwrap();

    let tracker_addrs = match load_tracker_addrs(info_file) {
        Ok(addrs) => addrs,
        Err(e) => {
            LOGGER.error(format!("Failed to read {info_file}: {e}"));
            process::exit(1);
        }
    };

    let client = match Client::new(tracker_addrs) {
        Ok(client) => client,
        Err(e) => {
            LOGGER.error(format!("Failed to start seeder service: {e}"));
            process::exit(1);
        }
    };

    if let Err(e) = client.run() {
        LOGGER.error(format!("{e}"));
        process::exit(1);
    }
}
