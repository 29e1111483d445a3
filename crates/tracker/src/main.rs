use std::process;

use clap::{value_parser, Arg, Command};
use gshare_core::utils::Logger;
use gshare_tracker::Tracker;

static LOGGER: Logger = Logger::verbose("Tracker");

fn create_command() -> Command {
    Command::new("tracker")
        .about("Group file-sharing tracker")
        .arg(
            Arg::new("TRACKER_INFO")
                .help("Path to the tracker info file (two host:port lines)")
                .required(true)
                .value_name("FILE"),
        )
        .arg(
            Arg::new("TRACKER_NO")
                .help("Which line of the info file is this tracker (1 or 2)")
                .required(true)
                .value_parser(value_parser!(u8).range(1..=2)),
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
    let tracker_num = *matches.get_one::<u8>("TRACKER_NO").unwrap();

    let tracker = match Tracker::from_config(info_file, tracker_num) {
        Ok(tracker) => tracker,
        Err(e) => {
            LOGGER.error(format!("Failed to read {info_file}: {e}"));
            process::exit(1);
        }
    };

    if let Err(e) = tracker.start() {
        LOGGER.error(format!("Tracker failed to start: {e}"));
        process::exit(1);
    }
}
