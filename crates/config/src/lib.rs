pub use std::net::Ipv4Addr;

use std::fs;
use std::io;
use std::path::Path;

pub const LOCAL_NETWORK: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 0);

/// Fixed size of a transfer piece. The final piece of a file may be shorter.
pub const PIECE_SIZE: usize = 512 * 1024;
/// Upper bound on a single control or sync frame payload.
pub const MSG_SIZE: usize = 512 * 1024;

/// A tracker's sync channel listens on control port + this offset.
pub const SYNC_PORT_OFFSET: u16 = 100;
/// Tracker 1 waits this long before dialing tracker 2's sync port.
pub const SYNC_CONNECT_DELAY_SECS: u64 = 2;

/// Range from which the seeder service picks its listening port.
pub const SEEDER_PORT_MIN: u16 = 10_000;
pub const SEEDER_PORT_MAX: u16 = 65_000;
/// Random bind attempts before the seeder service gives up.
pub const SEEDER_BIND_ATTEMPTS: u32 = 100;

/// Read/write timeout on data-plane piece connections.
pub const PIECE_IO_TIMEOUT_SECS: u64 = 30;
/// Passes over the seeder list a piece makes before the download fails.
pub const PIECE_RETRY_ROUNDS: usize = 3;
/// Cap on concurrent piece workers per download.
pub const DOWNLOAD_WORKERS: usize = 4;

/// Load tracker addresses from `tracker_info.txt`: line 1 is tracker 1,
/// line 2 is tracker 2, each `host:port`.
pub fn load_tracker_addrs(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    let contents = fs::read_to_string(path)?;
    let addrs: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();

    if addrs.len() < 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "tracker info file must contain at least two tracker addresses",
        ));
    }
    for addr in &addrs {
        if !addr.contains(':') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("malformed tracker address '{addr}', expected host:port"),
            ));
        }
    }
    Ok(addrs)
}

/// Split a `host:port` address into its parts.
pub fn split_endpoint(addr: &str) -> io::Result<(String, u16)> {
    let (host, port) = addr.rsplit_once(':').ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed endpoint '{addr}'"),
        )
    })?;
    let port = port.parse::<u16>().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("malformed port in endpoint '{addr}'"),
        )
    })?;
    Ok((host.to_owned(), port))
}
