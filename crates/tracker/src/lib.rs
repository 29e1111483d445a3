use std::collections::HashMap;
use std::io::{self, BufRead};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{process, thread};

use gshare_config::{
    load_tracker_addrs, split_endpoint, SYNC_CONNECT_DELAY_SECS, SYNC_PORT_OFFSET,
};
use gshare_core::entities::{Command, Reply};
use gshare_core::helpers::tokenize;
use gshare_core::utils::Logger;
use gshare_core::wire::{read_frame, write_frame};

pub mod entities;
pub mod sync;

use entities::Directory;
use sync::SyncPeer;

pub(crate) static LOGGER: Logger = Logger::verbose("Tracker");

/// Live control connections, so a re-login can shut down the socket it
/// evicted.
#[derive(Default)]
pub struct ConnRegistry {
    streams: Mutex<HashMap<u64, TcpStream>>,
    next_id: AtomicU64,
}

impl ConnRegistry {
    pub fn new() -> Self {
        ConnRegistry::default()
    }

    fn register(&self, stream: TcpStream) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.streams.lock().unwrap().insert(id, stream);
        id
    }

    fn deregister(&self, conn_id: u64) {
        self.streams.lock().unwrap().remove(&conn_id);
    }

    fn shutdown(&self, conn_id: u64) {
        if let Some(stream) = self.streams.lock().unwrap().remove(&conn_id) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// One of the two replicating trackers.
pub struct Tracker {
    tracker_id: u8,
    host: String,
    port: u16,
    other_host: String,
    other_port: u16,
    directory: Arc<Directory>,
    peer: Arc<SyncPeer>,
}

impl Tracker {
    /// Read `tracker_info.txt` and take line `tracker_num` as our own
    /// address, the other line as the peer's.
    pub fn from_config(info_file: impl AsRef<Path>, tracker_num: u8) -> io::Result<Tracker> {
        let addrs = load_tracker_addrs(info_file)?;
        let own = &addrs[(tracker_num - 1) as usize];
        let other = &addrs[(2 - tracker_num) as usize];
        let (host, port) = split_endpoint(own)?;
        let (other_host, other_port) = split_endpoint(other)?;

        LOGGER.info(format!("Tracker {tracker_num} starting at {host}:{port}"));
        LOGGER.info(format!("Other tracker at {other_host}:{other_port}"));

        Ok(Tracker {
            tracker_id: tracker_num,
            host,
            port,
            other_host,
            other_port,
            directory: Arc::new(Directory::new()),
            peer: Arc::new(SyncPeer::new()),
        })
    }

    /// Bind the control port, spawn the accept loop and the sync roles,
    /// then hold the console until `quit`.
    pub fn start(self) -> io::Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))?;
        LOGGER.info(format!("Tracker listening for clients on port {}", self.port));

        let directory = self.directory.clone();
        let peer = self.peer.clone();
        thread::spawn(move || serve_clients(listener, directory, peer));

        let sync_port = self.port + SYNC_PORT_OFFSET;
        let listen_peer = self.peer.clone();
        let listen_dir = self.directory.clone();
        thread::spawn(move || {
            if let Err(e) = sync::listen_for_peer(sync_port, listen_peer, listen_dir) {
                LOGGER.error(format!("sync bind failed on port {sync_port}: {e}"));
            }
        });

        // Tracker 2 only listens; tracker 1 dials after giving 2 time to bind.
        if self.tracker_id == 1 {
            let other_host = self.other_host.clone();
            let other_sync_port = self.other_port + SYNC_PORT_OFFSET;
            let peer = self.peer.clone();
            let directory = self.directory.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_secs(SYNC_CONNECT_DELAY_SECS));
                sync::connect_to_peer(&other_host, other_sync_port, peer, directory);
            });
        }

        println!("Tracker console running. Type 'quit' to shut down.");
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim() == "quit" {
                process::exit(0);
            }
        }
        // stdin closed; keep serving
        loop {
            thread::park();
        }
    }
}

/// Accept control connections and hand each to its own worker.
pub fn serve_clients(listener: TcpListener, directory: Arc<Directory>, peer: Arc<SyncPeer>) {
    let conns = Arc::new(ConnRegistry::new());
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let directory = directory.clone();
                let peer = peer.clone();
                let conns = conns.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, directory, peer, conns) {
                        LOGGER.error(format!("client worker failed: {e}"));
                    }
                });
            }
            Err(e) => {
                LOGGER.error(format!("Accept failed: {e}"));
            }
        }
    }
}

/// One control connection: read a command frame, mutate the directory,
/// answer, forward the sync event. Closing the connection logs the bound
/// user out implicitly.
fn handle_client(
    stream: TcpStream,
    directory: Arc<Directory>,
    peer: Arc<SyncPeer>,
    conns: Arc<ConnRegistry>,
) -> io::Result<()> {
    let client_ip = stream.peer_addr()?.ip().to_string();
    let conn_id = conns.register(stream.try_clone()?);
    LOGGER.info(format!("New client connection from {client_ip}"));

    let mut stream = stream;
    loop {
        let msg = match read_frame(&mut stream) {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(_) => break,
        };
        let tokens = tokenize(&msg);
        if tokens.is_empty() {
            continue;
        }

        let write_result = match Command::parse(&tokens) {
            Ok(cmd) => {
                let outcome = directory.execute(conn_id, &client_ip, cmd);
                let result = write_frame(&mut stream, &outcome.reply.to_wire());
                if let Some(old_conn) = outcome.evicted_conn {
                    conns.shutdown(old_conn);
                }
                if let Some(event) = outcome.event {
                    peer.send(&event);
                }
                result
            }
            Err(reason) => write_frame(&mut stream, &Reply::error(reason).to_wire()),
        };
        // a failed reply still has to run the disconnect cleanup below
        if write_result.is_err() {
            break;
        }
    }

    if let Some(event) = directory.disconnect(conn_id) {
        peer.send(&event);
    }
    conns.deregister(conn_id);
    LOGGER.info(format!("Client {client_ip} disconnected."));
    Ok(())
}

#[cfg(test)]
mod func_tests {
    use std::time::Duration;

    use super::*;

    struct TestClient {
        stream: TcpStream,
    }

    impl TestClient {
        fn connect(port: u16) -> Self {
            TestClient {
                stream: TcpStream::connect(("127.0.0.1", port)).unwrap(),
            }
        }

        fn request(&mut self, cmd: &str) -> String {
            write_frame(&mut self.stream, cmd).unwrap();
            read_frame(&mut self.stream).unwrap().unwrap()
        }
    }

    fn spawn_tracker() -> (u16, Arc<Directory>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let directory = Arc::new(Directory::new());
        let peer = Arc::new(SyncPeer::new());
        let dir = directory.clone();
        thread::spawn(move || serve_clients(listener, dir, peer));
        (port, directory)
    }

    #[test]
    fn test_control_plane_round_trip() {
        let (port, _directory) = spawn_tracker();
        let mut alice = TestClient::connect(port);

        assert_eq!(alice.request("create_user alice a"), "success User created");
        assert_eq!(
            alice.request("create_user alice a"),
            "error : User already exists"
        );
        assert_eq!(
            alice.request("login alice a 7000"),
            "success Login successful"
        );
        assert_eq!(alice.request("create_group g1"), "success Group created.");
        assert_eq!(alice.request("list_groups"), "success g1");
        assert_eq!(
            alice.request("upload_file g1 sample.bin 600000 ffff aaaa bbbb"),
            "success File uploaded successfully."
        );
        assert_eq!(alice.request("list_files g1"), "success sample.bin");
        assert_eq!(
            alice.request("download_file g1 sample.bin"),
            "success 600000 ffff aaaa bbbb 127.0.0.1:7000"
        );
        assert_eq!(alice.request("bogus"), "error : Invalid command");
        assert_eq!(
            alice.request("create_user onlyone"),
            "error : Usage: create_user <user_id> <password>"
        );
    }

    #[test]
    fn test_membership_flow_over_sockets() {
        let (port, _directory) = spawn_tracker();
        let mut alice = TestClient::connect(port);
        let mut bob = TestClient::connect(port);

        alice.request("create_user alice a");
        alice.request("login alice a 7000");
        alice.request("create_group g1");

        bob.request("create_user bob b");
        bob.request("login bob b 7001");
        assert_eq!(bob.request("join_group g1"), "success Join request sent.");
        assert_eq!(
            bob.request("download_file g1 whatever"),
            "error : Not a member of this group."
        );

        assert_eq!(alice.request("list_requests g1"), "success bob");
        assert_eq!(
            alice.request("accept_request g1 bob"),
            "success User added to group."
        );
        assert_eq!(
            alice.request("list_requests g1"),
            "success No pending requests."
        );
    }

    #[test]
    fn test_disconnect_performs_implicit_logout() {
        let (port, directory) = spawn_tracker();
        let mut alice = TestClient::connect(port);
        alice.request("create_user alice a");
        alice.request("login alice a 7000");
        alice.request("create_group g1");
        alice.request("upload_file g1 sample.bin 1 ffff aaaa");
        drop(alice);

        // give the worker a moment to observe the close
        for _ in 0..50 {
            if directory.endpoint_for_user("alice").is_none() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert!(directory.endpoint_for_user("alice").is_none());
        let group = directory.group_snapshot("g1").unwrap();
        assert!(group.files["sample.bin"].seeders.is_empty());
    }

    #[test]
    fn test_relogin_shuts_down_old_socket() {
        let (port, _directory) = spawn_tracker();
        let mut first = TestClient::connect(port);
        first.request("create_user alice a");
        first.request("login alice a 7000");

        let mut second = TestClient::connect(port);
        assert_eq!(
            second.request("login alice a 7001"),
            "success Login successful"
        );

        // the evicted socket reads EOF once the tracker shuts it down
        let got = read_frame(&mut first.stream).unwrap();
        assert!(got.is_none());
        // and the surviving session still works
        assert_eq!(second.request("create_group g1"), "success Group created.");
    }
}
