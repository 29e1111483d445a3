use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use gshare_config::LOCAL_NETWORK;
use gshare_core::entities::SyncEvent;
use gshare_core::helpers::tokenize;
use gshare_core::wire::{read_frame, write_frame};

use crate::entities::Directory;
use crate::LOGGER;

#[derive(Default)]
struct PeerSlot {
    socket: Option<TcpStream>,
    generation: u64,
}

/// Write half of the tracker-to-tracker sync channel. Send failures drop
/// the socket and the tracker continues standalone; there is no retry and
/// no resynchronization on reconnect.
#[derive(Default)]
pub struct SyncPeer {
    slot: Mutex<PeerSlot>,
}

impl SyncPeer {
    pub fn new() -> Self {
        SyncPeer::default()
    }

    /// Install a freshly established peer socket. Returns a generation
    /// token the matching read loop hands back on exit, so a stale reader
    /// cannot tear down a newer connection.
    pub fn attach(&self, stream: TcpStream) -> u64 {
        let mut slot = self.slot.lock().unwrap();
        slot.generation += 1;
        slot.socket = Some(stream);
        slot.generation
    }

    pub fn clear_if(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap();
        if slot.generation == generation {
            slot.socket = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.slot.lock().unwrap().socket.is_some()
    }

    /// Forward one event. Only called after the local mutation committed.
    pub fn send(&self, event: &SyncEvent) {
        let mut slot = self.slot.lock().unwrap();
        if let Some(socket) = slot.socket.as_mut() {
            let msg = event.to_wire();
            match write_frame(socket, &msg) {
                Ok(()) => LOGGER.debug(format!("sync: sent {msg}")),
                Err(e) => {
                    LOGGER.error(format!(
                        "Failed to send sync message. Other tracker may be down. ({e})"
                    ));
                    slot.socket = None;
                }
            }
        }
    }
}

/// Listener role: bind control port + 100, accept exactly one peer, then
/// feed its events into the directory until the connection dies.
pub fn listen_for_peer(
    sync_port: u16,
    peer: Arc<SyncPeer>,
    directory: Arc<Directory>,
) -> io::Result<()> {
    let listener = TcpListener::bind((LOCAL_NETWORK, sync_port))?;
    LOGGER.info(format!("Listening for other tracker on port {sync_port}"));

    let (stream, addr) = listener.accept()?;
    drop(listener);
    LOGGER.info(format!("Other tracker connected for synchronization ({addr})."));

    let generation = peer.attach(stream.try_clone()?);
    sync_read_loop(stream, directory, &peer, generation);
    Ok(())
}

/// Connector role: dial the other tracker's sync port. Tracker 1 calls this
/// after its startup delay; a refused connection leaves the tracker in
/// standalone mode.
pub fn connect_to_peer(
    other_host: &str,
    other_sync_port: u16,
    peer: Arc<SyncPeer>,
    directory: Arc<Directory>,
) {
    match TcpStream::connect((other_host, other_sync_port)) {
        Ok(stream) => {
            LOGGER.info("Connected to other tracker.");
            match stream.try_clone() {
                Ok(write_half) => {
                    let generation = peer.attach(write_half);
                    sync_read_loop(stream, directory, &peer, generation);
                }
                Err(e) => LOGGER.error(format!("sync: could not clone peer socket: {e}")),
            }
        }
        Err(_) => {
            LOGGER.warn("Could not connect to other tracker. Will operate in standalone mode.");
        }
    }
}

fn sync_read_loop(
    mut stream: TcpStream,
    directory: Arc<Directory>,
    peer: &SyncPeer,
    generation: u64,
) {
    loop {
        match read_frame(&mut stream) {
            Ok(Some(msg)) => {
                let tokens = tokenize(&msg);
                match SyncEvent::parse(&tokens) {
                    Some(event) => {
                        LOGGER.debug(format!("sync: applying {msg}"));
                        directory.apply(&event);
                    }
                    None => LOGGER.error(format!("sync: dropping malformed message '{msg}'")),
                }
            }
            Ok(None) => break,
            Err(e) => {
                LOGGER.error(format!("sync: read failed: {e}"));
                break;
            }
        }
    }
    LOGGER.warn("Connection with other tracker lost.");
    peer.clear_if(generation);
}

#[cfg(test)]
mod func_tests {
    use std::thread;

    use super::*;

    /// Replicates S3: an event sent through a live sync channel lands in
    /// the receiving tracker's directory.
    #[test]
    fn test_event_replicates_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let sync_port = listener.local_addr().unwrap().port();

        let receiver_dir = Arc::new(Directory::new());
        let receiver_peer = Arc::new(SyncPeer::new());
        let reader_dir = receiver_dir.clone();
        let reader_peer = receiver_peer.clone();
        let reader = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let generation = reader_peer.attach(stream.try_clone().unwrap());
            sync_read_loop(stream, reader_dir, &reader_peer, generation);
        });

        let sender_peer = SyncPeer::new();
        let stream = TcpStream::connect(("127.0.0.1", sync_port)).unwrap();
        sender_peer.attach(stream);
        assert!(sender_peer.is_connected());

        sender_peer.send(&SyncEvent::CreateUser {
            user_id: "alice".into(),
            password: "a".into(),
        });
        sender_peer.send(&SyncEvent::CreateGroup {
            group_id: "g2".into(),
            owner_id: "alice".into(),
        });

        // dropping the write half ends the read loop
        sender_peer.clear_if(1);
        reader.join().unwrap();

        let group = receiver_dir.group_snapshot("g2").unwrap();
        assert_eq!(group.owner_id, "alice");
        assert!(group.members.contains("alice"));
        assert!(!receiver_peer.is_connected());
    }

    #[test]
    fn test_send_without_peer_is_noop() {
        let peer = SyncPeer::new();
        // no socket attached; must not panic or block
        peer.send(&SyncEvent::CreateUser {
            user_id: "alice".into(),
            password: "a".into(),
        });
        assert!(!peer.is_connected());
    }
}
