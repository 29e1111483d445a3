use std::net::TcpStream;

use gshare_config::split_endpoint;
use gshare_core::wire::{read_frame, write_frame};

use crate::LOGGER;

/// The control channel: one long-lived connection to the current tracker,
/// with a one-shot failover to the other tracker on any I/O failure.
pub struct TrackerSession {
    addresses: Vec<String>,
    current_idx: usize,
    stream: Option<TcpStream>,
    pub is_logged_in: bool,
    pub user_id: String,
    password: String,
    seeder_port: u16,
}

impl TrackerSession {
    pub fn new(addresses: Vec<String>, seeder_port: u16) -> Self {
        TrackerSession {
            addresses,
            current_idx: 0,
            stream: None,
            is_logged_in: false,
            user_id: String::new(),
            password: String::new(),
            seeder_port,
        }
    }

    pub fn seeder_port(&self) -> u16 {
        self.seeder_port
    }

    fn try_connect(&mut self, idx: usize) -> bool {
        let addr = &self.addresses[idx];
        let (host, port) = match split_endpoint(addr) {
            Ok(parts) => parts,
            Err(_) => return false,
        };
        match TcpStream::connect((host.as_str(), port)) {
            Ok(stream) => {
                LOGGER.info(format!("Successfully connected to tracker at {addr}"));
                self.stream = Some(stream);
                true
            }
            Err(_) => false,
        }
    }

    /// Connect to the current tracker, falling over to the other one if it
    /// is unreachable. Returns false when both are down.
    pub fn connect(&mut self) -> bool {
        if self.try_connect(self.current_idx) {
            return true;
        }
        LOGGER.warn("Could not connect to primary tracker. Failing over...");
        self.current_idx = (self.current_idx + 1) % self.addresses.len();
        if self.try_connect(self.current_idx) {
            return true;
        }
        LOGGER.error("FATAL: Both trackers appear to be down.");
        false
    }

    /// Send one command and return the reply line. Transport failures are
    /// surfaced as `ERROR: ...` strings after the failover below has been
    /// exhausted.
    pub fn send(&mut self, command: &str) -> String {
        self.send_inner(command, false)
    }

    fn send_inner(&mut self, command: &str, is_retry: bool) -> String {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return String::from("ERROR: Not connected to any tracker."),
        };

        if write_frame(stream, command).is_err() {
            return self.attempt_failover_and_retry(command, is_retry);
        }
        match read_frame(stream) {
            Ok(Some(reply)) => reply,
            _ => self.attempt_failover_and_retry(command, is_retry),
        }
    }

    /// One-shot per user command: close, swing to the other tracker, replay
    /// the login silently, retransmit the original command once.
    fn attempt_failover_and_retry(&mut self, command: &str, is_retry: bool) -> String {
        if is_retry {
            return String::from("ERROR: Failed to send command to the secondary tracker.");
        }

        LOGGER.warn("Connection lost. Attempting to reconnect and retry...");
        self.stream = None;
        self.current_idx = (self.current_idx + 1) % self.addresses.len();
        if !self.try_connect(self.current_idx) {
            LOGGER.error("FATAL: Both trackers appear to be down.");
            return String::from("ERROR: All trackers are down.");
        }

        if self.is_logged_in {
            LOGGER.info("Re-authenticating session with new tracker...");
            let login_cmd = format!(
                "login {} {} {}",
                self.user_id, self.password, self.seeder_port
            );
            let response = self.exchange_no_retry(&login_cmd);
            if response.starts_with("success") {
                LOGGER.info("Re-authentication successful.");
            } else {
                LOGGER.warn("Warning: Re-login failed. You may need to login manually.");
                self.is_logged_in = false;
            }
        }

        self.send_inner(command, true)
    }

    /// A raw exchange on the current socket with no failover, used for the
    /// silent login replay.
    fn exchange_no_retry(&mut self, command: &str) -> String {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return String::new(),
        };
        if write_frame(stream, command).is_err() {
            return String::new();
        }
        match read_frame(stream) {
            Ok(Some(reply)) => reply,
            _ => String::new(),
        }
    }

    /// Record a successful interactive login so failover can replay it.
    pub fn note_login(&mut self, user_id: &str, password: &str) {
        self.is_logged_in = true;
        self.user_id = user_id.to_owned();
        self.password = password.to_owned();
    }

    pub fn note_logout(&mut self) {
        self.is_logged_in = false;
        self.user_id.clear();
        self.password.clear();
    }
}
