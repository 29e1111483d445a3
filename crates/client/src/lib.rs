use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use gshare_core::entities::FileManifest;
use gshare_core::helpers::tokenize;
use gshare_core::utils::Logger;

pub mod download;
pub mod entities;
pub mod seeder;
pub mod session;
pub mod upload;

use entities::{Downloads, SharedFiles};
use session::TrackerSession;

pub(crate) static LOGGER: Logger = Logger::verbose("Client");

/// A network participant: a control session to one tracker, an embedded
/// seeder service, and the local download/share bookkeeping.
pub struct Client {
    session: Arc<Mutex<TrackerSession>>,
    shared_files: SharedFiles,
    downloads: Downloads,
}

impl Client {
    /// Start the seeder service, then prepare a session carrying its port.
    pub fn new(tracker_addrs: Vec<String>) -> io::Result<Client> {
        let shared_files: SharedFiles = Arc::new(Mutex::new(HashMap::new()));
        let seeder_port = seeder::start(shared_files.clone())?;
        let session = TrackerSession::new(tracker_addrs, seeder_port);
        Ok(Client {
            session: Arc::new(Mutex::new(session)),
            shared_files,
            downloads: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    /// Connect and run the command loop until `quit` or EOF.
    pub fn run(&self) -> io::Result<()> {
        if !self.session.lock().unwrap().connect() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "both trackers are down",
            ));
        }

        let stdin = io::stdin();
        print!("> ");
        io::stdout().flush()?;
        for line in stdin.lock().lines() {
            if !self.dispatch(&line?) {
                break;
            }
            print!("> ");
            io::stdout().flush()?;
        }
        Ok(())
    }

    /// Handle one input line. Returns false on `quit`.
    pub fn dispatch(&self, line: &str) -> bool {
        let args = tokenize(line);
        if args.is_empty() {
            return true;
        }

        match args[0].as_str() {
            "quit" => return false,
            "login" => self.handle_login(&args),
            "upload_file" => self.handle_upload(&args),
            "download_file" => self.handle_download(&args),
            "show_downloads" => self.show_downloads(),
            _ => {
                let response = self.session.lock().unwrap().send(line.trim());
                println!("{response}");
                if args[0] == "logout" && response.starts_with("success") {
                    self.session.lock().unwrap().note_logout();
                }
            }
        }
        true
    }

    /// `login <user> <pass>` gains the seeder port on the wire so the
    /// tracker can build this client's endpoint.
    fn handle_login(&self, args: &[String]) {
        if args.len() != 3 {
            println!("Usage: login <user_id> <password>");
            return;
        }
        let mut session = self.session.lock().unwrap();
        let command = format!("login {} {} {}", args[1], args[2], session.seeder_port());
        let response = session.send(&command);
        println!("{response}");
        if response.starts_with("success") {
            session.note_login(&args[1], &args[2]);
        }
    }

    fn handle_upload(&self, args: &[String]) {
        if args.len() != 3 {
            println!("Usage: upload_file <group_id> <file_path>");
            return;
        }
        if !self.session.lock().unwrap().is_logged_in {
            println!("You must be logged in to upload files.");
            return;
        }

        let path = Path::new(&args[2]);
        let (filename, command) = match upload::build_upload_command(&args[1], path) {
            Ok(parts) => parts,
            Err(e) => {
                println!("ERROR: Cannot open file {} ({e})", args[2]);
                return;
            }
        };

        let response = self.session.lock().unwrap().send(&command);
        println!("{response}");
        if response.starts_with("success") {
            self.shared_files
                .lock()
                .unwrap()
                .insert(filename, PathBuf::from(&args[2]));
        }
    }

    fn handle_download(&self, args: &[String]) {
        if args.len() != 4 {
            println!("Usage: download_file <group_id> <file_name> <destination_path>");
            return;
        }
        if !self.session.lock().unwrap().is_logged_in {
            println!("You must be logged in.");
            return;
        }

        let command = format!("download_file {} {}", args[1], args[2]);
        let response = self.session.lock().unwrap().send(&command);

        let payload = match response.strip_prefix("success ") {
            Some(payload) => payload,
            None => {
                println!("{response}");
                return;
            }
        };
        let manifest = match FileManifest::parse(&tokenize(payload)) {
            Ok(manifest) => manifest,
            Err(e) => {
                println!("ERROR: Malformed manifest from tracker ({e})");
                return;
            }
        };

        LOGGER.info(format!("Starting download for {}", args[2]));
        let group_id = args[1].clone();
        let filename = args[2].clone();
        let dest_path = PathBuf::from(&args[3]);
        let downloads = self.downloads.clone();
        let shared_files = self.shared_files.clone();
        let session = self.session.clone();
        thread::spawn(move || {
            download::download_manager(
                group_id,
                filename,
                dest_path,
                manifest,
                downloads,
                shared_files,
                session,
            );
        });
    }

    fn show_downloads(&self) {
        let downloads = self.downloads.lock().unwrap();
        if downloads.is_empty() {
            println!("No active or completed downloads.");
            return;
        }
        for state in downloads.values() {
            println!("{}", state.status_line());
        }
    }
}
