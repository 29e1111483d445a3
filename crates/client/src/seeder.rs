use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use gshare_config::{
    LOCAL_NETWORK, PIECE_IO_TIMEOUT_SECS, PIECE_SIZE, SEEDER_BIND_ATTEMPTS, SEEDER_PORT_MIN,
    SEEDER_PORT_MAX,
};
use gshare_core::helpers::tokenize;
use gshare_core::wire::read_frame;
use rand::Rng;

use crate::entities::SharedFiles;
use crate::LOGGER;

/// Bind the seeder service to a random port and start serving piece
/// requests in the background. Returns the chosen port.
pub fn start(shared_files: SharedFiles) -> io::Result<u16> {
    let (listener, port) = bind_random_port()?;
    LOGGER.info(format!("Seeder listening on port {port}"));
    thread::spawn(move || serve(listener, shared_files));
    Ok(port)
}

fn bind_random_port() -> io::Result<(TcpListener, u16)> {
    let mut rng = rand::thread_rng();
    for _ in 0..SEEDER_BIND_ATTEMPTS {
        let port: u16 = rng.gen_range(SEEDER_PORT_MIN..=SEEDER_PORT_MAX);
        if let Ok(listener) = TcpListener::bind((LOCAL_NETWORK, port)) {
            return Ok((listener, port));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrInUse,
        format!("no free seeder port after {SEEDER_BIND_ATTEMPTS} attempts"),
    ))
}

fn serve(listener: TcpListener, shared_files: SharedFiles) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let shared = shared_files.clone();
                thread::spawn(move || {
                    let peer = stream.peer_addr();
                    if let Err(e) = handle_peer(stream, shared) {
                        LOGGER.debug(format!("seeder: request from {peer:?} failed: {e}"));
                    }
                });
            }
            Err(e) => {
                LOGGER.error(format!("seeder: accept failed: {e}"));
            }
        }
    }
}

/// Serve one `get_piece <filename> <index>` request: raw piece bytes, no
/// length prefix, then close. Unknown files and malformed requests just
/// close the connection; the downloader treats the short read as a miss.
pub fn handle_peer(mut stream: TcpStream, shared_files: SharedFiles) -> io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(PIECE_IO_TIMEOUT_SECS)))?;
    stream.set_write_timeout(Some(Duration::from_secs(PIECE_IO_TIMEOUT_SECS)))?;

    let request = match read_frame(&mut stream)? {
        Some(request) => request,
        None => return Ok(()),
    };
    let tokens = tokenize(&request);
    if tokens.len() != 3 || tokens[0] != "get_piece" {
        return Ok(());
    }
    let filename = &tokens[1];
    let piece_index: u64 = match tokens[2].parse() {
        Ok(index) => index,
        Err(_) => return Ok(()),
    };

    let path = shared_files.lock().unwrap().get(filename).cloned();
    let path = match path {
        Some(path) => path,
        None => return Ok(()),
    };

    let mut file = File::open(&path)?;
    file.seek(SeekFrom::Start(piece_index * PIECE_SIZE as u64))?;
    let mut piece = Vec::with_capacity(PIECE_SIZE);
    file.take(PIECE_SIZE as u64).read_to_end(&mut piece)?;
    if !piece.is_empty() {
        LOGGER.debug(format!(
            "seeder: sending piece {piece_index} of {filename} ({} bytes)",
            piece.len()
        ));
        stream.write_all(&piece)?;
    }
    Ok(())
}
