use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gshare_config::{DOWNLOAD_WORKERS, PIECE_IO_TIMEOUT_SECS, PIECE_RETRY_ROUNDS, PIECE_SIZE};
use gshare_core::entities::FileManifest;
use gshare_core::helpers::{create_buffer, piece_len};
use gshare_core::utils::{sha1_file, sha1_hex};
use gshare_core::wire::write_frame;
use threadpool::ThreadPool;

use crate::entities::{DownloadState, DownloadStatus, Downloads, SharedFiles};
use crate::session::TrackerSession;
use crate::LOGGER;

/// Top-level entry for one accepted `download_file`: runs the transfer,
/// flips the status, and on success registers the file and announces this
/// client as a seeder.
pub fn download_manager(
    group_id: String,
    filename: String,
    dest_path: PathBuf,
    manifest: FileManifest,
    downloads: Downloads,
    shared_files: SharedFiles,
    session: Arc<Mutex<TrackerSession>>,
) {
    match run_download(&group_id, &filename, &dest_path, &manifest, &downloads) {
        Ok(()) => {
            if let Some(state) = downloads.lock().unwrap().get_mut(&filename) {
                state.status = DownloadStatus::Completed;
            }
            shared_files
                .lock()
                .unwrap()
                .insert(filename.clone(), dest_path);
            LOGGER.info(format!("Download completed for {filename}"));

            let announce = format!("i_am_seeder {group_id} {filename}");
            let reply = session.lock().unwrap().send(&announce);
            LOGGER.debug(format!("seeder announcement: {reply}"));
        }
        Err(e) => {
            LOGGER.error(format!("Download failed for {filename}: {e}"));
            if let Some(state) = downloads.lock().unwrap().get_mut(&filename) {
                state.status = DownloadStatus::Failed;
            }
        }
    }
}

/// Fetch every piece into `dest_path` and verify the whole-file digest.
/// Registers the DownloadState and keeps its bitmap current; the caller
/// sets the final status.
pub fn run_download(
    group_id: &str,
    filename: &str,
    dest_path: &Path,
    manifest: &FileManifest,
    downloads: &Downloads,
) -> io::Result<()> {
    downloads.lock().unwrap().insert(
        filename.to_owned(),
        DownloadState::new(
            group_id.to_owned(),
            filename.to_owned(),
            dest_path.to_owned(),
            manifest,
        ),
    );

    if manifest.seeders.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            "manifest carries no seeders",
        ));
    }

    // pre-size the destination so workers can write at their offsets
    let file = File::create(dest_path)?;
    file.set_len(manifest.file_size)?;
    drop(file);

    let total = manifest.total_pieces();
    if total > 0 {
        let workers = DOWNLOAD_WORKERS
            .min(manifest.seeders.len())
            .min(total as usize)
            .max(1);
        let pool = ThreadPool::new(workers);

        let manifest = Arc::new(manifest.clone());
        let next_piece = Arc::new(AtomicU32::new(0));
        let seeder_cursor = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicBool::new(false));

        for _ in 0..workers {
            let manifest = manifest.clone();
            let next_piece = next_piece.clone();
            let seeder_cursor = seeder_cursor.clone();
            let failed = failed.clone();
            let downloads = downloads.clone();
            let filename = filename.to_owned();
            let dest_path = dest_path.to_owned();
            pool.execute(move || loop {
                if failed.load(Ordering::SeqCst) {
                    break;
                }
                let index = next_piece.fetch_add(1, Ordering::SeqCst);
                if index >= manifest.total_pieces() {
                    break;
                }
                match fetch_and_store_piece(index, &manifest, &filename, &dest_path, &seeder_cursor)
                {
                    Ok(()) => {
                        let mut downloads = downloads.lock().unwrap();
                        if let Some(state) = downloads.get_mut(&filename) {
                            state.pieces_downloaded[index as usize] = true;
                        }
                    }
                    Err(e) => {
                        LOGGER.error(format!("piece {index} of {filename}: {e}"));
                        failed.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            });
        }
        pool.join();

        if failed.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "no seeder could supply every piece",
            ));
        }
    }

    // end-to-end check over the assembled file
    let actual = sha1_file(dest_path)?;
    if actual != manifest.file_hash {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "whole-file hash mismatch: expected {}, got {}",
                manifest.file_hash, actual
            ),
        ));
    }
    Ok(())
}

/// Fetch one piece, verifying its digest, retrying with the next seeder on
/// a miss. Gives up after a bounded number of passes over the seeder list.
fn fetch_and_store_piece(
    index: u32,
    manifest: &FileManifest,
    filename: &str,
    dest_path: &Path,
    seeder_cursor: &AtomicUsize,
) -> io::Result<()> {
    let expected = piece_len(index, manifest.file_size, PIECE_SIZE);
    let attempts = manifest.seeders.len() * PIECE_RETRY_ROUNDS;

    for _ in 0..attempts {
        let pick = seeder_cursor.fetch_add(1, Ordering::Relaxed) % manifest.seeders.len();
        let seeder = &manifest.seeders[pick];
        match fetch_piece(seeder, filename, index, expected) {
            Ok(bytes) => {
                if sha1_hex(&bytes) == manifest.piece_hashes[index as usize] {
                    LOGGER.debug(format!(
                        "piece {index} of {filename} verified from {seeder}"
                    ));
                    let mut file = OpenOptions::new().write(true).open(dest_path)?;
                    file.seek(SeekFrom::Start(index as u64 * PIECE_SIZE as u64))?;
                    file.write_all(&bytes)?;
                    return Ok(());
                }
                LOGGER.warn(format!(
                    "Hash mismatch for piece {index} from {seeder}. Retrying."
                ));
            }
            Err(e) => {
                LOGGER.debug(format!("piece {index}: seeder {seeder} failed: {e}"));
            }
        }
    }

    Err(io::Error::new(
        io::ErrorKind::Other,
        format!(
            "retries exhausted across {} seeder(s)",
            manifest.seeders.len()
        ),
    ))
}

/// One-shot data-plane exchange: connect, send the request frame, read
/// exactly the expected raw bytes.
pub fn fetch_piece(seeder: &str, filename: &str, index: u32, expected: usize) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(seeder)?;
    stream.set_read_timeout(Some(Duration::from_secs(PIECE_IO_TIMEOUT_SECS)))?;
    stream.set_write_timeout(Some(Duration::from_secs(PIECE_IO_TIMEOUT_SECS)))?;

    write_frame(&mut stream, &format!("get_piece {filename} {index}"))?;

    let mut buf = create_buffer(expected);
    stream.read_exact(&mut buf)?;
    Ok(buf)
}
