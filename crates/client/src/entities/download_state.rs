use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gshare_core::entities::FileManifest;

/// Files this client serves: name -> local path. Written by upload and
/// completed-download paths, read by every seeder worker.
pub type SharedFiles = Arc<Mutex<HashMap<String, PathBuf>>>;

/// Ongoing and finished downloads, keyed by filename.
pub type Downloads = Arc<Mutex<BTreeMap<String, DownloadState>>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownloadStatus {
    Downloading,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
/// Client-side progress record for one `download_file`. Bits in
/// `pieces_downloaded` only ever go from false to true, and the status
/// moves Downloading -> Completed or Downloading -> Failed.
pub struct DownloadState {
    pub group_id: String,
    pub filename: String,
    pub destination_path: PathBuf,
    pub file_size: u64,
    pub total_pieces: u32,
    pub pieces_downloaded: Vec<bool>,
    pub piece_hashes: Vec<String>,
    pub status: DownloadStatus,
}

impl DownloadState {
    pub fn new(
        group_id: String,
        filename: String,
        destination_path: PathBuf,
        manifest: &FileManifest,
    ) -> Self {
        let total_pieces = manifest.total_pieces();
        DownloadState {
            group_id,
            filename,
            destination_path,
            file_size: manifest.file_size,
            total_pieces,
            pieces_downloaded: vec![false; total_pieces as usize],
            piece_hashes: manifest.piece_hashes.clone(),
            status: DownloadStatus::Downloading,
        }
    }

    /// The `show_downloads` line: `[C]` for completed, `[D]` otherwise.
    pub fn status_line(&self) -> String {
        let tag = match self.status {
            DownloadStatus::Completed => "C",
            _ => "D",
        };
        format!("[{}] [{}] {}", tag, self.group_id, self.filename)
    }
}
