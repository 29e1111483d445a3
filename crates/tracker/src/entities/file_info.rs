use std::collections::BTreeSet;

use gshare_core::entities::FileManifest;

#[derive(Debug, Clone)]
/// A file registered in a group: its digests and the endpoints currently
/// serving it. Seeder endpoints are weak references; they go stale when the
/// owning user logs out and the directory prunes them.
pub struct FileInfo {
    pub filename: String,
    pub file_size: u64,
    pub file_hash: String,
    pub piece_hashes: Vec<String>,
    pub seeders: BTreeSet<String>,
}

impl FileInfo {
    pub fn new(
        filename: String,
        file_size: u64,
        file_hash: String,
        piece_hashes: Vec<String>,
    ) -> Self {
        FileInfo {
            filename,
            file_size,
            file_hash,
            piece_hashes,
            seeders: BTreeSet::new(),
        }
    }

    /// Snapshot for a `download_file` reply.
    pub fn manifest(&self) -> FileManifest {
        FileManifest {
            file_size: self.file_size,
            file_hash: self.file_hash.clone(),
            piece_hashes: self.piece_hashes.clone(),
            seeders: self.seeders.iter().cloned().collect(),
        }
    }
}
