use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use gshare_config::PIECE_SIZE;
use gshare_core::utils::sha1_hex;
use sha1::{Digest, Sha1};

/// Hash a local file into per-piece digests plus the whole-file digest,
/// reading it once.
pub fn hash_file_pieces(path: &Path) -> io::Result<(u64, String, Vec<String>)> {
    let mut file = File::open(path)?;
    let mut whole = Sha1::new();
    let mut piece_hashes = Vec::new();
    let mut file_size: u64 = 0;
    let mut buf = vec![0u8; PIECE_SIZE];

    loop {
        // a piece may arrive in several short reads
        let mut filled = 0;
        while filled < PIECE_SIZE {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        piece_hashes.push(sha1_hex(&buf[..filled]));
        whole.update(&buf[..filled]);
        file_size += filled as u64;
        if filled < PIECE_SIZE {
            break;
        }
    }

    Ok((file_size, hex::encode(whole.finalize()), piece_hashes))
}

/// Build the `upload_file` control command for a local path. Returns the
/// registered filename (the path's basename) alongside the command.
pub fn build_upload_command(group_id: &str, path: &Path) -> io::Result<(String, String)> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path '{}' has no file name", path.display()),
            )
        })?;

    let (file_size, file_hash, piece_hashes) = hash_file_pieces(path)?;
    let mut command = format!("upload_file {group_id} {filename} {file_size} {file_hash}");
    for hash in &piece_hashes {
        command.push(' ');
        command.push_str(hash);
    }
    Ok((filename, command))
}
