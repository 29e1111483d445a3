use gshare_config::PIECE_SIZE;

use crate::helpers::piece_count;

#[derive(Debug, Clone, PartialEq)]
/// Everything a client needs to fetch and verify one shared file: the
/// payload of a successful `download_file` reply.
pub struct FileManifest {
    pub file_size: u64,
    pub file_hash: String,
    pub piece_hashes: Vec<String>,
    pub seeders: Vec<String>,
}

impl FileManifest {
    pub fn total_pieces(&self) -> u32 {
        self.piece_hashes.len() as u32
    }

    /// `<size> <hash> <piece hashes...> <seeders...>`
    pub fn to_wire(&self) -> String {
        let mut msg = format!("{} {}", self.file_size, self.file_hash);
        for hash in &self.piece_hashes {
            msg.push(' ');
            msg.push_str(hash);
        }
        for seeder in &self.seeders {
            msg.push(' ');
            msg.push_str(seeder);
        }
        msg
    }

    /// Parse the payload tokens of a `download_file` reply. The piece-hash
    /// count is not carried on the wire; it is recomputed from the size.
    pub fn parse(tokens: &[String]) -> Result<FileManifest, String> {
        if tokens.len() < 2 {
            return Err("manifest is missing size or hash".into());
        }
        let file_size = tokens[0]
            .parse::<u64>()
            .map_err(|_| format!("malformed file size '{}'", tokens[0]))?;
        let total = piece_count(file_size, PIECE_SIZE) as usize;
        if tokens.len() < 2 + total + 1 {
            return Err(format!(
                "manifest has {} tokens, expected at least {} for {} pieces plus a seeder",
                tokens.len(),
                2 + total + 1,
                total
            ));
        }
        Ok(FileManifest {
            file_size,
            file_hash: tokens[1].clone(),
            piece_hashes: tokens[2..2 + total].to_vec(),
            seeders: tokens[2 + total..].to_vec(),
        })
    }
}

#[cfg(test)]
mod unit_tests {
    use crate::helpers::tokenize;

    use super::*;

    fn sample() -> FileManifest {
        FileManifest {
            file_size: 600_000,
            file_hash: "ffff".into(),
            piece_hashes: vec!["aaaa".into(), "bbbb".into()],
            seeders: vec!["10.0.0.7:12000".into(), "10.0.0.8:13000".into()],
        }
    }

    #[test]
    fn test_wire_layout() {
        assert_eq!(
            sample().to_wire(),
            "600000 ffff aaaa bbbb 10.0.0.7:12000 10.0.0.8:13000"
        );
    }

    #[test]
    fn test_parse_splits_hashes_from_seeders() {
        let parsed = FileManifest::parse(&tokenize(&sample().to_wire())).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_parse_zero_byte_file() {
        let parsed = FileManifest::parse(&tokenize("0 dddd 10.0.0.7:12000")).unwrap();
        assert_eq!(parsed.total_pieces(), 0);
        assert_eq!(parsed.seeders, vec!["10.0.0.7:12000"]);
    }

    #[test]
    fn test_parse_missing_seeder_rejected() {
        // two pieces of hashes but nothing after them
        assert!(FileManifest::parse(&tokenize("600000 ffff aaaa bbbb")).is_err());
    }
}
