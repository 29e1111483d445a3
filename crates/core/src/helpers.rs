/// Number of fixed-size pieces needed to cover `file_size` bytes.
/// A zero-byte file has zero pieces.
pub fn piece_count(file_size: u64, piece_size: usize) -> u32 {
    ((file_size + piece_size as u64 - 1) / piece_size as u64) as u32
}

/// Expected length of piece `index`. Every piece is `piece_size` bytes except
/// the last, which covers the remainder (or a full piece when the size
/// divides exactly). Callers must not ask about pieces of a zero-byte file.
pub fn piece_len(index: u32, file_size: u64, piece_size: usize) -> usize {
    if index + 1 == piece_count(file_size, piece_size) {
        (((file_size - 1) % piece_size as u64) + 1) as usize
    } else {
        piece_size
    }
}

/// Split a wire message into whitespace-delimited tokens.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_owned).collect()
}

pub fn create_buffer(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

#[cfg(test)]
mod unit_tests {
    use gshare_config::PIECE_SIZE;

    use super::*;

    #[test]
    fn test_piece_count_zero_bytes() {
        assert_eq!(piece_count(0, PIECE_SIZE), 0);
    }

    #[test]
    fn test_piece_count_one_byte() {
        assert_eq!(piece_count(1, PIECE_SIZE), 1);
        assert_eq!(piece_len(0, 1, PIECE_SIZE), 1);
    }

    #[test]
    fn test_piece_count_exact_multiple() {
        let size = 2 * PIECE_SIZE as u64;
        assert_eq!(piece_count(size, PIECE_SIZE), 2);
        // last piece is a full piece, not zero
        assert_eq!(piece_len(1, size, PIECE_SIZE), PIECE_SIZE);
    }

    #[test]
    fn test_piece_len_600000_bytes() {
        let size = 600_000u64;
        assert_eq!(piece_count(size, PIECE_SIZE), 2);
        assert_eq!(piece_len(0, size, PIECE_SIZE), PIECE_SIZE);
        assert_eq!(piece_len(1, size, PIECE_SIZE), 600_000 - PIECE_SIZE);
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        assert_eq!(
            tokenize("  login alice  a   7000 "),
            vec!["login", "alice", "a", "7000"]
        );
        assert!(tokenize("   ").is_empty());
    }
}
