mod hashing;
mod logger;

pub use hashing::{sha1_file, sha1_hex};
pub use logger::Logger;
