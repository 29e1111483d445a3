mod directory;
mod file_info;
mod group;

pub use directory::{CommandOutcome, Directory, Session};
pub use file_info::FileInfo;
pub use group::Group;
