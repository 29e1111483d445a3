mod download_state;

pub use download_state::{DownloadState, DownloadStatus, Downloads, SharedFiles};
