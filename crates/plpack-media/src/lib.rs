//! yt-dlp CLI wrapper for the PlaylistPack backend.
//!
//! This crate isolates the two external media collaborators behind narrow
//! interfaces:
//!
//! - [`playlist::fetch_playlist_info`]: flat playlist metadata extraction
//! - [`fetch::MediaFetcher`]: per-item fetch/convert with live progress,
//!   implemented for production by [`fetch::YtDlpFetcher`]
//!
//! Everything that blocks on the network or on a child process lives here;
//! the engine crate above it only ever waits on channels and semaphores.

pub mod error;
pub mod fetch;
pub mod fs;
pub mod playlist;
pub mod progress;

pub use error::{MediaError, MediaResult};
pub use fetch::{CancelFlag, FetchRequest, MediaFetcher, YtDlpFetcher};
pub use playlist::fetch_playlist_info;
pub use progress::{channel, noop_sender, FetchProgress, ProgressReceiver, ProgressSender};
