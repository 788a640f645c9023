//! Small time and arithmetic helpers shared by the codec, engine and compactor.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Returns the current time as seconds since the Unix epoch.
///
/// Inode timestamps are stored as `u64` seconds; sub-second resolution is not
/// meaningful for this format and is dropped here rather than in the codec.
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}
