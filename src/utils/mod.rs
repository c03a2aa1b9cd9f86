//! Utility functions: timestamps, hashing, atomic writes

pub mod atomic;
pub mod hash;
pub mod time;

pub use atomic::{atomic_write, atomic_write_with};
pub use hash::{sha256_file, sha256_hex};
pub use time::{iso_now, now_ts, utc_compact};
