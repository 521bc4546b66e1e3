//! Low-level primitives underneath records and replay.
//!
//! Includes byte utilities, positioned file I/O, and the redo log file.

/// Big-endian readers and writers over byte slices.
pub mod bytes;

/// Positioned file I/O.
///
/// The [`io::FileIo`] trait with an OS-backed and an in-memory implementation.
pub mod io;

/// Redo log for crash recovery.
///
/// Frames encoded page deltas with chained checksums.
pub mod wal;
