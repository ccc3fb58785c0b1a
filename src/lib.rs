//! `rocfl` is a storage-agnostic engine for reading, writing, and validating
//! [OCFL repositories](https://ocfl.io/).
//!
//! ```no_run
//! use rocfl::ocfl::OcflRepo;
//!
//! let repo = OcflRepo::fs_repo("path/to/ocfl/storage/root")?;
//! # Ok::<(), rocfl::ocfl::RocflError>(())
//! ```

pub mod config;
pub mod ocfl;
