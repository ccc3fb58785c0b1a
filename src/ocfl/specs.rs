//! Text of the OCFL specification and storage-layout extension specifications that are written
//! into new repositories at `ocfl_1.0.txt` / `ocfl_1.1.txt` and into each extension's config
//! directory so that a repository is self-documenting without needing network access.

pub const OCFL_1_0_SPEC: &str = include_str!("specs/ocfl_1.0.txt");
pub const OCFL_1_1_SPEC: &str = include_str!("specs/ocfl_1.1.txt");
pub const EXT_0002_SPEC: &str = include_str!("specs/0002-flat-direct-storage-layout.md");
pub const EXT_0003_SPEC: &str =
    include_str!("specs/0003-hash-and-id-n-tuple-storage-layout.md");
pub const EXT_0004_SPEC: &str = include_str!("specs/0004-hashed-n-tuple-storage-layout.md");
pub const EXT_0006_SPEC: &str = include_str!("specs/0006-flat-omit-prefix-storage-layout.md");
pub const EXT_0007_SPEC: &str =
    include_str!("specs/0007-n-tuple-omit-prefix-storage-layout.md");
