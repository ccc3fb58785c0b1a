pub const REPO_NAMASTE_FILE: &str = "0=ocfl_1.0";
pub const REPO_NAMASTE_FILE_1_1: &str = "0=ocfl_1.1";
pub const OBJECT_NAMASTE_FILE: &str = "0=ocfl_object_1.0";
pub const OBJECT_NAMASTE_FILE_1_1: &str = "0=ocfl_object_1.1";
/// Common prefix shared by every OCFL object version declaration file, regardless of spec
/// version, so object roots can be recognized without knowing which spec version produced them.
pub const OBJECT_NAMASTE_FILE_PREFIX: &str = "0=ocfl_object_";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_SIDECAR_PREFIX: &str = "inventory.json.";
pub const OCFL_LAYOUT_FILE: &str = "ocfl_layout.json";
pub const OCFL_SPEC_FILE: &str = "ocfl_1.0.txt";
pub const OCFL_SPEC_FILE_1_1: &str = "ocfl_1.1.txt";
pub const EXTENSIONS_DIR: &str = "extensions";
pub const EXTENSIONS_CONFIG_FILE: &str = "config.json";
pub const OCFL_VERSION: &str = "ocfl_1.0";
pub const OCFL_VERSION_1_1: &str = "ocfl_1.1";
pub const OCFL_OBJECT_VERSION: &str = "ocfl_object_1.0";
pub const OCFL_OBJECT_VERSION_1_1: &str = "ocfl_object_1.1";
pub const INVENTORY_TYPE: &str = "https://ocfl.io/1.0/spec/#inventory";
pub const INVENTORY_TYPE_1_1: &str = "https://ocfl.io/1.1/spec/#inventory";
pub const OBJECT_NAMASTE_CONTENTS_1_0: &str = "ocfl_object_1.0\n";
pub const OBJECT_NAMASTE_CONTENTS_1_1: &str = "ocfl_object_1.1\n";

pub const DEFAULT_CONTENT_DIR: &str = "content";

pub const MUTABLE_HEAD_EXT_DIR: &str = "extensions/0005-mutable-head";
pub const MUTABLE_HEAD_INVENTORY_FILE: &str = "extensions/0005-mutable-head/head/inventory.json";

pub const FLAT_DIRECT_LAYOUT_EXTENSION: &str = "0002-flat-direct-storage-layout";
pub const HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION: &str = "0003-hash-and-id-n-tuple-storage-layout";
pub const HASHED_NTUPLE_LAYOUT_EXTENSION: &str = "0004-hashed-n-tuple-storage-layout";
pub const MUTABLE_HEAD_EXTENSION: &str = "0005-mutable-head";
pub const FLAT_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0006-flat-omit-prefix-storage-layout";
pub const NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION: &str = "0007-n-tuple-omit-prefix-storage-layout";
pub const ROCFL_STAGING_EXTENSION: &str = "rocfl-staging";
/// Not an OCFL-community extension; rocfl's own naming convention for the directory it uses to
/// track per-object write locks within the staging area.
pub const ROCFL_LOCKS_EXTENSION: &str = "rocfl-locks";

pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    FLAT_DIRECT_LAYOUT_EXTENSION,
    HASHED_NTUPLE_OBJECT_ID_LAYOUT_EXTENSION,
    HASHED_NTUPLE_LAYOUT_EXTENSION,
    FLAT_OMIT_PREFIX_LAYOUT_EXTENSION,
    NTUPLE_OMIT_PREFIX_LAYOUT_EXTENSION,
    MUTABLE_HEAD_EXTENSION,
    ROCFL_STAGING_EXTENSION,
    ROCFL_LOCKS_EXTENSION,
];
