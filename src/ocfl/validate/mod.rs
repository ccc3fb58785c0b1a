use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::Display as EnumDisplay;

use crate::ocfl::consts::{
    EXTENSIONS_DIR, INVENTORY_FILE, INVENTORY_SIDECAR_PREFIX, INVENTORY_TYPE, INVENTORY_TYPE_1_1,
    OBJECT_NAMASTE_CONTENTS_1_0, OBJECT_NAMASTE_CONTENTS_1_1, OBJECT_NAMASTE_FILE_PREFIX,
    REPO_NAMASTE_FILE, REPO_NAMASTE_FILE_1_1,
};
use crate::ocfl::digest::{FixityCheckReader, HexDigest, MultiDigestWriter};
use crate::ocfl::error::Result;
use crate::ocfl::inventory::Inventory;
use crate::ocfl::store::{Listing, Storage};
use crate::ocfl::{paths, ContentPathVersion, DigestAlgorithm, InventoryPath, VersionNum};

mod serde;

static SIDECAR_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\t ]+"#).unwrap());

/// Identifies where in an object a validation problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemLocation {
    ObjectRoot,
    Version(VersionNum),
}

impl Display for ProblemLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemLocation::ObjectRoot => write!(f, "root"),
            ProblemLocation::Version(version) => write!(f, "{}", version),
        }
    }
}

/// The outcome of validating a single object, or, while an inventory is still being parsed,
/// the problems accumulated so far. Seeds in `validate::serde` hold a shared reference to one
/// of these and append to it as they walk the JSON document, so every mutating method only
/// needs `&self`.
#[derive(Debug)]
pub struct ObjectValidationResult {
    pub object_id: Option<String>,
    errors: RefCell<Vec<ValidationError>>,
    warnings: RefCell<Vec<ValidationWarning>>,
}

/// Alias used by the inventory parser, where an object id is not always known yet.
pub type ValidationResult = ObjectValidationResult;

impl Default for ObjectValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectValidationResult {
    pub fn new() -> Self {
        Self {
            object_id: None,
            errors: RefCell::new(Vec::new()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn with_id(object_id: &str) -> Self {
        Self {
            object_id: Some(object_id.to_string()),
            errors: RefCell::new(Vec::new()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn error(&self, code: ErrorCode, message: String) {
        self.error_at(ProblemLocation::ObjectRoot, code, message);
    }

    pub fn warn(&self, code: WarnCode, message: String) {
        self.warn_at(ProblemLocation::ObjectRoot, code, message);
    }

    pub fn error_at(&self, location: ProblemLocation, code: ErrorCode, message: String) {
        self.errors
            .borrow_mut()
            .push(ValidationError::at(location, code, message));
    }

    pub fn warn_at(&self, location: ProblemLocation, code: WarnCode, message: String) {
        self.warnings
            .borrow_mut()
            .push(ValidationWarning::at(location, code, message));
    }

    /// Merges a result gathered while parsing a nested document (e.g. a version's inventory)
    /// into this result, tagging every problem with where it was found.
    fn merge_at(&self, location: ProblemLocation, other: ValidationResult) {
        for mut e in other.errors.into_inner() {
            e.location = location;
            self.errors.borrow_mut().push(e);
        }
        for mut w in other.warnings.into_inner() {
            w.location = location;
            self.warnings.borrow_mut().push(w);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.borrow().is_empty()
    }

    pub fn errors(&self) -> Ref<'_, Vec<ValidationError>> {
        self.errors.borrow()
    }

    pub fn warnings(&self) -> Ref<'_, Vec<ValidationWarning>> {
        self.warnings.borrow()
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: ProblemLocation,
    pub code: ErrorCode,
    pub text: String,
}

impl ValidationError {
    pub fn at(location: ProblemLocation, code: ErrorCode, text: String) -> Self {
        Self {
            location,
            code,
            text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub location: ProblemLocation,
    pub code: WarnCode,
    pub text: String,
}

impl ValidationWarning {
    pub fn at(location: ProblemLocation, code: WarnCode, text: String) -> Self {
        Self {
            location,
            code,
            text,
        }
    }
}

/// An inventory document, parsed tolerantly: structural problems are recorded as errors rather
/// than failing the parse outright, so a single malformed field doesn't prevent reporting every
/// other problem in the same document.
#[derive(Debug)]
enum ParseResult {
    Ok(ValidationResult, Inventory),
    Error(ValidationResult),
}

#[allow(dead_code)]
#[derive(Debug, EnumDisplay, Copy, Clone, PartialEq)]
pub enum ErrorCode {
    E001, E002, E003, E004, E005, E006, E007, E008, E009, E010, E011, E012, E013, E014, E015,
    E016, E017, E018, E019, E020, E021, E022, E023, E024, E025, E026, E027, E028, E029, E030,
    E031, E032, E033, E034, E035, E036, E037, E038, E039, E040, E041, E042, E043, E044, E045,
    E046, E047, E048, E049, E050, E051, E052, E053, E054, E055, E056, E057, E058, E059, E060,
    E061, E062, E063, E064, E066, E067, E068, E069, E070, E071, E072, E073, E074, E075, E076,
    E077, E078, E079, E080, E081, E082, E083, E084, E085, E086, E087, E088, E089, E090, E091,
    E092, E093, E094, E095, E096, E097, E098, E099, E100, E101, E102,
}

#[allow(dead_code)]
#[derive(Debug, EnumDisplay, Copy, Clone, PartialEq)]
pub enum WarnCode {
    W001, W002, W003, W004, W005, W006, W007, W008, W009, W010, W011, W012, W013, W014, W015,
}

/// Validates OCFL objects and repositories against the storage abstraction in `ocfl::store`.
/// Grounded on the teacher's own `Validator`, completed per the spec's validation procedure.
pub struct Validator<S: Storage> {
    storage: S,
}

/// Lazily validates every object in a repository, one at a time, so a caller can stop early
/// without paying the cost of walking and validating the entire storage root up front.
pub trait IncrementalValidator {
    /// Returns the next object's validation result, or `None` once every object under the
    /// repository root has been visited.
    fn next_object(&mut self) -> Option<Result<ObjectValidationResult>>;
}

pub struct IncrementalValidatorImpl<'a, S: Storage> {
    validator: &'a Validator<S>,
    root_result: Option<ObjectValidationResult>,
    pending_dirs: Vec<String>,
    pending_objects: Vec<String>,
    fixity_check: bool,
}

impl<'a, S: Storage> IncrementalValidator for IncrementalValidatorImpl<'a, S> {
    fn next_object(&mut self) -> Option<Result<ObjectValidationResult>> {
        if let Some(root_result) = self.root_result.take() {
            return Some(Ok(root_result));
        }

        loop {
            if let Some(object_root) = self.pending_objects.pop() {
                return Some(
                    self.validator
                        .validate_object(None, &object_root, None, self.fixity_check),
                );
            }

            let dir = self.pending_dirs.pop()?;

            let listing = match self.validator.storage.list(&dir, false) {
                Ok(listing) => listing,
                Err(e) => return Some(Err(e)),
            };

            if is_object_root(&listing) {
                self.pending_objects.push(dir);
                continue;
            }

            for entry in listing {
                if let Listing::Directory(name) = entry {
                    if name.as_ref() == EXTENSIONS_DIR {
                        continue;
                    }
                    self.pending_dirs.push(paths::join(&dir, name.as_ref()));
                }
            }
        }
    }
}

fn is_object_root(listing: &[Listing]) -> bool {
    listing.iter().any(|entry| match entry {
        Listing::File(name) => name.starts_with(OBJECT_NAMASTE_FILE_PREFIX),
        _ => false,
    })
}

impl<S: Storage> Validator<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Validates a single object. If `object_id` is not known ahead of time, it is instead read
    /// out of the root inventory. If `version` is specified, the object's root inventory must
    /// declare that version as its head; this is used when validating a version that was just
    /// committed.
    pub fn validate_object(
        &self,
        object_id: Option<&str>,
        object_root: &str,
        version: Option<VersionNum>,
        fixity_check: bool,
    ) -> Result<ObjectValidationResult> {
        let result = match object_id {
            Some(id) => ObjectValidationResult::with_id(id),
            None => ObjectValidationResult::new(),
        };

        let root_listing = self.storage.list(object_root, false)?;

        if let Some(namaste) = root_listing.iter().find_map(|entry| match entry {
            Listing::File(name) if name.starts_with(OBJECT_NAMASTE_FILE_PREFIX) => Some(name),
            _ => None,
        }) {
            self.validate_object_namaste(object_root, namaste.as_ref(), &result)?;
        } else {
            result.error(
                ErrorCode::E003,
                "Object version declaration does not exist".to_string(),
            );
        }

        let mut algorithms = Vec::new();
        for entry in &root_listing {
            if let Listing::File(filename) = entry {
                if let Some(algorithm) = filename.strip_prefix(INVENTORY_SIDECAR_PREFIX) {
                    if let Ok(algorithm) = DigestAlgorithm::from_str(algorithm) {
                        algorithms.push(algorithm);
                    }
                }
            }
        }

        let inventory = if root_listing
            .iter()
            .any(|e| matches!(e, Listing::File(name) if name.as_ref() == INVENTORY_FILE))
        {
            let (inventory, digest) = self.validate_inventory(
                &paths::join(object_root, INVENTORY_FILE),
                None,
                &algorithms,
                &result,
            )?;

            if let Some(inventory) = &inventory {
                if let Some(expected_id) = object_id {
                    if expected_id != inventory.id {
                        result.error(
                            ErrorCode::E083,
                            format!(
                                "Inventory field 'id' should be '{}'. Found: {}",
                                expected_id, inventory.id
                            ),
                        );
                    }
                }

                if let Some(version) = version {
                    if inventory.head != version {
                        result.error(
                            ErrorCode::E040,
                            format!(
                                "Inventory field 'head' must equal '{}'. Found: {}",
                                version, inventory.head
                            ),
                        );
                    }
                }
            }

            let algorithm = match &inventory {
                Some(inventory) => Some(inventory.digest_algorithm),
                None if algorithms.len() == 1 => Some(algorithms[0]),
                None => None,
            };

            if let Some(algorithm) = algorithm {
                let sidecar_file = paths::sidecar_name(algorithm);
                if root_listing
                    .iter()
                    .any(|e| matches!(e, Listing::File(name) if name.as_ref() == sidecar_file))
                {
                    if let Some(digest) = &digest {
                        self.validate_sidecar(
                            &paths::join(object_root, &sidecar_file),
                            ProblemLocation::ObjectRoot,
                            digest,
                            &result,
                        )?;
                    }
                } else {
                    result.error(
                        ErrorCode::E058,
                        format!("Inventory sidecar {} does not exist", sidecar_file),
                    );
                }
            }

            inventory
        } else {
            result.error(ErrorCode::E063, "Inventory does not exist".to_string());
            None
        };

        self.validate_root_entries(object_root, &root_listing, &result);

        if let Some(inventory) = &inventory {
            self.validate_versions(object_root, inventory, &result)?;
            self.validate_content(object_root, inventory, fixity_check, &result)?;
        }

        let object_id = result
            .object_id
            .clone()
            .or_else(|| inventory.as_ref().map(|inv| inv.id.clone()));

        Ok(ObjectValidationResult {
            object_id,
            errors: RefCell::new(result.errors.into_inner()),
            warnings: RefCell::new(result.warnings.into_inner()),
        })
    }

    /// Validates the storage root's Namaste file and `ocfl_layout.json`, then returns an
    /// incremental validator that lazily walks and validates every object beneath the root.
    pub fn validate_repo(&self, fixity_check: bool) -> Result<IncrementalValidatorImpl<'_, S>> {
        let root_result = ObjectValidationResult::new();

        let root_listing = self.storage.list("", false)?;

        let has_namaste = root_listing.iter().any(|e| {
            matches!(e, Listing::File(name) if name.as_ref() == REPO_NAMASTE_FILE || name.as_ref() == REPO_NAMASTE_FILE_1_1)
        });

        if !has_namaste {
            root_result.error(
                ErrorCode::E069,
                "Root version declaration does not exist".to_string(),
            );
        }

        Ok(IncrementalValidatorImpl {
            validator: self,
            root_result: Some(root_result),
            pending_dirs: vec![String::new()],
            pending_objects: Vec::new(),
            fixity_check,
        })
    }

    pub fn close(&self) {
        // The storage abstraction does not currently hold any resources that need releasing.
    }

    fn validate_object_namaste(
        &self,
        object_root: &str,
        namaste_file: &str,
        result: &ObjectValidationResult,
    ) -> Result<()> {
        let path = paths::join(object_root, namaste_file);
        let mut bytes: Vec<u8> = Vec::new();

        if self.storage.read(&path, &mut bytes).is_err() {
            result.error(
                ErrorCode::E003,
                "Object version declaration does not exist".to_string(),
            );
            return Ok(());
        }

        match String::from_utf8(bytes) {
            Ok(contents) => {
                let expected = if namaste_file.ends_with("1.1") {
                    OBJECT_NAMASTE_CONTENTS_1_1
                } else {
                    OBJECT_NAMASTE_CONTENTS_1_0
                };

                if contents != expected {
                    result.error(
                        ErrorCode::E007,
                        format!(
                            "Object version declaration is invalid. Expected: {}; Found: {}",
                            expected, contents
                        ),
                    );
                }
            }
            Err(_) => {
                result.error(
                    ErrorCode::E007,
                    "Object version declaration contains invalid UTF-8 content".to_string(),
                );
            }
        }

        Ok(())
    }

    /// Flags anything in the object root that is not the Namaste file, inventory, sidecar,
    /// `logs/`, `extensions/`, or a version directory.
    fn validate_root_entries(
        &self,
        _object_root: &str,
        root_listing: &[Listing],
        result: &ObjectValidationResult,
    ) {
        for entry in root_listing {
            let name = entry.path();
            if name == INVENTORY_FILE
                || name.starts_with(OBJECT_NAMASTE_FILE_PREFIX)
                || name.starts_with(INVENTORY_SIDECAR_PREFIX)
                || name == EXTENSIONS_DIR
                || name == "logs"
            {
                continue;
            }

            if VersionNum::try_from(name).is_ok() {
                continue;
            }

            result.error(
                ErrorCode::E001,
                format!("Unexpected file in object root: {}", name),
            );
        }
    }

    fn validate_versions(
        &self,
        object_root: &str,
        inventory: &Inventory,
        result: &ObjectValidationResult,
    ) -> Result<()> {
        for version_num in inventory.versions.keys() {
            let version_dir = version_num.to_string();
            let version_root = paths::join(object_root, &version_dir);
            let location = ProblemLocation::Version(*version_num);

            let listing = self.storage.list(&version_root, false)?;
            if listing.is_empty() {
                result.error_at(
                    location,
                    ErrorCode::E010,
                    format!("Version directory {} does not exist", version_dir),
                );
                continue;
            }

            let has_inventory = listing
                .iter()
                .any(|e| matches!(e, Listing::File(name) if name.as_ref() == INVENTORY_FILE));

            if !has_inventory {
                continue;
            }

            let (version_inventory, digest) = self.validate_inventory(
                &paths::join(&version_root, INVENTORY_FILE),
                Some(*version_num),
                &[inventory.digest_algorithm],
                result,
            )?;

            if let Some(version_inventory) = version_inventory {
                if version_inventory.id != inventory.id {
                    result.error_at(
                        location,
                        ErrorCode::E037,
                        "Version inventory 'id' does not match the root inventory".to_string(),
                    );
                }
                if version_inventory.digest_algorithm != inventory.digest_algorithm {
                    result.error_at(
                        location,
                        ErrorCode::E025,
                        "Version inventory 'digestAlgorithm' does not match the root inventory"
                            .to_string(),
                    );
                }

                if *version_num == inventory.head {
                    if let Some(digest) = &digest {
                        let root_digest = self.digest_of(object_root, inventory)?;
                        if *digest != root_digest {
                            result.error_at(
                                location,
                                ErrorCode::E064,
                                "The HEAD version's inventory does not match the root inventory"
                                    .to_string(),
                            );
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn digest_of(&self, object_root: &str, inventory: &Inventory) -> Result<HexDigest> {
        let mut writer = MultiDigestWriter::new(&[inventory.digest_algorithm], Vec::new());
        self.storage
            .read(&paths::join(object_root, INVENTORY_FILE), &mut writer)?;
        Ok(writer
            .finalize_hex()
            .remove(&inventory.digest_algorithm)
            .unwrap())
    }

    /// Walks every version's content directory, cross-checking what is physically present
    /// against the manifest, and, if requested, verifies every file's digest.
    fn validate_content(
        &self,
        object_root: &str,
        inventory: &Inventory,
        fixity_check: bool,
        result: &ObjectValidationResult,
    ) -> Result<()> {
        let content_dir = inventory.defaulted_content_dir();
        let mut referenced: HashSet<String> = HashSet::new();

        for (path, _) in inventory.manifest_iter() {
            referenced.insert(path.as_str().to_string());
        }

        let mut present: HashSet<String> = HashSet::new();

        for version_num in inventory.versions.keys() {
            let version_content_dir =
                paths::join(&version_num.to_string(), content_dir);
            let full_path = paths::join(object_root, &version_content_dir);
            let listing = self.storage.list(&full_path, true)?;

            if listing.is_empty() {
                continue;
            }

            for entry in &listing {
                if let Listing::File(name) = entry {
                    present.insert(paths::join(&version_content_dir, name.as_ref()));
                }
            }
        }

        for missing in referenced.difference(&present) {
            result.error(
                ErrorCode::E092,
                format!("Manifest references content file that does not exist: {}", missing),
            );
        }

        for extra in present.difference(&referenced) {
            result.error(
                ErrorCode::E023,
                format!("Content file is not referenced in the manifest: {}", extra),
            );
        }

        if fixity_check {
            for (path, digest) in inventory.manifest_iter() {
                if !present.contains(path.as_str()) {
                    continue;
                }

                let full_path = paths::join(object_root, path.as_str());
                let mut buf = Vec::new();
                self.storage.read(&full_path, &mut buf)?;
                let mut reader = FixityCheckReader::new(
                    inventory.digest_algorithm,
                    digest.as_ref().clone(),
                    buf.as_slice(),
                );
                std::io::copy(&mut reader, &mut std::io::sink())?;

                let location = match path.version {
                    ContentPathVersion::VersionNum(v) => ProblemLocation::Version(v),
                    ContentPathVersion::MutableHead => ProblemLocation::Version(inventory.head),
                };

                if let Err(e) = reader.validate() {
                    result.error_at(
                        location,
                        ErrorCode::E092,
                        format!("{}", e),
                    );
                }
            }
        }

        Ok(())
    }

    fn validate_inventory(
        &self,
        inventory_path: &str,
        version: Option<VersionNum>,
        algorithms: &[DigestAlgorithm],
        result: &ObjectValidationResult,
    ) -> Result<(Option<Inventory>, Option<HexDigest>)> {
        let mut inventory = None;
        let mut digest = None;

        let location = match version {
            Some(v) => ProblemLocation::Version(v),
            None => ProblemLocation::ObjectRoot,
        };

        let mut writer = MultiDigestWriter::new(algorithms, Vec::new());
        self.storage.read(inventory_path, &mut writer)?;

        match serde_json::from_slice::<ParseResult>(writer.inner()) {
            Ok(ParseResult::Ok(parse_result, inv)) => {
                if inv.type_declaration != INVENTORY_TYPE && inv.type_declaration != INVENTORY_TYPE_1_1
                {
                    parse_result.error(
                        ErrorCode::E038,
                        format!(
                            "Inventory field 'type' must equal '{}'. Found: {}",
                            INVENTORY_TYPE, inv.type_declaration
                        ),
                    );
                }

                if let Some(version) = version {
                    if inv.head != version {
                        parse_result.error(
                            ErrorCode::E040,
                            format!(
                                "Inventory field 'head' must equal '{}'. Found: {}",
                                version, inv.head
                            ),
                        );
                    }
                }

                let has_errors = parse_result.has_errors();
                result.merge_at(location, parse_result);

                digest = writer.finalize_hex().remove(&inv.digest_algorithm);
                if !has_errors {
                    inventory = Some(inv);
                }
            }
            Ok(ParseResult::Error(parse_result)) => {
                result.merge_at(location, parse_result);
            }
            Err(_) => {
                result.error_at(
                    location,
                    ErrorCode::E033,
                    "Inventory could not be parsed".to_string(),
                );
            }
        }

        Ok((inventory, digest))
    }

    fn validate_sidecar(
        &self,
        sidecar_path: &str,
        location: ProblemLocation,
        digest: &HexDigest,
        result: &ObjectValidationResult,
    ) -> Result<()> {
        let mut bytes = Vec::new();
        self.storage.read(sidecar_path, &mut bytes)?;
        match String::from_utf8(bytes) {
            Ok(contents) => {
                let parts: Vec<&str> = SIDECAR_SPLIT.split(&contents).collect();
                if parts.len() != 2 || parts[1].trim_end() != INVENTORY_FILE {
                    result.error_at(
                        location,
                        ErrorCode::E061,
                        "Inventory sidecar is invalid".to_string(),
                    )
                } else {
                    let expected_digest = HexDigest::from(parts[0]);
                    if expected_digest != *digest {
                        result.error_at(
                            location,
                            ErrorCode::E060,
                            format!(
                                "Inventory does not match expected digest. Expected: {}; Found: {}",
                                expected_digest, digest
                            ),
                        );
                    }
                }
            }
            Err(_) => result.error_at(
                location,
                ErrorCode::E061,
                "Inventory sidecar is invalid".to_string(),
            ),
        }

        Ok(())
    }
}

pub fn validate_object_id(object_id: &str) -> Result<()> {
    if object_id.is_empty() {
        return Err(crate::ocfl::RocflError::InvalidValue(
            "Object IDs may not be blank".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_digest_algorithm(digest_algorithm: DigestAlgorithm) -> Result<()> {
    if digest_algorithm != DigestAlgorithm::Sha512 && digest_algorithm != DigestAlgorithm::Sha256 {
        return Err(crate::ocfl::RocflError::InvalidValue(format!(
            "The inventory digest algorithm must be sha512 or sha256. Found: {}",
            digest_algorithm
        )));
    }
    Ok(())
}

pub fn validate_content_dir(content_dir: &str) -> Result<()> {
    if content_dir.eq(".") || content_dir.eq("..") || content_dir.contains('/') {
        return Err(crate::ocfl::RocflError::InvalidValue(format!(
            "The content directory cannot equal '.' or '..' and cannot contain a '/'. Found: {}",
            content_dir
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::ocfl::error::Result;
    use crate::ocfl::validate::ParseResult;

    #[test]
    fn parses_valid_inventory_with_no_errors() -> Result<()> {
        let json = json!({
            "id": "test",
            "type": "https://ocfl.io/1.0/spec/#inventory",
            "digestAlgorithm": "sha512",
            "head": "v1",
            "contentDirectory": "content",
            "manifest": {
                "fb0d38126bb990e2fd0edae87bf58e7a69e85a652b67cb9db30b32c138750377f6c3e1bb2f45588aeb0db1509f3562107f896b47d5b2c8972809e42e6bb68455": [
                    "v1/content/file1.txt"
                ]
            },
            "versions": {
                "v1": {
                    "created": "2021-09-05T20:36:50.923505656-05:00",
                    "state": {
                        "fb0d38126bb990e2fd0edae87bf58e7a69e85a652b67cb9db30b32c138750377f6c3e1bb2f45588aeb0db1509f3562107f896b47d5b2c8972809e42e6bb68455": [
                            "file1.txt"
                        ]
                    },
                    "message": "initial commit",
                    "user": {
                        "name": "Test User",
                        "address": "mailto:me@example.com"
                    }
                }
            },
            "fixity": {}
        })
        .to_string();

        let result: ParseResult = serde_json::from_str(&json)?;

        match result {
            ParseResult::Ok(result, inventory) => {
                assert!(!result.has_errors());
                assert_eq!("test", inventory.id);
            }
            ParseResult::Error(result) => panic!("Expected a valid inventory: {:?}", result),
        }

        Ok(())
    }

    #[test]
    fn reports_missing_required_field() -> Result<()> {
        let json = json!({
            "type": "https://ocfl.io/1.0/spec/#inventory",
            "digestAlgorithm": "sha512",
            "head": "v1",
            "manifest": {},
            "versions": {}
        })
        .to_string();

        let result: ParseResult = serde_json::from_str(&json)?;

        match result {
            ParseResult::Error(result) => assert!(result.has_errors()),
            ParseResult::Ok(_, _) => panic!("Expected a missing 'id' field to be reported"),
        }

        Ok(())
    }
}
