//! Discovering version folders and the script units inside them.
//!
//! The root of a migration tree holds one folder per version, named by its
//! version identifier, plus the special folders listed in [`special`].  Inside
//! a folder, `.sql` files run first in file name order, then `.csv` bulk
//! files, then each sub-folder in name order, recursively.
use crate::error::SourceError;
use crate::version::Version;

use std::fs;
use std::path::{Path, PathBuf};

/// Folder names with a fixed role.
pub mod special {
    /// Run once, right after the tracking table is created.
    pub const INIT: &str = "_init";
    /// Run before the first pending version.
    pub const PRE: &str = "_pre";
    /// Run after the last pending version.
    pub const POST: &str = "_post";
    /// Run after `_post` when drafts are enabled.
    pub const DRAFT: &str = "_draft";
    /// Run by erase, never by a regular run.
    pub const ERASE: &str = "_erase";

    pub const ALL: [&str; 5] = [INIT, PRE, POST, DRAFT, ERASE];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// A SQL script.
    Sql,
    /// A CSV file imported into a table.
    Bulk,
}

/// One file to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
    path: PathBuf,
    name: String,
    kind: UnitKind,
}

impl ScriptUnit {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the migration root with `/` separators, as recorded
    /// in `failed_script_path`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// The file contents.
    pub fn read(&self) -> Result<String, SourceError> {
        fs::read_to_string(&self.path).map_err(SourceError::io(&self.path))
    }
}

/// A folder named by a version identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionDir {
    version: Version,
    path: PathBuf,
}

impl VersionDir {
    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A migration tree on disk.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    root: PathBuf,
    versions: Vec<VersionDir>,
}

impl MigrationSource {
    /// Scan `root` for version folders.
    ///
    /// Entries that are neither a version folder nor a special folder are
    /// skipped.  Two folders with equal versions, such as `v1.2` and `v1.02`,
    /// are an error.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, SourceError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(SourceError::NotADirectory(root));
        }

        let mut versions = Vec::new();
        for (name, path) in read_sorted(&root)?.dirs {
            if special::ALL.contains(&name.as_str()) {
                continue;
            }
            match Version::parse(&name) {
                Ok(version) => versions.push(VersionDir { version, path }),
                Err(_) => {
                    log::debug!(target: "strata", "skipping folder {name}, not a version");
                }
            }
        }
        versions.sort_by(|a, b| a.version.cmp(&b.version));
        if let Some(pair) = versions.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(SourceError::DuplicateVersion(
                pair[0].version.to_string(),
                pair[1].version.to_string(),
            ));
        }

        Ok(Self { root, versions })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All version folders in ascending order.
    pub fn versions(&self) -> &[VersionDir] {
        &self.versions
    }

    /// The highest version in the tree.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.last().map(VersionDir::version)
    }

    /// Versions `v` with `current < v <= target`, ascending.  With no
    /// current version every version up to `target` is pending.
    pub fn pending(&self, current: Option<&Version>, target: &Version) -> Vec<&VersionDir> {
        self.versions
            .iter()
            .filter(|dir| current.is_none_or(|c| dir.version > *c) && dir.version <= *target)
            .collect()
    }

    /// Units of a version folder, excluding its `_erase` folder.
    pub fn version_units(&self, dir: &VersionDir) -> Result<Vec<ScriptUnit>, SourceError> {
        let mut units = Vec::new();
        self.collect_units(&dir.path, &mut units)?;
        Ok(units)
    }

    /// Units of a special folder at the root, empty if it does not exist.
    pub fn special_units(&self, name: &str) -> Result<Vec<ScriptUnit>, SourceError> {
        let path = self.root.join(name);
        let mut units = Vec::new();
        if path.is_dir() {
            self.collect_units(&path, &mut units)?;
        }
        Ok(units)
    }

    /// Units of the `_erase` folder of a version, empty if it has none.
    pub fn erase_units(&self, dir: &VersionDir) -> Result<Vec<ScriptUnit>, SourceError> {
        let path = dir.path.join(special::ERASE);
        let mut units = Vec::new();
        if path.is_dir() {
            self.collect_units(&path, &mut units)?;
        }
        Ok(units)
    }

    fn collect_units(&self, dir: &Path, units: &mut Vec<ScriptUnit>) -> Result<(), SourceError> {
        let listing = read_sorted(dir)?;
        let mut bulk = Vec::new();
        for (name, path) in listing.files {
            let ext = Path::new(&name)
                .extension()
                .map(|e| e.to_string_lossy().to_ascii_lowercase());
            let kind = match ext.as_deref() {
                Some("sql") => UnitKind::Sql,
                Some("csv") => UnitKind::Bulk,
                _ => continue,
            };
            let unit = ScriptUnit {
                name: self.relative_name(&path),
                path,
                kind,
            };
            match kind {
                UnitKind::Sql => units.push(unit),
                UnitKind::Bulk => bulk.push(unit),
            }
        }
        units.append(&mut bulk);

        for (name, path) in listing.dirs {
            if name == special::ERASE {
                continue;
            }
            self.collect_units(&path, units)?;
        }

        Ok(())
    }

    fn relative_name(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

struct Listing {
    files: Vec<(String, PathBuf)>,
    dirs: Vec<(String, PathBuf)>,
}

fn read_sorted(dir: &Path) -> Result<Listing, SourceError> {
    let mut listing = Listing {
        files: Vec::new(),
        dirs: Vec::new(),
    };
    for entry in fs::read_dir(dir).map_err(SourceError::io(dir))? {
        let entry = entry.map_err(SourceError::io(dir))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            listing.dirs.push((name, path));
        } else if path.is_file() {
            listing.files.push((name, path));
        }
    }
    listing.files.sort();
    listing.dirs.sort();

    Ok(listing)
}
