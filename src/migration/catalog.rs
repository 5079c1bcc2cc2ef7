//! Catalog discovery and validation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{MigrationEntry, Registration};
use crate::error::{AppError, AppResult};

/// File extension of migration entries on disk.
pub const MIGRATION_EXTENSION: &str = "rs";

/// A parsed `<version>_<slug>` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryName {
    pub version: u32,
    pub slug: String,
}

impl EntryName {
    /// Parse a file stem such as `3_add_orders_table`.
    pub fn parse(stem: &str) -> AppResult<Self> {
        let (head, slug) = stem.split_once('_').ok_or_else(|| {
            AppError::CatalogCorrupt(format!(
                "'{}' does not follow the <version>_<slug> naming convention",
                stem
            ))
        })?;

        let version = head
            .parse::<u32>()
            .ok()
            .filter(|v| *v > 0 && head.bytes().all(|b| b.is_ascii_digit()))
            .ok_or_else(|| {
                AppError::CatalogCorrupt(format!(
                    "'{}' does not start with a positive integer version",
                    stem
                ))
            })?;

        if slug.is_empty() {
            return Err(AppError::CatalogCorrupt(format!(
                "'{}' has an empty description",
                stem
            )));
        }

        Ok(EntryName {
            version,
            slug: slug.to_string(),
        })
    }

    /// File name for this entry, e.g. `5_add_index.rs`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.{}", self.version, self.slug, MIGRATION_EXTENSION)
    }
}

/// Ordered set of migration entries.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<MigrationEntry>,
}

impl Catalog {
    /// Build a catalog from registered handlers.
    ///
    /// Fails with `CatalogCorrupt` on unparseable names, duplicate versions
    /// or gaps in the `1..=N` sequence.
    pub fn from_registry(registry: Vec<Registration>) -> AppResult<Self> {
        let mut entries = registry
            .into_iter()
            .map(|(stem, handler)| Ok(MigrationEntry::new(EntryName::parse(stem)?, handler)))
            .collect::<AppResult<Vec<_>>>()?;

        entries.sort_by_key(|entry| entry.version);
        validate_sequence(entries.iter().map(|entry| entry.version))?;

        debug!("Catalog loaded with {} migration(s)", entries.len());
        Ok(Catalog { entries })
    }

    /// All entries in ascending version order.
    pub fn list(&self) -> &[MigrationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest version in the catalog, 0 when empty.
    pub fn head_version(&self) -> u32 {
        self.entries.last().map(|entry| entry.version).unwrap_or(0)
    }

    /// Entries whose versions lie in `(lower, upper]`, ascending.
    pub fn window(&self, lower: u32, upper: u32) -> AppResult<Vec<&MigrationEntry>> {
        if upper > self.head_version() {
            return Err(AppError::CatalogCorrupt(format!(
                "version {} is not in the catalog (highest available is {})",
                upper,
                self.head_version()
            )));
        }

        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.version > lower && entry.version <= upper)
            .collect())
    }
}

/// A migration file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFile {
    pub name: EntryName,
    pub path: PathBuf,
}

/// List migration files in `dir`, sorted ascending by version.
///
/// Only files with the migration extension are considered; hidden files
/// are skipped.
pub fn scan_dir(dir: &Path) -> AppResult<Vec<CatalogFile>> {
    let mut files = Vec::new();

    for dir_entry in std::fs::read_dir(dir)? {
        let path = dir_entry?.path();
        if !path.is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(MIGRATION_EXTENSION)
        {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            return Err(AppError::CatalogCorrupt(format!(
                "{} has a non UTF-8 file name",
                path.display()
            )));
        };
        if stem.starts_with('.') {
            continue;
        }

        files.push(CatalogFile {
            name: EntryName::parse(stem)?,
            path,
        });
    }

    files.sort_by_key(|file| file.name.version);
    validate_sequence(files.iter().map(|file| file.name.version))?;

    Ok(files)
}

/// Check that ascending `versions` are exactly `1..=N`.
fn validate_sequence(versions: impl Iterator<Item = u32>) -> AppResult<()> {
    let mut seen = BTreeSet::new();

    for (index, version) in versions.enumerate() {
        if !seen.insert(version) {
            return Err(AppError::CatalogCorrupt(format!(
                "duplicate migration version {}",
                version
            )));
        }

        let expected = index as u32 + 1;
        if version != expected {
            return Err(AppError::CatalogCorrupt(format!(
                "migration versions must be contiguous from 1: expected {}, found {}",
                expected, version
            )));
        }
    }

    Ok(())
}
