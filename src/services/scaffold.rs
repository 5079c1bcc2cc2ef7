//! Revision scaffolding.
//!
//! Renders the revision template into a new `<version>_<slug>.rs` file
//! numbered one past the highest migration on disk.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::migration::{scan_dir, CatalogFile, EntryName};

/// Placeholder replaced with the new version number.
pub const REVISION_NUMBER: &str = "<revision_number>";

/// Placeholder replaced with the human-readable description.
pub const REVISION_DESCRIPTION: &str = "<revision_description>";

/// Placeholder replaced with the creation timestamp.
pub const CREATE_DATE: &str = "<create_date>";

/// Creates new migration files from the template.
#[derive(Debug, Clone)]
pub struct Scaffolder {
    versions_dir: PathBuf,
    template_path: PathBuf,
}

impl Scaffolder {
    pub fn new(versions_dir: impl Into<PathBuf>, template_path: impl Into<PathBuf>) -> Self {
        Scaffolder {
            versions_dir: versions_dir.into(),
            template_path: template_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.versions_dir.clone(), config.template_path.clone())
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    /// Create the versions directory. Returns `false` if it already existed.
    pub fn init_versions_dir(&self) -> AppResult<bool> {
        if self.versions_dir.is_dir() {
            info!(
                "Migration structure already exists at {}",
                self.versions_dir.display()
            );
            return Ok(false);
        }

        fs::create_dir_all(&self.versions_dir).map_err(|e| AppError::WriteError {
            path: self.versions_dir.clone(),
            reason: e.to_string(),
        })?;
        info!(
            "Created migration structure at {}",
            self.versions_dir.display()
        );
        Ok(true)
    }

    /// Version the next revision will receive.
    pub fn next_version(&self) -> AppResult<u32> {
        if !self.versions_dir.is_dir() {
            return Err(AppError::WriteError {
                path: self.versions_dir.clone(),
                reason: "versions directory does not exist (run `init` first)".to_string(),
            });
        }

        let head = scan_dir(&self.versions_dir)?
            .last()
            .map(|file| file.name.version)
            .unwrap_or(0);
        Ok(head + 1)
    }

    /// Write a new revision file for `name`.
    pub fn new_revision(&self, name: &str) -> AppResult<CatalogFile> {
        self.new_revision_at(name, Utc::now())
    }

    fn new_revision_at(&self, name: &str, created: DateTime<Utc>) -> AppResult<CatalogFile> {
        let slug = slugify(name)?;
        let version = self.next_version()?;

        let template = fs::read_to_string(&self.template_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::TemplateMissing(self.template_path.clone()),
            _ => AppError::Io(e),
        })?;
        let description = name.split_whitespace().collect::<Vec<_>>().join(" ");
        let contents = render_template(&template, version, &description, created);

        let entry = EntryName { version, slug };
        let path = self.versions_dir.join(entry.file_name());
        write_new_file(&path, &contents)?;

        info!("Successfully created migration file {}", entry.file_name());
        Ok(CatalogFile { name: entry, path })
    }
}

/// Normalize a revision name: lowercase, whitespace runs become underscores.
///
/// Only alphanumerics, `_` and `-` may remain; anything else could escape the
/// versions directory or break the naming convention.
pub fn slugify(name: &str) -> AppResult<String> {
    let slug = name
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_");

    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::InvalidName(name.to_string()));
    }

    Ok(slug)
}

/// Substitute the template placeholders.
pub fn render_template(
    template: &str,
    version: u32,
    description: &str,
    created: DateTime<Utc>,
) -> String {
    template
        .replace(REVISION_NUMBER, &version.to_string())
        .replace(REVISION_DESCRIPTION, description)
        .replace(CREATE_DATE, &created.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Write `contents` to `path`, refusing to replace an existing file.
fn write_new_file(path: &Path, contents: &str) -> AppResult<()> {
    let write_error = |reason: String| AppError::WriteError {
        path: path.to_path_buf(),
        reason,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => write_error("file already exists".to_string()),
            _ => write_error(e.to_string()),
        })?;

    file.write_all(contents.as_bytes())
        .map_err(|e| write_error(e.to_string()))
}
