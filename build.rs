//! Generates the migration registry compiled into the binary.
//!
//! Every `<version>_<slug>.rs` file in `migrations/versions/` must define
//! `pub struct Migration` implementing `dynamo_migrate::migration::Migration`.
//! Names are validated at runtime by the catalog.

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const VERSIONS_DIR: &str = "migrations/versions";

fn main() {
    println!("cargo::rerun-if-changed=build.rs");
    println!("cargo::rerun-if-changed={}", VERSIONS_DIR);

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));

    let files = migration_files(&manifest_dir.join(VERSIONS_DIR));

    let mut index = String::from("// @generated by build.rs from migrations/versions\n\n");
    for (i, (_, path)) in files.iter().enumerate() {
        writeln!(index, "#[path = {:?}]\nmod m{};", path.display().to_string(), i).unwrap();
    }

    index.push_str("\npub fn registry() -> Vec<dynamo_migrate::migration::Registration> {\n    vec![\n");
    for (i, (stem, _)) in files.iter().enumerate() {
        writeln!(
            index,
            "        ({:?}, Box::new(m{}::Migration) as Box<dyn dynamo_migrate::migration::Migration>),",
            stem, i
        )
        .unwrap();
    }
    index.push_str("    ]\n}\n");

    fs::write(out_dir.join("versions_index.rs"), index).expect("Failed to write migration index");
}

/// `(stem, absolute path)` of every `.rs` file, sorted by stem.
fn migration_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        println!("cargo::warning=No migrations directory at {}", dir.display());
        return Vec::new();
    };

    let mut files: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "rs"))
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?.to_string();
            if stem.starts_with('.') {
                return None;
            }
            Some((stem, path))
        })
        .collect();

    files.sort();
    files
}
