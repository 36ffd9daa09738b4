//! Archive and restore the config root as a gzipped tarball.
//!
//! Regenerable directories (logs, caches, transcodes, metadata) are left out
//! at any depth; everything else under the config root is kept, including
//! each service's API key files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;

use crate::cli::{BackupArgs, GlobalOpts, RestoreArgs};
use crate::commands::load_settings;
use crate::error::{CliError, exit_code};
use crate::output::{Console, Mark};

const EXCLUDED_DIRS: &[&str] = &["logs", "cache", "transcodes", "metadata"];

#[derive(Debug, Serialize)]
struct ArchiveSummary {
    archive: PathBuf,
    root: PathBuf,
    entries: usize,
}

pub fn handle_backup(
    args: &BackupArgs,
    global: &GlobalOpts,
    console: &Console,
) -> Result<i32, CliError> {
    let settings = load_settings(global)?;
    let name = format!(
        "medialink-backup-{}.tar.gz",
        chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
    );
    let archive = args.dest.join(name);
    let entries = create_backup(&settings.config_root, &archive)?;

    console.line(
        Mark::Ok,
        &format!("archived {entries} file(s) to {}", archive.display()),
    );
    console.json(&ArchiveSummary {
        archive,
        root: settings.config_root,
        entries,
    })?;
    Ok(exit_code::SUCCESS)
}

pub fn handle_restore(
    args: &RestoreArgs,
    global: &GlobalOpts,
    console: &Console,
) -> Result<i32, CliError> {
    let settings = load_settings(global)?;
    let root = &settings.config_root;
    if !args.force && !is_empty_dir(root)? {
        return Err(CliError::RestoreTarget { path: root.clone() });
    }
    let entries = restore_backup(&args.archive, root)?;

    console.line(
        Mark::Ok,
        &format!("restored {} into {}", args.archive.display(), root.display()),
    );
    console.json(&ArchiveSummary {
        archive: args.archive.clone(),
        root: root.clone(),
        entries,
    })?;
    Ok(exit_code::SUCCESS)
}

/// Write `root` into a new archive at `archive`; returns the file count.
pub fn create_backup(root: &Path, archive: &Path) -> Result<usize, CliError> {
    if let Some(parent) = archive.parent() {
        fs::create_dir_all(parent).map_err(CliError::archive(parent))?;
    }
    let file = File::create(archive).map_err(CliError::archive(archive))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let mut files = Vec::new();
    collect_files(root, root, &mut files).map_err(CliError::archive(root))?;
    for relative in &files {
        builder
            .append_path_with_name(root.join(relative), relative)
            .map_err(CliError::archive(archive))?;
    }

    builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(CliError::archive(archive))?;
    tracing::info!(archive = %archive.display(), files = files.len(), "backup written");
    Ok(files.len())
}

/// Unpack `archive` into `root`; returns the entry count.
pub fn restore_backup(archive: &Path, root: &Path) -> Result<usize, CliError> {
    let file = File::open(archive).map_err(CliError::archive(archive))?;
    fs::create_dir_all(root).map_err(CliError::archive(root))?;

    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    let mut count = 0;
    for entry in tarball.entries().map_err(CliError::archive(archive))? {
        let mut entry = entry.map_err(CliError::archive(archive))?;
        // `unpack_in` refuses paths that would escape `root`.
        if entry.unpack_in(root).map_err(CliError::archive(root))? {
            count += 1;
        }
    }
    tracing::info!(archive = %archive.display(), entries = count, "backup restored");
    Ok(count)
}

/// Regular files under `dir`, relative to `root`, sorted for stable archives.
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let excluded = entry
                .file_name()
                .to_str()
                .is_some_and(|name| EXCLUDED_DIRS.contains(&name));
            if !excluded {
                collect_files(root, &path, out)?;
            }
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}

fn is_empty_dir(path: &Path) -> Result<bool, CliError> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(CliError::archive(path)(e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn seed(root: &Path) {
        for (file, body) in [
            ("sonarr/config.xml", "<ApiKey>abc</ApiKey>"),
            ("sonarr/logs/sonarr.txt", "noise"),
            ("jellyfin/cache/images/x.jpg", "noise"),
            ("jellyfin/data/library.db", "db"),
            ("jellyfin/metadata/people/a.nfo", "noise"),
        ] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
    }

    #[test]
    fn regenerable_directories_are_left_out() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let mut files = Vec::new();
        collect_files(dir.path(), dir.path(), &mut files).unwrap();
        assert_eq!(
            files,
            vec![
                PathBuf::from("jellyfin/data/library.db"),
                PathBuf::from("sonarr/config.xml"),
            ]
        );
    }

    #[test]
    fn restore_reproduces_the_archived_tree() {
        let source = tempfile::tempdir().unwrap();
        seed(source.path());
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("backup.tar.gz");

        assert_eq!(create_backup(source.path(), &archive).unwrap(), 2);

        let target = out.path().join("restored");
        assert_eq!(restore_backup(&archive, &target).unwrap(), 2);
        assert_eq!(
            fs::read_to_string(target.join("sonarr/config.xml")).unwrap(),
            "<ApiKey>abc</ApiKey>"
        );
        assert!(!target.join("sonarr/logs").exists());
    }

    #[test]
    fn missing_target_counts_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_empty_dir(&dir.path().join("absent")).unwrap());
        fs::write(dir.path().join("f"), "x").unwrap();
        assert!(!is_empty_dir(dir.path()).unwrap());
    }
}
