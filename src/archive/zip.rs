use crate::cleanup::{CleanupGuard, SharedCleanupContext};
use crate::error::{PmError, Result};
use crate::runtime::{Runtime, is_path_under, normalize_path, relative_path_from_dir};
use log::{debug, info};
use std::collections::HashSet;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::ArchiveCodec;

/// Codec for .zip archives
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    #[tracing::instrument(skip(self, runtime, files))]
    fn pack<R: Runtime + 'static>(
        &self,
        runtime: &R,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<Vec<u8>> {
        debug!("Packing {} file(s) relative to {:?}...", files.len(), root);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let mut seen = HashSet::new();

        for file in files {
            let name = entry_name(root, file)?;
            if !seen.insert(name.clone()) {
                debug!("Skipping duplicate entry {}", name);
                continue;
            }

            let mode = runtime
                .file_mode(file)
                .map_err(|e| PmError::unreadable(file, e))?;
            let mut content = Vec::new();
            runtime
                .open(file)
                .and_then(|mut reader| Ok(reader.read_to_end(&mut content)?))
                .map_err(|e| PmError::unreadable(file, e))?;

            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .unix_permissions(mode);
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| pack_error(&name, e.into()))?;
            writer
                .write_all(&content)
                .map_err(|e| pack_error(&name, e.into()))?;
            debug!("Packed {} ({} bytes, mode {:o})", name, content.len(), mode);
        }

        let cursor = writer
            .finish()
            .map_err(|e| pack_error("central directory", e.into()))?;
        Ok(cursor.into_inner())
    }

    fn unpack<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_name: &str,
        bytes: &[u8],
        dest: &Path,
    ) -> Result<usize> {
        self.unpack_impl(runtime, archive_name, bytes, dest, None)
    }

    fn unpack_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_name: &str,
        bytes: &[u8],
        dest: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<usize> {
        self.unpack_impl(runtime, archive_name, bytes, dest, Some(cleanup_ctx))
    }
}

impl ZipCodec {
    #[tracing::instrument(skip(self, runtime, bytes, cleanup_ctx))]
    fn unpack_impl<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_name: &str,
        bytes: &[u8],
        dest: &Path,
        cleanup_ctx: Option<SharedCleanupContext>,
    ) -> Result<usize> {
        debug!("Extracting {} to {:?}...", archive_name, dest);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| PmError::ArchiveCorrupt {
            archive: archive_name.to_string(),
            reason: "not a readable zip archive".to_string(),
            source: Some(e.into()),
        })?;

        runtime
            .create_dir_all(dest)
            .map_err(|e| PmError::unwritable(dest, e))?;

        // Entries are staged first so a corrupt archive or a traversal attempt
        // leaves the destination untouched.
        let staging = dest.join(format!(".{}.unpack", archive_name));
        if runtime.exists(&staging) {
            runtime
                .remove_dir_all(&staging)
                .map_err(|e| PmError::unwritable(&staging, e))?;
        }
        runtime
            .create_dir_all(&staging)
            .map_err(|e| PmError::unwritable(&staging, e))?;
        let _guard = cleanup_ctx.map(|ctx| CleanupGuard::new(ctx, staging.clone()));

        debug!("Unpacking to staging dir: {:?}", staging);

        let result = extract_entries(runtime, archive_name, &mut archive, &staging)
            .and_then(|count| {
                move_into_place(runtime, &staging, dest)?;
                Ok(count)
            });

        if let Err(e) = runtime.remove_dir_all(&staging) {
            debug!("Failed to remove staging dir {:?}: {}", staging, e);
        }

        let count = result?;
        info!("Extracted {} file(s) from {}.", count, archive_name);
        Ok(count)
    }
}

fn extract_entries<R: Runtime, A: Read + std::io::Seek>(
    runtime: &R,
    archive_name: &str,
    archive: &mut ZipArchive<A>,
    staging: &Path,
) -> Result<usize> {
    let mut files = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| PmError::ArchiveCorrupt {
            archive: archive_name.to_string(),
            reason: format!("cannot read entry {}", i),
            source: Some(e.into()),
        })?;

        let relative = enclosed_entry_path(entry.name()).ok_or_else(|| {
            PmError::corrupt(
                archive_name,
                format!("entry {:?} escapes the destination directory", entry.name()),
            )
        })?;
        let full_path = staging.join(&relative);
        if !is_path_under(&full_path, staging) {
            return Err(PmError::corrupt(
                archive_name,
                format!("entry {:?} escapes the destination directory", entry.name()),
            ));
        }

        if entry.is_dir() {
            runtime
                .create_dir_all(&full_path)
                .map_err(|e| PmError::unwritable(&full_path, e))?;
            continue;
        }
        if relative.as_os_str().is_empty() {
            return Err(PmError::corrupt(
                archive_name,
                format!("file entry {:?} has no name", entry.name()),
            ));
        }

        if let Some(parent) = full_path.parent() {
            runtime
                .create_dir_all(parent)
                .map_err(|e| PmError::unwritable(parent, e))?;
        }
        let mut dest_file = runtime
            .create_file(&full_path)
            .map_err(|e| PmError::unwritable(&full_path, e))?;
        if let Err(e) = std::io::copy(&mut entry, &mut dest_file) {
            // Decompression and checksum failures surface as InvalidData
            return Err(if e.kind() == std::io::ErrorKind::InvalidData {
                PmError::ArchiveCorrupt {
                    archive: archive_name.to_string(),
                    reason: format!("cannot decompress {:?}", entry.name()),
                    source: Some(e.into()),
                }
            } else {
                PmError::unwritable(&full_path, e.into())
            });
        }
        drop(dest_file);

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            runtime
                .set_permissions(&full_path, mode & 0o7777)
                .map_err(|e| PmError::unwritable(&full_path, e))?;
        }
        files += 1;
    }

    Ok(files)
}

/// Move the staged tree into `dest`, replacing files and merging directories.
fn move_into_place<R: Runtime>(runtime: &R, from: &Path, dest: &Path) -> Result<()> {
    let items = runtime
        .read_dir(from)
        .map_err(|e| PmError::unwritable(from, e))?;

    for item in items {
        let Some(name) = item.file_name() else {
            continue;
        };
        let target = dest.join(name);

        if runtime.is_dir(&item) {
            if runtime.exists(&target) && !runtime.is_dir(&target) {
                runtime
                    .remove_file(&target)
                    .map_err(|e| PmError::unwritable(&target, e))?;
            }
            runtime
                .create_dir_all(&target)
                .map_err(|e| PmError::unwritable(&target, e))?;
            move_into_place(runtime, &item, &target)?;
        } else {
            if runtime.is_dir(&target) {
                return Err(PmError::unwritable(
                    &target,
                    anyhow::anyhow!("a directory is in the way of an archived file"),
                ));
            }
            debug!("Installing {:?}", target);
            runtime
                .rename(&item, &target)
                .map_err(|e| PmError::unwritable(&target, e))?;
        }
    }

    Ok(())
}

/// Relative path of an archive entry, or `None` if the entry is absolute or
/// climbs above the extraction root at any point.
fn enclosed_entry_path(name: &str) -> Option<PathBuf> {
    if name.contains('\0') {
        return None;
    }
    let name = name.replace('\\', "/");
    if name.starts_with('/') {
        return None;
    }

    let mut path = PathBuf::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if !path.pop() {
                    return None;
                }
            }
            _ => {
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => path.push(segment),
                    _ => return None,
                }
            }
        }
    }
    Some(path)
}

/// Entry name of `file` relative to `root`, with `/` separators.
fn entry_name(root: &Path, file: &Path) -> Result<String> {
    let full = normalize_path(&if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    });

    let outside = || PmError::FileOutsideRoot {
        path: file.to_path_buf(),
        root: root.to_path_buf(),
    };
    if !is_path_under(&full, root) {
        return Err(outside());
    }

    let relative = relative_path_from_dir(root, &full).ok_or_else(outside)?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    if segments.is_empty() {
        return Err(outside());
    }
    Ok(segments.join("/"))
}

fn pack_error(entry: &str, source: anyhow::Error) -> PmError {
    PmError::ArchiveCorrupt {
        archive: "<new archive>".to_string(),
        reason: format!("cannot add {}", entry),
        source: Some(source),
    }
}
