use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use kcopy_logging::{kcopy_debug, kcopy_info};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::persist::{ensure_output_dir, persist_temp, PersistError};

/// File inside an export bundle that breaks publishing on re-upload.
pub const MARKER_FILE: &str = "index.cnxml.html";

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("bad archive {}: {source}", .path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Removes [`MARKER_FILE`] from export bundles.
///
/// A bundle without the marker is returned unchanged; otherwise a copy with
/// every other entry preserved is written to `{stem}_fixed.zip` in the output
/// directory.
#[derive(Debug, Clone)]
pub struct BundleFixer {
    output_dir: PathBuf,
}

impl BundleFixer {
    pub fn new(output_dir: PathBuf) -> Self {
        Self { output_dir }
    }

    pub fn fixed_path(&self, bundle: &Path) -> PathBuf {
        let stem = bundle
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bundle".to_string());
        self.output_dir.join(format!("{stem}_fixed.zip"))
    }

    pub fn fix(&self, bundle: &Path) -> Result<PathBuf, BundleError> {
        let mut archive = open_archive(bundle)?;
        let markers: Vec<String> = archive
            .file_names()
            .filter(|name| is_marker(name))
            .map(ToOwned::to_owned)
            .collect();
        if markers.is_empty() {
            kcopy_debug!("{} has no {}; using it as is", bundle.display(), MARKER_FILE);
            return Ok(bundle.to_path_buf());
        }

        ensure_output_dir(&self.output_dir)?;
        let target = self.fixed_path(bundle);
        let tmp = NamedTempFile::new_in(&self.output_dir).map_err(|source| BundleError::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        let zip_err = |source| BundleError::Zip {
            path: bundle.to_path_buf(),
            source,
        };
        let mut writer = zip::ZipWriter::new(tmp);
        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(zip_err)?;
            if is_marker(entry.name()) {
                continue;
            }
            writer.raw_copy_file(entry).map_err(zip_err)?;
        }
        let tmp = writer.finish().map_err(zip_err)?;
        let fixed = persist_temp(tmp, &target)?;

        kcopy_info!(
            "removed {:?} from {}; fixed bundle at {}",
            markers,
            bundle.display(),
            fixed.display()
        );
        Ok(fixed)
    }
}

/// Entry names of an archive, sorted.
pub fn bundle_entries(bundle: &Path) -> Result<Vec<String>, BundleError> {
    let archive = open_archive(bundle)?;
    let mut names: Vec<String> = archive.file_names().map(ToOwned::to_owned).collect();
    names.sort();
    Ok(names)
}

fn open_archive(bundle: &Path) -> Result<zip::ZipArchive<File>, BundleError> {
    let file = File::open(bundle).map_err(|source| BundleError::Io {
        path: bundle.to_path_buf(),
        source,
    })?;
    zip::ZipArchive::new(file).map_err(|source| BundleError::Zip {
        path: bundle.to_path_buf(),
        source,
    })
}

fn is_marker(name: &str) -> bool {
    name.rsplit('/').next() == Some(MARKER_FILE)
}
