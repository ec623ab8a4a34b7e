//! Build context packaging.

use std::path::Path;

use buildhook_core::{Error, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder;
use tracing::{debug, warn};

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

/// Package a directory as a gzipped tar archive for the build engine.
///
/// Only the given directory is archived; its contents land at the archive
/// root. Symlinks are stored as links, not followed.
pub fn archive_dir(dir: &Path) -> Result<Vec<u8>> {
    debug!(dir = %dir.display(), "Creating build context");

    let mut archive = Vec::new();
    {
        let encoder = GzEncoder::new(&mut archive, Compression::default());
        let mut tar = Builder::new(encoder);
        tar.follow_symlinks(false);

        tar.append_dir_all(".", dir)
            .map_err(|e| Error::BuildFailed(format!("packaging build context failed: {}", e)))?;

        tar.into_inner()
            .and_then(|encoder| encoder.finish())
            .map_err(|e| Error::BuildFailed(format!("packaging build context failed: {}", e)))?;
    }

    if archive.len() > MAX_CONTEXT_SIZE {
        warn!(
            size_mb = archive.len() / 1024 / 1024,
            "Build context is very large"
        );
    }

    debug!(bytes = archive.len(), "Build context created");
    Ok(archive)
}
