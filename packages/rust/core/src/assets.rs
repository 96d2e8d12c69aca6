//! Image and font staging for the typesetting output.

use std::path::Path;

use tracing::{debug, info, warn};

use bindery_shared::{BinderyError, Result};

use crate::report::ToolFailure;
use crate::tools::VectorConverter;

/// Copy every regular file in `src` into `dest` (flat, not recursive).
///
/// A missing source directory copies nothing. Returns the number of files
/// copied.
pub fn copy_assets(src: &Path, dest: &Path) -> Result<usize> {
    if !src.is_dir() {
        debug!(src = %src.display(), "asset directory absent, nothing to copy");
        return Ok(0);
    }

    std::fs::create_dir_all(dest).map_err(|e| BinderyError::io(dest, e))?;

    let mut copied = 0;
    for entry in std::fs::read_dir(src).map_err(|e| BinderyError::io(src, e))? {
        let entry = entry.map_err(|e| BinderyError::io(src, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let target = dest.join(entry.file_name());
        std::fs::copy(&path, &target).map_err(|e| BinderyError::io(&target, e))?;
        copied += 1;
    }

    info!(src = %src.display(), dest = %dest.display(), copied, "assets copied");
    Ok(copied)
}

/// Convert every `.svg` in `dir` to a PDF beside it.
///
/// Failures are returned for the run report rather than aborting.
pub fn convert_vector_images(dir: &Path, converter: &dyn VectorConverter) -> Result<Vec<ToolFailure>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut svgs: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| BinderyError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
        })
        .collect();
    svgs.sort();

    let mut failures = Vec::new();
    for svg in &svgs {
        let pdf = svg.with_extension("pdf");
        let name = svg
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match converter.convert(svg, &pdf) {
            Ok(()) => debug!(svg = %name, "vector image converted"),
            Err(e) => {
                warn!(svg = %name, error = %e, "vector image conversion failed");
                failures.push(ToolFailure::from_error(converter.name(), name, &e));
            }
        }
    }

    info!(
        images = svgs.len(),
        failed = failures.len(),
        "vector images converted"
    );
    Ok(failures)
}
