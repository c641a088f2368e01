// Pdfium helper - bind a fresh instance per document, no singleton
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::debug;

use crate::types::Result;

/// Bind pdfium from `lib_dir`, falling back to the system library.
pub fn bind_pdfium(lib_dir: &Path) -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(lib_dir))
        .or_else(|err| {
            debug!(error = %err, dir = %lib_dir.display(), "pdfium not found in lib dir, trying system library");
            Pdfium::bind_to_system_library()
        })?;
    Ok(Pdfium::new(bindings))
}

/// Execute an operation with a freshly bound Pdfium instance.
pub fn with_pdfium<F, R>(lib_dir: &Path, f: F) -> Result<R>
where
    F: FnOnce(&Pdfium) -> Result<R>,
{
    let pdfium = bind_pdfium(lib_dir)?;
    f(&pdfium)
}
