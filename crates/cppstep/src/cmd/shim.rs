//! Shim command - export the runtime headers

use std::path::Path;

use eyre::Result;

/// Writes the shim headers into `dir` and lists them.
pub fn write_shim(dir: &Path) -> Result<()> {
    for path in cppstep_engine::shim::write_headers(dir)? {
        println!("{}", path.display());
    }
    Ok(())
}
