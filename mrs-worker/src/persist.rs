use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::TaskError;

/// Write `dest` through a temporary file in `dir` that is renamed into place
/// once `write` has finished.
///
/// Readers see either the previous contents of `dest` or the complete new
/// contents. `dir` must be on the same filesystem as `dest`.
pub(crate) fn write_atomically<F>(dir: &Path, dest: &Path, write: F) -> Result<(), TaskError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), TaskError>,
{
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
