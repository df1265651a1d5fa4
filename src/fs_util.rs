use std::fs;
use std::io::{self, BufWriter};

use camino::Utf8Path;
use zip::ZipArchive;

use crate::error::CardLiveError;

/// Writes through `write` into a temporary file next to `dest`, then moves it
/// into place. `dest` is left untouched when `write` fails.
pub fn write_file_atomic<T>(
    dest: &Utf8Path,
    write: impl FnOnce(&mut BufWriter<&fs::File>) -> Result<T, CardLiveError>,
) -> Result<T, CardLiveError> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".cardlive-export")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| CardLiveError::Filesystem(err.to_string()))?;

    let value = {
        let mut writer = BufWriter::new(temp.as_file());
        let value = write(&mut writer)?;
        io::Write::flush(&mut writer).map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
        value
    };
    temp.as_file()
        .sync_all()
        .map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| CardLiveError::Filesystem(err.to_string()))?;
    Ok(value)
}

/// Entry names of a zip archive, in archive order.
pub fn archive_entries(zip_path: &Utf8Path) -> Result<Vec<String>, CardLiveError> {
    let file = fs::File::open(zip_path.as_std_path())
        .map_err(|err| CardLiveError::Filesystem(format!("open zip {zip_path}: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| CardLiveError::Archive(err.to_string()))?;

    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| CardLiveError::Archive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink()).map_err(|err| CardLiveError::Archive(err.to_string()))?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}
