use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Error, ErrorKind, Write};
use std::path::Path;

use crate::store::StoreState;

/// Write a gzip-compressed bincode snapshot of the store.
///
/// The snapshot goes to a sibling temp file first and is renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
pub fn save_snapshot(state: &StoreState, path: &Path) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("tmp");

    let file = File::create(&tmp)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut writer = BufWriter::new(encoder);

    serialize_into(&mut writer, state).map_err(|e| Error::new(ErrorKind::Other, e))?;

    let encoder = writer.into_inner().map_err(|e| e.into_error())?;
    let mut file = encoder.finish()?;
    file.flush()?;
    file.sync_all()?;

    fs::rename(&tmp, path)
}

pub fn load_snapshot(path: &Path) -> std::io::Result<StoreState> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let state: StoreState =
        deserialize_from(&mut reader).map_err(|e| Error::new(ErrorKind::InvalidData, e))?;

    Ok(state)
}
