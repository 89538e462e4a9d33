//! Saving and restoring a region.
//!
//! A [`Connections`] holds the complete state of a region, so persisting it is enough to resume
//! both algorithms exactly where they stopped, including the position of the random number
//! generator. The binary format is bincode.

use super::connections::Connections;
use crate::error::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Serializes a region into bytes.
pub fn encode(c: &Connections) -> Result<Vec<u8>> {
    Ok(bincode::serialize(c)?)
}

/// Restores a region from bytes produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Connections> {
    Ok(bincode::deserialize(bytes)?)
}

/// Serializes a region into a writer.
pub fn write_to<W: Write>(c: &Connections, writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    bincode::serialize_into(&mut writer, c)?;
    writer
        .flush()
        .map_err(|e| bincode::Error::from(bincode::ErrorKind::Io(e)))?;
    Ok(())
}

/// Restores a region from a reader.
pub fn read_from<R: Read>(reader: R) -> Result<Connections> {
    Ok(bincode::deserialize_from(BufReader::new(reader))?)
}

/// Saves a region to a file, replacing it if it exists.
pub fn save(c: &Connections, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_to(c, file).with_context(|| format!("writing region to {}", path.display()))?;
    log::debug!("saved region to {}", path.display());
    Ok(())
}

/// Loads a region saved with [`save`].
pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Connections> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let c = read_from(file).with_context(|| format!("reading region from {}", path.display()))?;
    log::debug!("loaded region from {}", path.display());
    Ok(c)
}
