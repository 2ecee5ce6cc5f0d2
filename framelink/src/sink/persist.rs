//! On-disk formats for recorded packets.
//!
//! The binary layout is a 4-byte little-endian packet count followed by
//! every payload back to back. Payload lengths are not recorded, so a
//! reader must know them from elsewhere to split the file again.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{Datelike, Timelike};

use crate::core::Packet;
use crate::error::Result;

/// Extension used for framed recordings.
pub const BINARY_EXTENSION: &str = ".bin";

/// Extension used for raw repeat-mode recordings.
pub const TEXT_EXTENSION: &str = ".txt";

/// Base name that always receives an extension.
pub const DEFAULT_BASE_NAME: &str = "data";

/// Writes the packet count and the concatenated payloads.
pub fn write_binary<W: Write>(writer: &mut W, packets: &[Packet]) -> Result<()> {
    writer.write_all(&(packets.len() as u32).to_le_bytes())?;
    for packet in packets {
        writer.write_all(packet)?;
    }
    Ok(())
}

/// Writes every byte as the character with the same code point.
pub fn write_text<W: Write>(writer: &mut W, packets: &[Packet]) -> Result<()> {
    let text: String = packets
        .iter()
        .flat_map(|p| p.iter())
        .map(|&b| char::from(b))
        .collect();
    writer.write_all(text.as_bytes())?;
    Ok(())
}

/// Saves `packets` in the binary layout.
///
/// Returns `Ok(false)` without touching the file system when there is
/// nothing to save.
pub fn save_binary(path: impl AsRef<Path>, packets: &[Packet]) -> Result<bool> {
    if packets.is_empty() {
        return Ok(false);
    }
    save_with(path.as_ref(), packets, write_binary)
}

/// Saves `packets` as Latin-1 text.
///
/// Returns `Ok(false)` when the packets hold no bytes at all.
pub fn save_text(path: impl AsRef<Path>, packets: &[Packet]) -> Result<bool> {
    if packets.iter().all(|p| p.is_empty()) {
        return Ok(false);
    }
    save_with(path.as_ref(), packets, write_text)
}

fn save_with(
    path: &Path,
    packets: &[Packet],
    write: fn(&mut BufWriter<File>, &[Packet]) -> Result<()>,
) -> Result<bool> {
    let mut writer = BufWriter::new(File::create(path)?);
    write(&mut writer, packets)?;
    writer.flush()?;
    log::info!("Saved {} packets to {}", packets.len(), path.display());
    Ok(true)
}

/// Builds the output file name.
///
/// A stamped name is `<base>.<year>.<month>.<day>_<hour>:<minute><ext>`
/// with unpadded fields. An unstamped name is `base` itself, except that
/// the default base `data` still gets `ext`.
pub fn output_path(base: &str, ext: &str, stamped: bool, now: &(impl Datelike + Timelike)) -> String {
    let mut name = if stamped {
        format!(
            "{}.{}.{}.{}_{}:{}{}",
            base,
            now.year(),
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            ext
        )
    } else {
        base.to_string()
    };
    if name == DEFAULT_BASE_NAME {
        name.push_str(ext);
    }
    name
}
