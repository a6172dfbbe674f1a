//! OLE file writer implementation
//!
//! Streams and storages are collected in memory and laid out in one pass
//! when [`OleWriter::write_to`] is called. Sectors are written in
//! allocation order:
//!
//! ```text
//! header | FAT | DIFAT | MiniFAT | directory | mini stream | large streams
//! ```
//!
//! # Example
//!
//! ```rust
//! use litchi_compare::ole::{OleFile, OleWriter};
//!
//! let mut writer = OleWriter::new();
//! writer.create_stream(&["EncryptionInfo"], b"info")?;
//! writer.create_stream(&["\u{6}DataSpaces", "Version"], b"v")?;
//!
//! let bytes = writer.to_bytes()?;
//! let ole = OleFile::from_bytes(bytes)?;
//! assert_eq!(ole.open_stream(&["EncryptionInfo"])?, b"info");
//! # Ok::<(), litchi_compare::ole::OleError>(())
//! ```
use super::super::consts::*;
use super::super::file::OleError;
use super::directory::DirectoryBuilder;
use super::fat::{FatBuilder, units_for};
use std::io::Write;

/// OLE file writer
#[derive(Debug, Default)]
pub struct OleWriter {
    /// Stream data in insertion order (path, data)
    streams: Vec<(Vec<String>, Vec<u8>)>,
    /// Explicitly created storages, including empty ones
    storages: Vec<Vec<String>>,
}

impl OleWriter {
    /// Create a new empty OLE writer (512-byte sectors).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream at `path`, replacing any stream already there.
    ///
    /// Parent storages are created implicitly.
    pub fn create_stream(&mut self, path: &[&str], data: &[u8]) -> Result<(), OleError> {
        let owned_path = owned(path)?;
        if let Some(pos) = self.streams.iter().position(|(p, _)| p == &owned_path) {
            self.streams[pos].1 = data.to_vec();
        } else {
            self.streams.push((owned_path, data.to_vec()));
        }
        Ok(())
    }

    /// Create a storage (directory) at `path`.
    pub fn create_storage(&mut self, path: &[&str]) -> Result<(), OleError> {
        let owned_path = owned(path)?;
        if !self.storages.contains(&owned_path) {
            self.storages.push(owned_path);
        }
        Ok(())
    }

    /// Serialize the compound file into memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OleError> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    /// Write the compound file to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), OleError> {
        let sector_size = SECTOR_SIZE_V3;

        // Directory entries first: their count fixes the directory size.
        let mut directory = DirectoryBuilder::new();
        for storage in &self.storages {
            directory.add_storage_path(storage)?;
        }
        let mut small = Vec::new();
        let mut large = Vec::new();
        for (path, data) in &self.streams {
            let sid = directory.add_stream_path(path, data.len() as u64)?;
            if data.is_empty() {
                continue;
            }
            if data.len() < MINI_STREAM_CUTOFF as usize {
                small.push((sid, data));
            } else {
                large.push((sid, data));
            }
        }

        // Mini stream and MiniFAT
        let mut minifat = FatBuilder::new();
        let mut ministream = Vec::new();
        for (sid, data) in &small {
            let start = minifat.allocate_chain(units_for(data.len(), MINI_SECTOR_SIZE));
            directory.entry_mut(*sid).start_sector = start;
            ministream.extend_from_slice(data);
            ministream.resize(minifat.len() as usize * MINI_SECTOR_SIZE, 0);
        }

        let minifat_sectors = units_for(minifat.len() as usize * 4, sector_size);
        let dir_sectors = units_for(directory.entry_count() * DIRENTRY_SIZE, sector_size);
        let ministream_sectors = units_for(ministream.len(), sector_size);
        let data_sectors = minifat_sectors
            + dir_sectors
            + ministream_sectors
            + large
                .iter()
                .map(|(_, d)| units_for(d.len(), sector_size))
                .sum::<u32>();

        let (n_fat, n_difat) = fat_layout(data_sectors, sector_size);

        let mut fat = FatBuilder::new();
        let fat_start = fat.allocate_special(n_fat, FATSECT);
        let difat_start = if n_difat > 0 {
            fat.allocate_special(n_difat, DIFSECT)
        } else {
            ENDOFCHAIN
        };
        let minifat_start = fat.allocate_chain(minifat_sectors);
        let dir_start = fat.allocate_chain(dir_sectors);
        let ministream_start = fat.allocate_chain(ministream_sectors);
        {
            let root = directory.entry_mut(0);
            root.start_sector = ministream_start;
            root.size = ministream.len() as u64;
        }
        for (sid, data) in &large {
            let start = fat.allocate_chain(units_for(data.len(), sector_size));
            directory.entry_mut(*sid).start_sector = start;
        }

        let fat_ids: Vec<u32> = (fat_start..fat_start + n_fat).collect();

        writer.write_all(&header_bytes(HeaderFields {
            num_fat_sectors: n_fat,
            first_dir_sector: dir_start,
            first_minifat_sector: minifat_start,
            num_minifat_sectors: minifat_sectors,
            first_difat_sector: difat_start,
            num_difat_sectors: n_difat,
            fat_ids: &fat_ids,
        }))?;
        writer.write_all(&fat.to_sectors(sector_size, n_fat))?;
        writer.write_all(&difat_bytes(&fat_ids, difat_start, n_difat, sector_size))?;
        writer.write_all(&minifat.to_sectors(sector_size, minifat_sectors))?;
        writer.write_all(&directory.generate(sector_size))?;
        write_padded(writer, &ministream, sector_size)?;
        for (_, data) in &large {
            write_padded(writer, data, sector_size)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn owned(path: &[&str]) -> Result<Vec<String>, OleError> {
    if path.is_empty() {
        return Err(OleError::InvalidData("Empty path".to_string()));
    }
    for name in path {
        let units = name.encode_utf16().count();
        if units == 0 || units > MAX_NAME_LEN {
            return Err(OleError::InvalidData(format!(
                "entry name '{name}' must be 1..={MAX_NAME_LEN} UTF-16 units"
            )));
        }
    }
    Ok(path.iter().map(|s| s.to_string()).collect())
}

/// FAT and DIFAT sector counts for `data_sectors` sectors of payload.
///
/// The tables describe themselves, so iterate until the counts settle.
fn fat_layout(data_sectors: u32, sector_size: usize) -> (u32, u32) {
    let per_fat = (sector_size / 4) as u32;
    let per_difat = per_fat - 1;
    let (mut n_fat, mut n_difat) = (0u32, 0u32);
    loop {
        let new_fat = (data_sectors + n_fat + n_difat).div_ceil(per_fat).max(1);
        let new_difat = new_fat
            .saturating_sub(HEADER_DIFAT_ENTRIES as u32)
            .div_ceil(per_difat);
        if (new_fat, new_difat) == (n_fat, n_difat) {
            return (n_fat, n_difat);
        }
        n_fat = new_fat;
        n_difat = new_difat;
    }
}

struct HeaderFields<'a> {
    num_fat_sectors: u32,
    first_dir_sector: u32,
    first_minifat_sector: u32,
    num_minifat_sectors: u32,
    first_difat_sector: u32,
    num_difat_sectors: u32,
    fat_ids: &'a [u32],
}

fn header_bytes(fields: HeaderFields<'_>) -> Vec<u8> {
    let mut h = Vec::with_capacity(HEADER_SIZE);
    h.extend_from_slice(MAGIC);
    h.extend_from_slice(&[0u8; 16]); // clsid
    h.extend_from_slice(&0x003Eu16.to_le_bytes()); // minor version
    h.extend_from_slice(&3u16.to_le_bytes()); // major version
    h.extend_from_slice(&0xFFFEu16.to_le_bytes()); // byte order
    h.extend_from_slice(&9u16.to_le_bytes()); // 512-byte sectors
    h.extend_from_slice(&6u16.to_le_bytes()); // 64-byte mini sectors
    h.extend_from_slice(&[0u8; 6]);
    h.extend_from_slice(&0u32.to_le_bytes()); // directory sectors (v3: 0)
    h.extend_from_slice(&fields.num_fat_sectors.to_le_bytes());
    h.extend_from_slice(&fields.first_dir_sector.to_le_bytes());
    h.extend_from_slice(&0u32.to_le_bytes()); // transaction signature
    h.extend_from_slice(&MINI_STREAM_CUTOFF.to_le_bytes());
    h.extend_from_slice(&fields.first_minifat_sector.to_le_bytes());
    h.extend_from_slice(&fields.num_minifat_sectors.to_le_bytes());
    h.extend_from_slice(&fields.first_difat_sector.to_le_bytes());
    h.extend_from_slice(&fields.num_difat_sectors.to_le_bytes());
    for i in 0..HEADER_DIFAT_ENTRIES {
        let id = fields.fat_ids.get(i).copied().unwrap_or(FREESECT);
        h.extend_from_slice(&id.to_le_bytes());
    }
    h
}

/// DIFAT sectors listing the FAT sectors the header has no room for.
fn difat_bytes(fat_ids: &[u32], first: u32, count: u32, sector_size: usize) -> Vec<u8> {
    let per_difat = sector_size / 4 - 1;
    let overflow = fat_ids.get(HEADER_DIFAT_ENTRIES..).unwrap_or(&[]);
    let mut out = Vec::with_capacity(count as usize * sector_size);
    for i in 0..count as usize {
        for slot in 0..per_difat {
            let id = overflow.get(i * per_difat + slot).copied().unwrap_or(FREESECT);
            out.extend_from_slice(&id.to_le_bytes());
        }
        let next = if i + 1 < count as usize {
            first + i as u32 + 1
        } else {
            ENDOFCHAIN
        };
        out.extend_from_slice(&next.to_le_bytes());
    }
    out
}

fn write_padded<W: Write>(writer: &mut W, data: &[u8], sector_size: usize) -> std::io::Result<()> {
    writer.write_all(data)?;
    let pad = data.len().div_ceil(sector_size) * sector_size - data.len();
    writer.write_all(&vec![0u8; pad])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fat_layout_small() {
        assert_eq!(fat_layout(2, SECTOR_SIZE_V3), (1, 0));
        assert_eq!(fat_layout(127, SECTOR_SIZE_V3), (1, 0));
        assert_eq!(fat_layout(128, SECTOR_SIZE_V3), (2, 0));
    }

    #[test]
    fn test_fat_layout_needs_difat() {
        // 109 FAT sectors cover 13952 sectors including themselves
        let (n_fat, n_difat) = fat_layout(14_000, SECTOR_SIZE_V3);
        assert!(n_fat > HEADER_DIFAT_ENTRIES as u32);
        assert_eq!(n_difat, 1);
        assert!((n_fat + n_difat + 14_000) <= n_fat * 128);
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut writer = OleWriter::new();
        assert!(writer.create_stream(&[], b"x").is_err());
        assert!(writer.create_stream(&[""], b"x").is_err());
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(writer.create_stream(&[long.as_str()], b"x").is_err());
    }

    #[test]
    fn test_header_size() {
        let header = header_bytes(HeaderFields {
            num_fat_sectors: 1,
            first_dir_sector: 1,
            first_minifat_sector: ENDOFCHAIN,
            num_minifat_sectors: 0,
            first_difat_sector: ENDOFCHAIN,
            num_difat_sectors: 0,
            fat_ids: &[0],
        });
        assert_eq!(header.len(), HEADER_SIZE);
    }
}
