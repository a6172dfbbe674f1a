use super::consts::*;
use std::collections::HashSet;
use std::io::{self, Read};
use thiserror::Error;
use zerocopy::{FromBytes, LE, U16, U32, U64};
use zerocopy_derive::FromBytes as DeriveFromBytes;

/// Raw OLE header structure (512 bytes)
///
/// On-disk layout of the compound file header, little-endian throughout.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    /// Signature, must equal [`MAGIC`]
    magic: [u8; 8],
    /// Reserved class ID (all zeroes)
    clsid: [u8; 16],
    /// Minor version (0x003E)
    minor_version: U16<LE>,
    /// Major version (3 for 512-byte sectors, 4 for 4096-byte sectors)
    major_version: U16<LE>,
    /// Byte order mark (0xFFFE)
    byte_order: U16<LE>,
    /// Sector size as a power of two
    sector_shift: U16<LE>,
    /// Mini sector size as a power of two
    mini_sector_shift: U16<LE>,
    reserved: [u8; 6],
    /// Number of directory sectors (always 0 for version 3)
    num_dir_sectors: U32<LE>,
    /// Number of FAT sectors
    num_fat_sectors: U32<LE>,
    /// First sector of the directory chain
    first_dir_sector: U32<LE>,
    transaction_signature: U32<LE>,
    /// Streams below this size are stored in the mini stream
    mini_stream_cutoff: U32<LE>,
    /// First sector of the MiniFAT chain
    first_minifat_sector: U32<LE>,
    /// Number of MiniFAT sectors
    num_minifat_sectors: U32<LE>,
    /// First DIFAT sector (ENDOFCHAIN when the header holds all of them)
    first_difat_sector: U32<LE>,
    /// Number of DIFAT sectors
    num_difat_sectors: U32<LE>,
    /// First 109 FAT sector locations
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// Raw OLE directory entry structure (128 bytes)
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawDirectoryEntry {
    /// Entry name in UTF-16LE (64 bytes, null-padded)
    name: [u8; 64],
    /// Length of name in bytes (including null terminator)
    name_len: U16<LE>,
    /// Entry type (1 = storage, 2 = stream, 5 = root)
    entry_type: u8,
    /// Node color (0 = red, 1 = black)
    node_color: u8,
    /// Left sibling SID
    sid_left: U32<LE>,
    /// Right sibling SID
    sid_right: U32<LE>,
    /// Child SID
    sid_child: U32<LE>,
    /// CLSID (16 bytes)
    clsid: [u8; 16],
    /// State bits
    state_bits: U32<LE>,
    /// Creation time (FILETIME)
    creation_time: U64<LE>,
    /// Modified time (FILETIME)
    modified_time: U64<LE>,
    /// Starting sector
    start_sector: U32<LE>,
    /// Stream size
    stream_size: U64<LE>,
}

/// Error types for OLE file parsing and writing
#[derive(Debug, Error)]
pub enum OleError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not an OLE file")]
    NotOleFile,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Corrupted file: {0}")]
    CorruptedFile(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Stream not found: {0}")]
    StreamNotFound(String),
}

/// Represents an OLE directory entry (stream or storage)
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Storage ID (index in directory)
    pub sid: u32,
    /// Entry name (UTF-16 decoded to UTF-8)
    pub name: String,
    /// Entry type (stream, storage, root, etc.)
    pub entry_type: u8,
    /// Index of left sibling in red-black tree
    pub sid_left: u32,
    /// Index of right sibling in red-black tree
    pub sid_right: u32,
    /// Index of child node in red-black tree
    pub sid_child: u32,
    /// First sector of the stream
    pub start_sector: u32,
    /// Size of the stream in bytes
    pub size: u64,
}

/// OLE2 structured storage file held in memory.
///
/// Parses the header, FAT, MiniFAT and directory up front; stream contents
/// are assembled on demand by following sector chains.
#[derive(Debug)]
pub struct OleFile {
    data: Vec<u8>,
    /// Sector size (512 or 4096 bytes)
    sector_size: usize,
    /// Mini stream cutoff size (typically 4096 bytes)
    mini_stream_cutoff: u32,
    /// File Allocation Table - maps sector to next sector in chain
    fat: Vec<u32>,
    /// Mini FAT - for streams smaller than cutoff size
    minifat: Vec<u32>,
    /// All directory entries indexed by SID
    entries: Vec<DirectoryEntry>,
    /// Contents of the root entry's stream
    ministream: Vec<u8>,
}

impl OleFile {
    /// Read an OLE file from a reader.
    ///
    /// The reader is drained and dropped before parsing starts.
    pub fn open<R: Read>(mut reader: R) -> Result<Self, OleError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Parse an OLE file from owned bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, OleError> {
        if data.len() < MINIMAL_OLEFILE_SIZE || !data.starts_with(MAGIC) {
            return Err(OleError::NotOleFile);
        }

        let header = RawHeader::read_from_bytes(&data[..HEADER_SIZE])
            .map_err(|_| OleError::InvalidFormat("truncated header".to_string()))?;

        if header.byte_order.get() != 0xFFFE {
            return Err(OleError::InvalidFormat("Invalid byte order".to_string()));
        }

        let sector_size = match header.sector_shift.get() {
            9 => SECTOR_SIZE_V3,
            12 => SECTOR_SIZE_V4,
            other => {
                return Err(OleError::InvalidFormat(format!(
                    "unsupported sector shift {other}"
                )));
            },
        };
        if header.mini_sector_shift.get() != 6 {
            return Err(OleError::InvalidFormat(format!(
                "unsupported mini sector shift {}",
                header.mini_sector_shift.get()
            )));
        }

        let mut file = OleFile {
            data,
            sector_size,
            mini_stream_cutoff: header.mini_stream_cutoff.get(),
            fat: Vec::new(),
            minifat: Vec::new(),
            entries: Vec::new(),
            ministream: Vec::new(),
        };

        file.fat = file.load_fat(&header)?;
        file.entries = file.load_directory(header.first_dir_sector.get())?;

        let root = file
            .entries
            .first()
            .ok_or_else(|| OleError::CorruptedFile("empty directory".to_string()))?;
        if root.entry_type != STGTY_ROOT {
            return Err(OleError::CorruptedFile(
                "first directory entry is not the root".to_string(),
            ));
        }

        if root.start_sector != ENDOFCHAIN && root.size > 0 {
            let (start, size) = (root.start_sector, root.size);
            file.ministream = file.read_chain(start, Some(size))?;
        }

        let first_minifat = header.first_minifat_sector.get();
        if first_minifat != ENDOFCHAIN && header.num_minifat_sectors.get() > 0 {
            let raw = file.read_chain(first_minifat, None)?;
            file.minifat = le_u32s(&raw);
        }

        Ok(file)
    }

    fn sector(&self, sid: u32) -> Result<&[u8], OleError> {
        let start = (sid as usize + 1)
            .checked_mul(self.sector_size)
            .ok_or_else(|| OleError::CorruptedFile(format!("sector {sid} out of range")))?;
        if start >= self.data.len() {
            return Err(OleError::CorruptedFile(format!(
                "sector {sid} beyond end of file"
            )));
        }
        // Some writers truncate the final sector
        let end = (start + self.sector_size).min(self.data.len());
        Ok(&self.data[start..end])
    }

    fn load_fat(&self, header: &RawHeader) -> Result<Vec<u32>, OleError> {
        let num_fat = header.num_fat_sectors.get() as usize;
        let num_difat = header.num_difat_sectors.get() as usize;
        let max_sectors = self.data.len() / self.sector_size;
        if num_fat > max_sectors || num_difat > max_sectors {
            return Err(OleError::CorruptedFile(format!(
                "header claims {num_fat} FAT and {num_difat} DIFAT sectors in a file of {max_sectors} sectors"
            )));
        }

        let mut fat_sectors: Vec<u32> = header
            .difat
            .iter()
            .map(|v| v.get())
            .take(num_fat.min(HEADER_DIFAT_ENTRIES))
            .collect();

        let per_difat = self.sector_size / 4 - 1;
        let mut next = header.first_difat_sector.get();
        let mut remaining = num_difat;
        let mut visited = HashSet::new();
        while remaining > 0 && next <= MAXREGSECT && fat_sectors.len() < num_fat {
            if !visited.insert(next) {
                return Err(OleError::CorruptedFile(format!(
                    "cycle in DIFAT chain at sector {next}"
                )));
            }
            let entries = le_u32s(self.sector(next)?);
            for &sid in entries.iter().take(per_difat) {
                if fat_sectors.len() == num_fat {
                    break;
                }
                fat_sectors.push(sid);
            }
            next = entries.get(per_difat).copied().unwrap_or(ENDOFCHAIN);
            remaining -= 1;
        }

        if fat_sectors.len() < num_fat {
            return Err(OleError::CorruptedFile(format!(
                "DIFAT lists {} of {} FAT sectors",
                fat_sectors.len(),
                num_fat
            )));
        }

        let mut fat = Vec::with_capacity(num_fat * self.sector_size / 4);
        for sid in fat_sectors {
            fat.extend(le_u32s(self.sector(sid)?));
        }
        Ok(fat)
    }

    fn load_directory(&self, first_dir_sector: u32) -> Result<Vec<DirectoryEntry>, OleError> {
        let raw = self.read_chain(first_dir_sector, None)?;
        let mut entries = Vec::with_capacity(raw.len() / DIRENTRY_SIZE);

        for (sid, chunk) in raw.chunks_exact(DIRENTRY_SIZE).enumerate() {
            let entry = RawDirectoryEntry::read_from_bytes(chunk).map_err(|_| {
                OleError::CorruptedFile(format!("truncated directory entry {sid}"))
            })?;

            let name_len = (entry.name_len.get() as usize).min(64);
            let name_bytes = &entry.name[..name_len.saturating_sub(2)];
            let (name, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(name_bytes);

            entries.push(DirectoryEntry {
                sid: sid as u32,
                name: name.into_owned(),
                entry_type: entry.entry_type,
                sid_left: entry.sid_left.get(),
                sid_right: entry.sid_right.get(),
                sid_child: entry.sid_child.get(),
                start_sector: entry.start_sector.get(),
                size: entry.stream_size.get(),
            });
        }

        Ok(entries)
    }

    /// Follow a FAT chain and concatenate its sectors.
    fn read_chain(&self, start: u32, size: Option<u64>) -> Result<Vec<u8>, OleError> {
        let mut out = Vec::with_capacity(size.unwrap_or(0) as usize);
        let mut sid = start;
        let mut steps = 0usize;

        while sid != ENDOFCHAIN {
            if sid > MAXREGSECT {
                return Err(OleError::CorruptedFile(format!(
                    "unexpected sector id {sid:#x} in chain"
                )));
            }
            steps += 1;
            if steps > self.fat.len() + 1 {
                return Err(OleError::CorruptedFile("cyclic sector chain".to_string()));
            }
            out.extend_from_slice(self.sector(sid)?);
            if size.is_some_and(|s| out.len() as u64 >= s) {
                break;
            }
            sid = *self.fat.get(sid as usize).ok_or_else(|| {
                OleError::CorruptedFile(format!("sector {sid} not covered by FAT"))
            })?;
        }

        if let Some(size) = size {
            if (out.len() as u64) < size {
                return Err(OleError::CorruptedFile(format!(
                    "chain holds {} bytes, expected {size}",
                    out.len()
                )));
            }
            out.truncate(size as usize);
        }
        Ok(out)
    }

    /// Follow a MiniFAT chain inside the mini stream.
    fn read_mini_chain(&self, start: u32, size: u64) -> Result<Vec<u8>, OleError> {
        let mut out = Vec::with_capacity(size as usize);
        let mut sid = start;
        let mut steps = 0usize;

        while (out.len() as u64) < size {
            if sid > MAXREGSECT {
                return Err(OleError::CorruptedFile(format!(
                    "mini chain ended early at {sid:#x}"
                )));
            }
            steps += 1;
            if steps > self.minifat.len() + 1 {
                return Err(OleError::CorruptedFile(
                    "cyclic mini sector chain".to_string(),
                ));
            }
            let offset = sid as usize * MINI_SECTOR_SIZE;
            let end = offset + MINI_SECTOR_SIZE;
            if end > self.ministream.len() {
                return Err(OleError::CorruptedFile(format!(
                    "mini sector {sid} beyond mini stream"
                )));
            }
            out.extend_from_slice(&self.ministream[offset..end]);
            sid = *self.minifat.get(sid as usize).ok_or_else(|| {
                OleError::CorruptedFile(format!("mini sector {sid} not covered by MiniFAT"))
            })?;
        }

        out.truncate(size as usize);
        Ok(out)
    }

    /// Child SIDs of a storage, in tree order.
    fn children(&self, sid: u32) -> Vec<u32> {
        let mut result = Vec::new();
        let Some(parent) = self.entries.get(sid as usize) else {
            return result;
        };

        let mut stack = vec![parent.sid_child];
        let mut visited = vec![false; self.entries.len()];
        while let Some(current) = stack.pop() {
            let Some(entry) = self.entries.get(current as usize) else {
                continue;
            };
            if std::mem::replace(&mut visited[current as usize], true) {
                continue;
            }
            result.push(current);
            stack.push(entry.sid_left);
            stack.push(entry.sid_right);
        }
        result
    }

    /// Find an entry by path (e.g. `&["\u{6}DataSpaces", "Version"]`).
    ///
    /// Names are compared case-insensitively, as the format requires.
    pub fn find(&self, path: &[&str]) -> Option<&DirectoryEntry> {
        let mut current = 0u32;
        for component in path {
            current = self.children(current).into_iter().find(|&sid| {
                self.entries[sid as usize]
                    .name
                    .to_uppercase()
                    .eq(&component.to_uppercase())
            })?;
        }
        self.entries.get(current as usize)
    }

    /// Whether a stream or storage exists at `path`.
    #[inline]
    pub fn exists(&self, path: &[&str]) -> bool {
        self.find(path).is_some()
    }

    /// Read the full contents of the stream at `path`.
    pub fn open_stream(&self, path: &[&str]) -> Result<Vec<u8>, OleError> {
        let entry = self
            .find(path)
            .filter(|e| e.entry_type == STGTY_STREAM)
            .ok_or_else(|| OleError::StreamNotFound(path.join("/")))?;

        if entry.size == 0 {
            return Ok(Vec::new());
        }
        if entry.size < self.mini_stream_cutoff as u64 {
            self.read_mini_chain(entry.start_sector, entry.size)
        } else {
            self.read_chain(entry.start_sector, Some(entry.size))
        }
    }

    /// Paths of all streams in the file.
    pub fn list_streams(&self) -> Vec<Vec<String>> {
        let mut streams = Vec::new();
        let mut pending = vec![(0u32, Vec::<String>::new())];
        while let Some((sid, prefix)) = pending.pop() {
            for child in self.children(sid) {
                let entry = &self.entries[child as usize];
                let mut path = prefix.clone();
                path.push(entry.name.clone());
                match entry.entry_type {
                    STGTY_STREAM => streams.push(path),
                    STGTY_STORAGE => pending.push((child, path)),
                    _ => {},
                }
            }
        }
        streams.sort();
        streams
    }
}

fn le_u32s(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_ole() {
        let data = vec![0u8; MINIMAL_OLEFILE_SIZE];
        assert!(matches!(OleFile::from_bytes(data), Err(OleError::NotOleFile)));
        assert!(matches!(
            OleFile::from_bytes(MAGIC.to_vec()),
            Err(OleError::NotOleFile)
        ));
    }

    #[test]
    fn test_rejects_bad_byte_order() {
        let mut data = vec![0u8; MINIMAL_OLEFILE_SIZE];
        data[..8].copy_from_slice(MAGIC);
        data[0x1C] = 0xFF;
        data[0x1D] = 0xFF;
        assert!(matches!(
            OleFile::from_bytes(data),
            Err(OleError::InvalidFormat(_))
        ));
    }

    /// Version 3 header with `sectors` zeroed sectors after it.
    fn raw_file(sectors: usize, num_fat: u32, first_difat: u32, num_difat: u32) -> Vec<u8> {
        let mut data = vec![0u8; SECTOR_SIZE_V3 * (sectors + 1)];
        data[..8].copy_from_slice(MAGIC);
        data[0x1C..0x1E].copy_from_slice(&0xFFFEu16.to_le_bytes());
        data[0x1E..0x20].copy_from_slice(&9u16.to_le_bytes());
        data[0x20..0x22].copy_from_slice(&6u16.to_le_bytes());
        data[0x2C..0x30].copy_from_slice(&num_fat.to_le_bytes());
        data[0x44..0x48].copy_from_slice(&first_difat.to_le_bytes());
        data[0x48..0x4C].copy_from_slice(&num_difat.to_le_bytes());
        data
    }

    #[test]
    fn test_rejects_oversized_fat_count() {
        let data = raw_file(4, u32::MAX, ENDOFCHAIN, 0);
        assert!(matches!(
            OleFile::from_bytes(data),
            Err(OleError::CorruptedFile(_))
        ));

        let data = raw_file(4, 1, 0, u32::MAX);
        assert!(matches!(
            OleFile::from_bytes(data),
            Err(OleError::CorruptedFile(_))
        ));
    }

    #[test]
    fn test_rejects_self_referencing_difat() {
        // 109 FAT sectors in the header plus 127 in one DIFAT sector leave
        // the rest to a DIFAT chain that points back at itself.
        let mut data = raw_file(300, 290, 1, 5);
        let difat = 2 * SECTOR_SIZE_V3;
        let next_link = difat + SECTOR_SIZE_V3 - 4;
        data[next_link..next_link + 4].copy_from_slice(&1u32.to_le_bytes());
        match OleFile::from_bytes(data) {
            Err(OleError::CorruptedFile(msg)) => assert!(msg.contains("cycle"), "{msg}"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }
}
