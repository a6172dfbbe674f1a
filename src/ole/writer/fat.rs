//! Allocation table generation for OLE2 files
//!
//! The same builder serves both the FAT (512-byte sectors) and the MiniFAT
//! (64-byte mini sectors): each maps a unit to the next unit of its chain.
//! - Chain links use the next unit's index
//! - FAT sectors are marked with FATSECT (0xFFFFFFFD)
//! - DIFAT sectors are marked with DIFSECT (0xFFFFFFFC)
//! - End of chain is marked with ENDOFCHAIN (0xFFFFFFFE)
//! - Unused tail entries are FREESECT (0xFFFFFFFF)

use super::super::consts::*;

/// Sequential allocator that records chains as it hands out units.
#[derive(Debug, Default)]
pub(super) struct FatBuilder {
    table: Vec<u32>,
}

impl FatBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of units allocated so far.
    #[inline]
    pub fn len(&self) -> u32 {
        self.table.len() as u32
    }

    /// Allocate `count` consecutive units linked as one chain.
    ///
    /// Returns the first unit, or ENDOFCHAIN when `count` is zero.
    pub fn allocate_chain(&mut self, count: u32) -> u32 {
        if count == 0 {
            return ENDOFCHAIN;
        }
        let start = self.len();
        self.table.extend((start + 1..start + count).chain([ENDOFCHAIN]));
        start
    }

    /// Reserve `count` units that carry a marker instead of a chain link.
    pub fn allocate_special(&mut self, count: u32, marker: u32) -> u32 {
        let start = self.len();
        self.table
            .extend(std::iter::repeat_n(marker, count as usize));
        start
    }

    /// Serialize the table into `sector_count` sectors of `sector_size` bytes.
    pub fn to_sectors(&self, sector_size: usize, sector_count: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(sector_count as usize * sector_size);
        for value in &self.table {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.resize(sector_count as usize * sector_size, 0xFF);
        out
    }
}

/// Number of whole units needed for `len` bytes.
#[inline]
pub(super) fn units_for(len: usize, unit: usize) -> u32 {
    len.div_ceil(unit) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_chain() {
        let mut fat = FatBuilder::new();
        assert_eq!(fat.allocate_chain(3), 0);
        assert_eq!(fat.allocate_chain(1), 3);
        assert_eq!(fat.table, vec![1, 2, ENDOFCHAIN, ENDOFCHAIN]);
    }

    #[test]
    fn test_empty_chain() {
        let mut fat = FatBuilder::new();
        assert_eq!(fat.allocate_chain(0), ENDOFCHAIN);
        assert_eq!(fat.len(), 0);
    }

    #[test]
    fn test_special_and_padding() {
        let mut fat = FatBuilder::new();
        fat.allocate_special(1, FATSECT);
        fat.allocate_chain(2);
        let bytes = fat.to_sectors(SECTOR_SIZE_V3, 1);
        assert_eq!(bytes.len(), SECTOR_SIZE_V3);
        assert_eq!(&bytes[0..4], &FATSECT.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &FREESECT.to_le_bytes());
    }
}
