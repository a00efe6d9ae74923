// This module defines the method-boundary table the compiler emits next to the kernel
// image and the running kernel scans when it reconstructs a call stack. A MethodBoundary
// is the half-open code range [begin, end) of one compiled method plus the identity of
// that method, which is the byte offset of its name in a NUL-terminated name table. The
// serialized form is a flat array of 12-byte little-endian records followed by the name
// table, so the kernel can scan it with fixed-stride reads and no parser. Entries are
// pushed in address order and must not overlap; the table is immutable after emission.

//! Method boundary table.

use std::fmt;

use crate::core::{CompileError, CompileResult};

/// Size of one serialized boundary record.
pub const RECORD_SIZE: usize = 12;

/// Stable identity of a method: offset of its name in the name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MethodIdentity(pub u32);

/// Code range of one compiled method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct MethodBoundary {
    pub begin: u32,
    /// First address past the method.
    pub end: u32,
    pub method: MethodIdentity,
}

impl MethodBoundary {
    pub fn contains(&self, ip: u32) -> bool {
        self.begin <= ip && ip < self.end
    }

    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    fn to_bytes(self) -> [u8; RECORD_SIZE] {
        let mut record = [0; RECORD_SIZE];
        record[0..4].copy_from_slice(&self.begin.to_le_bytes());
        record[4..8].copy_from_slice(&self.end.to_le_bytes());
        record[8..12].copy_from_slice(&self.method.0.to_le_bytes());
        record
    }

    fn from_bytes(record: &[u8]) -> Self {
        let word = |at: usize| u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]]);
        Self {
            begin: word(0),
            end: word(4),
            method: MethodIdentity(word(8)),
        }
    }
}

impl fmt::Display for MethodBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#010x}, {:#010x})", self.begin, self.end)
    }
}

/// Ordered, non-overlapping boundaries plus the names they refer to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBoundaryTable {
    entries: Vec<MethodBoundary>,
    names: Vec<u8>,
}

impl MethodBoundaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the range of method `name`.
    ///
    /// Ranges must be non-empty and follow the previous entry.
    pub fn push(&mut self, begin: u32, end: u32, name: &str) -> CompileResult<MethodIdentity> {
        if begin >= end {
            return Err(CompileError::BoundaryTable {
                reason: format!("empty range [{begin:#x}, {end:#x}) for {name}"),
            });
        }
        if let Some(last) = self.entries.last() {
            if begin < last.end {
                return Err(CompileError::BoundaryTable {
                    reason: format!(
                        "{name} at {begin:#x} overlaps the previous method ending at {:#x}",
                        last.end
                    ),
                });
            }
        }
        if name.as_bytes().contains(&0) {
            return Err(CompileError::BoundaryTable {
                reason: format!("method name {name:?} contains NUL"),
            });
        }

        let method = MethodIdentity(self.names.len() as u32);
        self.names.extend_from_slice(name.as_bytes());
        self.names.push(0);
        self.entries.push(MethodBoundary { begin, end, method });
        Ok(method)
    }

    pub fn entries(&self) -> &[MethodBoundary] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name of a method identity, `None` if it does not point at a name.
    pub fn name_of(&self, method: MethodIdentity) -> Option<&str> {
        let start = method.0 as usize;
        let tail = self.names.get(start..)?;
        let end = tail.iter().position(|&byte| byte == 0)?;
        std::str::from_utf8(&tail[..end]).ok()
    }

    /// The first boundary containing `ip`.
    pub fn find(&self, ip: u32) -> Option<&MethodBoundary> {
        self.entries.iter().find(|boundary| boundary.contains(ip))
    }

    /// The serialized records.
    pub fn records_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|boundary| boundary.to_bytes()).collect()
    }

    /// The serialized name table.
    pub fn names_bytes(&self) -> &[u8] {
        &self.names
    }

    /// Parse a table back from its serialized records and names.
    pub fn from_bytes(records: &[u8], names: &[u8]) -> CompileResult<Self> {
        if records.len() % RECORD_SIZE != 0 {
            return Err(CompileError::BoundaryTable {
                reason: format!("{} bytes is not a whole number of records", records.len()),
            });
        }

        let mut table = Self {
            entries: Vec::with_capacity(records.len() / RECORD_SIZE),
            names: names.to_vec(),
        };

        for record in records.chunks_exact(RECORD_SIZE) {
            let boundary = MethodBoundary::from_bytes(record);
            if boundary.begin >= boundary.end {
                return Err(CompileError::BoundaryTable {
                    reason: format!("empty range {boundary}"),
                });
            }
            if table.entries.last().is_some_and(|last| boundary.begin < last.end) {
                return Err(CompileError::BoundaryTable {
                    reason: format!("{boundary} overlaps its predecessor"),
                });
            }
            if table.name_of(boundary.method).is_none() {
                return Err(CompileError::BoundaryTable {
                    reason: format!("{boundary} has no name at offset {}", boundary.method.0),
                });
            }
            table.entries.push(boundary);
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> MethodBoundaryTable {
        let mut table = MethodBoundaryTable::new();
        table.push(0x1000, 0x1010, "A").unwrap();
        table.push(0x1010, 0x1020, "B").unwrap();
        table
    }

    #[test]
    fn test_push_assigns_name_offsets() {
        let table = table();
        let ids: Vec<_> = table.entries().iter().map(|b| b.method).collect();
        assert_eq!(ids, [MethodIdentity(0), MethodIdentity(2)]);
        assert_eq!(table.names_bytes(), b"A\0B\0");
        assert_eq!(table.name_of(ids[1]), Some("B"));
        assert_eq!(table.name_of(MethodIdentity(9)), None);
    }

    #[test]
    fn test_find_is_half_open() {
        let table = table();
        assert_eq!(table.find(0x1000).map(|b| b.begin), Some(0x1000));
        assert_eq!(table.find(0x100F).map(|b| b.begin), Some(0x1000));
        assert_eq!(table.find(0x1010).map(|b| b.begin), Some(0x1010));
        assert!(table.find(0x1020).is_none());
        assert!(table.find(0x0FFF).is_none());
    }

    #[test]
    fn test_rejects_overlap_and_empty_ranges() {
        let mut table = table();
        assert!(matches!(
            table.push(0x101C, 0x1030, "C"),
            Err(CompileError::BoundaryTable { .. })
        ));
        assert!(table.push(0x1030, 0x1030, "C").is_err());
        assert!(table.push(0x1030, 0x1040, "C\0").is_err());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_byte_form() {
        let table = table();
        let records = table.records_bytes();
        assert_eq!(records.len(), 2 * RECORD_SIZE);
        assert_eq!(&records[..12], &[0x00, 0x10, 0, 0, 0x10, 0x10, 0, 0, 0, 0, 0, 0]);

        let parsed = MethodBoundaryTable::from_bytes(&records, table.names_bytes()).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_from_bytes_rejects_malformed() {
        let table = table();
        let records = table.records_bytes();
        assert!(MethodBoundaryTable::from_bytes(&records[..13], table.names_bytes()).is_err());
        assert!(MethodBoundaryTable::from_bytes(&records, b"A").is_err());

        let mut swapped = records[12..].to_vec();
        swapped.extend_from_slice(&records[..12]);
        assert!(MethodBoundaryTable::from_bytes(&swapped, table.names_bytes()).is_err());
    }
}
