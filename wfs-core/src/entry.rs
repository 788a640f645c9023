//! Log entry framing: an inode header followed by a variable-length payload.

use crate::inode::InodeHeader;
use crate::inode::HEADER_SIZE;
use crate::superblock::SUPERBLOCK_SIZE;

/// A decoded view into one log entry: its absolute offset, header, and payload.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub offset: u32,
    pub header: InodeHeader,
    pub payload: &'a [u8],
}

/// Serializes a header and payload into a single self-describing byte run.
///
/// `header.size` is recomputed from the payload's length rather than trusted
/// from the caller, since it is the field the iterator relies on to advance.
pub fn encode_entry(header: &InodeHeader, payload: &[u8]) -> Vec<u8> {
    let mut header = *header;
    header.size = (HEADER_SIZE + payload.len()) as u32;
    let mut buf = Vec::with_capacity(header.size as usize);
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}

/// A forward cursor over the log region, from just past the superblock up to
/// the current head. Does not consult `deleted`: tombstoned entries still
/// occupy space and their `size` field is still authoritative for advancing
/// the cursor.
pub struct LogIter<'a> {
    data: &'a [u8],
    cursor: usize,
    head: usize,
}

impl<'a> LogIter<'a> {
    pub fn new(data: &'a [u8], head: usize) -> Self {
        Self {
            data,
            cursor: SUPERBLOCK_SIZE,
            head,
        }
    }
}

impl<'a> Iterator for LogIter<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Entry<'a>> {
        if self.cursor >= self.head {
            return None;
        }
        let header = InodeHeader::decode(&self.data[self.cursor..]).ok()?;
        let entry_len = header.size as usize;
        let offset = self.cursor as u32;
        let payload = &self.data[self.cursor + HEADER_SIZE..self.cursor + entry_len];
        self.cursor += entry_len;
        Some(Entry {
            offset,
            header,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::S_IFREG;

    fn header(inode_number: u32, size: u32) -> InodeHeader {
        InodeHeader {
            inode_number,
            deleted: false,
            mode: S_IFREG | 0o644,
            uid: 0,
            gid: 0,
            flags: 0,
            size,
            atime: 0,
            mtime: 0,
            ctime: 0,
            links: 1,
        }
    }

    #[test]
    fn iterates_two_entries_in_order() {
        let h1 = header(1, 0);
        let h2 = header(2, 0);
        let e1 = encode_entry(&h1, b"hello");
        let e2 = encode_entry(&h2, b"world!");

        let mut data = vec![0u8; SUPERBLOCK_SIZE];
        data.extend_from_slice(&e1);
        data.extend_from_slice(&e2);
        let head = data.len();

        let entries: Vec<_> = LogIter::new(&data, head).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].offset, SUPERBLOCK_SIZE as u32);
        assert_eq!(entries[0].header.inode_number, 1);
        assert_eq!(entries[0].payload, b"hello");
        assert_eq!(entries[1].offset, (SUPERBLOCK_SIZE + e1.len()) as u32);
        assert_eq!(entries[1].header.inode_number, 2);
        assert_eq!(entries[1].payload, b"world!");
    }

    #[test]
    fn iteration_ignores_the_deleted_flag() {
        let mut h = header(1, 0);
        h.deleted = true;
        let e = encode_entry(&h, b"x");
        let mut data = vec![0u8; SUPERBLOCK_SIZE];
        data.extend_from_slice(&e);
        let head = data.len();

        let entries: Vec<_> = LogIter::new(&data, head).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].header.deleted);
    }
}
