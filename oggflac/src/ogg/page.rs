/// Capture pattern at the start of every Ogg page.
pub const CAPTURE_PATTERN: &[u8; 4] = b"OggS";

/// Fixed part of the page header, before the segment table.
pub const PAGE_HEADER_FIXED_LEN: usize = 27;

/// Largest possible page: fixed header, 255 lacing values, 255 * 255 body bytes.
pub const MAX_PAGE_SIZE: usize = PAGE_HEADER_FIXED_LEN + 255 + 255 * 255;

const FLAG_CONTINUED: u8 = 0x01;
const FLAG_BOS: u8 = 0x02;
const FLAG_EOS: u8 = 0x04;

/// A complete Ogg page as returned by the sync layer.
///
/// The header includes the segment table; the body is the concatenated
/// segment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

impl Page {
    pub fn version(&self) -> u8 {
        self.header[4]
    }

    pub fn is_continued(&self) -> bool {
        self.header[5] & FLAG_CONTINUED != 0
    }

    /// Beginning-of-stream flag.
    pub fn is_bos(&self) -> bool {
        self.header[5] & FLAG_BOS != 0
    }

    /// End-of-stream flag.
    pub fn is_eos(&self) -> bool {
        self.header[5] & FLAG_EOS != 0
    }

    pub fn granule_position(&self) -> i64 {
        i64::from_le_bytes(self.header[6..14].try_into().unwrap_or([0xFF; 8]))
    }

    pub fn serial_number(&self) -> u32 {
        u32::from_le_bytes(self.header[14..18].try_into().unwrap_or_default())
    }

    pub fn sequence_number(&self) -> u32 {
        u32::from_le_bytes(self.header[18..22].try_into().unwrap_or_default())
    }

    pub fn segment_table(&self) -> &[u8] {
        &self.header[PAGE_HEADER_FIXED_LEN..]
    }

    pub fn header_len(&self) -> usize {
        self.header.len()
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Total number of bytes this page occupied in the byte stream.
    pub fn len(&self) -> usize {
        self.header.len() + self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
