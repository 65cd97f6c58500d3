//! Ogg FLAC mapping header.
//!
//! The first packet of the FLAC logical stream starts with
//!
//! ```text
//! 0x7F | "FLAC" | major | minor | header count (u16 BE)
//! ```
//!
//! followed by the native `fLaC` signature and the STREAMINFO block. The
//! 9 mapping bytes are stripped before the packet is handed to the decoder.

use crate::utils::errors::DemuxError;

pub const PACKET_TYPE: u8 = 0x7F;
pub const MAGIC: &[u8; 4] = b"FLAC";

pub const PACKET_TYPE_LENGTH: usize = 1;
pub const MAGIC_LENGTH: usize = 4;
pub const VERSION_MAJOR_LENGTH: usize = 1;
pub const VERSION_MINOR_LENGTH: usize = 1;
pub const NUM_HEADERS_LENGTH: usize = 2;

/// Bytes stripped from the front of the first header packet.
pub const HEADER_LENGTH: usize =
    PACKET_TYPE_LENGTH + MAGIC_LENGTH + VERSION_MAJOR_LENGTH + VERSION_MINOR_LENGTH + NUM_HEADERS_LENGTH;

pub const SUPPORTED_VERSION_MAJOR: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingHeader {
    pub version_major: u8,
    pub version_minor: u8,
    /// Number of header packets following this one; 0 means unknown.
    pub num_headers: u16,
}

impl MappingHeader {
    /// True if a page body starts with the first header packet signature.
    pub fn is_first_header_page(body: &[u8]) -> bool {
        body.len() > PACKET_TYPE_LENGTH + MAGIC_LENGTH
            && body[0] == PACKET_TYPE
            && &body[PACKET_TYPE_LENGTH..PACKET_TYPE_LENGTH + MAGIC_LENGTH] == MAGIC
    }

    /// Parses the mapping header of a packet.
    ///
    /// Returns `Ok(None)` for packets that are not a first header packet.
    pub fn parse(packet: &[u8]) -> Result<Option<Self>, DemuxError> {
        if packet.first() != Some(&PACKET_TYPE) {
            return Ok(None);
        }
        if packet.len() < HEADER_LENGTH || &packet[PACKET_TYPE_LENGTH..PACKET_TYPE_LENGTH + MAGIC_LENGTH] != MAGIC {
            return Err(DemuxError::NotFlac);
        }

        let version_major = packet[5];
        let version_minor = packet[6];
        if version_major != SUPPORTED_VERSION_MAJOR {
            return Err(DemuxError::UnsupportedMappingVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        Ok(Some(Self {
            version_major,
            version_minor,
            num_headers: u16::from_be_bytes([packet[7], packet[8]]),
        }))
    }
}
