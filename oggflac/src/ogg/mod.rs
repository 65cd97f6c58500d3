//! Ogg container primitives.
//!
//! The demuxer only reacts to the return codes of these types; they
//! follow the push model of the reference Ogg library: raw bytes go into a
//! [`sync::SyncState`], pages come out of it, pages go into a
//! [`stream::StreamState`] and packets come out of that.

/// Parsed page and header accessors.
pub mod page;

/// Packet reassembly for one logical stream.
pub mod stream;

/// Page framing, capture-pattern search and checksum validation.
pub mod sync;

pub use page::{MAX_PAGE_SIZE, Page};
pub use stream::{Packet, PacketOut, StreamState};
pub use sync::{PageOut, PageSeek, SyncState};
