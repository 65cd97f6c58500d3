#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! An Ogg physical stream is a sequence of pages. Each page belongs to one
//! logical stream, identified by a serial number, and carries segments of
//! that stream's packets. A chained file concatenates several physical
//! streams ("links"), each one starting with beginning-of-stream pages and
//! ending with an end-of-stream page.
//!
//! The first packet of an Ogg FLAC logical stream starts with a 9 byte
//! mapping header (`0x7F "FLAC"`, version, header count) followed by the
//! native `fLaC` signature and STREAMINFO block. Every later packet is
//! either a metadata block or a FLAC frame.
//!
//! ## Processing
//!
//! 1. [`ogg::SyncState`] carves checksum-valid pages out of raw bytes
//! 2. [`ogg::StreamState`] reassembles packets of the selected serial number
//! 3. [`demux::OggFlacDemuxer`] strips the mapping header, tracks link
//!    boundaries and serves decoder reads
//! 4. [`demux::OggFlacDemuxer::skip_link`] jumps over whole links

/// Ogg container framing.
///
/// - **Pages** ([`ogg::page`]): Page header accessors
/// - **Sync** ([`ogg::sync`]): Capture pattern search and page validation
/// - **Stream** ([`ogg::stream`]): Packet reassembly for one serial number
pub mod ogg;

/// Ogg FLAC demultiplexing.
///
/// - **Links** ([`demux::link`]): Link table and sample lookup
/// - **Mapping** ([`demux::mapping`]): Ogg FLAC first header packet
/// - **Read** ([`demux::read`]): Decoder read path
/// - **Skip** ([`demux::skip`]): Link skipping and bisection
/// - **Reader** ([`demux::reader`]): `std::io::Read` adapter
pub mod demux;

/// Host byte source seam.
pub mod io;

/// FLAC metadata structures.
pub mod structs;

/// Utility functions and supporting infrastructure.
///
/// - **Bitstream I/O** ([`utils::bitstream_io`]): Bit-level reading
/// - **CRC Validation** ([`utils::crc`]): Page checksums
/// - **Error Handling** ([`utils::errors`]): Error types
pub mod utils;

#[cfg(test)]
pub(crate) mod test_util;
