//! Decoder read path.
//!
//! A FLAC decoder pulls bytes in whatever amounts fit its input buffer,
//! while Ogg delivers whole pages and packets. [`OggFlacDemuxer::read`]
//! bridges the two: it keeps at most one page and one partially consumed
//! packet between calls and fills the caller's buffer from them, pulling
//! more container data from the host only when both are exhausted.

use log::{debug, error, warn};

use super::OggFlacDemuxer;
use super::mapping::{HEADER_LENGTH, MappingHeader};
use crate::io::{HostIo, HostRead};
use crate::ogg::{Packet, PacketOut, PageOut};
use crate::utils::errors::DemuxError;

/// Minimum number of bytes requested from the host per refill.
pub const OGG_BYTES_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Ok,
    /// The source is exhausted. Only reported with zero bytes.
    EndOfStream,
    /// The current link is finished and the next link's first page is
    /// buffered. Only reported with zero bytes.
    EndOfLink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Bytes written to the front of the caller's buffer.
    pub bytes: usize,
    pub status: ReadStatus,
}

impl ReadOutcome {
    fn ok(bytes: usize) -> Self {
        Self {
            bytes,
            status: ReadStatus::Ok,
        }
    }

    fn terminal(status: ReadStatus) -> Self {
        Self { bytes: 0, status }
    }
}

/// A packet being copied out across several reads.
#[derive(Debug)]
pub(crate) struct WorkingPacket {
    packet: Packet,
    pos: usize,
}

impl WorkingPacket {
    fn remaining(&self) -> &[u8] {
        &self.packet.data[self.pos..]
    }

    fn is_drained(&self) -> bool {
        self.pos >= self.packet.data.len()
    }
}

impl OggFlacDemuxer {
    /// Fills `buffer` with native FLAC bytes.
    ///
    /// Returns `buffer.len()` bytes with [`ReadStatus::Ok`] unless the link
    /// or the stream ends first. A short count with [`ReadStatus::Ok`] means
    /// the remaining bytes are valid and the terminal condition will be
    /// reported by the next call.
    pub fn read<H: HostIo + ?Sized>(&mut self, io: &mut H, buffer: &mut [u8]) -> Result<ReadOutcome, DemuxError> {
        if std::mem::take(&mut self.lost_sync_pending) {
            return Err(DemuxError::LostSync);
        }

        let requested = buffer.len();
        let mut written = 0;

        while written < requested && !self.end_of_stream {
            if self.end_of_link && self.have_working_page {
                // Next link's first page is buffered, let the caller finish this one
                return Ok(if written > 0 {
                    ReadOutcome::ok(written)
                } else {
                    ReadOutcome::terminal(ReadStatus::EndOfLink)
                });
            }

            if !self.have_working_page {
                match self.sync.pageout() {
                    PageOut::Page(page) => self.process_page(io, &page)?,
                    PageOut::NeedMore if self.host_exhausted => self.end_of_stream = true,
                    PageOut::NeedMore => self.read_more_data(io, requested - written)?,
                    PageOut::Desync => return self.lost_sync(written),
                }
                continue;
            }

            let Some(working) = self.working_packet.as_mut() else {
                match self.stream.packetout() {
                    PacketOut::Packet(packet) => self.start_packet(packet)?,
                    PacketOut::Empty => self.have_working_page = false,
                    PacketOut::Hole => return self.lost_sync(written),
                }
                continue;
            };

            let remaining = working.remaining();
            let n = remaining.len().min(requested - written);
            buffer[written..written + n].copy_from_slice(&remaining[..n]);
            working.pos += n;
            written += n;

            if working.is_drained() {
                let eos = working.packet.eos;
                let granule_position = working.packet.granule_position;
                if eos && self.decode_chained_stream {
                    // Room for the next link before anything is consumed
                    self.links.ensure_capacity(self.current_link, self.current_link + 1)?;
                }
                self.working_packet = None;
                if eos {
                    self.end_of_logical_stream(io, granule_position)?;
                }
            }
        }

        if self.end_of_stream && written == 0 {
            self.links.link_mut(self.current_link).is_last = true;
            debug!("End of stream in link {}", self.current_link);
            self.debug_check_invariants();
            return Ok(ReadOutcome::terminal(ReadStatus::EndOfStream));
        }

        self.debug_check_invariants();
        Ok(ReadOutcome::ok(written))
    }

    /// Installs a new working packet, stripping the mapping header from the
    /// first header packet.
    fn start_packet(&mut self, packet: Packet) -> Result<(), DemuxError> {
        let mut pos = 0;
        if let Some(header) = MappingHeader::parse(&packet.data)? {
            debug!(
                "Ogg FLAC mapping {}.{}, {} header packets",
                header.version_major, header.version_minor, header.num_headers
            );
            self.version = Some((header.version_major, header.version_minor));
            pos = HEADER_LENGTH;
        }

        self.working_packet = Some(WorkingPacket { packet, pos });
        Ok(())
    }

    /// Handles the last packet of the FLAC logical stream.
    fn end_of_logical_stream<H: HostIo + ?Sized>(&mut self, io: &mut H, granule_position: i64) -> Result<(), DemuxError> {
        if !self.decode_chained_stream {
            self.end_of_stream = true;
            return Ok(());
        }

        self.links.ensure_capacity(self.current_link, self.current_link + 1)?;
        self.end_of_link = true;
        self.advance_read_link = self.current_link + 1;

        if self.current_link >= self.links.indexed() {
            let end_byte = io
                .tell()
                .ok()
                .map(|pos| pos.saturating_sub(self.sync.buffered() as u64));

            let details = self.links.link_mut(self.current_link);
            details.samples = granule_position.max(0) as u64;
            if let Some(end_byte) = end_byte {
                details.end_byte = end_byte;
            }
            debug!(
                "Link {} indexed: {} samples, end byte {}",
                self.current_link, details.samples, details.end_byte
            );

            self.links.mark_indexed();
            self.need_serial_number = true;
        }
        if !self.is_seeking {
            self.need_serial_number = true;
        }

        self.have_working_page = false;
        Ok(())
    }

    fn lost_sync(&mut self, written: usize) -> Result<ReadOutcome, DemuxError> {
        warn!("Lost sync in link {}", self.current_link);
        if written > 0 {
            self.lost_sync_pending = true;
            return Ok(ReadOutcome::ok(written));
        }
        Err(DemuxError::LostSync)
    }

    /// Pulls at least [`OGG_BYTES_CHUNK`] bytes from the host into the sync buffer.
    pub(crate) fn read_more_data<H: HostIo + ?Sized>(&mut self, io: &mut H, bytes_requested: usize) -> Result<(), DemuxError> {
        let to_read = bytes_requested.max(OGG_BYTES_CHUNK);
        let window = self
            .sync
            .buffer(to_read)
            .map_err(|_| DemuxError::MemoryAllocation)?;

        let bytes_read = match io.read(window) {
            Ok(HostRead::Data(n)) => n,
            Ok(HostRead::EndOfStream(n)) => {
                self.host_exhausted = true;
                n
            }
            Err(err) => {
                error!("Host read failed: {err}");
                return Err(DemuxError::Aborted);
            }
        };

        self.sync.wrote(bytes_read)?;
        Ok(())
    }
}
