//! Ogg FLAC demultiplexer.
//!
//! [`OggFlacDemuxer`] owns the container state (sync buffer, stream
//! reassembler, link table) and borrows a [`crate::io::HostIo`] for every
//! operation that touches bytes. Reads are served by
//! [`OggFlacDemuxer::read`], whole links are skipped with
//! [`OggFlacDemuxer::skip_link`].
//!
//! ## Chained streams
//!
//! With chained decoding disabled the demuxer stops at the first
//! end-of-stream packet. With it enabled every link is played in turn: a
//! read that reaches the next link's first page reports
//! [`read::ReadStatus::EndOfLink`], and the caller resumes with
//! [`OggFlacDemuxer::next_link`] after resetting its decoder.

use log::{debug, trace};

use crate::io::HostIo;
use crate::ogg::{StreamState, SyncState};
use crate::utils::errors::DemuxError;

pub mod link;
pub mod mapping;
mod page;
pub mod read;
pub mod reader;
pub mod skip;

pub use link::{LinkDetails, LinkTable, TargetLink};
pub use read::{ReadOutcome, ReadStatus};
pub use reader::FlacByteReader;
pub use skip::SkipStatus;

use read::WorkingPacket;

/// Demuxer configuration, fixed before the first read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxerConfig {
    /// Lock onto this serial number instead of the first FLAC stream found.
    pub serial_number: Option<u32>,
    /// Play every link of a chained file instead of stopping after the first.
    pub decode_chained_stream: bool,
}

#[derive(Debug)]
pub struct OggFlacDemuxer {
    use_first_serial_number: bool,
    serial_number: u32,
    decode_chained_stream: bool,

    stream: StreamState,
    sync: SyncState,
    /// Mapping version of the most recent first header packet.
    version: Option<(u8, u8)>,

    need_serial_number: bool,
    /// Set while the beginning-of-stream pages of a link may still arrive.
    beginning_of_link: bool,
    bos_flag_seen: bool,
    end_of_stream: bool,
    /// The host has no more bytes. Pages already buffered are still served.
    host_exhausted: bool,
    end_of_link: bool,
    have_working_page: bool,
    working_packet: Option<WorkingPacket>,
    is_seeking: bool,
    /// Sync was lost after bytes had already been handed out.
    lost_sync_pending: bool,

    links: LinkTable,
    current_link: usize,
    advance_read_link: usize,
}

impl Default for OggFlacDemuxer {
    fn default() -> Self {
        Self::new(DemuxerConfig::default())
    }
}

impl OggFlacDemuxer {
    pub fn new(config: DemuxerConfig) -> Self {
        let mut demuxer = Self {
            use_first_serial_number: true,
            serial_number: 0,
            decode_chained_stream: false,
            stream: StreamState::default(),
            sync: SyncState::default(),
            version: None,
            need_serial_number: true,
            beginning_of_link: true,
            bos_flag_seen: false,
            end_of_stream: false,
            host_exhausted: false,
            end_of_link: false,
            have_working_page: false,
            working_packet: None,
            is_seeking: false,
            lost_sync_pending: false,
            links: LinkTable::default(),
            current_link: 0,
            advance_read_link: 0,
        };
        demuxer.apply_config(config);
        demuxer
    }

    fn apply_config(&mut self, config: DemuxerConfig) {
        self.use_first_serial_number = config.serial_number.is_none();
        self.serial_number = config.serial_number.unwrap_or_default();
        self.decode_chained_stream = config.decode_chained_stream;
        self.need_serial_number = self.use_first_serial_number || self.decode_chained_stream;
        self.stream.reset_serialno(self.serial_number);
    }

    pub fn config(&self) -> DemuxerConfig {
        DemuxerConfig {
            serial_number: (!self.use_first_serial_number).then_some(self.serial_number),
            decode_chained_stream: self.decode_chained_stream,
        }
    }

    /// Locks onto one serial number. Takes effect before the first read.
    pub fn set_serial_number(&mut self, serial_number: u32) {
        self.apply_config(DemuxerConfig {
            serial_number: Some(serial_number),
            ..self.config()
        });
    }

    pub fn set_decode_chained_stream(&mut self, value: bool) {
        self.apply_config(DemuxerConfig {
            decode_chained_stream: value,
            ..self.config()
        });
    }

    pub fn decode_chained_stream(&self) -> bool {
        self.decode_chained_stream
    }

    /// Restores the default configuration: first serial number, single link.
    pub fn set_defaults(&mut self) {
        self.apply_config(DemuxerConfig::default());
    }

    /// Serial number of the FLAC stream currently being read.
    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    /// Mapping version `(major, minor)` of the most recent first header packet.
    pub fn mapping_version(&self) -> Option<(u8, u8)> {
        self.version
    }

    pub fn links(&self) -> &LinkTable {
        &self.links
    }

    pub fn current_link(&self) -> usize {
        self.current_link
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn is_end_of_link(&self) -> bool {
        self.end_of_link
    }

    /// Discards buffered container data, e.g. after the host moved the read
    /// position. Link bookkeeping is kept.
    pub fn flush(&mut self) {
        self.stream.reset_serialno(self.serial_number);
        self.sync.reset();
        self.end_of_stream = false;
        self.host_exhausted = false;
        self.end_of_link = false;
        self.have_working_page = false;
        self.working_packet = None;
        self.lost_sync_pending = false;
    }

    /// Returns to the state of a freshly configured demuxer.
    pub fn reset(&mut self) {
        self.flush();
        self.version = None;
        self.need_serial_number = self.use_first_serial_number || self.decode_chained_stream;
        self.beginning_of_link = true;
        self.bos_flag_seen = false;
        self.is_seeking = false;
        self.current_link = 0;
        self.advance_read_link = 0;
        trace!("Demuxer reset");
    }

    /// Moves on to the next link after [`read::ReadStatus::EndOfLink`].
    ///
    /// Fails with [`DemuxError::MemoryAllocation`], changing nothing, if the
    /// link table cannot grow to hold the next link.
    pub fn next_link(&mut self) -> Result<(), DemuxError> {
        let next = self.current_link + 1;
        self.links.ensure_capacity(next, self.advance_read_link.max(next))?;

        self.end_of_link = false;
        self.current_link = next;
        self.advance_read_link = self.advance_read_link.max(next);
        self.beginning_of_link = true;
        self.bos_flag_seen = false;
        debug!("Advancing to link {next}");

        Ok(())
    }

    /// Finds the indexed link containing `target_sample`.
    pub fn find_link_for_sample(&self, target_sample: u64) -> Option<TargetLink> {
        self.links.find_link_for_sample(target_sample)
    }

    /// Enters seeking mode for `target`, or leaves it when `None`.
    ///
    /// In seeking mode reaching the end of an already indexed link does not
    /// unlock the serial number, so the demuxer keeps reading the target
    /// link's pages.
    pub fn set_seek_parameters(&mut self, target: Option<&TargetLink>) {
        match target {
            Some(target) => {
                self.is_seeking = true;
                self.current_link = target.link_number;
                self.advance_read_link = target.link_number;
                self.serial_number = target.serial_number;
                self.need_serial_number = false;
                self.stream.reset_serialno(target.serial_number);
            }
            None => self.is_seeking = false,
        }
    }

    /// Positions the host at the start of `target` and locks onto its serial
    /// number. Seeking mode stays on until the caller clears it.
    pub fn seek_to_link<H: HostIo + ?Sized>(&mut self, io: &mut H, target: &TargetLink) -> Result<(), DemuxError> {
        if !io.is_seekable() {
            return Err(DemuxError::CallbacksNonfunctional);
        }
        io.seek(target.start_byte)?;

        self.flush();
        self.set_seek_parameters(Some(target));
        self.beginning_of_link = true;
        self.bos_flag_seen = true;
        debug!(
            "Seeked to link {} at byte {}",
            target.link_number, target.start_byte
        );

        Ok(())
    }

    fn debug_check_invariants(&self) {
        debug_assert!(self.links.indexed() <= self.links.detected());
        debug_assert!(self.links.detected() <= self.links.allocated());
        debug_assert!(self.current_link <= self.advance_read_link);
        debug_assert!(self.working_packet.is_none() || self.have_working_page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_round_trips() {
        let mut demuxer = OggFlacDemuxer::default();
        assert_eq!(demuxer.config(), DemuxerConfig::default());

        demuxer.set_serial_number(42);
        demuxer.set_decode_chained_stream(true);
        assert_eq!(
            demuxer.config(),
            DemuxerConfig {
                serial_number: Some(42),
                decode_chained_stream: true,
            }
        );
        assert_eq!(demuxer.serial_number(), 42);

        demuxer.set_defaults();
        assert_eq!(demuxer.config(), DemuxerConfig::default());
        assert!(!demuxer.decode_chained_stream());
    }

    #[test]
    fn seek_parameters_select_link() {
        let mut demuxer = OggFlacDemuxer::default();
        let target = TargetLink {
            link_number: 2,
            serial_number: 0xBEEF,
            start_byte: 4000,
            end_byte: 6000,
            samples_in_preceding_links: 100,
            samples_this_link: 50,
        };

        demuxer.set_seek_parameters(Some(&target));
        assert_eq!(demuxer.current_link(), 2);
        assert_eq!(demuxer.serial_number(), 0xBEEF);

        demuxer.set_seek_parameters(None);
        demuxer.reset();
        assert_eq!(demuxer.current_link(), 0);
    }

    #[test]
    fn next_link_grows_table_past_initial_capacity() -> Result<(), DemuxError> {
        let mut demuxer = OggFlacDemuxer::new(DemuxerConfig {
            decode_chained_stream: true,
            ..Default::default()
        });
        assert_eq!(demuxer.links().allocated(), 4);

        for _ in 0..9 {
            demuxer.next_link()?;
            assert!(demuxer.current_link() < demuxer.links().allocated());
        }
        assert_eq!(demuxer.current_link(), 9);
        assert_eq!(demuxer.links().allocated(), 16);

        // The first FLAC page found is recorded in the current link's slot
        let link = crate::test_util::flac_link(3, 100, 2, 50);
        let mut host = crate::test_util::MemoryHost::new(link.bytes);
        let mut buf = [0u8; 4096];
        let outcome = demuxer.read(&mut host, &mut buf)?;
        assert_eq!(&buf[..outcome.bytes], link.payload.as_slice());
        assert_eq!(demuxer.links()[9].serial_number, 3);
        Ok(())
    }
}
