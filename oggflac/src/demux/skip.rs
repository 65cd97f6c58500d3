//! Link skipping.
//!
//! Skipping the current link needs its end offset. For an indexed link
//! that offset is known and a single seek suffices. Otherwise the end is
//! searched for by bisection over the byte range between the current
//! position and the end of the stream: every probe lands on a page, and
//! the page's serial number tells on which side of the link boundary it
//! lies. Once the bracket is narrower than a page the search reads forward
//! until the link's end-of-stream page shows up, then carries on to the
//! next link's first header page.

use log::{debug, trace};

use super::OggFlacDemuxer;
use crate::io::HostIo;
use crate::ogg::{MAX_PAGE_SIZE, Page, PageSeek};
use crate::utils::errors::DemuxError;

/// Smallest FLAC frame. No link boundary can hide in a narrower bracket.
pub const MIN_FRAME_SIZE: u64 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStatus {
    /// Positioned at the first page of the next link.
    Ok,
    /// The skipped link was the last one.
    EndOfStream,
}

/// Bisection bracket and the flags steering the next probe.
#[derive(Debug)]
struct Bisection {
    left_pos: u64,
    right_pos: u64,
    current_pos: u64,
    keep_reading: bool,
    seek_to_left_pos: bool,
    /// The current link's own first header page must be found before the
    /// next link's.
    find_bos_twice: bool,
}

impl OggFlacDemuxer {
    /// Skips the rest of the current link.
    ///
    /// The host must support seek, tell and length. On
    /// [`SkipStatus::Ok`] the demuxer is positioned at the start of the
    /// next link and [`OggFlacDemuxer::current_link`] has advanced.
    pub fn skip_link<H: HostIo + ?Sized>(&mut self, io: &mut H) -> Result<SkipStatus, DemuxError> {
        if !io.is_seekable() {
            return Err(DemuxError::CallbacksNonfunctional);
        }
        self.links.ensure_capacity(self.current_link, self.advance_read_link)?;

        let status = if self.current_link < self.links.indexed() {
            self.skip_indexed_link(io)
        } else {
            self.bisect_link_end(io)
        };

        self.debug_check_invariants();
        status
    }

    fn skip_indexed_link<H: HostIo + ?Sized>(&mut self, io: &mut H) -> Result<SkipStatus, DemuxError> {
        let link = &self.links[self.current_link];
        let (is_last, end_byte) = (link.is_last, link.end_byte);

        if is_last {
            let length = io.length()?;
            io.seek(length)?;
            debug!("Link {} is the last one, seeked to end of stream", self.current_link);
            return Ok(SkipStatus::EndOfStream);
        }

        let next = self.current_link + 1;
        self.links.ensure_capacity(next, next)?;
        io.seek(end_byte)?;
        self.flush();
        self.beginning_of_link = true;
        self.need_serial_number = true;
        self.bos_flag_seen = false;
        self.current_link = next;
        self.advance_read_link = next;
        debug!("Skipped to link {} at byte {end_byte}", self.current_link);

        Ok(SkipStatus::Ok)
    }

    fn bisect_link_end<H: HostIo + ?Sized>(&mut self, io: &mut H) -> Result<SkipStatus, DemuxError> {
        let stream_length = io.length()?;
        let current_pos = io.tell()?.saturating_sub(self.sync.buffered() as u64);

        let mut search = Bisection {
            left_pos: current_pos,
            right_pos: stream_length,
            current_pos,
            keep_reading: false,
            seek_to_left_pos: false,
            find_bos_twice: self.need_serial_number,
        };
        debug!(
            "Searching end of link {} between byte {current_pos} and {stream_length}",
            self.current_link
        );

        loop {
            if search.right_pos <= search.left_pos || search.right_pos - search.left_pos < MIN_FRAME_SIZE {
                return Err(DemuxError::BisectionExhausted {
                    left: search.left_pos,
                    right: search.right_pos,
                });
            }
            let mut target_pos = search.left_pos + (search.right_pos - search.left_pos) / 2;

            let buffered = self.sync.buffered() as u64;
            let ahead = search.current_pos < target_pos;
            let did_a_seek = if search.keep_reading
                || (ahead && search.current_pos + buffered > target_pos)
                || (ahead && search.current_pos + (MAX_PAGE_SIZE as u64) > target_pos)
                || self.beginning_of_link
            {
                false
            } else {
                if search.seek_to_left_pos || target_pos - search.left_pos < MAX_PAGE_SIZE as u64 {
                    target_pos = search.left_pos;
                    search.keep_reading = true;
                    search.seek_to_left_pos = false;
                }
                io.seek(target_pos)?;
                search.current_pos = target_pos;
                self.stream.reset();
                self.sync.reset();
                self.end_of_stream = false;
                self.host_exhausted = false;
                true
            };
            trace!(
                "Bisection [{}, {}) probe {target_pos}, seek {did_a_seek}",
                search.left_pos, search.right_pos
            );

            let Some(page) = self.seek_page(io, &mut search.current_pos)? else {
                if self.beginning_of_link && !self.bos_flag_seen {
                    // Looked for the next link, found the end of the stream
                    return self.step_back_to_last_link();
                }
                if did_a_seek {
                    // No page starts at or after the probe, but the page
                    // holding it may be the one we are after
                    search.right_pos = (target_pos + MIN_FRAME_SIZE).min(search.right_pos);
                    continue;
                }
                return Err(DemuxError::UnexpectedEndOfStream);
            };

            let page_pos = search.current_pos;
            search.current_pos += page.len() as u64;

            if self.beginning_of_link {
                let need_to_finish = self.need_serial_number && !search.find_bos_twice;
                self.process_page(io, &page)?;
                if !self.need_serial_number {
                    if need_to_finish {
                        debug!("Link {} starts at byte {page_pos}", self.current_link);
                        return Ok(SkipStatus::Ok);
                    }
                    search.find_bos_twice = false;
                }
                if !self.beginning_of_link {
                    search.left_pos = page_pos;
                }
                continue;
            }

            let serial_number = page.serial_number();
            let link = &self.links[self.current_link];
            let own_serial = serial_number == link.serial_number;
            let belongs = link.has_serial_number(serial_number);

            if own_serial && page.is_eos() && self.current_link < self.links.detected() {
                self.record_link_end(&page, search.current_pos)?;
                self.next_link()?;
                continue;
            }

            if belongs {
                if own_serial {
                    search.left_pos = search.current_pos;
                    search.keep_reading = false;
                } else {
                    // A sibling's pages may continue past this link's end
                    search.seek_to_left_pos = true;
                }
            } else if search.keep_reading {
                search.left_pos = search.current_pos;
            } else if did_a_seek {
                if search.right_pos <= page_pos {
                    search.seek_to_left_pos = true;
                } else {
                    search.right_pos = page_pos;
                }
            } else {
                return Err(DemuxError::UnknownSerialNumber(serial_number));
            }
        }
    }

    /// Takes the next page at or after the read position, refilling from
    /// the host as needed. `None` once the host is exhausted.
    fn seek_page<H: HostIo + ?Sized>(&mut self, io: &mut H, current_pos: &mut u64) -> Result<Option<Page>, DemuxError> {
        loop {
            match self.sync.pageseek() {
                PageSeek::Page(page) => return Ok(Some(page)),
                PageSeek::Skipped(skipped) => *current_pos += skipped as u64,
                PageSeek::NeedMore if self.host_exhausted => return Ok(None),
                PageSeek::NeedMore => self.read_more_data(io, 0)?,
            }
        }
    }

    fn record_link_end(&mut self, eos_page: &Page, end_byte: u64) -> Result<(), DemuxError> {
        self.links.ensure_capacity(self.current_link, self.current_link + 1)?;

        let link = self.links.link_mut(self.current_link);
        link.end_byte = end_byte;
        link.samples = eos_page.granule_position().max(0) as u64;
        debug!(
            "Link {} indexed: {} samples, end byte {end_byte}",
            self.current_link, link.samples
        );

        self.links.mark_indexed();
        self.advance_read_link = self.current_link + 1;
        self.need_serial_number = true;

        Ok(())
    }

    fn step_back_to_last_link(&mut self) -> Result<SkipStatus, DemuxError> {
        if self.current_link == 0 {
            return Err(DemuxError::LostSync);
        }
        self.current_link -= 1;
        self.links.link_mut(self.current_link).is_last = true;
        debug!("Link {} is the last one", self.current_link);

        Ok(SkipStatus::EndOfStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{DemuxerConfig, ReadStatus};
    use crate::io::StreamSource;
    use crate::test_util::{MemoryHost, PageWriter, TestLink, flac_link, muxed_flac_link};

    fn chained() -> OggFlacDemuxer {
        OggFlacDemuxer::new(DemuxerConfig {
            decode_chained_stream: true,
            ..Default::default()
        })
    }

    fn concat(links: &[TestLink]) -> Vec<u8> {
        links.iter().flat_map(|l| l.bytes.iter().copied()).collect()
    }

    #[test]
    fn skip_uses_index_then_bisects() {
        let links = [flac_link(0x1000, 1000, 10, 300), flac_link(0x2000, 2000, 10, 300)];
        let total = (links[0].bytes.len() + links[1].bytes.len()) as u64;
        let mut host = MemoryHost::new(concat(&links));
        let mut demuxer = chained();

        // Play link 0 to its end
        let mut out = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let outcome = demuxer.read(&mut host, &mut buf).unwrap();
            out.extend_from_slice(&buf[..outcome.bytes]);
            if outcome.status == ReadStatus::EndOfLink {
                break;
            }
            assert_eq!(outcome.status, ReadStatus::Ok);
        }
        assert_eq!(out, links[0].payload);
        assert_eq!(demuxer.links().indexed(), 1);
        assert_eq!(demuxer.links()[0].end_byte, links[0].bytes.len() as u64);
        assert_eq!(demuxer.links()[0].samples, 1000);

        // Link 0 is indexed: one seek, no length query
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);
        assert_eq!(host.seeks, [links[0].bytes.len() as u64]);
        assert_eq!(host.length_calls, 0);
        assert_eq!(demuxer.current_link(), 1);

        // Link 1 is not indexed: search runs off the end of the stream
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::EndOfStream);
        assert_eq!(demuxer.current_link(), 1);
        let last = &demuxer.links()[1];
        assert!(last.is_last);
        assert_eq!(last.serial_number, 0x2000);
        assert_eq!(last.start_byte, links[0].bytes.len() as u64);
        assert_eq!(last.end_byte, total);
        assert_eq!(last.samples, 2000);
        assert_eq!(demuxer.links().indexed(), 2);

        // Indexed last link: straight to the end
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::EndOfStream);
        assert_eq!(host.seeks.last(), Some(&total));
    }

    #[test]
    fn bisection_indexes_large_chain() {
        let links = [
            flac_link(11, 300 * 4096, 300, 1000),
            flac_link(22, 200 * 4096, 200, 1500),
            flac_link(33, 250 * 4096, 250, 800),
        ];
        let mut host = MemoryHost::chunked(concat(&links), 5000);
        let mut demuxer = chained();

        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);
        assert_eq!(demuxer.current_link(), 1);
        assert!(!host.seeks.is_empty());
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);
        assert_eq!(demuxer.current_link(), 2);
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::EndOfStream);
        assert_eq!(demuxer.current_link(), 2);

        let table = demuxer.links();
        assert_eq!(table.detected(), 3);
        assert_eq!(table.indexed(), 3);

        let mut start = 0u64;
        for (details, link) in table.indexed_links().iter().zip(&links) {
            assert_eq!(details.serial_number, link.serial);
            assert_eq!(details.start_byte, start);
            assert_eq!(details.end_byte, start + link.bytes.len() as u64);
            assert_eq!(details.samples, link.samples);
            start = details.end_byte;
        }
        assert!(table[2].is_last);
        assert!(!table[0].is_last);

        let target = demuxer.find_link_for_sample(300 * 4096 + 5).unwrap();
        assert_eq!(target.link_number, 1);
        assert_eq!(target.serial_number, 22);
        assert_eq!(target.samples_in_preceding_links, 300 * 4096);
    }

    #[test]
    fn bisection_steps_over_multiplexed_streams() {
        let links = [
            muxed_flac_link(11, 101, 120 * 4096, 120, 1500),
            muxed_flac_link(22, 102, 90 * 4096, 90, 1800),
            muxed_flac_link(33, 103, 150 * 4096, 150, 1200),
        ];
        let mut host = MemoryHost::chunked(concat(&links), 5000);
        let mut demuxer = chained();

        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);
        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::EndOfStream);
        assert!(!host.seeks.is_empty());

        let table = demuxer.links();
        assert_eq!(table.indexed(), 3);

        let mut start = 0u64;
        for ((details, link), sibling) in table.indexed_links().iter().zip(&links).zip([101u32, 102, 103]) {
            assert_eq!(details.serial_number, link.serial);
            assert_eq!(details.other_serial_numbers, [sibling]);
            assert_eq!(details.start_byte, start);
            assert_eq!(details.end_byte, start + link.bytes.len() as u64);
            assert_eq!(details.samples, link.samples);
            start = details.end_byte;
        }
        assert!(table[2].is_last);
    }

    #[test]
    fn unrelated_stream_after_link_is_unknown() {
        let header = crate::test_util::first_header_packet(300, 1);
        let mut flac = PageWriter::new(5, 0);
        let mut data = flac.write(&[(header.as_slice(), 0)], 255, crate::test_util::FLAG_BOS);
        data.extend(flac.write(&[(&b"\x84\x00\x00\x00"[..], 0)], 255, 0));
        for granule in [100, 200, 300] {
            data.extend(flac.write(&[(&[0xFF, 0xF8, 0x01, 0x02][..], granule)], 255, 0));
        }

        // No end-of-stream page, straight into another stream's pages
        let mut other = PageWriter::new(77, 10);
        for granule in 0..3 {
            data.extend(other.write(&[(&[0x22; 200][..], granule)], 255, 0));
        }

        let mut host = MemoryHost::new(data);
        let mut demuxer = chained();
        assert!(matches!(
            demuxer.skip_link(&mut host),
            Err(DemuxError::UnknownSerialNumber(77))
        ));
        assert!(host.seeks.is_empty());
    }

    #[test]
    fn skipped_link_can_be_read() {
        let links = [flac_link(1, 500, 5, 400), flac_link(2, 700, 7, 400)];
        let mut host = MemoryHost::new(concat(&links));
        let mut demuxer = chained();

        assert_eq!(demuxer.skip_link(&mut host).unwrap(), SkipStatus::Ok);

        let mut out = Vec::new();
        let mut buf = [0u8; 512];
        loop {
            let outcome = demuxer.read(&mut host, &mut buf).unwrap();
            out.extend_from_slice(&buf[..outcome.bytes]);
            if outcome.status == ReadStatus::EndOfStream {
                break;
            }
        }
        assert_eq!(out, links[1].payload);
        assert_eq!(demuxer.links().indexed(), 2);
    }

    #[test]
    fn truncated_link_end_is_an_error() {
        let link = flac_link(1, 100, 1, 100);
        let len = link.bytes.len() as u64;
        let mut data = link.bytes;
        data.truncate(data.len() - 4);
        let mut host = MemoryHost::new(data);
        let mut demuxer = chained();

        // Header and comment pages read; the truncated EOS page never completes
        let err = demuxer.skip_link(&mut host).unwrap_err();
        assert!(
            matches!(
                err,
                DemuxError::UnexpectedEndOfStream | DemuxError::BisectionExhausted { .. }
            ),
            "{err:?} for {len} byte link"
        );
    }

    #[test]
    fn forward_only_host_cannot_skip() {
        let link = flac_link(1, 100, 1, 100);
        let mut host = StreamSource::new(link.bytes.as_slice());
        let mut demuxer = chained();
        assert!(matches!(
            demuxer.skip_link(&mut host),
            Err(DemuxError::CallbacksNonfunctional)
        ));
    }

    #[test]
    fn bracket_below_one_frame_is_exhausted() {
        let mut host = MemoryHost::new(vec![0u8; 8]);
        let mut demuxer = chained();
        assert!(matches!(
            demuxer.skip_link(&mut host),
            Err(DemuxError::BisectionExhausted { left: 0, right: 8 })
        ));
    }

    #[test]
    fn nothing_to_skip_at_start_of_empty_stream() {
        let mut host = MemoryHost::new(Vec::new());
        let mut demuxer = chained();
        assert!(matches!(
            demuxer.skip_link(&mut host),
            Err(DemuxError::BisectionExhausted { left: 0, right: 0 })
        ));
    }
}
