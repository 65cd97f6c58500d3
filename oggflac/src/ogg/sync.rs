use log::trace;

use crate::ogg::page::{CAPTURE_PATTERN, PAGE_HEADER_FIXED_LEN, Page};
use crate::utils::crc::ogg_page_crc;
use crate::utils::errors::SyncError;

const BUFFER_SLACK: usize = 4096;

/// Result of a single page-seek step.
#[derive(Debug, PartialEq, Eq)]
pub enum PageSeek {
    /// A complete, checksum-valid page was found at the read position.
    Page(Page),
    /// The buffered bytes end in the middle of a page (or are too short to tell).
    NeedMore,
    /// No page starts at the read position; this many bytes were skipped.
    Skipped(usize),
}

/// Result of asking for the next page.
#[derive(Debug, PartialEq, Eq)]
pub enum PageOut {
    Page(Page),
    NeedMore,
    /// Bytes had to be skipped to find a capture pattern. Reported once per
    /// loss of sync; the following calls keep scanning silently.
    Desync,
}

/// Accumulates raw container bytes and carves complete pages out of them.
///
/// Bytes are written through [`SyncState::buffer`] and [`SyncState::wrote`]
/// (or [`SyncState::push_bytes`]) and consumed by [`SyncState::pageout`] or
/// [`SyncState::pageseek`]. Consumed bytes are only discarded when more
/// space is requested, so [`SyncState::buffered`] always reports how far the
/// host read position is ahead of the next unconsumed byte.
#[derive(Debug, Default)]
pub struct SyncState {
    data: Vec<u8>,
    fill: usize,
    returned: usize,
    unsynced: bool,
}

impl SyncState {
    /// Exposes a writable window of at least `size` bytes at the fill position.
    pub fn buffer(&mut self, size: usize) -> Result<&mut [u8], SyncError> {
        if self.returned > 0 {
            self.data.copy_within(self.returned..self.fill, 0);
            self.fill -= self.returned;
            self.returned = 0;
        }

        let needed = self.fill + size;
        if self.data.len() < needed {
            let grow = needed + BUFFER_SLACK - self.data.len();
            self.data
                .try_reserve_exact(grow)
                .map_err(|_| SyncError::Allocation(grow))?;
            self.data.resize(needed + BUFFER_SLACK, 0);
        }

        Ok(&mut self.data[self.fill..needed])
    }

    /// Commits `bytes` written into the window returned by [`SyncState::buffer`].
    pub fn wrote(&mut self, bytes: usize) -> Result<(), SyncError> {
        let available = self.data.len() - self.fill;
        if bytes > available {
            return Err(SyncError::Overrun {
                written: bytes,
                available,
            });
        }

        self.fill += bytes;
        Ok(())
    }

    /// Appends raw bitstream data to the sync buffer.
    pub fn push_bytes(&mut self, data: &[u8]) -> Result<(), SyncError> {
        self.buffer(data.len())?.copy_from_slice(data);
        self.wrote(data.len())
    }

    /// Bytes written but not yet consumed as pages.
    pub fn buffered(&self) -> usize {
        self.fill - self.returned
    }

    pub fn reset(&mut self) {
        self.fill = 0;
        self.returned = 0;
        self.unsynced = false;
    }

    /// Tries to take one page from the current read position.
    pub fn pageseek(&mut self) -> PageSeek {
        let window = &self.data[self.returned..self.fill];

        if window.len() < PAGE_HEADER_FIXED_LEN {
            return PageSeek::NeedMore;
        }

        'sync: {
            if &window[..4] != CAPTURE_PATTERN {
                break 'sync;
            }

            let header_len = PAGE_HEADER_FIXED_LEN + window[26] as usize;
            if window.len() < header_len {
                return PageSeek::NeedMore;
            }

            let body_len = window[PAGE_HEADER_FIXED_LEN..header_len]
                .iter()
                .map(|&v| v as usize)
                .sum::<usize>();
            if window.len() < header_len + body_len {
                return PageSeek::NeedMore;
            }

            let mut header = window[..header_len].to_vec();
            let body = &window[header_len..header_len + body_len];

            let stored = u32::from_le_bytes([header[22], header[23], header[24], header[25]]);
            header[22..26].fill(0);
            if ogg_page_crc(&header, body) != stored {
                trace!("Page checksum mismatch at buffer offset {}", self.returned);
                break 'sync;
            }
            header[22..26].copy_from_slice(&stored.to_le_bytes());

            let page = Page {
                header,
                body: body.to_vec(),
            };

            self.unsynced = false;
            self.returned += page.len();
            return PageSeek::Page(page);
        }

        // Skip to the next candidate capture pattern, or past everything buffered
        let skip = window[1..]
            .iter()
            .position(|&b| b == CAPTURE_PATTERN[0])
            .map_or(window.len(), |pos| pos + 1);
        self.returned += skip;

        PageSeek::Skipped(skip)
    }

    /// Returns the next page, scanning past garbage as needed.
    pub fn pageout(&mut self) -> PageOut {
        loop {
            match self.pageseek() {
                PageSeek::Page(page) => return PageOut::Page(page),
                PageSeek::NeedMore => return PageOut::NeedMore,
                PageSeek::Skipped(skipped) => {
                    if !self.unsynced {
                        self.unsynced = true;
                        trace!("Lost page sync, skipped {skipped} bytes");
                        return PageOut::Desync;
                    }
                }
            }
        }
    }
}
