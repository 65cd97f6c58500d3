//! Per-link bookkeeping for chained streams.
//!
//! A link is one logical FLAC stream inside a chain of concatenated Ogg
//! physical streams. Links are numbered from 0 in file order. A link is
//! *detected* once its first header page has been seen and *indexed* once
//! its end-of-stream page has been seen, which fixes its byte span and
//! sample count.

use std::collections::TryReserveError;

use log::debug;

/// Number of link slots allocated up front.
pub const INITIAL_LINK_CAPACITY: usize = 4;

/// Sibling serial numbers are reserved in blocks of this size.
const SERIAL_NUMBER_BLOCK: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkDetails {
    /// Serial number of the FLAC logical stream.
    pub serial_number: u32,
    /// Offset of the link's first page.
    pub start_byte: u64,
    /// Offset one past the link's last page.
    pub end_byte: u64,
    /// Granule position of the end-of-stream page.
    pub samples: u64,
    /// Serial numbers of other logical streams multiplexed into this link.
    pub other_serial_numbers: Vec<u32>,
    /// Set when the link is known to be the final one in the file.
    pub is_last: bool,
}

impl LinkDetails {
    /// True if pages with `serial_number` belong to this link.
    pub fn has_serial_number(&self, serial_number: u32) -> bool {
        self.serial_number == serial_number || self.other_serial_numbers.contains(&serial_number)
    }
}

/// A link selected for a seek, with its position on the stream's sample axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLink {
    pub link_number: usize,
    pub serial_number: u32,
    pub start_byte: u64,
    pub end_byte: u64,
    pub samples_in_preceding_links: u64,
    pub samples_this_link: u64,
}

/// Growable table of link records.
///
/// Slots are zero-initialised on allocation. `indexed <= detected <=
/// allocated` holds at all times.
#[derive(Debug)]
pub struct LinkTable {
    links: Vec<LinkDetails>,
    detected: usize,
    indexed: usize,
}

impl Default for LinkTable {
    fn default() -> Self {
        Self {
            links: vec![LinkDetails::default(); INITIAL_LINK_CAPACITY],
            detected: 0,
            indexed: 0,
        }
    }
}

impl std::ops::Index<usize> for LinkTable {
    type Output = LinkDetails;

    fn index(&self, index: usize) -> &Self::Output {
        &self.links[index]
    }
}

impl LinkTable {
    /// Number of allocated slots.
    pub fn allocated(&self) -> usize {
        self.links.len()
    }

    /// Number of links whose first header page has been seen.
    pub fn detected(&self) -> usize {
        self.detected
    }

    /// Number of links whose end has been seen.
    pub fn indexed(&self) -> usize {
        self.indexed
    }

    pub fn get(&self, index: usize) -> Option<&LinkDetails> {
        self.links.get(index)
    }

    /// Detected links, in file order.
    pub fn detected_links(&self) -> &[LinkDetails] {
        &self.links[..self.detected]
    }

    /// Indexed links, in file order.
    pub fn indexed_links(&self) -> &[LinkDetails] {
        &self.links[..self.indexed]
    }

    pub(crate) fn link_mut(&mut self, index: usize) -> &mut LinkDetails {
        &mut self.links[index]
    }

    pub(crate) fn set_detected(&mut self, detected: usize) {
        debug_assert!(detected <= self.links.len());
        debug_assert!(self.indexed <= detected);
        self.detected = detected;
    }

    pub(crate) fn mark_indexed(&mut self) {
        self.indexed += 1;
        debug_assert!(self.indexed <= self.detected);
    }

    /// Grows the table so both link numbers have a slot.
    ///
    /// Capacity doubles until it exceeds both numbers. On allocation failure
    /// the table is left exactly as it was.
    pub fn ensure_capacity(&mut self, current_link: usize, advance_link: usize) -> Result<(), TryReserveError> {
        let needed = current_link.max(advance_link);
        if needed < self.links.len() {
            return Ok(());
        }

        let mut capacity = self.links.len().max(1);
        while capacity <= needed {
            capacity *= 2;
        }

        self.links.try_reserve_exact(capacity - self.links.len())?;
        self.links.resize_with(capacity, LinkDetails::default);
        debug!("Link table grown to {capacity} slots");

        Ok(())
    }

    /// Records a serial number multiplexed alongside the FLAC stream of `link`.
    pub(crate) fn push_other_serial_number(&mut self, link: usize, serial_number: u32) -> Result<(), TryReserveError> {
        let serials = &mut self.links[link].other_serial_numbers;
        if serials.contains(&serial_number) {
            return Ok(());
        }
        if serials.len() % SERIAL_NUMBER_BLOCK == 0 {
            serials.try_reserve_exact(SERIAL_NUMBER_BLOCK)?;
        }
        serials.push(serial_number);
        debug!("Link {link}: serial number {serial_number:#010X} multiplexed alongside FLAC");

        Ok(())
    }

    /// Finds the indexed link containing absolute sample `target_sample`.
    ///
    /// Returns `None` if the sample lies beyond the last indexed link.
    pub fn find_link_for_sample(&self, target_sample: u64) -> Option<TargetLink> {
        let mut samples_in_preceding_links = 0u64;

        for (link_number, link) in self.indexed_links().iter().enumerate() {
            let samples_after = samples_in_preceding_links.saturating_add(link.samples);
            if target_sample < samples_after {
                return Some(TargetLink {
                    link_number,
                    serial_number: link.serial_number,
                    start_byte: link.start_byte,
                    end_byte: link.end_byte,
                    samples_in_preceding_links,
                    samples_this_link: link.samples,
                });
            }
            samples_in_preceding_links = samples_after;
        }

        None
    }
}
