use log::{debug, trace};

use super::OggFlacDemuxer;
use super::mapping::MappingHeader;
use crate::io::HostIo;
use crate::ogg::Page;
use crate::utils::errors::DemuxError;

impl OggFlacDemuxer {
    /// Classifies a freshly synced page and feeds it to the stream state.
    ///
    /// While a serial number is needed, the first page whose body carries
    /// the Ogg FLAC signature selects the stream and, for a new link, its
    /// serial number and start offset are recorded. While the beginning of
    /// a link is being scanned, refused BOS pages are recorded as sibling
    /// streams. Other refused pages are dropped.
    pub(crate) fn process_page<H: HostIo + ?Sized>(&mut self, io: &mut H, page: &Page) -> Result<(), DemuxError> {
        if self.need_serial_number && MappingHeader::is_first_header_page(&page.body) {
            let serial_number = page.serial_number();
            self.bos_flag_seen = true;
            self.serial_number = serial_number;
            self.stream.reset_serialno(serial_number);
            self.need_serial_number = false;

            let link = self.advance_read_link;
            if link >= self.links.detected() {
                // Host position minus unconsumed bytes minus this page
                let start_byte = match io.tell() {
                    Ok(pos) => Some(pos.saturating_sub((self.sync.buffered() + page.len()) as u64)),
                    Err(err) => {
                        debug!("Link {link}: start byte unknown, tell failed: {err}");
                        None
                    }
                };

                self.links.set_detected(link + 1);
                let details = self.links.link_mut(link);
                details.serial_number = serial_number;
                if let Some(start_byte) = start_byte {
                    details.start_byte = start_byte;
                }
                debug!(
                    "Link {link}: FLAC serial number {serial_number:#010X}, start byte {}",
                    details.start_byte
                );
            }
        }

        if self.beginning_of_link && self.bos_flag_seen && !page.is_bos() {
            // No more BOS pages for this link
            self.beginning_of_link = false;
        }

        match self.stream.pagein(page) {
            Ok(()) => {
                self.have_working_page = true;
                self.working_packet = None;
            }
            Err(_) if self.beginning_of_link && page.is_bos() => {
                self.bos_flag_seen = true;
                let link = self.advance_read_link;
                if link >= self.links.indexed() {
                    self.links.push_other_serial_number(link, page.serial_number())?;
                }
            }
            Err(err) => trace!("Dropping page: {err}"),
        }

        Ok(())
    }
}
