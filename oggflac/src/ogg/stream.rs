use crate::ogg::page::Page;
use crate::utils::errors::StreamError;

const LACING_BOS: u32 = 0x100;
const LACING_EOS: u32 = 0x200;
const LACING_HOLE: u32 = 0x400;

/// A reassembled logical-stream packet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    pub data: Vec<u8>,
    pub bos: bool,
    pub eos: bool,
    /// Granule position of the page on which this packet ended, or -1 if
    /// another packet ended later on the same page.
    pub granule_position: i64,
    pub packet_number: i64,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PacketOut {
    Packet(Packet),
    /// No complete packet is buffered.
    Empty,
    /// A page was missing; the packet spanning the gap was dropped.
    Hole,
}

/// Reassembles packets of one logical stream from its pages.
///
/// Pages are submitted with [`StreamState::pagein`]; pages with any other
/// serial number are refused. Packets come out of
/// [`StreamState::packetout`] in order, with gaps in the page sequence
/// reported once as [`PacketOut::Hole`].
#[derive(Debug)]
pub struct StreamState {
    serial_number: u32,
    body: Vec<u8>,
    body_returned: usize,
    lacing_vals: Vec<u32>,
    granule_vals: Vec<i64>,
    lacing_packet: usize,
    lacing_returned: usize,
    eos: bool,
    page_number: i64,
    packet_number: i64,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new(0)
    }
}

impl StreamState {
    pub fn new(serial_number: u32) -> Self {
        Self {
            serial_number,
            body: Vec::new(),
            body_returned: 0,
            lacing_vals: Vec::new(),
            granule_vals: Vec::new(),
            lacing_packet: 0,
            lacing_returned: 0,
            eos: false,
            page_number: -1,
            packet_number: 0,
        }
    }

    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    /// True once a page flagged end-of-stream was accepted.
    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn reset(&mut self) {
        self.body.clear();
        self.body_returned = 0;
        self.lacing_vals.clear();
        self.granule_vals.clear();
        self.lacing_packet = 0;
        self.lacing_returned = 0;
        self.eos = false;
        self.page_number = -1;
        self.packet_number = 0;
    }

    pub fn reset_serialno(&mut self, serial_number: u32) {
        self.reset();
        self.serial_number = serial_number;
    }

    /// Submits a page to the stream.
    pub fn pagein(&mut self, page: &Page) -> Result<(), StreamError> {
        if self.lacing_returned > 0 {
            self.lacing_vals.drain(..self.lacing_returned);
            self.granule_vals.drain(..self.lacing_returned);
            self.lacing_packet -= self.lacing_returned;
            self.lacing_returned = 0;
        }
        if self.body_returned > 0 {
            self.body.drain(..self.body_returned);
            self.body_returned = 0;
        }

        if page.serial_number() != self.serial_number {
            return Err(StreamError::SerialMismatch {
                found: page.serial_number(),
                expected: self.serial_number,
            });
        }
        if page.version() > 0 {
            return Err(StreamError::UnsupportedVersion(page.version()));
        }

        let page_number = page.sequence_number() as i64;
        if page_number != self.page_number {
            // Out of sequence: drop the partial packet, mark the gap
            let partial = self.lacing_vals[self.lacing_packet..]
                .iter()
                .map(|&v| (v & 0xFF) as usize)
                .sum::<usize>();
            self.body.truncate(self.body.len() - partial);
            self.lacing_vals.truncate(self.lacing_packet);
            self.granule_vals.truncate(self.lacing_packet);

            if self.page_number != -1 {
                self.lacing_vals.push(LACING_HOLE);
                self.granule_vals.push(-1);
                self.lacing_packet += 1;
            }
        }

        let segments = page.segment_table();
        let mut segment = 0;
        let mut body = page.body.as_slice();
        let mut bos = page.is_bos();

        if page.is_continued() {
            let resumable = matches!(
                self.lacing_vals.last(),
                Some(&last) if last != LACING_HOLE && last & 0xFF == 255
            );
            if !resumable {
                // The start of this packet was never seen, skip its tail
                bos = false;
                while segment < segments.len() {
                    let val = segments[segment] as usize;
                    body = body.get(val..).unwrap_or_default();
                    segment += 1;
                    if val < 255 {
                        break;
                    }
                }
            }
        }

        self.body.extend_from_slice(body);

        let mut saved = None;
        for &val in &segments[segment..] {
            let mut lacing = val as u32;
            if bos {
                lacing |= LACING_BOS;
                bos = false;
            }
            self.lacing_vals.push(lacing);
            self.granule_vals.push(-1);

            if val < 255 {
                saved = Some(self.lacing_vals.len() - 1);
                self.lacing_packet = self.lacing_vals.len();
            }
        }

        if let Some(index) = saved {
            self.granule_vals[index] = page.granule_position();
        }

        if page.is_eos() {
            self.eos = true;
            if let Some(last) = self.lacing_vals.last_mut() {
                *last |= LACING_EOS;
            }
        }

        self.page_number = page_number + 1;
        Ok(())
    }

    /// Takes the next complete packet out of the stream.
    pub fn packetout(&mut self) -> PacketOut {
        let start = self.lacing_returned;
        if self.lacing_packet <= start {
            return PacketOut::Empty;
        }

        if self.lacing_vals[start] & LACING_HOLE != 0 {
            self.lacing_returned += 1;
            self.packet_number += 1;
            return PacketOut::Hole;
        }

        let first = self.lacing_vals[start];
        let bos = first & LACING_BOS != 0;
        let mut eos = first & LACING_EOS != 0;
        let mut size = (first & 0xFF) as usize;
        let mut bytes = size;
        let mut end = start;

        while size == 255 {
            end += 1;
            let val = self.lacing_vals[end];
            size = (val & 0xFF) as usize;
            eos |= val & LACING_EOS != 0;
            bytes += size;
        }

        let packet = Packet {
            data: self.body[self.body_returned..self.body_returned + bytes].to_vec(),
            bos,
            eos,
            granule_position: self.granule_vals[end],
            packet_number: self.packet_number,
        };

        self.body_returned += bytes;
        self.lacing_returned = end + 1;
        self.packet_number += 1;

        PacketOut::Packet(packet)
    }
}
