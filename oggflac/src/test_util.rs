//! Page builders and in-memory hosts shared by the unit tests.

use crate::io::{HostIo, HostRead};
use crate::utils::crc::ogg_page_crc;
use crate::utils::errors::HostError;

pub(crate) const FLAG_CONTINUED: u8 = 0x01;
pub(crate) const FLAG_BOS: u8 = 0x02;
pub(crate) const FLAG_EOS: u8 = 0x04;

/// Serialises one page with a valid checksum.
pub(crate) fn ogg_page(
    serial: u32,
    sequence: u32,
    granule: i64,
    flags: u8,
    lacing: &[u8],
    body: &[u8],
) -> Vec<u8> {
    let mut header = Vec::with_capacity(27 + lacing.len());
    header.extend_from_slice(b"OggS");
    header.push(0);
    header.push(flags);
    header.extend_from_slice(&granule.to_le_bytes());
    header.extend_from_slice(&serial.to_le_bytes());
    header.extend_from_slice(&sequence.to_le_bytes());
    header.extend_from_slice(&[0; 4]);
    header.push(lacing.len() as u8);
    header.extend_from_slice(lacing);

    let crc = ogg_page_crc(&header, body);
    header[22..26].copy_from_slice(&crc.to_le_bytes());

    header.extend_from_slice(body);
    header
}

/// Writes consecutive pages of one logical stream.
pub(crate) struct PageWriter {
    serial: u32,
    sequence: u32,
}

impl PageWriter {
    pub(crate) fn new(serial: u32, first_sequence: u32) -> Self {
        Self {
            serial,
            sequence: first_sequence,
        }
    }

    /// Laces `packets` into pages of at most `max_segments` segments.
    ///
    /// `flags` may carry BOS (applied to the first page) and EOS (applied to
    /// the last). A page's granule position is that of the last packet
    /// completed on it, or -1 when none completes.
    pub(crate) fn write(&mut self, packets: &[(&[u8], i64)], max_segments: usize, flags: u8) -> Vec<u8> {
        // (lacing value, packet index, ends packet)
        let mut segments = Vec::new();
        for (index, (data, _)) in packets.iter().enumerate() {
            let full = data.len() / 255;
            segments.extend(std::iter::repeat_n((255u8, index, false), full));
            segments.push(((data.len() % 255) as u8, index, true));
        }

        let mut bytes = Vec::new();
        let mut offsets = vec![0usize; packets.len()];
        let chunks: Vec<_> = segments.chunks(max_segments.max(1)).collect();
        let mut continued = false;

        for (i, chunk) in chunks.iter().enumerate() {
            let mut page_flags = if continued { FLAG_CONTINUED } else { 0 };
            if i == 0 {
                page_flags |= flags & FLAG_BOS;
            }
            if i + 1 == chunks.len() {
                page_flags |= flags & FLAG_EOS;
            }

            let mut granule = -1;
            let mut lacing = Vec::with_capacity(chunk.len());
            let mut body = Vec::new();
            for &(val, index, ends) in chunk.iter() {
                let start = offsets[index];
                body.extend_from_slice(&packets[index].0[start..start + val as usize]);
                offsets[index] += val as usize;
                lacing.push(val);
                if ends {
                    granule = packets[index].1;
                }
            }
            continued = chunk.last().is_some_and(|&(_, _, ends)| !ends);

            bytes.extend(ogg_page(self.serial, self.sequence, granule, page_flags, &lacing, &body));
            self.sequence += 1;
        }

        bytes
    }
}

pub(crate) fn paginate(
    serial: u32,
    first_sequence: u32,
    packets: &[(&[u8], i64)],
    max_segments: usize,
    flags: u8,
) -> Vec<u8> {
    PageWriter::new(serial, first_sequence).write(packets, max_segments, flags)
}

/// Native FLAC signature, STREAMINFO block header and a 34 byte STREAMINFO.
pub(crate) fn flac_stream_header(total_samples: u64) -> Vec<u8> {
    let mut bytes = b"fLaC".to_vec();
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
    // min/max block size 4096
    bytes.extend_from_slice(&[0x10, 0x00, 0x10, 0x00]);
    // min/max frame size unknown
    bytes.extend_from_slice(&[0; 6]);
    // 44100 Hz (20 bits), 2 channels (3 bits), 16 bits (5 bits), total samples (36 bits)
    let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36) | (total_samples & 0xF_FFFF_FFFF);
    bytes.extend_from_slice(&packed.to_be_bytes());
    bytes.extend_from_slice(&[0; 16]);
    bytes
}

/// First packet of an Ogg FLAC stream: mapping header plus native header.
pub(crate) fn first_header_packet(total_samples: u64, major: u8) -> Vec<u8> {
    let mut packet = vec![0x7F];
    packet.extend_from_slice(b"FLAC");
    packet.extend_from_slice(&[major, 0, 0, 1]);
    packet.extend(flac_stream_header(total_samples));
    packet
}

/// A synthetic Ogg FLAC link and the native FLAC bytes it should demux to.
pub(crate) struct TestLink {
    pub bytes: Vec<u8>,
    pub payload: Vec<u8>,
    pub serial: u32,
    pub samples: u64,
}

/// Builds a link with a header page, a comment page and `frames` audio
/// pages of `frame_len` bytes each, the last one flagged end-of-stream.
pub(crate) fn flac_link(serial: u32, samples: u64, frames: usize, frame_len: usize) -> TestLink {
    let (pages, chunks) = flac_link_pages(serial, samples, frames, frame_len);

    TestLink {
        bytes: pages.concat(),
        payload: chunks.concat(),
        serial,
        samples,
    }
}

/// The pages of [`flac_link`], each paired with the native FLAC bytes it
/// carries.
pub(crate) fn flac_link_pages(
    serial: u32,
    samples: u64,
    frames: usize,
    frame_len: usize,
) -> (Vec<Vec<u8>>, Vec<Vec<u8>>) {
    let header = first_header_packet(samples, 1);
    let comment = [0x84, 0, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0];

    let mut writer = PageWriter::new(serial, 0);
    let mut pages = vec![
        writer.write(&[(header.as_slice(), 0)], 255, FLAG_BOS),
        writer.write(&[(&comment[..], 0)], 255, 0),
    ];
    let mut chunks = vec![header[9..].to_vec(), comment.to_vec()];

    for i in 0..frames {
        let mut frame = vec![(i as u8) ^ (serial as u8); frame_len.max(2)];
        frame[0] = 0xFF;
        frame[1] = 0xF8;

        let granule = (samples * (i as u64 + 1) / frames as u64) as i64;
        let flags = if i + 1 == frames { FLAG_EOS } else { 0 };
        pages.push(writer.write(&[(frame.as_slice(), granule)], 255, flags));
        chunks.push(frame);
    }

    (pages, chunks)
}

/// A [`flac_link`] with a second logical stream `sibling` multiplexed in.
///
/// The sibling's BOS page follows the FLAC BOS page and one sibling page
/// follows every FLAC audio page but the last, so the FLAC end-of-stream
/// page closes the link.
pub(crate) fn muxed_flac_link(
    serial: u32,
    sibling: u32,
    samples: u64,
    frames: usize,
    frame_len: usize,
) -> TestLink {
    let (pages, chunks) = flac_link_pages(serial, samples, frames, frame_len);
    let mut video = PageWriter::new(sibling, 0);
    let picture = vec![0x33u8; 400];

    let mut bytes = pages[0].clone();
    bytes.extend(video.write(&[(&b"\x80video"[..], 0)], 255, FLAG_BOS));
    bytes.extend_from_slice(&pages[1]);
    for (i, page) in pages[2..].iter().enumerate() {
        bytes.extend_from_slice(page);
        if i + 1 < frames {
            let flags = if i + 2 == frames { FLAG_EOS } else { 0 };
            bytes.extend(video.write(&[(picture.as_slice(), i as i64)], 255, flags));
        }
    }

    TestLink {
        bytes,
        payload: chunks.concat(),
        serial,
        samples,
    }
}

/// Seekable in-memory host that records how it was driven.
pub(crate) struct MemoryHost {
    data: Vec<u8>,
    pos: usize,
    /// Largest number of bytes handed out per read.
    pub max_read: usize,
    pub seekable: bool,
    /// Report end of stream together with the final bytes instead of on
    /// the following read.
    pub eager_eof: bool,
    pub reads: usize,
    pub seeks: Vec<u64>,
    pub length_calls: usize,
}

impl MemoryHost {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            max_read: usize::MAX,
            seekable: true,
            eager_eof: false,
            reads: 0,
            seeks: Vec::new(),
            length_calls: 0,
        }
    }

    pub(crate) fn chunked(data: Vec<u8>, max_read: usize) -> Self {
        Self {
            max_read,
            ..Self::new(data)
        }
    }
}

impl HostIo for MemoryHost {
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError> {
        self.reads += 1;
        let n = buf.len().min(self.max_read).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        if n == 0 || (self.eager_eof && self.pos == self.data.len()) {
            Ok(HostRead::EndOfStream(n))
        } else {
            Ok(HostRead::Data(n))
        }
    }

    fn seek(&mut self, offset: u64) -> Result<(), HostError> {
        if !self.seekable {
            return Err(HostError::Unsupported);
        }
        self.seeks.push(offset);
        self.pos = (offset as usize).min(self.data.len());
        Ok(())
    }

    fn tell(&mut self) -> Result<u64, HostError> {
        Ok(self.pos as u64)
    }

    fn length(&mut self) -> Result<u64, HostError> {
        if !self.seekable {
            return Err(HostError::Unsupported);
        }
        self.length_calls += 1;
        Ok(self.data.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }
}
