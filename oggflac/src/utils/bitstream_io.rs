//! Bitstream I/O utilities for metadata parsing.
//!
//! Thin bounds-checked wrapper over [`bitstream_io::BitReader`] used to read
//! the big-endian bit fields of FLAC metadata blocks.

use std::io;

use bitstream_io::{BigEndian, BitRead, BitReader, UnsignedInteger};

#[derive(Debug)]
pub struct BitstreamIoReader<R: io::Read + io::Seek> {
    bs: BitReader<R, BigEndian>,
    len: u64,
}

pub type BsIoSliceReader<'a> = BitstreamIoReader<io::Cursor<&'a [u8]>>;

impl<R> BitstreamIoReader<R>
where
    R: io::Read + io::Seek,
{
    pub fn new(read: R, len_bytes: u64) -> Self {
        Self {
            bs: BitReader::new(read),
            len: len_bytes << 3,
        }
    }

    #[inline(always)]
    pub fn get(&mut self) -> io::Result<bool> {
        self.bs.read_bit()
    }

    #[inline(always)]
    pub fn get_n<I: UnsignedInteger>(&mut self, n: u32) -> io::Result<I> {
        if n as u64 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("get_n({}): out of bounds bits at {}", n, self.position()?),
            ));
        }

        self.bs.read_unsigned_var(n)
    }

    #[inline(always)]
    pub fn get_bytes(&mut self, buf: &mut [u8]) -> io::Result<()> {
        if (buf.len() as u64) << 3 > self.available()? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "get_bytes({}): out of bounds bits at {}",
                    buf.len(),
                    self.position()?
                ),
            ));
        }

        self.bs.read_bytes(buf)
    }

    #[inline(always)]
    pub fn skip_n(&mut self, n: u32) -> io::Result<()> {
        self.available().and_then(|avail| {
            if n as u64 > avail {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "skip_n: out of bounds bits",
                ))
            } else {
                self.bs.skip(n)
            }
        })
    }

    #[inline(always)]
    pub fn available(&mut self) -> io::Result<u64> {
        self.bs
            .position_in_bits()
            .map(|pos| self.len.saturating_sub(pos))
    }

    #[inline(always)]
    pub fn position(&mut self) -> io::Result<u64> {
        self.bs.position_in_bits()
    }
}

impl<'a> BsIoSliceReader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        let len = buf.len() as u64;
        let read = io::Cursor::new(buf);

        Self::new(read, len)
    }
}

impl Default for BsIoSliceReader<'_> {
    fn default() -> Self {
        Self::from_slice(&[])
    }
}

#[test]
fn reads_across_byte_boundaries() -> io::Result<()> {
    let data = [0b1010_1100, 0xFF, 0x01];
    let mut reader = BsIoSliceReader::from_slice(&data);

    assert!(reader.get()?);
    assert_eq!(reader.get_n::<u8>(3)?, 0b010);
    assert_eq!(reader.get_n::<u16>(12)?, 0b1100_1111_1111);
    assert_eq!(reader.available()?, 8);

    let err = reader.get_n::<u16>(9).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    Ok(())
}
