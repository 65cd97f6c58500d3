//! Host I/O seam.
//!
//! The demuxer never owns its byte source. Every operation that needs
//! container bytes, the current position, or the stream length takes a
//! [`HostIo`] implementation from the caller.

use std::io::{self, Read, Seek, SeekFrom};

use crate::utils::errors::HostError;

/// Outcome of a successful host read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRead {
    /// This many bytes were written; more may follow.
    Data(usize),
    /// This many bytes (possibly zero) were written and the source is exhausted.
    EndOfStream(usize),
}

/// Byte source supplied by the host application.
///
/// Only [`HostIo::read`] is mandatory. Link skipping additionally needs
/// [`HostIo::seek`], [`HostIo::tell`] and [`HostIo::length`]; a host that
/// cannot provide all three reports `false` from [`HostIo::is_seekable`].
pub trait HostIo {
    /// Fills up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError>;

    /// Moves to an absolute byte offset.
    fn seek(&mut self, _offset: u64) -> Result<(), HostError> {
        Err(HostError::Unsupported)
    }

    /// Current absolute byte offset.
    fn tell(&mut self) -> Result<u64, HostError> {
        Err(HostError::Unsupported)
    }

    /// Total length of the source in bytes.
    fn length(&mut self) -> Result<u64, HostError> {
        Err(HostError::Unsupported)
    }

    fn is_seekable(&self) -> bool {
        false
    }
}

impl<H: HostIo + ?Sized> HostIo for &mut H {
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError> {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<(), HostError> {
        (**self).seek(offset)
    }

    fn tell(&mut self) -> Result<u64, HostError> {
        (**self).tell()
    }

    fn length(&mut self) -> Result<u64, HostError> {
        (**self).length()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

impl<H: HostIo + ?Sized> HostIo for Box<H> {
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError> {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<(), HostError> {
        (**self).seek(offset)
    }

    fn tell(&mut self) -> Result<u64, HostError> {
        (**self).tell()
    }

    fn length(&mut self) -> Result<u64, HostError> {
        (**self).length()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
}

fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<HostRead, HostError> {
    loop {
        match reader.read(buf) {
            Ok(0) if !buf.is_empty() => return Ok(HostRead::EndOfStream(0)),
            Ok(n) => return Ok(HostRead::Data(n)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Host over any `Read + Seek` source, such as a file or an in-memory cursor.
#[derive(Debug)]
pub struct SeekableSource<R> {
    inner: R,
}

impl<R: Read + Seek> SeekableSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> HostIo for SeekableSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError> {
        read_retrying(&mut self.inner, buf)
    }

    fn seek(&mut self, offset: u64) -> Result<(), HostError> {
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64, HostError> {
        Ok(self.inner.stream_position()?)
    }

    fn length(&mut self) -> Result<u64, HostError> {
        let position = self.inner.stream_position()?;
        let length = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(position))?;
        Ok(length)
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Host over a forward-only source such as a pipe.
///
/// Positions are counted so link start and end offsets can still be
/// recorded, but seeking and length queries are unsupported.
#[derive(Debug)]
pub struct StreamSource<R> {
    inner: R,
    position: u64,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }
}

impl<R: Read> HostIo for StreamSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<HostRead, HostError> {
        let read = read_retrying(&mut self.inner, buf)?;
        if let HostRead::Data(n) | HostRead::EndOfStream(n) = read {
            self.position += n as u64;
        }
        Ok(read)
    }

    fn tell(&mut self) -> Result<u64, HostError> {
        Ok(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn seekable_source_reports_length_without_moving() -> Result<(), HostError> {
        let mut host = SeekableSource::new(Cursor::new(vec![1u8, 2, 3, 4, 5]));
        let mut buf = [0u8; 2];

        assert_eq!(host.read(&mut buf)?, HostRead::Data(2));
        assert_eq!(host.length()?, 5);
        assert_eq!(host.tell()?, 2);

        host.seek(4)?;
        assert_eq!(host.read(&mut buf)?, HostRead::Data(1));
        assert_eq!(host.read(&mut buf)?, HostRead::EndOfStream(0));
        Ok(())
    }

    #[test]
    fn stream_source_cannot_seek() -> Result<(), HostError> {
        let mut host = StreamSource::new(&b"abc"[..]);
        let mut buf = [0u8; 8];

        assert!(!host.is_seekable());
        assert_eq!(host.read(&mut buf)?, HostRead::Data(3));
        assert_eq!(host.tell()?, 3);
        assert!(matches!(host.seek(0), Err(HostError::Unsupported)));
        assert!(matches!(host.length(), Err(HostError::Unsupported)));
        Ok(())
    }
}
