use std::io;

use log::{debug, warn};

use super::{DemuxerConfig, OggFlacDemuxer, ReadStatus, SkipStatus, TargetLink};
use crate::io::HostIo;
use crate::utils::errors::DemuxError;

/// [`io::Read`] over the native FLAC bytes of one link at a time.
///
/// A read returns `Ok(0)` at the end of each link and at the end of the
/// stream; [`FlacByteReader::next_link`] resumes with the following link.
/// Lost sync is logged and reading continues at the next valid page.
#[derive(Debug)]
pub struct FlacByteReader<H: HostIo> {
    demuxer: OggFlacDemuxer,
    host: H,
}

impl<H: HostIo> FlacByteReader<H> {
    pub fn new(host: H, config: DemuxerConfig) -> Self {
        Self {
            demuxer: OggFlacDemuxer::new(config),
            host,
        }
    }

    pub fn demuxer(&self) -> &OggFlacDemuxer {
        &self.demuxer
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_parts(self) -> (OggFlacDemuxer, H) {
        (self.demuxer, self.host)
    }

    pub fn is_end_of_link(&self) -> bool {
        self.demuxer.is_end_of_link()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.demuxer.is_end_of_stream()
    }

    /// Continues with the next link after a link ended.
    pub fn next_link(&mut self) -> Result<(), DemuxError> {
        self.demuxer.next_link()
    }

    pub fn skip_link(&mut self) -> Result<SkipStatus, DemuxError> {
        self.demuxer.skip_link(&mut self.host)
    }

    /// Repositions at the start of the indexed link containing `sample`.
    ///
    /// Returns `None`, leaving the position untouched, if no indexed link
    /// contains it.
    pub fn seek_to_sample(&mut self, sample: u64) -> Result<Option<TargetLink>, DemuxError> {
        let Some(target) = self.demuxer.find_link_for_sample(sample) else {
            debug!("Sample {sample} is beyond the indexed links");
            return Ok(None);
        };

        self.demuxer.seek_to_link(&mut self.host, &target)?;
        self.demuxer.set_seek_parameters(None);

        Ok(Some(target))
    }
}

impl<H: HostIo> io::Read for FlacByteReader<H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.demuxer.read(&mut self.host, buf) {
                Ok(outcome) => {
                    return Ok(match outcome.status {
                        ReadStatus::Ok => outcome.bytes,
                        ReadStatus::EndOfLink | ReadStatus::EndOfStream => 0,
                    });
                }
                Err(DemuxError::LostSync) => {
                    warn!("Resynchronising in link {}", self.demuxer.current_link());
                }
                Err(err) => return Err(io::Error::other(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{MemoryHost, flac_link};
    use std::io::Read;

    fn chained() -> DemuxerConfig {
        DemuxerConfig {
            decode_chained_stream: true,
            ..Default::default()
        }
    }

    #[test]
    fn reads_each_link_to_eof() -> io::Result<()> {
        let first = flac_link(1, 800, 4, 500);
        let second = flac_link(2, 600, 3, 500);
        let host = MemoryHost::chunked([first.bytes.clone(), second.bytes.clone()].concat(), 777);
        let mut reader = FlacByteReader::new(host, chained());

        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, first.payload);
        assert!(reader.is_end_of_link());

        reader.next_link().map_err(io::Error::other)?;
        out.clear();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, second.payload);
        assert!(reader.is_end_of_stream());
        assert_eq!(reader.demuxer().links().indexed(), 2);
        Ok(())
    }

    #[test]
    fn seeks_back_to_indexed_link() -> io::Result<()> {
        let first = flac_link(1, 800, 4, 500);
        let second = flac_link(2, 600, 3, 500);
        let host = MemoryHost::new([first.bytes.clone(), second.bytes.clone()].concat());
        let mut reader = FlacByteReader::new(host, chained());

        let mut sink = Vec::new();
        reader.read_to_end(&mut sink)?;
        reader.next_link().map_err(io::Error::other)?;
        reader.read_to_end(&mut sink)?;

        let target = reader.seek_to_sample(10).map_err(io::Error::other)?;
        assert_eq!(target.map(|t| t.link_number), Some(0));
        assert_eq!(reader.host_mut().seeks, [0]);

        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, first.payload);

        assert_eq!(reader.seek_to_sample(1400).map_err(io::Error::other)?, None);
        Ok(())
    }

    #[test]
    fn garbage_between_pages_is_skipped() -> io::Result<()> {
        let link = flac_link(9, 100, 2, 40);
        let mut data = b"junk".to_vec();
        data.extend_from_slice(&link.bytes);
        let mut reader = FlacByteReader::new(MemoryHost::new(data), DemuxerConfig::default());

        let mut out = Vec::new();
        reader.read_to_end(&mut out)?;
        assert_eq!(out, link.payload);
        Ok(())
    }
}
