//! STREAMINFO metadata block.
//!
//! The first bytes of every demuxed link are the native FLAC signature
//! followed by the STREAMINFO block, which fixes the sample rate, channel
//! count, sample size and (when known) the total sample count of the link.

use std::fmt;

use anyhow::{Result, bail, ensure};
use log::trace;

use crate::utils::bitstream_io::BsIoSliceReader;
use crate::utils::errors::StreamInfoError;

/// Native FLAC stream signature.
pub const FLAC_SIGNATURE: &[u8; 4] = b"fLaC";

/// STREAMINFO body length in bytes.
pub const STREAM_INFO_LENGTH: u32 = 34;

/// Signature, metadata block header and STREAMINFO body.
pub const STREAM_INFO_PREFIX_LEN: usize = 4 + 4 + STREAM_INFO_LENGTH as usize;

const METADATA_TYPE_STREAMINFO: u8 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    pub is_last_metadata_block: bool,
    pub min_block_size: u16,
    pub max_block_size: u16,
    /// 0 when unknown.
    pub min_frame_size: u32,
    /// 0 when unknown.
    pub max_frame_size: u32,
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
    /// 0 when unknown.
    pub total_samples: u64,
    pub md5: [u8; 16],
}

impl StreamInfo {
    /// Parses the signature and STREAMINFO block at the start of `buffer`.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self> {
        ensure!(
            buffer.len() >= STREAM_INFO_PREFIX_LEN,
            "Insufficient data for STREAMINFO: {} < {STREAM_INFO_PREFIX_LEN}",
            buffer.len()
        );

        let signature = [buffer[0], buffer[1], buffer[2], buffer[3]];
        if &signature != FLAC_SIGNATURE {
            bail!(StreamInfoError::InvalidSignature(signature));
        }

        let reader = &mut BsIoSliceReader::from_slice(&buffer[4..STREAM_INFO_PREFIX_LEN]);

        let is_last_metadata_block = reader.get()?;
        let block_type: u8 = reader.get_n(7)?;
        if block_type != METADATA_TYPE_STREAMINFO {
            bail!(StreamInfoError::NotStreamInfo(block_type));
        }
        let length: u32 = reader.get_n(24)?;
        if length != STREAM_INFO_LENGTH {
            bail!(StreamInfoError::InvalidLength(length));
        }

        let min_block_size = reader.get_n(16)?;
        let max_block_size = reader.get_n(16)?;
        let min_frame_size = reader.get_n(24)?;
        let max_frame_size = reader.get_n(24)?;

        let sample_rate: u32 = reader.get_n(20)?;
        if sample_rate == 0 {
            bail!(StreamInfoError::InvalidSampleRate);
        }
        let channels = reader.get_n::<u8>(3)? + 1;
        let bits_per_sample = reader.get_n::<u8>(5)? + 1;
        let total_samples = reader.get_n(36)?;

        let mut md5 = [0u8; 16];
        reader.get_bytes(&mut md5)?;

        let info = Self {
            is_last_metadata_block,
            min_block_size,
            max_block_size,
            min_frame_size,
            max_frame_size,
            sample_rate,
            channels,
            bits_per_sample,
            total_samples,
            md5,
        };
        trace!("{info:?}");

        Ok(info)
    }

    /// Playback time of `samples` inter-channel samples, in seconds.
    pub fn duration_secs(&self, samples: u64) -> f64 {
        samples as f64 / self.sample_rate as f64
    }
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {} bit",
            self.sample_rate, self.channels, self.bits_per_sample
        )
    }
}
