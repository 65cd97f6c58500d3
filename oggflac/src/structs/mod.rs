//! FLAC metadata structures carried in the first header packet.

pub mod stream_info;
