use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::Result;
use oggflac::io::{HostIo, SeekableSource, StreamSource};

/// Host byte source over a file or stdin
pub struct InputReader {
    host: Box<dyn HostIo>,
    is_pipe: bool,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input, which cannot seek
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let host: Box<dyn HostIo> = if is_pipe {
            Box::new(StreamSource::new(io::stdin().lock()))
        } else {
            let file = File::open(input_path)?;
            Box::new(SeekableSource::new(BufReader::new(file)))
        };

        Ok(Self { host, is_pipe })
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    pub fn host_mut(&mut self) -> &mut dyn HostIo {
        self.host.as_mut()
    }

    pub fn into_host(self) -> Box<dyn HostIo> {
        self.host
    }
}
