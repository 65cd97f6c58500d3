use std::fs::File;
use std::io::{self, BufWriter, Read, Write};

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, ExtractArgs};
use crate::input::InputReader;
use oggflac::demux::{DemuxerConfig, FlacByteReader, SkipStatus};
use oggflac::io::HostIo;

const COPY_CHUNK: usize = 64 * 1024;

pub fn cmd_extract(args: &ExtractArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let input_reader = InputReader::new(&args.input)?;
    let is_pipe = input_reader.is_pipe();

    let config = DemuxerConfig {
        serial_number: args.serial,
        decode_chained_stream: args.serial.is_none(),
    };
    let mut reader = FlacByteReader::new(input_reader.into_host(), config);

    position_at_link(&mut reader, args.link, is_pipe)?;

    log::info!(
        "Extracting link {} of {} to {}",
        args.link,
        args.input.display(),
        args.output.display()
    );

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] {bytes} written ({bytes_per_sec})",
            )?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        }
        None => None,
    };

    let mut output = BufWriter::new(File::create(&args.output)?);
    let total_bytes = copy_link(&mut reader, &mut output, pb.as_ref())?;
    output.flush()?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if total_bytes == 0 {
        bail!("No FLAC data found for link {}", args.link);
    }

    let demuxer = reader.demuxer();
    log::info!(
        "Wrote {total_bytes} bytes from serial number {:#010X}",
        demuxer.serial_number()
    );
    if let Some((major, minor)) = demuxer.mapping_version() {
        log::debug!("Ogg FLAC mapping version {major}.{minor}");
    }

    Ok(())
}

/// Moves `reader` to the start of link `link`.
fn position_at_link<H: HostIo>(reader: &mut FlacByteReader<H>, link: usize, is_pipe: bool) -> Result<()> {
    for skipped in 0..link {
        if is_pipe {
            io::copy(reader, &mut io::sink())?;
            if !reader.is_end_of_link() {
                bail!("Link {link} not found, the stream has {} link(s)", skipped + 1);
            }
            reader.next_link()?;
        } else {
            match reader.skip_link()? {
                SkipStatus::Ok => {}
                SkipStatus::EndOfStream => {
                    bail!("Link {link} not found, the stream has {} link(s)", skipped + 1)
                }
            }
        }
        log::debug!("Skipped link {skipped}");
    }
    Ok(())
}

fn copy_link<R: Read, W: Write>(reader: &mut R, output: &mut W, pb: Option<&ProgressBar>) -> Result<u64> {
    let mut buffer = vec![0u8; COPY_CHUNK];
    let mut total_bytes = 0u64;

    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        output.write_all(&buffer[..read])?;
        total_bytes += read as u64;

        if let Some(pb) = pb {
            pb.set_position(total_bytes);
        }
    }

    Ok(total_bytes)
}
