use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::command::{Cli, InfoArgs, ReportFormat};
use crate::input::InputReader;
use crate::timestamp::samples_str;
use oggflac::demux::{DemuxerConfig, LinkDetails, OggFlacDemuxer, ReadStatus, SkipStatus};
use oggflac::io::HostIo;
use oggflac::structs::stream_info::{STREAM_INFO_PREFIX_LEN, StreamInfo};
use oggflac::utils::errors::DemuxError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing Ogg FLAC stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut scan = LinkScan::new(multi)?;

    if input_reader.is_pipe() {
        scan.read_forward(input_reader.host_mut(), cli)?;
    } else {
        scan.skip_forward(input_reader.host_mut(), cli)?;
    }

    let report = scan.into_report(&args.input.display().to_string());
    if report.links.is_empty() {
        println!("No Ogg FLAC stream found in the file.");
        return Ok(());
    }

    match args.format {
        ReportFormat::Text => display_report(&report),
        ReportFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
    }

    Ok(())
}

struct LinkScan {
    demuxer: OggFlacDemuxer,
    stream_infos: Vec<Option<StreamInfo>>,
    pb: Option<ProgressBar>,
}

impl LinkScan {
    fn new(multi: Option<&MultiProgress>) -> Result<Self> {
        let pb = match multi {
            Some(multi) => {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
                pb.enable_steady_tick(std::time::Duration::from_millis(100));
                pb.set_message("Scanning links...");
                Some(pb)
            }
            None => None,
        };

        Ok(Self {
            demuxer: OggFlacDemuxer::new(DemuxerConfig {
                serial_number: None,
                decode_chained_stream: true,
            }),
            stream_infos: Vec::new(),
            pb,
        })
    }

    /// Reads each link's STREAMINFO, then jumps over the rest of the link.
    fn skip_forward(&mut self, io: &mut dyn HostIo, cli: &Cli) -> Result<()> {
        loop {
            let Some(status) = self.read_stream_info(io, cli)? else {
                break;
            };
            match status {
                ReadStatus::EndOfStream => break,
                ReadStatus::EndOfLink => {
                    self.demuxer.next_link()?;
                    continue;
                }
                ReadStatus::Ok => {}
            }

            match self.demuxer.skip_link(io)? {
                SkipStatus::Ok => self.update_progress(),
                SkipStatus::EndOfStream => break,
            }
        }
        Ok(())
    }

    /// Reads every byte of every link, for inputs that cannot seek.
    fn read_forward(&mut self, io: &mut dyn HostIo, cli: &Cli) -> Result<()> {
        let mut scratch = vec![0u8; 64 * 1024];
        loop {
            let Some(mut status) = self.read_stream_info(io, cli)? else {
                break;
            };

            while status == ReadStatus::Ok {
                status = match self.demuxer.read(io, &mut scratch) {
                    Ok(outcome) => outcome.status,
                    Err(DemuxError::LostSync) => {
                        log::warn!("Lost sync in link {}", self.demuxer.current_link());
                        ReadStatus::Ok
                    }
                    Err(err) => return Err(err.into()),
                };
            }

            if status == ReadStatus::EndOfStream {
                break;
            }
            self.demuxer.next_link()?;
            self.update_progress();
        }
        Ok(())
    }

    /// Reads and parses the first bytes of the current link.
    ///
    /// Returns `None` when the stream ended before the link produced any
    /// bytes.
    fn read_stream_info(&mut self, io: &mut dyn HostIo, cli: &Cli) -> Result<Option<ReadStatus>> {
        let mut prefix = [0u8; STREAM_INFO_PREFIX_LEN];
        let mut filled = 0;
        let mut status = ReadStatus::Ok;

        while filled < prefix.len() && status == ReadStatus::Ok {
            match self.demuxer.read(io, &mut prefix[filled..]) {
                Ok(outcome) => {
                    filled += outcome.bytes;
                    status = outcome.status;
                }
                Err(DemuxError::LostSync) => {
                    log::warn!("Lost sync in link {}", self.demuxer.current_link());
                }
                Err(err) => return Err(err.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }

        let link = self.demuxer.current_link();
        let stream_info = match StreamInfo::from_bytes(&prefix[..filled]) {
            Ok(info) => Some(info),
            Err(e) if cli.strict => bail!("Link {link}: {e}"),
            Err(e) => {
                log::warn!("Link {link}: {e}");
                None
            }
        };

        if self.stream_infos.len() <= link {
            self.stream_infos.resize(link + 1, None);
        }
        self.stream_infos[link] = stream_info;

        Ok(Some(status))
    }

    fn update_progress(&self) {
        if let Some(pb) = &self.pb {
            pb.set_message(format!(
                "Scanning links... {} found",
                self.demuxer.links().detected()
            ));
        }
    }

    fn into_report(self, path: &str) -> StreamReport {
        if let Some(pb) = &self.pb {
            pb.finish_and_clear();
        }

        let links = self.demuxer.links();
        let mut reports = Vec::with_capacity(links.indexed());
        let mut offset = 0;

        for (index, details) in links.detected_links().iter().enumerate() {
            let stream_info = self.stream_infos.get(index).cloned().flatten();
            let indexed = index < links.indexed();
            reports.push(LinkReport::new(index, details, indexed, offset, stream_info));
            offset += details.samples;
        }

        let total_samples = reports.iter().map(|link| link.samples).sum();
        let duration = match reports.first() {
            Some(first) if reports.iter().all(|link| link.sample_rate == first.sample_rate) => {
                samples_str(total_samples, first.sample_rate)
            }
            _ => "unknown".to_string(),
        };

        StreamReport {
            path: path.to_string(),
            total_samples,
            duration,
            links: reports,
        }
    }
}

#[derive(Debug, Serialize)]
struct StreamReport {
    path: String,
    total_samples: u64,
    duration: String,
    links: Vec<LinkReport>,
}

#[derive(Debug, Serialize)]
struct LinkReport {
    index: usize,
    serial_number: String,
    start_byte: u64,
    end_byte: Option<u64>,
    first_sample: u64,
    samples: u64,
    duration: String,
    sample_rate: u32,
    channels: u8,
    bits_per_sample: u8,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    other_serial_numbers: Vec<String>,
    is_last: bool,
}

impl LinkReport {
    fn new(
        index: usize,
        details: &LinkDetails,
        indexed: bool,
        first_sample: u64,
        stream_info: Option<StreamInfo>,
    ) -> Self {
        let stream_info = stream_info.unwrap_or_default();
        Self {
            index,
            serial_number: format!("{:#010X}", details.serial_number),
            start_byte: details.start_byte,
            end_byte: indexed.then_some(details.end_byte),
            first_sample,
            samples: details.samples,
            duration: samples_str(details.samples, stream_info.sample_rate),
            sample_rate: stream_info.sample_rate,
            channels: stream_info.channels,
            bits_per_sample: stream_info.bits_per_sample,
            other_serial_numbers: details
                .other_serial_numbers
                .iter()
                .map(|serial| format!("{serial:#010X}"))
                .collect(),
            is_last: details.is_last,
        }
    }
}

fn display_report(report: &StreamReport) {
    println!();
    println!("Ogg FLAC Stream Information");
    println!("===========================");
    println!();

    for link in &report.links {
        println!("Link {}", link.index);
        println!("  Serial number             {}", link.serial_number);
        match link.end_byte {
            Some(end_byte) => println!(
                "  Byte range                {}..{} ({} bytes)",
                link.start_byte,
                end_byte,
                end_byte.saturating_sub(link.start_byte)
            ),
            None => println!("  Byte range                {}..", link.start_byte),
        }
        if link.sample_rate != 0 {
            println!(
                "  Format                    {} Hz, {} ch, {} bit",
                link.sample_rate, link.channels, link.bits_per_sample
            );
        }
        println!("  First sample              {}", link.first_sample);
        println!("  Samples                   {}", link.samples);
        println!("  Duration                  {}", link.duration);
        if !link.other_serial_numbers.is_empty() {
            println!(
                "  Other streams             {}",
                link.other_serial_numbers.join(", ")
            );
        }
        println!();
    }

    println!("Analysis Summary");
    println!("  Links                     {}", report.links.len());
    println!("  Total samples             {}", report.total_samples);
    println!("  Duration                  {}", report.duration);
    println!();
}
