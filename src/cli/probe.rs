use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use iec61937::device::{AudioBackend, ByteReader};
use iec61937::process::extract::{DemuxUnit, Demuxer, RestartReason};
use iec61937::structs::codec::{PCM_CHANNELS, PCM_SAMPLE_RATE};
use iec61937::utils::errors::FatalError;

use super::command::ProbeArgs;
use crate::device::StreamBackend;
use crate::timestamp::time_str;

#[derive(Debug, Default)]
struct ProbeSummary {
    bursts: BTreeMap<&'static str, u64>,
    payload_bytes: u64,
    garbage_bytes: u64,
    unaligned: u64,
    pcm_blocks: u64,
    retries: u64,
    unsupported: BTreeMap<u16, u64>,
    restarts: Vec<(u64, RestartReason)>,
}

impl ProbeSummary {
    fn add(&mut self, unit: &DemuxUnit) {
        match unit {
            DemuxUnit::Packet(packet) => {
                *self.bursts.entry(packet.codec.name()).or_default() += 1;
                self.payload_bytes += packet.data.len() as u64;
                self.garbage_bytes += packet.garbage_len as u64;
                if !packet.word_aligned {
                    self.unaligned += 1;
                }
            }
            DemuxUnit::Pcm => self.pcm_blocks += 1,
            DemuxUnit::Unclassified { data_type, error } => {
                log::debug!("burst type {data_type:#06X}: {error}");
                *self.unsupported.entry(*data_type).or_default() += 1;
            }
            DemuxUnit::Retry => self.retries += 1,
            DemuxUnit::Restart(_) => {}
        }
    }

    fn total_bursts(&self) -> u64 {
        self.bursts.values().sum()
    }
}

pub fn cmd_probe(args: &ProbeArgs, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Probing capture: {}", args.input.display());

    let name = args.input.to_string_lossy();
    let capture = StreamBackend::new()
        .open_capture(&name)
        .with_context(|| format!("Failed to open {name}"))?;
    let mut reader = ByteReader::new(capture);
    let mut demuxer = Demuxer::default();
    let mut summary = ProbeSummary::default();

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message("Scanning bursts...");
            Some(pb)
        }
        None => None,
    };

    loop {
        let unit = match demuxer.read_unit(&mut reader) {
            Ok(unit) => unit,
            Err(FatalError::EndOfStream) => break,
            Err(e) => return Err(e).context("Probe aborted"),
        };

        summary.add(&unit);
        if let DemuxUnit::Restart(reason) = unit {
            summary.restarts.push((reader.bytes_read(), reason));
            demuxer = Demuxer::default();
        }

        if let Some(pb) = &pb {
            pb.set_message(format!(
                "{} bursts, {} PCM blocks",
                summary.total_bursts(),
                summary.pcm_blocks
            ));
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    print_summary(&summary, reader.bytes_read());
    Ok(())
}

fn print_summary(summary: &ProbeSummary, total_bytes: u64) {
    println!();
    println!("Capture Summary");
    let size_mb = total_bytes as f64 / 1_000_000.0;
    println!("  Size                      {size_mb:.2} MB ({total_bytes} bytes)");

    let frame_bytes = PCM_CHANNELS as u64 * 2;
    let frames = total_bytes / frame_bytes;
    let duration = Duration::from_millis(frames * 1000 / PCM_SAMPLE_RATE as u64);
    println!("  Duration                  {}", time_str(duration));
    println!();

    if summary.total_bursts() == 0 {
        println!("No IEC 61937 bursts found; the capture is plain PCM.");
    } else {
        println!("Bursts");
        for (codec, count) in &summary.bursts {
            println!("  {codec:<26}{count}");
        }
        println!("  Payload                   {} bytes", summary.payload_bytes);
        println!("  Skipped before sync       {} bytes", summary.garbage_bytes);
        if summary.unaligned > 0 {
            println!("  Not 16-bit aligned        {}", summary.unaligned);
        }
    }
    println!();

    println!("Fallbacks");
    println!("  PCM blocks                {}", summary.pcm_blocks);
    println!("  Skipped bursts            {}", summary.retries);
    for (data_type, count) in &summary.unsupported {
        println!("  Unsupported {data_type:#06X}        {count}");
    }
    println!("  Stream changes            {}", summary.restarts.len());
    for (offset, reason) in &summary.restarts {
        println!("    at byte {offset:<14}{reason}");
    }
    println!();
}
