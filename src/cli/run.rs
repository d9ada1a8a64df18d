use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use iec61937::codec::DecoderFactory;
use iec61937::device::AudioBackend;
use iec61937::process::notify::{Notifier, NullNotifier, TcpNotifier};
use iec61937::process::pipeline::{Pipeline, PipelineConfig, PipelineOutcome};

use super::command::RunArgs;
use crate::decoder::Decoders;
use crate::device::StreamBackend;
use crate::timestamp::time_str;

/// Ticks between progress refreshes.
const PROGRESS_INTERVAL: u64 = 16;

pub fn cmd_run(args: &RunArgs, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!(
        "spdif-loop {} ({}), iec61937 {}, built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_DESCRIBE").unwrap_or("unknown"),
        env!("IEC61937_VERSION"),
        env!("BUILD_TIMESTAMP"),
    );

    let config = PipelineConfig {
        input: args.input.clone(),
        output: args.output.clone(),
        buffer_time: Duration::from_millis(args.buffer_time),
        skip_packets: args.skip_packets,
    };

    let notifier: Box<dyn Notifier> = if args.no_notify {
        Box::new(NullNotifier)
    } else {
        Box::new(TcpNotifier::new(args.notify_port))
    };

    let decoders = Decoders::new().context("Failed to initialize decoders")?;
    let mut pipeline = Pipeline::new(config, StreamBackend::new(), decoders, notifier)
        .with_context(|| format!("Failed to start on input {}", args.input))?;

    let pb = multi.map(create_progress_bar).transpose()?;

    log::info!("start loop");
    loop {
        let outcome = pipeline.tick()?;

        if let Some(pb) = &pb {
            if matches!(outcome, PipelineOutcome::Restart(_))
                || pipeline.stats().ticks % PROGRESS_INTERVAL == 0
            {
                update_progress(pb, &pipeline);
            }
            pb.tick();
        }
    }
}

fn create_progress_bar(multi: &MultiProgress) -> Result<ProgressBar> {
    let pb = multi.add(ProgressBar::new_spinner());
    pb.set_style(ProgressStyle::with_template(
        "{spinner:.green} {msg} | elapsed: {elapsed_precise}",
    )?);
    pb.set_message("waiting for input");
    Ok(pb)
}

fn update_progress<B, F, N>(pb: &ProgressBar, pipeline: &Pipeline<B, F, N>)
where
    B: AudioBackend,
    F: DecoderFactory,
    N: Notifier,
{
    let stats = pipeline.stats();
    let stream = match (pipeline.session().codec(), pipeline.output_format()) {
        (Some(codec), Some(format)) => {
            format!("{codec} {} ch {} Hz", format.channels, format.sample_rate)
        }
        _ => "no output".to_string(),
    };

    pb.set_message(format!(
        "{stream} | {} frames | {} | {} restarts",
        stats.frames_written,
        time_str(stats.audio_time),
        stats.restarts,
    ));
}
