mod cli;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;

use mux_core::config::{ConfigManager, Settings};
use mux_core::convert::{tables, AudioConvertOptions, VideoConvertOptions};
use mux_core::detect::{Capabilities, GpuInfo};
use mux_core::ffmpeg::Toolchain;
use mux_core::jobs::{
    JobKind, JobQueue, JobResult, JobSpec, JobStatus, QueueEntry, QueueProcessor, QueueWorker,
    WorkerEvent,
};
use mux_core::logging::{init_tracing, LogLevel};
use mux_core::models::CodecFamily;

use cli::{AudioArgs, Cli, Command, QueueCommand, VideoArgs};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LogLevel::Info,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    init_tracing(level);

    match run(cli) {
        Ok(failed) if failed == 0 => ExitCode::SUCCESS,
        Ok(failed) => {
            eprintln!("{failed} job(s) failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Run the selected command. Returns the number of failed jobs.
fn run(cli: Cli) -> Result<usize> {
    let mut config = ConfigManager::new(resolve_config_path(cli.config));
    config
        .load_or_create()
        .with_context(|| format!("load config {}", config.path().display()))?;
    config.ensure_dirs_exist().context("create working directories")?;
    tracing::debug!(config = %config.path().display(), "configuration loaded");

    match cli.command {
        Command::Probe { input, json } => {
            cmd_probe(&input, json)?;
            Ok(0)
        }
        Command::Video { inputs, opts } => {
            let entries = video_entries(&inputs, &opts, config.settings());
            run_entries(&config, entries)
        }
        Command::Audio { inputs, opts } => {
            let entries = audio_entries(&inputs, &opts, config.settings(), false);
            run_entries(&config, entries)
        }
        Command::ExtractAudio { inputs, opts } => {
            let entries = audio_entries(&inputs, &opts, config.settings(), true);
            run_entries(&config, entries)
        }
        Command::Queue(queue_cmd) => cmd_queue(&config, queue_cmd),
        Command::Caps { test_encoders } => {
            cmd_caps(test_encoders)?;
            Ok(0)
        }
    }
}

fn resolve_config_path(override_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path;
    }
    match ProjectDirs::from("", "", "muxolotl") {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("muxolotl.toml"),
    }
}

fn cmd_probe(input: &std::path::Path, json: bool) -> Result<()> {
    let toolchain = Toolchain::discover()?;
    let info = toolchain.probe(input)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("File:      {}", info.path.display());
    println!("Container: {}", info.container);
    if let Some(duration) = info.duration_secs {
        println!("Duration:  {duration:.2}s");
    }
    if let Some(size) = info.size_bytes {
        println!("Size:      {size} bytes");
    }
    if let Some(rate) = info.bit_rate {
        println!("Bitrate:   {rate} b/s");
    }
    for stream in &info.streams {
        let kind = stream
            .kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "other".to_string());
        let mut detail = stream.codec_name.clone();
        if let (Some(w), Some(h)) = (stream.width, stream.height) {
            detail.push_str(&format!(" {w}x{h}"));
        }
        if let Some(fps) = stream.fps {
            detail.push_str(&format!(" {fps:.3} fps"));
        }
        if let Some(rate) = stream.sample_rate {
            detail.push_str(&format!(" {rate} Hz"));
        }
        if let Some(channels) = stream.channels {
            detail.push_str(&format!(" {channels}ch"));
        }
        println!("Stream #{}: {kind}: {detail}", stream.index);
    }
    Ok(())
}

fn cmd_caps(test_encoders: bool) -> Result<()> {
    let toolchain = Toolchain::discover()?;
    println!("ffmpeg:  {}", toolchain.ffmpeg.display());
    match &toolchain.ffprobe {
        Some(path) => println!("ffprobe: {}", path.display()),
        None => println!("ffprobe: not found"),
    }

    let gpu = GpuInfo::detect();
    println!("\n{}", gpu.summary());

    let caps = Capabilities::new(toolchain);
    println!("\nAudio formats:  {}", caps.audio_formats().len());
    println!("Video formats:  {}", caps.video_formats().len());
    println!("Audio encoders: {}", caps.audio_encoders().len());
    println!("Video encoders: {}", caps.video_encoders().len());

    let mut hwaccels: Vec<String> = caps.hwaccels().into_iter().collect();
    hwaccels.sort();
    println!("\nHwaccels: {}", hwaccels.join(", "));

    if test_encoders {
        let mut working: Vec<String> = caps.working_hwaccels().into_iter().collect();
        working.sort();
        println!("Working hwaccels: {}", working.join(", "));

        println!("\nEncoder availability:");
        let available = caps.video_encoders();
        for family in CodecFamily::ALL {
            let picked = tables::encoder_priority(family)
                .iter()
                .copied()
                .find(|enc| available.contains(*enc) && caps.test_encoder(enc));
            println!("  {family}: {}", picked.unwrap_or("none"));
        }
    }
    Ok(())
}

fn video_entries(inputs: &[PathBuf], args: &VideoArgs, settings: &Settings) -> Vec<QueueEntry> {
    let opts = video_options(args, settings);
    inputs
        .iter()
        .map(|input| {
            QueueEntry::new(JobSpec {
                input: input.clone(),
                output_dir: args.output_dir.clone(),
                kind: JobKind::Video(opts.clone()),
            })
        })
        .collect()
}

fn audio_entries(
    inputs: &[PathBuf],
    args: &AudioArgs,
    settings: &Settings,
    extract: bool,
) -> Vec<QueueEntry> {
    let opts = audio_options(args, settings);
    inputs
        .iter()
        .map(|input| {
            let kind = if extract {
                JobKind::ExtractAudio(opts.clone())
            } else {
                JobKind::Audio(opts.clone())
            };
            QueueEntry::new(JobSpec {
                input: input.clone(),
                output_dir: args.output_dir.clone(),
                kind,
            })
        })
        .collect()
}

fn video_options(args: &VideoArgs, settings: &Settings) -> VideoConvertOptions {
    VideoConvertOptions {
        format: args
            .format
            .clone()
            .unwrap_or_else(|| settings.video.default_format.clone()),
        video_codec: args.video_codec.clone(),
        audio_codec: args.audio_codec.clone(),
        video_bitrate: args.video_bitrate.clone(),
        audio_bitrate: Some(args.audio_bitrate.clone()),
        profile: args.profile,
        crf: args.crf,
        preset: args.preset.clone(),
        tune: None,
        resolution: args.resolution.clone(),
        fps: args.fps,
        hwaccel: args.hwaccel.clone(),
        preserve_metadata: !args.no_metadata && settings.advanced.preserve_metadata,
        threads: args.threads.or(settings.advanced.thread_count),
    }
}

fn audio_options(args: &AudioArgs, settings: &Settings) -> AudioConvertOptions {
    AudioConvertOptions {
        format: args
            .format
            .clone()
            .unwrap_or_else(|| settings.audio.default_format.clone()),
        codec: args.codec.clone(),
        bitrate: args
            .bitrate
            .clone()
            .or_else(|| Some(settings.audio.default_bitrate.clone())),
        sample_rate: args.sample_rate,
        channels: args.channels,
        quality: args.quality,
        preserve_metadata: !args.no_metadata && settings.advanced.preserve_metadata,
    }
}

fn build_processor(config: &ConfigManager) -> Result<QueueProcessor> {
    let toolchain = Toolchain::discover()?;
    let caps = Arc::new(Capabilities::new(toolchain));
    Ok(QueueProcessor::new(
        config.settings().clone(),
        caps,
        config.logs_dir(),
        config.settings().paths.output_dir.clone().into(),
    ))
}

/// Run entries on a background worker, streaming progress to the
/// terminal. Returns the number of failed jobs.
fn run_entries(config: &ConfigManager, entries: Vec<QueueEntry>) -> Result<usize> {
    if entries.is_empty() {
        println!("Nothing to do");
        return Ok(0);
    }

    let processor = build_processor(config)?;
    let (worker, rx) = QueueWorker::spawn(processor, entries);

    for event in rx {
        match event {
            WorkerEvent::JobStarted {
                name, index, total, ..
            } => {
                println!("[{}/{}] {}", index + 1, total, name);
            }
            WorkerEvent::JobProgress { percent, speed, .. } => {
                match speed {
                    Some(speed) => print!("\r  {percent:3}%  ({speed:.1}x)"),
                    None => print!("\r  {percent:3}%"),
                }
                let _ = std::io::stdout().flush();
            }
            WorkerEvent::JobCompleted {
                output,
                elapsed_secs,
                ..
            } => {
                println!("\r  done in {elapsed_secs:.1}s -> {}", output.display());
            }
            WorkerEvent::JobFailed { error, .. } => {
                println!();
                eprintln!("  failed: {error}");
            }
            WorkerEvent::JobCancelled { .. } => {
                println!("\r  cancelled");
            }
            WorkerEvent::QueueFinished {
                completed,
                failed,
                cancelled,
            } => {
                println!("\n{completed} completed, {failed} failed, {cancelled} cancelled");
            }
        }
    }

    let results = worker.join();
    Ok(count_failed(&results))
}

fn count_failed(results: &[JobResult]) -> usize {
    results
        .iter()
        .filter(|r| !r.success && !r.cancelled)
        .count()
}

fn cmd_queue(config: &ConfigManager, command: QueueCommand) -> Result<usize> {
    let mut queue = JobQueue::new(&config.work_dir());

    match command {
        QueueCommand::AddVideo { inputs, opts } => {
            let entries = video_entries(&inputs, &opts, config.settings());
            println!("Added {} job(s)", entries.len());
            queue.add_all(entries);
            queue.save()?;
            Ok(0)
        }
        QueueCommand::AddAudio { inputs, opts } => {
            let entries = audio_entries(&inputs, &opts, config.settings(), false);
            println!("Added {} job(s)", entries.len());
            queue.add_all(entries);
            queue.save()?;
            Ok(0)
        }
        QueueCommand::List => {
            if queue.is_empty() {
                println!("Queue is empty");
            }
            for (i, job) in queue.jobs().iter().enumerate() {
                println!(
                    "{:3}. [{}] {} -> {}",
                    i + 1,
                    job.status.label(),
                    job.name,
                    job.spec.kind.format()
                );
            }
            Ok(0)
        }
        QueueCommand::Run => {
            let pending = queue.pending();
            if pending.is_empty() {
                println!("No pending jobs");
                return Ok(0);
            }

            let processor = build_processor(config)?;
            let mut failed = 0;
            let results = processor.process_queue(&pending, None, |result| {
                if result.success {
                    println!("done: {}", result.name);
                } else if result.cancelled {
                    println!("cancelled: {}", result.name);
                } else {
                    eprintln!(
                        "failed: {} ({})",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                    failed += 1;
                }
            });

            for result in &results {
                let status = if result.success {
                    JobStatus::Done {
                        output: result.output_path.clone().unwrap_or_default(),
                        elapsed_secs: result.elapsed_secs,
                    }
                } else if result.cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Failed {
                        error: result.error.clone().unwrap_or_default(),
                    }
                };
                queue.set_status(&result.job_id, status);
            }
            queue.save()?;
            Ok(failed)
        }
        QueueCommand::ClearFinished => {
            queue.clear_finished();
            queue.save()?;
            println!("{} job(s) remaining", queue.len());
            Ok(0)
        }
        QueueCommand::Clear => {
            queue.clear();
            queue.save()?;
            println!("Queue cleared");
            Ok(0)
        }
    }
}
