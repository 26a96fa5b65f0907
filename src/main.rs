mod cli;

use clipshrink::{
    batch, config,
    jobs::{JobManager, JobSettings},
    server,
};
use clipshrink_av::{check_tools as detect_tools, CompressionOptions, Encoder, FfmpegEncoder};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn build_encoder(config: &config::Config) -> Result<FfmpegEncoder> {
    FfmpegEncoder::discover(
        config.encoder.ffmpeg_path.as_deref(),
        config.encoder.ffprobe_path.as_deref(),
    )
    .context("FFmpeg is not installed or not in PATH. Please install FFmpeg first.")
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting clipshrink server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let encoder = build_encoder(&config)?;
    tracing::info!("Using ffmpeg at {:?}", encoder.ffmpeg_path());

    let jobs = JobManager::new(
        Arc::new(encoder),
        JobSettings {
            retention: config.jobs.retention(),
            max_concurrent: config.jobs.max_concurrent,
        },
    );

    server::start_server(config, jobs).await
}

struct CompressArgs {
    inputs: Vec<PathBuf>,
    output: PathBuf,
    overrides: CompressionOverrides,
    jobs: usize,
}

#[derive(Default)]
struct CompressionOverrides {
    target_size_mb: Option<u32>,
    codec: Option<String>,
    crf: Option<u32>,
    preset: Option<String>,
    audio_bitrate: Option<String>,
    max_width: Option<u32>,
}

impl CompressionOverrides {
    fn apply(self, mut options: CompressionOptions) -> CompressionOptions {
        if let Some(size) = self.target_size_mb {
            options.target_size_mb = size;
        }
        if let Some(codec) = self.codec {
            options.codec = codec;
        }
        if let Some(crf) = self.crf {
            options.crf = crf;
        }
        if let Some(preset) = self.preset {
            options.preset = preset;
        }
        if let Some(audio_bitrate) = self.audio_bitrate {
            options.audio_bitrate = audio_bitrate;
        }
        if self.max_width.is_some() {
            options.max_width = self.max_width;
        }
        options
    }
}

async fn compress(args: CompressArgs, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let files = batch::collect_inputs(&args.inputs);
    if files.is_empty() {
        anyhow::bail!("No valid input files found.");
    }

    let encoder = build_encoder(&config)?;
    let options = args.overrides.apply(config.defaults.clone());
    let jobs = JobManager::new(
        Arc::new(encoder),
        JobSettings {
            retention: config.jobs.retention(),
            max_concurrent: Some(args.jobs.max(1)),
        },
    );

    let items = batch::plan_outputs(files, &args.output);
    let report = batch::run_batch(&jobs, items, &options, server::shutdown_signal()).await?;

    if report.total > 1 {
        println!(
            "\nBatch processing complete. {}/{} files processed successfully.",
            report.succeeded, report.total
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipshrink=trace,clipshrink_av=debug,tower_http=debug".to_string()
        } else {
            "clipshrink=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Compress {
            inputs,
            output,
            target_size_mb,
            codec,
            crf,
            preset,
            audio_bitrate,
            max_width,
            jobs,
        } => {
            let args = CompressArgs {
                inputs,
                output,
                overrides: CompressionOverrides {
                    target_size_mb,
                    codec,
                    crf,
                    preset,
                    audio_bitrate,
                    max_width,
                },
                jobs,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(compress(args, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate { path } => {
            let path = path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipshrink {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let encoder = build_encoder(&config)?;
    let summary = encoder.probe(file).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("File: {}", file.display());
        println!("Size: {:.2} MB ({} bytes)", summary.size_mb, summary.size_bytes);
        if let Some(ref codec) = summary.codec {
            println!("Codec: {}", codec);
        }
        if let Some(ref resolution) = summary.resolution {
            println!("Resolution: {}", resolution);
        }
        if let Some(duration) = summary.duration_secs {
            let secs = duration as u64;
            let mins = secs / 60;
            let hours = mins / 60;
            println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
        }
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = detect_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install FFmpeg to compress videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Upload limit: {} MB", config.server.max_upload_mb);
            println!("  Uploads: {}", config.storage.upload_dir.display());
            println!("  Outputs: {}", config.storage.output_dir.display());
            println!("  Retention: {}s", config.jobs.retention_secs);
            match config.jobs.max_concurrent {
                Some(limit) => println!("  Max concurrent jobs: {}", limit),
                None => println!("  Max concurrent jobs: unlimited"),
            }
            println!(
                "  Defaults: {} crf {} ({})",
                config.defaults.codec, config.defaults.crf, config.defaults.preset
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
