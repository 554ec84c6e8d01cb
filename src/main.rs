use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use camview::{
    CamviewConfig, Compositor, DisplayLoop, FrameSource, StreamGroup, StreamIdentity,
    StreamSupervisor,
};

#[cfg(not(all(feature = "gst", target_os = "linux")))]
use camview::{HeadlessSink, MockFrameSource};

#[cfg(all(feature = "gst", target_os = "linux"))]
use camview::{GstFrameSource, GstWindowSink};

#[derive(Parser, Debug)]
#[command(name = "camview")]
#[command(about = "Resilient multi-stream live camera viewer")]
#[command(version)]
#[command(long_about = "Keeps a set of network video feeds alive through connection drops, \
composites the freshest frame from each into one letterboxed mosaic, and annotates every \
tile with the stream's health and staleness.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "camview.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the viewer")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args);

    info!("Starting camview v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match CamviewConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let group = StreamGroup::new(build_supervisors(&config)?, config.display.stale_threshold());
    let font = Compositor::load_font(&config.display.font_path);
    let compositor = Compositor::new(font, config.display.font_size);

    // Interrupt signal requests the same clean shutdown as the quit key
    let shutdown = CancellationToken::new();
    {
        let token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received - shutting down");
                token.cancel();
            }
        });
    }

    #[cfg(all(feature = "gst", target_os = "linux"))]
    {
        let sink = GstWindowSink::new()?;
        let mut display = DisplayLoop::new(group, compositor, sink, &config.display);
        display.run(shutdown).await?;
    }

    #[cfg(not(all(feature = "gst", target_os = "linux")))]
    {
        let sink = HeadlessSink::new(Some(config.display.fallback_resolution));
        sink.spawn_exit_listener();
        let mut display = DisplayLoop::new(group, compositor, sink, &config.display);
        display.run(shutdown).await?;
    }

    info!("Camview exited cleanly");
    Ok(())
}

/// One supervisor per configured stream, in display order.
fn build_supervisors(config: &CamviewConfig) -> Result<Vec<StreamSupervisor>> {
    #[cfg(all(feature = "gst", target_os = "linux"))]
    let shared_source: Arc<dyn FrameSource> = Arc::new(GstFrameSource::new()?);

    #[cfg(not(all(feature = "gst", target_os = "linux")))]
    info!("No media backend enabled; using synthetic test-pattern sources");

    let mut supervisors = Vec::with_capacity(config.streams.len());
    for (index, entry) in config.streams.iter().enumerate() {
        #[cfg(all(feature = "gst", target_os = "linux"))]
        let source: Arc<dyn FrameSource> = {
            let _ = index;
            Arc::clone(&shared_source)
        };

        #[cfg(not(all(feature = "gst", target_os = "linux")))]
        let source: Arc<dyn FrameSource> = {
            const TINTS: [[u8; 3]; 4] = [[30, 60, 120], [120, 60, 30], [40, 110, 50], [110, 40, 100]];
            Arc::new(MockFrameSource::live(
                std::time::Duration::from_millis(100),
                640,
                360,
                TINTS[index % TINTS.len()],
            ))
        };

        supervisors.push(StreamSupervisor::new(
            StreamIdentity {
                uri: entry.uri.clone(),
                label: entry.label.clone(),
            },
            source,
            config.retry.clone(),
        ));
    }

    Ok(supervisors)
}

fn init_logging(args: &Args) {
    use tracing_subscriber::EnvFilter;

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("camview={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(args.debug)
        .init();
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Camview Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&CamviewConfig::default())?);
    Ok(())
}
