use std::{
    path::{Path, PathBuf},
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use clap::{Parser, Subcommand};
use log::{LevelFilter, error, info, warn};

use helmsman::{
    AppConfig, FirebaseStore, HelmsmanError, MockStore, PollLoop, PollLoopConfig, TelemetryStore,
    map_overlay::SvgMapSurface,
    surface::{ChannelSurface, LogSurface, RenderSurface},
    writer,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Log every cycle in detail
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Follow a live Firebase Realtime Database
    Live {
        /// Base URL of the database, e.g. https://<project>.firebaseio.com
        #[arg(short, long)]
        url: Option<String>,

        #[arg(long)]
        interval_ms: Option<u64>,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Record every dashboard frame to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep an SVG snapshot of the map up to date
        #[arg(long)]
        svg: Option<PathBuf>,

        #[arg(long)]
        log_rows: Option<usize>,

        #[arg(long)]
        map_path_limit: Option<usize>,

        /// Store the effective settings as the new defaults
        #[arg(long)]
        save_config: bool,
    },
    /// Replay recorded database dumps, one per cycle
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        svg: Option<PathBuf>,
    },
}

fn load_config() -> AppConfig {
    match AppConfig::from_local_file() {
        Ok(Some(config)) => config,
        Ok(None) => AppConfig::default(),
        Err(e) => {
            warn!("Ignoring unreadable config file: {}", e);
            AppConfig::default()
        }
    }
}

fn build_surfaces(
    output: Option<PathBuf>,
    svg: Option<PathBuf>,
) -> (Vec<Box<dyn RenderSurface>>, Option<JoinHandle<Result<(), HelmsmanError>>>) {
    let mut surfaces: Vec<Box<dyn RenderSurface>> = vec![Box::new(LogSurface::default())];

    // the writer thread ends once the poll loop drops its sender
    let writer_handle = output.map(|output_file| {
        let (frame_tx, frame_rx) = mpsc::channel();
        surfaces.push(Box::new(ChannelSurface::new(frame_tx)));
        thread::spawn(move || writer::write_frames(&output_file, frame_rx))
    });

    if let Some(svg_file) = svg {
        surfaces.push(Box::new(SvgMapSurface::new(svg_file)));
    }
    (surfaces, writer_handle)
}

fn poll<S: TelemetryStore>(
    store: S,
    poll_config: PollLoopConfig,
    output: Option<PathBuf>,
    svg: Option<PathBuf>,
    stop: Arc<AtomicBool>,
) -> Result<(), HelmsmanError> {
    let (mut surfaces, writer_handle) = build_surfaces(output, svg);
    let mut poll_loop = PollLoop::new(store, poll_config);
    let result = poll_loop.run(&mut surfaces, &stop);

    drop(surfaces);
    if let Some(handle) = writer_handle {
        match handle.join() {
            Ok(Err(e)) => error!("Frame writer failed: {}", e),
            Err(_) => error!("Frame writer thread panicked"),
            Ok(Ok(())) => {}
        }
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn live(
    url: Option<String>,
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
    output: Option<PathBuf>,
    svg: Option<PathBuf>,
    log_rows: Option<usize>,
    map_path_limit: Option<usize>,
    save_config: bool,
    stop: Arc<AtomicBool>,
) -> Result<(), HelmsmanError> {
    let mut config = load_config();
    config.store_url = url.or(config.store_url);
    config.refresh_rate_ms = interval_ms.unwrap_or(config.refresh_rate_ms);
    config.fetch_timeout_ms = timeout_ms.unwrap_or(config.fetch_timeout_ms);
    config.log_rows = log_rows.unwrap_or(config.log_rows);
    config.map_path_limit = map_path_limit.or(config.map_path_limit);
    if save_config {
        match config.save() {
            Ok(()) => info!("Saved config"),
            Err(e) => warn!("Could not save config: {}", e),
        }
    }

    let store = match &config.store_url {
        Some(url) => FirebaseStore::new(url, Duration::from_millis(config.fetch_timeout_ms)),
        None => {
            warn!("No store URL given, falling back to the local emulator");
            FirebaseStore::default()
        }
    };

    poll(store, config.to_poll_config(), output, svg, stop)
}

fn replay(
    input: &Path,
    interval_ms: u64,
    output: Option<PathBuf>,
    svg: Option<PathBuf>,
    stop: Arc<AtomicBool>,
) -> Result<(), HelmsmanError> {
    let store = MockStore::from_file(input)?;
    let poll_config = PollLoopConfig {
        interval_ms,
        ..load_config().to_poll_config()
    };
    poll(store, poll_config, output, svg, stop)
}

fn main() {
    let cli = Args::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    colog::default_builder().filter_level(level).init();

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Exiting...");
        handler_stop.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    let result = match cli.command {
        Commands::Live {
            url,
            interval_ms,
            timeout_ms,
            output,
            svg,
            log_rows,
            map_path_limit,
            save_config,
        } => live(
            url,
            interval_ms,
            timeout_ms,
            output,
            svg,
            log_rows,
            map_path_limit,
            save_config,
            stop,
        ),
        Commands::Replay {
            input,
            interval_ms,
            output,
            svg,
        } => replay(&input, interval_ms, output, svg, stop),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}
