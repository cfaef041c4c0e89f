//! livestatusd - standalone Livestatus daemon.
//!
//! Loads monitoring objects from a JSON object file, answers Livestatus
//! queries on a UNIX or TCP socket and reloads the object file whenever
//! it changes on disk.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use chrono::Local;
use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use livestatus_core::config::Settings;
use livestatus_core::core::InMemoryCore;
use livestatus_core::server::{ListenAddress, Server};
use livestatus_core::store::Store;
use livestatus_core::tables::Context;
use livestatus_core::triggers::Trigger;

/// Interval between updates of the counter rates.
const STATISTICS_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between checks of the object file and the timeperiods.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

/// Sleep of the main loop between checks of the shutdown flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Livestatus query daemon.
#[derive(Parser)]
#[command(name = "livestatusd", about = "Livestatus query daemon", version)]
struct Args {
    /// JSON file with hosts, services, contacts and the other monitoring objects.
    #[arg(short = 'f', long, env = "LIVESTATUS_OBJECTS")]
    objects: PathBuf,

    /// UNIX socket path or TCP address (host:port) to listen on.
    #[arg(short, long, default_value = "./live", env = "LIVESTATUS_SOCKET")]
    socket: String,

    /// Engine option as key=value (e.g. num_client_threads=20). Repeatable.
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
    options: Vec<String>,

    /// File that receives every submitted external command.
    #[arg(long, value_name = "PATH")]
    command_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["livestatusd", "livestatus_core"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Reloads the object file when its modification time changed.
struct ObjectFileWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ObjectFileWatcher {
    fn new(path: PathBuf) -> Self {
        let last_modified = modified(&path);
        Self { path, last_modified }
    }

    fn check(&mut self, core: &InMemoryCore, ctx: &Context) {
        let current = modified(&self.path);
        if current.is_none() || current == self.last_modified {
            return;
        }
        self.last_modified = current;
        match InMemoryCore::load_definitions(&self.path) {
            Ok(defs) => {
                info!(
                    "Reloaded {}: {} hosts, {} services",
                    self.path.display(),
                    defs.hosts.len(),
                    defs.services.len()
                );
                core.replace(defs);
                ctx.timeperiods.update(&Local::now(), ctx.core.as_ref());
                ctx.triggers.notify_all(Trigger::All);
            }
            Err(e) => error!("Keeping previous objects: {}", e),
        }
    }
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("livestatusd {} starting", env!("CARGO_PKG_VERSION"));

    let mut settings = Settings::default();
    let errors = settings.parse_arguments(&args.options.join(" "));
    if !errors.is_empty() {
        warn!("{} invalid options ignored", errors.len());
    }
    info!(
        "Config: threads={}, query_timeout={:?}, idle_timeout={:?}, max_response_size={}",
        settings.num_client_threads, settings.query_timeout, settings.idle_timeout, settings.max_response_size
    );

    let address: ListenAddress = match args.socket.parse() {
        Ok(address) => address,
        Err(e) => {
            error!("Invalid socket address: {}", e);
            std::process::exit(2);
        }
    };

    let defs = match InMemoryCore::load_definitions(&args.objects) {
        Ok(defs) => defs,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded {}: {} hosts, {} services, {} contacts",
        args.objects.display(),
        defs.hosts.len(),
        defs.services.len(),
        defs.contacts.len()
    );
    let mut core = InMemoryCore::new(defs);
    if let Some(path) = &args.command_file {
        info!("External commands are appended to {}", path.display());
        core = core.with_command_file(path);
    }
    let core = Arc::new(core);

    // Setup graceful shutdown
    let should_terminate = Arc::new(AtomicBool::new(false));
    let flag = should_terminate.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let ctx = Arc::new(Context::new(core.clone(), settings, should_terminate.clone()));
    ctx.timeperiods.update(&Local::now(), ctx.core.as_ref());
    let store = Arc::new(Store::new(Arc::clone(&ctx)));

    let server = match Server::start(Arc::clone(&store), address) {
        Ok(server) => server,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let mut watcher = ObjectFileWatcher::new(args.objects.clone());
    let mut last_statistics = Instant::now();
    let mut last_housekeeping = Instant::now();

    while !should_terminate.load(Ordering::SeqCst) {
        if last_housekeeping.elapsed() >= HOUSEKEEPING_INTERVAL {
            last_housekeeping = Instant::now();
            watcher.check(&core, &ctx);
            ctx.timeperiods.update(&Local::now(), ctx.core.as_ref());
        }
        if last_statistics.elapsed() >= STATISTICS_INTERVAL {
            last_statistics = Instant::now();
            ctx.counters.do_statistics();
            debug!(
                "Connections: {} active, {} queued, {} cached log messages",
                ctx.counters.active_connections(),
                ctx.counters.queued_connections(),
                ctx.log_cache.cached_messages()
            );
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // Graceful shutdown
    info!("Shutting down...");
    server.shutdown();
    info!("livestatusd stopped");
}
