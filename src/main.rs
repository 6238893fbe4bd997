use std::fs::File;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{info, warn};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

use miqat::PositionSource;
use miqat::core::config::{self, CliOverrides, MiqatConfig, ResolvedConfig};
use miqat::core::state::ScheduleSlot;
use miqat::engine::{Engine, EngineDeps, EngineSettings};
use miqat::location::{FixedPosition, IpGeolocation, NoPosition, PositionProvider};
use miqat::qibla::{FixedHeading, NoOrientationSensor, OrientationPlatform, compass_point};
use miqat::schedule::{
    CalculationMethodId, Clock, DailyTimingTable, EventKind, KNOWN_METHODS, PrayerScheduleClient,
    SystemClock, format_countdown, select_next,
};

#[derive(Parser)]
#[command(name = "miqat", about = "Prayer times, countdown and qibla direction")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Latitude; together with --lng skips automatic location
    #[arg(long, global = true, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude; together with --lat skips automatic location
    #[arg(long, global = true, allow_hyphen_values = true)]
    lng: Option<f64>,

    /// City used when automatic location fails
    #[arg(long, global = true)]
    city: Option<String>,

    /// Country used when automatic location fails
    #[arg(long, global = true)]
    country: Option<String>,

    /// Calculation method id (see `miqat methods`)
    #[arg(short, long, global = true)]
    method: Option<u8>,

    /// Automatic position source
    #[arg(long, global = true, default_value_t, value_enum)]
    locate: PositionSource,
}

#[derive(Subcommand)]
enum Command {
    /// Today's timetable and the next event
    Times,
    /// Time remaining until the next event
    Next,
    /// Live countdown, refreshed every second until Ctrl-C
    Watch,
    /// Qibla bearing, optionally relative to a device heading
    Qibla {
        /// Current device heading in degrees from north
        #[arg(long, allow_hyphen_values = true)]
        heading: Option<f64>,
    },
    /// List known calculation methods
    Methods,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();
    init_logger();

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("miqat: {e}; using defaults");
            warn!("Falling back to default config: {}", e);
            MiqatConfig::default()
        }
    };
    let overrides = CliOverrides {
        method: args.method,
        city: args.city.clone(),
        country: args.country.clone(),
        latitude: args.lat,
        longitude: args.lng,
    };
    let config = config::resolve(&file_config, &overrides);
    info!("Miqat starting up (method {}, locate {:?})", config.method, args.locate);

    if let Command::Methods = args.command {
        print_methods(config.method);
        return ExitCode::SUCCESS;
    }

    let heading = match args.command {
        Command::Qibla { heading } => heading,
        _ => None,
    };
    let mut engine = build_engine(&config, args.locate, heading);

    let status = engine.resolve_with_fallback(config.place.clone()).await;
    let Some(location) = engine.state().location().cloned() else {
        eprintln!(
            "miqat: location {}; pass --city and --country or --lat and --lng",
            status.label()
        );
        return ExitCode::FAILURE;
    };
    info!("Using location {}", location);

    let code = match args.command {
        Command::Times => show_times(&mut engine, &location.to_string()).await,
        Command::Next => show_next(&mut engine).await,
        Command::Watch => watch(&mut engine).await,
        Command::Qibla { heading } => show_qibla(&mut engine, heading).await,
        Command::Methods => ExitCode::SUCCESS,
    };
    engine.deactivate();
    code
}

/// Logs to `~/.miqat/miqat.log`, or `miqat.log` in the working directory
/// when there is no home directory. Runs without a logger if neither opens.
fn init_logger() {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let path = match config::data_dir() {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => dir.join("miqat.log"),
        _ => "miqat.log".into(),
    };
    if let Ok(log_file) = File::create(&path) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }
}

fn build_engine(config: &ResolvedConfig, locate: PositionSource, heading: Option<f64>) -> Engine {
    let position: Arc<dyn PositionProvider> = match (config.fixed_position, locate) {
        (Some(coords), _) => Arc::new(FixedPosition::new(coords)),
        (None, PositionSource::Ip) => Arc::new(IpGeolocation::new(Some(config.geolocation_base_url.clone()))),
        (None, PositionSource::Off) => Arc::new(NoPosition),
    };
    let orientation: Arc<dyn OrientationPlatform> = match heading {
        Some(h) => Arc::new(FixedHeading::new(h)),
        None => Arc::new(NoOrientationSensor),
    };
    Engine::new(
        EngineDeps {
            position,
            schedule: Arc::new(PrayerScheduleClient::new(Some(config.timings_base_url.clone()))),
            orientation,
            clock: Arc::new(SystemClock),
        },
        EngineSettings {
            position_timeout: config.position_timeout,
            cache_ttl: config.cache_ttl,
            ..EngineSettings::default()
        },
        config.method,
    )
}

/// Waits for the schedule, reporting a failure on stderr.
async fn ready_table(engine: &mut Engine) -> Option<Arc<DailyTimingTable>> {
    match engine.settle_schedule().await {
        ScheduleSlot::Ready { table, .. } => Some(table.clone()),
        ScheduleSlot::Failed { error, .. } => {
            eprintln!("miqat: {error}");
            None
        }
        _ => {
            eprintln!("miqat: no schedule available");
            None
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn print_methods(current: CalculationMethodId) {
    for method in KNOWN_METHODS {
        let marker = if method.id == current { "*" } else { " " };
        println!("{marker} {:>2}  {}  ({})", method.id.0, method.name, method.arabic_name);
    }
    if current.info().is_none() {
        println!("* {:>2}  (custom)", current.0);
    }
}

async fn show_times(engine: &mut Engine, place: &str) -> ExitCode {
    let Some(table) = ready_table(engine).await else {
        return ExitCode::FAILURE;
    };

    match table.timezone() {
        Some(tz) => println!("Prayer times for {place} ({tz})"),
        None => println!("Prayer times for {place}"),
    }
    if let Some(dates) = table.dates() {
        let g = &dates.gregorian;
        println!("{} {} {} {} | {}", g.weekday, g.day, g.month_name, g.year, dates.hijri);
    }
    let method = engine.state().method;
    match method.info() {
        Some(info) => println!("Method: {} ({})", info.name, method),
        None => println!("Method: {}", method),
    }
    println!();

    let next = select_next(&table, SystemClock.now());
    for (kind, time) in table.entries() {
        let marker = if kind == next.kind && next.scheduled.date() == table.date() { "▶" } else { " " };
        println!("{marker} {:<8} {:<8} {}", kind.label(), kind.arabic_label(), time.format("%H:%M"));
    }
    println!();
    println!("Next: {} in {}", describe(next.kind), format_countdown(next.remaining_ms));
    ExitCode::SUCCESS
}

async fn show_next(engine: &mut Engine) -> ExitCode {
    let Some(table) = ready_table(engine).await else {
        return ExitCode::FAILURE;
    };
    let next = select_next(&table, SystemClock.now());
    println!(
        "{} at {} in {}",
        describe(next.kind),
        next.scheduled.format("%H:%M"),
        format_countdown(next.remaining_ms)
    );
    ExitCode::SUCCESS
}

async fn watch(engine: &mut Engine) -> ExitCode {
    if ready_table(engine).await.is_none() {
        return ExitCode::FAILURE;
    }

    let mut last = String::new();
    loop {
        tokio::select! {
            state = engine.next_update() => {
                if let Some(error) = state.schedule.error() {
                    println!();
                    eprintln!("miqat: {error}");
                    return ExitCode::FAILURE;
                }
                if let Some(frame) = &state.countdown {
                    let line = format!("{} in {}", describe(frame.next.kind), frame.display);
                    if line != last {
                        print!("\r{line}  ");
                        let _ = std::io::stdout().flush();
                        last = line;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted, stopping watch");
                return ExitCode::SUCCESS;
            }
        }
    }
}

async fn show_qibla(engine: &mut Engine, heading: Option<f64>) -> ExitCode {
    // A place name only gets coordinates once the timing provider answers.
    if engine.state().qibla.bearing_to_target.is_none() {
        let _ = ready_table(engine).await;
    }
    let Some(bearing) = engine.state().qibla.bearing_to_target else {
        eprintln!("miqat: no coordinates known for this location");
        return ExitCode::FAILURE;
    };
    println!("Qibla: {:.1}° {} from true north", bearing, compass_point(bearing));

    if heading.is_some() {
        engine.activate_heading().await;
        let heard = tokio::time::timeout(
            Duration::from_secs(1),
            engine.run_until(|s| s.qibla.device_heading.is_some()),
        )
        .await;
        match (heard, engine.state().qibla.rotation()) {
            (Ok(()), Some(rotation)) if rotation.live => {
                println!("Turn {:.1}° clockwise from where the device points", rotation.degrees);
            }
            _ => warn!("Heading given but never reached the engine"),
        }
    }
    ExitCode::SUCCESS
}

fn describe(kind: EventKind) -> String {
    format!("{} ({})", kind.label(), kind.arabic_label())
}
