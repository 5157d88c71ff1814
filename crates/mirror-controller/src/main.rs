//! Fanout Mirror controller entry point.
//!
//! Loads the configuration, applies command-line overrides, and runs one
//! command against the master and slave devices.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()          -- TOML file or defaults
//!  └─ AdbBridge                   -- one `adb` child process per command
//!  └─ command
//!       ├─ run       → MirrorSession (scrcpy display + input loop + dispatch task)
//!       ├─ tap/...   → ActionDispatcher (per-slave remapping)
//!       ├─ *-all     → CommandExecutor::execute_each (identical command,
//!       │               or one screenshot file per device)
//!       └─ info      → InspectDevicesUseCase
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mirror_core::{AndroidKeyCode, DeviceEndpoint, DeviceSet, InputPrimitive, Point};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mirror_controller::application::dispatch_action::{ActionDispatcher, DispatchReport};
use mirror_controller::application::execute_command::{CommandExecutor, CommandResult, DeviceBridge};
use mirror_controller::application::inspect_devices::{DeviceInfo, InspectDevicesUseCase};
use mirror_controller::application::mirror_input::MirrorInputSettings;
use mirror_controller::application::resolve_geometry::ScreenGeometryCache;
use mirror_controller::application::session::{MirrorSession, SessionParts, SessionSettings};
use mirror_controller::application::stop_signal::stop_pair;
use mirror_controller::infrastructure::device_bridge::adb::AdbBridge;
use mirror_controller::infrastructure::display::{DisplayProcess, ScrcpyDisplay, ScrcpyOptions};
use mirror_controller::infrastructure::input_capture::script::ScriptInputSource;
use mirror_controller::infrastructure::input_capture::InputSource;
use mirror_controller::infrastructure::storage::config::{self, AppConfig};
use mirror_controller::infrastructure::surface::StaticSurfaceLocator;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Mirror one Android phone's input onto many.
///
/// Every tap, swipe, key and text entry sent to the master is replayed on
/// every slave, with coordinates rescaled to each slave's screen.
#[derive(Debug, Parser)]
#[command(name = "mirror-controller", about = "Master/slave Android input mirroring controller", version)]
struct Cli {
    /// Configuration file.  Defaults to the platform config directory.
    #[arg(long, global = true, env = "FANOUT_MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Master device identifier (serial or `host:port`).  Overrides the file.
    #[arg(long, global = true)]
    master: Option<String>,

    /// Comma-separated slave identifiers.  Overrides the file.
    #[arg(long, global = true, value_delimiter = ',')]
    slaves: Option<Vec<String>>,

    /// Print reports as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an interactive mirroring session.
    Run {
        /// Event script to replay (`-` for stdin, the default).
        #[arg(long)]
        events: Option<PathBuf>,

        /// Do not launch the mirroring display.
        #[arg(long)]
        no_display: bool,
    },
    /// Tap at master coordinates on every device.
    Tap { x: i32, y: i32 },
    /// Swipe between master coordinates on every device.
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        /// Swipe duration in milliseconds.
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Send a key event (`BACK`, `KEYCODE_HOME`, `66`, ...) to every device.
    Key { code: AndroidKeyCode },
    /// Type text on every device.
    Text { value: String },
    /// Tap the same raw coordinates on every device.
    TapAll { x: i32, y: i32 },
    /// Swipe the same raw coordinates on every device.
    SwipeAll {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        #[arg(long)]
        duration: Option<u32>,
    },
    /// Send a key event to every device without going through the dispatcher.
    KeyAll { code: AndroidKeyCode },
    /// Type text on every device without going through the dispatcher.
    TextAll { value: String },
    /// Install an APK on every device.
    InstallAll { apk: PathBuf },
    /// Start `PACKAGE/ACTIVITY` on every device.
    LaunchAll { package: String, activity: String },
    /// Save a screenshot of every device as `DIR/screenshot_<id>.png`.
    ScreenshotAll {
        #[arg(default_value = ".")]
        dir: PathBuf,
    },
    /// Show model, Android version and screen size of every device.
    Info,
}

impl Cli {
    /// Applies `--master` and `--slaves` on top of the loaded file.
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(master) = &self.master {
            config.session.master = Some(master.clone());
        }
        if let Some(slaves) = &self.slaves {
            config.session.slaves = slaves.iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => {
            config::load_config_from(path).with_context(|| format!("failed to load config from {}", path.display()))
        }
        None => config::load_config().context("failed to load config"),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.session.log_level)),
        )
        .init();

    let devices = config.session.device_set().context("invalid device configuration")?;
    info!("master {} with {} slave(s)", devices.master(), devices.slaves().len());

    let bridge: Arc<dyn DeviceBridge> = Arc::new(AdbBridge::new(config.bridge.adb_path.clone()));
    let json = cli.json;

    match cli.command {
        Command::Run { events, no_display } => run_session(&config, devices, bridge, events, no_display).await,
        Command::Tap { x, y } => {
            let dispatcher = dispatcher(&config, devices, bridge).await;
            print_report(json, &dispatcher.dispatch_tap(Point::new(x, y)).await)
        }
        Command::Swipe { x1, y1, x2, y2, duration } => {
            let dispatcher = dispatcher(&config, devices, bridge).await;
            print_report(json, &dispatcher.dispatch_drag(Point::new(x1, y1), Point::new(x2, y2), duration).await)
        }
        Command::Key { code } => {
            let dispatcher = dispatcher(&config, devices, bridge).await;
            print_report(json, &dispatcher.dispatch_key(code).await)
        }
        Command::Text { value } => {
            let dispatcher = dispatcher(&config, devices, bridge).await;
            print_report(json, &dispatcher.dispatch_text(&value).await)
        }
        Command::TapAll { x, y } => {
            run_all(&config, &devices, bridge, InputPrimitive::Tap { at: Point::new(x, y) }, json).await
        }
        Command::SwipeAll { x1, y1, x2, y2, duration } => {
            let primitive = InputPrimitive::Swipe {
                start: Point::new(x1, y1),
                end: Point::new(x2, y2),
                duration_ms: duration.unwrap_or(config.timing.swipe_duration_ms),
            };
            run_all(&config, &devices, bridge, primitive, json).await
        }
        Command::KeyAll { code } => run_all(&config, &devices, bridge, InputPrimitive::KeyEvent { code }, json).await,
        Command::TextAll { value } => run_all(&config, &devices, bridge, InputPrimitive::Text { value }, json).await,
        Command::InstallAll { apk } => {
            anyhow::ensure!(apk.is_file(), "APK not found: {}", apk.display());
            run_all(&config, &devices, bridge, InputPrimitive::Install { apk }, json).await
        }
        Command::LaunchAll { package, activity } => {
            run_all(&config, &devices, bridge, InputPrimitive::LaunchActivity { package, activity }, json).await
        }
        Command::ScreenshotAll { dir } => {
            std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
            let jobs = devices
                .endpoints()
                .into_iter()
                .map(|endpoint| {
                    let primitive = InputPrimitive::screenshot_into(&dir, &endpoint);
                    (endpoint, primitive)
                })
                .collect();
            run_jobs(&config, bridge, "screenshot", jobs, json).await
        }
        Command::Info => show_info(&config, &devices, bridge, json).await,
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn dispatcher(config: &AppConfig, devices: DeviceSet, bridge: Arc<dyn DeviceBridge>) -> ActionDispatcher {
    let cache = Arc::new(
        ScreenGeometryCache::new(Arc::clone(&bridge), config.timing.query_timeout())
            .with_retry_after(config.timing.geometry_retry()),
    );
    cache.warm(&devices.endpoints()).await;
    let executor = CommandExecutor::new(bridge, config.timing.timeouts());
    ActionDispatcher::new(devices, cache, executor, config.mapping.slave_mode, config.timing.swipe_duration_ms)
}

async fn run_all(
    config: &AppConfig,
    devices: &DeviceSet,
    bridge: Arc<dyn DeviceBridge>,
    primitive: InputPrimitive,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let jobs = devices.endpoints().into_iter().map(|endpoint| (endpoint, primitive.clone())).collect();
    run_jobs(config, bridge, primitive.kind(), jobs, json).await
}

async fn run_jobs(
    config: &AppConfig,
    bridge: Arc<dyn DeviceBridge>,
    kind: &str,
    jobs: Vec<(DeviceEndpoint, InputPrimitive)>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let executor = CommandExecutor::new(bridge, config.timing.timeouts());
    let (stop, signal) = stop_pair();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received Ctrl+C, cancelling");
            stop.stop();
        }
    });

    let results = executor.execute_each(&jobs, &signal).await;
    interrupt.abort();

    if json {
        println!("{}", serde_json::to_string_pretty(&results).context("failed to encode results")?);
    } else {
        for (result, (_, primitive)) in results.iter().zip(&jobs) {
            println!("{}", describe_command(result, primitive));
        }
        let ok = results.iter().filter(|r| r.success).count();
        println!("{kind}: {ok} of {} devices succeeded", results.len());
    }
    Ok(exit_code(results.iter().any(|r| r.success)))
}

async fn show_info(
    config: &AppConfig,
    devices: &DeviceSet,
    bridge: Arc<dyn DeviceBridge>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let cache = Arc::new(ScreenGeometryCache::new(Arc::clone(&bridge), config.timing.query_timeout()));
    let infos = InspectDevicesUseCase::new(bridge, cache, config.timing.query_timeout()).inspect_all(devices).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&infos).context("failed to encode device info")?);
    } else {
        for info in &infos {
            println!("{}", describe_device(info));
        }
    }
    Ok(exit_code(infos.iter().any(DeviceInfo::is_reachable)))
}

async fn run_session(
    config: &AppConfig,
    devices: DeviceSet,
    bridge: Arc<dyn DeviceBridge>,
    events: Option<PathBuf>,
    no_display: bool,
) -> anyhow::Result<ExitCode> {
    let surface = config
        .surface
        .context("no mirroring window position configured; add a [surface] section with x, y, width and height")?;
    let locator = Arc::new(StaticSurfaceLocator::new(surface.client_area(), surface.title_bar));

    let input: Box<dyn InputSource> = match events {
        Some(path) if path.as_os_str() != "-" => Box::new(
            ScriptInputSource::from_path(&path)
                .with_context(|| format!("failed to open event script {}", path.display()))?,
        ),
        _ => Box::new(ScriptInputSource::stdin()),
    };

    let display: Option<Box<dyn DisplayProcess>> = (config.display.enabled && !no_display).then(|| {
        Box::new(ScrcpyDisplay::new(ScrcpyOptions {
            program: config.display.scrcpy_path.clone(),
            device: devices.master().clone(),
            window_title: config.session.window_title.clone(),
            startup_grace: config.timing.display_startup(),
        })) as Box<dyn DisplayProcess>
    });

    let settings = SessionSettings {
        input: MirrorInputSettings {
            window_title: config.session.window_title.clone(),
            scroll_distance: config.gesture.scroll_distance,
            swipe_duration_ms: config.timing.swipe_duration_ms,
            right_click_back: config.gesture.right_click_back,
        },
        drag_threshold: config.gesture.drag_threshold,
        slave_mode: config.mapping.slave_mode,
        timeouts: config.timing.timeouts(),
        probe_timeout: config.timing.query_timeout(),
        join_window: config.timing.join_window(),
        surface_wait: config.timing.surface_wait(),
        geometry_retry: config.timing.geometry_retry(),
    };

    let parts = SessionParts { devices, bridge, locator, input, display };
    let mut session = match MirrorSession::start(parts, settings).await {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}\n  hint: {}", e.remediation());
            return Ok(ExitCode::FAILURE);
        }
    };

    let interrupted = tokio::select! {
        _ = session.wait() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("received Ctrl+C, stopping session");
    }

    let summary = session.shutdown().await;
    println!("{} action(s) mirrored", summary.dispatched);
    Ok(ExitCode::SUCCESS)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_report(json: bool, report: &DispatchReport) -> anyhow::Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(report).context("failed to encode report")?);
    } else {
        for result in &report.results {
            let outcome = match (&result.error, result.mapped) {
                (None, Some(at)) if result.degraded => format!("ok at {at} (unscaled)"),
                (None, Some(at)) => format!("ok at {at}"),
                (None, None) => "ok".to_string(),
                (Some(e), _) => format!("FAILED: {e}"),
            };
            println!("{} {}: {outcome}", result.role, result.endpoint);
        }
        println!("{}", report.log_summary());
    }
    Ok(exit_code(report.any_succeeded()))
}

fn describe_command(result: &CommandResult, primitive: &InputPrimitive) -> String {
    match (&result.error, primitive) {
        (None, InputPrimitive::Screenshot { local }) => format!("{}: saved {}", result.endpoint, local.display()),
        (None, _) if result.output.is_empty() => format!("{}: ok", result.endpoint),
        (None, _) => format!("{}: ok ({})", result.endpoint, result.output),
        (Some(e), _) => format!("{}: FAILED: {e}", result.endpoint),
    }
}

fn describe_device(info: &DeviceInfo) -> String {
    let role = info.role.map(|r| r.to_string()).unwrap_or_default();
    if !info.is_reachable() {
        return format!("{role} {}: unreachable", info.endpoint);
    }
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "?".to_string());
    let screen = info.geometry.map(|g| format!("{}x{}", g.width, g.height)).unwrap_or_else(|| "unknown".to_string());
    format!(
        "{role} {}: {} {} (Android {}), serial {}, screen {screen}",
        info.endpoint,
        field(&info.brand),
        field(&info.model),
        field(&info.android_version),
        field(&info.serial),
    )
}

fn exit_code(any_succeeded: bool) -> ExitCode {
    if any_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
