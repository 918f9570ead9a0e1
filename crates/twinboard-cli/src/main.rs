//! `twinboard-cli` – runs a simulated robot on one or two controller boards.
//!
//! 1. Loads `~/.twinboard/config.toml` (or `--config PATH`) and applies
//!    `TWINBOARD_*` overrides; a bad configuration exits with status 2.
//! 2. Wires the board for the configured role. A split role builds **both**
//!    halves in-process and joins them with a loopback link, so the pair can
//!    be exercised without hardware.
//! 3. Feeds a scripted transmitter drill and prints a status line per second.
//! 4. Intercepts **Ctrl-C**: every board publishes its safe defaults, the
//!    actuators are released and the process exits.
//!
//! `twinboard init [PATH]` writes the default configuration; `--help` lists
//! the flags and environment overrides.

mod config;
mod scenario;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, warn};

use twinboard_middleware::{LinkHealth, Subscriber, loopback_pair};
use twinboard_runtime::simulation::SimBoard;
use twinboard_runtime::telemetry::init_tracing;
use twinboard_runtime::{Board, BoardConfig, topics};
use twinboard_types::{
    BoardRole, ChassisFeedback, ConfigError, GimbalFeedback, OperatorLink, ShootFeedback,
};

/// Run a simulated robot on one or two controller boards.
#[derive(Parser, Debug)]
#[command(name = "twinboard")]
#[command(version, long_about = None)]
#[command(after_help = "Environment: TWINBOARD_ROLE, TWINBOARD_KINEMATICS, TWINBOARD_VISION,\n\
                        TWINBOARD_OPERATOR_LINK, TWINBOARD_RATE, TWINBOARD_CYCLES,\n\
                        TWINBOARD_LOG_FORMAT, RUST_LOG")]
struct Cli {
    /// Config file (defaults to ~/.twinboard/config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop after N dispatcher cycles
    #[arg(short = 'n', long, value_name = "N")]
    cycles: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Write the default configuration
    Init {
        /// Destination (defaults to ~/.twinboard/config.toml)
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Init { path }) = cli.command {
        let path = path.unwrap_or_else(config::config_path);
        return match config::save_to(&config::Config::default(), &path) {
            Ok(()) => {
                println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {e}", "Error saving config".red());
                ExitCode::FAILURE
            }
        };
    }

    let mut cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red());
            return ExitCode::from(2);
        }
    };
    if cli.cycles.is_some() {
        cfg.run.max_cycles = cli.cycles;
    }

    let _telemetry = init_tracing("twinboard", &cfg.board.role.to_string());
    print_banner(&cfg.board);

    // ── Shared shutdown flag ──────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – forcing safe outputs …".yellow().bold()
        );
        shutdown_clone.store(true, Ordering::Release);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; stop with a cycle budget instead");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        if cfg.board.role == BoardRole::Full {
            run_full(&cfg, shutdown).await
        } else {
            run_split(&cfg, shutdown).await
        }
    });

    match result {
        Ok(()) => {
            println!("  {}", "✓ Outputs released. Exiting twinboard.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "Board wiring failed".red());
            ExitCode::from(2)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runners
// ─────────────────────────────────────────────────────────────────────────────

async fn run_full(cfg: &config::Config, shutdown: Arc<AtomicBool>) -> Result<(), ConfigError> {
    let sim = SimBoard::new(cfg.board.descriptor());
    let mut board = Board::new(&cfg.board, sim.io())?;

    let status = StatusFeeds::subscribe(&board, &board, None)?;
    let drill = tokio::spawn(scenario::drive(
        drill_target(&sim, cfg.board.operator_link),
        Some(sim.imu.clone()),
        shutdown.clone(),
    ));
    let reporter = tokio::spawn(status.report(
        Duration::from_secs(cfg.run.status_interval_secs.max(1)),
        shutdown.clone(),
    ));

    let cycles = board.run(&shutdown, cfg.run.max_cycles).await;
    shutdown.store(true, Ordering::Release);
    let _ = tokio::join!(drill, reporter);
    println!("  {} cycles on the {} board", cycles.to_string().bold(), "full".cyan());
    Ok(())
}

async fn run_split(cfg: &config::Config, shutdown: Arc<AtomicBool>) -> Result<(), ConfigError> {
    let (lower_end, upper_end, _cable) = loopback_pair(cfg.run.link_capacity);

    let lower_cfg = BoardConfig {
        role: BoardRole::ChassisSide,
        ..cfg.board.clone()
    };
    let lower_sim = SimBoard::new(lower_cfg.descriptor());
    let mut lower_io = lower_sim.io();
    lower_io.link = Some(Box::new(lower_end.tx));
    let mut lower = Board::new(&lower_cfg, lower_io)?;

    let upper_cfg = BoardConfig {
        role: BoardRole::GimbalSide,
        ..cfg.board.clone()
    };
    let upper_sim = SimBoard::new(upper_cfg.descriptor());
    let mut upper_io = upper_sim.io();
    upper_io.link = Some(Box::new(upper_end.tx));
    let mut upper = Board::new(&upper_cfg, upper_io)?;

    let pumps = [
        lower.spawn_link_pump(lower_end.rx),
        upper.spawn_link_pump(upper_end.rx),
    ];
    let status = StatusFeeds::subscribe(&lower, &upper, lower.link_health())?;
    let drill = tokio::spawn(scenario::drive(
        drill_target(&lower_sim, cfg.board.operator_link),
        Some(upper_sim.imu.clone()),
        shutdown.clone(),
    ));
    let reporter = tokio::spawn(status.report(
        Duration::from_secs(cfg.run.status_interval_secs.max(1)),
        shutdown.clone(),
    ));

    let (lower_cycles, upper_cycles) = tokio::join!(
        lower.run(&shutdown, cfg.run.max_cycles),
        upper.run(&shutdown, cfg.run.max_cycles),
    );
    shutdown.store(true, Ordering::Release);
    let _ = tokio::join!(drill, reporter);
    for pump in pumps.into_iter().flatten() {
        pump.abort();
    }
    println!(
        "  {} cycles on the {} board, {} on the {} board",
        lower_cycles.to_string().bold(),
        "chassis-side".cyan(),
        upper_cycles.to_string().bold(),
        "gimbal-side".cyan()
    );
    Ok(())
}

fn drill_target(sim: &SimBoard, link: OperatorLink) -> scenario::Operator {
    match link {
        OperatorLink::Remote => scenario::Operator::Remote(sim.operator.clone()),
        OperatorLink::VideoLink => scenario::Operator::VideoLink(sim.video_link.clone()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status lines
// ─────────────────────────────────────────────────────────────────────────────

struct StatusFeeds {
    chassis: Subscriber<ChassisFeedback>,
    gimbal: Subscriber<GimbalFeedback>,
    shoot: Subscriber<ShootFeedback>,
    link: Option<Arc<LinkHealth>>,
}

impl StatusFeeds {
    /// Chassis and shooter feedback come from `lower`, attitude from `upper`.
    fn subscribe(
        lower: &Board,
        upper: &Board,
        link: Option<Arc<LinkHealth>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            chassis: lower.bus().subscribe(topics::CHASSIS_FEED)?,
            gimbal: upper.bus().subscribe(topics::GIMBAL_FEED)?,
            shoot: lower.bus().subscribe(topics::SHOOT_FEED)?,
            link,
        })
    }

    async fn report(self, every: Duration, shutdown: Arc<AtomicBool>) {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        while !shutdown.load(Ordering::Acquire) {
            interval.tick().await;
            println!("{}", self.line());
        }
    }

    fn line(&self) -> String {
        let chassis = self.chassis.fetch();
        let gimbal = self.gimbal.fetch();
        let shoot = self.shoot.fetch();
        let link = match &self.link {
            None => "n/a".dimmed(),
            Some(h) if h.is_fresh() => "up".green(),
            Some(h) => format!("stale ({} missed)", h.age()).red(),
        };
        let heat = if shoot.heat_fault {
            "HEAT".red().bold()
        } else {
            "ok".green()
        };
        format!(
            "  chassis {:<16} wheels [{:>7.0} {:>7.0} {:>7.0} {:>7.0}]  yaw {:>7.2}°  pitch {:>6.2}°  shots {:>4} heat {}  link {}",
            format!("{:?}", chassis.chassis_mode),
            chassis.wheel_refs[0],
            chassis.wheel_refs[1],
            chassis.wheel_refs[2],
            chassis.wheel_refs[3],
            gimbal.imu_yaw,
            gimbal.pitch_angle,
            shoot.shots_fired,
            heat,
            link,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner(board: &BoardConfig) {
    println!();
    println!("{}", r#"  _______       _       __                       __"#.bold().cyan());
    println!("{}", r#" /_  __/ |     / (_)___ / /_  ____  ____ ______ ____/ /"#.bold().cyan());
    println!("{}", r#"  / /  | | /| / / / __ \/ __ \/ __ \/ __ `/ ___/ __  / "#.bold().cyan());
    println!("{}", r#" / /   | |/ |/ / / / / / /_/ / /_/ / /_/ / /  / /_/ /  "#.bold().cyan());
    println!("{}", r#"/_/    |__/|__/_/_/ /_/_.___/\____/\__,_/_/   \__,_/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "TwinBoard".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!(
        "  role {}  kinematics {}  vision {}  operator {}  rate {} Hz",
        board.role.to_string().bold(),
        board.kinematics.to_string().bold(),
        board.vision.to_string().bold(),
        board.operator_link.to_string().bold(),
        board.dispatch.rate_hz.to_string().bold()
    );
    println!();
}
