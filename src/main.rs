// Bench run: bring-up, direction calibration and one step move on a simulated joint
//
// Usage: cargo run -- --encoder mt6701-ssi --increment 800 --json
// Set RUST_LOG=debug for per-cycle PID traces.

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arm_joint_runtime::config::{DEFAULT_INCREMENT, DEFAULT_INTERVAL_US, DEFAULT_RUN_MS};
use arm_joint_runtime::encoder::{AngleSensor, Mt6701I2c};
use arm_joint_runtime::hal::CancelToken;
use arm_joint_runtime::messages::RunSummary;
use arm_joint_runtime::motor::DriveStage;
use arm_joint_runtime::pid::PidGains;
use arm_joint_runtime::sim::{PlantParams, SimJoint};
use arm_joint_runtime::{ControlError, MotorController};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EncoderKind {
    As5600,
    Mt6701Ssi,
    Mt6701I2c,
}

#[derive(Debug, Parser)]
#[command(about = "Joint controller bench run against a simulated motor and encoder")]
struct Args {
    #[arg(long, value_enum, default_value_t = EncoderKind::As5600)]
    encoder: EncoderKind,

    /// Counts to move from the starting position (in the encoder's own resolution)
    #[arg(long, default_value_t = DEFAULT_INCREMENT, allow_hyphen_values = true)]
    increment: i32,

    #[arg(long, default_value_t = DEFAULT_RUN_MS)]
    duration_ms: u32,

    #[arg(long, default_value_t = DEFAULT_INTERVAL_US)]
    interval_us: u32,

    /// Full gain set as JSON, e.g. '{"kp":1.5,"ki":5.0,"kd":0.1}'; --kp/--ki/--kd override it
    #[arg(long, value_parser = parse_gains)]
    gains: Option<PidGains>,

    #[arg(long)]
    kp: Option<f32>,

    #[arg(long)]
    ki: Option<f32>,

    #[arg(long)]
    kd: Option<f32>,

    /// Simulate motor leads wired backwards
    #[arg(long)]
    inverted_wiring: bool,

    /// Skip the wiggle and direction probe
    #[arg(long)]
    skip_bring_up: bool,

    /// Print one JSON line per cycle and a JSON summary
    #[arg(long)]
    json: bool,
}

fn parse_gains(json: &str) -> Result<PidGains, serde_json::Error> {
    serde_json::from_str(json)
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cancel = CancelToken::new();

    // Ctrl+C acts as the emergency stop; the loop sees it on its next cycle
    let estop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Emergency stop requested");
            estop.cancel();
        }
    });

    let json = args.json;
    let summary = tokio::task::spawn_blocking(move || bench(&args, &cancel)).await??;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        info!(
            "Done: target={} final={:?} error={:?} cycles={} sat(i/out)={}/{} crc={}",
            summary.target,
            summary.final_position,
            summary.final_error,
            summary.cycles,
            summary.i_saturations,
            summary.output_saturations,
            summary.crc_mismatches
        );
    }
    Ok(())
}

fn bench(args: &Args, cancel: &CancelToken) -> Result<RunSummary, ControlError> {
    let joint = SimJoint::new(PlantParams {
        inverted_wiring: args.inverted_wiring,
        ..PlantParams::default()
    });

    match args.encoder {
        EncoderKind::As5600 => session(&joint, joint.as5600(), args, cancel),
        EncoderKind::Mt6701Ssi => session(&joint, joint.mt6701_ssi()?, args, cancel),
        EncoderKind::Mt6701I2c => {
            let mut sensor = Mt6701I2c::probe(joint.i2c())?;
            let config = sensor.read_config()?;
            info!(
                "MT6701 config: direction={:?} zero={:.2}° output={:?} z-pulse={}",
                config.direction,
                config.zero_degrees(),
                config.output_mode,
                config.z_pulse_width()
            );
            session(&joint, sensor, args, cancel)
        }
    }
}

fn session<S: AngleSensor>(
    joint: &SimJoint,
    sensor: S,
    args: &Args,
    cancel: &CancelToken,
) -> Result<RunSummary, ControlError> {
    let drive = DriveStage::new(joint.forward_pwm(), joint.reverse_pwm())?;
    let mut controller = MotorController::new(drive, sensor, joint.clock(), joint.delay());

    let base = args.gains.unwrap_or_else(|| controller.gains());
    controller.set_gains(PidGains {
        kp: args.kp.unwrap_or(base.kp),
        ki: args.ki.unwrap_or(base.ki),
        kd: args.kd.unwrap_or(base.kd),
    });
    info!("{}", controller);

    if !args.skip_bring_up {
        controller.bring_up()?;
    }

    let json = args.json;
    controller.step_to_offset_with(
        args.increment,
        args.duration_ms,
        args.interval_us,
        cancel,
        |report| {
            if json {
                match serde_json::to_string(report) {
                    Ok(line) => println!("{}", line),
                    Err(e) => warn!("Failed to serialize cycle report: {}", e),
                }
            }
        },
    )
}
