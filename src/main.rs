use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use common::physical::MAX_SERVO_DEGREES;
use pan_tilt_tracker::{
    config::{ActuatorConfig, AxisConfig, RigConfig},
    externals::{
        actuators::{noop::NoopActuator, serial::SerialServoActuator, simulated::SimulatedActuator},
        event_logging::EventLoggingModule,
        position_stream::{adapters::MailboxLocationSource, client::PositionStreamClient},
    },
    internals::{
        control_system::{
            axis::AxisController,
            rig::{AxisRun, PanTiltRig},
        },
        core::ports::{AngleActuator, MotionEventPort},
    },
};
use tokio::signal;
use tracing::{error, info, level_filters::LevelFilter};

/// Steers a pan/tilt rig onto the target reported by a remote vision process.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Position server as host[:port].
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Never move both axes at the same time.
    #[arg(long)]
    alternate: bool,

    /// Use no-op actuators.
    #[arg(long)]
    dry_run: bool,

    #[arg(long)]
    log_level: Option<String>,
}

fn build_actuator(axis: &AxisConfig, dry_run: bool) -> Result<Box<dyn AngleActuator>> {
    if dry_run {
        return Ok(Box::new(NoopActuator));
    }
    Ok(match &axis.actuator {
        ActuatorConfig::Noop => Box::new(NoopActuator),
        ActuatorConfig::Simulated { home_angle } => {
            Box::new(
                SimulatedActuator::new(*home_angle)
                    .with_limits(0, i32::from(MAX_SERVO_DEGREES))
                    .with_real_time(true),
            )
        }
        ActuatorConfig::Serial {
            port,
            baud_rate,
            channel,
            home_angle,
        } => Box::new(
            SerialServoActuator::open(port, *baud_rate, *channel, *home_angle)
                .with_context(|| format!("Failed to open actuator for axis '{}'", axis.name))?,
        ),
    })
}

fn load_config(args: &Args) -> Result<RigConfig> {
    let mut config = match &args.config {
        Some(path) => RigConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RigConfig::default(),
    };

    if let Some(endpoint) = &args.endpoint {
        config.stream.endpoint = endpoint.clone();
    }
    if args.alternate {
        config.pan.alternate = true;
        config.tilt.alternate = true;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let level: LevelFilter = config
        .log_level
        .parse()
        .with_context(|| format!("Invalid log level '{}'", config.log_level))?;
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let EventLoggingModule {
        motion_event_adapter,
    } = EventLoggingModule::initialize();
    let event_ports = || vec![motion_event_adapter.clone() as Arc<dyn MotionEventPort>];

    // NOTE: A mailbox has a single reader, so each axis gets its own client.
    let stream_settings = config.stream.settings()?;
    let pan_client = PositionStreamClient::new(stream_settings.clone());
    let tilt_client = PositionStreamClient::new(stream_settings);
    pan_client.start(config.stream.connector())?;
    tilt_client.start(config.stream.connector())?;

    let pan = AxisController::new(
        config.pan.settings(),
        build_actuator(&config.pan, args.dry_run)?,
        event_ports(),
    )?;
    let tilt = AxisController::new(
        config.tilt.settings(),
        build_actuator(&config.tilt, args.dry_run)?,
        event_ports(),
    )?;
    let rig = PanTiltRig::new(pan, tilt)?;

    rig.start(
        AxisRun {
            forward: config.pan.forward,
            source: MailboxLocationSource::new(pan_client.mailbox(), config.pan.projection),
        },
        AxisRun {
            forward: config.tilt.forward,
            source: MailboxLocationSource::new(tilt_client.mailbox(), config.tilt.projection),
        },
    )?;
    info!(
        "Tracking targets from {} (alternate={}).",
        pan_client.endpoint(),
        rig.is_alternating()
    );

    match signal::ctrl_c().await {
        Ok(_) => info!("Received Ctrl-C, shutting down."),
        Err(e) => error!("Failed to listen for ctrl_c. Error: {}", e),
    }

    rig.stop();
    pan_client.close();
    tilt_client.close();

    tokio::task::spawn_blocking(move || -> Result<()> {
        rig.join()?;
        pan_client.join()?;
        tilt_client.join()?;
        Ok(())
    })
    .await??;

    info!("Exiting.");
    Ok(())
}
