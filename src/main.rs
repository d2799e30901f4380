pub(crate) mod background;
pub(crate) mod bounds;
pub(crate) mod color;
pub(crate) mod config;
pub(crate) mod controller;
pub(crate) mod effects;
pub(crate) mod grid;
pub(crate) mod hardware;
pub(crate) mod intervaltimer;
pub(crate) mod olaoutput;
pub(crate) mod osc;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::Config;
use crate::controller::EffectController;
use crate::hardware::{NoIndicator, StatusIndicator};
use crate::intervaltimer::IntervalTimer;
use crate::olaoutput::OlaOutput;
use crate::osc::{OscIndicator, OscInput};

/// Ambient colors and lightning for an LED cloud
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML), defaults are used without one
    #[arg(short, long, value_name = "FILE")]
    config: Option<std::path::PathBuf>,

    /// OLA's OSC port
    #[arg(long, default_value = "127.0.0.1:7770")]
    ola_addr: SocketAddr,

    /// DMX universe the strip is patched to
    #[arg(long, default_value = "0")]
    universe: u32,

    /// Where the OSC buttons are received
    #[arg(long, default_value = "0.0.0.0:8000")]
    osc_listen: SocketAddr,

    /// Control surface that mirrors the status indicator
    #[arg(long)]
    osc_feedback: Option<SocketAddr>,

    /// Main loop interval, overrides the configuration file
    #[arg(long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Seed for reproducible storms
    #[arg(long)]
    seed: Option<u64>,
}

fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = match args.config.as_deref() {
        Some(path) => Config::load(path).map_err(|err| anyhow!(err))?,
        None => Config::default(),
    };

    if let Some(tick_ms) = args.tick_ms {
        config.tick_ms = tick_ms;
        config.validate().map_err(|err| anyhow!(err))?;
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Cli::parse();
    let config = load_config(&args).context("Invalid configuration")?;
    let led_count = config.grid().map_err(|err| anyhow!(err))?.led_count();

    let ola = OlaOutput::new(args.ola_addr, args.universe, led_count)
        .map_err(|err| anyhow!(err))
        .context("Cannot set up OLA output")?;
    let buttons = OscInput::new(args.osc_listen)
        .map_err(|err| anyhow!(err))
        .context("Cannot set up OSC input")?;
    let indicator: Box<dyn StatusIndicator> = match args.osc_feedback {
        Some(addr) => Box::new(
            OscIndicator::new(addr)
                .map_err(|err| anyhow!(err))
                .context("Cannot set up OSC indicator")?,
        ),
        None => Box::new(NoIndicator),
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut cloud = EffectController::new(&config, ola, buttons, indicator, rng)
        .map_err(|err| anyhow!(err))?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("Cannot install Ctrl-C handler")?;
    }

    cloud.startup();
    let mut timer = IntervalTimer::new(Duration::from_millis(config.tick_ms), true);
    log::debug!("Ticking every {:?}", timer.interval());
    while running.load(Ordering::SeqCst) {
        let elapsed = timer.sleep_until_next_tick();
        cloud.tick(elapsed);
    }

    if cloud.is_active() {
        log::info!("Interrupted while lightning was running");
    }

    cloud.shutdown();
    Ok(())
}
