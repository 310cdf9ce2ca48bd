use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use log::LevelFilter;

use body_controller::config::AppConfig;
use body_controller::csv_loader::load_frames_from_csv;
use body_controller::hid::DryRunKeyboard;
use body_controller::pipeline::Pipeline;

struct ReplayOptions {
    dump_metrics: bool,
    config_path: Option<PathBuf>,
}

const USAGE: &str = "Uso: replay_frames [--dump-metrics] [--config config.json] <frames.csv>";

fn parse_args() -> Result<(PathBuf, ReplayOptions)> {
    let mut dump_metrics = false;
    let mut config_path: Option<PathBuf> = None;
    let mut csv_path: Option<PathBuf> = None;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dump-metrics" => dump_metrics = true,
            "--config" => {
                let path = args.next().ok_or_else(|| anyhow!(USAGE))?;
                config_path = Some(PathBuf::from(path));
            }
            _ => {
                if csv_path.is_some() {
                    bail!(USAGE);
                }
                csv_path = Some(PathBuf::from(arg));
            }
        }
    }

    let csv_path = csv_path.ok_or_else(|| anyhow!("Debes especificar un archivo CSV"))?;
    Ok((
        csv_path,
        ReplayOptions {
            dump_metrics,
            config_path,
        },
    ))
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .init();

    let (csv_path, opts) = parse_args()?;
    println!("🎞️  Reproduciendo frames desde {:?}", csv_path);

    let mut config = match &opts.config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    // La repetición siempre usa el teclado simulado
    config.keyboard_enabled = true;

    let frames = load_frames_from_csv(&csv_path)?;
    println!("ℹ️  {} frames cargados", frames.len());

    let mut pipeline = Pipeline::from_config(&config, DryRunKeyboard::new())?;

    for recorded in &frames {
        let admitted = pipeline.process_frame(&recorded.snapshot, recorded.timestamp_ms);

        if opts.dump_metrics {
            println!("\n── frame {} @ {}ms", recorded.frame, recorded.timestamp_ms);
            print!("{}", recorded.snapshot.dump());
        }
        for event in &admitted {
            println!(
                "✋ [{:>6}ms] {} ({})",
                event.timestamp_ms, event.name, event.class
            );
        }
        for action in pipeline.keyboard_mut().take_actions() {
            println!("⌨️  [{:>6}ms] {}", recorded.timestamp_ms, action);
        }
    }

    // Dejar vencer los intervalos pendientes
    let last_ts = frames.last().map(|f| f.timestamp_ms).unwrap_or(0);
    let intervals = config.press_intervals;
    let drain_at = last_ts + intervals.click_ms.max(intervals.hold_ms).max(intervals.hold_fast_ms);
    pipeline.tick(drain_at);
    for action in pipeline.keyboard_mut().take_actions() {
        println!("⌨️  [{:>6}ms] {}", drain_at, action);
    }

    println!(
        "\n📊 {} frames procesados, {} descartados, {} comandos sin entregar",
        pipeline.frames_processed(),
        pipeline.frames_skipped(),
        pipeline.undelivered()
    );
    println!("{}", pipeline.events());
    Ok(())
}
