/*
Body Controller - convierte poses corporales en teclas

El daemon:
1. Lee frames de pose (una línea JSON por frame) desde stdin, tal como los
   entrega el estimador de pose externo
2. Detecta movimientos por checkpoints sobre cada frame
3. Filtra por grupos de exclusión y presiona/suelta teclas vía /dev/uinput

Uso:
    pose-estimator | ./target/release/body-controller [--dry-run] [--keyboard] [config.json]

Para /dev/uinput sin root:
    sg input -c './target/release/body-controller config.json'
*/

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, select, tick};
use log::{error, info, warn, LevelFilter};
use std::env;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use body_controller::config::AppConfig;
use body_controller::hid::{DryRunKeyboard, KeyInjector, UinputKeyboard};
use body_controller::pipeline::Pipeline;
use body_controller::types::{FrameRecord, PoseSnapshot};

const DEFAULT_CONFIG_PATH: &str = "body-controller.json";
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(10);
const FRAME_QUEUE: usize = 100;

struct DaemonOptions {
    config_path: PathBuf,
    dry_run: bool,
    force_keyboard: bool,
}

fn parse_args() -> Result<DaemonOptions> {
    let mut dry_run = false;
    let mut force_keyboard = false;
    let mut config_path: Option<PathBuf> = None;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" => dry_run = true,
            "--keyboard" => force_keyboard = true,
            _ => {
                if config_path.is_some() {
                    bail!("Uso: body-controller [--dry-run] [--keyboard] [config.json]");
                }
                config_path = Some(PathBuf::from(arg));
            }
        }
    }

    Ok(DaemonOptions {
        config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        dry_run,
        force_keyboard,
    })
}

/// Lee stdin en segundo plano; cada línea válida es un frame
fn spawn_stdin_reader(tx: crossbeam_channel::Sender<PoseSnapshot>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for (line_idx, line) in stdin.lock().lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("❌ Error leyendo stdin: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FrameRecord>(&line) {
                Ok(record) => {
                    if tx.send(record.to_snapshot()).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("⚠️  Frame inválido en línea {}: {}", line_idx + 1, e),
            }
        }
        info!("📭 stdin cerrado");
    });
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opts = parse_args()?;
    info!("🎯 Body Controller");

    let mut config = AppConfig::load(&opts.config_path)?;
    if opts.force_keyboard {
        config.keyboard_enabled = true;
    }

    let keyboard: Box<dyn KeyInjector> = if opts.dry_run {
        info!("🔧 Modo: dry-run (sin /dev/uinput)");
        Box::new(DryRunKeyboard::log_only())
    } else {
        let kb = UinputKeyboard::new().context("No se pudo inicializar /dev/uinput")?;
        info!("✅ Teclado virtual inicializado (/dev/uinput)");
        Box::new(kb)
    };

    let mut pipeline = Pipeline::from_config(&config, keyboard)?;
    info!(
        "✅ {} movimientos cargados, teclado {}",
        pipeline.detector().catalog().list().len(),
        if config.keyboard_enabled { "activo" } else { "inactivo" }
    );

    let (tx, rx) = bounded::<PoseSnapshot>(FRAME_QUEUE);
    spawn_stdin_reader(tx);
    let ticker = tick(RELEASE_POLL_INTERVAL);
    let start = Instant::now();

    info!("🎬 Esperando frames en stdin...");

    loop {
        select! {
            recv(rx) -> msg => {
                match msg {
                    Ok(snapshot) => {
                        let now_ms = start.elapsed().as_millis() as u64;
                        pipeline.process_frame(&snapshot, now_ms);
                    }
                    Err(_) => break,
                }
            }
            recv(ticker) -> _ => {
                pipeline.tick(start.elapsed().as_millis() as u64);
            }
        }
    }

    pipeline.release_all();
    info!(
        "👋 Saliendo: {} frames procesados, {} descartados\n{}",
        pipeline.frames_processed(),
        pipeline.frames_skipped(),
        pipeline.events()
    );
    Ok(())
}
