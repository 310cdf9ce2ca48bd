use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use csv::{ReaderBuilder, StringRecord};

use crate::types::{Landmark, LandmarkPoint, PoseSnapshot};

/// Frame grabado, listo para pasar por el pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub frame: usize,
    pub timestamp_ms: u64,
    pub snapshot: PoseSnapshot,
}

struct PendingFrame {
    timestamp_ms: u64,
    points: Vec<(Landmark, LandmarkPoint)>,
}

fn parse_f32(record: &StringRecord, idx: usize, name: &str, row: usize) -> Result<f32> {
    record[idx]
        .trim()
        .parse()
        .with_context(|| format!("{} inválido en fila {}", name, row))
}

/// Carga frames de pose desde un CSV con el formato
/// frame,timestamp_ms,landmark,x,y,z,wx,wy,wz (una fila por landmark).
/// Si wx,wy,wz vienen vacíos se usan las coordenadas de imagen.
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<RecordedFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: BTreeMap<usize, PendingFrame> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Fila {} inválida en {:?}", row, path))?;
        if record.len() < 6 {
            bail!("La fila {} no tiene al menos 6 columnas", row);
        }

        let frame: usize = record[0]
            .trim()
            .parse()
            .with_context(|| format!("frame inválido en fila {}", row))?;
        let timestamp_ms: u64 = record[1]
            .trim()
            .parse()
            .with_context(|| format!("timestamp_ms inválido en fila {}", row))?;
        let landmark = Landmark::from_name(record[2].trim())
            .ok_or_else(|| anyhow!("Landmark desconocido '{}' en fila {}", &record[2], row))?;

        let pose = [
            parse_f32(&record, 3, "x", row)?,
            parse_f32(&record, 4, "y", row)?,
            parse_f32(&record, 5, "z", row)?,
        ];
        let has_world = record.len() >= 9 && (6..9).all(|i| !record[i].trim().is_empty());
        let world = if has_world {
            [
                parse_f32(&record, 6, "wx", row)?,
                parse_f32(&record, 7, "wy", row)?,
                parse_f32(&record, 8, "wz", row)?,
            ]
        } else {
            pose
        };

        let pending = frames.entry(frame).or_insert_with(|| PendingFrame {
            timestamp_ms,
            points: Vec::new(),
        });
        ensure!(
            pending.timestamp_ms == timestamp_ms,
            "El frame {} tiene timestamps distintos ({} y {}) en fila {}",
            frame,
            pending.timestamp_ms,
            timestamp_ms,
            row
        );
        pending.points.push((landmark, LandmarkPoint::new(pose, world)));
    }

    if frames.is_empty() {
        return Err(anyhow!("El CSV {:?} no contiene datos", path));
    }

    let mut out = Vec::with_capacity(frames.len());
    let mut last_ts = 0;
    for (frame, pending) in frames {
        ensure!(
            pending.timestamp_ms >= last_ts,
            "El timestamp del frame {} retrocede ({} < {})",
            frame,
            pending.timestamp_ms,
            last_ts
        );
        last_ts = pending.timestamp_ms;
        out.push(RecordedFrame {
            frame,
            timestamp_ms: pending.timestamp_ms,
            snapshot: PoseSnapshot::from_points(pending.points),
        });
    }

    Ok(out)
}
