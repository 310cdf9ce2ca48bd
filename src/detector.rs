//! Detector de movimientos por checkpoints
//!
//! El estado de ejecución (activo / última activación) vive en un arreglo
//! paralelo al catálogo, indexado por movimiento y checkpoint. Cada frame se
//! evalúa sobre una copia de ese arreglo que solo se confirma si el frame
//! termina sin error.

use log::debug;
use std::collections::HashSet;

use crate::catalog::{CommandClass, MovementCatalog};
use crate::condition::{ConditionError, Thresholds};
use crate::keys::CommandKeyMappings;
use crate::types::PoseSnapshot;

/// Comando emitido cuando un movimiento completa todos sus checkpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEvent {
    pub name: String,
    pub class: CommandClass,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointState {
    pub active: bool,
    pub last_active_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct MovementState {
    checkpoints: Vec<CheckpointState>,
    /// Se desarma al disparar; se rearma cuando el checkpoint 0 vuelve a activarse
    armed: bool,
}

impl MovementState {
    fn new(num_checkpoints: usize) -> Self {
        Self {
            checkpoints: vec![CheckpointState::default(); num_checkpoints],
            armed: true,
        }
    }
}

pub struct MovementDetector {
    catalog: MovementCatalog,
    runtime: Vec<MovementState>,
}

impl MovementDetector {
    pub fn new(catalog: MovementCatalog) -> Self {
        let runtime = Self::fresh_runtime(&catalog);
        Self { catalog, runtime }
    }

    fn fresh_runtime(catalog: &MovementCatalog) -> Vec<MovementState> {
        catalog
            .list()
            .iter()
            .map(|m| MovementState::new(m.checkpoints.len()))
            .collect()
    }

    pub fn catalog(&self) -> &MovementCatalog {
        &self.catalog
    }

    /// Cambia los umbrales sin tocar el estado de los checkpoints
    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.catalog.set_thresholds(thresholds);
    }

    /// Reemplaza el catálogo y reinicia todo el estado
    pub fn set_catalog(&mut self, catalog: MovementCatalog) {
        self.runtime = Self::fresh_runtime(&catalog);
        self.catalog = catalog;
    }

    pub fn reset(&mut self) {
        self.runtime = Self::fresh_runtime(&self.catalog);
    }

    pub fn checkpoint_state(&self, movement: &str, index: usize) -> Option<CheckpointState> {
        let position = self.catalog.list().iter().position(|m| m.name == movement)?;
        self.runtime[position].checkpoints.get(index).copied()
    }

    /// Evalúa un frame y devuelve los comandos disparados, en orden de catálogo.
    ///
    /// Si alguna condición falla, el estado queda exactamente como antes del frame.
    pub fn evaluate(
        &mut self,
        snapshot: &PoseSnapshot,
        timestamp_ms: u64,
        mappings: &CommandKeyMappings,
    ) -> Result<Vec<CommandEvent>, ConditionError> {
        let disabled = mappings.disabled_movements();
        let thresholds = self.catalog.thresholds();

        let mut runtime = self.runtime.clone();
        let mut ignored_for_frame: HashSet<&str> = HashSet::new();
        let mut events = Vec::new();

        for (movement, state) in self.catalog.list().iter().zip(runtime.iter_mut()) {
            let name = movement.name.as_str();
            if disabled.contains(name) || ignored_for_frame.contains(name) {
                continue;
            }

            let last = movement.checkpoints.len() - 1;

            for (i, checkpoint) in movement.checkpoints.iter().enumerate() {
                if checkpoint.condition.evaluate(snapshot, thresholds)? {
                    if state.checkpoints[i].active {
                        continue;
                    }

                    state.checkpoints[i].active = true;
                    if i == 0 {
                        state.armed = true;
                    }
                    if i != last {
                        state.checkpoints[i].last_active_ms = timestamp_ms;
                        continue;
                    }

                    if state.armed && state.checkpoints.iter().all(|c| c.active) {
                        state.armed = false;
                        debug!("movement {} fired at {}ms", name, timestamp_ms);
                        events.push(CommandEvent {
                            name: movement.name.clone(),
                            class: movement.class,
                            timestamp_ms,
                        });

                        if let Some(group) = self.catalog.group_of(name) {
                            ignored_for_frame.extend(group.members.iter().map(|m| m.as_str()));
                        }
                    }
                } else {
                    let elapsed = timestamp_ms.saturating_sub(state.checkpoints[i].last_active_ms);
                    if elapsed > checkpoint.active_duration_ms {
                        state.checkpoints[i].active = false;
                    }
                }
            }
        }

        self.runtime = runtime;
        Ok(events)
    }
}

impl Default for MovementDetector {
    fn default() -> Self {
        Self::new(MovementCatalog::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Checkpoint, ExclusionGroup, Movement};
    use crate::condition::{Condition, Operand};
    use crate::keys::KeyMapping;
    use crate::types::{Axis, Landmark, LandmarkPoint, Metric};

    fn pose(points: &[(Landmark, f32, f32)]) -> PoseSnapshot {
        PoseSnapshot::from_points(
            points
                .iter()
                .map(|&(l, x, y)| (l, LandmarkPoint::image(x, y))),
        )
    }

    fn names(events: &[CommandEvent]) -> Vec<&str> {
        events.iter().map(|e| e.name.as_str()).collect()
    }

    /// Muñecas bajas y centradas: ningún gesto de brazos
    fn neutral() -> PoseSnapshot {
        pose(&[
            (Landmark::Nose, 0.5, 0.3),
            (Landmark::LeftWrist, 0.6, 0.7),
            (Landmark::RightWrist, 0.4, 0.7),
        ])
    }

    #[test]
    fn test_both_hands_up_fires() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let snapshot = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.6, 0.1),
            (Landmark::RightWrist, 0.4, 0.1),
        ]);

        let events = detector.evaluate(&snapshot, 1000, &mappings).unwrap();
        assert_eq!(names(&events), vec!["both_hands_up"]);
        assert_eq!(events[0].class, CommandClass::Click);
        assert_eq!(events[0].timestamp_ms, 1000);
    }

    #[test]
    fn test_invisible_landmark_never_fires() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        // Muñeca derecha fuera de cuadro
        let snapshot = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.6, 0.1),
            (Landmark::RightWrist, 1.3, 0.1),
        ]);

        let events = detector.evaluate(&snapshot, 1000, &mappings).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_held_pose_fires_once() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let up = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.6, 0.1),
            (Landmark::RightWrist, 0.4, 0.1),
        ]);

        assert_eq!(detector.evaluate(&up, 1000, &mappings).unwrap().len(), 1);
        for t in 1..20 {
            let events = detector.evaluate(&up, 1000 + t * 33, &mappings).unwrap();
            assert!(events.is_empty());
        }

        // Bajar y volver a subir
        assert!(detector.evaluate(&neutral(), 2000, &mappings).unwrap().is_empty());
        assert_eq!(
            names(&detector.evaluate(&up, 2033, &mappings).unwrap()),
            vec!["both_hands_up"]
        );
    }

    #[test]
    fn test_heavy_swing_with_hysteresis() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();

        // t=0: muñeca izquierda sobre la nariz, sin cruzar
        let raised = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.2),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        assert!(detector.evaluate(&raised, 0, &mappings).unwrap().is_empty());
        assert!(detector.checkpoint_state("left_heavy_swing", 0).unwrap().active);

        // t=1: ya bajó de la nariz (checkpoint 0 falso, dentro de la ventana) y cruzó
        let swept = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.3, 0.6),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        let events = detector.evaluate(&swept, 1, &mappings).unwrap();
        // left_swing viene después en el catálogo y queda excluido en este frame
        assert_eq!(names(&events), vec!["left_heavy_swing"]);
    }

    #[test]
    fn test_hysteresis_window_expires() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new()
            .with("left_swing", KeyMapping { active: false, ..KeyMapping::default() });

        let raised = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.2),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        let lowered = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.6),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        let swept = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.3, 0.6),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);

        detector.evaluate(&raised, 0, &mappings).unwrap();
        detector.evaluate(&lowered, 400, &mappings).unwrap();
        assert!(detector.checkpoint_state("left_heavy_swing", 0).unwrap().active);
        detector.evaluate(&lowered, 600, &mappings).unwrap();
        assert!(!detector.checkpoint_state("left_heavy_swing", 0).unwrap().active);

        let events = detector.evaluate(&swept, 700, &mappings).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_heavy_swing_needs_rearm_while_raised() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new()
            .with("left_swing", KeyMapping { active: false, ..KeyMapping::default() });

        let raised = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.2),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        let crossed_high = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.3, 0.2),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        let lowered = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.6),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);

        assert!(detector.evaluate(&raised, 0, &mappings).unwrap().is_empty());
        assert_eq!(
            names(&detector.evaluate(&crossed_high, 33, &mappings).unwrap()),
            vec!["left_heavy_swing"]
        );

        // Cruzar de nuevo sin bajar la mano: checkpoint 0 nunca se desactivó
        assert!(detector.evaluate(&raised, 66, &mappings).unwrap().is_empty());
        assert!(detector.checkpoint_state("left_heavy_swing", 0).unwrap().active);
        assert!(detector.evaluate(&crossed_high, 100, &mappings).unwrap().is_empty());
        assert!(detector.evaluate(&raised, 133, &mappings).unwrap().is_empty());
        assert!(detector.evaluate(&crossed_high, 166, &mappings).unwrap().is_empty());

        // Bajar hasta vencer la ventana y volver a subir rearma el movimiento
        detector.evaluate(&lowered, 700, &mappings).unwrap();
        assert!(!detector.checkpoint_state("left_heavy_swing", 0).unwrap().active);
        assert!(detector.evaluate(&raised, 733, &mappings).unwrap().is_empty());
        assert_eq!(
            names(&detector.evaluate(&crossed_high, 766, &mappings).unwrap()),
            vec!["left_heavy_swing"]
        );
    }

    #[test]
    fn test_walking_with_one_knee_missing() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let snapshot = PoseSnapshot::empty()
            .with_metric(Metric::AngleLeftKnee, Some(170.0))
            .with_metric(Metric::AngleRightKnee, None)
            .with_metric(Metric::AngleLeftShoulder, Some(10.0))
            .with_metric(Metric::AngleRightShoulder, Some(10.0));

        let events = detector.evaluate(&snapshot, 0, &mappings).unwrap();
        assert_eq!(names(&events), vec!["walk_both_hands_down"]);
        assert_eq!(events[0].class, CommandClass::Hold);
    }

    #[test]
    fn test_disabled_movement_skipped() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new()
            .with("both_hands_up", KeyMapping { active: false, ..KeyMapping::key('u') });
        let up = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.6, 0.1),
            (Landmark::RightWrist, 0.4, 0.1),
        ]);

        assert!(detector.evaluate(&up, 0, &mappings).unwrap().is_empty());
        assert!(!detector.checkpoint_state("both_hands_up", 0).unwrap().active);
    }

    #[test]
    fn test_within_frame_exclusion_follows_catalog_order() {
        let raised = Condition::lt(
            Operand::coord(Landmark::LeftWrist, Axis::Y),
            Operand::coord(Landmark::Nose, Axis::Y),
        );
        let movements = vec![
            Movement::new("first", CommandClass::Click, vec![Checkpoint::new(raised.clone())]),
            Movement::new("second", CommandClass::Click, vec![Checkpoint::new(raised.clone())]),
            Movement::new("other", CommandClass::Hold, vec![Checkpoint::new(raised)]),
        ];
        let catalog = MovementCatalog::new(
            movements,
            vec![ExclusionGroup::new(&["first", "second"], 0)],
            Thresholds::default(),
        )
        .unwrap();
        let mut detector = MovementDetector::new(catalog);
        let snapshot = pose(&[(Landmark::Nose, 0.5, 0.4), (Landmark::LeftWrist, 0.5, 0.1)]);

        let events = detector
            .evaluate(&snapshot, 10, &CommandKeyMappings::new())
            .unwrap();
        assert_eq!(names(&events), vec!["first", "other"]);
        // "second" no se evaluó en este frame
        assert!(!detector.checkpoint_state("second", 0).unwrap().active);
    }

    #[test]
    fn test_failed_frame_leaves_state_untouched() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let raised = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.7, 0.2),
            (Landmark::RightWrist, 0.4, 0.8),
        ]);
        detector.evaluate(&raised, 0, &mappings).unwrap();
        let before = detector.checkpoint_state("left_heavy_swing", 0).unwrap();

        // squat se evalúa después de los gestos de brazos y lee el ángulo roto
        let broken = neutral().with_metric(Metric::AngleLeftKnee, Some(f32::NAN));
        assert!(detector.evaluate(&broken, 700, &mappings).is_err());
        assert_eq!(detector.checkpoint_state("left_heavy_swing", 0).unwrap(), before);
    }

    #[test]
    fn test_face_tilt_from_metric() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let tilted = PoseSnapshot::empty().with_metric(Metric::SlopeEyes, Some(-42.0));

        let events = detector.evaluate(&tilted, 50, &mappings).unwrap();
        assert_eq!(names(&events), vec!["face_tilt_right"]);
        assert_eq!(events[0].class, CommandClass::HoldFast);
    }

    #[test]
    fn test_reset_clears_runtime() {
        let mut detector = MovementDetector::default();
        let mappings = CommandKeyMappings::new();
        let up = pose(&[
            (Landmark::Nose, 0.5, 0.4),
            (Landmark::LeftWrist, 0.6, 0.1),
            (Landmark::RightWrist, 0.4, 0.1),
        ]);
        detector.evaluate(&up, 0, &mappings).unwrap();
        detector.reset();
        assert_eq!(
            detector.checkpoint_state("both_hands_up", 0),
            Some(CheckpointState::default())
        );
        assert_eq!(detector.evaluate(&up, 33, &mappings).unwrap().len(), 1);
    }
}
