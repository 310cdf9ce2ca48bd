//! Catálogo de movimientos
//!
//! Cada movimiento es una cadena ordenada de checkpoints. El orden del
//! catálogo es también el orden de evaluación por frame: un movimiento que
//! dispara excluye a los miembros de su grupo que vienen después.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::condition::{Condition, Operand, Threshold, Thresholds};
use crate::types::{Axis, Landmark, Metric};

/// Tiempo que un checkpoint intermedio sigue activo tras dejar de cumplirse (ms)
pub const DEFAULT_CHECKPOINT_ACTIVE_DURATION_MS: u64 = 500;

/// Ventana de exclusión entre movimientos del mismo grupo (ms)
pub const DEFAULT_GROUP_COOLDOWN_MS: u64 = 1000;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Duplicate movement name: {0}")]
    DuplicateMovement(String),

    #[error("Movement {0} has no checkpoints")]
    NoCheckpoints(String),

    #[error("Exclusion group references unknown movement: {0}")]
    UnknownGroupMember(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Clase de comando: decide el intervalo de liberación de la tecla
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandClass {
    #[serde(alias = "1_click")]
    Click,
    Hold,
    #[serde(alias = "hold_2")]
    HoldFast,
}

impl CommandClass {
    pub const ALL: [CommandClass; 3] = [CommandClass::Click, CommandClass::Hold, CommandClass::HoldFast];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandClass::Click => "click",
            CommandClass::Hold => "hold",
            CommandClass::HoldFast => "hold_fast",
        }
    }
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub condition: Condition,
    /// 0 = sin histéresis
    #[serde(default)]
    pub active_duration_ms: u64,
}

impl Checkpoint {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            active_duration_ms: 0,
        }
    }

    pub fn held(condition: Condition, active_duration_ms: u64) -> Self {
        Self {
            condition,
            active_duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub name: String,
    pub class: CommandClass,
    pub checkpoints: Vec<Checkpoint>,
}

impl Movement {
    pub fn new(name: impl Into<String>, class: CommandClass, checkpoints: Vec<Checkpoint>) -> Self {
        Self {
            name: name.into(),
            class,
            checkpoints,
        }
    }
}

/// Movimientos que se solapan semánticamente
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionGroup {
    pub members: Vec<String>,
    #[serde(default)]
    pub cooldown_ms: u64,
}

impl ExclusionGroup {
    pub fn new(members: &[&str], cooldown_ms: u64) -> Self {
        Self {
            members: members.iter().map(|m| m.to_string()).collect(),
            cooldown_ms,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogJson {
    movements: Vec<Movement>,
    #[serde(default)]
    groups: Vec<ExclusionGroup>,
}

#[derive(Debug, Clone)]
pub struct MovementCatalog {
    movements: Vec<Movement>,
    groups: Vec<ExclusionGroup>,
    thresholds: Thresholds,
}

impl MovementCatalog {
    pub fn new(
        movements: Vec<Movement>,
        groups: Vec<ExclusionGroup>,
        thresholds: Thresholds,
    ) -> Result<Self, CatalogError> {
        let mut names = HashSet::new();
        for movement in &movements {
            if !names.insert(movement.name.as_str()) {
                return Err(CatalogError::DuplicateMovement(movement.name.clone()));
            }
            if movement.checkpoints.is_empty() {
                return Err(CatalogError::NoCheckpoints(movement.name.clone()));
            }
        }

        for group in &groups {
            if let Some(unknown) = group.members.iter().find(|m| !names.contains(m.as_str())) {
                return Err(CatalogError::UnknownGroupMember(unknown.clone()));
            }
        }

        Ok(Self {
            movements,
            groups,
            thresholds,
        })
    }

    /// Carga un catálogo con el formato `{"movements": [...], "groups": [...]}`
    pub fn from_json(json: &str, thresholds: Thresholds) -> Result<Self, CatalogError> {
        let data: CatalogJson = serde_json::from_str(json)?;
        Self::new(data.movements, data.groups, thresholds)
    }

    /// Movimientos en orden de evaluación
    pub fn list(&self) -> &[Movement] {
        &self.movements
    }

    pub fn groups(&self) -> &[ExclusionGroup] {
        &self.groups
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: Thresholds) {
        self.thresholds = thresholds;
    }

    pub fn get(&self, name: &str) -> Option<&Movement> {
        self.movements.iter().find(|m| m.name == name)
    }

    /// Grupo de exclusión de un movimiento (el primero que lo contenga)
    pub fn group_of(&self, name: &str) -> Option<&ExclusionGroup> {
        self.groups.iter().find(|g| g.contains(name))
    }

    /// Catálogo de referencia: gestos de brazos, piernas/caminar e inclinación de cara
    pub fn reference(thresholds: Thresholds) -> Self {
        Self {
            movements: reference_movements(),
            groups: reference_groups(),
            thresholds,
        }
    }
}

impl Default for MovementCatalog {
    fn default() -> Self {
        Self::reference(Thresholds::default())
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

fn coord(landmark: Landmark, axis: Axis) -> Operand {
    Operand::coord(landmark, axis)
}

fn metric(metric: Metric) -> Operand {
    Operand::metric(metric)
}

fn threshold(threshold: Threshold) -> Operand {
    Operand::threshold(threshold)
}

fn wrist_above_nose(side: Side) -> Condition {
    let wrist = match side {
        Side::Left => Landmark::LeftWrist,
        Side::Right => Landmark::RightWrist,
    };
    Condition::lt(coord(wrist, Axis::Y), coord(Landmark::Nose, Axis::Y))
}

/// Muñeca cruzada al otro lado de la nariz (en coordenadas de imagen)
fn wrist_crossed(side: Side) -> Condition {
    match side {
        Side::Left => Condition::lt(
            coord(Landmark::LeftWrist, Axis::X),
            coord(Landmark::Nose, Axis::X),
        ),
        Side::Right => Condition::gt(
            coord(Landmark::RightWrist, Axis::X),
            coord(Landmark::Nose, Axis::X),
        ),
    }
}

fn walking() -> Condition {
    Condition::any(vec![
        Condition::gt(
            metric(Metric::AngleLeftKnee),
            threshold(Threshold::WalkKneeMaxAngle),
        ),
        Condition::gt(
            metric(Metric::AngleRightKnee),
            threshold(Threshold::WalkKneeMaxAngle),
        ),
    ])
}

fn arm_straight(side: Side) -> Condition {
    let elbow = match side {
        Side::Left => Metric::AngleLeftElbow,
        Side::Right => Metric::AngleRightElbow,
    };
    Condition::gt(metric(elbow), threshold(Threshold::StraightElbowMaxAngle))
}

fn arm_up(side: Side) -> Condition {
    let shoulder = match side {
        Side::Left => Metric::AngleLeftShoulder,
        Side::Right => Metric::AngleRightShoulder,
    };
    Condition::gt(metric(shoulder), threshold(Threshold::UpShouldersMaxAngle))
}

fn single_leg_squat(side: Side) -> Condition {
    let (knee, hip, angle) = match side {
        Side::Left => (Landmark::LeftKnee, Landmark::LeftHip, Metric::AngleLeftKnee),
        Side::Right => (Landmark::RightKnee, Landmark::RightHip, Metric::AngleRightKnee),
    };
    Condition::all(vec![
        Condition::lt(coord(knee, Axis::Y), coord(hip, Axis::Y)),
        Condition::lt(metric(angle), threshold(Threshold::LegSquatKneeMaxAngle)),
    ])
}

fn reference_movements() -> Vec<Movement> {
    use CommandClass::*;

    vec![
        Movement::new(
            "both_hands_up",
            Click,
            vec![Checkpoint::new(Condition::all(vec![
                wrist_above_nose(Side::Left),
                wrist_above_nose(Side::Right),
            ]))],
        ),
        Movement::new(
            "cross_hands",
            Click,
            vec![Checkpoint::new(Condition::all(vec![
                Condition::lt(
                    coord(Landmark::LeftWrist, Axis::X),
                    coord(Landmark::RightWrist, Axis::X),
                ),
                Condition::lt(
                    metric(Metric::AngleLeftElbow),
                    threshold(Threshold::ElbowCrossMaxAngle),
                ),
                Condition::lt(
                    metric(Metric::AngleRightElbow),
                    threshold(Threshold::ElbowCrossMaxAngle),
                ),
            ]))],
        ),
        Movement::new(
            "left_heavy_swing",
            Click,
            vec![
                Checkpoint::held(wrist_above_nose(Side::Left), DEFAULT_CHECKPOINT_ACTIVE_DURATION_MS),
                Checkpoint::new(wrist_crossed(Side::Left)),
            ],
        ),
        Movement::new(
            "right_heavy_swing",
            Click,
            vec![
                Checkpoint::held(wrist_above_nose(Side::Right), DEFAULT_CHECKPOINT_ACTIVE_DURATION_MS),
                Checkpoint::new(wrist_crossed(Side::Right)),
            ],
        ),
        Movement::new("left_swing", Click, vec![Checkpoint::new(wrist_crossed(Side::Left))]),
        Movement::new("right_swing", Click, vec![Checkpoint::new(wrist_crossed(Side::Right))]),
        Movement::new(
            "squat",
            Click,
            vec![Checkpoint::new(Condition::all(vec![
                Condition::lt(
                    metric(Metric::AngleLeftKnee),
                    threshold(Threshold::SquatKneeMaxAngle),
                ),
                Condition::gt(
                    coord(Landmark::LeftKnee, Axis::Y),
                    coord(Landmark::LeftHip, Axis::Y),
                ),
                Condition::lt(
                    metric(Metric::AngleRightKnee),
                    threshold(Threshold::SquatKneeMaxAngle),
                ),
                Condition::gt(
                    coord(Landmark::RightKnee, Axis::Y),
                    coord(Landmark::RightHip, Axis::Y),
                ),
            ]))],
        ),
        Movement::new("left_squat", Click, vec![Checkpoint::new(single_leg_squat(Side::Left))]),
        Movement::new("right_squat", Click, vec![Checkpoint::new(single_leg_squat(Side::Right))]),
        Movement::new(
            "walk_both_hands_up",
            Hold,
            vec![Checkpoint::new(Condition::all(vec![
                walking(),
                arm_up(Side::Left),
                arm_up(Side::Right),
                arm_straight(Side::Left),
                arm_straight(Side::Right),
            ]))],
        ),
        Movement::new(
            "walk_left_hand_up",
            Hold,
            vec![Checkpoint::new(Condition::all(vec![
                walking(),
                arm_up(Side::Left),
                arm_straight(Side::Left),
                Condition::negate(arm_up(Side::Right)),
            ]))],
        ),
        Movement::new(
            "walk_right_hand_up",
            Hold,
            vec![Checkpoint::new(Condition::all(vec![
                walking(),
                arm_up(Side::Right),
                arm_straight(Side::Right),
                Condition::negate(arm_up(Side::Left)),
            ]))],
        ),
        Movement::new(
            "walk_both_hands_down",
            Hold,
            vec![Checkpoint::new(Condition::all(vec![
                walking(),
                Condition::negate(arm_up(Side::Left)),
                Condition::negate(arm_up(Side::Right)),
            ]))],
        ),
        Movement::new(
            "face_tilt_left",
            HoldFast,
            vec![Checkpoint::new(Condition::gt(
                metric(Metric::SlopeEyes),
                threshold(Threshold::FaceTiltSlopeMaxAngle),
            ))],
        ),
        Movement::new(
            "face_tilt_right",
            HoldFast,
            vec![Checkpoint::new(Condition::lt(
                metric(Metric::SlopeEyes),
                Operand::neg_threshold(Threshold::FaceTiltSlopeMaxAngle),
            ))],
        ),
    ]
}

fn reference_groups() -> Vec<ExclusionGroup> {
    vec![
        ExclusionGroup::new(
            &[
                "both_hands_up",
                "cross_hands",
                "left_heavy_swing",
                "right_heavy_swing",
                "left_swing",
                "right_swing",
            ],
            DEFAULT_GROUP_COOLDOWN_MS,
        ),
        ExclusionGroup::new(
            &[
                "squat",
                "left_squat",
                "right_squat",
                "walk_both_hands_up",
                "walk_left_hand_up",
                "walk_right_hand_up",
                "walk_both_hands_down",
            ],
            DEFAULT_GROUP_COOLDOWN_MS,
        ),
        ExclusionGroup::new(&["face_tilt_left", "face_tilt_right"], DEFAULT_GROUP_COOLDOWN_MS),
    ]
}
