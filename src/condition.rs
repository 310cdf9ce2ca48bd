//! Condiciones de checkpoint como datos
//!
//! Cada condición es un árbol de comparaciones sobre el `PoseSnapshot` y los
//! umbrales con nombre. Una comparación contra un valor ausente (landmark
//! invisible o métrica sin calcular) no se cumple, tampoco bajo `not` ni
//! dentro de `all`. Un `any` se cumple si alguna rama presente es verdadera.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Axis, Landmark, Metric, PoseSnapshot};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Non-finite coordinate {axis:?} for visible landmark {landmark:?}")]
    NonFiniteCoord { landmark: Landmark, axis: Axis },

    #[error("Non-finite value for metric {0:?}")]
    NonFiniteMetric(Metric),

    #[error("Non-finite threshold {0:?}")]
    NonFiniteThreshold(Threshold),
}

/// Umbrales ajustables que usan los movimientos del catálogo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Threshold {
    ElbowCrossMaxAngle,
    SquatKneeMaxAngle,
    LegSquatKneeMaxAngle,
    WalkKneeMaxAngle,
    FaceTiltSlopeMaxAngle,
    StraightElbowMaxAngle,
    UpShouldersMaxAngle,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// cross_hands: ángulo máximo de ambos codos
    pub elbow_cross_max_angle: f32,
    /// squat: ángulo máximo de ambas rodillas
    pub squat_knee_max_angle: f32,
    /// left_squat / right_squat
    pub leg_squat_knee_max_angle: f32,
    /// walk_*: una rodilla por encima de este ángulo cuenta como paso
    pub walk_knee_max_angle: f32,
    /// face_tilt_*: pendiente de los ojos en grados
    pub face_tilt_slope_max_angle: f32,
    /// Brazo recto si el codo supera este ángulo
    pub straight_elbow_max_angle: f32,
    /// Brazo arriba si el hombro supera este ángulo
    pub up_shoulders_max_angle: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            elbow_cross_max_angle: 100.0,
            squat_knee_max_angle: 120.0,
            leg_squat_knee_max_angle: 90.0,
            walk_knee_max_angle: 120.0,
            face_tilt_slope_max_angle: 35.0,
            straight_elbow_max_angle: 160.0,
            up_shoulders_max_angle: 45.0,
        }
    }
}

impl Thresholds {
    pub fn get(&self, threshold: Threshold) -> f32 {
        match threshold {
            Threshold::ElbowCrossMaxAngle => self.elbow_cross_max_angle,
            Threshold::SquatKneeMaxAngle => self.squat_knee_max_angle,
            Threshold::LegSquatKneeMaxAngle => self.leg_squat_knee_max_angle,
            Threshold::WalkKneeMaxAngle => self.walk_knee_max_angle,
            Threshold::FaceTiltSlopeMaxAngle => self.face_tilt_slope_max_angle,
            Threshold::StraightElbowMaxAngle => self.straight_elbow_max_angle,
            Threshold::UpShouldersMaxAngle => self.up_shoulders_max_angle,
        }
    }

    pub fn set(&mut self, threshold: Threshold, value: f32) {
        let slot = match threshold {
            Threshold::ElbowCrossMaxAngle => &mut self.elbow_cross_max_angle,
            Threshold::SquatKneeMaxAngle => &mut self.squat_knee_max_angle,
            Threshold::LegSquatKneeMaxAngle => &mut self.leg_squat_knee_max_angle,
            Threshold::WalkKneeMaxAngle => &mut self.walk_knee_max_angle,
            Threshold::FaceTiltSlopeMaxAngle => &mut self.face_tilt_slope_max_angle,
            Threshold::StraightElbowMaxAngle => &mut self.straight_elbow_max_angle,
            Threshold::UpShouldersMaxAngle => &mut self.up_shoulders_max_angle,
        };
        *slot = value;
    }
}

/// Operador de comparación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "lte")]
    Le,
    #[serde(rename = "gte")]
    Ge,
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
}

impl CmpOp {
    pub fn apply(self, a: f32, b: f32) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Gt => a > b,
            CmpOp::Le => a <= b,
            CmpOp::Ge => a >= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
        }
    }
}

/// Un lado de una comparación
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operand {
    /// Coordenada de imagen de un landmark
    Coord { landmark: Landmark, axis: Axis },
    /// Ángulo o pendiente derivada
    Metric { metric: Metric },
    /// Umbral con nombre, opcionalmente negado (p.ej. -FACE_TILT)
    Threshold {
        threshold: Threshold,
        #[serde(default)]
        negate: bool,
    },
    Constant { value: f32 },
}

impl Operand {
    pub fn coord(landmark: Landmark, axis: Axis) -> Self {
        Operand::Coord { landmark, axis }
    }

    pub fn metric(metric: Metric) -> Self {
        Operand::Metric { metric }
    }

    pub fn threshold(threshold: Threshold) -> Self {
        Operand::Threshold {
            threshold,
            negate: false,
        }
    }

    pub fn neg_threshold(threshold: Threshold) -> Self {
        Operand::Threshold {
            threshold,
            negate: true,
        }
    }

    /// Valor del operando en este frame; `Ok(None)` si está ausente
    pub fn resolve(
        &self,
        snapshot: &PoseSnapshot,
        thresholds: &Thresholds,
    ) -> Result<Option<f32>, ConditionError> {
        match *self {
            Operand::Coord { landmark, axis } => match snapshot.coord(landmark, axis) {
                Some(v) if !v.is_finite() => Err(ConditionError::NonFiniteCoord { landmark, axis }),
                value => Ok(value),
            },
            Operand::Metric { metric } => match snapshot.metric(metric) {
                Some(v) if !v.is_finite() => Err(ConditionError::NonFiniteMetric(metric)),
                value => Ok(value),
            },
            Operand::Threshold { threshold, negate } => {
                let value = thresholds.get(threshold);
                if !value.is_finite() {
                    return Err(ConditionError::NonFiniteThreshold(threshold));
                }
                Ok(Some(if negate { -value } else { value }))
            }
            Operand::Constant { value } => Ok(Some(value)),
        }
    }
}

/// Predicado de un checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
    Not {
        condition: Box<Condition>,
    },
}

impl Condition {
    pub fn compare(lhs: Operand, op: CmpOp, rhs: Operand) -> Self {
        Condition::Compare { lhs, op, rhs }
    }

    pub fn lt(lhs: Operand, rhs: Operand) -> Self {
        Self::compare(lhs, CmpOp::Lt, rhs)
    }

    pub fn gt(lhs: Operand, rhs: Operand) -> Self {
        Self::compare(lhs, CmpOp::Gt, rhs)
    }

    pub fn all(conditions: Vec<Condition>) -> Self {
        Condition::All { conditions }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Condition::Any { conditions }
    }

    pub fn negate(condition: Condition) -> Self {
        Condition::Not {
            condition: Box::new(condition),
        }
    }

    /// `true` solo si la condición se cumple con todos sus valores presentes
    pub fn evaluate(
        &self,
        snapshot: &PoseSnapshot,
        thresholds: &Thresholds,
    ) -> Result<bool, ConditionError> {
        Ok(self.eval(snapshot, thresholds)? == Some(true))
    }

    // None = algún valor ausente en el subárbol
    fn eval(
        &self,
        snapshot: &PoseSnapshot,
        thresholds: &Thresholds,
    ) -> Result<Option<bool>, ConditionError> {
        match self {
            Condition::Compare { lhs, op, rhs } => {
                let a = lhs.resolve(snapshot, thresholds)?;
                let b = rhs.resolve(snapshot, thresholds)?;
                match (a, b) {
                    (Some(a), Some(b)) => Ok(Some(op.apply(a, b))),
                    _ => Ok(None),
                }
            }
            Condition::All { conditions } => {
                let mut result = Some(true);
                for condition in conditions {
                    match (condition.eval(snapshot, thresholds)?, result) {
                        (None, _) => result = None,
                        (Some(false), Some(_)) => result = Some(false),
                        _ => {}
                    }
                }
                Ok(result)
            }
            Condition::Any { conditions } => {
                // Se evalúan todas las ramas para detectar valores no finitos
                let (mut any_true, mut any_absent) = (false, false);
                for condition in conditions {
                    match condition.eval(snapshot, thresholds)? {
                        Some(true) => any_true = true,
                        Some(false) => {}
                        None => any_absent = true,
                    }
                }
                Ok(if any_true {
                    Some(true)
                } else if any_absent {
                    None
                } else {
                    Some(false)
                })
            }
            Condition::Not { condition } => {
                Ok(condition.eval(snapshot, thresholds)?.map(|value| !value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LandmarkPoint;

    fn wrists_above_nose() -> Condition {
        Condition::all(vec![
            Condition::lt(
                Operand::coord(Landmark::LeftWrist, Axis::Y),
                Operand::coord(Landmark::Nose, Axis::Y),
            ),
            Condition::lt(
                Operand::coord(Landmark::RightWrist, Axis::Y),
                Operand::coord(Landmark::Nose, Axis::Y),
            ),
        ])
    }

    #[test]
    fn test_compare_coords() {
        let snapshot = PoseSnapshot::from_points([
            (Landmark::Nose, LandmarkPoint::image(0.5, 0.4)),
            (Landmark::LeftWrist, LandmarkPoint::image(0.6, 0.2)),
            (Landmark::RightWrist, LandmarkPoint::image(0.4, 0.1)),
        ]);
        let thresholds = Thresholds::default();
        assert!(wrists_above_nose().evaluate(&snapshot, &thresholds).unwrap());
    }

    #[test]
    fn test_absent_value_never_satisfies() {
        // Muñeca derecha fuera de la imagen
        let snapshot = PoseSnapshot::from_points([
            (Landmark::Nose, LandmarkPoint::image(0.5, 0.4)),
            (Landmark::LeftWrist, LandmarkPoint::image(0.6, 0.2)),
            (Landmark::RightWrist, LandmarkPoint::image(1.4, 0.1)),
        ]);
        let thresholds = Thresholds::default();

        let condition = wrists_above_nose();
        assert!(!condition.evaluate(&snapshot, &thresholds).unwrap());
        assert!(!Condition::negate(condition.clone())
            .evaluate(&snapshot, &thresholds)
            .unwrap());
        assert!(!Condition::all(vec![
            condition,
            Condition::lt(Operand::Constant { value: 0.0 }, Operand::Constant { value: 1.0 }),
        ])
        .evaluate(&snapshot, &thresholds)
        .unwrap());
    }

    #[test]
    fn test_any_satisfied_by_present_branch() {
        let thresholds = Thresholds::default();
        // Rodilla derecha sin calcular
        let snapshot = PoseSnapshot::empty().with_metric(Metric::AngleLeftKnee, Some(170.0));
        let knee_straight = |metric| {
            Condition::gt(
                Operand::metric(metric),
                Operand::threshold(Threshold::WalkKneeMaxAngle),
            )
        };
        let walking = Condition::any(vec![
            knee_straight(Metric::AngleLeftKnee),
            knee_straight(Metric::AngleRightKnee),
        ]);
        assert!(walking.evaluate(&snapshot, &thresholds).unwrap());
        assert!(!Condition::negate(walking.clone())
            .evaluate(&snapshot, &thresholds)
            .unwrap());

        // Rama presente falsa + rama ausente: ni any ni su negación se cumplen
        let bent = snapshot.clone().with_metric(Metric::AngleLeftKnee, Some(90.0));
        assert!(!walking.evaluate(&bent, &thresholds).unwrap());
        assert!(!Condition::negate(walking).evaluate(&bent, &thresholds).unwrap());
    }

    #[test]
    fn test_negated_threshold() {
        let thresholds = Thresholds::default();
        let tilt_right = Condition::lt(
            Operand::metric(Metric::SlopeEyes),
            Operand::neg_threshold(Threshold::FaceTiltSlopeMaxAngle),
        );

        let tilted = PoseSnapshot::empty().with_metric(Metric::SlopeEyes, Some(-40.0));
        let level = PoseSnapshot::empty().with_metric(Metric::SlopeEyes, Some(-10.0));
        assert!(tilt_right.evaluate(&tilted, &thresholds).unwrap());
        assert!(!tilt_right.evaluate(&level, &thresholds).unwrap());
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let mut thresholds = Thresholds::default();
        let snapshot = PoseSnapshot::empty().with_metric(Metric::AngleLeftKnee, Some(110.0));
        let bent = Condition::lt(
            Operand::metric(Metric::AngleLeftKnee),
            Operand::threshold(Threshold::SquatKneeMaxAngle),
        );

        assert!(bent.evaluate(&snapshot, &thresholds).unwrap());
        thresholds.set(Threshold::SquatKneeMaxAngle, 100.0);
        assert_eq!(thresholds.get(Threshold::SquatKneeMaxAngle), 100.0);
        assert!(!bent.evaluate(&snapshot, &thresholds).unwrap());
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let thresholds = Thresholds::default();
        let snapshot = PoseSnapshot::empty().with_metric(Metric::AngleLeftKnee, Some(f32::NAN));
        let bent = Condition::lt(
            Operand::metric(Metric::AngleLeftKnee),
            Operand::threshold(Threshold::SquatKneeMaxAngle),
        );
        assert_eq!(
            bent.evaluate(&snapshot, &thresholds),
            Err(ConditionError::NonFiniteMetric(Metric::AngleLeftKnee))
        );
    }

    #[test]
    fn test_condition_from_json() {
        let json = r#"{
            "kind": "compare",
            "lhs": {"kind": "coord", "landmark": "LEFT_WRIST", "axis": "y"},
            "op": "lt",
            "rhs": {"kind": "coord", "landmark": "NOSE", "axis": "y"}
        }"#;
        let condition: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(
            condition,
            Condition::lt(
                Operand::coord(Landmark::LeftWrist, Axis::Y),
                Operand::coord(Landmark::Nose, Axis::Y),
            )
        );
    }
}
