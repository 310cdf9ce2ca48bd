use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::geometry::{angle_deg, slope_deg};

/// Landmarks corporales que consume el detector (subconjunto de MediaPipe Pose)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Landmark {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Landmark {
    pub const ALL: [Landmark; NUM_LANDMARKS] = [
        Landmark::Nose,
        Landmark::LeftEye,
        Landmark::RightEye,
        Landmark::LeftEar,
        Landmark::RightEar,
        Landmark::MouthLeft,
        Landmark::MouthRight,
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftElbow,
        Landmark::RightElbow,
        Landmark::LeftWrist,
        Landmark::RightWrist,
        Landmark::LeftPinky,
        Landmark::RightPinky,
        Landmark::LeftIndex,
        Landmark::RightIndex,
        Landmark::LeftThumb,
        Landmark::RightThumb,
        Landmark::LeftHip,
        Landmark::RightHip,
        Landmark::LeftKnee,
        Landmark::RightKnee,
        Landmark::LeftAnkle,
        Landmark::RightAnkle,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Landmark::Nose => "NOSE",
            Landmark::LeftEye => "LEFT_EYE",
            Landmark::RightEye => "RIGHT_EYE",
            Landmark::LeftEar => "LEFT_EAR",
            Landmark::RightEar => "RIGHT_EAR",
            Landmark::MouthLeft => "MOUTH_LEFT",
            Landmark::MouthRight => "MOUTH_RIGHT",
            Landmark::LeftShoulder => "LEFT_SHOULDER",
            Landmark::RightShoulder => "RIGHT_SHOULDER",
            Landmark::LeftElbow => "LEFT_ELBOW",
            Landmark::RightElbow => "RIGHT_ELBOW",
            Landmark::LeftWrist => "LEFT_WRIST",
            Landmark::RightWrist => "RIGHT_WRIST",
            Landmark::LeftPinky => "LEFT_PINKY",
            Landmark::RightPinky => "RIGHT_PINKY",
            Landmark::LeftIndex => "LEFT_INDEX",
            Landmark::RightIndex => "RIGHT_INDEX",
            Landmark::LeftThumb => "LEFT_THUMB",
            Landmark::RightThumb => "RIGHT_THUMB",
            Landmark::LeftHip => "LEFT_HIP",
            Landmark::RightHip => "RIGHT_HIP",
            Landmark::LeftKnee => "LEFT_KNEE",
            Landmark::RightKnee => "RIGHT_KNEE",
            Landmark::LeftAnkle => "LEFT_ANKLE",
            Landmark::RightAnkle => "RIGHT_ANKLE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.name() == name)
    }
}

/// Eje de una coordenada
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Un landmark en un frame: coordenadas de imagen normalizadas (`pose`),
/// coordenadas métricas (`world`) y visibilidad
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub pose: [f32; 3],
    pub world: [f32; 3],
    pub visible: bool,
}

impl Default for LandmarkPoint {
    fn default() -> Self {
        Self {
            pose: [0.0; 3],
            world: [0.0; 3],
            visible: false,
        }
    }
}

impl LandmarkPoint {
    /// Crea un punto; es visible si cae dentro de la imagen (|x| <= 1 y |y| <= 1)
    pub fn new(pose: [f32; 3], world: [f32; 3]) -> Self {
        let visible = pose[0].abs() <= 1.0 && pose[1].abs() <= 1.0;
        Self {
            pose,
            world,
            visible,
        }
    }

    /// Punto usando las mismas coordenadas de imagen como coordenadas world
    pub fn image(x: f32, y: f32) -> Self {
        Self::new([x, y, 0.0], [x, y, 0.0])
    }
}

/// Métricas derivadas (ángulos y pendientes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    AngleLeftShoulder,
    AngleRightShoulder,
    AngleLeftElbowShoulders,
    AngleRightElbowShoulders,
    AngleLeftElbow,
    AngleRightElbow,
    AngleLeftHip,
    AngleRightHip,
    AngleLeftKnee,
    AngleRightKnee,
    AngleLeftHipKnee,
    AngleRightHipKnee,
    SlopeEyes,
}

/// De dónde sale una métrica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSource {
    /// Ángulo en el landmark central, sobre coordenadas world
    Angle([Landmark; 3]),
    /// Pendiente entre dos landmarks, sobre coordenadas de imagen
    Slope([Landmark; 2]),
}

impl Metric {
    pub const ALL: [Metric; NUM_METRICS] = [
        Metric::AngleLeftShoulder,
        Metric::AngleRightShoulder,
        Metric::AngleLeftElbowShoulders,
        Metric::AngleRightElbowShoulders,
        Metric::AngleLeftElbow,
        Metric::AngleRightElbow,
        Metric::AngleLeftHip,
        Metric::AngleRightHip,
        Metric::AngleLeftKnee,
        Metric::AngleRightKnee,
        Metric::AngleLeftHipKnee,
        Metric::AngleRightHipKnee,
        Metric::SlopeEyes,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::AngleLeftShoulder => "ANGLE_LEFT_SHOULDER",
            Metric::AngleRightShoulder => "ANGLE_RIGHT_SHOULDER",
            Metric::AngleLeftElbowShoulders => "ANGLE_LEFT_ELBOW_SHOULDERS",
            Metric::AngleRightElbowShoulders => "ANGLE_RIGHT_ELBOW_SHOULDERS",
            Metric::AngleLeftElbow => "ANGLE_LEFT_ELBOW",
            Metric::AngleRightElbow => "ANGLE_RIGHT_ELBOW",
            Metric::AngleLeftHip => "ANGLE_LEFT_HIP",
            Metric::AngleRightHip => "ANGLE_RIGHT_HIP",
            Metric::AngleLeftKnee => "ANGLE_LEFT_KNEE",
            Metric::AngleRightKnee => "ANGLE_RIGHT_KNEE",
            Metric::AngleLeftHipKnee => "ANGLE_LEFT_HIP_KNEE",
            Metric::AngleRightHipKnee => "ANGLE_RIGHT_HIP_KNEE",
            Metric::SlopeEyes => "SLOPE_EYES",
        }
    }

    pub fn source(self) -> MetricSource {
        use Landmark::*;
        match self {
            Metric::AngleLeftShoulder => MetricSource::Angle([LeftElbow, LeftShoulder, LeftHip]),
            Metric::AngleRightShoulder => {
                MetricSource::Angle([RightElbow, RightShoulder, RightHip])
            }
            Metric::AngleLeftElbowShoulders => {
                MetricSource::Angle([LeftElbow, LeftShoulder, RightShoulder])
            }
            Metric::AngleRightElbowShoulders => {
                MetricSource::Angle([RightElbow, RightShoulder, LeftShoulder])
            }
            Metric::AngleLeftElbow => MetricSource::Angle([LeftShoulder, LeftElbow, LeftWrist]),
            Metric::AngleRightElbow => {
                MetricSource::Angle([RightShoulder, RightElbow, RightWrist])
            }
            Metric::AngleLeftHip => MetricSource::Angle([LeftShoulder, LeftHip, LeftKnee]),
            Metric::AngleRightHip => MetricSource::Angle([RightShoulder, RightHip, RightKnee]),
            Metric::AngleLeftKnee => MetricSource::Angle([LeftHip, LeftKnee, LeftAnkle]),
            Metric::AngleRightKnee => MetricSource::Angle([RightHip, RightKnee, RightAnkle]),
            Metric::AngleLeftHipKnee => MetricSource::Angle([RightHip, LeftHip, LeftKnee]),
            Metric::AngleRightHipKnee => MetricSource::Angle([LeftHip, RightHip, RightKnee]),
            Metric::SlopeEyes => MetricSource::Slope([LeftEye, RightEye]),
        }
    }
}

/// Vista inmutable de la pose en un frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseSnapshot {
    landmarks: [LandmarkPoint; NUM_LANDMARKS],
    metrics: [Option<f32>; NUM_METRICS],
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl PoseSnapshot {
    /// Snapshot sin ningún landmark visible
    pub fn empty() -> Self {
        Self {
            landmarks: [LandmarkPoint::default(); NUM_LANDMARKS],
            metrics: [None; NUM_METRICS],
        }
    }

    /// Construye el snapshot y calcula todas las métricas derivadas
    pub fn from_landmarks(landmarks: [LandmarkPoint; NUM_LANDMARKS]) -> Self {
        let mut snapshot = Self {
            landmarks,
            metrics: [None; NUM_METRICS],
        };
        snapshot.recompute_metrics();
        snapshot
    }

    /// Igual que `from_landmarks` pero a partir de pares (landmark, punto);
    /// los landmarks que no aparecen quedan invisibles
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (Landmark, LandmarkPoint)>,
    {
        let mut landmarks = [LandmarkPoint::default(); NUM_LANDMARKS];
        for (landmark, point) in points {
            landmarks[landmark.index()] = point;
        }
        Self::from_landmarks(landmarks)
    }

    /// Reemplaza un landmark y recalcula las métricas.
    /// Sobrescribe cualquier métrica fijada antes con `with_metric`.
    pub fn with_landmark(mut self, landmark: Landmark, point: LandmarkPoint) -> Self {
        self.landmarks[landmark.index()] = point;
        self.recompute_metrics();
        self
    }

    /// Fija una métrica tal como la entrega un estimador externo
    pub fn with_metric(mut self, metric: Metric, value: Option<f32>) -> Self {
        self.metrics[metric.index()] = value;
        self
    }

    pub fn landmark(&self, landmark: Landmark) -> &LandmarkPoint {
        &self.landmarks[landmark.index()]
    }

    /// Coordenada de imagen de un landmark; `None` si no es visible
    pub fn coord(&self, landmark: Landmark, axis: Axis) -> Option<f32> {
        let point = &self.landmarks[landmark.index()];
        point.visible.then(|| point.pose[axis.index()])
    }

    pub fn metric(&self, metric: Metric) -> Option<f32> {
        self.metrics[metric.index()]
    }

    pub fn recompute_metrics(&mut self) {
        for metric in Metric::ALL {
            self.metrics[metric.index()] = self.compute_metric(metric);
        }
    }

    fn compute_metric(&self, metric: Metric) -> Option<f32> {
        match metric.source() {
            MetricSource::Angle([a, b, c]) => {
                let a = self.visible_point(a)?.world;
                let b = self.visible_point(b)?.world;
                let c = self.visible_point(c)?.world;
                angle_deg(a, b, c)
            }
            MetricSource::Slope([a, b]) => {
                let a = self.visible_point(a)?.pose;
                let b = self.visible_point(b)?.pose;
                slope_deg(a, b)
            }
        }
    }

    fn visible_point(&self, landmark: Landmark) -> Option<&LandmarkPoint> {
        let point = &self.landmarks[landmark.index()];
        point.visible.then_some(point)
    }

    /// Volcado legible de landmarks y métricas para diagnóstico
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for landmark in Landmark::ALL {
            let point = self.landmark(landmark);
            if point.visible {
                let _ = writeln!(
                    out,
                    "{}: x: {:.2}, y: {:.2}, z: {:.2}",
                    landmark.name(),
                    point.pose[0],
                    point.pose[1],
                    point.pose[2]
                );
            } else {
                let _ = writeln!(out, "{}: None", landmark.name());
            }
        }
        for metric in Metric::ALL {
            match self.metric(metric) {
                Some(value) => {
                    let _ = writeln!(out, "{}: {:.1}", metric.name(), value);
                }
                None => {
                    let _ = writeln!(out, "{}: None", metric.name());
                }
            }
        }
        out
    }
}

/// Landmark tal como lo entrega el estimador: imagen normalizada y, opcionalmente, world
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LandmarkRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub world: Option<[f32; 3]>,
}

impl LandmarkRecord {
    pub fn to_point(self) -> LandmarkPoint {
        let pose = [self.x, self.y, self.z];
        LandmarkPoint::new(pose, self.world.unwrap_or(pose))
    }
}

/// Un frame de entrada en JSON:
/// `{"landmarks": {"NOSE": {"x": 0.5, "y": 0.3}}, "metrics": {"SLOPE_EYES": 12.0}}`.
/// Las métricas explícitas reemplazan a las calculadas.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FrameRecord {
    #[serde(default)]
    pub landmarks: HashMap<Landmark, LandmarkRecord>,
    #[serde(default)]
    pub metrics: HashMap<Metric, Option<f32>>,
}

impl FrameRecord {
    pub fn to_snapshot(&self) -> PoseSnapshot {
        let mut snapshot = PoseSnapshot::from_points(
            self.landmarks
                .iter()
                .map(|(landmark, record)| (*landmark, record.to_point())),
        );
        for (metric, value) in &self.metrics {
            snapshot.metrics[metric.index()] = *value;
        }
        snapshot
    }
}

/// Constantes del sistema
pub const NUM_LANDMARKS: usize = 25;
pub const NUM_METRICS: usize = 13;
