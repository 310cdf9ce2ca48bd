//! Ángulos y pendientes entre landmarks
//!
//! Los ángulos se calculan con el producto escalar en 3D:
//! cos(θ) = (ba · bc) / (|ba| × |bc|), con `b` como vértice.

const MIN_NORM: f32 = 1e-6;

/// Ángulo en grados en el vértice `b` formado por `a` y `c`.
/// Retorna `None` si algún segmento tiene longitud nula.
pub fn angle_deg(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Option<f32> {
    let ba = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    let bc = [c[0] - b[0], c[1] - b[1], c[2] - b[2]];

    let dot = ba[0] * bc[0] + ba[1] * bc[1] + ba[2] * bc[2];
    let norm_ba = (ba[0] * ba[0] + ba[1] * ba[1] + ba[2] * ba[2]).sqrt();
    let norm_bc = (bc[0] * bc[0] + bc[1] * bc[1] + bc[2] * bc[2]).sqrt();

    if norm_ba < MIN_NORM || norm_bc < MIN_NORM {
        return None;
    }

    let cos_angle = (dot / (norm_ba * norm_bc)).clamp(-1.0, 1.0);
    let angle = cos_angle.acos().to_degrees();
    angle.is_finite().then_some(angle)
}

/// Pendiente en grados de la recta `a → b` en el plano XY: atan(dy / dx).
///
/// Con dx = 0 la pendiente es ±90°; con dx = dy = 0 no está definida.
pub fn slope_deg(a: [f32; 3], b: [f32; 3]) -> Option<f32> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];

    if dx == 0.0 && dy == 0.0 {
        return None;
    }

    let slope = (dy / dx).atan().to_degrees();
    slope.is_finite().then_some(slope)
}
