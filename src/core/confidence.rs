/// Maps an engine-reported score into `[0, 1]`. Non-finite scores yield `None`.
pub fn normalize_confidence(raw: f64) -> Option<f64> {
    if raw.is_finite() {
        Some(raw.clamp(0.0, 1.0))
    } else {
        None
    }
}

/// Two engines independently proposing the same symbol.
pub fn corroborated(a: f64, b: f64) -> f64 {
    a.max(b).clamp(0.0, 1.0)
}

/// Whether two scores are too close to call.
pub fn is_tie(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon
}
