//! Small kinematic helpers shared by the selection and derivation code.

/// Signed azimuthal separation `phi2 - phi1`, wrapped into `(-π, π]`.
#[inline]
pub fn delta_phi(phi1: f64, phi2: f64) -> f64 {
    let d = phi2 - phi1;
    d.sin().atan2(d.cos())
}

/// Absolute azimuthal separation in `[0, π]`.
#[inline]
pub fn abs_delta_phi(phi1: f64, phi2: f64) -> f64 {
    delta_phi(phi1, phi2).abs()
}

/// ΔR = √(Δφ² + Δη²).
#[inline]
pub fn delta_r(phi1: f64, eta1: f64, phi2: f64, eta2: f64) -> f64 {
    let dphi = abs_delta_phi(phi1, phi2);
    let deta = eta1 - eta2;
    (dphi * dphi + deta * deta).sqrt()
}

/// `√(x² + y²)` computed by scaling with the larger magnitude, so neither overflow nor
/// underflow occurs for extreme operands. Returns 0 when both are zero.
#[inline]
pub fn add_in_quadrature(x: f64, y: f64) -> f64 {
    let (x, y) = (x.abs(), y.abs());
    let (big, small) = if x >= y { (x, y) } else { (y, x) };
    if big > 0.0 {
        let ratio = small / big;
        big * (1.0 + ratio * ratio).sqrt()
    } else {
        0.0
    }
}

/// Transverse mass of two massless transverse momenta:
/// `√(2·(|p1⊥|·|p2⊥| − px1·px2 − py1·py2))`.
///
/// Rounding can push the radicand a hair below zero for collinear inputs; that is clamped to 0.
#[inline]
pub fn transverse_mass(px1: f64, py1: f64, px2: f64, py2: f64) -> f64 {
    let radicand =
        2.0 * (add_in_quadrature(px1, py1) * add_in_quadrature(px2, py2) - px1 * px2 - py1 * py2);
    radicand.max(0.0).sqrt()
}
