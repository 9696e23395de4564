//! Numerical MT2.
//!
//! MT2 = min over splittings `q_a + q_b = p_miss` of `max(MT(a, q_a), MT(b, q_b))`. Each MT is
//! convex in its invisible momentum, so the maximum is convex in `q_a` and a nested
//! golden-section search over the two components converges to the global minimum.

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use skim_core::{Mt2Solver, VisibleParent};

/// Relative bracket width at which a 1-D search stops early.
const TOLERANCE: f64 = 1e-10;

/// Golden-section MT2 minimiser.
#[derive(Debug, Clone, Copy)]
pub struct GoldenSectionMt2 {
    max_iters: u64,
}

impl Default for GoldenSectionMt2 {
    fn default() -> Self {
        Self { max_iters: 100 }
    }
}

impl GoldenSectionMt2 {
    /// Solver with a custom cap on golden-section steps per dimension.
    pub fn with_iterations(max_iters: u64) -> Self {
        Self { max_iters: max_iters.max(1) }
    }
}

/// Squared transverse mass of a visible parent and an invisible particle.
fn mt_squared(p: &VisibleParent, qx: f64, qy: f64, invisible_mass: f64) -> f64 {
    let m2 = invisible_mass * invisible_mass;
    let et_vis = (p.mass * p.mass + p.px * p.px + p.py * p.py).sqrt();
    let et_inv = (m2 + qx * qx + qy * qy).sqrt();
    (p.mass * p.mass + m2 + 2.0 * (et_vis * et_inv - p.px * qx - p.py * qy)).max(0.0)
}

/// One MT2 problem: two visible parents sharing the missing momentum.
struct Split {
    a: VisibleParent,
    b: VisibleParent,
    missing: (f64, f64),
    invisible_mass: f64,
}

impl Split {
    fn objective(&self, qx: f64, qy: f64) -> f64 {
        let (mx, my) = self.missing;
        mt_squared(&self.a, qx, qy, self.invisible_mass)
            .max(mt_squared(&self.b, mx - qx, my - qy, self.invisible_mass))
    }
}

/// The objective along `qy` with `qx` held fixed.
struct SliceAtQx<'a> {
    split: &'a Split,
    qx: f64,
}

impl CostFunction for SliceAtQx<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, qy: &Self::Param) -> Result<Self::Output, ArgminError> {
        Ok(self.split.objective(self.qx, *qy))
    }
}

/// The objective minimised over `qy`, as a function of `qx`.
struct ProfileOverQy<'a> {
    split: &'a Split,
    window: (f64, f64),
    max_iters: u64,
}

impl CostFunction for ProfileOverQy<'_> {
    type Param = f64;
    type Output = f64;

    fn cost(&self, qx: &Self::Param) -> Result<Self::Output, ArgminError> {
        minimise(SliceAtQx { split: self.split, qx: *qx }, self.window, self.max_iters)
    }
}

/// Minimum of a 1-D convex cost on `[lo, hi]`.
fn minimise<O>(problem: O, (lo, hi): (f64, f64), max_iters: u64) -> Result<f64, ArgminError>
where
    O: CostFunction<Param = f64, Output = f64>,
{
    let solver = GoldenSectionSearch::new(lo, hi)?.with_tolerance(TOLERANCE)?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.param(0.5 * (lo + hi)).max_iters(max_iters))
        .run()?;
    Ok(res.state().get_best_cost())
}

impl GoldenSectionMt2 {
    fn solve(&self, split: &Split) -> Result<f64, ArgminError> {
        let (a, b) = (&split.a, &split.b);
        let (mx, my) = split.missing;
        // The minimum lies well inside a box scaled by every momentum and mass in the problem.
        let scale = 2.0 * (a.px.hypot(a.py) + b.px.hypot(b.py) + mx.hypot(my))
            + a.mass
            + b.mass
            + split.invisible_mass
            + 1.0;
        let (cx, cy) = (0.5 * mx, 0.5 * my);

        let profile = ProfileOverQy {
            split,
            window: (cy - scale, cy + scale),
            max_iters: self.max_iters,
        };
        let best = minimise(profile, (cx - scale, cx + scale), self.max_iters)?;
        Ok(best.sqrt())
    }
}

impl Mt2Solver for GoldenSectionMt2 {
    fn mt2(
        &self,
        a: VisibleParent,
        b: VisibleParent,
        missing: (f64, f64),
        invisible_mass: f64,
    ) -> f64 {
        let split = Split { a, b, missing, invisible_mass };
        match self.solve(&split) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "MT2 minimisation failed; using 0");
                0.0
            }
        }
    }
}
