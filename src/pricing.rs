use tracing::warn;

use crate::column_generation::Pattern;
use crate::config::CapacityPolicy;
use crate::error::{Error, Result, Stage};
use crate::lp::{Domain, LinearProgram, LpSolver, Relation, Sense};
use crate::types::Rect;

/// Reduced costs above `-REDUCED_COST_EPS` do not improve the master problem.
pub const REDUCED_COST_EPS: f64 = 1e-6;

/// Footprint charged per item along (sheet width, sheet height).
pub fn footprints(dims: &[Rect], sheet: Rect, policy: CapacityPolicy) -> Vec<Rect> {
    match policy {
        CapacityPolicy::AsGiven => dims.to_vec(),
        CapacityPolicy::EitherOrientation => dims
            .iter()
            .map(|d| {
                if sheet.w <= sheet.h {
                    Rect::new(d.short_side(), d.long_side())
                } else {
                    Rect::new(d.long_side(), d.short_side())
                }
            })
            .collect(),
    }
}

pub fn fits_capacity(pattern: &Pattern, dims: &[Rect], sheet: Rect, policy: CapacityPolicy) -> bool {
    let feet = footprints(dims, sheet, policy);
    let (w, h) = pattern
        .counts()
        .iter()
        .zip(&feet)
        .fold((0u64, 0u64), |(w, h), (&x, f)| {
            (w + x as u64 * f.w as u64, h + x as u64 * f.h as u64)
        });
    w <= sheet.w as u64 && h <= sheet.h as u64
}

pub fn reduced_cost(pattern: &Pattern, duals: &[f64]) -> f64 {
    1.0 - pattern
        .counts()
        .iter()
        .zip(duals)
        .map(|(&x, &d)| x as f64 * d)
        .sum::<f64>()
}

/// Finds the pattern with the most negative reduced cost `1 - Σ dual_i · x_i`,
/// or `None` when no pattern improves the master problem.
///
/// Capacity only bounds the summed footprint along each sheet axis, so a
/// priced pattern need not have a non-overlapping 2D layout.
pub fn price<S: LpSolver>(
    solver: &S,
    duals: &[f64],
    dims: &[Rect],
    sheet: Rect,
    policy: CapacityPolicy,
) -> Result<Option<Pattern>> {
    let feet = footprints(dims, sheet, policy);
    let values: Vec<f64> = duals.iter().map(|d| d.max(0.0)).collect();

    // Items without value or without room are pinned to zero.
    let bounds = feet
        .iter()
        .zip(&values)
        .map(|(f, &v)| {
            let fit = (sheet.w / f.w).min(sheet.h / f.h);
            Some(if v > REDUCED_COST_EPS { fit as f64 } else { 0.0 })
        })
        .collect();

    let lp = LinearProgram::new(Sense::Maximize, values.clone(), Domain::Integer)
        .with_constraint(feet.iter().map(|f| f.w as f64).collect(), Relation::Le, sheet.w as f64)
        .with_constraint(feet.iter().map(|f| f.h as f64).collect(), Relation::Le, sheet.h as f64)
        .with_upper_bounds(bounds);

    let solution = solver
        .solve(&lp)
        .map_err(|e| Error::from_solve(Stage::Pricing, e))?;
    let pattern = Pattern::new(
        solution
            .values
            .iter()
            .map(|v| v.max(0.0).round() as u32)
            .collect(),
    );

    if reduced_cost(&pattern, &values) >= -REDUCED_COST_EPS {
        return Ok(None);
    }
    if !fits_capacity(&pattern, dims, sheet, policy) {
        warn!(?pattern, "priced pattern violates sheet capacity, discarding");
        return Ok(None);
    }
    Ok(Some(pattern))
}
