//! Reduces a cloud of points to its cost-minimal frontier.
//!
//! The frontier is the lower-left boundary of the cloud in (emissions, cost) space: for any
//! emissions level, no cloud point at or below that level is cheaper than the frontier. It is built
//! in two passes:
//!
//! 1. A skyline scan over the points in order of emissions, keeping only points strictly cheaper
//!    than every point with lower emissions. Of several points with equal emissions, only the
//!    cheapest can be kept.
//! 2. A Douglas–Peucker simplification of the resulting piecewise-linear curve, dropping points
//!    whose vertical (cost) distance from the simplified curve is within a tolerance. The tolerance
//!    is the frontier's cost span multiplied by `exp(-affinity_factor)`, so a higher affinity
//!    factor keeps more points.
use anyhow::{Result, ensure};

/// A point which can be placed on a cost/emissions frontier
pub trait FrontierPoint {
    /// Position on the emissions axis
    fn emissions(&self) -> f64;

    /// Position on the cost axis
    fn cost(&self) -> f64;
}

/// Build the frontier of a set of points.
///
/// # Arguments
///
/// * `points` - The cloud of candidate points
/// * `affinity_factor` - How closely the simplified frontier follows the points
///
/// # Returns
///
/// Frontier points, sorted by strictly increasing emissions and strictly decreasing cost.
pub fn build_frontier<P: FrontierPoint>(points: Vec<P>, affinity_factor: f64) -> Result<Vec<P>> {
    ensure!(
        !points.is_empty(),
        "Cannot build a frontier from an empty cloud"
    );
    ensure!(
        points
            .iter()
            .all(|point| point.emissions().is_finite() && point.cost().is_finite()),
        "Cloud contains non-finite emissions or cost values"
    );

    let skyline = skyline(points);
    let tolerance = cost_span(&skyline) * (-affinity_factor).exp();

    Ok(simplify(skyline, tolerance))
}

/// Keep only points which are strictly cheaper than all points with lower emissions
fn skyline<P: FrontierPoint>(mut points: Vec<P>) -> Vec<P> {
    points.sort_by(|a, b| {
        a.emissions()
            .total_cmp(&b.emissions())
            .then(a.cost().total_cmp(&b.cost()))
    });

    let mut frontier: Vec<P> = Vec::new();
    for point in points {
        match frontier.last() {
            // Sorted, so the last point has the lowest cost seen so far
            Some(last) if point.cost() >= last.cost() => {}
            _ => frontier.push(point),
        }
    }

    frontier
}

/// The difference between the largest and smallest cost
fn cost_span<P: FrontierPoint>(points: &[P]) -> f64 {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), point| {
            (min.min(point.cost()), max.max(point.cost()))
        });

    max - min
}

/// Vertical distance of `point` from the straight line between `start` and `end`
fn vertical_deviation<P: FrontierPoint>(point: &P, start: &P, end: &P) -> f64 {
    let fraction = (point.emissions() - start.emissions()) / (end.emissions() - start.emissions());
    let on_line = start.cost() + fraction * (end.cost() - start.cost());

    (point.cost() - on_line).abs()
}

/// Douglas–Peucker simplification of a skyline, on vertical deviation
fn simplify<P: FrontierPoint>(points: Vec<P>, tolerance: f64) -> Vec<P> {
    let len = points.len();
    if len <= 2 {
        return points;
    }

    let mut keep = vec![false; len];
    keep[0] = true;
    keep[len - 1] = true;

    let mut segments = vec![(0, len - 1)];
    while let Some((start, end)) = segments.pop() {
        if end - start < 2 {
            continue;
        }

        let (furthest, deviation) = (start + 1..end)
            .map(|i| {
                let deviation = vertical_deviation(&points[i], &points[start], &points[end]);
                (i, deviation)
            })
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((start, 0.0));

        if deviation > tolerance {
            keep[furthest] = true;
            segments.push((start, furthest));
            segments.push((furthest, end));
        }
    }

    points
        .into_iter()
        .zip(keep)
        .filter_map(|(point, keep)| keep.then_some(point))
        .collect()
}

/// Linearly interpolate cost along a frontier at the given emissions level.
///
/// Levels outside the frontier are clamped to its ends.
pub fn cost_at<P: FrontierPoint>(frontier: &[P], emissions: f64) -> Option<f64> {
    let first = frontier.first()?;
    if emissions <= first.emissions() {
        return Some(first.cost());
    }

    for (start, end) in frontier.iter().zip(frontier.iter().skip(1)) {
        if emissions <= end.emissions() {
            let fraction =
                (emissions - start.emissions()) / (end.emissions() - start.emissions());
            return Some(start.cost() + fraction * (end.cost() - start.cost()));
        }
    }

    frontier.last().map(FrontierPoint::cost)
}
