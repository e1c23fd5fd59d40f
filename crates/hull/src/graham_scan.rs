use std::cmp::Ordering;

use lidarplanes_core::geometry::{ccw, distance_squared_2d, Vec2};

/// Convex hull of `points` by Graham scan, as indices into `points`.
///
/// The anchor is the point with the smallest y (lowest index among ties).
/// The rest are visited in ascending polar angle around it, nearer points
/// first on equal angles. A point is kept only if it makes a strictly
/// counter-clockwise turn, so collinear middle points are dropped, including
/// any lying on the closing edge back to the anchor. That final pass reuses
/// the same `ccw > 0` test and removes nothing but such closing-edge points.
///
/// The result runs counter-clockwise starting at the anchor. Inputs with
/// fewer than 3 points are returned unchanged.
pub fn graham_scan_indices(points: &[Vec2]) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let anchor = lowest_point(points);
    let origin = points[anchor];

    let mut order: Vec<(usize, f32, f32)> = (0..n)
        .filter(|&i| i != anchor)
        .map(|i| {
            let p = &points[i];
            let angle = (p[1] - origin[1]).atan2(p[0] - origin[0]);
            (i, angle, distance_squared_2d(&origin, p))
        })
        .collect();
    order.sort_by(|a, b| {
        a.1.total_cmp(&b.1)
            .then_with(|| a.2.total_cmp(&b.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    let mut hull = Vec::with_capacity(n);
    hull.push(anchor);
    hull.push(order[0].0);

    for &(next, _, _) in &order[1..] {
        while hull.len() >= 2 && !left_turn(points, &hull, next) {
            hull.pop();
        }
        hull.push(next);
    }

    // Same strict turn test, applied to the closing edge: only drops
    // trailing points collinear with the last edge and the anchor.
    while hull.len() >= 3 && !left_turn(points, &hull, anchor) {
        hull.pop();
    }

    hull
}

/// Convex hull of `points` by Graham scan, as coordinates.
///
/// See [`graham_scan_indices`] for ordering and degenerate-input behavior.
pub fn graham_scan(points: &[Vec2]) -> Vec<Vec2> {
    graham_scan_indices(points)
        .into_iter()
        .map(|i| points[i])
        .collect()
}

fn lowest_point(points: &[Vec2]) -> usize {
    let mut best = 0;
    for (i, p) in points.iter().enumerate().skip(1) {
        if p[1].total_cmp(&points[best][1]) == Ordering::Less {
            best = i;
        }
    }
    best
}

#[inline]
fn left_turn(points: &[Vec2], hull: &[usize], next: usize) -> bool {
    let a = &points[hull[hull.len() - 2]];
    let b = &points[hull[hull.len() - 1]];
    ccw(a, b, &points[next]) > 0.0
}
