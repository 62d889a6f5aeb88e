//! Principal axis of a point cloud

use glam::{DMat3, DVec3};

const POWER_ITERATIONS: usize = 64;

/// Mean and unit principal axis of `points`.
///
/// The axis is the eigenvector of the covariance matrix with the largest
/// eigenvalue, found by power iteration. Degenerate clouds yield `DVec3::X`.
pub fn principal_axis(points: &[DVec3]) -> (DVec3, DVec3) {
    if points.is_empty() {
        return (DVec3::ZERO, DVec3::X);
    }
    let mean = points.iter().copied().sum::<DVec3>() / points.len() as f64;
    let covariance = points.iter().fold(DMat3::ZERO, |sum, &p| {
        let d = p - mean;
        sum + DMat3::from_cols(d * d.x, d * d.y, d * d.z)
    });

    // Start from the longest column.
    let start = [covariance.x_axis, covariance.y_axis, covariance.z_axis]
        .into_iter()
        .max_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
        .unwrap_or(DVec3::X);
    let Some(mut axis) = start.try_normalize() else {
        return (mean, DVec3::X);
    };
    for _ in 0..POWER_ITERATIONS {
        match (covariance * axis).try_normalize() {
            Some(next) => axis = next,
            None => break,
        }
    }
    (mean, axis)
}
