//! Click-density clusters for the page overlay.
//!
//! Single pass: each click joins the nearest cluster seed within the radius
//! or seeds a new cluster. Centroids are recomputed once at the end and
//! points are never reassigned, so the result depends on click order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ClusteringConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

impl ClickPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &ClickPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub fn from_array([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }

    /// Linear interpolation in RGB space, `t` clamped to `[0, 1]`
    pub fn lerp(from: RgbColor, to: RgbColor, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let channel =
            |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round().clamp(0.0, 255.0) as u8;
        Self {
            r: channel(from.r, to.r),
            g: channel(from.g, to.g),
            b: channel(from.b, to.b),
        }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCluster {
    pub center: ClickPoint,
    pub count: usize,
    pub color: RgbColor,
    pub size: f64,
    pub opacity: f64,
    /// `(count / max_count) ^ exponent`, in `[0, 1]`
    pub density: f64,
}

struct Assignment {
    seed: ClickPoint,
    members: Vec<ClickPoint>,
}

impl Assignment {
    fn centroid(&self) -> ClickPoint {
        let n = self.members.len() as f64;
        let (sx, sy) = self
            .members
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        ClickPoint::new(sx / n, sy / n)
    }
}

/// Group raw clicks into renderable density clusters.
///
/// Output order is the order clusters were seeded.
pub fn cluster_points(points: &[ClickPoint], config: &ClusteringConfig) -> Vec<DensityCluster> {
    let mut assignments: Vec<Assignment> = Vec::new();

    for point in points.iter().filter(|p| p.x.is_finite() && p.y.is_finite()) {
        let nearest = assignments
            .iter()
            .enumerate()
            .map(|(i, a)| (i, a.seed.distance(point)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((i, distance)) if distance <= config.radius => assignments[i].members.push(*point),
            _ => assignments.push(Assignment {
                seed: *point,
                members: vec![*point],
            }),
        }
    }

    let max_count = assignments.iter().map(|a| a.members.len()).max().unwrap_or(0);
    if max_count == 0 {
        return Vec::new();
    }

    let cold = RgbColor::from_array(config.cold_color);
    let hot = RgbColor::from_array(config.hot_color);

    assignments
        .iter()
        .map(|a| {
            let count = a.members.len();
            let density = (count as f64 / max_count as f64).powf(config.density_exponent);
            DensityCluster {
                center: a.centroid(),
                count,
                color: RgbColor::lerp(cold, hot, density),
                size: config.min_size + (config.max_size - config.min_size) * density,
                opacity: config.base_opacity + config.opacity_range * density,
                density,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(raw: &[(f64, f64)]) -> Vec<ClickPoint> {
        raw.iter().map(|&(x, y)| ClickPoint::new(x, y)).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_points(&[], &ClusteringConfig::default()).is_empty());
    }

    #[test]
    fn test_two_nearby_one_far() {
        let clusters = cluster_points(
            &points(&[(10.0, 10.0), (15.0, 12.0), (100.0, 100.0)]),
            &ClusteringConfig::default(),
        );
        assert_eq!(clusters.len(), 2);

        let dense = &clusters[0];
        assert_eq!(dense.count, 2);
        assert!((dense.center.x - 12.5).abs() < 1e-9);
        assert!((dense.center.y - 11.0).abs() < 1e-9);
        assert_eq!(dense.density, 1.0);
        assert_eq!(dense.color, RgbColor { r: 239, g: 68, b: 68 });
        assert_eq!(dense.size, 80.0);
        assert!((dense.opacity - 0.8).abs() < 1e-9);

        let sparse = &clusters[1];
        assert_eq!(sparse.count, 1);
        assert_eq!(sparse.center, ClickPoint::new(100.0, 100.0));
        assert!((sparse.density - 0.5f64.powf(0.7)).abs() < 1e-9);
    }

    #[test]
    fn test_assignment_uses_seed_not_running_mean() {
        // (0,0) seeds; (39,0) joins; (75,0) is 75 from the seed even though
        // it is 55.5 from the final centroid, so it seeds its own cluster
        let clusters = cluster_points(
            &points(&[(0.0, 0.0), (39.0, 0.0), (75.0, 0.0)]),
            &ClusteringConfig::default(),
        );
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn test_points_never_reassigned_after_recompute() {
        // (30,0) joins seed (0,0); (60,0) is 60 from (0,0) so seeds cluster
        // two even though it is only 45 from the recomputed centroid (15,0)
        let clusters = cluster_points(
            &points(&[(0.0, 0.0), (30.0, 0.0), (60.0, 0.0), (61.0, 0.0)]),
            &ClusteringConfig::default(),
        );
        assert_eq!(clusters.iter().map(|c| c.count).collect::<Vec<_>>(), vec![2, 2]);
    }

    #[test]
    fn test_nearest_seed_wins() {
        let clusters = cluster_points(
            &points(&[(0.0, 0.0), (70.0, 0.0), (45.0, 0.0)]),
            &ClusteringConfig::default(),
        );
        assert_eq!(clusters[0].count, 1);
        assert_eq!(clusters[1].count, 2);
    }

    #[test]
    fn test_counts_sum_to_input() {
        let raw: Vec<(f64, f64)> = (0..50)
            .map(|i| ((i * 37 % 400) as f64, (i * 91 % 600) as f64))
            .collect();
        let clusters = cluster_points(&points(&raw), &ClusteringConfig::default());
        assert_eq!(clusters.iter().map(|c| c.count).sum::<usize>(), 50);
        assert!(clusters.iter().all(|c| c.density > 0.0 && c.density <= 1.0));
        assert!(clusters.iter().any(|c| c.density == 1.0));
    }

    #[test]
    fn test_color_endpoints_and_format() {
        let cold = RgbColor::from_array([34, 197, 94]);
        let hot = RgbColor::from_array([239, 68, 68]);
        assert_eq!(RgbColor::lerp(cold, hot, 0.0), cold);
        assert_eq!(RgbColor::lerp(cold, hot, 1.0), hot);
        assert_eq!(hot.to_string(), "rgb(239, 68, 68)");
        assert_eq!(hot.hex(), "#ef4444");
    }
}
