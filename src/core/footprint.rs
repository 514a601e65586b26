//! Choosing the product granule whose footprint best covers a query point.

use serde::{Deserialize, Serialize};

/// Polygon ring of (lon, lat) vertices. The closing edge is implied, an
/// explicitly closed ring is accepted as well.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Footprint {
    pub vertices: Vec<(f64, f64)>,
}

impl Footprint {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        Self { vertices }
    }

    /// Even-odd ray casting towards +x.
    ///
    /// Horizontal edges never count as crossings, and a point on an upper
    /// vertex or right-hand edge counts as a crossing of that edge.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }

        let mut crossings = 0usize;
        for i in 0..n {
            let (x1, y1) = self.vertices[i];
            let (x2, y2) = self.vertices[(i + 1) % n];

            if lat > y1.min(y2) && lat <= y1.max(y2) && lon <= x1.max(x2) && y1 != y2 {
                let x_intersect = (lat - y1) * (x2 - x1) / (y2 - y1) + x1;
                if x1 == x2 || lon <= x_intersect {
                    crossings += 1;
                }
            }
        }

        crossings % 2 == 1
    }

    /// Smallest Euclidean distance from (lon, lat) to any vertex; a cheap
    /// stand-in for "distance to the border"
    pub fn min_vertex_distance(&self, lon: f64, lat: f64) -> f64 {
        self.vertices
            .iter()
            .map(|&(x, y)| ((x - lon).powi(2) + (y - lat).powi(2)).sqrt())
            .fold(f64::INFINITY, f64::min)
    }
}

/// A catalog entry together with its footprint
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<R> {
    pub footprint: Footprint,
    pub record: R,
}

impl<R> Candidate<R> {
    pub fn new(footprint: Footprint, record: R) -> Self {
        Self { footprint, record }
    }
}

/// Index of the best candidate for (lon, lat).
///
/// Only footprints containing the point qualify. Among several, the one whose
/// nearest vertex is farthest away wins, ties go to the earliest candidate.
pub fn select_index<R>(candidates: &[Candidate<R>], lon: f64, lat: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, candidate) in candidates.iter().enumerate() {
        if !candidate.footprint.contains(lon, lat) {
            continue;
        }
        let distance = candidate.footprint.min_vertex_distance(lon, lat);
        if best.map_or(true, |(_, d)| distance > d) {
            best = Some((i, distance));
        }
    }

    if let Some((i, d)) = best {
        log::debug!("Selected footprint {} with vertex clearance {:.4}", i, d);
    }
    best.map(|(i, _)| i)
}

pub fn select<R>(candidates: &[Candidate<R>], lon: f64, lat: f64) -> Option<&Candidate<R>> {
    select_index(candidates, lon, lat).map(|i| &candidates[i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Footprint {
        Footprint::new(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
        ])
    }

    #[test]
    fn test_contains_interior_and_exterior() {
        let fp = square(0.0, 0.0, 10.0);
        assert!(fp.contains(5.0, 5.0));
        assert!(!fp.contains(15.0, 5.0));
        assert!(!fp.contains(5.0, -1.0));
    }

    #[test]
    fn test_closed_ring_equivalent() {
        let open = square(0.0, 0.0, 10.0);
        let mut closed = open.clone();
        closed.vertices.push((0.0, 0.0));
        for &(x, y) in &[(5.0, 5.0), (11.0, 5.0), (1.0, 9.0), (-3.0, 2.0)] {
            assert_eq!(open.contains(x, y), closed.contains(x, y));
        }
    }

    #[test]
    fn test_degenerate_polygon() {
        let line = Footprint::new(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(!line.contains(0.5, 0.5));
    }

    #[test]
    fn test_min_vertex_distance() {
        let fp = square(0.0, 0.0, 10.0);
        assert!((fp.min_vertex_distance(3.0, 4.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_select_none_and_single() {
        let candidates = vec![Candidate::new(square(0.0, 0.0, 1.0), "a")];
        assert!(select(&candidates, 5.0, 5.0).is_none());
        assert_eq!(select(&candidates, 0.5, 0.5).map(|c| c.record), Some("a"));
    }

    #[test]
    fn test_select_most_centered() {
        let candidates = vec![
            Candidate::new(square(0.0, 0.0, 10.0), "edge"),
            Candidate::new(square(-5.0, -5.0, 20.0), "centered"),
        ];
        assert_eq!(select(&candidates, 5.0, 5.0).map(|c| c.record), Some("centered"));
    }
}
