//! Nearest-neighbor lookup over a static point set.

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Result of a 1-nearest-neighbor query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// 2-d k-d tree built once over the vector layer points. No insertion or
/// removal after build; the layer is static per run.
#[derive(Debug)]
pub struct PointIndex {
    nodes: Vec<Node>,
    points: Vec<(f64, f64)>,
}

#[derive(Debug)]
struct Node {
    point: usize,
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

impl PointIndex {
    /// O(n log n) median-split construction.
    pub fn build(points: Vec<(f64, f64)>) -> Self {
        let mut nodes = Vec::with_capacity(points.len());
        if !points.is_empty() {
            let mut order: Vec<usize> = (0..points.len()).collect();
            split(&points, &mut order, 0, &mut nodes);
        }
        Self { nodes, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The single nearest point to the query, `None` only for an empty index.
    /// Ties resolve to the first candidate visited, which is deterministic
    /// for a fixed build input.
    pub fn nearest(&self, x: f64, y: f64) -> Option<Neighbor> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut best = (f64::MAX, 0usize);
        self.descend(0, x, y, &mut best);

        Some(Neighbor {
            index: best.1,
            distance: best.0.sqrt(),
        })
    }

    fn descend(&self, node_idx: usize, x: f64, y: f64, best: &mut (f64, usize)) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.points[node.point];

        let dx = x - px;
        let dy = y - py;
        let dist_sq = dx * dx + dy * dy;
        if dist_sq < best.0 {
            *best = (dist_sq, node.point);
        }

        let diff = if node.axis == 0 { dx } else { dy };
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = near {
            self.descend(child, x, y, best);
        }

        // The far side can only win if the splitting plane is closer than
        // the best match so far.
        if diff * diff < best.0
            && let Some(child) = far
        {
            self.descend(child, x, y, best);
        }
    }
}

fn split(points: &[(f64, f64)], order: &mut [usize], depth: usize, nodes: &mut Vec<Node>) -> usize {
    let axis = (depth % 2) as u8;

    order.sort_by(|&a, &b| {
        let va = if axis == 0 { points[a].0 } else { points[a].1 };
        let vb = if axis == 0 { points[b].0 } else { points[b].1 };
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let median = order.len() / 2;
    let node_idx = nodes.len();
    nodes.push(Node {
        point: order[median],
        axis,
        left: None,
        right: None,
    });

    if median > 0 {
        let mut left = order[..median].to_vec();
        let child = split(points, &mut left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }

    if median + 1 < order.len() {
        let mut right = order[median + 1..].to_vec();
        let child = split(points, &mut right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }

    node_idx
}

/// Approximate great-circle distance in meters between two lon/lat points,
/// using the equirectangular projection around the mean latitude.
pub fn approx_distance_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (ln1, lt1) = (lon1.to_radians(), lat1.to_radians());
    let (ln2, lt2) = (lon2.to_radians(), lat2.to_radians());

    let x = (ln2 - ln1) * (0.5 * (lt2 + lt1)).cos();
    let y = lt2 - lt1;
    EARTH_RADIUS_M * (x * x + y * y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<(f64, f64)> {
        vec![
            (0.0, 0.0),
            (1.0, 0.0),
            (0.0, 1.0),
            (1.0, 1.0),
            (0.5, 0.5),
            (-1.0, -2.0),
        ]
    }

    #[test]
    fn test_nearest_on_coincident_point() {
        let index = PointIndex::build(grid());

        let near = index.nearest(0.5, 0.5).unwrap();
        assert_eq!(near.index, 4);
        assert!(near.distance.abs() < 1e-12);
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = grid();
        let index = PointIndex::build(points.clone());

        let queries = [(0.2, 0.1), (0.9, 0.95), (-0.4, -1.2), (10.0, 10.0)];
        for (qx, qy) in queries {
            let near = index.nearest(qx, qy).unwrap();

            let (expected, dist_sq) = points
                .iter()
                .enumerate()
                .map(|(i, &(px, py))| (i, (qx - px).powi(2) + (qy - py).powi(2)))
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
                .unwrap();

            assert_eq!(near.index, expected, "query ({qx}, {qy})");
            assert!((near.distance - dist_sq.sqrt()).abs() < 1e-12);
            assert!(near.distance >= 0.0);
        }
    }

    #[test]
    fn test_single_point_layer() {
        let index = PointIndex::build(vec![(0.0, 0.0)]);

        let near = index.nearest(0.0, 0.0001).unwrap();
        assert_eq!(near.index, 0);
        assert!(near.distance > 0.0);
    }

    #[test]
    fn test_empty_index_returns_none() {
        let index = PointIndex::build(Vec::new());
        assert!(index.nearest(0.0, 0.0).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_queries_are_deterministic() {
        // Two coincident candidates; the winner must not vary across calls
        let index = PointIndex::build(vec![(1.0, 1.0), (1.0, 1.0), (2.0, 2.0)]);

        let first = index.nearest(1.0, 1.0).unwrap().index;
        for _ in 0..10 {
            assert_eq!(index.nearest(1.0, 1.0).unwrap().index, first);
        }
    }

    #[test]
    fn test_approx_distance_small_offset() {
        // 0.0001 degrees of latitude at the equator
        let expected = EARTH_RADIUS_M * 0.0001_f64.to_radians();
        let distance = approx_distance_m(0.0, 0.0, 0.0, 0.0001);

        assert!((distance - expected).abs() < 1e-6);
        assert_eq!(approx_distance_m(5.0, 5.0, 5.0, 5.0), 0.0);
    }
}
