//! Balanced two-dimensional k-d tree over site coordinates.
//!
//! The tree is stored implicitly: `order` is a permutation of site ids such that
//! the node of any sub-range `[lo, hi)` sits at its midpoint, splitting on
//! latitude at even depths and on longitude at odd depths. Construction is a
//! recursive median partition, O(n log n) on average.
//!
//! Distances are Euclidean on raw (lat, lon) degrees. Equal distances resolve
//! to the lowest site id.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Spatial index mapping (lat, lon) probes to site ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdTree {
    points: Vec<[f64; 2]>,
    order: Vec<usize>,
}

/// Distance candidate ordered by (distance, site id)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist2: f64,
    gid: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.gid.cmp(&other.gid))
    }
}

fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dlat = a[0] - b[0];
    let dlon = a[1] - b[1];
    dlat * dlat + dlon * dlon
}

impl KdTree {
    /// Build the tree; index positions in `points` become the site ids
    pub fn build(points: Vec<[f64; 2]>) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        partition(&points, &mut order, 0);
        Self { points, order }
    }

    /// Number of indexed sites
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Structural check used after deserialisation
    pub fn is_consistent(&self) -> bool {
        if self.order.len() != self.points.len() {
            return false;
        }
        let mut seen = vec![false; self.points.len()];
        for &gid in &self.order {
            match seen.get_mut(gid) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// Coordinates of a site
    pub fn point(&self, gid: usize) -> Option<[f64; 2]> {
        self.points.get(gid).copied()
    }

    /// Nearest site to (lat, lon), `None` for an empty tree
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<usize> {
        let mut best: Option<Candidate> = None;
        self.search_nearest(0, self.order.len(), 0, [lat, lon], &mut best);
        best.map(|c| c.gid)
    }

    /// Nearest site with its Euclidean distance in degrees
    pub fn nearest_with_distance(&self, lat: f64, lon: f64) -> Option<(usize, f64)> {
        let mut best: Option<Candidate> = None;
        self.search_nearest(0, self.order.len(), 0, [lat, lon], &mut best);
        best.map(|c| (c.gid, c.dist2.sqrt()))
    }

    /// Up to `k` nearest sites, closest first
    pub fn nearest_k(&self, lat: f64, lon: f64, k: usize) -> Vec<usize> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        self.search_k(0, self.order.len(), 0, [lat, lon], k, &mut heap);
        heap.into_sorted_vec().into_iter().map(|c| c.gid).collect()
    }

    /// Sites inside the inclusive box spanned by two corners, ascending by id.
    ///
    /// Corners may be given in either diagonal orientation.
    pub fn within_box(&self, corner_a: (f64, f64), corner_b: (f64, f64)) -> Vec<usize> {
        let low = [corner_a.0.min(corner_b.0), corner_a.1.min(corner_b.1)];
        let high = [corner_a.0.max(corner_b.0), corner_a.1.max(corner_b.1)];
        let mut found = Vec::new();
        self.search_box(0, self.order.len(), 0, low, high, &mut found);
        found.sort_unstable();
        found
    }

    fn search_nearest(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: [f64; 2],
        best: &mut Option<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let gid = self.order[mid];
        let point = self.points[gid];
        let candidate = Candidate {
            dist2: dist2(query, point),
            gid,
        };
        if best.map_or(true, |b| candidate < b) {
            *best = Some(candidate);
        }

        let axis = depth % 2;
        let diff = query[axis] - point[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search_nearest(near.0, near.1, depth + 1, query, best);
        if best.map_or(true, |b| diff * diff <= b.dist2) {
            self.search_nearest(far.0, far.1, depth + 1, query, best);
        }
    }

    fn search_k(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        query: [f64; 2],
        k: usize,
        heap: &mut BinaryHeap<Candidate>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let gid = self.order[mid];
        let point = self.points[gid];
        let candidate = Candidate {
            dist2: dist2(query, point),
            gid,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }

        let axis = depth % 2;
        let diff = query[axis] - point[axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search_k(near.0, near.1, depth + 1, query, k, heap);
        let worst = heap.peek().map(|c| c.dist2);
        if heap.len() < k || worst.is_some_and(|w| diff * diff <= w) {
            self.search_k(far.0, far.1, depth + 1, query, k, heap);
        }
    }

    fn search_box(
        &self,
        lo: usize,
        hi: usize,
        depth: usize,
        low: [f64; 2],
        high: [f64; 2],
        found: &mut Vec<usize>,
    ) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let gid = self.order[mid];
        let point = self.points[gid];
        if (low[0]..=high[0]).contains(&point[0]) && (low[1]..=high[1]).contains(&point[1]) {
            found.push(gid);
        }

        let axis = depth % 2;
        if low[axis] <= point[axis] {
            self.search_box(lo, mid, depth + 1, low, high, found);
        }
        if high[axis] >= point[axis] {
            self.search_box(mid + 1, hi, depth + 1, low, high, found);
        }
    }
}

/// Median partition: left of the midpoint holds keys <= the median's key, right >=
fn partition(points: &[[f64; 2]], order: &mut [usize], depth: usize) {
    if order.len() <= 1 {
        return;
    }
    let axis = depth % 2;
    let mid = order.len() / 2;
    order.select_nth_unstable_by(mid, |&a, &b| {
        points[a][axis]
            .total_cmp(&points[b][axis])
            .then(a.cmp(&b))
    });
    let (left, right) = order.split_at_mut(mid);
    partition(points, left, depth + 1);
    partition(points, &mut right[1..], depth + 1);
}
