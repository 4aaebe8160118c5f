//! HDBSCAN over a precomputed dissimilarity matrix.
//!
//! # Overview
//!
//! 1. **Core distances**: for each point, the distance to its `min_samples`-th
//!    nearest other point.
//! 2. **Mutual reachability**: `max(d(a, b), core(a), core(b))`.
//! 3. **Minimum spanning tree** of the mutual reachability graph (dense Prim),
//!    turned into a single-linkage hierarchy.
//! 4. **Condensed tree**: walking the hierarchy top-down, a split in which both
//!    sides have at least `min_cluster_size` points creates two new clusters;
//!    otherwise the smaller side's points "fall out" of the parent cluster.
//!    Heights are expressed as `λ = 1 / distance`.
//! 5. **Excess of mass**: a cluster is selected when its stability
//!    `Σ (λ_fall - λ_birth) · size` is at least the total stability of its
//!    selected descendants.
//! 6. **Labels and probabilities**: each point belongs to the selected cluster
//!    it (transitively) fell out of, with membership `λ_point / λ_max` of that
//!    cluster; everything else is noise (`-1`, probability 0).
//!
//! Every step is deterministic: ties are broken by the lowest index.

use std::collections::VecDeque;

use crate::dissimilarity::DissimilarityMatrix;

/// Distances are floored at this value before inverting into `λ`.
pub const MIN_DISTANCE: f64 = 1e-9;

/// Label assigned to points outside every cluster.
pub const NOISE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdbscanParams {
    /// Smallest group of points that counts as a cluster.
    pub min_cluster_size: usize,
    /// Neighbourhood size used for core distances.
    pub min_samples: usize,
    /// Whether the root (all points) may be selected as the only cluster.
    pub allow_single_cluster: bool,
}

/// Cluster assignment for every point of the input matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Cluster label per point, numbered from 0, or [`NOISE`].
    pub labels: Vec<i32>,
    /// Soft membership in `[0, 1]` per point; 0 for noise.
    pub probabilities: Vec<f64>,
}

impl Clustering {
    fn all_noise(n: usize) -> Self {
        Self {
            labels: vec![NOISE; n],
            probabilities: vec![0.0; n],
        }
    }

    /// Number of distinct non-noise labels.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.labels
            .iter()
            .copied()
            .max()
            .map_or(0, |max| usize::try_from(max + 1).unwrap_or(0))
    }

    /// Indices of the points carrying `label`, in ascending order.
    #[must_use]
    pub fn members(&self, label: i32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| (l == label).then_some(i))
            .collect()
    }
}

/// Runs HDBSCAN over a precomputed dissimilarity matrix.
///
/// Inputs with fewer than two points are reported as all noise.
#[must_use]
pub fn hdbscan(matrix: &DissimilarityMatrix, params: &HdbscanParams) -> Clustering {
    let n = matrix.len();
    if n < 2 {
        return Clustering::all_noise(n);
    }
    let min_cluster_size = params.min_cluster_size.max(2);

    let core = core_distances(matrix, params.min_samples);
    let mst = minimum_spanning_tree(matrix, &core);
    let hierarchy = single_linkage(n, &mst);
    let tree = CondensedTree::new(n, &hierarchy, min_cluster_size);
    let selected = tree.select_clusters(params.allow_single_cluster);
    tree.assign(&selected, params.allow_single_cluster)
}

fn core_distances(matrix: &DissimilarityMatrix, min_samples: usize) -> Vec<f64> {
    let n = matrix.len();
    let k = min_samples.clamp(1, n - 1);
    (0..n)
        .map(|i| {
            let mut others = matrix
                .row(i)
                .iter()
                .enumerate()
                .filter_map(|(j, &d)| (j != i).then_some(d))
                .collect::<Vec<_>>();
            others.sort_by(f64::total_cmp);
            others[k - 1]
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    a: usize,
    b: usize,
    weight: f64,
}

/// Dense Prim's algorithm over mutual reachability distances.
///
/// Returned edges are sorted by weight; equal weights keep insertion order.
fn minimum_spanning_tree(matrix: &DissimilarityMatrix, core: &[f64]) -> Vec<Edge> {
    let n = matrix.len();
    let reach = |a: usize, b: usize| matrix.get(a, b).max(core[a]).max(core[b]);

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut parent = vec![0; n];
    let mut edges = Vec::with_capacity(n - 1);

    let mut current = 0;
    in_tree[current] = true;
    for _ in 1..n {
        let mut next = None;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d = reach(current, j);
            if d < best[j] {
                best[j] = d;
                parent[j] = current;
            }
            if next.is_none_or(|k: usize| best[j] < best[k]) {
                next = Some(j);
            }
        }
        let Some(j) = next else { break };
        in_tree[j] = true;
        edges.push(Edge {
            a: parent[j],
            b: j,
            weight: best[j],
        });
        current = j;
    }

    edges.sort_by(|x, y| x.weight.total_cmp(&y.weight));
    edges
}

/// A merge in the single-linkage dendrogram.
///
/// Node ids below `n` are points; merge `k` creates node `n + k`.
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

fn find_root(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn single_linkage(n: usize, mst: &[Edge]) -> Vec<Merge> {
    let mut parent = (0..2 * n - 1).collect::<Vec<_>>();
    let mut size = vec![1; 2 * n - 1];
    let mut merges = Vec::with_capacity(n - 1);

    for (k, edge) in mst.iter().enumerate() {
        let left = find_root(&mut parent, edge.a);
        let right = find_root(&mut parent, edge.b);
        let node = n + k;
        parent[left] = node;
        parent[right] = node;
        size[node] = size[left] + size[right];
        merges.push(Merge {
            left,
            right,
            distance: edge.weight,
            size: size[node],
        });
    }
    merges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Cluster(usize),
    Point(usize),
}

#[derive(Debug, Clone, Copy)]
struct CondensedEntry {
    parent: usize,
    child: Child,
    lambda: f64,
    size: usize,
}

/// Cluster hierarchy after discarding splits smaller than `min_cluster_size`.
///
/// Cluster ids are assigned top-down; the root is cluster 0 and every child
/// has a larger id than its parent.
#[derive(Debug)]
struct CondensedTree {
    n_points: usize,
    n_clusters: usize,
    entries: Vec<CondensedEntry>,
}

impl CondensedTree {
    fn new(n: usize, hierarchy: &[Merge], min_cluster_size: usize) -> Self {
        let root = 2 * n - 2;
        let node_size = |node: usize| {
            if node < n {
                1
            } else {
                hierarchy[node - n].size
            }
        };
        let descendants = |node: usize| {
            let mut points = vec![];
            let mut queue = VecDeque::from([node]);
            while let Some(x) = queue.pop_front() {
                if x < n {
                    points.push(x);
                } else {
                    let merge = hierarchy[x - n];
                    queue.push_back(merge.left);
                    queue.push_back(merge.right);
                }
            }
            points
        };

        let mut relabel = vec![0; 2 * n - 1];
        let mut ignore = vec![false; 2 * n - 1];
        let mut next_label = 1;
        let mut entries = vec![];

        let mut queue = VecDeque::from([root]);
        while let Some(node) = queue.pop_front() {
            if node < n || ignore[node] {
                continue;
            }
            let merge = hierarchy[node - n];
            queue.push_back(merge.left);
            queue.push_back(merge.right);

            let parent = relabel[node];
            let lambda = 1.0 / merge.distance.max(MIN_DISTANCE);
            let left_size = node_size(merge.left);
            let right_size = node_size(merge.right);
            let left_big = left_size >= min_cluster_size;
            let right_big = right_size >= min_cluster_size;

            let mut fall_out = |side: usize, entries: &mut Vec<CondensedEntry>| {
                for point in descendants(side) {
                    entries.push(CondensedEntry {
                        parent,
                        child: Child::Point(point),
                        lambda,
                        size: 1,
                    });
                }
                ignore[side] = true;
            };

            match (left_big, right_big) {
                (true, true) => {
                    for (side, size) in [(merge.left, left_size), (merge.right, right_size)] {
                        relabel[side] = next_label;
                        entries.push(CondensedEntry {
                            parent,
                            child: Child::Cluster(next_label),
                            lambda,
                            size,
                        });
                        next_label += 1;
                    }
                }
                (false, false) => {
                    fall_out(merge.left, &mut entries);
                    fall_out(merge.right, &mut entries);
                }
                (false, true) => {
                    fall_out(merge.left, &mut entries);
                    relabel[merge.right] = parent;
                }
                (true, false) => {
                    fall_out(merge.right, &mut entries);
                    relabel[merge.left] = parent;
                }
            }
        }

        Self {
            n_points: n,
            n_clusters: next_label,
            entries,
        }
    }

    /// Parent of each cluster; `None` for the root.
    fn cluster_parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.n_clusters];
        for entry in &self.entries {
            if let Child::Cluster(child) = entry.child {
                parents[child] = Some(entry.parent);
            }
        }
        parents
    }

    #[expect(clippy::cast_precision_loss)]
    fn stabilities(&self) -> Vec<f64> {
        let mut births = vec![0.0; self.n_clusters];
        for entry in &self.entries {
            if let Child::Cluster(child) = entry.child {
                births[child] = entry.lambda;
            }
        }
        let mut stability = vec![0.0; self.n_clusters];
        for entry in &self.entries {
            stability[entry.parent] += (entry.lambda - births[entry.parent]) * entry.size as f64;
        }
        stability
    }

    /// Excess-of-mass selection, leaves first.
    fn select_clusters(&self, allow_single_cluster: bool) -> Vec<bool> {
        let parents = self.cluster_parents();
        let mut children = vec![vec![]; self.n_clusters];
        for (child, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                children[*parent].push(child);
            }
        }

        let mut stability = self.stabilities();
        let mut selected = vec![false; self.n_clusters];
        let lowest = usize::from(!allow_single_cluster);
        for cluster in (lowest..self.n_clusters).rev() {
            let subtree = children[cluster]
                .iter()
                .map(|&child| stability[child])
                .sum::<f64>();
            if !children[cluster].is_empty() && subtree > stability[cluster] {
                stability[cluster] = subtree;
            } else {
                selected[cluster] = true;
                let mut queue = VecDeque::from(children[cluster].clone());
                while let Some(descendant) = queue.pop_front() {
                    selected[descendant] = false;
                    queue.extend(children[descendant].iter().copied());
                }
            }
        }
        selected
    }

    fn assign(&self, selected: &[bool], allow_single_cluster: bool) -> Clustering {
        let parents = self.cluster_parents();
        let mut label_of = vec![NOISE; self.n_clusters];
        let mut next = 0;
        for (cluster, &is_selected) in selected.iter().enumerate() {
            if is_selected && (cluster != 0 || allow_single_cluster) {
                label_of[cluster] = next;
                next += 1;
            }
        }

        let mut max_lambda = vec![0.0_f64; self.n_clusters];
        for entry in &self.entries {
            max_lambda[entry.parent] = max_lambda[entry.parent].max(entry.lambda);
        }

        let mut result = Clustering::all_noise(self.n_points);
        for entry in &self.entries {
            let Child::Point(point) = entry.child else {
                continue;
            };
            let mut cluster = Some(entry.parent);
            while let Some(c) = cluster {
                if label_of[c] != NOISE {
                    break;
                }
                cluster = parents[c];
            }
            let Some(cluster) = cluster else { continue };

            result.labels[point] = label_of[cluster];
            let death = max_lambda[cluster];
            result.probabilities[point] = if death > 0.0 && death.is_finite() {
                entry.lambda.min(death) / death
            } else {
                1.0
            };
        }
        result
    }
}
