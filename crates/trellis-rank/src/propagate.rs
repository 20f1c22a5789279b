use std::collections::BTreeMap;

use trellis_core::ProductId;

use crate::WeightedEdge;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropagationConfig {
    pub damping: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            damping: 0.9,
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Personalized weighted importance propagation. Restart priors are
/// `1 + (out_degree + in_degree) / 5.0` normalized to sum to 1, dangling
/// mass follows the same priors, and the result is max-normalized so the
/// top node scores exactly 1.0. An empty edge set yields an empty map;
/// hitting the iteration cap only logs a warning.
pub fn propagate(
    edges: &[WeightedEdge],
    config: PropagationConfig,
) -> BTreeMap<ProductId, f64> {
    if edges.is_empty() {
        return BTreeMap::new();
    }

    // Deterministic node indexing in edge-list order.
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges {
        let next = index.len();
        index.entry(edge.source.as_str()).or_insert(next);
        let next = index.len();
        index.entry(edge.target.as_str()).or_insert(next);
    }
    let ids: Vec<&str> = {
        let mut ids = vec![""; index.len()];
        for (id, &i) in &index {
            ids[i] = id;
        }
        ids
    };
    let n = ids.len();

    let mut adjacency: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    let mut out_weight_sum = vec![0.0f64; n];
    let mut out_degree = vec![0u32; n];
    let mut in_degree = vec![0u32; n];

    for edge in edges {
        let u = index[edge.source.as_str()];
        let v = index[edge.target.as_str()];
        adjacency[u].push((v, edge.weight));
        out_weight_sum[u] += edge.weight;
        out_degree[u] += 1;
        in_degree[v] += 1;
    }

    // Restart priors from connectivity, normalized to sum to 1.
    let mut priors: Vec<f64> = (0..n)
        .map(|i| 1.0 + f64::from(out_degree[i] + in_degree[i]) / 5.0)
        .collect();
    let prior_sum: f64 = priors.iter().sum();
    for prior in &mut priors {
        *prior /= prior_sum;
    }

    let n_f64 = n as f64;
    let mut scores = vec![1.0 / n_f64; n];
    let mut new_scores = vec![0.0f64; n];
    let mut converged = false;

    for _ in 0..config.max_iterations {
        let dangling_sum: f64 = out_weight_sum
            .iter()
            .enumerate()
            .filter(|(_, &ws)| ws == 0.0)
            .map(|(i, _)| scores[i])
            .sum();

        for (i, slot) in new_scores.iter_mut().enumerate() {
            *slot = (1.0 - config.damping + config.damping * dangling_sum) * priors[i];
        }

        for u in 0..n {
            let ws = out_weight_sum[u];
            if ws > 0.0 {
                let share = config.damping * scores[u] / ws;
                for &(v, w) in &adjacency[u] {
                    new_scores[v] += share * w;
                }
            }
        }

        let diff: f64 = scores
            .iter()
            .zip(new_scores.iter())
            .map(|(old, new)| (old - new).abs())
            .sum();
        std::mem::swap(&mut scores, &mut new_scores);

        if diff < config.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        tracing::warn!(
            max_iterations = config.max_iterations,
            "propagation hit the iteration cap without converging; returning best-effort scores"
        );
    }

    let max_score = scores.iter().cloned().fold(f64::MIN, f64::max);
    ids.iter()
        .zip(scores.iter())
        .map(|(id, score)| ((*id).to_owned(), score / max_score))
        .collect()
}
