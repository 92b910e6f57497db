//! Sampling order of stream plans.

use streamplan_core::ResultId;
use streamplan_stream::{StreamResult, StreamSession};

/// Pairs `(i, j)` such that `results[j]` depends on `results[i]`.
pub fn partial_orders(results: &[&StreamResult]) -> Vec<(usize, usize)> {
    let mut orders = Vec::new();
    for (i, before) in results.iter().enumerate() {
        for (j, after) in results.iter().enumerate() {
            if i != j && after.depends_on(before) {
                orders.push((i, j));
            }
        }
    }
    orders
}

/// Topologically sort a stream plan, choosing the cheapest ready result
/// first and falling back to plan order on ties.
pub fn reorder_stream_plan(session: &StreamSession, plan: &[ResultId]) -> Vec<ResultId> {
    let results: Vec<&StreamResult> = plan.iter().map(|&id| session.result(id)).collect();
    let orders = partial_orders(&results);
    let mut placed = vec![false; results.len()];
    let mut ordered = Vec::with_capacity(results.len());

    while ordered.len() < results.len() {
        let next = (0..results.len())
            .filter(|&j| !placed[j])
            .filter(|&j| orders.iter().all(|&(i, k)| k != j || placed[i]))
            .min_by(|&a, &b| {
                results[a]
                    .effort
                    .total_cmp(&results[b].effort)
                    .then(a.cmp(&b))
            });
        // A cycle leaves nothing ready; keep the remaining results in plan order.
        let Some(j) = next.or_else(|| (0..results.len()).find(|&j| !placed[j])) else {
            break;
        };
        placed[j] = true;
        ordered.push(plan[j]);
    }
    ordered
}
