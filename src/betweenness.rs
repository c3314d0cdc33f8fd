//! A module for performing the multi-threaded computation of betweenness

use std::{
    collections::VecDeque,
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use crate::graph::{GraphIndex, MAX_NUM_THREADS, MIN_NUM_THREADS};

/// this is an implementation of Ulrik Brandes's
/// A Faster Algorithm for Betweenness Centrality
/// http://snap.stanford.edu/class/cs224w-readings/brandes01centrality.pdf
/// page 10, "Algorithm 1: Betweenness centrality in unweighted graphs"
///
/// Paths follow the direction of the edges in `indices`.
fn betweenness_for_node(index: usize, indices: &[Vec<GraphIndex>], betweenness_count: &mut [f64]) {
    let num_nodes = indices.len();

    let mut sigma: Vec<f64> = vec![0.0; num_nodes];
    let mut distance: Vec<Option<usize>> = vec![None; num_nodes];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
    let mut delta: Vec<f64> = vec![0.0; num_nodes];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut stack: Vec<usize> = Vec::new();

    sigma[index] = 1.0;
    distance[index] = Some(0);
    queue.push_back(index);

    while let Some(v) = queue.pop_front() {
        stack.push(v);
        let next = distance[v].map(|d| d + 1);

        for &w in &indices[v] {
            if distance[w].is_none() {
                distance[w] = next;
                queue.push_back(w);
            }
            if distance[w] == next {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    while let Some(w) = stack.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != index {
            betweenness_count[w] += delta[w];
        }
    }
}

/// This function is the thread task, grabbing the
/// next unprocessed node.  If no more nodes, we exit,
/// returning betweenness values.
fn betweenness_task(counter: Arc<AtomicUsize>, indices: Arc<Vec<Vec<GraphIndex>>>) -> Vec<f64> {
    let num_nodes = indices.len();

    // each worker thread keeps its own cache of data
    // these are returned when the thread finishes
    // and then summed by the caller
    let mut betweenness_count: Vec<f64> = vec![0.0; num_nodes];

    loop {
        let index = counter.fetch_add(1, Ordering::Relaxed);
        if index >= num_nodes {
            break;
        }

        betweenness_for_node(index, &indices, &mut betweenness_count);
    }

    betweenness_count
}

/// Computes the betweenness of every node of a directed graph given as outgoing neighbour lists,
/// spreading the source nodes over `num_threads` workers.
///
/// Normalized scores are divided by `(n - 1)(n - 2)`, the number of ordered pairs a node can lie
/// between; graphs with fewer than three nodes are left unscaled.
pub fn compute_betweenness(
    indices: Vec<Vec<GraphIndex>>,
    num_threads: usize,
    normalize: bool,
) -> Vec<f64> {
    let num_threads = num_threads.clamp(MIN_NUM_THREADS, MAX_NUM_THREADS);
    let num_nodes = indices.len();

    let mut betweenness_count: Vec<f64> = vec![0.0; num_nodes];

    let mut handles = Vec::with_capacity(num_threads);
    let wrapped_indices = Arc::new(indices);
    let wrapped_counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..num_threads {
        let counter = Arc::clone(&wrapped_counter);
        let indices = Arc::clone(&wrapped_indices);
        let handle = thread::spawn(move || betweenness_task(counter, indices));
        handles.push(handle);
    }

    let divisor: f64 = if normalize && num_nodes > 2 {
        ((num_nodes - 1) * (num_nodes - 2)) as f64
    } else {
        1.0
    };

    for h in handles {
        let b = match h.join() {
            Ok(b) => b,
            Err(payload) => panic::resume_unwind(payload),
        };
        for (total, partial) in betweenness_count.iter_mut().zip(b) {
            *total += partial / divisor;
        }
    }

    betweenness_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain() {
        // 0 -> 1 -> 2 -> 3
        let indices = vec![vec![1], vec![2], vec![3], vec![]];

        assert_eq!(
            compute_betweenness(indices.clone(), 2, false),
            vec![0.0, 2.0, 2.0, 0.0]
        );
        assert_eq!(
            compute_betweenness(indices, 2, true),
            vec![0.0, 2.0 / 6.0, 2.0 / 6.0, 0.0]
        );
    }

    #[test]
    fn split_paths() {
        // Two shortest paths from 0 to 3, each intermediate node carries half.
        let indices = vec![vec![1, 2], vec![3], vec![3], vec![]];

        assert_eq!(
            compute_betweenness(indices, 1, false),
            vec![0.0, 0.5, 0.5, 0.0]
        );
    }

    #[test]
    fn direction_matters() {
        // 0 -> 1 <- 2, nothing passes through 1.
        let indices = vec![vec![1], vec![], vec![1]];

        assert_eq!(compute_betweenness(indices, 4, true), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn empty() {
        assert!(compute_betweenness(vec![], 3, true).is_empty());
    }
}
