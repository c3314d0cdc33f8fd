//! A module for performing the multi-threaded computation of closeness

use std::{
    collections::VecDeque,
    panic,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
};

use tracing::debug;

use crate::graph::{GraphIndex, MAX_NUM_THREADS, MIN_NUM_THREADS};

/// Breadth-first search from `index`, returning how many nodes were reached (itself included)
/// and the sum of their distances.
fn closeness_for_node(index: usize, indices: &[Vec<GraphIndex>]) -> (usize, usize) {
    let num_nodes = indices.len();

    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut deltas: Vec<Option<usize>> = vec![None; num_nodes];
    let mut reached = 1;
    let mut total_path_length = 0;

    deltas[index] = Some(0);
    queue.push_back(index);

    while let Some(current) = queue.pop_front() {
        let next = deltas[current].map_or(0, |d| d + 1);
        for &j in &indices[current] {
            if deltas[j].is_none() {
                deltas[j] = Some(next);
                queue.push_back(j);
                reached += 1;
                total_path_length += next;
            }
        }
    }

    (reached, total_path_length)
}

/// this function is the thread task
/// grabs next unprocessed node
/// if no more nodes, exits
/// returning the reach and total path length of each node it processed
fn closeness_task(
    counter: Arc<AtomicUsize>,
    indices: Arc<Vec<Vec<GraphIndex>>>,
) -> Vec<(usize, usize, usize)> {
    let num_nodes = indices.len();
    let mut results = Vec::new();

    loop {
        let index = counter.fetch_add(1, Ordering::Relaxed);
        if index >= num_nodes {
            break;
        }

        let (reached, total) = closeness_for_node(index, &indices);
        results.push((index, reached, total));
    }

    results
}

/// Computes the closeness of every node, with distances measured along `indices`.
///
/// Passing incoming neighbour lists scores each node by how close the rest of the graph is to
/// it. Nodes that only part of the graph can reach are scaled by that fraction
/// (Wasserman-Faust), nodes nothing reaches score 0.
pub fn compute_closeness(indices: Vec<Vec<GraphIndex>>, num_threads: usize) -> Vec<f64> {
    let num_threads = num_threads.clamp(MIN_NUM_THREADS, MAX_NUM_THREADS);
    debug!(num_threads, "computing closeness");

    let num_nodes = indices.len();
    let mut closeness: Vec<f64> = vec![0.0; num_nodes];

    let mut handles = Vec::with_capacity(num_threads);
    let wrapped_indices = Arc::new(indices);
    let wrapped_counter = Arc::new(AtomicUsize::new(0));

    for _ in 0..num_threads {
        let counter = Arc::clone(&wrapped_counter);
        let indices = Arc::clone(&wrapped_indices);
        let handle = thread::spawn(move || closeness_task(counter, indices));
        handles.push(handle);
    }

    for h in handles {
        let results = match h.join() {
            Ok(results) => results,
            Err(payload) => panic::resume_unwind(payload),
        };

        for (index, reached, total) in results {
            if total == 0 || num_nodes < 2 {
                continue;
            }

            let others = (reached - 1) as f64;
            closeness[index] = (others / total as f64) * (others / (num_nodes - 1) as f64);
        }
    }

    closeness
}
