//! Dependency graph checks

use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::models::Dependency;

/// Whether adding `candidate` to `edges` would close a cycle.
///
/// An edge `a -> b` reads "a depends on b", so the candidate closes a cycle
/// exactly when `candidate.to_task` already reaches `candidate.from_task`.
/// A self-loop is the trivial cycle.
pub fn creates_cycle(edges: &[Dependency], candidate: Dependency) -> bool {
    if candidate.from_task == candidate.to_task {
        return true;
    }

    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for edge in edges {
        adjacency.entry(edge.from_task).or_default().push(edge.to_task);
    }

    let mut seen = HashSet::from([candidate.to_task]);
    let mut queue = VecDeque::from([candidate.to_task]);

    while let Some(task) = queue.pop_front() {
        let Some(next) = adjacency.get(&task) else {
            continue;
        };
        for &dependency in next {
            if dependency == candidate.from_task {
                return true;
            }
            if seen.insert(dependency) {
                queue.push_back(dependency);
            }
        }
    }

    false
}
