//! # Plugin Ordering
//!
//! Resolves the declared "runs before" / "runs after" constraints of a set of named units
//! into one total order.
//!
//! Every `before` entry on unit `A` naming `B`, and every `after` entry on `B` naming `A`,
//! becomes the same edge `A → B`. The order is a Kahn topological sort in which, whenever
//! several units are ready, the one declared first is taken. Units without constraints
//! therefore keep their declaration order, and the result is identical across runs.
//!
//! Names referenced in constraints but never declared are ignored. A cycle fails the whole
//! resolution with [`OrderingError::Conflict`], naming the units on the cycle.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::{debug, warn};

/// Anything that can be placed in a resolved order.
pub trait Orderable {
    /// Unique name of the unit
    fn name(&self) -> &str;
    /// Names this unit must run before
    fn runs_before(&self) -> &[String];
    /// Names this unit must run after
    fn runs_after(&self) -> &[String];
}

/// Errors from ordering resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    /// The precedence constraints contain a cycle.
    #[error("plugin ordering conflict: cycle among {}", .units.join(" -> "))]
    Conflict {
        /// Units on the detected cycle, in edge order
        units: Vec<String>,
    },
    /// Two units share a name.
    #[error("plugin '{name}' is declared more than once")]
    Duplicate {
        /// The repeated name
        name: String,
    },
}

/// Resolve `units` into an order that honours every declared constraint.
///
/// # Errors
///
/// * [`OrderingError::Duplicate`] when two units share a name
/// * [`OrderingError::Conflict`] when the constraints are cyclic
pub fn resolve<T: Orderable>(units: Vec<T>) -> Result<Vec<T>, OrderingError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(units.len());
    for (idx, unit) in units.iter().enumerate() {
        if index.insert(unit.name(), idx).is_some() {
            return Err(OrderingError::Duplicate {
                name: unit.name().to_string(),
            });
        }
    }

    // successors[a] holds b for every edge a -> b; sets collapse edges declared twice
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); units.len()];
    for (idx, unit) in units.iter().enumerate() {
        for other in unit.runs_before() {
            match index.get(other.as_str()) {
                Some(&target) => {
                    successors[idx].insert(target);
                }
                None => debug!(unit = unit.name(), before = %other, "Ignoring constraint on undeclared unit"),
            }
        }
        for other in unit.runs_after() {
            match index.get(other.as_str()) {
                Some(&source) => {
                    successors[source].insert(idx);
                }
                None => debug!(unit = unit.name(), after = %other, "Ignoring constraint on undeclared unit"),
            }
        }
    }

    let mut in_degree = vec![0usize; units.len()];
    for targets in &successors {
        for &target in targets {
            in_degree[target] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(units.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &target in &successors[idx] {
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }

    if order.len() < units.len() {
        let cycle = find_cycle(&successors, &in_degree);
        let names: Vec<String> = cycle
            .into_iter()
            .map(|idx| units[idx].name().to_string())
            .collect();
        warn!(cycle = ?names, "Plugin ordering constraints are cyclic");
        return Err(OrderingError::Conflict { units: names });
    }

    let mut slots: Vec<Option<T>> = units.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

/// Extract one cycle from the units Kahn's algorithm could not place.
///
/// Every unplaced unit still has an unplaced predecessor, so walking predecessors from any
/// of them must revisit a unit; the revisited stretch is a cycle.
fn find_cycle(successors: &[BTreeSet<usize>], in_degree: &[usize]) -> Vec<usize> {
    let stuck = |idx: usize| in_degree[idx] > 0;
    let predecessor = |idx: usize| {
        (0..successors.len()).find(|&src| stuck(src) && successors[src].contains(&idx))
    };

    let Some(start) = (0..in_degree.len()).find(|&idx| stuck(idx)) else {
        return Vec::new();
    };

    let mut path = vec![start];
    let mut current = start;
    while let Some(prev) = predecessor(current) {
        if let Some(pos) = path.iter().position(|&seen| seen == prev) {
            // path runs against the edges; reverse the looped part into edge order
            let mut cycle: Vec<usize> = path[pos..].to_vec();
            cycle.reverse();
            return cycle;
        }
        path.push(prev);
        current = prev;
    }
    path
}
