/*!
Two-worker parallel portfolio: both workers run the sequential search on
their own copy of the store, seeded with complementary polarities of a
shared split variable, and race to publish a solution.
*/

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use crate::formula::{Cnf, Model, Variable};

use super::dpll::{Search, SearchOutcome};
use super::heuristic::Brancher;
use super::store::{AssignmentKind, Store};
use super::Solver;

/// State shared between the two workers and the parent. The stores
/// themselves are never shared; each worker owns its copy.
struct SharedResult {
    /// Set once by the first worker to finish with SAT; doubles as the
    /// cooperative cancellation flag for the other worker.
    solution_found: AtomicBool,
    /// Set by the winner after the assignment snapshot is in place.
    result_ready: AtomicBool,
    /// Total assignment published by the winning worker.
    assignment: Mutex<Option<Vec<bool>>>,
}

/// Picks the unassigned variable whose remaining occurrences are both
/// plentiful and balanced across polarities, so that the two subproblems
/// carry comparable weight: maximize `total · (1 − |pos−neg|/total)`.
fn split_variable(store: &Store) -> Option<Variable> {
    let (positive, negative) = store.polarity_counts();
    let mut best: Option<(Variable, f64)> = None;

    for (index, assigned) in store.assignment().iter().enumerate() {
        if assigned.is_some() {
            continue;
        }
        let total = positive[index] + negative[index];
        if total == 0 {
            continue;
        }

        let spread = (positive[index] as f64 - negative[index] as f64).abs();
        let score = total as f64 * (1.0 - spread / total as f64);
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((Variable::from_index(index).unwrap(), score)),
        }
    }

    best.map(|(variable, _)| variable)
}

fn run_worker(
    mut store: Store,
    mut brancher: Brancher,
    split: Variable,
    polarity: bool,
    shared: &SharedResult,
) -> SearchOutcome {
    debug!("worker starts with {} := {}", split, polarity);
    store.assign(split, polarity, AssignmentKind::Decision);

    let outcome = match store.propagate() {
        Ok(()) => Search {
            store: &mut store,
            brancher: &mut brancher,
            cancel: Some(&shared.solution_found),
        }
        .run(),
        Err(_) => SearchOutcome::Unsat,
    };

    if outcome == SearchOutcome::Sat {
        // first-to-finish wins; the loser discards its result
        if shared
            .solution_found
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *shared.assignment.lock().expect("result slot poisoned") =
                Some(store.total_assignment());
            shared.result_ready.store(true, Ordering::Release);
            debug!("worker for {} := {} publishes a solution", split, polarity);
            return SearchOutcome::Sat;
        }
        return SearchOutcome::Cancelled;
    }

    debug!("worker for {} := {} finishes: {:?}", split, polarity, outcome);
    outcome
}

/// Parallel portfolio solver racing two DPLL workers on the two
/// polarities of a balance-chosen first decision variable.
pub struct PortfolioSolver {
    formula: Cnf,
    store: Store,
    brancher: Brancher,
}

impl Solver for PortfolioSolver {
    fn new(formula: Cnf) -> Self {
        let store = Store::from_cnf(&formula);
        let brancher = Brancher::new(store.num_variables());

        PortfolioSolver {
            formula,
            store,
            brancher,
        }
    }

    fn solve(mut self) -> Option<Model> {
        if self.formula.empty_clause_count() > 0 {
            return None;
        }

        // level-0 preprocessing on the master store, before any fork
        if self.store.apply_unit_facts().is_err() || self.store.propagate().is_err() {
            return None;
        }
        if self.store.pure_literal_elimination().is_err() {
            return None;
        }

        if self.store.all_clauses_satisfied() {
            return Some(Model::new(self.formula, self.store.total_assignment()));
        }

        let split = match split_variable(&self.store) {
            Some(variable) => variable,
            None => {
                // no occurrence-bearing variable left to split on; finish
                // the remainder sequentially on the master store
                let outcome = Search {
                    store: &mut self.store,
                    brancher: &mut self.brancher,
                    cancel: None,
                }
                .run();
                return match outcome {
                    SearchOutcome::Sat => {
                        Some(Model::new(self.formula, self.store.total_assignment()))
                    }
                    _ => None,
                };
            }
        };
        debug!("portfolio splits on {}", split);

        let shared = Arc::new(SharedResult {
            solution_found: AtomicBool::new(false),
            result_ready: AtomicBool::new(false),
            assignment: Mutex::new(None),
        });

        let mut workers = Vec::with_capacity(2);
        for &polarity in &[true, false] {
            let store = self.store.clone();
            let brancher = self.brancher.clone();
            let shared = Arc::clone(&shared);

            workers.push(thread::spawn(move || {
                run_worker(store, brancher, split, polarity, &shared)
            }));
        }

        // join both workers before touching the result; the winner's
        // publication happens-before these joins
        let outcomes = workers
            .into_iter()
            .map(|worker| worker.join().expect("portfolio worker panicked"))
            .collect::<Vec<_>>();

        if shared.result_ready.load(Ordering::Acquire) {
            let assignment = shared
                .assignment
                .lock()
                .expect("result slot poisoned")
                .take()
                .expect("result flagged ready but slot is empty");
            return Some(Model::new(self.formula, assignment));
        }

        debug_assert!(outcomes
            .iter()
            .all(|&outcome| outcome == SearchOutcome::Unsat));
        None
    }
}
