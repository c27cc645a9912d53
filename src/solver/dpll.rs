use std::sync::atomic::{AtomicBool, Ordering};

use crate::formula::{Cnf, Literal, Model};

use super::heuristic::Brancher;
use super::store::{AssignmentKind, Conflict, Store};
use super::Solver;

/// Terminal state of one decide/propagate/backtrack search.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum SearchOutcome {
    Sat,
    Unsat,
    Cancelled,
}

/// The recursive DPLL loop shared by the sequential solver and each
/// portfolio worker. A worker passes its shared stop flag as `cancel`;
/// the flag is observed before every decision.
pub(crate) struct Search<'a> {
    pub store: &'a mut Store,
    pub brancher: &'a mut Brancher,
    pub cancel: Option<&'a AtomicBool>,
}

impl Search<'_> {
    pub fn run(&mut self) -> SearchOutcome {
        self.search()
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    fn search(&mut self) -> SearchOutcome {
        if self.cancelled() {
            return SearchOutcome::Cancelled;
        }

        if self.store.all_clauses_satisfied() {
            return SearchOutcome::Sat;
        }

        let variable = match self.brancher.select(self.store) {
            Some(variable) => variable,
            None => {
                // every variable assigned; nothing left to flip
                return if self.store.all_clauses_satisfied() {
                    SearchOutcome::Sat
                } else {
                    SearchOutcome::Unsat
                };
            }
        };

        let saved_level = self.store.level();

        self.store
            .assign(variable, Brancher::FIRST_POLARITY, AssignmentKind::Decision);
        match self.propagate_and_recurse() {
            SearchOutcome::Unsat => {}
            outcome => return outcome,
        }

        self.store.backtrack_to(saved_level);
        self.store
            .assign(variable, !Brancher::FIRST_POLARITY, AssignmentKind::Decision);
        self.propagate_and_recurse()
    }

    fn propagate_and_recurse(&mut self) -> SearchOutcome {
        match self.store.propagate() {
            Ok(()) => self.search(),
            Err(conflict) => {
                self.note_conflict(conflict);
                SearchOutcome::Unsat
            }
        }
    }

    fn note_conflict(&mut self, conflict: Conflict) {
        let literals = self
            .store
            .clause_literals(conflict.clause)
            .collect::<Vec<Literal>>();
        trace!("conflict in clause {:?}", conflict.clause);
        self.brancher.on_conflict(&literals);
    }
}

/// Sequential DPLL solver: two-watched-literal unit propagation,
/// level-0 pure-literal elimination, and MOM/VSIDS branching over a
/// trail-based store.
pub struct DpllSolver {
    formula: Cnf,
    store: Store,
    brancher: Brancher,
}

impl Solver for DpllSolver {
    fn new(formula: Cnf) -> Self {
        let store = Store::from_cnf(&formula);
        let brancher = Brancher::new(store.num_variables());

        DpllSolver {
            formula,
            store,
            brancher,
        }
    }

    fn solve(mut self) -> Option<Model> {
        if self.formula.empty_clause_count() > 0 {
            return None;
        }

        if self.store.apply_unit_facts().is_err() || self.store.propagate().is_err() {
            debug!("top-level unit facts are contradictory");
            return None;
        }

        if self.store.pure_literal_elimination().is_err() {
            debug!("pure-literal cascade hit a conflict");
            return None;
        }

        let outcome = Search {
            store: &mut self.store,
            brancher: &mut self.brancher,
            cancel: None,
        }
        .run();

        match outcome {
            SearchOutcome::Sat => Some(Model::new(self.formula, self.store.total_assignment())),
            SearchOutcome::Unsat => None,
            SearchOutcome::Cancelled => unreachable!("sequential search has no cancel flag"),
        }
    }
}
