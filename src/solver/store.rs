/*!
Formula store: the compact clause database together with the mutable
search state (assignment, trail, watches, satisfaction marks) and the
two-watched-literal propagation over it.
*/

use std::{
    collections::VecDeque,
    ops::{Index, IndexMut},
};

use typed_index_collections::TiVec;

use crate::formula::{Cnf, Literal, Variable};

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ClauseIdx(usize);

impl From<usize> for ClauseIdx {
    fn from(index: usize) -> Self {
        ClauseIdx(index)
    }
}

impl From<ClauseIdx> for usize {
    fn from(index: ClauseIdx) -> Self {
        index.0
    }
}

/// How an assignment entered the trail.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssignmentKind {
    Decision,
    Propagated,
}

#[derive(Clone, Copy, Debug)]
struct TrailEntry {
    variable: Variable,
    level: usize,
    kind: AssignmentKind,
}

/// A fully falsified clause found during propagation. Consumed by the
/// search loop; never surfaces past the solver.
#[derive(Clone, Copy, Debug)]
pub struct Conflict {
    pub clause: ClauseIdx,
}

/// One clause of the immutable database plus its two watch slots.
/// `watched` holds positions into `literals`; a unit clause watches its
/// sole literal in both slots.
#[derive(Clone, Debug)]
struct StoredClause {
    literals: Vec<Literal>,
    watched: [usize; 2],
}

/// Maps each literal to the clauses currently watching it.
#[derive(Clone, Debug)]
struct Watch {
    positive: Vec<Vec<ClauseIdx>>,
    negative: Vec<Vec<ClauseIdx>>,
}

impl Watch {
    fn new(num_variables: usize) -> Self {
        Watch {
            positive: vec![Vec::new(); num_variables],
            negative: vec![Vec::new(); num_variables],
        }
    }
}

impl Index<Literal> for Watch {
    type Output = Vec<ClauseIdx>;

    fn index(&self, literal: Literal) -> &Self::Output {
        if literal.positive() {
            &self.positive[literal.index()]
        } else {
            &self.negative[literal.index()]
        }
    }
}

impl IndexMut<Literal> for Watch {
    fn index_mut(&mut self, literal: Literal) -> &mut Self::Output {
        if literal.positive() {
            &mut self.positive[literal.index()]
        } else {
            &mut self.negative[literal.index()]
        }
    }
}

/// Reaction of a single watched clause to a falsified watch.
enum Reaction {
    /// The clause stays on the processed watch list.
    Keep,
    /// The clause moved to another literal's watch list.
    Migrated,
    /// The clause is fully falsified.
    Conflict,
}

/// Search state over an immutable clause database.
///
/// Cloning a store yields a fully independent copy; the parallel portfolio
/// relies on this for its one-copy-per-worker discipline.
#[derive(Clone, Debug)]
pub struct Store {
    num_variables: usize,
    clauses: TiVec<ClauseIdx, StoredClause>,
    /// Variable index -> assigned status
    assignment: Vec<Option<bool>>,
    trail: Vec<TrailEntry>,
    /// Clause index -> decision level at which the clause was seen satisfied
    satisfied_at: TiVec<ClauseIdx, Option<usize>>,
    satisfied_count: usize,
    watch: Watch,
    level: usize,
    /// FIFO of literals that were just assigned false
    queue: VecDeque<Literal>,
}

impl Store {
    pub fn from_cnf(formula: &Cnf) -> Self {
        let num_variables = formula.num_variables();

        let mut store = Store {
            num_variables,
            clauses: TiVec::new(),
            assignment: vec![None; num_variables],
            trail: Vec::with_capacity(num_variables),
            satisfied_at: TiVec::new(),
            satisfied_count: 0,
            watch: Watch::new(num_variables),
            level: 0,
            queue: VecDeque::new(),
        };

        for clause in formula.clauses() {
            let literals = clause.iter().collect::<Vec<_>>();
            let idx = store.clauses.next_key();

            let watched = if literals.len() >= 2 { [0, 1] } else { [0, 0] };
            store.watch[literals[watched[0]]].push(idx);
            if literals.len() >= 2 {
                store.watch[literals[watched[1]]].push(idx);
            }

            store.satisfied_at.push(None);
            store.clauses.push(StoredClause { literals, watched });

            if clause.is_tautology() {
                store.mark_satisfied(idx);
            }
        }

        store
    }

    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// Get a reference to the store's assignments.
    pub fn assignment(&self) -> &[Option<bool>] {
        self.assignment.as_slice()
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Number of trail entries recorded as decisions; always equals the
    /// decision level.
    pub fn num_decisions(&self) -> usize {
        self.trail
            .iter()
            .filter(|entry| entry.kind == AssignmentKind::Decision)
            .count()
    }

    /// The current truth value of a literal, `None` while its variable is
    /// unassigned.
    pub fn value(&self, literal: Literal) -> Option<bool> {
        literal.partial_value(&self.assignment)
    }

    pub fn is_clause_satisfied(&self, idx: ClauseIdx) -> bool {
        self.satisfied_at[idx].is_some()
    }

    pub fn clause_literals(&self, idx: ClauseIdx) -> impl Iterator<Item = Literal> + '_ {
        self.clauses[idx].literals.iter().copied()
    }

    /// Totalizes the current assignment, defaulting unconstrained
    /// variables to `true`.
    pub fn total_assignment(&self) -> Vec<bool> {
        self.assignment
            .iter()
            .map(|assigned| assigned.unwrap_or(true))
            .collect()
    }

    /// Assigns a value to an unassigned variable, records it on the trail,
    /// and enqueues the falsified literal for propagation. A `Decision`
    /// opens a new decision level.
    ///
    /// # Panics
    ///
    /// Panics when the variable is already assigned; that is a solver bug,
    /// not a recoverable condition.
    pub fn assign(&mut self, variable: Variable, value: bool, kind: AssignmentKind) {
        let slot = &mut self.assignment[variable.index()];
        assert!(
            slot.is_none(),
            "assign on already-assigned variable {}",
            variable
        );
        *slot = Some(value);

        if kind == AssignmentKind::Decision {
            self.level += 1;
        }
        trace!("assign {} := {} ({:?}, level {})", variable, value, kind, self.level);

        self.trail.push(TrailEntry {
            variable,
            level: self.level,
            kind,
        });
        self.queue.push_back(Literal::new(variable, !value));
    }

    /// Undoes every assignment made above `level` and drops satisfaction
    /// marks recorded there.
    pub fn backtrack_to(&mut self, level: usize) {
        debug_assert!(level <= self.level);

        while let Some(entry) = self.trail.last() {
            if entry.level <= level {
                break;
            }
            let entry = self.trail.pop().unwrap();
            self.assignment[entry.variable.index()] = None;
        }

        for mark in self.satisfied_at.iter_mut() {
            if let Some(marked_level) = *mark {
                if marked_level > level {
                    *mark = None;
                    self.satisfied_count -= 1;
                }
            }
        }

        self.level = level;
        self.queue.clear();
        trace!("backtrack to level {}, trail length {}", level, self.trail.len());
    }

    fn mark_satisfied(&mut self, idx: ClauseIdx) {
        if self.satisfied_at[idx].is_none() {
            self.satisfied_at[idx] = Some(self.level);
            self.satisfied_count += 1;
        }
    }

    /// Assigns every unit fact of the database at level 0.
    /// Top-level contradictory units surface as a conflict.
    pub fn apply_unit_facts(&mut self) -> Result<(), Conflict> {
        debug_assert_eq!(self.level, 0);

        for idx in (0..self.clauses.len()).map(ClauseIdx::from) {
            if self.clauses[idx].literals.len() != 1 || self.is_clause_satisfied(idx) {
                continue;
            }
            let literal = self.clauses[idx].literals[0];
            match self.value(literal) {
                Some(true) => self.mark_satisfied(idx),
                Some(false) => return Err(Conflict { clause: idx }),
                None => {
                    self.assign(literal.variable(), literal.positive(), AssignmentKind::Propagated);
                    self.mark_satisfied(idx);
                }
            }
        }

        Ok(())
    }

    /// Drains the propagation queue, reacting clause by clause to each
    /// falsified watch. Returns the falsified clause on conflict; the
    /// queue is emptied either way.
    pub fn propagate(&mut self) -> Result<(), Conflict> {
        while let Some(false_literal) = self.queue.pop_front() {
            if let Err(conflict) = self.propagate_literal(false_literal) {
                self.queue.clear();
                return Err(conflict);
            }
        }

        Ok(())
    }

    fn propagate_literal(&mut self, false_literal: Literal) -> Result<(), Conflict> {
        debug_assert_eq!(self.value(false_literal), Some(false));

        let watching = std::mem::replace(&mut self.watch[false_literal], Vec::new());
        let mut kept = Vec::with_capacity(watching.len());
        let mut result = Ok(());

        for (pos, &idx) in watching.iter().enumerate() {
            match self.react(idx, false_literal) {
                Reaction::Keep => kept.push(idx),
                Reaction::Migrated => {}
                Reaction::Conflict => {
                    kept.push(idx);
                    // keep the untouched tail watched before aborting
                    kept.extend_from_slice(&watching[pos + 1..]);
                    result = Err(Conflict { clause: idx });
                    break;
                }
            }
        }

        self.watch[false_literal] = kept;
        result
    }

    /// Applies the per-clause reaction rules for a falsified watch:
    /// satisfied-by-other, watch migration, unit assignment, or conflict.
    fn react(&mut self, idx: ClauseIdx, false_literal: Literal) -> Reaction {
        if self.is_clause_satisfied(idx) {
            return Reaction::Keep;
        }

        let [w0, w1] = self.clauses[idx].watched;
        let literals = &self.clauses[idx].literals;

        if literals.len() == 1 {
            // a falsified unit fact has no other watch to fall back on
            return Reaction::Conflict;
        }

        let (false_slot, other_slot) = if literals[w0] == false_literal {
            (0, w1)
        } else {
            debug_assert_eq!(literals[w1], false_literal);
            (1, w0)
        };
        let other = literals[other_slot];

        if self.value(other) == Some(true) {
            self.mark_satisfied(idx);
            return Reaction::Keep;
        }

        let replacement = {
            let clause = &self.clauses[idx];
            clause.literals.iter().enumerate().position(|(slot, &literal)| {
                slot != clause.watched[0]
                    && slot != clause.watched[1]
                    && self.value(literal) != Some(false)
            })
        };

        match replacement {
            Some(slot) => {
                let new_watch = self.clauses[idx].literals[slot];
                self.clauses[idx].watched[false_slot] = slot;
                self.watch[new_watch].push(idx);
                Reaction::Migrated
            }
            None => match self.value(other) {
                // all literals but `other` are false: a unit
                None => {
                    self.assign(other.variable(), other.positive(), AssignmentKind::Propagated);
                    self.mark_satisfied(idx);
                    Reaction::Keep
                }
                Some(false) => Reaction::Conflict,
                Some(true) => unreachable!("satisfied clause handled above"),
            },
        }
    }

    /// Checks whether every clause is satisfied under the current
    /// assignment, lazily refreshing the satisfaction marks of clauses the
    /// watch scheme has not touched yet.
    pub fn all_clauses_satisfied(&mut self) -> bool {
        if self.satisfied_count == self.clauses.len() {
            return true;
        }

        for idx in (0..self.clauses.len()).map(ClauseIdx::from) {
            if self.is_clause_satisfied(idx) {
                continue;
            }
            let satisfied = self.clauses[idx]
                .literals
                .iter()
                .any(|&literal| self.value(literal) == Some(true));
            if satisfied {
                self.mark_satisfied(idx);
            }
        }

        self.satisfied_count == self.clauses.len()
    }

    /// Occurrence counts of each unassigned variable over the clauses not
    /// yet marked satisfied, split by polarity.
    pub fn polarity_counts(&self) -> (Vec<usize>, Vec<usize>) {
        let mut positive = vec![0; self.num_variables];
        let mut negative = vec![0; self.num_variables];

        for (idx, clause) in self.clauses.iter_enumerated() {
            if self.is_clause_satisfied(idx) {
                continue;
            }
            for &literal in &clause.literals {
                if self.assignment[literal.index()].is_some() {
                    continue;
                }
                if literal.positive() {
                    positive[literal.index()] += 1;
                } else {
                    negative[literal.index()] += 1;
                }
            }
        }

        (positive, negative)
    }

    /// Assigns every pure literal at level 0 and repeats until a fixed
    /// point. A literal is pure when its variable occurs with a single
    /// polarity across the clauses not yet satisfied; assigning it that
    /// polarity can never falsify a clause.
    pub fn pure_literal_elimination(&mut self) -> Result<(), Conflict> {
        debug_assert_eq!(self.level, 0);

        loop {
            let (positive, negative) = self.polarity_counts();
            let mut changed = false;

            for index in 0..self.num_variables {
                if self.assignment[index].is_some() {
                    continue;
                }

                let value = if positive[index] > 0 && negative[index] == 0 {
                    Some(true)
                } else if negative[index] > 0 && positive[index] == 0 {
                    Some(false)
                } else {
                    None
                };

                if let Some(value) = value {
                    let variable = Variable::from_index(index).unwrap();
                    debug!("pure literal {} := {}", variable, value);
                    self.assign(variable, value, AssignmentKind::Propagated);
                    self.propagate()?;
                    changed = true;
                }
            }

            if !changed {
                return Ok(());
            }
        }
    }
}
