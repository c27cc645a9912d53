/*!
Branching-variable selection: MOM for the opening decisions, VSIDS
afterwards. Ties always break toward the lowest variable id so that runs
are reproducible.
*/

use crate::formula::{Literal, Variable};

use super::store::Store;

/// Variable State Independent Decaying Sum (VSIDS) heuristic.
/// Based on MiniSAT implementation.
#[derive(Clone, Debug)]
pub struct VsidsScoring {
    increment: f64,
    activity: Vec<f64>,
}

impl VsidsScoring {
    const DECAY_RATE: f64 = 0.95;
    const RESCALE_THRESHOLD: f64 = 1e100;
    const RESCALE_FACTOR: f64 = 1e-100;

    pub fn new(num_variables: usize) -> Self {
        VsidsScoring {
            increment: 1.0,
            activity: vec![0.0; num_variables],
        }
    }

    pub fn bump(&mut self, variable: Variable) {
        self.activity[variable.index()] += self.increment;

        if self.activity[variable.index()] > Self::RESCALE_THRESHOLD {
            self.rescale();
        }
    }

    /// Grows the increment so that later bumps outweigh earlier ones.
    pub fn decay(&mut self) {
        self.increment /= Self::DECAY_RATE;

        if self.increment > Self::RESCALE_THRESHOLD {
            self.rescale();
        }
    }

    fn rescale(&mut self) {
        trace!("VSIDS rescale");
        for activity in &mut self.activity {
            *activity *= Self::RESCALE_FACTOR;
        }
        self.increment *= Self::RESCALE_FACTOR;
    }

    /// The unassigned variable with the highest activity; `None` iff every
    /// variable is assigned.
    pub fn select(&self, assignment: &[Option<bool>]) -> Option<Variable> {
        let mut best: Option<(Variable, f64)> = None;

        for (index, assigned) in assignment.iter().enumerate() {
            if assigned.is_some() {
                continue;
            }
            let variable = Variable::from_index(index).unwrap();
            let activity = self.activity[index];
            match best {
                Some((_, best_activity)) if best_activity >= activity => {}
                _ => best = Some((variable, activity)),
            }
        }

        best.map(|(variable, _)| variable)
    }
}

/// Maximum Occurrences in clauses of Minimum size, approximated over all
/// unsatisfied clauses: `pos·neg + pos + neg` favors variables that are
/// frequent under both polarities.
fn mom_select(store: &Store) -> Option<Variable> {
    let (positive, negative) = store.polarity_counts();
    let mut best: Option<(Variable, usize)> = None;

    for (index, assigned) in store.assignment().iter().enumerate() {
        if assigned.is_some() {
            continue;
        }
        let variable = Variable::from_index(index).unwrap();
        let score = positive[index] * negative[index] + positive[index] + negative[index];
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((variable, score)),
        }
    }

    best.map(|(variable, _)| variable)
}

/// Composite branching heuristic.
///
/// The first `num_variables / 4` decisions use MOM, which needs no
/// conflict history; once enough conflicts have shaped the activity
/// profile, selection switches to VSIDS.
#[derive(Clone, Debug)]
pub struct Brancher {
    decisions: usize,
    mom_budget: usize,
    vsids: VsidsScoring,
}

impl Brancher {
    /// Polarity tried first on every branch variable.
    pub const FIRST_POLARITY: bool = true;

    pub fn new(num_variables: usize) -> Self {
        Brancher {
            decisions: 0,
            mom_budget: num_variables / 4,
            vsids: VsidsScoring::new(num_variables),
        }
    }

    /// Picks the next branch variable, `None` iff every variable is
    /// assigned.
    pub fn select(&mut self, store: &Store) -> Option<Variable> {
        let choice = if self.decisions < self.mom_budget {
            mom_select(store)
        } else {
            self.vsids.select(store.assignment())
        };

        if let Some(variable) = choice {
            self.decisions += 1;
            trace!("branch decision #{} on {}", self.decisions, variable);
        }

        choice
    }

    /// Credits every variable of a conflict clause and ages the rest.
    pub fn on_conflict(&mut self, conflict_literals: &[Literal]) {
        for literal in conflict_literals {
            self.vsids.bump(literal.variable());
        }
        self.vsids.decay();
    }
}
