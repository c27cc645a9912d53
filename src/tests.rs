use paste::paste;

use crate::{
    formula::{Clause, Cnf, Literal, Variable},
    parser::parse_file,
    solver::{DpllSolver, PortfolioSolver, Solver},
};

fn variable(id: usize) -> Variable {
    Variable::from_index(id - 1).unwrap()
}

fn literal(dimacs: i64) -> Literal {
    Literal::new(variable(dimacs.abs() as usize), dimacs > 0)
}

fn build_cnf(num_variables: usize, clauses: &[&[i64]]) -> Cnf {
    let mut cnf = Cnf::new(num_variables);
    for clause in clauses {
        cnf.add_clause(Clause::new(clause.iter().map(|&lit| literal(lit)).collect()));
    }
    cnf
}

macro_rules! sat_testcase_with_solver {
    ($solver:ident, $dir:ident, $name: ident) => {
        paste! {
            #[test]
            fn [< $solver:lower _ $dir _ $name >]() {
                let formula = parse_file(
                    concat!("testcases/", stringify!($dir), "/", stringify!($name), ".cnf")
                ).unwrap();
                let solver = $solver::new(formula);
                assert!(solver.solve().is_some());
            }
        }
    };
}

macro_rules! unsat_testcase_with_solver {
    ($solver:ident, $dir:ident, $name:ident) => {
        paste! {
            #[test]
            fn [< $solver:lower _ $dir _ $name >]() {
                let formula = parse_file(
                    concat!("testcases/", stringify!($dir), "/", stringify!($name), ".cnf")
                ).unwrap();
                let solver = $solver::new(formula);
                assert!(solver.solve().is_none());
            }
        }
    };
}

macro_rules! sat_testcase {
    ($dir:ident, $name:ident) => {
        sat_testcase_with_solver!(DpllSolver, $dir, $name);
        sat_testcase_with_solver!(PortfolioSolver, $dir, $name);
    };
}

macro_rules! unsat_testcase {
    ($dir:ident, $name:ident) => {
        unsat_testcase_with_solver!(DpllSolver, $dir, $name);
        unsat_testcase_with_solver!(PortfolioSolver, $dir, $name);
    };
}

sat_testcase!(cnfs, simple1);
sat_testcase!(cnfs, chain);
sat_testcase!(cnfs, unit1);
sat_testcase!(cnfs, taut);
sat_testcase!(cnfs, empty);
sat_testcase!(cnfs, multiline);
sat_testcase!(cnfs, mixed);

unsat_testcase!(cnfs, full2);
unsat_testcase!(cnfs, contra);
unsat_testcase!(cnfs, emptyclause);
unsat_testcase!(cnfs, ph3);
unsat_testcase!(cnfs, ph4);

mod store {
    use super::{build_cnf, literal, variable};
    use crate::solver::store::{AssignmentKind, ClauseIdx, Store};

    fn assigned_count(store: &Store) -> usize {
        store
            .assignment()
            .iter()
            .filter(|assigned| assigned.is_some())
            .count()
    }

    /// After a successful propagation no clause may be a missed unit
    /// (exactly one unassigned literal, the rest false) or fully false.
    fn assert_propagation_complete(store: &Store) {
        for idx in (0..store.num_clauses()).map(ClauseIdx::from) {
            if store.is_clause_satisfied(idx) {
                continue;
            }

            let mut unassigned = 0;
            let mut falsified = 0;
            let mut total = 0;
            for literal in store.clause_literals(idx) {
                total += 1;
                match store.value(literal) {
                    None => unassigned += 1,
                    Some(false) => falsified += 1,
                    Some(true) => {}
                }
            }

            assert!(falsified < total, "clause {:?} is fully falsified", idx);
            assert!(
                !(unassigned == 1 && falsified == total - 1),
                "clause {:?} is a missed unit",
                idx
            );
        }
    }

    #[test]
    fn trail_length_matches_assigned_variables() {
        let formula = build_cnf(4, &[&[1, 2], &[-1, 3], &[-3, 4]]);
        let mut store = Store::from_cnf(&formula);
        assert_eq!(store.trail_len(), 0);

        store.assign(variable(1), true, AssignmentKind::Decision);
        assert_eq!(store.trail_len(), assigned_count(&store));

        store.propagate().unwrap();
        assert_eq!(store.trail_len(), assigned_count(&store));
        assert_propagation_complete(&store);
    }

    #[test]
    fn propagation_chains_through_units() {
        let formula = build_cnf(4, &[&[1, 2], &[-1, 3], &[-3, 4]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        store.propagate().unwrap();

        // x1 forces x3 which forces x4
        assert_eq!(store.assignment()[2], Some(true));
        assert_eq!(store.assignment()[3], Some(true));
    }

    #[test]
    fn decision_count_tracks_the_level() {
        let formula = build_cnf(3, &[&[1, 2, 3]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), false, AssignmentKind::Decision);
        store.propagate().unwrap();
        store.assign(variable(2), false, AssignmentKind::Decision);
        store.propagate().unwrap();

        assert_eq!(store.num_decisions(), 2);
        assert_eq!(store.num_decisions(), store.level());

        store.backtrack_to(1);
        assert_eq!(store.num_decisions(), 1);
    }

    #[test]
    fn backtrack_restores_assignment_and_level() {
        let formula = build_cnf(4, &[&[1, 2], &[-1, 3], &[-3, 4]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        store.propagate().unwrap();
        assert_eq!(store.level(), 1);
        assert!(store.trail_len() > 1);

        store.backtrack_to(0);
        assert_eq!(store.level(), 0);
        assert_eq!(store.trail_len(), 0);
        assert!(store.assignment().iter().all(|assigned| assigned.is_none()));
    }

    #[test]
    fn backtrack_drops_deeper_satisfaction_marks() {
        let formula = build_cnf(2, &[&[1, 2]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        store.propagate().unwrap();
        assert!(store.all_clauses_satisfied());

        store.backtrack_to(0);
        assert!(!store.is_clause_satisfied(ClauseIdx::from(0)));
    }

    #[test]
    fn contradictory_units_conflict_at_level_zero() {
        let formula = build_cnf(1, &[&[1], &[-1]]);
        let mut store = Store::from_cnf(&formula);

        let result = store.apply_unit_facts().and_then(|()| store.propagate());
        assert!(result.is_err());
    }

    #[test]
    fn conflict_reports_the_falsified_clause() {
        // x1 = true falsifies the second clause through the unit x2
        let formula = build_cnf(2, &[&[-1, 2], &[-1, -2]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        let conflict = store.propagate().unwrap_err();
        let literals = store.clause_literals(conflict.clause).collect::<Vec<_>>();
        assert!(literals
            .iter()
            .all(|&lit| store.value(lit) == Some(false)));
    }

    #[test]
    fn pure_literal_elimination_fixes_single_polarity_variables() {
        // x1 only occurs positively; x2 occurs in both polarities
        let formula = build_cnf(2, &[&[1, 2], &[1, -2]]);
        let mut store = Store::from_cnf(&formula);

        store.pure_literal_elimination().unwrap();
        assert_eq!(store.assignment()[0], Some(true));
        assert!(store.all_clauses_satisfied());
        assert_eq!(store.level(), 0);
    }

    #[test]
    fn tautological_clause_is_satisfied_from_the_start() {
        let formula = build_cnf(2, &[&[1, -1, 2]]);
        let mut store = Store::from_cnf(&formula);
        assert!(store.is_clause_satisfied(ClauseIdx::from(0)));
        assert!(store.all_clauses_satisfied());
    }

    #[test]
    #[should_panic]
    fn double_assignment_is_an_invariant_break() {
        let formula = build_cnf(1, &[&[1]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        store.assign(variable(1), false, AssignmentKind::Decision);
    }

    #[test]
    fn polarity_counts_skip_satisfied_clauses_and_assigned_variables() {
        let formula = build_cnf(3, &[&[1, 2], &[-2, 3]]);
        let mut store = Store::from_cnf(&formula);

        store.assign(variable(1), true, AssignmentKind::Decision);
        store.propagate().unwrap();
        assert!(store.all_clauses_satisfied() == false);

        let (positive, negative) = store.polarity_counts();
        // the first clause is satisfied by x1; only (-2 3) remains
        assert_eq!(positive[literal(1).index()], 0);
        assert_eq!(negative[literal(2).index()], 1);
        assert_eq!(positive[literal(3).index()], 1);
    }
}

mod heuristic {
    use super::{build_cnf, variable};
    use crate::solver::heuristic::{Brancher, VsidsScoring};
    use crate::solver::store::Store;

    #[test]
    fn vsids_prefers_the_most_bumped_variable() {
        let mut vsids = VsidsScoring::new(3);
        vsids.bump(variable(2));
        vsids.bump(variable(2));
        vsids.bump(variable(3));

        assert_eq!(vsids.select(&[None, None, None]), Some(variable(2)));
    }

    #[test]
    fn vsids_skips_assigned_variables() {
        let mut vsids = VsidsScoring::new(2);
        vsids.bump(variable(1));

        assert_eq!(
            vsids.select(&[Some(true), None]),
            Some(variable(2))
        );
        assert_eq!(vsids.select(&[Some(true), Some(false)]), None);
    }

    #[test]
    fn vsids_ties_break_toward_the_lowest_id() {
        let vsids = VsidsScoring::new(3);
        assert_eq!(vsids.select(&[None, None, None]), Some(variable(1)));
    }

    #[test]
    fn vsids_survives_thousands_of_decays() {
        let mut vsids = VsidsScoring::new(2);
        // enough decays to push the increment across the rescale threshold
        for _ in 0..5_000 {
            vsids.decay();
        }
        vsids.bump(variable(2));
        assert_eq!(vsids.select(&[None, None]), Some(variable(2)));
    }

    #[test]
    fn mom_phase_prefers_balanced_frequent_variables() {
        // x2 and x3 dominate the clause counts; ties go to the lower id
        let formula = build_cnf(8, &[&[2, 3], &[2, -3], &[-2, 3], &[-2, -3]]);
        let store = Store::from_cnf(&formula);
        let mut brancher = Brancher::new(8);

        assert_eq!(brancher.select(&store), Some(variable(2)));
    }

    #[test]
    fn selection_runs_out_with_the_variables() {
        let formula = build_cnf(1, &[&[1]]);
        let mut store = Store::from_cnf(&formula);
        let mut brancher = Brancher::new(1);

        store.apply_unit_facts().unwrap();
        store.propagate().unwrap();
        assert_eq!(brancher.select(&store), None);
    }
}

mod parser {
    use crate::parser::{parse_str, Error};

    #[test]
    fn parses_comments_header_and_clauses() {
        let cnf = parse_str("c a comment\np cnf 3 2\n1 -2 0\n2 3 0\n").unwrap();
        assert_eq!(cnf.num_variables(), 3);
        assert_eq!(cnf.clauses().len(), 2);
    }

    #[test]
    fn clauses_may_span_lines() {
        let cnf = parse_str("p cnf 3 2\n1\n-2 0 2\n3 0\n").unwrap();
        assert_eq!(cnf.clauses().len(), 2);
        assert_eq!(cnf.clauses()[0].num_literals(), 2);
    }

    #[test]
    fn empty_clauses_are_counted_not_stored() {
        let cnf = parse_str("p cnf 2 2\n1 2 0\n0\n").unwrap();
        assert_eq!(cnf.clauses().len(), 1);
        assert_eq!(cnf.empty_clause_count(), 1);
    }

    #[test]
    fn missing_problem_line_is_an_error() {
        match parse_str("c only a comment\n") {
            Err(Error::MalformedProblemDefinition) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn out_of_range_literal_is_an_error() {
        match parse_str("p cnf 2 1\n1 3 0\n") {
            Err(Error::LiteralOutOfRange { .. }) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unterminated_final_clause_is_an_error() {
        match parse_str("p cnf 2 1\n1 2\n") {
            Err(Error::UnterminatedClause) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn clause_count_mismatch_is_an_error() {
        match parse_str("p cnf 2 3\n1 2 0\n") {
            Err(Error::ClauseCountMismatch { .. }) => {}
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}

mod writer {
    use std::time::Duration;

    use super::build_cnf;
    use crate::solver::{DpllSolver, Solver};
    use crate::writer::write_result;

    #[test]
    fn sat_record_lists_the_full_assignment() {
        let model = DpllSolver::new(build_cnf(2, &[&[1], &[-2]]))
            .solve()
            .unwrap();

        let mut out = Vec::new();
        write_result(&mut out, Some(&model), Duration::from_millis(12)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "s 1\nv 1 -2\nt 12.000\n");
    }

    #[test]
    fn unsat_record_keeps_an_empty_v_line() {
        let mut out = Vec::new();
        write_result(&mut out, None, Duration::from_micros(500)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "s 0\nv\nt 0.500\n");
    }
}

mod outcomes {
    use super::{build_cnf, literal};
    use crate::solver::{DpllSolver, PortfolioSolver, Solver};

    #[test]
    fn models_satisfy_every_clause() {
        let clauses: &[&[i64]] = &[&[1, -2], &[2, 3], &[-1, -3, 2]];
        let model = DpllSolver::new(build_cnf(3, clauses)).solve().unwrap();

        for clause in clauses {
            assert!(clause
                .iter()
                .any(|&lit| literal(lit).value(model.assignment())));
        }
    }

    #[test]
    fn empty_formula_is_satisfiable_with_a_total_assignment() {
        let model = DpllSolver::new(build_cnf(3, &[])).solve().unwrap();
        assert_eq!(model.assignment().len(), 3);
    }

    #[test]
    fn unit_clause_forces_its_literal() {
        let model = DpllSolver::new(build_cnf(1, &[&[1]])).solve().unwrap();
        assert_eq!(model.assignment(), &[true]);
    }

    #[test]
    fn solvers_agree_on_satisfiability() {
        let formulas: &[(usize, &[&[i64]])] = &[
            (3, &[&[1, -2], &[2, 3]]),
            (2, &[&[1, 2], &[1, -2], &[-1, 2], &[-1, -2]]),
            (4, &[&[1, 2], &[-1, -2], &[2, 3], &[-2, -3], &[3, 4], &[-3, -4]]),
            (1, &[&[1], &[-1]]),
            (3, &[]),
        ];

        for &(num_variables, clauses) in formulas {
            let sequential = DpllSolver::new(build_cnf(num_variables, clauses))
                .solve()
                .is_some();
            let parallel = PortfolioSolver::new(build_cnf(num_variables, clauses))
                .solve()
                .is_some();
            assert_eq!(sequential, parallel);
        }
    }
}

mod sudoku {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::sudoku::{self, SudokuGrid};

    /// A classic sudoku solution whose main diagonal repeats digits; valid
    /// for the vanilla rules but not for the percent layout.
    fn shifted_rows_grid() -> SudokuGrid {
        let mut grid = SudokuGrid::empty();
        let base = [1u8, 2, 3, 4, 5, 6, 7, 8, 9];
        let offsets = [0, 3, 6, 1, 4, 7, 2, 5, 8];
        for (row, &offset) in offsets.iter().enumerate() {
            for col in 0..9 {
                grid.set(row, col, base[(col + offset) % 9]);
            }
        }
        grid
    }

    #[test]
    fn generated_puzzles_stay_unique_and_solvable() {
        let mut rng = StdRng::seed_from_u64(0x5d00);
        let generated = sudoku::generate_with_rng(77, &mut rng).unwrap();

        assert!(generated.solution.is_valid_solution());
        assert!(generated.puzzle.clue_count() >= 77);
        assert!(sudoku::has_unique_solution(&generated.puzzle));
        assert_eq!(sudoku::solve(&generated.puzzle), Some(generated.solution));
    }

    #[test]
    fn encoding_rejects_a_diagonal_violation() {
        let grid = shifted_rows_grid();
        assert!(!grid.is_valid_solution());
        assert_eq!(sudoku::solve(&grid), None);
    }

    #[test]
    fn empty_grid_has_many_solutions() {
        assert!(!sudoku::has_unique_solution(&SudokuGrid::empty()));
    }

    #[test]
    fn clue_count_is_validated() {
        assert!(sudoku::generate(3).is_err());
        assert!(sudoku::generate(100).is_err());
    }
}
