/*!
Percent-sudoku generation, SAT encoding, and decoding.

The variant extends the usual row/column/box rules with an all-different
main diagonal and two all-different 3×3 windows (rows/columns 2–4 and
6–8). Puzzles are generated by digging holes out of a complete grid while
a SAT-based uniqueness check keeps the solution unique.
*/

use rand::seq::SliceRandom;
use rand::Rng;

use crate::formula::{Clause, Cnf, Literal, Model, Variable};
use crate::prelude::*;
use crate::solver::{DpllSolver, Solver};

pub const GRID: usize = 9;
const DIGITS: usize = 9;

/// Variables of the encoding: one per (row, column, digit) triple.
pub const NUM_VARIABLES: usize = GRID * GRID * DIGITS;

/// Fewest clues a generated puzzle may keep.
pub const MIN_CLUES: usize = 17;

/// Cells of the two extra all-different windows, as (row, column).
const UPPER_WINDOW: [(usize, usize); 9] = [
    (1, 1),
    (1, 2),
    (1, 3),
    (2, 1),
    (2, 2),
    (2, 3),
    (3, 1),
    (3, 2),
    (3, 3),
];
const LOWER_WINDOW: [(usize, usize); 9] = [
    (5, 5),
    (5, 6),
    (5, 7),
    (6, 5),
    (6, 6),
    (6, 7),
    (7, 5),
    (7, 6),
    (7, 7),
];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "Clue count {} is out of range (must be within {} to {})",
        clues,
        MIN_CLUES,
        GRID * GRID
    ))]
    ClueCountOutOfRange { clues: usize },
    #[snafu(display("Failed to generate a complete percent-sudoku grid"))]
    GenerationFailed,
}

/// A 9×9 grid; `0` marks an empty cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SudokuGrid([[u8; GRID]; GRID]);

impl SudokuGrid {
    pub fn empty() -> Self {
        SudokuGrid([[0; GRID]; GRID])
    }

    /// # Panics
    ///
    /// Panics when a cell holds a value above 9.
    pub fn new(cells: [[u8; GRID]; GRID]) -> Self {
        assert!(cells
            .iter()
            .all(|row| row.iter().all(|&digit| digit <= DIGITS as u8)));
        SudokuGrid(cells)
    }

    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.0[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, digit: u8) {
        self.0[row][col] = digit;
    }

    pub fn clue_count(&self) -> usize {
        self.0
            .iter()
            .map(|row| row.iter().filter(|&&digit| digit != 0).count())
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        self.clue_count() == GRID * GRID
    }

    /// Checks that the grid is complete and respects every percent-sudoku
    /// constraint group.
    pub fn is_valid_solution(&self) -> bool {
        if !self.is_complete() {
            return false;
        }

        let group_ok = |cells: &[(usize, usize)]| {
            let mut seen = [false; DIGITS + 1];
            cells.iter().all(|&(row, col)| {
                let digit = self.get(row, col) as usize;
                !std::mem::replace(&mut seen[digit], true)
            })
        };

        (0..GRID).all(|row| group_ok(&row_cells(row)))
            && (0..GRID).all(|col| group_ok(&column_cells(col)))
            && (0..GRID).all(|index| group_ok(&box_cells(index)))
            && group_ok(&diagonal_cells())
            && group_ok(&UPPER_WINDOW)
            && group_ok(&LOWER_WINDOW)
    }
}

impl std::fmt::Display for SudokuGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..GRID {
            if row % 3 == 0 && row != 0 {
                writeln!(f, "------+-------+------")?;
            }
            for col in 0..GRID {
                if col % 3 == 0 && col != 0 {
                    write!(f, "| ")?;
                }
                match self.get(row, col) {
                    0 => write!(f, "? ")?,
                    digit => write!(f, "{} ", digit)?,
                }
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// A generated puzzle together with the grid it was dug out of.
#[derive(Clone, Copy, Debug)]
pub struct Puzzle {
    pub puzzle: SudokuGrid,
    pub solution: SudokuGrid,
}

fn row_cells(row: usize) -> Vec<(usize, usize)> {
    (0..GRID).map(|col| (row, col)).collect()
}

fn column_cells(col: usize) -> Vec<(usize, usize)> {
    (0..GRID).map(|row| (row, col)).collect()
}

fn box_cells(index: usize) -> Vec<(usize, usize)> {
    let (base_row, base_col) = (index / 3 * 3, index % 3 * 3);
    (0..GRID)
        .map(|cell| (base_row + cell / 3, base_col + cell % 3))
        .collect()
}

fn diagonal_cells() -> Vec<(usize, usize)> {
    (0..GRID).map(|index| (index, index)).collect()
}

/// The encoding variable of "cell (row, col) holds digit".
/// DIMACS id is `81·row + 9·col + digit`.
fn cell_variable(row: usize, col: usize, digit: u8) -> Variable {
    let index = row * GRID * DIGITS + col * DIGITS + (digit as usize - 1);
    Variable::from_index(index).unwrap()
}

fn cell_literal(row: usize, col: usize, digit: u8, positive: bool) -> Literal {
    Literal::new(cell_variable(row, col, digit), positive)
}

/// Emits all-different constraints for a cell group: pairwise at-most-one
/// per digit, plus at-least-one per digit when `with_at_least` is set.
fn encode_all_different(cnf: &mut Cnf, cells: &[(usize, usize)], with_at_least: bool) {
    for digit in 1..=DIGITS as u8 {
        if with_at_least {
            let literals = cells
                .iter()
                .map(|&(row, col)| cell_literal(row, col, digit, true))
                .collect();
            cnf.add_clause(Clause::new(literals));
        }

        for (position, &(row1, col1)) in cells.iter().enumerate() {
            for &(row2, col2) in &cells[position + 1..] {
                cnf.add_clause(Clause::new(vec![
                    cell_literal(row1, col1, digit, false),
                    cell_literal(row2, col2, digit, false),
                ]));
            }
        }
    }
}

/// Reduces a puzzle to CNF over 729 variables.
pub fn encode(puzzle: &SudokuGrid) -> Cnf {
    let mut cnf = Cnf::new(NUM_VARIABLES);

    // each cell holds at least one digit, and at most one
    for row in 0..GRID {
        for col in 0..GRID {
            let literals = (1..=DIGITS as u8)
                .map(|digit| cell_literal(row, col, digit, true))
                .collect();
            cnf.add_clause(Clause::new(literals));

            for digit1 in 1..DIGITS as u8 {
                for digit2 in digit1 + 1..=DIGITS as u8 {
                    cnf.add_clause(Clause::new(vec![
                        cell_literal(row, col, digit1, false),
                        cell_literal(row, col, digit2, false),
                    ]));
                }
            }
        }
    }

    for row in 0..GRID {
        encode_all_different(&mut cnf, &row_cells(row), true);
    }
    for col in 0..GRID {
        encode_all_different(&mut cnf, &column_cells(col), true);
    }
    for index in 0..GRID {
        encode_all_different(&mut cnf, &box_cells(index), true);
    }

    // percent layout: diagonal and windows carry at-most-one only
    encode_all_different(&mut cnf, &diagonal_cells(), false);
    encode_all_different(&mut cnf, &UPPER_WINDOW, false);
    encode_all_different(&mut cnf, &LOWER_WINDOW, false);

    // clues become unit facts
    for row in 0..GRID {
        for col in 0..GRID {
            let digit = puzzle.get(row, col);
            if digit != 0 {
                cnf.add_clause(Clause::new(vec![cell_literal(row, col, digit, true)]));
            }
        }
    }

    cnf
}

/// Reads a solved grid back out of a model of `encode`'s CNF.
pub fn decode(model: &Model) -> SudokuGrid {
    let assignment = model.assignment();
    let mut grid = SudokuGrid::empty();

    for row in 0..GRID {
        for col in 0..GRID {
            for digit in 1..=DIGITS as u8 {
                if cell_literal(row, col, digit, true).value(assignment) {
                    grid.set(row, col, digit);
                    break;
                }
            }
        }
    }

    grid
}

/// Solves a puzzle through the sequential SAT solver.
pub fn solve(puzzle: &SudokuGrid) -> Option<SudokuGrid> {
    DpllSolver::new(encode(puzzle))
        .solve()
        .map(|model| decode(&model))
}

/// A puzzle is unique when re-solving with its first solution blocked on
/// the empty cells comes back UNSAT.
pub fn has_unique_solution(puzzle: &SudokuGrid) -> bool {
    let first = match solve(puzzle) {
        Some(solution) => solution,
        None => return false,
    };

    let mut blocking = Vec::new();
    for row in 0..GRID {
        for col in 0..GRID {
            if puzzle.get(row, col) == 0 {
                blocking.push(cell_literal(row, col, first.get(row, col), false));
            }
        }
    }
    if blocking.is_empty() {
        // fully clued: nothing left to vary
        return true;
    }

    let mut cnf = encode(puzzle);
    cnf.add_clause(Clause::new(blocking));
    DpllSolver::new(cnf).solve().is_none()
}

/// Whether `digit` can be placed at (row, col) without clashing with any
/// constraint group of the percent layout.
fn digit_is_safe(grid: &SudokuGrid, row: usize, col: usize, digit: u8) -> bool {
    let clash = |cells: &[(usize, usize)]| {
        cells
            .iter()
            .any(|&(other_row, other_col)| grid.get(other_row, other_col) == digit)
    };

    if clash(&row_cells(row)) || clash(&column_cells(col)) {
        return false;
    }
    if clash(&box_cells(row / 3 * 3 + col / 3)) {
        return false;
    }
    if row == col && clash(&diagonal_cells()) {
        return false;
    }
    if UPPER_WINDOW.contains(&(row, col)) && clash(&UPPER_WINDOW) {
        return false;
    }
    if LOWER_WINDOW.contains(&(row, col)) && clash(&LOWER_WINDOW) {
        return false;
    }

    true
}

/// Fills the grid cell by cell with a shuffled digit order, backtracking
/// on dead ends.
fn fill_cells(grid: &mut SudokuGrid, cell: usize, rng: &mut impl Rng) -> bool {
    if cell == GRID * GRID {
        return true;
    }
    let (row, col) = (cell / GRID, cell % GRID);
    if grid.get(row, col) != 0 {
        return fill_cells(grid, cell + 1, rng);
    }

    let mut digits: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];
    digits.shuffle(rng);

    for &digit in &digits {
        if digit_is_safe(grid, row, col, digit) {
            grid.set(row, col, digit);
            if fill_cells(grid, cell + 1, rng) {
                return true;
            }
            grid.set(row, col, 0);
        }
    }

    false
}

/// Generates a puzzle with `clues` hints and a unique solution.
pub fn generate(clues: usize) -> Result<Puzzle, Error> {
    generate_with_rng(clues, &mut rand::thread_rng())
}

pub fn generate_with_rng(clues: usize, rng: &mut impl Rng) -> Result<Puzzle, Error> {
    ensure!(
        (MIN_CLUES..=GRID * GRID).contains(&clues),
        ClueCountOutOfRange { clues }
    );

    let mut solution = SudokuGrid::empty();
    ensure!(fill_cells(&mut solution, 0, rng), GenerationFailed);

    let mut positions = (0..GRID * GRID)
        .map(|cell| (cell / GRID, cell % GRID))
        .collect::<Vec<_>>();
    positions.shuffle(rng);

    let mut puzzle = solution;
    let mut removed = 0;
    let target = GRID * GRID - clues;

    for &(row, col) in &positions {
        if removed == target {
            break;
        }

        let backup = puzzle.get(row, col);
        puzzle.set(row, col, 0);

        if has_unique_solution(&puzzle) {
            removed += 1;
            debug!("removed cell ({}, {}), {} holes dug", row, col, removed);
        } else {
            puzzle.set(row, col, backup);
        }
    }

    debug!(
        "puzzle generated with {} clues (target {})",
        puzzle.clue_count(),
        clues
    );
    Ok(Puzzle { puzzle, solution })
}
