use std::{env::args, path::Path, time::Instant};

use pretty_env_logger::formatted_builder;
use sudosat::{
    parser::{self, parse_file},
    prelude::*,
    report::Report,
    solver::{DpllSolver, PortfolioSolver, Solver},
    sudoku, writer,
};

fn usage_string() -> String {
    format!(
        "Usage: {0} <solver_name> <command>
       {0} sudoku <clues>

solver_name: dpll, portfolio

command:
    check <file_name> - solve the given DIMACS file and write <file_name>.res

sudoku: generate a percent-sudoku puzzle with the given number of clues",
        args().next().unwrap()
    )
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unknown solver '{}'\n\n{}", name, usage_string()))]
    UnknownSolver { name: String },
    #[snafu(display("Unknown command '{}'\n\n{}", name, usage_string()))]
    UnknownCommand { name: String },
    #[snafu(display("Failed to parse CNF"))]
    ParserError { source: parser::Error },
    #[snafu(display("Failed to write the result file"))]
    WriterError { source: writer::Error },
    #[snafu(display("Failed to generate a sudoku puzzle"))]
    SudokuError { source: sudoku::Error },
    #[snafu(display("Failed to parse '{}' as a clue count", raw))]
    MalformedClueCount {
        raw: String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("Required argument does not exist\n\n{}", usage_string()))]
    MissingArgument,
}

fn check_path<T: Solver>(path: &Path) -> Result<(), Error> {
    let formula = parse_file(path).context(ParserError)?;

    let start = Instant::now();
    let result = T::new(formula).solve();
    let elapsed = start.elapsed();

    match &result {
        Some(model) => println!("SAT {}", model),
        None => println!("UNSAT"),
    }
    println!("solved in {:.3} ms", elapsed.as_secs_f64() * 1000.0);

    let res_path = writer::write_res_file(path, result.as_ref(), elapsed).context(WriterError)?;
    println!("result saved to {}", res_path.display());

    Ok(())
}

fn dispatch_command<T: Solver>(args: Vec<String>) -> Result<(), Error> {
    match args.get(0).map(|s| s.as_str()) {
        Some("check") => {
            let path = args.get(1).context(MissingArgument)?;
            check_path::<T>(path.as_ref())?;
        }
        Some(name) => UnknownCommand {
            name: name.to_owned(),
        }
        .fail()?,
        None => MissingArgument.fail()?,
    }

    Ok(())
}

fn generate_sudoku(args: Vec<String>) -> Result<(), Error> {
    let raw = args.get(0).context(MissingArgument)?;
    let clues = raw.parse::<usize>().context(MalformedClueCount {
        raw: raw.to_owned(),
    })?;

    let generated = sudoku::generate(clues).context(SudokuError)?;

    println!("Puzzle ({} clues):", generated.puzzle.clue_count());
    println!("{}", generated.puzzle);
    println!("Solution:");
    println!("{}", generated.solution);

    Ok(())
}

fn init_logger() {
    let mut builder = formatted_builder();

    if let Ok(s) = ::std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else {
        if cfg!(debug_assertions) {
            builder.parse_filters("sudosat=debug");
        } else {
            builder.parse_filters("sudosat=warn");
        }
    }

    builder.try_init().expect("Failed to initialize the logger");
}

fn main() -> Result<(), Report> {
    init_logger();

    let mut args = args();

    // drop arg[0]
    args.next();

    // solver name
    let solver_name = args.next();
    let remaining: Vec<_> = args.collect();

    match solver_name.as_deref() {
        Some("dpll") => dispatch_command::<DpllSolver>(remaining)?,
        Some("portfolio") => dispatch_command::<PortfolioSolver>(remaining)?,
        Some("sudoku") => generate_sudoku(remaining)?,
        Some(name) => UnknownSolver {
            name: name.to_owned(),
        }
        .fail()?,
        None => {
            println!("{}", usage_string());
        }
    }

    Ok(())
}
