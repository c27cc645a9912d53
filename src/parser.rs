/*!
DIMACS CNF reader.
*/

use std::{
    fs,
    mem,
    path::{Path, PathBuf},
};

use crate::formula::{Clause, Cnf, Literal, VariableParseError};
use crate::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("I/O error occurred while parsing CNF file '{}'", path.display()))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse '{}' as a literal", token))]
    MalformedLiteral {
        token: String,
        source: VariableParseError,
    },
    #[snafu(display(
        "Literal '{}' is out of range (the problem line declares {} variables)",
        token,
        num_variables,
    ))]
    LiteralOutOfRange { token: String, num_variables: usize },
    #[snafu(display("Problem line 'p cnf <num_variables> <num_clauses>' is not found"))]
    MalformedProblemDefinition,
    #[snafu(display("The final clause is not terminated with 0"))]
    UnterminatedClause,
    #[snafu(display(
        "The number of clauses ({}) does not match the clauses number in the problem definition ({})",
        found,
        expected,
    ))]
    ClauseCountMismatch { expected: usize, found: usize },
}

/// Parses a CNF formula in DIMACS format.
///
/// Comment lines start with `c`; the problem line `p cnf <n> <m>` precedes
/// the clauses. Each clause is a run of whitespace-separated signed integers
/// terminated by `0` and may span multiple lines.
pub fn parse_str(input: &str) -> Result<Cnf, Error> {
    // skip until we find the problem definition
    let mut lines = input
        .lines()
        .skip_while(|line| !line.trim_start().starts_with('p'));

    let prob_line = lines
        .next()
        .ok_or_else(|| MalformedProblemDefinition.build())?;

    let fields = prob_line.split_whitespace().collect::<Vec<_>>();

    // We only support CNF DIMACS format
    ensure!(
        fields.len() == 4 && fields[0] == "p" && fields[1] == "cnf",
        MalformedProblemDefinition
    );

    let (num_variables, num_clauses) =
        match (fields[2].parse::<usize>(), fields[3].parse::<usize>()) {
            (Ok(num_variables), Ok(num_clauses)) => (num_variables, num_clauses),
            _ => return MalformedProblemDefinition.fail(),
        };

    let mut cnf = Cnf::new(num_variables);
    let mut pending: Vec<Literal> = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            // empty line, comment
            continue;
        }

        for token in trimmed.split_whitespace() {
            if token == "0" {
                cnf.add_clause(Clause::new(mem::replace(&mut pending, Vec::new())));
                continue;
            }

            let literal = token.parse::<Literal>().with_context(|| MalformedLiteral {
                token: token.to_owned(),
            })?;
            ensure!(
                literal.index() < num_variables,
                LiteralOutOfRange {
                    token: token.to_owned(),
                    num_variables,
                }
            );
            pending.push(literal);
        }
    }

    ensure!(pending.is_empty(), UnterminatedClause);

    ensure!(
        cnf.clauses().len() + cnf.empty_clause_count() == num_clauses,
        ClauseCountMismatch {
            found: cnf.clauses().len() + cnf.empty_clause_count(),
            expected: num_clauses,
        }
    );

    Ok(cnf)
}

/// Parses CNF formula from a file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Cnf, Error> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).context(IoError {
        path: path.to_owned(),
    })?;

    parse_str(&input)
}
