/*!
Result (`.res`) file writer.
*/

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::formula::{Literal, Model, Variable};
use crate::prelude::*;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("I/O error occurred while writing result file '{}'", path.display()))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes the solve outcome next to `cnf_path`, replacing its extension
/// with `.res`, and returns the path written to.
///
/// The file holds three lines: `s 1` or `s 0`, a `v` line listing the full
/// assignment as signed literals (empty on UNSAT), and `t <milliseconds>`.
pub fn write_res_file(
    cnf_path: impl AsRef<Path>,
    model: Option<&Model>,
    elapsed: Duration,
) -> Result<PathBuf, Error> {
    let path = cnf_path.as_ref().with_extension("res");
    let file = File::create(&path).context(IoError { path: path.clone() })?;

    let mut out = BufWriter::new(file);
    write_result(&mut out, model, elapsed).context(IoError { path: path.clone() })?;
    out.flush().context(IoError { path: path.clone() })?;

    Ok(path)
}

/// Writes the three-line result record to `out`.
pub fn write_result(
    out: &mut impl Write,
    model: Option<&Model>,
    elapsed: Duration,
) -> io::Result<()> {
    writeln!(out, "s {}", if model.is_some() { 1 } else { 0 })?;

    write!(out, "v")?;
    if let Some(model) = model {
        for (index, &value) in model.assignment().iter().enumerate() {
            let literal = Literal::new(Variable::from_index(index).unwrap(), value);
            write!(out, " {}", literal.to_dimacs())?;
        }
    }
    writeln!(out)?;

    writeln!(out, "t {:.3}", elapsed.as_secs_f64() * 1000.0)?;

    Ok(())
}
