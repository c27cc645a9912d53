/*!
Error-handling imports shared across the crate.
*/

pub use snafu::{ensure, OptionExt, ResultExt, Snafu};
