use solver::{Heuristic, SearchOptions};

pub struct Config {
    /// CNF input file; read standard input when absent.
    pub input: Option<String>,
    /// Solution output file.
    pub out_file: Option<String>,
    /// Print the solution as `v <literal>` lines.
    pub sol_cnf: bool,
    /// Exit nonzero when no assignment was found.
    pub status: bool,
    pub heuristic: Heuristic,
    pub options: SearchOptions,
}
