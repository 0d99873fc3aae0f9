/// The CNF representation of a formula
pub mod cnf;
/// Typed errors for formula and assignment input
mod error;
/// CNF instance generators: n-queens and fixed-length random k-SAT
pub mod generate;
/// Variable-selection heuristics one can choose from to customize the
/// [`WalkSatSolver`].
mod heuristic;
/// Walk probability and its adaptive adjustment
mod noise;
/// The packed problem store shared by every try
mod problem;
/// Module that specifies the output of a solver
mod sat_solution;
/// The Solver trait which has to be implemented by each solver
pub mod sat_solver;
/// Derived search state and the incremental flip engine
mod state;
/// The try/restart driver
mod walksat;

pub use cnf::{parse_literals, CNFClause, CNFVar, VarId, CNF};
pub use error::InputError;
pub use heuristic::Heuristic;
pub use noise::{AdaptiveNoise, NoiseLevel, DENOMINATOR};
pub use problem::{ClauseId, Problem};
pub use sat_solution::{SATSolution, Valuation};
pub use sat_solver::Solver;
pub use state::SearchState;
pub use walksat::{super_luby, SearchOptions, SearchOutcome, TryStatistics, WalkSatSolver};
