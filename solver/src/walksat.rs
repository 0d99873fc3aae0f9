use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cnf::{CNFVar, CNF};
use crate::error::InputError;
use crate::heuristic::{Heuristic, VariablePicker};
use crate::noise::{AdaptiveNoise, NoiseLevel, DENOMINATOR};
use crate::problem::{ClauseId, Problem};
use crate::sat_solution::{SATSolution, Valuation};
use crate::sat_solver::Solver;
use crate::state::{rand_mod, SearchState};

/// Everything configurable about a run besides the heuristic itself.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Seed for the single pseudo-random generator; equal seeds replay
    /// identical searches.
    pub seed: u64,
    /// Flip budget per try.
    pub cutoff: i64,
    /// Number of tries before giving up.
    pub tries: usize,
    /// Stop after this many successful tries.
    pub max_solutions: usize,
    /// A try succeeds once at most this many clauses are false.
    pub target: usize,
    /// Scale the cutoff by the Luby series across tries.
    pub superlinear: bool,
    /// Probability of a noisy step where the heuristic takes one.
    pub walk_probability: f64,
    /// Disable the zero-break shortcut inside the clause.
    pub nofreebie: bool,
    /// Flip a variable off the freebie list before consulting the
    /// heuristic whenever the list is non-empty.
    pub maxfreebie: bool,
    /// Probability of skipping the freebie preemption.
    pub freebie_noise: f64,
    /// Adaptive noise parameters `(phi, theta)`.
    pub adaptive: Option<(f64, f64)>,
    /// Literals fixing part of the initial assignment of every try.
    pub init_assignment: Option<Vec<CNFVar>>,
}

impl Default for SearchOptions {
    fn default() -> SearchOptions {
        SearchOptions {
            seed: 0,
            cutoff: 100_000,
            tries: 10,
            max_solutions: usize::max_value(),
            target: 0,
            superlinear: false,
            walk_probability: 0.5,
            nofreebie: false,
            maxfreebie: false,
            freebie_noise: 0.0,
            adaptive: None,
            init_assignment: None,
        }
    }
}

/// Course of a single try.
#[derive(Debug, Clone)]
pub struct TryStatistics {
    pub flips: i64,
    pub lowest_false: usize,
    pub final_false: usize,
    pub success: bool,
}

/// Everything a finished run reports back.
pub struct SearchOutcome {
    pub solution: SATSolution,
    pub tries: Vec<TryStatistics>,
    pub total_flips: i64,
    pub successes: usize,
    /// Assignment at the lowest objective seen over the whole run.
    pub low_assignment: Valuation,
    /// The clauses still false at that point.
    pub low_unsat: Vec<ClauseId>,
}

/// WalkSAT-style solver: repeated random initialization followed by a
/// budgeted run of single-variable flips chosen by the configured
/// heuristic.
pub struct WalkSatSolver {
    heuristic: Heuristic,
    options: SearchOptions,
}

impl WalkSatSolver {
    pub fn new(heuristic: Heuristic, options: SearchOptions) -> WalkSatSolver {
        WalkSatSolver { heuristic, options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Runs the full try/restart schedule. The abort flag is polled at
    /// try boundaries; setting it finishes the current try and returns
    /// what has been found so far.
    pub fn run(&self, formula: &CNF, abort: &AtomicBool) -> Result<SearchOutcome, InputError> {
        let options = &self.options;
        let problem = Problem::new(formula)?;
        let num_clauses = problem.num_clauses();
        let longest_clause = problem.longest_clause();

        let track_make = self.heuristic.requires_make_count() || options.maxfreebie;
        let mut state = SearchState::new(problem, track_make, options.maxfreebie);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut noise = NoiseLevel::from_probability(options.walk_probability);
        let mut adaptive = options
            .adaptive
            .map(|(phi, theta)| AdaptiveNoise::new(phi, theta));
        let mut picker = VariablePicker::new(self.heuristic, options.nofreebie, longest_clause);
        let freebie_noise = (options.freebie_noise * DENOMINATOR as f64) as i64;
        let init = options.init_assignment.as_deref();

        let num_solutions = options.max_solutions.min(options.tries);
        let mut tries = Vec::with_capacity(options.tries);
        let mut total_flips = 0;
        let mut successes = 0;
        let mut solution = None;
        let mut low_false = usize::max_value();
        let mut low_assignment = Vec::new();
        let mut low_unsat = Vec::new();

        let mut try_index = 0;
        while !abort.load(Ordering::Relaxed)
            && successes < num_solutions
            && try_index < options.tries
        {
            try_index += 1;
            picker.reset();
            if let Some(adaptive) = adaptive.as_mut() {
                adaptive.start_try(num_clauses, &mut noise);
            }
            state.initialize(&mut rng, init)?;

            let cutoff = if options.superlinear {
                options.cutoff * super_luby(try_index as i64)
            } else {
                options.cutoff
            };

            let mut lowest = state.num_false();
            if lowest < low_false {
                low_false = lowest;
                low_assignment = state.valuation();
                low_unsat = state.unsat_clauses().to_vec();
            }

            while state.num_false() > options.target && state.num_flips() < cutoff {
                state.start_flip();

                let var = if options.maxfreebie
                    && !state.freebie_list().is_empty()
                    && (freebie_noise == 0
                        || (rand_mod(&mut rng, DENOMINATOR as usize) as i64) > freebie_noise)
                {
                    let freebies = state.freebie_list();
                    freebies[rand_mod(&mut rng, freebies.len())]
                } else {
                    picker.pick(&state, &noise, &mut rng)
                };

                state.flip(var);

                if let Some(adaptive) = adaptive.as_mut() {
                    adaptive.after_flip(state.num_false(), num_clauses, &mut noise);
                }

                if state.num_false() < lowest {
                    lowest = state.num_false();
                    if lowest < low_false {
                        low_false = lowest;
                        low_assignment = state.valuation();
                        low_unsat = state.unsat_clauses().to_vec();
                    }
                }
            }

            let final_false = state.num_false();
            let success = final_false <= options.target;
            if success {
                if final_false == 0 && state.count_unsat_naive() != 0 {
                    panic!("verification of a reported solution failed");
                }
                successes += 1;
                solution = Some(state.valuation());
            }
            total_flips += state.num_flips();
            debug!(
                "try {}: {} false after {} flips (lowest {})",
                try_index,
                final_false,
                state.num_flips(),
                lowest
            );
            tries.push(TryStatistics {
                flips: state.num_flips(),
                lowest_false: lowest,
                final_false,
                success,
            });
        }

        Ok(SearchOutcome {
            solution: match solution {
                Some(valuation) => SATSolution::Satisfiable(valuation),
                None => SATSolution::Unknown,
            },
            tries,
            total_flips,
            successes,
            low_assignment,
            low_unsat,
        })
    }
}

impl Solver for WalkSatSolver {
    fn solve(&self, formula: &CNF) -> SATSolution {
        let abort = AtomicBool::new(false);
        match self.run(formula, &abort) {
            Ok(outcome) => outcome.solution,
            Err(_) => SATSolution::Unknown,
        }
    }
}

/// The Luby series 1, 1, 2, 1, 1, 2, 4, 1, 1, 2, ... used to stretch the
/// cutoff across tries.
pub fn super_luby(i: i64) -> i64 {
    assert!(i > 0, "bad try index {}", i);

    // Let 2^k be the least power of 2 >= i + 1.
    let mut power: i64 = 2;
    while power < i + 1 {
        power *= 2;
    }
    if power == i + 1 {
        power / 2
    } else {
        super_luby(i - power / 2 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::CNFClause;

    fn formula(clauses: &[&[i32]]) -> CNF {
        clauses
            .iter()
            .map(|clause| {
                clause
                    .iter()
                    .map(|&lit| CNFVar::new(lit.abs() as usize, lit > 0))
                    .collect::<CNFClause>()
            })
            .collect()
    }

    #[test]
    fn luby_series_prefix() {
        let prefix: Vec<i64> = (1..=14).map(super_luby).collect();
        assert_eq!(prefix, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4]);
    }

    #[test]
    fn identical_seeds_replay_identically() {
        let cnf = formula(&[&[1, 2, -3], &[-1, 3], &[2, 3], &[-2, -3], &[1, -2]]);
        let options = SearchOptions {
            seed: 42,
            cutoff: 500,
            tries: 3,
            ..SearchOptions::default()
        };
        let solver = WalkSatSolver::new(Heuristic::Best, options);
        let abort = AtomicBool::new(false);

        let first = solver.run(&cnf, &abort).unwrap();
        let second = solver.run(&cnf, &abort).unwrap();

        assert_eq!(first.total_flips, second.total_flips);
        assert_eq!(first.successes, second.successes);
        assert_eq!(
            first.tries.iter().map(|t| t.flips).collect::<Vec<_>>(),
            second.tries.iter().map(|t| t.flips).collect::<Vec<_>>()
        );
        match (first.solution, second.solution) {
            (SATSolution::Satisfiable(a), SATSolution::Satisfiable(b)) => assert_eq!(a, b),
            (SATSolution::Unknown, SATSolution::Unknown) => {}
            _ => panic!("runs with the same seed disagree"),
        }
    }

    #[test]
    fn unsatisfiable_pair_exhausts_cutoff() {
        let cnf = formula(&[&[1], &[-1]]);
        let options = SearchOptions {
            cutoff: 100,
            tries: 5,
            ..SearchOptions::default()
        };
        let solver = WalkSatSolver::new(Heuristic::Best, options);
        let abort = AtomicBool::new(false);
        let outcome = solver.run(&cnf, &abort).unwrap();

        assert!(outcome.solution.is_unknown());
        assert_eq!(outcome.successes, 0);
        assert_eq!(outcome.tries.len(), 5);
        for t in &outcome.tries {
            assert_eq!(t.flips, 100);
            // One of the two unit clauses is always false.
            assert_eq!(t.final_false, 1);
            assert_eq!(t.lowest_false, 1);
        }
        assert_eq!(outcome.low_unsat.len(), 1);
        assert_eq!(outcome.low_assignment.len(), 1);
    }

    #[test]
    fn abort_flag_stops_before_next_try() {
        let cnf = formula(&[&[1], &[-1]]);
        let options = SearchOptions {
            cutoff: 10,
            tries: 1000,
            ..SearchOptions::default()
        };
        let solver = WalkSatSolver::new(Heuristic::Best, options);
        let abort = AtomicBool::new(true);
        let outcome = solver.run(&cnf, &abort).unwrap();
        assert!(outcome.tries.is_empty());
    }
}
