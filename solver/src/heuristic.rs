use rand::rngs::StdRng;

use crate::cnf::VarId;
use crate::noise::{NoiseLevel, DENOMINATOR, ONE_PERCENT};
use crate::state::{rand_mod, SearchState};

/// Larger than any possible break or make value.
const BIG: i64 = 1_000_000_000;
/// How often the tabu pick redraws an unsat clause before falling back.
const MAX_ATTEMPT: usize = 10;

/// The variable-selection strategies. Every one of them draws an
/// unsatisfied clause uniformly at random and then picks one of its
/// variables; they differ in how greedy that second step is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    /// A uniform variable of the clause.
    Random,
    /// Minimal break count, with walk-probability noise (WalkSAT/SKC).
    Best,
    /// Minimal `break - make` score, noise applied regardless of score.
    Gsat,
    /// Like `Best`, but variables flipped within the last `length` flips
    /// are avoided.
    Tabu { length: i64 },
    /// Novelty: best `make - break` unless it is also the youngest.
    Novelty { plus: bool },
    /// R-novelty: novelty with the score gap steering the noise cases.
    RNovelty { plus: bool },
    /// Strict alternation of walk and greedy phases of fixed lengths.
    Alternate { walk_length: i64, greedy_length: i64 },
    /// Phase lengths as in `Alternate`, phase chosen by a Bernoulli trial.
    BigFlip { walk_length: i64, greedy_length: i64 },
}

impl Heuristic {
    /// Whether make counts have to be maintained across flips for this
    /// heuristic to work.
    pub fn requires_make_count(&self) -> bool {
        matches!(
            self,
            Heuristic::Gsat | Heuristic::Novelty { .. } | Heuristic::RNovelty { .. }
        )
    }
}

/// Selection state that survives across flips of one try: the phase
/// bookkeeping of the alternating heuristics plus scratch buffers sized
/// once by the longest clause.
pub(crate) struct VariablePicker {
    heuristic: Heuristic,
    nofreebie: bool,
    best: Vec<VarId>,
    best_tabu: Vec<VarId>,
    any: Vec<VarId>,
    greedy_phase: bool,
    run_remaining: i64,
}

impl VariablePicker {
    pub(crate) fn new(heuristic: Heuristic, nofreebie: bool, longest_clause: usize) -> Self {
        VariablePicker {
            heuristic,
            nofreebie,
            best: Vec::with_capacity(longest_clause),
            best_tabu: Vec::with_capacity(longest_clause),
            any: Vec::with_capacity(longest_clause),
            greedy_phase: false,
            run_remaining: 0,
        }
    }

    /// Forget phase state from the previous try.
    pub(crate) fn reset(&mut self) {
        self.greedy_phase = false;
        self.run_remaining = 0;
    }

    pub(crate) fn pick(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
    ) -> VarId {
        match self.heuristic {
            Heuristic::Random => self.pick_random(state, rng),
            Heuristic::Best => self.pick_best(state, noise, rng),
            Heuristic::Gsat => self.pick_gsat(state, noise, rng),
            Heuristic::Tabu { length } => self.pick_tabu(state, noise, rng, length),
            Heuristic::Novelty { plus } => self.pick_novelty(state, noise, rng, plus),
            Heuristic::RNovelty { plus } => self.pick_rnovelty(state, noise, rng, plus),
            Heuristic::Alternate {
                walk_length,
                greedy_length,
            } => self.pick_alternate(state, noise, rng, walk_length, greedy_length),
            Heuristic::BigFlip {
                walk_length,
                greedy_length,
            } => self.pick_bigflip(state, noise, rng, walk_length, greedy_length),
        }
    }

    /// Fills `self.best` with the variables tying for minimal break count
    /// and returns that minimum.
    fn collect_min_break(&mut self, state: &SearchState, clause: usize) -> i64 {
        self.best.clear();
        let mut best_value = BIG;
        for lit in state.clause(clause) {
            let breaks = state.break_count(lit.id);
            if breaks <= best_value {
                if breaks < best_value {
                    self.best.clear();
                }
                best_value = breaks;
                self.best.push(lit.id);
            }
        }
        best_value
    }

    fn pick_random(&mut self, state: &SearchState, rng: &mut StdRng) -> VarId {
        let clause = state.random_unsat_clause(rng);
        let lits = state.clause(clause);
        lits[rand_mod(rng, lits.len())].id
    }

    fn pick_best(&mut self, state: &SearchState, noise: &NoiseLevel, rng: &mut StdRng) -> VarId {
        let clause = state.random_unsat_clause(rng);
        let best_value = self.collect_min_break(state, clause);

        // A zero-break pick inside the clause is free; only walk when
        // there is none (or the freebie rule is off).
        if (self.nofreebie || best_value > 0)
            && (rand_mod(rng, DENOMINATOR as usize) as i64) < noise.numerator
        {
            let lits = state.clause(clause);
            return lits[rand_mod(rng, lits.len())].id;
        }
        self.best[rand_mod(rng, self.best.len())]
    }

    fn pick_gsat(&mut self, state: &SearchState, noise: &NoiseLevel, rng: &mut StdRng) -> VarId {
        let clause = state.random_unsat_clause(rng);

        self.best.clear();
        let mut best_value = BIG;
        for lit in state.clause(clause) {
            let delta = state.break_count(lit.id) - state.make_count(lit.id);
            if delta <= best_value {
                if delta < best_value {
                    self.best.clear();
                }
                best_value = delta;
                self.best.push(lit.id);
            }
        }

        if (rand_mod(rng, DENOMINATOR as usize) as i64) < noise.numerator {
            let lits = state.clause(clause);
            return lits[rand_mod(rng, lits.len())].id;
        }
        self.best[rand_mod(rng, self.best.len())]
    }

    fn pick_tabu(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
        length: i64,
    ) -> VarId {
        for attempt in 0..MAX_ATTEMPT {
            let clause = state.random_unsat_clause(rng);
            let lits = state.clause(clause);

            self.best.clear();
            self.best_tabu.clear();
            self.any.clear();
            let mut best_value = BIG;
            let mut best_tabu_value = BIG;

            for lit in lits {
                let var = lit.id;
                let breaks = state.break_count(var);
                let non_tabu = length < state.num_flips() - state.last_flip(var);

                if breaks <= best_tabu_value && non_tabu {
                    if breaks < best_tabu_value {
                        self.best_tabu.clear();
                    }
                    best_tabu_value = breaks;
                    self.best_tabu.push(var);
                }
                if breaks <= best_value {
                    if breaks < best_value {
                        self.best.clear();
                    }
                    best_value = breaks;
                    self.best.push(var);
                }
                if non_tabu {
                    self.any.push(var);
                }
            }

            // Freebie picks ignore the tabu list if they have to.
            if best_value == 0 && !self.nofreebie {
                if !self.best_tabu.is_empty() {
                    return self.best_tabu[rand_mod(rng, self.best_tabu.len())];
                }
                return self.best[rand_mod(rng, self.best.len())];
            }

            if noise.numerator > 0
                && (rand_mod(rng, DENOMINATOR as usize) as i64) < noise.numerator
            {
                // Walk step among the non-tabu variables.
                if !self.any.is_empty() {
                    return self.any[rand_mod(rng, self.any.len())];
                }
                if attempt == MAX_ATTEMPT - 1 {
                    return lits[rand_mod(rng, lits.len())].id;
                }
            } else {
                // Greedy step.
                if !self.best_tabu.is_empty() {
                    return self.best_tabu[rand_mod(rng, self.best_tabu.len())];
                }
                if attempt == MAX_ATTEMPT - 1 {
                    return self.best[rand_mod(rng, self.best.len())];
                }
            }
        }
        unreachable!("tabu pick fell through every attempt");
    }

    /* References for the novelty family:

       novelty and r-novelty:
       Evidence for Invariants in Local Search. David McAllester, Bart
       Selman, and Henry Kautz.

       novelty+ and r-novelty+:
       On the Run-time Behaviour of Stochastic Local Search Algorithms
       for SAT. Holger H. Hoos.
    */

    fn pick_novelty(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
        plus: bool,
    ) -> VarId {
        let clause = state.random_unsat_clause(rng);
        let lits = state.clause(clause);

        if lits.len() == 1 {
            return lits[0].id;
        }
        if random_dip(state, rng, plus) {
            return lits[rand_mod(rng, lits.len())].id;
        }

        let scan = NoveltyScan::over(state, clause);
        if scan.best != scan.youngest {
            return scan.best;
        }
        if (rand_mod(rng, DENOMINATOR as usize) as i64) <= noise.numerator {
            return scan.second_best;
        }
        scan.best
    }

    fn pick_rnovelty(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
        plus: bool,
    ) -> VarId {
        let clause = state.random_unsat_clause(rng);
        let lits = state.clause(clause);

        if lits.len() == 1 {
            return lits[0].id;
        }
        if random_dip(state, rng, plus) {
            return lits[rand_mod(rng, lits.len())].id;
        }

        let scan = NoveltyScan::over(state, clause);
        if scan.best != scan.youngest {
            return scan.best;
        }

        // The best is youngest, so the runner-up is strictly worse.
        let gap = scan.best_diff - scan.second_best_diff;
        if gap <= 0 {
            panic!(
                "r-novelty scoring broke down: gap {} between {} and {}",
                gap, scan.best, scan.second_best
            );
        }

        // (1) p < 0.5, gap > 1: keep the best.
        if noise.numerator * 2 < DENOMINATOR && gap > 1 {
            return scan.best;
        }
        // (2) p < 0.5, gap = 1: second best with probability 2p.
        if noise.numerator * 2 < DENOMINATOR && gap == 1 {
            if (rand_mod(rng, DENOMINATOR as usize) as i64) < 2 * noise.numerator {
                return scan.second_best;
            }
            return scan.best;
        }
        // (3) p >= 0.5, gap = 1: always the second best.
        if gap == 1 {
            return scan.second_best;
        }
        // (4) p >= 0.5, gap > 1: second best with probability 2(p - 0.5).
        if (rand_mod(rng, DENOMINATOR as usize) as i64)
            < 2 * (noise.numerator - DENOMINATOR / 2)
        {
            return scan.second_best;
        }
        scan.best
    }

    fn pick_alternate(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
        walk_length: i64,
        greedy_length: i64,
    ) -> VarId {
        if self.run_remaining == 0 {
            self.greedy_phase = !self.greedy_phase;
            self.run_remaining = if self.greedy_phase {
                greedy_length
            } else {
                walk_length
            };
        }

        let clause = state.random_unsat_clause(rng);
        let best_value = self.collect_min_break(state, clause);
        self.run_remaining -= 1;

        if (self.nofreebie || best_value > 0) && !self.greedy_phase {
            let lits = state.clause(clause);
            return lits[rand_mod(rng, lits.len())].id;
        }
        if best_value > 0
            && noise.numerator > 0
            && (rand_mod(rng, DENOMINATOR as usize) as i64) <= noise.numerator
        {
            let lits = state.clause(clause);
            return lits[rand_mod(rng, lits.len())].id;
        }
        self.best[rand_mod(rng, self.best.len())]
    }

    fn pick_bigflip(
        &mut self,
        state: &SearchState,
        noise: &NoiseLevel,
        rng: &mut StdRng,
        walk_length: i64,
        greedy_length: i64,
    ) -> VarId {
        if self.run_remaining == 0 {
            if (rand_mod(rng, DENOMINATOR as usize) as i64) < noise.numerator {
                self.greedy_phase = false;
                self.run_remaining = walk_length;
            } else {
                self.greedy_phase = true;
                self.run_remaining = greedy_length;
            }
        }

        let clause = state.random_unsat_clause(rng);
        let best_value = self.collect_min_break(state, clause);
        self.run_remaining -= 1;

        if (self.nofreebie || best_value > 0) && !self.greedy_phase {
            let lits = state.clause(clause);
            return lits[rand_mod(rng, lits.len())].id;
        }
        self.best[rand_mod(rng, self.best.len())]
    }
}

/// Occasional unconditional random pick of the novelty family: with
/// probability one percent under the `plus` variants, on every hundredth
/// flip otherwise.
fn random_dip(state: &SearchState, rng: &mut StdRng, plus: bool) -> bool {
    if plus {
        (rand_mod(rng, DENOMINATOR as usize) as i64) <= ONE_PERCENT
    } else {
        state.num_flips() % 100 == 0
    }
}

/// Best and second-best `make - break` scores of a clause, ties broken
/// towards the longest-unflipped variable, plus the most recently flipped
/// one. The sentinels guarantee that the first candidate seen becomes the
/// best and the next distinct loser the second best.
struct NoveltyScan {
    youngest: VarId,
    best: VarId,
    second_best: VarId,
    best_diff: i64,
    second_best_diff: i64,
}

impl NoveltyScan {
    fn over(state: &SearchState, clause: usize) -> NoveltyScan {
        let mut scan = NoveltyScan {
            youngest: 0,
            best: 0,
            second_best: 0,
            best_diff: -BIG,
            second_best_diff: -BIG,
        };
        let mut youngest_age = -BIG;

        for lit in state.clause(clause) {
            let var = lit.id;
            let diff = state.make_count(var) - state.break_count(var);
            let age = state.last_flip(var);

            if age > youngest_age {
                youngest_age = age;
                scan.youngest = var;
            }
            if diff > scan.best_diff
                || (diff == scan.best_diff && state.last_flip(var) < state.last_flip(scan.best))
            {
                scan.second_best = scan.best;
                scan.second_best_diff = scan.best_diff;
                scan.best = var;
                scan.best_diff = diff;
            } else if diff > scan.second_best_diff
                || (diff == scan.second_best_diff
                    && state.last_flip(var) < state.last_flip(scan.second_best))
            {
                scan.second_best = var;
                scan.second_best_diff = diff;
            }
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::{CNFClause, CNFVar, CNF};
    use crate::problem::Problem;
    use rand::SeedableRng;

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

    fn prepared(clauses: &[&[i32]], init: &[i32], track_make: bool) -> SearchState {
        let problem = Problem::new(&formula(clauses)).unwrap();
        let mut state = SearchState::new(problem, track_make, false);
        let mut rng = StdRng::seed_from_u64(0);
        let lits: Vec<CNFVar> = init
            .iter()
            .map(|&l| CNFVar::new(l.abs() as usize, l > 0))
            .collect();
        state.initialize(&mut rng, Some(&lits)).unwrap();
        state
    }

    #[test]
    fn best_returns_minimal_break_variable() {
        // All-false start: {1, 2} unsat, {-3, 1} satisfied solely by -3,
        // {-3, 2} likewise, so flipping 3 breaks two clauses while 1 and
        // 2 break nothing.
        let state = prepared(&[&[1, 2], &[-3, 1], &[-3, 2], &[3, 1, 2]], &[-1, -2, -3], false);
        let mut picker = VariablePicker::new(Heuristic::Best, false, 3);
        let noise = NoiseLevel::from_probability(0.0);
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..20 {
            let var = picker.pick(&state, &noise, &mut rng);
            assert!(var == 1 || var == 2, "picked break-heavy variable {}", var);
        }
    }

    #[test]
    fn novelty_short_circuits_singleton_clause() {
        let state = prepared(&[&[1]], &[-1], true);
        let mut picker = VariablePicker::new(Heuristic::Novelty { plus: false }, false, 1);
        let noise = NoiseLevel::from_probability(0.5);
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(picker.pick(&state, &noise, &mut rng), 1);
    }

    #[test]
    fn tabu_honors_recent_flips() {
        // One unsat clause over three break-free variables; the freebie
        // shortcut is disabled so the tabu list gets the final word.
        let mut state = prepared(&[&[1, 2, 3]], &[-1, -2, -3], false);
        let mut picker = VariablePicker::new(Heuristic::Tabu { length: 3 }, true, 3);
        let noise = NoiseLevel::from_probability(0.0);
        let mut rng = StdRng::seed_from_u64(3);

        // Flip variable 1 out and back: the clause stays unsat and the
        // variable carries the stamp of flip 2.
        state.start_flip();
        state.flip(1);
        state.start_flip();
        state.flip(1);

        // Flips 3, 4 and 5 fall inside the tabu window of variable 1.
        for _ in 0..3 {
            state.start_flip();
            for _ in 0..10 {
                let var = picker.pick(&state, &noise, &mut rng);
                assert_ne!(var, 1, "tabu variable selected during its window");
            }
        }

        // One step later the window has passed.
        state.start_flip();
        let selectable = (0..50)
            .map(|_| picker.pick(&state, &noise, &mut rng))
            .any(|var| var == 1);
        assert!(selectable, "variable stayed tabu after its window");
    }

    #[test]
    fn alternate_phases_have_exact_lengths() {
        let state = prepared(&[&[1, 2], &[-3, 1]], &[-1, -2, 3], false);
        let mut picker = VariablePicker::new(
            Heuristic::Alternate {
                walk_length: 2,
                greedy_length: 1,
            },
            false,
            3,
        );
        let noise = NoiseLevel::from_probability(0.0);
        let mut rng = StdRng::seed_from_u64(4);

        // First call toggles out of the initial greedy=false state.
        picker.pick(&state, &noise, &mut rng);
        assert!(picker.greedy_phase);
        assert_eq!(picker.run_remaining, 0);

        picker.pick(&state, &noise, &mut rng);
        assert!(!picker.greedy_phase);
        assert_eq!(picker.run_remaining, 1);
    }
}
