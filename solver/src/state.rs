use rand::rngs::StdRng;
use rand::Rng;

use crate::cnf::{CNFVar, VarId};
use crate::error::InputError;
use crate::problem::{ClauseId, Problem};

/// Sentinel for "not on the list" in the packed-list reverse indices.
pub(crate) const ABSENT: usize = usize::MAX;

/// Uniform draw from `0..n`, returning 0 whenever there is nothing to
/// choose from. Single entry point for all randomness in the search.
#[inline]
pub(crate) fn rand_mod(rng: &mut StdRng, n: usize) -> usize {
    if n > 1 {
        rng.gen_range(0, n)
    } else {
        0
    }
}

/// All state derived from the current assignment, kept consistent across
/// flips in time proportional to the occurrence lists of the flipped
/// variable. Rebuilt from scratch by [`SearchState::initialize`] at every
/// try.
pub struct SearchState {
    pub(crate) problem: Problem,
    pub(crate) num_flips: i64,

    /// Truth value per variable; slot 0 unused.
    assignment: Vec<bool>,
    /// Number of satisfied literals per clause.
    true_lit_count: Vec<usize>,
    /// Packed list of unsatisfied clauses plus reverse index.
    unsat: Vec<ClauseId>,
    where_unsat: Vec<usize>,
    /// Satisfied clauses each variable solely supports.
    break_count: Vec<i64>,
    /// Unsatisfied clauses each variable would satisfy.
    make_count: Vec<i64>,
    /// Flip index at which each variable was last flipped; negative
    /// pseudo-ages before the first flip.
    last_flip: Vec<i64>,
    /// Packed list of variables with zero break and positive make.
    freebie: Vec<VarId>,
    where_freebie: Vec<usize>,

    track_make: bool,
    track_freebie: bool,
}

impl SearchState {
    /// Allocates every buffer up front; nothing grows during search.
    pub fn new(problem: Problem, track_make: bool, track_freebie: bool) -> SearchState {
        let n = problem.num_variables();
        let c = problem.num_clauses();

        SearchState {
            problem,
            num_flips: 0,
            assignment: vec![false; n + 1],
            true_lit_count: vec![0; c],
            unsat: Vec::with_capacity(c),
            where_unsat: vec![ABSENT; c],
            break_count: vec![0; n + 1],
            make_count: vec![0; n + 1],
            last_flip: vec![0; n + 1],
            freebie: Vec::with_capacity(n + 1),
            where_freebie: vec![ABSENT; n + 1],
            track_make,
            track_freebie,
        }
    }

    #[inline]
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Number of currently unsatisfied clauses.
    #[inline]
    pub fn num_false(&self) -> usize {
        self.unsat.len()
    }

    #[inline]
    pub fn num_flips(&self) -> i64 {
        self.num_flips
    }

    #[inline]
    pub fn value(&self, var: VarId) -> bool {
        self.assignment[var]
    }

    /// Current assignment as a 0-based valuation.
    pub fn valuation(&self) -> Vec<bool> {
        self.assignment[1..].to_vec()
    }

    #[inline]
    pub fn break_count(&self, var: VarId) -> i64 {
        self.break_count[var]
    }

    #[inline]
    pub fn make_count(&self, var: VarId) -> i64 {
        self.make_count[var]
    }

    #[inline]
    pub fn last_flip(&self, var: VarId) -> i64 {
        self.last_flip[var]
    }

    #[inline]
    pub fn unsat_clauses(&self) -> &[ClauseId] {
        &self.unsat
    }

    #[inline]
    pub fn freebie_list(&self) -> &[VarId] {
        &self.freebie
    }

    #[inline]
    pub fn clause(&self, c: ClauseId) -> &[CNFVar] {
        self.problem.clause(c)
    }

    /// Uniform choice among the unsatisfied clauses. Must not be called
    /// with an empty unsat list.
    #[inline]
    pub fn random_unsat_clause(&self, rng: &mut StdRng) -> ClauseId {
        self.unsat[rand_mod(rng, self.unsat.len())]
    }

    /// Advances the flip counter; the heuristics observe the index of the
    /// flip being chosen, so this runs before picking.
    #[inline]
    pub fn start_flip(&mut self) -> i64 {
        self.num_flips += 1;
        self.num_flips
    }

    /// Randomizes the assignment, optionally overrides it with the given
    /// literals, and rebuilds every derived structure with one pass over
    /// the formula.
    pub fn initialize(
        &mut self,
        rng: &mut StdRng,
        init: Option<&[CNFVar]>,
    ) -> Result<(), InputError> {
        let n = self.problem.num_variables();

        self.num_flips = 0;
        self.unsat.clear();
        for c in 0..self.problem.num_clauses() {
            self.true_lit_count[c] = 0;
            self.where_unsat[c] = ABSENT;
        }
        for var in 1..=n {
            // Ties in age between unflipped variables are broken by
            // variable number.
            self.last_flip[var] = -(var as i64) - 1000;
            self.break_count[var] = 0;
            self.make_count[var] = 0;
            self.assignment[var] = rand_mod(rng, 2) == 1;
        }

        if let Some(literals) = init {
            for lit in literals {
                if lit.id < 1 || lit.id > n {
                    return Err(InputError::AssignmentOutOfRange {
                        variable: lit.id,
                        num_variables: n,
                    });
                }
                self.assignment[lit.id] = lit.sign;
            }
        }

        for c in 0..self.problem.num_clauses() {
            let mut true_count = 0;
            let mut the_true_lit = 0;
            for (i, lit) in self.problem.clause(c).iter().enumerate() {
                if self.assignment[lit.id] == lit.sign {
                    true_count += 1;
                    the_true_lit = i;
                }
            }
            self.true_lit_count[c] = true_count;
            if true_count == 0 {
                self.where_unsat[c] = self.unsat.len();
                self.unsat.push(c);
                for lit in self.problem.clause(c) {
                    self.make_count[lit.id] += 1;
                }
            } else if true_count == 1 {
                let supporter = self.problem.clause(c)[the_true_lit];
                self.break_count[supporter.id] += 1;
                self.problem.clauses.get_mut(c).swap(0, the_true_lit);
            }
        }

        self.freebie.clear();
        for var in 1..=n {
            self.where_freebie[var] = ABSENT;
        }
        for var in 1..=n {
            if self.make_count[var] > 0 && self.break_count[var] == 0 {
                self.where_freebie[var] = self.freebie.len();
                self.freebie.push(var);
            }
        }

        Ok(())
    }

    /// Toggles `var` and repairs every derived structure, touching only
    /// the clauses that contain `var`.
    pub fn flip(&mut self, var: VarId) {
        debug_assert!(var >= 1 && var <= self.problem.num_variables());

        let SearchState {
            problem,
            num_flips,
            assignment,
            true_lit_count,
            unsat,
            where_unsat,
            break_count,
            make_count,
            last_flip,
            freebie,
            where_freebie,
            track_make,
            track_freebie,
        } = self;
        let Problem {
            clauses,
            occurrences,
            ..
        } = &mut *problem;
        let track_make = *track_make;
        let track_freebie = *track_freebie;

        last_flip[var] = *num_flips;

        let was_true = CNFVar::new(var, assignment[var]);
        let now_true = -was_true;
        assignment[var] = now_true.sign;

        // Clauses that just lost their satisfying literal.
        for &cli in occurrences.of(was_true) {
            true_lit_count[cli] -= 1;

            if true_lit_count[cli] == 0 {
                where_unsat[cli] = unsat.len();
                unsat.push(cli);
                // The flipped variable was the sole supporter.
                break_count[var] -= 1;

                if track_freebie
                    && break_count[var] == 0
                    && make_count[var] > 0
                    && where_freebie[var] == ABSENT
                {
                    push_freebie(freebie, where_freebie, var);
                }

                if track_make {
                    for lit in clauses.get(cli) {
                        make_count[lit.id] += 1;
                        if track_freebie
                            && break_count[lit.id] == 0
                            && where_freebie[lit.id] == ABSENT
                        {
                            push_freebie(freebie, where_freebie, lit.id);
                        }
                    }
                }
            } else if true_lit_count[cli] == 1 {
                // Find the remaining supporter, charge its break count,
                // and move it to the front of the clause.
                let lits = clauses.get_mut(cli);
                let at = lits
                    .iter()
                    .position(|lit| assignment[lit.id] == lit.sign)
                    .expect("singly-satisfied clause has no satisfying literal");
                let supporter = lits[at].id;
                break_count[supporter] += 1;

                if track_freebie && where_freebie[supporter] != ABSENT {
                    drop_freebie(freebie, where_freebie, supporter);
                }

                lits.swap(0, at);
            }
        }

        // Clauses that just gained a satisfying literal.
        for &cli in occurrences.of(now_true) {
            true_lit_count[cli] += 1;

            if true_lit_count[cli] == 1 {
                let at = where_unsat[cli];
                let moved = *unsat.last().expect("unsat list empty during repair");
                unsat[at] = moved;
                where_unsat[moved] = at;
                unsat.pop();
                where_unsat[cli] = ABSENT;

                // The flipped variable is now the sole supporter.
                break_count[var] += 1;

                if track_freebie && where_freebie[var] != ABSENT {
                    drop_freebie(freebie, where_freebie, var);
                }

                if track_make {
                    for lit in clauses.get(cli) {
                        make_count[lit.id] -= 1;
                        if track_freebie
                            && where_freebie[lit.id] != ABSENT
                            && make_count[lit.id] == 0
                        {
                            drop_freebie(freebie, where_freebie, lit.id);
                        }
                    }
                }

                // Keep the supporter in front.
                let lits = clauses.get_mut(cli);
                let at = lits
                    .iter()
                    .position(|lit| lit.id == var)
                    .expect("flipped variable missing from its own clause");
                lits.swap(0, at);
            } else if true_lit_count[cli] == 2 {
                // The other satisfying literal is no longer alone.
                let lits = clauses.get(cli);
                let other = lits
                    .iter()
                    .find(|lit| assignment[lit.id] == lit.sign && lit.id != var)
                    .expect("doubly-satisfied clause has a single satisfying literal")
                    .id;
                break_count[other] -= 1;

                if track_freebie
                    && break_count[other] == 0
                    && make_count[other] > 0
                    && where_freebie[other] == ABSENT
                {
                    push_freebie(freebie, where_freebie, other);
                }
            }
        }
    }

    /// Counts unsatisfied clauses directly from the assignment, ignoring
    /// all incremental bookkeeping.
    pub fn count_unsat_naive(&self) -> usize {
        (0..self.problem.num_clauses())
            .filter(|&c| {
                self.problem
                    .clause(c)
                    .iter()
                    .all(|lit| self.assignment[lit.id] != lit.sign)
            })
            .count()
    }

    /// Recomputes every derived structure from the assignment and panics
    /// on any disagreement with the incremental bookkeeping.
    pub fn check_invariants(&self) {
        use rustc_hash::FxHashSet;

        let n = self.problem.num_variables();
        let c = self.problem.num_clauses();

        let mut expected_break = vec![0i64; n + 1];
        let mut expected_make = vec![0i64; n + 1];
        let mut expected_unsat = FxHashSet::default();

        for clause in 0..c {
            let lits = self.problem.clause(clause);
            let true_lits: Vec<&CNFVar> = lits
                .iter()
                .filter(|lit| self.assignment[lit.id] == lit.sign)
                .collect();

            assert_eq!(
                self.true_lit_count[clause],
                true_lits.len(),
                "true literal count of clause {} is stale",
                clause
            );

            match true_lits.len() {
                0 => {
                    expected_unsat.insert(clause);
                    for lit in lits {
                        expected_make[lit.id] += 1;
                    }
                }
                1 => {
                    expected_break[true_lits[0].id] += 1;
                    assert_eq!(
                        self.assignment[lits[0].id],
                        lits[0].sign,
                        "supporter of clause {} is not in front",
                        clause
                    );
                }
                _ => {}
            }
        }

        let listed: FxHashSet<ClauseId> = self.unsat.iter().cloned().collect();
        assert_eq!(listed, expected_unsat, "unsat list diverges");
        for (at, &clause) in self.unsat.iter().enumerate() {
            assert_eq!(self.where_unsat[clause], at, "unsat reverse index broken");
        }
        for clause in 0..c {
            if !listed.contains(&clause) {
                assert_eq!(
                    self.where_unsat[clause], ABSENT,
                    "clause {} marked present in unsat list",
                    clause
                );
            }
        }

        assert_eq!(self.break_count[1..], expected_break[1..], "break counts diverge");
        if self.track_make {
            assert_eq!(self.make_count[1..], expected_make[1..], "make counts diverge");
        }

        if self.track_freebie {
            let on_list: FxHashSet<VarId> = self.freebie.iter().cloned().collect();
            let expected: FxHashSet<VarId> = (1..=n)
                .filter(|&v| self.break_count[v] == 0 && self.make_count[v] > 0)
                .collect();
            assert_eq!(on_list, expected, "freebie list diverges");
            for (at, &v) in self.freebie.iter().enumerate() {
                assert_eq!(self.where_freebie[v], at, "freebie reverse index broken");
            }
        }
    }
}

#[inline]
fn push_freebie(freebie: &mut Vec<VarId>, where_freebie: &mut [usize], var: VarId) {
    where_freebie[var] = freebie.len();
    freebie.push(var);
}

fn drop_freebie(freebie: &mut Vec<VarId>, where_freebie: &mut [usize], var: VarId) {
    let at = where_freebie[var];
    if freebie.is_empty() || at == ABSENT {
        panic!("freebie list corrupt: variable {} is not on it", var);
    }
    where_freebie[var] = ABSENT;
    let moved = *freebie.last().expect("freebie list empty during removal");
    freebie[at] = moved;
    freebie.pop();
    if moved != var {
        where_freebie[moved] = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::{CNFClause, CNF};
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

    fn state(clauses: &[&[i32]], track_make: bool, track_freebie: bool) -> SearchState {
        let problem = Problem::new(&formula(clauses)).unwrap();
        SearchState::new(problem, track_make, track_freebie)
    }

    fn fixed_init(state: &mut SearchState, literals: &[i32]) {
        let mut rng = StdRng::seed_from_u64(0);
        let lits: Vec<CNFVar> = literals
            .iter()
            .map(|&l| CNFVar::new(l.abs() as usize, l > 0))
            .collect();
        state.initialize(&mut rng, Some(&lits)).unwrap();
    }

    #[test]
    fn initialize_rebuilds_counts() {
        let mut s = state(&[&[1, 2], &[1, -2], &[-1, 2]], true, true);
        fixed_init(&mut s, &[-1, -2]);

        // With x1=0 and x2=0 only {1, 2} is unsatisfied.
        assert_eq!(s.num_false(), 1);
        assert_eq!(s.count_unsat_naive(), 1);
        s.check_invariants();
    }

    #[test]
    fn flip_restores_invariants() {
        let mut s = state(&[&[1, 2, 3], &[-1, 2], &[-2, -3], &[1, -3]], true, true);
        let mut rng = StdRng::seed_from_u64(7);
        s.initialize(&mut rng, None).unwrap();
        s.check_invariants();

        for var in [1, 3, 2, 2, 1, 3, 1].iter() {
            s.start_flip();
            s.flip(*var);
            s.check_invariants();
            assert_eq!(s.num_false(), s.count_unsat_naive());
        }
    }

    #[test]
    fn double_flip_is_identity() {
        let mut s = state(&[&[1, 2, 3], &[-1, 2], &[-2, -3], &[1, -3]], true, true);
        let mut rng = StdRng::seed_from_u64(3);
        s.initialize(&mut rng, None).unwrap();

        let before_unsat: Vec<ClauseId> = {
            let mut u = s.unsat_clauses().to_vec();
            u.sort();
            u
        };
        let before_break = s.break_count.clone();
        let before_make = s.make_count.clone();
        let before_counts = s.true_lit_count.clone();

        s.start_flip();
        s.flip(2);
        s.start_flip();
        s.flip(2);

        let mut after_unsat = s.unsat_clauses().to_vec();
        after_unsat.sort();
        assert_eq!(after_unsat, before_unsat);
        assert_eq!(s.break_count, before_break);
        assert_eq!(s.make_count, before_make);
        assert_eq!(s.true_lit_count, before_counts);
        s.check_invariants();
    }

    #[test]
    fn freebie_detected_and_consumed() {
        // {x, y} and {x, -y} starting from x=0, y=0: flipping x alone
        // satisfies everything.
        let mut s = state(&[&[1, 2], &[1, -2]], true, true);
        fixed_init(&mut s, &[-1, -2]);

        assert_eq!(s.break_count(1), 0);
        assert_eq!(s.make_count(1), 1);
        assert_eq!(s.freebie_list(), &[1]);

        s.start_flip();
        s.flip(1);
        assert_eq!(s.num_false(), 0);
        assert!(s.freebie_list().is_empty());
        s.check_invariants();
    }

    #[test]
    fn supporter_kept_in_front() {
        let mut s = state(&[&[1, 2, 3]], true, false);
        fixed_init(&mut s, &[-1, 2, 3]);

        // Knock out x3, then x2: the clause goes 2 -> 1 and the sole
        // supporter must surface at position 0.
        s.start_flip();
        s.flip(3);
        let front = s.clause(0)[0];
        assert_eq!(front.id, 2);
        assert!(front.sign);
        s.check_invariants();
    }

    #[test]
    fn initialize_rejects_foreign_variable() {
        let mut s = state(&[&[1, 2]], false, false);
        let mut rng = StdRng::seed_from_u64(0);
        let out_of_range = [CNFVar::pos(9)];
        assert!(matches!(
            s.initialize(&mut rng, Some(&out_of_range)),
            Err(InputError::AssignmentOutOfRange { variable: 9, .. })
        ));
    }
}
