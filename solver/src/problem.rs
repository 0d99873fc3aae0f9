use crate::cnf::{CNFVar, CNF};
use crate::error::InputError;

/// Type used for referencing clauses
pub type ClauseId = usize;

/// Slot of a literal in the occurrence index.
#[inline]
pub(crate) fn lit_index(lit: CNFVar) -> usize {
    2 * lit.id + lit.sign as usize
}

/// The formula in the packed form the search works on: one contiguous
/// literal pool sliced per clause, and one contiguous occurrence pool
/// sliced per literal. Clause membership is fixed for the lifetime of the
/// problem; only the literal order inside a clause may be rearranged by
/// the flip engine, which keeps the single satisfying literal of a
/// singly-satisfied clause in front.
pub struct Problem {
    pub(crate) num_variables: usize,
    pub(crate) longest_clause: usize,
    pub(crate) clauses: ClausePool,
    pub(crate) occurrences: OccurrenceIndex,
}

pub(crate) struct ClausePool {
    offsets: Vec<usize>,
    literals: Vec<CNFVar>,
}

pub(crate) struct OccurrenceIndex {
    offsets: Vec<usize>,
    pool: Vec<ClauseId>,
}

impl Problem {
    /// Packs a parsed formula, dropping duplicate literals inside each
    /// clause. Rejects empty clauses and literals outside `1..=N`.
    pub fn new(formula: &CNF) -> Result<Problem, InputError> {
        let num_variables = formula.num_variables;

        let mut offsets = Vec::with_capacity(formula.len() + 1);
        let mut literals = Vec::new();
        let mut longest_clause = 0;

        offsets.push(0);
        for (index, clause) in formula.clauses.iter().enumerate() {
            if clause.is_empty() {
                return Err(InputError::EmptyClause { clause: index });
            }
            let mut vars = clause.vars.clone();
            vars.sort();
            vars.dedup();
            for lit in &vars {
                if lit.id < 1 || lit.id > num_variables {
                    return Err(InputError::LiteralOutOfRange {
                        literal: lit.to_i32() as i64,
                        clause: index,
                        num_variables,
                    });
                }
            }
            longest_clause = longest_clause.max(vars.len());
            literals.extend(vars);
            offsets.push(literals.len());
        }

        // Occurrence lists: count, prefix-sum, fill.
        let slots = 2 * (num_variables + 1);
        let mut counts = vec![0usize; slots];
        for lit in &literals {
            counts[lit_index(*lit)] += 1;
        }

        let mut occ_offsets = vec![0usize; slots + 1];
        for slot in 0..slots {
            occ_offsets[slot + 1] = occ_offsets[slot] + counts[slot];
        }

        let mut fill = occ_offsets.clone();
        let mut pool = vec![0 as ClauseId; literals.len()];
        for clause in 0..offsets.len() - 1 {
            for lit in &literals[offsets[clause]..offsets[clause + 1]] {
                let slot = lit_index(*lit);
                pool[fill[slot]] = clause;
                fill[slot] += 1;
            }
        }

        Ok(Problem {
            num_variables,
            longest_clause,
            clauses: ClausePool { offsets, literals },
            occurrences: OccurrenceIndex {
                offsets: occ_offsets,
                pool,
            },
        })
    }

    #[inline]
    pub fn num_variables(&self) -> usize {
        self.num_variables
    }

    #[inline]
    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    #[inline]
    pub fn longest_clause(&self) -> usize {
        self.longest_clause
    }

    /// The literals of clause `c`, in their current order.
    #[inline]
    pub fn clause(&self, c: ClauseId) -> &[CNFVar] {
        self.clauses.get(c)
    }

    #[inline]
    pub fn size(&self, c: ClauseId) -> usize {
        self.clauses.get(c).len()
    }

    /// Indices of all clauses containing the literal `lit`.
    #[inline]
    pub fn occurrences(&self, lit: CNFVar) -> &[ClauseId] {
        self.occurrences.of(lit)
    }

    #[inline]
    pub fn num_occurrences(&self, lit: CNFVar) -> usize {
        self.occurrences.of(lit).len()
    }
}

impl ClausePool {
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub(crate) fn get(&self, c: ClauseId) -> &[CNFVar] {
        &self.literals[self.offsets[c]..self.offsets[c + 1]]
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, c: ClauseId) -> &mut [CNFVar] {
        &mut self.literals[self.offsets[c]..self.offsets[c + 1]]
    }
}

impl OccurrenceIndex {
    #[inline]
    pub(crate) fn of(&self, lit: CNFVar) -> &[ClauseId] {
        let slot = lit_index(lit);
        &self.pool[self.offsets[slot]..self.offsets[slot + 1]]
    }
}
