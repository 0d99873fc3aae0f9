use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::iter::FromIterator;

use dimacs::parse_dimacs;

use crate::error::InputError;

/// Type used for referencing logical variables
pub type VarId = usize;

/// Representation of logical formulae in CNF form
/// (conjunction of clauses)
#[derive(Clone, Debug)]
pub struct CNF {
    /// Vector of inner clauses
    pub clauses: Vec<CNFClause>,
    pub num_variables: usize,
}

/// Representation of a clause (disjunction of literals)
#[derive(Clone, Debug, PartialEq, PartialOrd, Eq, Ord)]
pub struct CNFClause {
    /// Vector of inner literals
    pub vars: Vec<CNFVar>,
}

/// Logical variable with a polarity
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct CNFVar {
    /// Identifier of a variable, numbered from 1
    pub id: VarId,
    /// Variable is negated iff `sign == false`
    pub sign: bool,
}

impl CNF {
    /// Creates an empty CNF formula
    #[inline]
    pub fn empty() -> CNF {
        CNF {
            clauses: Vec::new(),
            num_variables: 0,
        }
    }

    /// Creates a singleton CNF formula out of a single clause
    #[inline]
    pub fn single(clause: CNFClause) -> CNF {
        CNF {
            num_variables: clause.max_variable_id(),
            clauses: vec![clause],
        }
    }

    /// Adds a new clause to the formula
    #[inline]
    pub fn push(&mut self, c: CNFClause) {
        self.num_variables = self.num_variables.max(c.max_variable_id());
        self.clauses.push(c);
    }

    /// Returns number of clauses in the formula
    #[inline]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Collects all variable identifiers that appear in the formula
    #[inline]
    pub fn vars(&self) -> HashSet<VarId> {
        self.clauses
            .iter()
            .flat_map(|clause| clause.vars.iter().map(CNFVar::id))
            .unique()
            .collect()
    }

    /// Prints formula in DIMACS compatible form
    pub fn to_dimacs(&self) -> String {
        let mut out = format!("p cnf {} {}\n", self.num_variables, self.clauses.len());

        for clause in &self.clauses {
            for var in &clause.vars {
                out.push_str(&var.to_i32().to_string());
                out.push(' ');
            }
            out.push_str("0\n");
        }
        out
    }

    /// Parse DIMACS string into CNF structure
    pub fn from_dimacs(input: &str) -> Result<CNF, InputError> {
        match parse_dimacs(input) {
            Ok(dimacs::Instance::Cnf { clauses, num_vars }) => {
                let clauses = clauses
                    .iter()
                    .map(|clause| {
                        clause
                            .lits()
                            .iter()
                            .map(|lit| CNFVar {
                                id: lit.var().to_u64() as VarId,
                                sign: lit.sign() == dimacs::Sign::Pos,
                            })
                            .collect()
                    })
                    .collect();
                Ok(CNF {
                    clauses,
                    num_variables: num_vars as usize,
                })
            }
            Ok(_) => Err(InputError::NotCnf),
            Err(e) => Err(InputError::Dimacs(format!("{:?}", e))),
        }
    }
}

/// Parse a whitespace-separated list of signed literals, the format of
/// initial-assignment files and solution files.
pub fn parse_literals(input: &str) -> Result<Vec<CNFVar>, InputError> {
    let mut literals = Vec::new();
    for token in input.split_whitespace() {
        let lit: i64 = token
            .parse()
            .map_err(|_| InputError::BadLiteralToken(token.to_string()))?;
        if lit == 0 {
            return Err(InputError::BadLiteralToken(token.to_string()));
        }
        literals.push(CNFVar::new(lit.abs() as VarId, lit > 0));
    }
    if literals.is_empty() {
        return Err(InputError::EmptyAssignment);
    }
    Ok(literals)
}

impl FromIterator<CNFClause> for CNF {
    fn from_iter<I: IntoIterator<Item = CNFClause>>(iter: I) -> Self {
        let clauses = iter.into_iter().collect::<Vec<CNFClause>>();

        let num_variables = clauses
            .iter()
            .map(|clause| clause.max_variable_id())
            .max()
            .unwrap_or(0);

        CNF {
            clauses,
            num_variables,
        }
    }
}

impl IntoIterator for CNF {
    type Item = CNFClause;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.into_iter()
    }
}

impl CNFClause {
    /// Creates an empty CNF clause
    #[inline]
    pub fn new() -> CNFClause {
        CNFClause { vars: Vec::new() }
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> CNFClause {
        CNFClause {
            vars: Vec::with_capacity(capacity),
        }
    }

    /// Creates a CNF clause containing a single literal
    #[inline]
    pub fn single(var: CNFVar) -> CNFClause {
        CNFClause { vars: vec![var] }
    }

    /// Adds a single literal into the clause
    #[inline]
    pub fn push(&mut self, v: CNFVar) {
        match self.vars.binary_search(&v) {
            Ok(_) => {} // we could check for contradiction here
            Err(pos) => self.vars.insert(pos, v),
        }
    }

    /// Returns the greatest variable identifier used in the clause
    #[inline]
    pub fn max_variable_id(&self) -> usize {
        self.vars.iter().map(|lit| lit.id).max().unwrap_or(0)
    }

    /// Calculates number of literals in clause
    #[inline]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Default for CNFClause {
    fn default() -> Self {
        CNFClause::new()
    }
}

impl FromIterator<CNFVar> for CNFClause {
    fn from_iter<I: IntoIterator<Item = CNFVar>>(iter: I) -> Self {
        CNFClause {
            vars: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for CNFClause {
    type Item = CNFVar;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.into_iter()
    }
}

impl CNFVar {
    /// Creates variable with given identifier and positivity
    #[inline]
    pub fn new(id: VarId, sign: bool) -> CNFVar {
        CNFVar { id, sign }
    }

    /// Creates a positive variable with given identifier
    #[inline]
    pub fn pos(id: VarId) -> CNFVar {
        CNFVar { id, sign: true }
    }

    /// Creates a negative variable with given identifier
    #[inline]
    pub fn neg(id: VarId) -> CNFVar {
        CNFVar { id, sign: false }
    }

    /// Gets the identifier of a variable
    #[inline]
    pub fn id(&self) -> VarId {
        self.id
    }

    /// Checks if the variable is positive
    #[inline]
    pub fn sign(&self) -> bool {
        self.sign
    }

    /// Converts to signed integer. The absolute value indicates
    /// the identifier and sign states for positivity.
    ///
    /// **NOTE** it is not integer-overflow friendly.
    pub fn to_i32(&self) -> i32 {
        if self.sign {
            self.id as i32
        } else {
            -(self.id as i32)
        }
    }
}

impl std::ops::Neg for CNFVar {
    type Output = CNFVar;
    fn neg(mut self) -> Self::Output {
        self.sign = !self.sign;
        self
    }
}

impl From<CNFVar> for (VarId, bool) {
    fn from(lit: CNFVar) -> Self {
        (lit.id, lit.sign)
    }
}

impl fmt::Display for CNF {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.clauses {
            writeln!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Display for CNFClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.vars {
            write!(f, "({})  ", c)?;
        }
        Ok(())
    }
}

impl fmt::Display for CNFVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimacs_round_trip() {
        let input = "c comment line\np cnf 3 2\n1 -2 0\n2 3 0\n";
        let cnf = CNF::from_dimacs(input).unwrap();
        assert_eq!(cnf.num_variables, 3);
        assert_eq!(cnf.len(), 2);
        assert_eq!(cnf.clauses[0].vars, vec![CNFVar::pos(1), CNFVar::neg(2)]);
    }

    #[test]
    fn clause_push_deduplicates() {
        let mut clause = CNFClause::new();
        clause.push(CNFVar::pos(2));
        clause.push(CNFVar::neg(1));
        clause.push(CNFVar::pos(2));
        assert_eq!(clause.len(), 2);
    }

    #[test]
    fn literal_list_parsing() {
        let lits = parse_literals(" 1 -2\n3 ").unwrap();
        assert_eq!(lits, vec![CNFVar::pos(1), CNFVar::neg(2), CNFVar::pos(3)]);
        assert!(parse_literals("").is_err());
        assert!(parse_literals("1 x 2").is_err());
        assert!(parse_literals("1 0 2").is_err());
    }
}
