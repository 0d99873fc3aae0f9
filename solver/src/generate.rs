use rand::rngs::StdRng;

use crate::cnf::{CNFClause, CNFVar, CNF};
use crate::state::rand_mod;

/// Encodes the n-queens puzzle on an `n * n` board. Variable
/// `n*(row-1) + column` stands for a queen on that square; one clause per
/// row demands a queen somewhere, binary clauses rule out every attacking
/// pair along rows, columns and both diagonal directions.
pub fn queens(n: usize) -> CNF {
    let square = |row: usize, column: usize| n * (row - 1) + column;
    let mut cnf = CNF::empty();

    // A queen on every row.
    for row in 1..=n {
        cnf.push((1..=n).map(|column| CNFVar::pos(square(row, column))).collect());
    }

    let mut forbid = |a: usize, b: usize| {
        let mut clause = CNFClause::new();
        clause.push(CNFVar::neg(a));
        clause.push(CNFVar::neg(b));
        cnf.push(clause);
    };

    // No two queens on one row.
    for row in 1..=n {
        for column in 1..n {
            for other in column + 1..=n {
                forbid(square(row, column), square(row, other));
            }
        }
    }
    // No two queens on one column.
    for column in 1..=n {
        for row in 1..n {
            for other in row + 1..=n {
                forbid(square(row, column), square(other, column));
            }
        }
    }
    // No attacks along falling diagonals.
    for column in 1..n {
        for row in 1..n {
            for step in 1..=n {
                if column + step > n || row + step > n {
                    break;
                }
                forbid(square(row, column), square(row + step, column + step));
            }
        }
    }
    // No attacks along rising diagonals.
    for column in 2..=n {
        for row in 1..n {
            for step in 1..=n {
                if column <= step || row + step > n {
                    break;
                }
                forbid(square(row, column), square(row + step, column - step));
            }
        }
    }

    cnf.num_variables = n * n;
    cnf
}

/// Uniform random k-SAT: every clause draws `clause_length` distinct
/// variables and gives each an independent random sign.
pub fn random_ksat(
    rng: &mut StdRng,
    num_variables: usize,
    num_clauses: usize,
    clause_length: usize,
) -> CNF {
    assert!(
        clause_length <= num_variables,
        "cannot draw {} distinct variables out of {}",
        clause_length,
        num_variables
    );

    let mut cnf = CNF::empty();
    for _ in 0..num_clauses {
        let mut clause = CNFClause::with_capacity(clause_length);
        while clause.len() < clause_length {
            let var = 1 + rand_mod(rng, num_variables);
            if clause.vars.iter().any(|lit| lit.id == var) {
                continue;
            }
            clause.push(CNFVar::new(var, rand_mod(rng, 2) == 1));
        }
        cnf.push(clause);
    }
    cnf.num_variables = num_variables;
    cnf
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn four_queens_encoding_shape() {
        let cnf = queens(4);
        assert_eq!(cnf.num_variables, 16);
        // 4 row clauses plus 24 + 24 + 14 + 14 attack pairs.
        assert_eq!(cnf.len(), 80);
        assert!(cnf.clauses.iter().all(|clause| !clause.is_empty()));
    }

    #[test]
    fn random_ksat_draws_distinct_variables() {
        let mut rng = StdRng::seed_from_u64(11);
        let cnf = random_ksat(&mut rng, 20, 50, 3);
        assert_eq!(cnf.len(), 50);
        assert_eq!(cnf.num_variables, 20);
        for clause in &cnf.clauses {
            assert_eq!(clause.len(), 3);
            let mut ids: Vec<usize> = clause.vars.iter().map(|lit| lit.id).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), 3);
        }
    }
}
