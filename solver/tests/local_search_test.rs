use proptest::{collection::vec, prelude::*};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::AtomicBool;

use solver::{
    generate, CNFClause, CNFVar, Heuristic, Problem, SATSolution, SearchOptions, SearchState,
    Solver, WalkSatSolver, CNF,
};

const NUM_VARIABLES: usize = 10;

fn is_satisfied<'a>(mut formula: impl Iterator<Item = &'a CNFClause>, assignment: &[bool]) -> bool {
    formula.all(|clause| {
        clause
            .vars
            .iter()
            .any(|var| assignment[var.id - 1] == var.sign)
    })
}

/// Builds a clause list out of raw proptest output, keeping the first
/// occurrence of every variable within a clause.
fn build_formula(raw: &[Vec<(usize, bool)>], num_variables: usize) -> CNF {
    let mut cnf = CNF::empty();
    for raw_clause in raw {
        let mut clause = CNFClause::new();
        for &(id, sign) in raw_clause {
            if clause.vars.iter().all(|lit| lit.id != id) {
                clause.push(CNFVar::new(id, sign));
            }
        }
        cnf.push(clause);
    }
    cnf.num_variables = num_variables;
    cnf
}

/// Rewrites one literal per clause so that `planted` satisfies it.
fn plant_assignment(cnf: &mut CNF, planted: &[bool]) {
    for clause in cnf.clauses.iter_mut() {
        let id = clause.vars[0].id;
        clause.vars[0] = CNFVar::new(id, planted[id - 1]);
    }
}

#[test]
fn trivially_satisfiable_unit_clause() {
    let cnf = CNF::single(CNFClause::single(CNFVar::pos(1)));
    let options = SearchOptions {
        max_solutions: 1,
        ..SearchOptions::default()
    };
    let solver = WalkSatSolver::new(Heuristic::Best, options);
    let abort = AtomicBool::new(false);
    let outcome = solver.run(&cnf, &abort).unwrap();

    assert_eq!(outcome.successes, 1);
    assert_eq!(outcome.tries.len(), 1);
    assert!(outcome.tries[0].success);
    assert_eq!(outcome.solution, SATSolution::Satisfiable(vec![true]));
}

#[test]
fn freebie_preemption_solves_in_one_flip() {
    // {x, y} and {x, -y} from the all-false assignment: x is a freebie
    // and flipping it settles the formula.
    let mut cnf = CNF::empty();
    cnf.push(vec![CNFVar::pos(1), CNFVar::pos(2)].into_iter().collect());
    cnf.push(vec![CNFVar::pos(1), CNFVar::neg(2)].into_iter().collect());

    let options = SearchOptions {
        maxfreebie: true,
        max_solutions: 1,
        init_assignment: Some(vec![CNFVar::neg(1), CNFVar::neg(2)]),
        ..SearchOptions::default()
    };
    let solver = WalkSatSolver::new(Heuristic::Best, options);
    let abort = AtomicBool::new(false);
    let outcome = solver.run(&cnf, &abort).unwrap();

    assert_eq!(outcome.successes, 1);
    assert_eq!(outcome.tries[0].flips, 1);
}

#[test]
fn solves_four_queens() {
    let cnf = generate::queens(4);
    let options = SearchOptions {
        seed: 1,
        cutoff: 100_000,
        tries: 10,
        ..SearchOptions::default()
    };
    let solver = WalkSatSolver::new(Heuristic::Best, options);

    let solution = solver.solve(&cnf);
    let valuation = match solution {
        SATSolution::Satisfiable(valuation) => valuation,
        _ => panic!("four queens went unsolved"),
    };
    assert!(is_satisfied(cnf.clauses.iter(), &valuation));

    // Decode the board: one queen per row, no shared columns, no shared
    // diagonals.
    let queens: Vec<(usize, usize)> = valuation
        .iter()
        .enumerate()
        .filter(|(_, &value)| value)
        .map(|(at, _)| (at / 4, at % 4))
        .collect();
    assert_eq!(queens.len(), 4);
    for (i, &(row_a, col_a)) in queens.iter().enumerate() {
        for &(row_b, col_b) in queens.iter().skip(i + 1) {
            assert_ne!(row_a, row_b);
            assert_ne!(col_a, col_b);
            assert_ne!(row_a + col_b, row_b + col_a); // falling diagonal
            assert_ne!(row_a + col_a, row_b + col_b); // rising diagonal
        }
    }
}

#[test]
fn every_heuristic_solves_a_small_instance() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut cnf = generate::random_ksat(&mut rng, 12, 30, 3);
    let planted: Vec<bool> = (0..12).map(|v| v % 3 == 0).collect();
    plant_assignment(&mut cnf, &planted);

    let heuristics = [
        Heuristic::Random,
        Heuristic::Best,
        Heuristic::Gsat,
        Heuristic::Tabu { length: 3 },
        Heuristic::Novelty { plus: true },
        Heuristic::RNovelty { plus: false },
        Heuristic::Alternate {
            walk_length: 5,
            greedy_length: 10,
        },
        Heuristic::BigFlip {
            walk_length: 5,
            greedy_length: 10,
        },
    ];

    for &heuristic in heuristics.iter() {
        let options = SearchOptions {
            seed: 7,
            cutoff: 200_000,
            tries: 10,
            ..SearchOptions::default()
        };
        let solution = WalkSatSolver::new(heuristic, options).solve(&cnf);
        match solution {
            SATSolution::Satisfiable(valuation) => {
                assert!(
                    is_satisfied(cnf.clauses.iter(), &valuation),
                    "{:?} reported a bogus assignment",
                    heuristic
                );
            }
            _ => panic!("{:?} missed a satisfiable instance", heuristic),
        }
    }
}

proptest! {
    #[test]
    fn finds_planted_assignment(
        raw in vec(vec((1usize..=NUM_VARIABLES, proptest::bool::weighted(0.5)), 1..=4), 1..=40),
        planted in vec(proptest::bool::weighted(0.5), NUM_VARIABLES),
    ) {
        let mut cnf = build_formula(&raw, NUM_VARIABLES);
        plant_assignment(&mut cnf, &planted);

        let options = SearchOptions {
            seed: 5,
            cutoff: 20_000,
            tries: 10,
            ..SearchOptions::default()
        };
        let solution = WalkSatSolver::new(Heuristic::Best, options).solve(&cnf);

        prop_assert!(solution.is_sat());
        if let SATSolution::Satisfiable(valuation) = solution {
            prop_assert!(is_satisfied(cnf.clauses.iter(), &valuation));
        }
    }

    #[test]
    fn incremental_state_matches_recomputation(
        raw in vec(vec((1usize..=8, proptest::bool::weighted(0.5)), 1..=4), 1..=25),
        flips in vec(1usize..=8, 1..=60),
        seed in 0u64..1000,
    ) {
        let cnf = build_formula(&raw, 8);
        let problem = Problem::new(&cnf).unwrap();
        let mut state = SearchState::new(problem, true, true);
        let mut rng = StdRng::seed_from_u64(seed);
        state.initialize(&mut rng, None).unwrap();
        state.check_invariants();

        for &var in &flips {
            state.start_flip();
            state.flip(var);
            state.check_invariants();
            prop_assert_eq!(state.num_false(), state.count_unsat_naive());
        }
    }
}
