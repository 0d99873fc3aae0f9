use thiserror::Error;

/// Everything that can go wrong while reading a formula or an
/// assignment file, before the search itself starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("only CNF formulae are supported")]
    NotCnf,

    #[error("cannot parse DIMACS input: {0}")]
    Dimacs(String),

    #[error("clause {clause} is empty")]
    EmptyClause { clause: usize },

    #[error("literal {literal} in clause {clause} is out of range (formula has {num_variables} variables)")]
    LiteralOutOfRange {
        literal: i64,
        clause: usize,
        num_variables: usize,
    },

    #[error("bad literal token `{0}`")]
    BadLiteralToken(String),

    #[error("assignment file contains no literals")]
    EmptyAssignment,

    #[error("assignment references variable {variable} but the formula has {num_variables} variables")]
    AssignmentOutOfRange {
        variable: usize,
        num_variables: usize,
    },
}
