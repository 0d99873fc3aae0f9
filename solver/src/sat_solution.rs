pub type Valuation = Vec<bool>;

/// What a solver run has to say about a formula. A local-search run can
/// never rule a formula out, so its failures are `Unknown`.
#[derive(Clone, PartialEq, Eq)]
pub enum SATSolution {
    Satisfiable(Valuation),
    Unsatisfiable,
    Unknown,
}

impl std::iter::FromIterator<bool> for SATSolution {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        SATSolution::Satisfiable(iter.into_iter().collect())
    }
}

impl SATSolution {
    pub fn is_sat(&self) -> bool {
        match self {
            SATSolution::Satisfiable(_) => true,
            _ => false,
        }
    }

    pub fn is_unsat(&self) -> bool {
        match self {
            SATSolution::Unsatisfiable => true,
            _ => false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        match self {
            SATSolution::Unknown => true,
            _ => false,
        }
    }

    /// The assignment as signed literals, 1-based, positive for true.
    pub fn literals(&self) -> Option<Vec<i64>> {
        match self {
            SATSolution::Satisfiable(valuation) => Some(
                valuation
                    .iter()
                    .enumerate()
                    .map(|(at, &value)| {
                        let var = (at + 1) as i64;
                        if value {
                            var
                        } else {
                            -var
                        }
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn to_dimacs(&self) -> String {
        format!(
            "s {}\n",
            match self {
                SATSolution::Unsatisfiable => "UNSATISFIABLE".to_string(),
                SATSolution::Unknown => "UNKNOWN".to_string(),
                SATSolution::Satisfiable(_) => {
                    let literals = self
                        .literals()
                        .unwrap_or_default()
                        .iter()
                        .map(|lit| lit.to_string())
                        .collect::<Vec<String>>()
                        .join(" ");
                    format!("SATISFIABLE\nv {} 0", literals)
                }
            }
        )
    }
}

impl std::fmt::Debug for SATSolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.to_dimacs())
    }
}
