use log::trace;

/// Denominator of all integer probability fractions.
pub const DENOMINATOR: i64 = 100_000;
/// `ONE_PERCENT / DENOMINATOR = 0.01`
pub(crate) const ONE_PERCENT: i64 = 1_000;

/// Walk probability as an integer fraction over [`DENOMINATOR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseLevel {
    pub(crate) numerator: i64,
}

impl NoiseLevel {
    pub fn from_probability(probability: f64) -> NoiseLevel {
        NoiseLevel {
            numerator: (probability * DENOMINATOR as f64) as i64,
        }
    }

    pub fn probability(&self) -> f64 {
        self.numerator as f64 / DENOMINATOR as f64
    }
}

/// Noise adaptation after Hoos, "An Adaptive Noise Mechanism for WalkSAT":
/// every improvement of the objective lowers the walk probability, while
/// a stagnation phase of `theta` times the clause count raises it.
#[derive(Debug, Clone)]
pub struct AdaptiveNoise {
    phi: f64,
    theta: f64,
    stagnation_timer: i64,
    last_objective: usize,
}

impl AdaptiveNoise {
    pub fn new(phi: f64, theta: f64) -> AdaptiveNoise {
        AdaptiveNoise {
            phi,
            theta,
            stagnation_timer: 0,
            last_objective: usize::max_value(),
        }
    }

    /// Every try starts silent; noise only builds up under stagnation.
    pub(crate) fn start_try(&mut self, num_clauses: usize, noise: &mut NoiseLevel) {
        noise.numerator = 0;
        self.stagnation_timer = (num_clauses as f64 * self.theta) as i64;
        self.last_objective = usize::max_value();
    }

    pub(crate) fn after_flip(
        &mut self,
        num_false: usize,
        num_clauses: usize,
        noise: &mut NoiseLevel,
    ) {
        if num_false < self.last_objective {
            self.last_objective = num_false;
            self.stagnation_timer = (num_clauses as f64 * self.theta) as i64;
            noise.numerator = ((1.0 - self.phi / 2.0) * noise.numerator as f64) as i64;
        } else {
            self.stagnation_timer -= 1;
            if self.stagnation_timer <= 0 {
                self.last_objective = num_false;
                self.stagnation_timer = (num_clauses as f64 * self.theta) as i64;
                noise.numerator += ((DENOMINATOR - noise.numerator) as f64 * self.phi) as i64;
                trace!(
                    "stagnation at {} false clauses, noise raised to {:.3}",
                    num_false,
                    noise.probability()
                );
            }
        }
    }
}
