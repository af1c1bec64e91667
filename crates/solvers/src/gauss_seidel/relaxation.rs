use super::config::{Acceleration, Config};

/// Relaxation factor shared by every coupling variable of a group.
///
/// With Aitken acceleration the factor is updated after each pass from the
/// change in the unrelaxed update vector:
///
/// ```text
/// w_k = -w_{k-1} * (r_{k-1} . (r_k - r_{k-1})) / |r_k - r_{k-1}|^2
/// ```
///
/// where `r_k` is the difference between computed and current values,
/// concatenated over all coupling elements in invocation order.
#[derive(Debug, Clone)]
pub(crate) struct Relaxation {
    factor: f64,
    acceleration: Acceleration,
    previous: Option<Vec<f64>>,
}

impl Relaxation {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            factor: config.relaxation_factor,
            acceleration: config.acceleration,
            previous: None,
        }
    }

    pub(crate) fn factor(&self) -> f64 {
        self.factor
    }

    /// Relaxes `computed` toward `current`.
    pub(crate) fn apply(&self, current: f64, computed: f64) -> f64 {
        current + self.factor * (computed - current)
    }

    /// Updates the factor from the unrelaxed updates of the pass just completed.
    pub(crate) fn update(&mut self, updates: Vec<f64>) {
        let Acceleration::Aitken {
            min_factor,
            max_factor,
        } = self.acceleration
        else {
            return;
        };

        if let Some(previous) = self.previous.as_deref() {
            if previous.len() == updates.len() {
                let (numerator, denominator) = previous.iter().zip(&updates).fold(
                    (0.0, 0.0),
                    |(num, den), (prev, curr)| {
                        let diff = curr - prev;
                        (num + prev * diff, den + diff * diff)
                    },
                );
                if denominator > 0.0 && denominator.is_finite() {
                    let factor = -self.factor * numerator / denominator;
                    if factor.is_finite() {
                        self.factor = factor.clamp(min_factor, max_factor);
                    }
                }
            }
        }
        self.previous = Some(updates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn fixed_factor_never_changes() {
        let config = Config {
            relaxation_factor: 0.4,
            ..Config::default()
        };
        let mut relaxation = Relaxation::new(&config);

        relaxation.update(vec![1.0, 2.0]);
        relaxation.update(vec![-3.0, 0.5]);

        assert_relative_eq!(relaxation.factor(), 0.4);
        assert_relative_eq!(relaxation.apply(10.0, 20.0), 14.0);
    }

    #[test]
    fn aitken_damps_an_oscillation() {
        let config = Config {
            acceleration: Acceleration::aitken(),
            ..Config::default()
        };
        let mut relaxation = Relaxation::new(&config);

        // Updates that flip sign and grow: the factor is pulled below one.
        relaxation.update(vec![1.0]);
        relaxation.update(vec![-1.5]);

        // w = -1 * (1 * -2.5) / 6.25
        assert_relative_eq!(relaxation.factor(), 0.4);
    }

    #[test]
    fn aitken_factor_is_clamped() {
        let config = Config {
            acceleration: Acceleration::Aitken {
                min_factor: 0.1,
                max_factor: 1.5,
            },
            ..Config::default()
        };
        let mut relaxation = Relaxation::new(&config);

        // Slowly shrinking updates push the factor up to the bound.
        relaxation.update(vec![1.0]);
        relaxation.update(vec![0.99]);

        assert_relative_eq!(relaxation.factor(), 1.5);
    }

    #[test]
    fn identical_updates_keep_the_factor() {
        let config = Config {
            relaxation_factor: 0.7,
            acceleration: Acceleration::aitken(),
            ..Config::default()
        };
        let mut relaxation = Relaxation::new(&config);

        relaxation.update(vec![0.5, 0.5]);
        relaxation.update(vec![0.5, 0.5]);

        assert_relative_eq!(relaxation.factor(), 0.7);
    }
}
