use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use varpro::model::builder::SeparableModelBuilder;
use varpro::solvers::levmar::{LevMarProblemBuilder, LevMarSolver};

use super::error::FitError;
use super::histogram::Histogram;

/// Fewest non-empty bins accepted by a fit: one more than the number of parameters
const MIN_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub value: f64,
    pub uncertainty: f64,
}

/// Result of fitting `amplitude * exp(-(x - mean)^2 / (2 sigma^2))` to histogram bins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianFit {
    pub amplitude: Value,
    pub mean: Value,
    pub sigma: Value,
    pub chi_square: f64,
    pub ndf: usize,
    pub evaluations: usize,
    pub converged: bool,
}

impl GaussianFit {
    pub fn fwhm(&self) -> Value {
        let factor = 2.0 * (2.0 * f64::ln(2.0)).sqrt();
        Value {
            value: factor * self.sigma.value,
            uncertainty: factor * self.sigma.uncertainty,
        }
    }

    pub fn reduced_chi_square(&self) -> f64 {
        if self.ndf == 0 {
            return f64::NAN;
        }
        self.chi_square / self.ndf as f64
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.amplitude.value
            * (-(x - self.mean.value).powi(2) / (2.0 * self.sigma.value.powi(2))).exp()
    }
}

/// Fit a Gaussian to the bins of `histo` whose centers lie in `range`.
///
/// This is a chi-square fit with Neyman weights (sigma_i = sqrt(N_i)); empty bins carry no
/// weight and are left out of the fit. A width outside of (0, range width] means the solver
/// ran away from any peak, so the fit is flagged as not converged.
pub fn fit_histogram(histo: &Histogram, range: (f64, f64)) -> Result<GaussianFit, FitError> {
    if !(range.0 < range.1) {
        return Err(FitError::BadRange(range.0, range.1));
    }
    let points: Vec<(f64, f64)> = histo
        .get_points_between(range.0, range.1)
        .into_iter()
        .filter(|(_, y)| *y > 0.0)
        .collect();
    let mut fit = fit_points(&points)?;
    if !(fit.sigma.value > 0.0 && fit.sigma.value <= range.1 - range.0) {
        spdlog::debug!(
            "Gaussian fit in [{}, {}] ran away to sigma = {}",
            range.0,
            range.1,
            fit.sigma.value
        );
        fit.converged = false;
    }
    Ok(fit)
}

/// Fit a Gaussian to (x, counts) points with a Levenberg-Marquardt solver. The amplitude is
/// the linear coefficient of the separable model; mean and sigma are the nonlinear parameters.
/// Every count must be positive.
pub fn fit_points(points: &[(f64, f64)]) -> Result<GaussianFit, FitError> {
    if points.len() < MIN_POINTS {
        return Err(FitError::TooFewPoints(points.len(), MIN_POINTS));
    }

    let (mean_guess, sigma_guess) = initial_guess(points);
    let x_data = DVector::from_iterator(points.len(), points.iter().map(|(x, _)| *x));
    let y_data = DVector::from_iterator(points.len(), points.iter().map(|(_, y)| *y));
    let weights = y_data.map(|counts| 1.0 / counts.sqrt());

    let model = SeparableModelBuilder::<f64>::new(&["mean", "sigma"])
        .initial_parameters(vec![mean_guess, sigma_guess])
        .independent_variable(x_data)
        .function(&["mean", "sigma"], gaussian)
        .partial_deriv("mean", gaussian_pd_mean)
        .partial_deriv("sigma", gaussian_pd_sigma)
        .build()
        .map_err(|e| FitError::BadModel(format!("{e:?}")))?;

    let problem = LevMarProblemBuilder::new(model)
        .observations(y_data)
        .weights(weights)
        .build()
        .map_err(|e| FitError::BadModel(format!("{e:?}")))?;

    let (fit_result, fit_statistics) = match LevMarSolver::default().fit_with_statistics(problem)
    {
        Ok(fit) => fit,
        Err(_) => return Err(FitError::NotConverged),
    };

    let nonlinear_parameters = fit_result.nonlinear_parameters();
    let nonlinear_variances = fit_statistics.nonlinear_parameters_variance();
    let amplitude = match fit_result.linear_coefficients() {
        Some(coefficients) => coefficients[0],
        None => return Err(FitError::NotConverged),
    };
    let amplitude_variance = fit_statistics.linear_coefficients_variance()[0];

    let ndf = points.len() - 3;
    let fit = GaussianFit {
        amplitude: Value {
            value: amplitude,
            uncertainty: amplitude_variance.sqrt(),
        },
        mean: Value {
            value: nonlinear_parameters[0],
            uncertainty: nonlinear_variances[0].sqrt(),
        },
        // The model only sees sigma squared
        sigma: Value {
            value: nonlinear_parameters[1].abs(),
            uncertainty: nonlinear_variances[1].sqrt(),
        },
        chi_square: fit_statistics.reduced_chi2() * ndf as f64,
        ndf,
        evaluations: fit_result.minimization_report.number_of_evaluations,
        converged: true,
    };

    let values = [
        fit.amplitude.value,
        fit.amplitude.uncertainty,
        fit.mean.value,
        fit.mean.uncertainty,
        fit.sigma.value,
        fit.sigma.uncertainty,
        fit.chi_square,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(fit)
}

fn gaussian(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| (-(x_val - mean).powi(2) / (2.0 * sigma.powi(2))).exp())
}

fn gaussian_pd_mean(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| {
        (x_val - mean) / sigma.powi(2) * (-(x_val - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
    })
}

fn gaussian_pd_sigma(x: &DVector<f64>, mean: f64, sigma: f64) -> DVector<f64> {
    x.map(|x_val| {
        (x_val - mean).powi(2) / sigma.powi(3)
            * (-(x_val - mean).powi(2) / (2.0 * sigma.powi(2))).exp()
    })
}

/// Mean and sigma from the moments of the points
fn initial_guess(points: &[(f64, f64)]) -> (f64, f64) {
    let total: f64 = points.iter().map(|(_, y)| y).sum();
    let mean = points.iter().map(|(x, y)| x * y).sum::<f64>() / total;
    let variance = points
        .iter()
        .map(|(x, y)| y * (x - mean).powi(2))
        .sum::<f64>()
        / total;
    let mut sigma = variance.sqrt();
    if !(sigma > 0.0) {
        sigma = (points[1].0 - points[0].0).abs().max(1.0);
    }
    (mean, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_histogram(amplitude: f64, mean: f64, sigma: f64) -> Histogram {
        let mut histo = Histogram::new("h", "test", 20000, (0.0, 20000.0));
        let counts = (0..histo.bins.len())
            .map(|i| {
                let x = histo.get_bin_center(i);
                (amplitude * (-(x - mean).powi(2) / (2.0 * sigma.powi(2))).exp()).round() as u64
            })
            .collect();
        histo.set_counts(counts).unwrap();
        histo
    }

    #[test]
    fn test_fit_recovers_peak() {
        let histo = peak_histogram(1000.0, 1827.3, 2.5);
        let fit = fit_histogram(&histo, (1815.0, 1840.0)).unwrap();
        assert!(fit.converged);
        assert!((fit.mean.value - 1827.3).abs() < 0.05, "mean {}", fit.mean.value);
        assert!((fit.sigma.value - 2.5).abs() < 0.1, "sigma {}", fit.sigma.value);
        assert!((fit.amplitude.value - 1000.0).abs() < 20.0);
        assert!(fit.mean.uncertainty > 0.0 && fit.mean.uncertainty < 0.1);
        assert!(fit.ndf > 0);
        assert!(fit.evaluations > 0);
        assert!(fit.reduced_chi_square() < 1.0);
        assert!((fit.fwhm().value - 2.3548 * fit.sigma.value).abs() < 1e-3);
    }

    #[test]
    fn test_fit_off_center_window() {
        // The peak sits near the edge of the window, so the moment guess is biased
        let histo = peak_histogram(500.0, 2380.0, 3.0);
        let fit = fit_histogram(&histo, (2372.0, 2395.0)).unwrap();
        assert!((fit.mean.value - 2380.0).abs() < 0.1, "mean {}", fit.mean.value);
        assert!((fit.evaluate(fit.mean.value) - fit.amplitude.value).abs() < 1e-9);
    }

    #[test]
    fn test_flat_window_is_not_converged() {
        let mut histo = Histogram::new("h", "test", 100, (0.0, 100.0));
        for x in 40..46 {
            histo.fill(x as f64 + 0.5);
        }
        match fit_histogram(&histo, (40.0, 46.0)) {
            Ok(fit) => assert!(!fit.converged, "sigma {}", fit.sigma.value),
            Err(e) => assert_ne!(e, FitError::TooFewPoints(6, 4)),
        }
    }

    #[test]
    fn test_too_few_points() {
        let mut histo = Histogram::new("h", "test", 100, (0.0, 100.0));
        histo.fill(50.5);
        histo.fill(51.5);
        assert_eq!(
            fit_histogram(&histo, (40.0, 60.0)),
            Err(FitError::TooFewPoints(2, 4))
        );
    }

    #[test]
    fn test_bad_range() {
        let histo = peak_histogram(100.0, 50.0, 2.0);
        assert_eq!(
            fit_histogram(&histo, (60.0, 40.0)),
            Err(FitError::BadRange(60.0, 40.0))
        );
    }
}
