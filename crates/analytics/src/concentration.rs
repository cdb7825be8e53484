use crate::stats::{clamp_score, ratio, round2};
use serde::Serialize;

/// Market structure implied by an HHI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    /// HHI below 1500.
    HighCompetition,
    /// HHI from 1500 to 2500, both inclusive.
    ModerateCompetition,
    /// HHI above 2500.
    HighConcentration,
}

impl ConcentrationLevel {
    pub fn from_hhi(hhi: f64) -> Self {
        if hhi < 1500.0 {
            ConcentrationLevel::HighCompetition
        } else if hhi <= 2500.0 {
            ConcentrationLevel::ModerateCompetition
        } else {
            ConcentrationLevel::HighConcentration
        }
    }
}

/// Concentration and inequality of one distribution of shares.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationIndex {
    /// Herfindahl–Hirschman index in `[0, 10000]`.
    pub hhi: f64,
    /// Gini coefficient in `[0, 1]`, 0 for perfect equality.
    pub gini: f64,
    /// Inverse Simpson index, 0 for an empty distribution.
    pub effective_diversity_count: f64,
    pub classification: ConcentrationLevel,
    /// Shares dropped for being non-finite or outside `[0, 1]`.
    pub excluded: usize,
}

/// Computes market-concentration and inequality indices.
#[derive(Debug, Default)]
pub struct ConcentrationAnalyzer {}

impl ConcentrationAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// HHI, Gini and effective diversity count of `shares`.
    ///
    /// Each share is expected in `[0, 1]`. Shares outside that range are
    /// skipped and counted in `excluded`. An empty or all-zero input produces
    /// zeros everywhere.
    pub fn concentration(&self, shares: &[f64]) -> ConcentrationIndex {
        let valid: Vec<f64> = shares
            .iter()
            .copied()
            .filter(|s| s.is_finite() && (0.0..=1.0).contains(s))
            .collect();
        let excluded = shares.len() - valid.len();
        if excluded > 0 {
            tracing::debug!(excluded, "Skipping out-of-range shares.");
        }

        let sum_of_squares: f64 = valid.iter().map(|s| s * s).sum();
        let hhi = round2(sum_of_squares * 10_000.0).min(10_000.0);

        ConcentrationIndex {
            hhi,
            gini: self.gini(&valid),
            effective_diversity_count: round2(ratio(1.0, sum_of_squares)),
            classification: ConcentrationLevel::from_hhi(hhi),
            excluded,
        }
    }

    /// Convenience over [`Self::concentration`] for raw, non-negative amounts.
    pub fn concentration_of_values(&self, values: &[f64]) -> ConcentrationIndex {
        self.concentration(&shares_from_values(values))
    }

    /// Gini coefficient of non-negative `values`, rounded to 4 decimals.
    ///
    /// Sorted ascending, `Σ (2i - n - 1) * x_i / (n * Σx)` for `i = 1..n`.
    /// Negative and non-finite values are ignored.
    pub fn gini(&self, values: &[f64]) -> f64 {
        let mut sorted: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len() as f64;
        let total: f64 = sorted.iter().sum();
        let weighted: f64 = sorted
            .iter()
            .enumerate()
            .map(|(idx, x)| (2.0 * (idx as f64 + 1.0) - n - 1.0) * x)
            .sum();

        let gini = ratio(weighted, n * total).clamp(0.0, 1.0);
        (gini * 10_000.0).round() / 10_000.0
    }

    /// HHI points contributed by a single share.
    pub fn hhi_contribution(&self, share: f64) -> f64 {
        round2(share * share * 10_000.0)
    }

    /// `(1 - HHI / 10000) * 100`: 0 for a single group, near 100 for many small ones.
    pub fn diversification_score(&self, shares: &[f64]) -> f64 {
        let hhi = self.concentration(shares).hhi;
        round2(clamp_score((1.0 - hhi / 10_000.0) * 100.0))
    }

    /// `min(100, Σ p^1.5 * 100)` over breed shares.
    pub fn genetic_diversity_score(&self, shares: &[f64]) -> f64 {
        let score: f64 = shares
            .iter()
            .filter(|s| s.is_finite() && **s > 0.0)
            .map(|s| s.powf(1.5))
            .sum::<f64>()
            * 100.0;
        round2(score.min(100.0))
    }
}

/// Turns non-negative amounts into fractions of their total.
///
/// Negative or non-finite amounts count as 0. A zero total yields all zeros.
pub fn shares_from_values(values: &[f64]) -> Vec<f64> {
    let cleaned: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() && *v > 0.0 { *v } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    cleaned.iter().map(|v| ratio(*v, total)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn three_way_market_is_highly_concentrated() {
        let index = ConcentrationAnalyzer::new().concentration(&[0.5, 0.3, 0.2]);
        assert!(approx_eq(index.hhi, 3800.0));
        assert_eq!(index.classification, ConcentrationLevel::HighConcentration);
        assert!(approx_eq(index.effective_diversity_count, 2.63));
    }

    #[test]
    fn monopoly_reaches_the_upper_bound() {
        let index = ConcentrationAnalyzer::new().concentration(&[1.0, 0.0, 0.0]);
        assert_eq!(index.hhi, 10_000.0);
        assert_eq!(index.effective_diversity_count, 1.0);
    }

    #[test]
    fn empty_and_zero_inputs_are_all_zero() {
        let analyzer = ConcentrationAnalyzer::new();
        for shares in [vec![], vec![0.0, 0.0]] {
            let index = analyzer.concentration(&shares);
            assert_eq!(index.hhi, 0.0);
            assert_eq!(index.gini, 0.0);
            assert_eq!(index.effective_diversity_count, 0.0);
        }
    }

    #[test]
    fn gini_of_equal_values_is_zero() {
        let analyzer = ConcentrationAnalyzer::new();
        assert_eq!(analyzer.gini(&[10.0, 10.0, 10.0, 10.0]), 0.0);
        // One holder of everything among four: (n - 1) / n.
        assert!(approx_eq(analyzer.gini(&[0.0, 0.0, 0.0, 40.0]), 0.75));
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(ConcentrationLevel::from_hhi(1499.99), ConcentrationLevel::HighCompetition);
        assert_eq!(ConcentrationLevel::from_hhi(1500.0), ConcentrationLevel::ModerateCompetition);
        assert_eq!(ConcentrationLevel::from_hhi(2500.0), ConcentrationLevel::ModerateCompetition);
        assert_eq!(ConcentrationLevel::from_hhi(2500.01), ConcentrationLevel::HighConcentration);
    }

    #[test]
    fn out_of_range_shares_are_excluded() {
        let index = ConcentrationAnalyzer::new().concentration(&[0.6, 1.4, f64::NAN, 0.4]);
        assert_eq!(index.excluded, 2);
        assert!(approx_eq(index.hhi, 5200.0));
    }

    #[test]
    fn diversity_scores() {
        let analyzer = ConcentrationAnalyzer::new();
        assert_eq!(analyzer.diversification_score(&[1.0]), 0.0);
        assert!(approx_eq(analyzer.diversification_score(&[0.25; 4]), 75.0));
        assert_eq!(analyzer.genetic_diversity_score(&[1.0]), 100.0);
        assert!(approx_eq(analyzer.genetic_diversity_score(&[0.25; 4]), 50.0));
        assert_eq!(shares_from_values(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
