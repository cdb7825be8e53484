use crate::concentration::ConcentrationAnalyzer;
use crate::error::AnalyticsError;
use crate::stats::{clamp_score, mean, round2};
use serde::Serialize;

/// Tolerance on the sum of composite weights.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Departments covered by the registry, the denominator of the social score.
const DEPARTMENT_COUNT: f64 = 9.0;

/// One named sub-score and its weight in a composite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightedComponent {
    pub name: &'static str,
    pub value: f64,
    pub weight: f64,
}

impl WeightedComponent {
    pub fn new(name: &'static str, value: f64, weight: f64) -> Self {
        Self { name, value, weight }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeScore {
    pub score: f64,
    /// The components after clamping to `[0, 100]`.
    pub components: Vec<WeightedComponent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyTier {
    Excellent,
    Good,
    Acceptable,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfficiencyScore {
    pub score: f64,
    pub tier: EfficiencyTier,
    pub time_score: f64,
    pub approval_score: f64,
    pub volume_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitivenessTier {
    NationalLeader,
    StrongCompetitor,
    MidMarket,
    DevelopmentPotential,
}

/// Raw indicators of one region, turned into sub-scores by [`ScoringEngine::competitiveness`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionalIndicators {
    /// Share of national registrations, in percent.
    pub registration_share: f64,
    /// Share of national head count, in percent.
    pub head_share: f64,
    pub approval_rate: f64,
    pub avg_head_count: f64,
    pub revenue_per_head: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitivenessScore {
    pub score: f64,
    pub tier: CompetitivenessTier,
    pub participation: f64,
    pub efficiency: f64,
    pub productivity: f64,
    pub profitability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SustainabilityTier {
    HighlySustainable,
    Sustainable,
    InTransition,
    RequiresIntervention,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SustainabilityScore {
    pub score: f64,
    pub tier: SustainabilityTier,
    pub economic: f64,
    pub social: f64,
    pub environmental: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    Excellent,
    Good,
    Acceptable,
    NeedsAttention,
}

/// Operational indicators feeding [`ScoringEngine::system_health`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthIndicators {
    /// `None` when nothing was processed.
    pub avg_processing_hours: Option<f64>,
    /// `None` when nothing was approved or rejected.
    pub approval_rate: Option<f64>,
    pub daily_registrations: f64,
    pub logos: usize,
    pub registrations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub score: f64,
    pub tier: HealthTier,
    pub availability: f64,
    pub efficiency: f64,
    pub quality: f64,
    pub capacity: f64,
    pub ai_adoption: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectorMomentum {
    pub score: f64,
    pub diversity: f64,
    pub volume: f64,
}

/// Combines normalised sub-metrics into weighted composite scores.
///
/// The weights and tier thresholds of the named scores are fixed. Every
/// sub-score is clamped to `[0, 100]` before weighting.
#[derive(Debug, Default)]
pub struct ScoringEngine {
    concentration: ConcentrationAnalyzer,
}

impl ScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weighted sum of `components`.
    ///
    /// # Errors
    ///
    /// `InvalidWeights` when there are no components, a weight is negative or
    /// not finite, or the weights do not sum to 1.0.
    pub fn composite(&self, components: &[WeightedComponent]) -> Result<CompositeScore, AnalyticsError> {
        if components.is_empty() {
            return Err(AnalyticsError::InvalidWeights("no components to combine".to_string()));
        }
        if let Some(bad) = components.iter().find(|c| !c.weight.is_finite() || c.weight < 0.0) {
            return Err(AnalyticsError::InvalidWeights(format!(
                "weight of '{}' must be a non-negative number, got {}",
                bad.name, bad.weight
            )));
        }
        let total_weight: f64 = components.iter().map(|c| c.weight).sum();
        if (total_weight - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AnalyticsError::InvalidWeights(format!(
                "weights must sum to 1.0, got {total_weight}"
            )));
        }

        // Weighted at full precision, rounded only for output.
        let score = components
            .iter()
            .map(|c| clamp_score(c.value) * c.weight)
            .sum::<f64>();
        let reported = components
            .iter()
            .map(|c| WeightedComponent::new(c.name, round2(clamp_score(c.value)), c.weight))
            .collect();

        Ok(CompositeScore {
            score: round2(clamp_score(score)),
            components: reported,
        })
    }

    /// `time * 0.4 + approval * 0.4 + volume * 0.2`.
    ///
    /// `time = 100 - (hours - 24) * 1.5` and `volume = registrations * 2`,
    /// both clamped. Tiers: 85 excellent, 70 good, 55 acceptable.
    pub fn efficiency(
        &self,
        avg_processing_hours: f64,
        approval_rate: f64,
        registrations: usize,
    ) -> Result<EfficiencyScore, AnalyticsError> {
        let time_score = 100.0 - (avg_processing_hours - 24.0) * 1.5;
        let volume_score = registrations as f64 * 2.0;

        let composite = self.composite(&[
            WeightedComponent::new("time", time_score, 0.4),
            WeightedComponent::new("approval", approval_rate, 0.4),
            WeightedComponent::new("volume", volume_score, 0.2),
        ])?;

        let tier = match composite.score {
            s if s >= 85.0 => EfficiencyTier::Excellent,
            s if s >= 70.0 => EfficiencyTier::Good,
            s if s >= 55.0 => EfficiencyTier::Acceptable,
            _ => EfficiencyTier::NeedsImprovement,
        };

        Ok(EfficiencyScore {
            score: composite.score,
            tier,
            time_score: composite.components[0].value,
            approval_score: composite.components[1].value,
            volume_score: composite.components[2].value,
        })
    }

    /// `participation * 0.30 + efficiency * 0.25 + productivity * 0.25 + profitability * 0.20`.
    ///
    /// Participation averages the registration and head-count shares,
    /// productivity reaches 100 at 100 head per brand and profitability at
    /// 20 of revenue per head.
    pub fn competitiveness(&self, region: &RegionalIndicators) -> Result<CompetitivenessScore, AnalyticsError> {
        let composite = self.composite(&[
            WeightedComponent::new(
                "participation",
                mean(&[region.registration_share, region.head_share]),
                0.30,
            ),
            WeightedComponent::new("efficiency", region.approval_rate, 0.25),
            WeightedComponent::new("productivity", region.avg_head_count / 100.0 * 100.0, 0.25),
            WeightedComponent::new("profitability", region.revenue_per_head / 20.0 * 100.0, 0.20),
        ])?;

        let tier = match composite.score {
            s if s >= 80.0 => CompetitivenessTier::NationalLeader,
            s if s >= 60.0 => CompetitivenessTier::StrongCompetitor,
            s if s >= 40.0 => CompetitivenessTier::MidMarket,
            _ => CompetitivenessTier::DevelopmentPotential,
        };

        Ok(CompetitivenessScore {
            score: composite.score,
            tier,
            participation: composite.components[0].value,
            efficiency: composite.components[1].value,
            productivity: composite.components[2].value,
            profitability: composite.components[3].value,
        })
    }

    /// `economic * 0.40 + social * 0.35 + environmental * 0.25`.
    ///
    /// # Arguments
    ///
    /// * `purpose_shares` - Registration shares per purpose; economic score is
    ///   their diversification.
    /// * `active_departments` - Departments with at least one registration.
    /// * `breed_shares` - Head-count shares per breed for the genetic score.
    pub fn sustainability(
        &self,
        purpose_shares: &[f64],
        active_departments: usize,
        breed_shares: &[f64],
    ) -> Result<SustainabilityScore, AnalyticsError> {
        let economic = if purpose_shares.iter().all(|s| *s == 0.0) {
            0.0
        } else {
            self.concentration.diversification_score(purpose_shares)
        };
        let social = active_departments as f64 / DEPARTMENT_COUNT * 100.0;
        let environmental = self.concentration.genetic_diversity_score(breed_shares);

        let composite = self.composite(&[
            WeightedComponent::new("economic", economic, 0.40),
            WeightedComponent::new("social", social, 0.35),
            WeightedComponent::new("environmental", environmental, 0.25),
        ])?;

        let tier = match composite.score {
            s if s >= 80.0 => SustainabilityTier::HighlySustainable,
            s if s >= 60.0 => SustainabilityTier::Sustainable,
            s if s >= 40.0 => SustainabilityTier::InTransition,
            _ => SustainabilityTier::RequiresIntervention,
        };

        Ok(SustainabilityScore {
            score: composite.score,
            tier,
            economic: composite.components[0].value,
            social: composite.components[1].value,
            environmental: composite.components[2].value,
        })
    }

    /// Operational health of the registry for the executive dashboard.
    pub fn system_health(&self, indicators: &HealthIndicators) -> Result<SystemHealth, AnalyticsError> {
        let efficiency = indicators
            .avg_processing_hours
            .map_or(100.0, |h| 100.0 - (h - 24.0) * 2.0);
        let quality = indicators.approval_rate.unwrap_or(100.0);
        let capacity = indicators.daily_registrations / 50.0 * 100.0;
        let ai_adoption = if indicators.registrations == 0 {
            0.0
        } else {
            indicators.logos as f64 / indicators.registrations as f64 * 100.0
        };

        let composite = self.composite(&[
            WeightedComponent::new("availability", 100.0, 0.25),
            WeightedComponent::new("efficiency", efficiency, 0.25),
            WeightedComponent::new("quality", quality, 0.25),
            WeightedComponent::new("capacity", capacity, 0.15),
            WeightedComponent::new("ai_adoption", ai_adoption, 0.10),
        ])?;

        let tier = match composite.score {
            s if s >= 90.0 => HealthTier::Excellent,
            s if s >= 75.0 => HealthTier::Good,
            s if s >= 60.0 => HealthTier::Acceptable,
            _ => HealthTier::NeedsAttention,
        };

        Ok(SystemHealth {
            score: composite.score,
            tier,
            availability: composite.components[0].value,
            efficiency: composite.components[1].value,
            quality: composite.components[2].value,
            capacity: composite.components[3].value,
            ai_adoption: composite.components[4].value,
        })
    }

    /// `diversity * 0.6 + volume * 0.4` over the activity of a period.
    pub fn momentum(
        &self,
        departments: usize,
        breeds: usize,
        purposes: usize,
        registrations: usize,
    ) -> Result<SectorMomentum, AnalyticsError> {
        let diversity = departments as f64 * 11.1 + breeds as f64 * 8.33 + purposes as f64 * 25.0;
        let volume = registrations as f64 * 2.0;

        let composite = self.composite(&[
            WeightedComponent::new("diversity", diversity, 0.6),
            WeightedComponent::new("volume", volume, 0.4),
        ])?;

        Ok(SectorMomentum {
            score: composite.score,
            diversity: composite.components[0].value,
            volume: composite.components[1].value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn weights_must_sum_to_one() {
        let engine = ScoringEngine::new();
        let err = engine
            .composite(&[
                WeightedComponent::new("a", 50.0, 0.5),
                WeightedComponent::new("b", 50.0, 0.4),
            ])
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_weights");
        assert!(engine.composite(&[]).is_err());
        assert!(engine
            .composite(&[WeightedComponent::new("a", 50.0, -1.0), WeightedComponent::new("b", 1.0, 2.0)])
            .is_err());
    }

    #[test]
    fn sub_scores_are_clamped_before_weighting() {
        let score = ScoringEngine::new()
            .composite(&[
                WeightedComponent::new("a", 250.0, 0.5),
                WeightedComponent::new("b", -40.0, 0.5),
            ])
            .unwrap();
        assert_eq!(score.score, 50.0);
        assert_eq!(score.components[0].value, 100.0);
        assert_eq!(score.components[1].value, 0.0);
    }

    #[test]
    fn only_the_weighted_result_is_rounded() {
        // Rounding 10.004 and 10.009 first would give 10.0025, reported as 10.0.
        let score = ScoringEngine::new()
            .composite(&[
                WeightedComponent::new("a", 10.004, 0.75),
                WeightedComponent::new("b", 10.009, 0.25),
            ])
            .unwrap();
        assert_eq!(score.score, 10.01);
        assert_eq!(score.components[0].value, 10.0);
        assert_eq!(score.components[1].value, 10.01);
    }

    #[test]
    fn efficiency_formula_and_tiers() {
        let engine = ScoringEngine::new();
        // time = 100 - 24 * 1.5 = 64, approval 80, volume = min(100, 60) = 60
        let score = engine.efficiency(48.0, 80.0, 30).unwrap();
        assert!(approx_eq(score.time_score, 64.0));
        assert!(approx_eq(score.score, 69.6));
        assert_eq!(score.tier, EfficiencyTier::Acceptable);

        let fast = engine.efficiency(12.0, 100.0, 80).unwrap();
        assert_eq!(fast.score, 100.0);
        assert_eq!(fast.tier, EfficiencyTier::Excellent);

        let slow = engine.efficiency(200.0, 10.0, 1).unwrap();
        assert_eq!(slow.time_score, 0.0);
        assert_eq!(slow.tier, EfficiencyTier::NeedsImprovement);
    }

    #[test]
    fn competitiveness_of_a_strong_region() {
        let region = RegionalIndicators {
            registration_share: 40.0,
            head_share: 60.0,
            approval_rate: 90.0,
            avg_head_count: 150.0,
            revenue_per_head: 10.0,
        };
        let score = ScoringEngine::new().competitiveness(&region).unwrap();
        assert_eq!(score.participation, 50.0);
        assert_eq!(score.productivity, 100.0);
        assert_eq!(score.profitability, 50.0);
        // 15 + 22.5 + 25 + 10
        assert!(approx_eq(score.score, 72.5));
        assert_eq!(score.tier, CompetitivenessTier::StrongCompetitor);
    }

    #[test]
    fn sustainability_components() {
        let score = ScoringEngine::new()
            .sustainability(&[0.25, 0.25, 0.25, 0.25], 9, &[1.0])
            .unwrap();
        assert!(approx_eq(score.economic, 75.0));
        assert_eq!(score.social, 100.0);
        assert_eq!(score.environmental, 100.0);
        assert!(approx_eq(score.score, 30.0 + 35.0 + 25.0));
        assert_eq!(score.tier, SustainabilityTier::HighlySustainable);

        let empty = ScoringEngine::new().sustainability(&[], 0, &[]).unwrap();
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.tier, SustainabilityTier::RequiresIntervention);
    }

    #[test]
    fn system_health_defaults_without_processing_data() {
        let health = ScoringEngine::new()
            .system_health(&HealthIndicators {
                avg_processing_hours: None,
                approval_rate: None,
                daily_registrations: 25.0,
                logos: 5,
                registrations: 10,
            })
            .unwrap();
        assert_eq!(health.efficiency, 100.0);
        assert_eq!(health.quality, 100.0);
        assert_eq!(health.capacity, 50.0);
        assert_eq!(health.ai_adoption, 50.0);
        // 25 + 25 + 25 + 7.5 + 5
        assert!(approx_eq(health.score, 87.5));
        assert_eq!(health.tier, HealthTier::Good);
    }

    #[test]
    fn momentum_caps_each_part() {
        let momentum = ScoringEngine::new().momentum(9, 12, 4, 10).unwrap();
        assert_eq!(momentum.diversity, 100.0);
        assert_eq!(momentum.volume, 20.0);
        assert!(approx_eq(momentum.score, 68.0));
    }
}
