use super::{Input, ReportAssembler};
use crate::aggregation::Dimension;
use crate::error::AnalyticsError;
use crate::report::{
    Benchmark, BrandSummary, HistoryEntry, LogoEntry, Position, ProducerReport, RegionalComparison,
};
use crate::stats::{money, round2};
use core_types::{BrandRegistration, StatusChangeEvent};
use std::cmp::Reverse;

impl ReportAssembler {
    /// Report on a single brand and how it compares with its peers.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when no valid registration has id `brand_id`.
    pub(super) fn producer(&self, brand_id: u64, input: &Input<'_>) -> Result<ProducerReport, AnalyticsError> {
        let brand = input
            .registrations
            .iter()
            .find(|r| r.id == brand_id)
            .ok_or(AnalyticsError::RecordNotFound(brand_id))?;

        let mut events: Vec<StatusChangeEvent> = input
            .events
            .iter()
            .filter(|e| e.brand_id == brand_id)
            .cloned()
            .collect();
        let reversals = self.trends.detect_reversals(&events);
        events.sort_by_key(|e| Reverse((e.changed_at, e.id)));

        let mut logos = input.logos_where(|l| l.brand_id == brand_id);
        logos.sort_by_key(|l| Reverse((l.generated_at, l.id)));

        tracing::debug!(brand_id, events = events.len(), logos = logos.len(), "Producer report computed.");

        Ok(ProducerReport {
            brand: summary(brand),
            history: events
                .into_iter()
                .map(|e| HistoryEntry {
                    changed_at: e.changed_at,
                    from_status: e.from_status,
                    to_status: e.to_status,
                    responsible_user: e.responsible_user,
                    note: e.note,
                })
                .collect(),
            logos: logos
                .into_iter()
                .map(|l| LogoEntry {
                    ai_model: l.ai_model,
                    quality_tier: l.quality_tier,
                    success: l.success,
                    generated_at: l.generated_at,
                })
                .collect(),
            regional_comparison: self.regional_comparison(brand, &input.registrations),
            benchmark: self.benchmark(brand, &input.registrations),
            reversals,
        })
    }

    /// The brand against the other brands of its department and purpose.
    fn regional_comparison(&self, brand: &BrandRegistration, registrations: &[BrandRegistration]) -> RegionalComparison {
        let peers = self
            .aggregation
            .summarize_where(
                registrations,
                |r| r.id != brand.id && r.department == brand.department && r.purpose == brand.purpose,
                Dimension::Department,
            )
            .total;

        RegionalComparison {
            peers: peers.count,
            avg_head_count: peers.avg_head_count,
            avg_certification_amount: peers.avg_certification_amount,
            head_count_position: Position::of(f64::from(brand.head_count), peers.avg_head_count),
            certification_position: Position::of(money(brand.certification_amount), peers.avg_certification_amount),
        }
    }

    /// Percentiles among brands sharing department, breed and purpose, the brand included.
    fn benchmark(&self, brand: &BrandRegistration, registrations: &[BrandRegistration]) -> Benchmark {
        let market: Vec<&BrandRegistration> = registrations
            .iter()
            .filter(|r| {
                r.department == brand.department && r.breed == brand.breed && r.purpose == brand.purpose
            })
            .collect();
        let heads: Vec<f64> = market.iter().map(|r| f64::from(r.head_count)).collect();
        let amounts: Vec<f64> = market.iter().map(|r| money(r.certification_amount)).collect();

        Benchmark {
            compared_brands: market.len(),
            reference_market: format!(
                "{} / {} / {}",
                brand.breed.display_name(),
                brand.purpose.display_name(),
                brand.department.display_name()
            ),
            head_count: self
                .aggregation
                .percentile_rank(f64::from(brand.head_count), &heads),
            certification_amount: self
                .aggregation
                .percentile_rank(money(brand.certification_amount), &amounts),
        }
    }
}

fn summary(brand: &BrandRegistration) -> BrandSummary {
    BrandSummary {
        id: brand.id,
        brand_number: brand.brand_number.clone(),
        producer_name: brand.producer_name.clone(),
        breed: brand.breed.code().to_string(),
        purpose: brand.purpose.code().to_string(),
        head_count: brand.head_count,
        department: brand.department.code().to_string(),
        location: format!("{}, {}", brand.municipality, brand.department.display_name()),
        status: brand.status,
        certification_amount: money(brand.certification_amount),
        registered_at: brand.registered_at,
        processing_hours: brand.processing_hours().map(round2),
    }
}
