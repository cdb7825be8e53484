use crate::enums::{AiModel, BrandStatus, Breed, Department, Purpose, QualityTier};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// A livestock brand registered by a producer.
///
/// Snapshots of these records are handed to the analytics engine by the
/// persistence layer; the engine never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRegistration {
    pub id: u64,
    pub brand_number: String,
    pub producer_name: String,
    pub producer_id: String,
    pub breed: Breed,
    pub purpose: Purpose,
    pub head_count: u32,
    pub department: Department,
    pub municipality: String,
    #[serde(default)]
    pub community: Option<String>,
    pub status: BrandStatus,
    pub certification_amount: Decimal,
    pub registered_at: DateTime<Utc>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_hours: Option<f64>,
}

impl BrandRegistration {
    /// Checks the invariants a record must satisfy before it can be aggregated.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.head_count == 0 {
            return Err(self.invalid("headCount must be greater than 0"));
        }
        if self.certification_amount < Decimal::ZERO {
            return Err(self.invalid("certificationAmount cannot be negative"));
        }
        if let Some(processed_at) = self.processed_at {
            if processed_at < self.registered_at {
                return Err(self.invalid("processedAt precedes registeredAt"));
            }
        }
        if let Some(hours) = self.processing_hours {
            if !hours.is_finite() || hours < 0.0 {
                return Err(self.invalid("processingHours must be a non-negative number"));
            }
        }
        Ok(())
    }

    /// Hours between registration and processing.
    ///
    /// Uses the stored value when present, otherwise derives it from the two
    /// timestamps. `None` while the brand has not been processed.
    pub fn processing_hours(&self) -> Option<f64> {
        self.processing_hours.or_else(|| {
            self.processed_at
                .map(|p| (p - self.registered_at).num_seconds() as f64 / 3600.0)
        })
    }

    fn invalid(&self, reason: &str) -> CoreError {
        CoreError::InvalidInput(format!("brand registration {}", self.id), reason.to_string())
    }
}

/// One AI logo generation attempt for a brand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoGeneration {
    pub id: u64,
    pub brand_id: u64,
    pub ai_model: AiModel,
    pub success: bool,
    pub quality_tier: QualityTier,
    pub generation_seconds: i64,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub prompt_text: String,
}

impl LogoGeneration {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.generation_seconds < 0 {
            return Err(CoreError::InvalidInput(
                format!("logo generation {}", self.id),
                "generationSeconds cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// An entry of the append-only status audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    pub id: u64,
    pub brand_id: u64,
    #[serde(default)]
    pub from_status: Option<BrandStatus>,
    pub to_status: BrandStatus,
    pub changed_at: DateTime<Utc>,
    pub responsible_user: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Read-only input handed to the engine for a single report request.
///
/// Deserialization is per record: a record that cannot be read (an unknown
/// breed code, a negative head count) is skipped and counted in `unreadable`
/// instead of failing the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct Snapshot {
    pub registrations: Vec<BrandRegistration>,
    pub logos: Vec<LogoGeneration>,
    pub status_events: Vec<StatusChangeEvent>,
    /// Records dropped while reading the snapshot.
    #[serde(skip)]
    pub unreadable: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    registrations: Vec<Lenient<BrandRegistration>>,
    #[serde(default)]
    logos: Vec<Lenient<LogoGeneration>>,
    #[serde(default)]
    status_events: Vec<Lenient<StatusChangeEvent>>,
}

/// One record, read on its own so a failure stays local to it.
struct Lenient<T>(Result<T, String>);

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Lenient(serde_json::from_value(value).map_err(|e| e.to_string())))
    }
}

impl From<RawSnapshot> for Snapshot {
    fn from(raw: RawSnapshot) -> Self {
        let mut unreadable = 0;
        let registrations = readable(raw.registrations, "registration", &mut unreadable);
        let logos = readable(raw.logos, "logo generation", &mut unreadable);
        let status_events = readable(raw.status_events, "status change event", &mut unreadable);
        Snapshot {
            registrations,
            logos,
            status_events,
            unreadable,
        }
    }
}

fn readable<T>(records: Vec<Lenient<T>>, kind: &'static str, unreadable: &mut usize) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, Lenient(record))| match record {
            Ok(record) => Some(record),
            Err(reason) => {
                tracing::debug!(kind, index, %reason, "Skipping unreadable record.");
                *unreadable += 1;
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn brand() -> BrandRegistration {
        BrandRegistration {
            id: 7,
            brand_number: "SC-0007".into(),
            producer_name: "Estancia Las Palmas".into(),
            producer_id: "4839201".into(),
            breed: Breed::Nelore,
            purpose: Purpose::Meat,
            head_count: 120,
            department: Department::SantaCruz,
            municipality: "Warnes".into(),
            community: None,
            status: BrandStatus::Approved,
            certification_amount: dec!(1500.00),
            registered_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap(),
            processed_at: Some(Utc.with_ymd_and_hms(2024, 3, 3, 20, 0, 0).unwrap()),
            processing_hours: None,
        }
    }

    #[test]
    fn derives_processing_hours_from_timestamps() {
        assert_eq!(brand().processing_hours(), Some(60.0));

        let mut stored = brand();
        stored.processing_hours = Some(12.5);
        assert_eq!(stored.processing_hours(), Some(12.5));
    }

    #[test]
    fn rejects_zero_head_count_and_inverted_timestamps() {
        let mut empty = brand();
        empty.head_count = 0;
        assert!(empty.validate().is_err());

        let mut inverted = brand();
        inverted.processed_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert!(inverted.validate().is_err());

        assert!(brand().validate().is_ok());
    }

    #[test]
    fn snapshot_deserializes_camel_case_json() {
        let json = r#"{
            "registrations": [{
                "id": 1, "brandNumber": "LP-1", "producerName": "Ana", "producerId": "991",
                "breed": "CRIOLLO", "purpose": "DAIRY", "headCount": 20,
                "department": "LA_PAZ", "municipality": "Achacachi", "status": "PENDING",
                "certificationAmount": 250.5, "registeredAt": "2024-05-02T10:00:00Z"
            }]
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.registrations.len(), 1);
        assert!(snapshot.logos.is_empty());
        assert_eq!(snapshot.registrations[0].certification_amount, dec!(250.5));
        assert_eq!(snapshot.unreadable, 0);
    }

    #[test]
    fn unreadable_records_are_skipped_and_counted() {
        let good = r#"{
            "id": 1, "brandNumber": "LP-1", "producerName": "Ana", "producerId": "991",
            "breed": "CRIOLLO", "purpose": "DAIRY", "headCount": 20,
            "department": "LA_PAZ", "municipality": "Achacachi", "status": "PENDING",
            "certificationAmount": 250.5, "registeredAt": "2024-05-02T10:00:00Z"
        }"#;
        let unknown_breed = good.replace("\"id\": 1", "\"id\": 2").replace("CRIOLLO", "ZEBU");
        let negative_heads = good.replace("\"id\": 1", "\"id\": 3").replace("20,", "-5,");
        let json = format!(
            r#"{{"registrations": [{good}, {unknown_breed}, {negative_heads}], "logos": [{{"id": 9}}]}}"#
        );

        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.registrations.len(), 1);
        assert_eq!(snapshot.registrations[0].id, 1);
        assert!(snapshot.logos.is_empty());
        assert_eq!(snapshot.unreadable, 3);
    }
}
