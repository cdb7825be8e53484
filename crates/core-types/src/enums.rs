use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a closed set of registry codes together with their display names.
///
/// Every generated enum gets `ALL`, `code()`, `display_name()`, `Display` and a
/// `FromStr` that accepts the registry code case-insensitively.
macro_rules! registry_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => ($code:literal, $display:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The code stored by the registry, e.g. `SANTA_CRUZ`.
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// The human-readable label shown in reports.
            pub fn display_name(&self) -> &'static str {
                match self {
                    $($name::$variant => $display,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.code().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| CoreError::UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

registry_enum! {
    /// Cattle breeds accepted by the brand registry.
    Breed, "breed" {
        Criollo => ("CRIOLLO", "Criollo"),
        Nelore => ("NELORE", "Nelore"),
        Brahman => ("BRAHMAN", "Brahman"),
        SantaGertrudis => ("SANTA_GERTRUDIS", "Santa Gertrudis"),
        Charolais => ("CHAROLAIS", "Charolais"),
        Holstein => ("HOLSTEIN", "Holstein"),
        Simmental => ("SIMMENTAL", "Simmental"),
        Angus => ("ANGUS", "Angus"),
        Hereford => ("HEREFORD", "Hereford"),
        Guzerat => ("GUZERAT", "Guzerat"),
        Mixed => ("MIXTO", "Mixto"),
        Other => ("OTRO", "Otro"),
    }
}

registry_enum! {
    /// What a herd is raised for.
    Purpose, "purpose" {
        Meat => ("MEAT", "Meat"),
        Dairy => ("DAIRY", "Dairy"),
        Dual => ("DUAL", "Dual purpose"),
        Breeding => ("BREEDING", "Breeding"),
    }
}

registry_enum! {
    /// The nine departments covered by the registry.
    Department, "department" {
        LaPaz => ("LA_PAZ", "La Paz"),
        SantaCruz => ("SANTA_CRUZ", "Santa Cruz"),
        Cochabamba => ("COCHABAMBA", "Cochabamba"),
        Potosi => ("POTOSI", "Potosí"),
        Oruro => ("ORURO", "Oruro"),
        Chuquisaca => ("CHUQUISACA", "Chuquisaca"),
        Tarija => ("TARIJA", "Tarija"),
        Beni => ("BENI", "Beni"),
        Pando => ("PANDO", "Pando"),
    }
}

registry_enum! {
    /// Lifecycle state of a brand registration.
    BrandStatus, "status" {
        Pending => ("PENDING", "Pending"),
        InProgress => ("IN_PROGRESS", "In progress"),
        Approved => ("APPROVED", "Approved"),
        Rejected => ("REJECTED", "Rejected"),
    }
}

registry_enum! {
    /// Image models used to generate brand logos.
    AiModel, "ai_model" {
        Gpt4 => ("GPT_4", "GPT-4"),
        DallE3 => ("DALL_E_3", "DALL-E 3"),
        DallE2 => ("DALL_E_2", "DALL-E 2"),
        Midjourney => ("MIDJOURNEY", "Midjourney"),
        StableDiffusion => ("STABLE_DIFFUSION", "Stable Diffusion"),
        LeonardoAi => ("LEONARDO_AI", "Leonardo AI"),
    }
}

registry_enum! {
    /// Reviewer-assigned quality of a generated logo.
    QualityTier, "quality_tier" {
        High => ("HIGH", "High"),
        Medium => ("MEDIUM", "Medium"),
        Low => ("LOW", "Low"),
    }
}

impl BrandStatus {
    /// Approved and rejected registrations have left the processing queue.
    pub fn is_processed(&self) -> bool {
        matches!(self, BrandStatus::Approved | BrandStatus::Rejected)
    }

    /// Position in the forward lifecycle PENDING → IN_PROGRESS → {APPROVED, REJECTED}.
    fn stage(&self) -> u8 {
        match self {
            BrandStatus::Pending => 0,
            BrandStatus::InProgress => 1,
            BrandStatus::Approved | BrandStatus::Rejected => 2,
        }
    }

    /// True when moving `from` → `to` goes against the lifecycle, including a
    /// switch between the two terminal states.
    pub fn is_backward(from: BrandStatus, to: BrandStatus) -> bool {
        to.stage() < from.stage() || (from.stage() == 2 && to.stage() == 2 && from != to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_from_str() {
        for dept in Department::ALL {
            assert_eq!(dept.code().parse::<Department>().unwrap(), *dept);
        }
        assert_eq!("santa_gertrudis".parse::<Breed>().unwrap(), Breed::SantaGertrudis);
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = "ATLANTIS".parse::<Department>().unwrap_err();
        assert!(matches!(err, CoreError::UnknownVariant { kind: "department", .. }));
    }

    #[test]
    fn backward_transitions() {
        assert!(!BrandStatus::is_backward(BrandStatus::Pending, BrandStatus::InProgress));
        assert!(!BrandStatus::is_backward(BrandStatus::InProgress, BrandStatus::Rejected));
        assert!(BrandStatus::is_backward(BrandStatus::Approved, BrandStatus::InProgress));
        assert!(BrandStatus::is_backward(BrandStatus::Rejected, BrandStatus::Approved));
    }

    #[test]
    fn serializes_as_registry_code() {
        let json = serde_json::to_string(&Department::SantaCruz).unwrap();
        assert_eq!(json, "\"SANTA_CRUZ\"");
        assert_eq!(Department::ALL.len(), 9);
        assert_eq!(Breed::ALL.len(), 12);
    }
}
