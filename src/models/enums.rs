use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(FeatureType {
    Demographic => "demographic",
    Symptom => "symptom",
    Diagnosis => "diagnosis",
    Risk => "risk",
    Category => "category",
});

str_enum!(DocumentState {
    Pending => "pending",
    Extracting => "extracting",
    Normalized => "normalized",
    Failed => "failed",
    Skipped => "skipped",
});

/// Fixed medical department enumeration the extractor is asked to choose from.
///
/// Labels are case-sensitive and include the `" / "` separators verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MedicalDepartment {
    Cardiology,
    Neurology,
    Orthopedics,
    Pulmonology,
    Gastroenterology,
    Endocrinology,
    Oncology,
    Dermatology,
    InfectiousDiseases,
    Psychiatry,
    ObstetricsGynecology,
    Radiology,
}

impl MedicalDepartment {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cardiology => "Cardiology",
            Self::Neurology => "Neurology",
            Self::Orthopedics => "Orthopedics / Musculoskeletal",
            Self::Pulmonology => "Pulmonology",
            Self::Gastroenterology => "Gastroenterology",
            Self::Endocrinology => "Endocrinology",
            Self::Oncology => "Oncology",
            Self::Dermatology => "Dermatology",
            Self::InfectiousDiseases => "Infectious Diseases",
            Self::Psychiatry => "Psychiatry / Behavioral",
            Self::ObstetricsGynecology => "Obstetrics / Gynecology",
            Self::Radiology => "Radiology",
        }
    }

    pub fn all() -> &'static [MedicalDepartment] {
        &[
            Self::Cardiology,
            Self::Neurology,
            Self::Orthopedics,
            Self::Pulmonology,
            Self::Gastroenterology,
            Self::Endocrinology,
            Self::Oncology,
            Self::Dermatology,
            Self::InfectiousDiseases,
            Self::Psychiatry,
            Self::ObstetricsGynecology,
            Self::Radiology,
        ]
    }

    /// Exact, case-sensitive lookup.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|d| d.label() == label)
    }
}
