//! StageType - the tag carried by every envelope.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of work an envelope asks for.
///
/// The conductor dispatches on this tag; each variant has exactly one
/// registered `Stage` implementation at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageType {
    Collector,
    FeatureEngineer,
    Trainer,
    Retrainer,
    Predictor,
    QualityReviewer,
    ValueIdentifier,
    ValueAnalyzer,
    Reporter,
    Repair,
}

impl StageType {
    pub const ALL: [StageType; 10] = [
        StageType::Collector,
        StageType::FeatureEngineer,
        StageType::Trainer,
        StageType::Retrainer,
        StageType::Predictor,
        StageType::QualityReviewer,
        StageType::ValueIdentifier,
        StageType::ValueAnalyzer,
        StageType::Reporter,
        StageType::Repair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageType::Collector => "collector",
            StageType::FeatureEngineer => "feature_engineer",
            StageType::Trainer => "trainer",
            StageType::Retrainer => "retrainer",
            StageType::Predictor => "predictor",
            StageType::QualityReviewer => "quality_reviewer",
            StageType::ValueIdentifier => "value_identifier",
            StageType::ValueAnalyzer => "value_analyzer",
            StageType::Reporter => "reporter",
            StageType::Repair => "repair",
        }
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage type '{0}'")]
pub struct UnknownStageType(pub String);

impl FromStr for StageType {
    type Err = UnknownStageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| UnknownStageType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde_name() {
        for ty in StageType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{ty}\""));
        }
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!(
            "quality_reviewer".parse::<StageType>().unwrap(),
            StageType::QualityReviewer
        );
        assert!("data_repair_agent".parse::<StageType>().is_err());
    }
}
