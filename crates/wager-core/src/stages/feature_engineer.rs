//! FeatureEngineer: raw match records -> fixed-width feature rows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trainer::TrainerInput;
use super::{Stage, StageContext};
use crate::domain::{
    FeatureRow, Features, MatchRecord, Outcome, StageError, StageInput, StageType, TaskEnvelope,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureEngineerInput {
    pub records: Vec<MatchRecord>,
}

impl StageInput for FeatureEngineerInput {
    const STAGE: StageType = StageType::FeatureEngineer;
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        0.0
    } else {
        xs.iter().sum::<f64>() / xs.len() as f64
    }
}

fn injury_load(injuries: &[String]) -> f64 {
    (0.1 * injuries.len() as f64).min(1.0)
}

/// Derive the model input vector for one fixture. Pure.
pub fn engineer_features(record: &MatchRecord) -> Features {
    let weather = match record.weather.as_deref() {
        Some("Rain") | Some("Snow") => 0.8,
        _ => 1.0,
    };
    let pitch_condition = match record.pitch_rating {
        Some(r) if r > 7.0 => 1.0,
        Some(r) if r > 5.0 => 0.7,
        _ => 0.5,
    };

    Features {
        player_form: mean(&record.home_player_ratings) - mean(&record.away_player_ratings),
        team_form: (record.home_form + record.away_form) / 2.0,
        coach_form: (record.home_coach_rating + record.away_coach_rating) / 2.0,
        injuries: injury_load(&record.home_injuries) - injury_load(&record.away_injuries),
        home_away: record.home_win_pct - record.away_win_pct,
        transfers: f64::from(record.transfers),
        weather,
        pitch_condition,
    }
}

pub struct FeatureEngineer;

#[async_trait]
impl Stage for FeatureEngineer {
    fn stage_type(&self) -> StageType {
        StageType::FeatureEngineer
    }

    async fn execute(
        &self,
        envelope: &TaskEnvelope,
        ctx: &mut StageContext<'_>,
    ) -> Result<Outcome, StageError> {
        let input: FeatureEngineerInput = envelope.decode()?;

        let rows: Vec<FeatureRow> = input
            .records
            .iter()
            .map(|r| FeatureRow {
                match_id: r.match_id.clone(),
                home_team: r.home_team.clone(),
                away_team: r.away_team.clone(),
                features: engineer_features(r),
                label: r.outcome,
            })
            .collect();
        debug!(rows = rows.len(), "engineered features");

        let row_count = rows.len();
        let next = ctx.spawn(&TrainerInput {
            rows: Some(rows),
            model_type: Some(ctx.config.model_type.clone()),
            reason: None,
        })?;

        Ok(Outcome::success()
            .with("rows", row_count)
            .with("feature_count", Features::LEN)
            .spawn(next))
    }
}
