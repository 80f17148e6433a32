//! Data carried between stages: raw match records, feature rows,
//! predictions, value bets, match results and reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One fixture as delivered by an odds source or a historical dataset.
///
/// Every numeric input defaults to zero so partial feeds still decode;
/// the feature engineer treats missing inputs as neutral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmaker: Option<String>,

    /// Decimal odds for the double-chance + both-teams-to-score market.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<f64>,

    #[serde(default)]
    pub home_player_ratings: Vec<f64>,
    #[serde(default)]
    pub away_player_ratings: Vec<f64>,
    #[serde(default)]
    pub home_form: f64,
    #[serde(default)]
    pub away_form: f64,
    #[serde(default)]
    pub home_coach_rating: f64,
    #[serde(default)]
    pub away_coach_rating: f64,
    #[serde(default)]
    pub home_injuries: Vec<String>,
    #[serde(default)]
    pub away_injuries: Vec<String>,
    #[serde(default)]
    pub home_win_pct: f64,
    #[serde(default)]
    pub away_win_pct: f64,
    #[serde(default)]
    pub transfers: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_rating: Option<f64>,

    /// Known label for historical fixtures (did the market land?).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<bool>,
}

impl MatchRecord {
    pub fn new(
        match_id: impl Into<String>,
        home_team: impl Into<String>,
        away_team: impl Into<String>,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            home_team: home_team.into(),
            away_team: away_team.into(),
            bookmaker: None,
            odds: None,
            home_player_ratings: Vec::new(),
            away_player_ratings: Vec::new(),
            home_form: 0.0,
            away_form: 0.0,
            home_coach_rating: 0.0,
            away_coach_rating: 0.0,
            home_injuries: Vec::new(),
            away_injuries: Vec::new(),
            home_win_pct: 0.0,
            away_win_pct: 0.0,
            transfers: 0,
            weather: None,
            pitch_rating: None,
            outcome: None,
        }
    }
}

/// The fixed model input vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Features {
    pub player_form: f64,
    pub team_form: f64,
    pub coach_form: f64,
    pub injuries: f64,
    pub home_away: f64,
    pub transfers: f64,
    pub weather: f64,
    pub pitch_condition: f64,
}

impl Features {
    pub const LEN: usize = 8;

    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.player_form,
            self.team_form,
            self.coach_form,
            self.injuries,
            self.home_away,
            self.transfers,
            self.weather,
            self.pitch_condition,
        ]
    }
}

/// A fixture after feature engineering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub features: Features,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<bool>,
}

/// One scored fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub probability: f64,
    pub prediction: bool,
    pub confidence: f64,

    #[serde(default)]
    pub bookmaker_odds: Option<f64>,
    #[serde(default)]
    pub implied_probability: Option<f64>,
    #[serde(default)]
    pub value_score: Option<f64>,
}

/// Direction of the mispricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetType {
    Undervalue,
    Overvalue,
}

impl BetType {
    pub fn from_value_score(value_score: f64) -> Self {
        if value_score > 0.0 {
            BetType::Undervalue
        } else {
            BetType::Overvalue
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueBet {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub prediction: bool,
    pub confidence: f64,
    pub probability: f64,
    pub bookmaker_odds: f64,
    pub value_score: f64,
    pub bet_type: BetType,
}

/// Full-time result of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullTime {
    HomeWin,
    AwayWin,
    Draw,
    /// Abandoned or voided; never satisfies the market.
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub result: FullTime,
    pub both_scored: bool,
}

impl MatchResult {
    /// Did the double-chance + both-teams-scored composite hold?
    pub fn market_landed(&self) -> bool {
        matches!(
            self.result,
            FullTime::HomeWin | FullTime::AwayWin | FullTime::Draw
        ) && self.both_scored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    #[default]
    ValueBets,
    PerformanceUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub win_rate: f64,
    pub roi: f64,
    pub settled: usize,
    pub wins: usize,
}

/// What the reporter hands to the sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub report_type: ReportType,
    pub value_bets: Vec<ValueBet>,
    pub performance: PerformanceSummary,
    pub generated_at: DateTime<Utc>,
}
