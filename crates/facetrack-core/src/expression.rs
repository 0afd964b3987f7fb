//! Facial expression labels and the arg-max reduction used for overlay labels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of expressions the classifier reports, in canonical order.
///
/// Canonical order matters: when two scores tie, the earlier label wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    Neutral,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgusted,
    Surprised,
}

impl Expression {
    pub const ALL: [Expression; 7] = [
        Expression::Neutral,
        Expression::Happy,
        Expression::Sad,
        Expression::Angry,
        Expression::Fearful,
        Expression::Disgusted,
        Expression::Surprised,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Happy => "happy",
            Expression::Sad => "sad",
            Expression::Angry => "angry",
            Expression::Fearful => "fearful",
            Expression::Disgusted => "disgusted",
            Expression::Surprised => "surprised",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown expression label: {0}")]
pub struct UnknownExpression(pub String);

impl FromStr for Expression {
    type Err = UnknownExpression;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Expression::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownExpression(s.to_string()))
    }
}

/// Per-expression confidence scores in [0, 1].
///
/// Labels the classifier did not report score 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionScores {
    scores: [f32; 7],
}

impl ExpressionScores {
    pub fn get(&self, expression: Expression) -> f32 {
        self.scores[expression.index()]
    }

    pub fn set(&mut self, expression: Expression, score: f32) {
        self.scores[expression.index()] = score;
    }

    pub fn with(mut self, expression: Expression, score: f32) -> Self {
        self.set(expression, score);
        self
    }

    /// Scores in canonical label order.
    pub fn iter(&self) -> impl Iterator<Item = (Expression, f32)> + '_ {
        Expression::ALL.into_iter().map(|e| (e, self.get(e)))
    }

    /// The expression with the single highest score.
    ///
    /// Ties go to the label that comes first in [`Expression::ALL`]; NaN
    /// scores never win.
    pub fn dominant(&self) -> ExpressionLabel {
        let mut best = Expression::ALL[0];
        let mut best_score = self.get(best);
        for (expression, score) in self.iter().skip(1) {
            if score > best_score || (best_score.is_nan() && !score.is_nan()) {
                best = expression;
                best_score = score;
            }
        }
        ExpressionLabel {
            expression: best,
            confidence: best_score,
        }
    }
}

impl FromIterator<(Expression, f32)> for ExpressionScores {
    fn from_iter<I: IntoIterator<Item = (Expression, f32)>>(iter: I) -> Self {
        let mut scores = Self::default();
        for (expression, score) in iter {
            scores.set(expression, score);
        }
        scores
    }
}

/// The label drawn next to a face: winning expression plus its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpressionLabel {
    pub expression: Expression,
    pub confidence: f32,
}

impl ExpressionLabel {
    /// Confidence as a percentage with one decimal place, e.g. `92.0%`.
    pub fn percent(&self) -> String {
        format!("{:.1}%", self.confidence * 100.0)
    }
}

impl fmt::Display for ExpressionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.expression, self.percent())
    }
}
