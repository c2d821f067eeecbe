use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Learning objective, which fixes how margins become predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Objective {
    BinaryLogistic,
    BinaryLogitRaw,
    BinaryHinge,
    RegLogistic,
    RegSquaredError,
    RegSquaredLogError,
    RegPseudoHuberError,
    RegAbsoluteError,
    CountPoisson,
    RegGamma,
    RegTweedie,
    MultiSoftmax,
    MultiSoftprob,
    RankPairwise,
    RankNdcg,
    RankMap,
}

impl Objective {
    /// Canonical objective name as written in the model document.
    pub fn name(&self) -> &'static str {
        match self {
            Objective::BinaryLogistic => "binary:logistic",
            Objective::BinaryLogitRaw => "binary:logitraw",
            Objective::BinaryHinge => "binary:hinge",
            Objective::RegLogistic => "reg:logistic",
            Objective::RegSquaredError => "reg:squarederror",
            Objective::RegSquaredLogError => "reg:squaredlogerror",
            Objective::RegPseudoHuberError => "reg:pseudohubererror",
            Objective::RegAbsoluteError => "reg:absoluteerror",
            Objective::CountPoisson => "count:poisson",
            Objective::RegGamma => "reg:gamma",
            Objective::RegTweedie => "reg:tweedie",
            Objective::MultiSoftmax => "multi:softmax",
            Objective::MultiSoftprob => "multi:softprob",
            Objective::RankPairwise => "rank:pairwise",
            Objective::RankNdcg => "rank:ndcg",
            Objective::RankMap => "rank:map",
        }
    }

    fn is_logistic(&self) -> bool {
        matches!(
            self,
            Objective::BinaryLogistic | Objective::BinaryLogitRaw | Objective::RegLogistic
        )
    }

    fn is_log_link(&self) -> bool {
        matches!(
            self,
            Objective::CountPoisson | Objective::RegGamma | Objective::RegTweedie
        )
    }

    /// Convert a base score stored in output space into margin space.
    pub fn base_margin(&self, base_score: f32) -> Result<f32, ModelError> {
        if self.is_logistic() {
            if !(base_score > 0.0 && base_score < 1.0) {
                return Err(ModelError::Invalid(format!(
                    "base_score must be in (0, 1) for {}, got {base_score}",
                    self.name()
                )));
            }
            return Ok(-(1.0 / base_score - 1.0).ln());
        }
        if self.is_log_link() {
            if base_score <= 0.0 {
                return Err(ModelError::Invalid(format!(
                    "base_score must be positive for {}, got {base_score}",
                    self.name()
                )));
            }
            return Ok(base_score.ln());
        }
        Ok(base_score)
    }

    /// Transform one row of margins (one per output group) into predictions.
    pub fn transform(&self, margins: &[f32]) -> Vec<f32> {
        match self {
            Objective::BinaryLogistic | Objective::RegLogistic => {
                margins.iter().map(|m| sigmoid(*m)).collect()
            }
            Objective::CountPoisson | Objective::RegGamma | Objective::RegTweedie => {
                margins.iter().map(|m| m.exp()).collect()
            }
            Objective::BinaryHinge => margins
                .iter()
                .map(|m| if *m > 0.0 { 1.0 } else { 0.0 })
                .collect(),
            Objective::MultiSoftprob => softmax(margins),
            Objective::MultiSoftmax => vec![argmax(margins) as f32],
            Objective::BinaryLogitRaw
            | Objective::RegSquaredError
            | Objective::RegSquaredLogError
            | Objective::RegPseudoHuberError
            | Objective::RegAbsoluteError
            | Objective::RankPairwise
            | Objective::RankNdcg
            | Objective::RankMap => margins.to_vec(),
        }
    }

    /// Class label for one transformed row, following the classifier wrapper's rules.
    ///
    /// Several outputs pick the arg-max. `multi:softmax` already yields the class index.
    /// Any other single output is thresholded at 0.5, whatever the objective.
    pub fn label(&self, outputs: &[f32]) -> i64 {
        if outputs.len() > 1 {
            return argmax(outputs) as i64;
        }
        let value = outputs.first().copied().unwrap_or(0.0);
        match self {
            Objective::MultiSoftmax => value as i64,
            _ => (value > 0.5) as i64,
        }
    }
}

impl FromStr for Objective {
    type Err = ModelError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Ok(match name {
            "binary:logistic" => Objective::BinaryLogistic,
            "binary:logitraw" => Objective::BinaryLogitRaw,
            "binary:hinge" => Objective::BinaryHinge,
            "reg:logistic" => Objective::RegLogistic,
            "reg:squarederror" | "reg:linear" => Objective::RegSquaredError,
            "reg:squaredlogerror" => Objective::RegSquaredLogError,
            "reg:pseudohubererror" => Objective::RegPseudoHuberError,
            "reg:absoluteerror" => Objective::RegAbsoluteError,
            "count:poisson" => Objective::CountPoisson,
            "reg:gamma" => Objective::RegGamma,
            "reg:tweedie" => Objective::RegTweedie,
            "multi:softmax" => Objective::MultiSoftmax,
            "multi:softprob" => Objective::MultiSoftprob,
            "rank:pairwise" => Objective::RankPairwise,
            "rank:ndcg" => Objective::RankNdcg,
            "rank:map" => Objective::RankMap,
            other => {
                return Err(ModelError::Unsupported(format!("objective {other}")));
            }
        })
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(margins: &[f32]) -> Vec<f32> {
    let max = margins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = margins.iter().map(|m| (m - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the first maximum, like `numpy.argmax`.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}
