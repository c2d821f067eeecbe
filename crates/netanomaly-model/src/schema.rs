//! Serde view of the gradient-boosted tree model document.
//!
//! Only the subset needed for inference is mapped; unknown fields are ignored. Scalar
//! learner parameters are stored as strings by the training library (`"5E-1"`), so they
//! are read through [`Param`].

use std::str::FromStr;

use serde::Deserialize;

use crate::error::ModelError;

#[derive(Debug, Deserialize)]
pub(crate) struct ModelDocument {
    pub learner: LearnerDoc,
    #[serde(default)]
    pub version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LearnerDoc {
    pub learner_model_param: LearnerModelParam,
    pub objective: ObjectiveDoc,
    pub gradient_booster: GradientBoosterDoc,
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub attributes: LearnerAttributes,
}

/// Free-form learner attributes. Early stopping records `best_iteration` here.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LearnerAttributes {
    #[serde(default)]
    pub best_iteration: Option<Param>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LearnerModelParam {
    pub base_score: Param,
    #[serde(default)]
    pub num_class: Option<Param>,
    #[serde(default)]
    pub num_feature: Option<Param>,
    #[serde(default)]
    pub num_target: Option<Param>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectiveDoc {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "name")]
pub(crate) enum GradientBoosterDoc {
    #[serde(rename = "gbtree")]
    GbTree { model: GbTreeModelDoc },
    #[serde(rename = "dart")]
    Dart {
        gbtree: DartTreesDoc,
        #[serde(default)]
        weight_drop: Vec<f32>,
    },
    #[serde(rename = "gblinear")]
    GbLinear {},
}

#[derive(Debug, Deserialize)]
pub(crate) struct DartTreesDoc {
    pub model: GbTreeModelDoc,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GbTreeModelDoc {
    pub trees: Vec<TreeDoc>,
    #[serde(default)]
    pub tree_info: Vec<i64>,
    /// Offsets of the first tree of each boosting round, plus the total.
    #[serde(default)]
    pub iteration_indptr: Vec<i64>,
    #[serde(default)]
    pub gbtree_model_param: Option<GbTreeModelParam>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GbTreeModelParam {
    #[serde(default)]
    pub num_parallel_tree: Option<Param>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeDoc {
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f32>,
    pub default_left: Vec<Flag>,
    #[serde(default)]
    pub split_type: Vec<u8>,
    #[serde(default)]
    pub tree_param: Option<TreeParam>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TreeParam {
    #[serde(default)]
    pub num_nodes: Option<Param>,
    #[serde(default)]
    pub size_leaf_vector: Option<Param>,
}

/// Boolean stored either as a JSON bool or as a 0/1 integer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn is_set(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}

/// Learner parameter stored as a string or, in hand-written documents, as a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Param {
    Text(String),
    Number(f64),
}

impl Param {
    pub fn parse<T: FromStr>(&self, label: &str) -> Result<T, ModelError> {
        let text = match self {
            Param::Text(text) => text.trim().to_string(),
            Param::Number(value) => value.to_string(),
        };
        text.parse::<T>()
            .map_err(|_| ModelError::Invalid(format!("{label} is not a valid number: {text}")))
    }

    /// Parse a scalar (`"5E-1"`) or bracketed list (`"[5E-1,2E-1]"`) of floats.
    pub fn parse_list(&self, label: &str) -> Result<Vec<f32>, ModelError> {
        match self {
            Param::Number(value) => Ok(vec![*value as f32]),
            Param::Text(text) => {
                let inner = text
                    .trim()
                    .trim_start_matches('[')
                    .trim_end_matches(']');
                inner
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| {
                        item.parse::<f32>().map_err(|_| {
                            ModelError::Invalid(format!("{label} is not a valid number: {item}"))
                        })
                    })
                    .collect()
            }
        }
    }
}

/// Parse an optional unsigned parameter, defaulting to zero when absent.
pub(crate) fn optional_usize(param: Option<&Param>, label: &str) -> Result<usize, ModelError> {
    match param {
        Some(param) => {
            let value: f64 = param.parse(label)?;
            if value < 0.0 || value.fract() != 0.0 {
                return Err(ModelError::Invalid(format!(
                    "{label} must be a non-negative integer, got {value}"
                )));
            }
            Ok(value as usize)
        }
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_parses_string_and_number_spellings() {
        let text: Param = serde_json::from_value(json!("5E-1")).unwrap();
        assert_eq!(text.parse::<f32>("base_score").unwrap(), 0.5);

        let number: Param = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(optional_usize(Some(&number), "num_class").unwrap(), 3);
    }

    #[test]
    fn param_parses_bracketed_lists() {
        let list: Param = serde_json::from_value(json!("[5E-1, 2.5E-1]")).unwrap();
        assert_eq!(list.parse_list("base_score").unwrap(), vec![0.5, 0.25]);

        let scalar: Param = serde_json::from_value(json!("6E-1")).unwrap();
        assert_eq!(scalar.parse_list("base_score").unwrap(), vec![0.6]);
    }

    #[test]
    fn param_rejects_garbage() {
        let bad: Param = serde_json::from_value(json!("abc")).unwrap();
        assert!(matches!(
            bad.parse::<f32>("base_score"),
            Err(ModelError::Invalid(_))
        ));
        let negative: Param = serde_json::from_value(json!("-1")).unwrap();
        assert!(optional_usize(Some(&negative), "num_class").is_err());
    }

    #[test]
    fn flag_accepts_bool_and_int() {
        let flags: Vec<Flag> = serde_json::from_value(json!([true, 0, 1, false])).unwrap();
        let set: Vec<bool> = flags.into_iter().map(Flag::is_set).collect();
        assert_eq!(set, vec![true, false, true, false]);
    }

    #[test]
    fn booster_tag_selects_variant() {
        let doc: GradientBoosterDoc =
            serde_json::from_value(json!({"name": "gblinear", "model": {"weights": []}}))
                .unwrap();
        assert!(matches!(doc, GradientBoosterDoc::GbLinear {}));
    }

    #[test]
    fn learner_attributes_are_optional() {
        let doc = json!({
            "learner_model_param": {"base_score": "5E-1"},
            "objective": {"name": "binary:logistic"},
            "gradient_booster": {"name": "gbtree", "model": {"trees": []}}
        });
        let learner: LearnerDoc = serde_json::from_value(doc.clone()).unwrap();
        assert!(learner.attributes.best_iteration.is_none());

        let mut with_attributes = doc;
        with_attributes["attributes"] = json!({"best_iteration": "7", "best_score": "0.1"});
        let learner: LearnerDoc = serde_json::from_value(with_attributes).unwrap();
        let best = learner.attributes.best_iteration.unwrap();
        assert_eq!(best.parse::<usize>("best_iteration").unwrap(), 7);
    }
}
