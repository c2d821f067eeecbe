use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::artifact::{ArtifactInfo, Encoding, detect_encoding, read_artifact};
use crate::error::{ModelError, PredictError};
use crate::matrix::{FeatureMatrix, Predictions};
use crate::objective::Objective;
use crate::schema::{GbTreeModelDoc, GradientBoosterDoc, ModelDocument, optional_usize};
use crate::tree::Tree;
use crate::ubjson;

/// Tree booster flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoosterKind {
    GbTree,
    Dart,
}

/// Summary of a loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub booster: BoosterKind,
    pub objective: String,
    pub num_feature: usize,
    pub num_class: usize,
    pub num_trees: usize,
    pub best_iteration: Option<usize>,
    pub version: Vec<u32>,
}

/// Gradient-boosted tree ensemble loaded for inference.
///
/// The booster is immutable once built and can be shared across threads.
#[derive(Debug, Clone)]
pub struct Booster {
    kind: BoosterKind,
    objective: Objective,
    num_feature: usize,
    num_class: usize,
    num_groups: usize,
    base_margin: Vec<f32>,
    trees: Vec<Tree>,
    tree_groups: Vec<usize>,
    tree_weights: Vec<f32>,
    best_iteration: Option<usize>,
    /// Leading trees that vote on class labels.
    label_trees: usize,
    feature_names: Vec<String>,
    version: Vec<u32>,
}

impl Booster {
    /// Load a model document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        Self::load_with_info(path).map(|(booster, _)| booster)
    }

    /// Load a model document from disk and describe the artifact it came from.
    pub fn load_with_info(path: impl AsRef<Path>) -> Result<(Self, ArtifactInfo), ModelError> {
        let path = path.as_ref();
        let (bytes, info) = read_artifact(path)?;
        let booster = Self::from_encoded(&bytes, info.encoding)?;
        info!(
            path = %info.path.display(),
            size_bytes = info.size_bytes,
            sha256 = %info.sha256,
            objective = %booster.objective,
            num_trees = booster.trees.len(),
            "model artifact loaded"
        );
        Ok((booster, info))
    }

    /// Parse a model document, detecting its encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let encoding = detect_encoding(bytes)?;
        Self::from_encoded(bytes, encoding)
    }

    /// Parse a JSON model document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let document: ModelDocument = serde_json::from_slice(bytes)?;
        Self::from_document(document)
    }

    /// Parse a UBJSON model document.
    pub fn from_ubjson_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let value = ubjson::from_slice(bytes)?;
        let document: ModelDocument = serde_json::from_value(value)?;
        Self::from_document(document)
    }

    fn from_encoded(bytes: &[u8], encoding: Encoding) -> Result<Self, ModelError> {
        match encoding {
            Encoding::Json => Self::from_json_slice(bytes),
            Encoding::Ubjson => Self::from_ubjson_slice(bytes),
        }
    }

    fn from_document(document: ModelDocument) -> Result<Self, ModelError> {
        let learner = document.learner;
        let params = &learner.learner_model_param;
        let objective: Objective = learner.objective.name.parse()?;
        let num_feature = optional_usize(params.num_feature.as_ref(), "num_feature")?;
        let num_class = optional_usize(params.num_class.as_ref(), "num_class")?;
        let num_target = optional_usize(params.num_target.as_ref(), "num_target")?;
        let num_groups = num_class.max(num_target).max(1);

        let (kind, model, weight_drop) = match learner.gradient_booster {
            GradientBoosterDoc::GbTree { model } => (BoosterKind::GbTree, model, Vec::new()),
            GradientBoosterDoc::Dart {
                gbtree,
                weight_drop,
            } => (BoosterKind::Dart, gbtree.model, weight_drop),
            GradientBoosterDoc::GbLinear {} => {
                return Err(ModelError::Unsupported("gblinear booster".to_string()));
            }
        };

        let base_scores = params.base_score.parse_list("base_score")?;
        let base_margin = broadcast_base_score(&base_scores, num_groups)?
            .into_iter()
            .map(|score| objective.base_margin(score))
            .collect::<Result<Vec<_>, _>>()?;

        let best_iteration = learner
            .attributes
            .best_iteration
            .as_ref()
            .map(|param| param.parse::<usize>("best_iteration"))
            .transpose()?;
        let label_trees = match best_iteration {
            Some(iteration) => trees_in_rounds(&model, num_groups, iteration + 1)?,
            None => model.trees.len(),
        };

        let (trees, tree_groups) = build_trees(model, num_groups)?;
        let tree_weights = match kind {
            BoosterKind::GbTree => vec![1.0; trees.len()],
            BoosterKind::Dart if weight_drop.len() == trees.len() => weight_drop,
            BoosterKind::Dart => {
                return Err(ModelError::Invalid(format!(
                    "dart booster has {} trees but {} drop weights",
                    trees.len(),
                    weight_drop.len()
                )));
            }
        };

        if num_feature > 0 {
            if let Some(max) = trees.iter().filter_map(Tree::max_feature).max() {
                if max >= num_feature {
                    return Err(ModelError::Invalid(format!(
                        "split on feature {max} but the model declares {num_feature} features"
                    )));
                }
            }
        }

        debug!(
            objective = %objective,
            num_feature,
            num_groups,
            num_trees = trees.len(),
            ?best_iteration,
            "model document parsed"
        );

        Ok(Self {
            kind,
            objective,
            num_feature,
            num_class,
            num_groups,
            base_margin,
            trees,
            tree_groups,
            tree_weights,
            best_iteration,
            label_trees,
            feature_names: learner.feature_names,
            version: document.version,
        })
    }

    pub fn kind(&self) -> BoosterKind {
        self.kind
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    /// Number of input features the model was trained on (0 when not recorded).
    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    /// Number of margins produced per row.
    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Round picked by early stopping, if the model was trained with it.
    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            booster: self.kind,
            objective: self.objective.name().to_string(),
            num_feature: self.num_feature,
            num_class: self.num_class,
            num_trees: self.trees.len(),
            best_iteration: self.best_iteration,
            version: self.version.clone(),
        }
    }

    fn check_shape(&self, matrix: &FeatureMatrix) -> Result<(), PredictError> {
        if matrix.num_rows() == 0 {
            return Err(PredictError::EmptyInput);
        }
        let expected = if self.num_feature > 0 {
            self.num_feature
        } else {
            self.trees
                .iter()
                .filter_map(Tree::max_feature)
                .max()
                .map_or(0, |max| max + 1)
        };
        let got = matrix.num_cols();
        let matches = if self.num_feature > 0 {
            got == expected
        } else {
            got >= expected
        };
        if matches {
            Ok(())
        } else {
            Err(PredictError::FeatureShapeMismatch { expected, got })
        }
    }

    /// Raw margins, one row per input row and one value per output group.
    pub fn predict_margin(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<f32>>, PredictError> {
        self.margins(matrix, self.trees.len())
    }

    fn margins(
        &self,
        matrix: &FeatureMatrix,
        tree_limit: usize,
    ) -> Result<Vec<Vec<f32>>, PredictError> {
        self.check_shape(matrix)?;
        matrix
            .rows()
            .map(|row| -> Result<Vec<f32>, PredictError> {
                let mut margins = self.base_margin.clone();
                for ((tree, group), weight) in self
                    .trees
                    .iter()
                    .zip(&self.tree_groups)
                    .zip(&self.tree_weights)
                    .take(tree_limit)
                {
                    margins[*group] += weight * tree.leaf_value(row)?;
                }
                // only a corrupt ensemble sums to NaN, e.g. +inf and -inf leaves
                if let Some(group) = margins.iter().position(|margin| margin.is_nan()) {
                    return Err(PredictError::Internal(format!(
                        "margin of output group {group} is NaN"
                    )));
                }
                Ok(margins)
            })
            .collect()
    }

    /// Predictions after the objective's output transform.
    pub fn predict(&self, matrix: &FeatureMatrix) -> Result<Predictions, PredictError> {
        let rows = self
            .predict_margin(matrix)?
            .iter()
            .map(|margins| self.objective.transform(margins))
            .collect();
        Ok(Predictions::from_rows(rows))
    }

    /// One class label per row.
    ///
    /// Unlike [`Booster::predict`], an early-stopped model only uses the trees up to its
    /// best iteration here, as the classifier wrapper does.
    pub fn predict_labels(&self, matrix: &FeatureMatrix) -> Result<Vec<i64>, PredictError> {
        Ok(self
            .margins(matrix, self.label_trees)?
            .iter()
            .map(|margins| self.objective.label(&self.objective.transform(margins)))
            .collect())
    }
}

fn broadcast_base_score(scores: &[f32], num_groups: usize) -> Result<Vec<f32>, ModelError> {
    match scores.len() {
        1 => Ok(vec![scores[0]; num_groups]),
        len if len == num_groups => Ok(scores.to_vec()),
        len => Err(ModelError::Invalid(format!(
            "base_score has {len} values for {num_groups} output groups"
        ))),
    }
}

/// Number of leading trees grown in the first `rounds` boosting rounds.
fn trees_in_rounds(
    model: &GbTreeModelDoc,
    num_groups: usize,
    rounds: usize,
) -> Result<usize, ModelError> {
    let num_trees = model.trees.len();
    let indptr = &model.iteration_indptr;
    if !indptr.is_empty() {
        let partitions = indptr[0] == 0
            && indptr.windows(2).all(|pair| pair[0] <= pair[1])
            && indptr.last() == Some(&(num_trees as i64));
        if !partitions {
            return Err(ModelError::Invalid(format!(
                "iteration_indptr does not partition {num_trees} trees"
            )));
        }
        return Ok(indptr[rounds.min(indptr.len() - 1)] as usize);
    }

    let parallel = model
        .gbtree_model_param
        .as_ref()
        .and_then(|param| param.num_parallel_tree.as_ref());
    let per_round = num_groups * optional_usize(parallel, "num_parallel_tree")?.max(1);
    Ok(rounds.saturating_mul(per_round).min(num_trees))
}

fn build_trees(
    model: GbTreeModelDoc,
    num_groups: usize,
) -> Result<(Vec<Tree>, Vec<usize>), ModelError> {
    let num_trees = model.trees.len();
    let tree_info = if model.tree_info.is_empty() && num_groups == 1 {
        vec![0; num_trees]
    } else {
        model.tree_info
    };
    if tree_info.len() != num_trees {
        return Err(ModelError::Invalid(format!(
            "tree_info has {} entries for {num_trees} trees",
            tree_info.len()
        )));
    }

    let mut groups = Vec::with_capacity(num_trees);
    for (index, group) in tree_info.into_iter().enumerate() {
        if group < 0 || group as usize >= num_groups {
            return Err(ModelError::Invalid(format!(
                "tree {index} belongs to group {group} but the model has {num_groups} groups"
            )));
        }
        groups.push(group as usize);
    }

    let trees = model
        .trees
        .into_iter()
        .enumerate()
        .map(|(index, doc)| Tree::from_doc(index, doc))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((trees, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn leaf(value: f32) -> Value {
        json!({
            "left_children": [-1],
            "right_children": [-1],
            "split_indices": [0],
            "split_conditions": [value],
            "default_left": [0],
            "tree_param": {"num_nodes": "1"}
        })
    }

    fn leaf_overflow(sign: i32) -> Value {
        let mut tree = leaf(0.0);
        tree["split_conditions"] = serde_json::from_str(&format!("[{sign}e39]")).unwrap();
        tree
    }

    fn document(
        objective: &str,
        num_class: &str,
        base_score: &str,
        trees: Vec<Value>,
        tree_info: Vec<i64>,
    ) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "learner": {
                "learner_model_param": {
                    "base_score": base_score,
                    "num_class": num_class,
                    "num_feature": "2"
                },
                "objective": {"name": objective},
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {"trees": trees, "tree_info": tree_info}
                }
            },
            "version": [2, 1, 0]
        }))
        .unwrap()
    }

    #[test]
    fn sums_trees_per_group_on_top_of_base_margin() {
        let bytes = document(
            "reg:squarederror",
            "0",
            "5E-1",
            vec![leaf(1.0), leaf(0.25)],
            vec![0, 0],
        );
        let booster = Booster::from_json_slice(&bytes).unwrap();
        let matrix = FeatureMatrix::single_row(vec![0.0, 0.0]);
        assert_eq!(booster.predict_margin(&matrix).unwrap(), vec![vec![1.75]]);
        assert_eq!(booster.summary().version, vec![2, 1, 0]);
    }

    #[test]
    fn multiclass_softprob_yields_vectors() {
        let bytes = document(
            "multi:softprob",
            "3",
            "5E-1",
            vec![leaf(0.0), leaf(1.0), leaf(0.0)],
            vec![0, 1, 2],
        );
        let booster = Booster::from_json_slice(&bytes).unwrap();
        let matrix = FeatureMatrix::single_row(vec![0.0, 0.0]);
        match booster.predict(&matrix).unwrap() {
            Predictions::Vectors(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].len(), 3);
                let sum: f32 = rows[0].iter().sum();
                assert!((sum - 1.0).abs() < 1e-6);
            }
            other => panic!("expected vectors, got {other:?}"),
        }
        assert_eq!(booster.predict_labels(&matrix).unwrap(), vec![1]);
    }

    #[test]
    fn labels_stop_at_best_iteration() {
        let mut doc: Value = serde_json::from_slice(&document(
            "binary:logistic",
            "0",
            "5E-1",
            vec![leaf(0.2), leaf(-1.0)],
            vec![0, 0],
        ))
        .unwrap();
        doc["learner"]["attributes"] = json!({"best_iteration": "0"});
        let booster = Booster::from_json_slice(&serde_json::to_vec(&doc).unwrap()).unwrap();
        assert_eq!(booster.best_iteration(), Some(0));

        let matrix = FeatureMatrix::single_row(vec![0.0, 0.0]);
        // sigmoid(0.2) > 0.5 while sigmoid(-0.8) < 0.5
        assert_eq!(booster.predict_labels(&matrix).unwrap(), vec![1]);
        let Predictions::Scalars(probs) = booster.predict(&matrix).unwrap() else {
            panic!("expected scalars");
        };
        assert!(probs[0] < 0.5);
    }

    #[test]
    fn best_iteration_counts_whole_rounds() {
        let mut doc: Value = serde_json::from_slice(&document(
            "multi:softprob",
            "2",
            "5E-1",
            vec![leaf(1.0), leaf(0.0), leaf(-3.0), leaf(0.0)],
            vec![0, 1, 0, 1],
        ))
        .unwrap();
        doc["learner"]["attributes"] = json!({"best_iteration": "0"});
        let booster = Booster::from_json_slice(&serde_json::to_vec(&doc).unwrap()).unwrap();

        let matrix = FeatureMatrix::single_row(vec![0.0, 0.0]);
        assert_eq!(booster.predict_labels(&matrix).unwrap(), vec![0]);
        assert_eq!(booster.predict_margin(&matrix).unwrap(), vec![vec![-1.5, 0.5]]);
    }

    #[test]
    fn nan_margin_is_an_internal_error() {
        // 1e39 overflows f32, so the leaves hold +inf and -inf
        let bytes = document(
            "binary:logistic",
            "0",
            "5E-1",
            vec![leaf_overflow(1), leaf_overflow(-1)],
            vec![0, 0],
        );
        let booster = Booster::from_json_slice(&bytes).unwrap();
        let err = booster
            .predict_labels(&FeatureMatrix::single_row(vec![0.0, 0.0]))
            .unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn rejects_inconsistent_iteration_indptr() {
        let mut doc: Value = serde_json::from_slice(&document(
            "binary:logistic",
            "0",
            "5E-1",
            vec![leaf(0.2), leaf(-1.0)],
            vec![0, 0],
        ))
        .unwrap();
        doc["learner"]["attributes"] = json!({"best_iteration": "0"});
        doc["learner"]["gradient_booster"]["model"]["iteration_indptr"] = json!([0, 1, 5]);
        assert!(matches!(
            Booster::from_json_slice(&serde_json::to_vec(&doc).unwrap()),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_wrong_feature_count_and_empty_input() {
        let bytes = document("binary:logistic", "0", "5E-1", vec![leaf(0.1)], vec![0]);
        let booster = Booster::from_json_slice(&bytes).unwrap();

        let err = booster
            .predict(&FeatureMatrix::single_row(vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(
            err,
            PredictError::FeatureShapeMismatch {
                expected: 2,
                got: 3
            }
        );
        assert!(err.is_client_error());

        let empty = FeatureMatrix::from_rows(Vec::new()).unwrap();
        assert_eq!(booster.predict(&empty).unwrap_err(), PredictError::EmptyInput);
    }

    #[test]
    fn rejects_bad_tree_info() {
        let bytes = document("multi:softprob", "2", "5E-1", vec![leaf(0.1)], vec![4]);
        assert!(matches!(
            Booster::from_json_slice(&bytes),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_gblinear() {
        let bytes = serde_json::to_vec(&json!({
            "learner": {
                "learner_model_param": {"base_score": "5E-1", "num_feature": "2"},
                "objective": {"name": "reg:squarederror"},
                "gradient_booster": {"name": "gblinear", "model": {"weights": [0.1, 0.2, 0.0]}}
            }
        }))
        .unwrap();
        assert!(matches!(
            Booster::from_json_slice(&bytes),
            Err(ModelError::Unsupported(_))
        ));
    }

    #[test]
    fn dart_scales_trees_by_drop_weight() {
        let bytes = serde_json::to_vec(&json!({
            "learner": {
                "learner_model_param": {"base_score": "0", "num_feature": "2"},
                "objective": {"name": "reg:squarederror"},
                "gradient_booster": {
                    "name": "dart",
                    "gbtree": {"name": "gbtree", "model": {"trees": [leaf(2.0), leaf(4.0)], "tree_info": [0, 0]}},
                    "weight_drop": [0.5, 0.25]
                }
            }
        }))
        .unwrap();
        let booster = Booster::from_json_slice(&bytes).unwrap();
        assert_eq!(booster.kind(), BoosterKind::Dart);
        let matrix = FeatureMatrix::single_row(vec![0.0, 0.0]);
        assert_eq!(booster.predict(&matrix).unwrap(), Predictions::Scalars(vec![2.0]));
    }
}
