use crate::error::{ModelError, PredictError};
use crate::schema::{TreeDoc, optional_usize};

const LEAF: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Node {
    left: i32,
    right: i32,
    feature: usize,
    /// Split threshold for internal nodes, leaf value for leaves.
    value: f32,
    default_left: bool,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.left == LEAF
    }
}

/// A single regression tree with numerical splits.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub(crate) fn from_doc(index: usize, doc: TreeDoc) -> Result<Self, ModelError> {
        let invalid = |message: String| ModelError::Invalid(format!("tree {index}: {message}"));

        let declared = match doc.tree_param.as_ref() {
            Some(param) => optional_usize(param.num_nodes.as_ref(), "num_nodes")?,
            None => 0,
        };
        let leaf_size = match doc.tree_param.as_ref() {
            Some(param) => optional_usize(param.size_leaf_vector.as_ref(), "size_leaf_vector")?,
            None => 0,
        };
        if leaf_size > 1 {
            return Err(ModelError::Unsupported(format!(
                "tree {index} has vector leaves of size {leaf_size}"
            )));
        }
        if doc.split_type.iter().any(|kind| *kind != 0) {
            return Err(ModelError::Unsupported(format!(
                "tree {index} uses categorical splits"
            )));
        }

        let num_nodes = doc.left_children.len();
        if num_nodes == 0 {
            return Err(invalid("tree has no nodes".to_string()));
        }
        if declared != 0 && declared != num_nodes {
            return Err(invalid(format!(
                "num_nodes is {declared} but {num_nodes} nodes are stored"
            )));
        }
        let lengths = [
            ("right_children", doc.right_children.len()),
            ("split_indices", doc.split_indices.len()),
            ("split_conditions", doc.split_conditions.len()),
            ("default_left", doc.default_left.len()),
        ];
        for (name, len) in lengths {
            if len != num_nodes {
                return Err(invalid(format!(
                    "{name} has {len} entries, expected {num_nodes}"
                )));
            }
        }

        let mut nodes = Vec::with_capacity(num_nodes);
        for id in 0..num_nodes {
            let left = doc.left_children[id];
            let right = doc.right_children[id];
            let in_bounds = |child: i32| child >= 0 && (child as usize) < num_nodes;
            let is_leaf = left == LEAF && right == LEAF;
            if !is_leaf && !(in_bounds(left) && in_bounds(right)) {
                return Err(invalid(format!(
                    "node {id} has invalid children ({left}, {right})"
                )));
            }
            let feature = doc.split_indices[id];
            if feature < 0 {
                return Err(invalid(format!("node {id} splits on feature {feature}")));
            }
            nodes.push(Node {
                left,
                right,
                feature: feature as usize,
                value: doc.split_conditions[id],
                default_left: doc.default_left[id].is_set(),
            });
        }

        let tree = Self { nodes };
        tree.check_reachability().map_err(invalid)?;
        Ok(tree)
    }

    /// Every node must be reached at most once from the root, which rules out cycles.
    fn check_reachability(&self) -> Result<(), String> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id], true) {
                return Err(format!("node {id} is reachable more than once"));
            }
            let node = &self.nodes[id];
            if !node.is_leaf() {
                stack.push(node.left as usize);
                stack.push(node.right as usize);
            }
        }
        Ok(())
    }

    /// Largest feature index used by a split, if the tree has any split.
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter(|node| !node.is_leaf())
            .map(|node| node.feature)
            .max()
    }

    /// Walk the tree for one row and return the leaf value.
    ///
    /// `NaN` marks a missing value and follows the node's default direction.
    pub fn leaf_value(&self, row: &[f32]) -> Result<f32, PredictError> {
        let mut id = 0usize;
        for _ in 0..self.nodes.len() {
            let node = &self.nodes[id];
            if node.is_leaf() {
                return Ok(node.value);
            }
            let value = *row.get(node.feature).ok_or_else(|| {
                PredictError::Internal(format!(
                    "split on feature {} but row has {} values",
                    node.feature,
                    row.len()
                ))
            })?;
            let go_left = if value.is_nan() {
                node.default_left
            } else {
                value < node.value
            };
            let next = if go_left { node.left } else { node.right };
            id = next as usize;
        }
        Err(PredictError::Internal(
            "tree walk did not reach a leaf".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stump() -> serde_json::Value {
        json!({
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [1, 0, 0],
            "split_conditions": [0.5, -1.0, 2.0],
            "default_left": [1, 0, 0],
            "split_type": [0, 0, 0],
            "tree_param": {"num_nodes": "3", "size_leaf_vector": "1"}
        })
    }

    fn tree(value: serde_json::Value) -> Result<Tree, ModelError> {
        Tree::from_doc(0, serde_json::from_value(value).unwrap())
    }

    #[test]
    fn routes_rows_by_threshold() {
        let tree = tree(stump()).unwrap();
        assert_eq!(tree.leaf_value(&[9.0, 0.1]).unwrap(), -1.0);
        assert_eq!(tree.leaf_value(&[9.0, 0.5]).unwrap(), 2.0);
        assert_eq!(tree.max_feature(), Some(1));
    }

    #[test]
    fn missing_value_follows_default_direction() {
        let tree = tree(stump()).unwrap();
        assert_eq!(tree.leaf_value(&[0.0, f32::NAN]).unwrap(), -1.0);
    }

    #[test]
    fn short_row_is_an_internal_error() {
        let tree = tree(stump()).unwrap();
        assert!(matches!(
            tree.leaf_value(&[1.0]),
            Err(PredictError::Internal(_))
        ));
    }

    #[test]
    fn rejects_mismatched_arrays() {
        let mut doc = stump();
        doc["split_conditions"] = json!([0.5, -1.0]);
        assert!(matches!(tree(doc), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn rejects_out_of_bounds_children() {
        let mut doc = stump();
        doc["right_children"] = json!([7, -1, -1]);
        assert!(matches!(tree(doc), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn rejects_cycles() {
        let mut doc = stump();
        doc["left_children"] = json!([1, 0, -1]);
        doc["right_children"] = json!([2, 2, -1]);
        assert!(matches!(tree(doc), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn rejects_categorical_and_vector_leaf_trees() {
        let mut categorical = stump();
        categorical["split_type"] = json!([1, 0, 0]);
        assert!(matches!(tree(categorical), Err(ModelError::Unsupported(_))));

        let mut vector_leaf = stump();
        vector_leaf["tree_param"]["size_leaf_vector"] = json!("3");
        assert!(matches!(tree(vector_leaf), Err(ModelError::Unsupported(_))));
    }
}
