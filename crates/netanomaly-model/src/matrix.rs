use serde::Serialize;

/// Error building a [`FeatureMatrix`] from rows of different lengths.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("row {row} has {got} values, expected {expected}")]
pub struct RaggedRows {
    pub row: usize,
    pub expected: usize,
    pub got: usize,
}

/// Dense row-major feature matrix. `NaN` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Vec<f32>,
    num_rows: usize,
    num_cols: usize,
}

impl FeatureMatrix {
    /// A batch of one row.
    pub fn single_row(row: Vec<f32>) -> Self {
        Self {
            num_cols: row.len(),
            num_rows: 1,
            data: row,
        }
    }

    /// Stack rows that must all have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, RaggedRows> {
        let num_rows = rows.len();
        let num_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(num_rows * num_cols);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != num_cols {
                return Err(RaggedRows {
                    row,
                    expected: num_cols,
                    got: values.len(),
                });
            }
            data.extend(values);
        }
        Ok(Self {
            data,
            num_rows,
            num_cols,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Iterate over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.num_rows).map(move |row| &self.data[row * self.num_cols..(row + 1) * self.num_cols])
    }
}

/// Predictions for a batch, in row order.
///
/// Serializes as a flat list when the model yields one value per row and as a list of
/// per-row lists otherwise, the same shape the training library returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Predictions {
    Scalars(Vec<f32>),
    Vectors(Vec<Vec<f32>>),
}

impl Predictions {
    pub(crate) fn from_rows(rows: Vec<Vec<f32>>) -> Self {
        if rows.iter().all(|row| row.len() == 1) {
            Predictions::Scalars(rows.into_iter().map(|row| row[0]).collect())
        } else {
            Predictions::Vectors(rows)
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            Predictions::Scalars(values) => values.len(),
            Predictions::Vectors(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
