//! Panel implementation for observation data
//!
//! A Panel is an ordered, column-oriented table of numeric observations,
//! one row per spatial cell and month. Row order is significant: test
//! predictions are reported aligned with it.

use super::*;

use indexmap::IndexMap;
use ndarray::Axis;

/// Column-oriented observation panel
#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub(crate) columns: IndexMap<String, FloatArray>,
    pub(crate) nrows: usize,
}

impl Panel {
    /// Create an empty Panel
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
            nrows: 0,
        }
    }

    /// Get the shape of the Panel (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.columns.len())
    }

    /// Get the number of rows
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Get the number of columns
    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Check whether the panel has no rows
    pub fn is_empty(&self) -> bool {
        self.nrows == 0
    }

    /// Get column names in insertion order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }

    /// Check if column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get a column by name
    pub fn column(&self, name: &str) -> Result<&FloatArray> {
        self.columns
            .get(name)
            .ok_or_else(|| DataError::ColumnNotFound(name.to_string()))
    }

    /// Get the column holding a covariate
    pub fn covariate(&self, covariate: Covariate) -> Result<&FloatArray> {
        self.column(covariate.column())
    }

    /// Get the response column (strike rate)
    pub fn strikes(&self) -> Result<&FloatArray> {
        self.column(STRIKES)
    }

    /// Add a new column
    pub fn with_column<S: Into<String>>(mut self, name: S, values: FloatArray) -> Result<Self> {
        let name = name.into();

        if self.columns.contains_key(&name) {
            return Err(DataError::DuplicateColumn(name));
        }

        if !self.columns.is_empty() && values.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.nrows),
                actual: format!("{} rows", values.len()),
            });
        }

        if self.columns.is_empty() {
            self.nrows = values.len();
        }

        self.columns.insert(name, values);
        Ok(self)
    }

    /// Replace the values of an existing column
    pub(crate) fn replace_column(&mut self, name: &str, values: FloatArray) -> Result<()> {
        if values.len() != self.nrows {
            return Err(DataError::DimensionMismatch {
                expected: format!("{} rows", self.nrows),
                actual: format!("{} rows", values.len()),
            });
        }

        match self.columns.get_mut(name) {
            Some(column) => {
                *column = values;
                Ok(())
            }
            None => Err(DataError::ColumnNotFound(name.to_string())),
        }
    }

    /// Take rows by position, in the order given
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.nrows) {
            return Err(DataError::IndexOutOfBounds {
                index: bad,
                len: self.nrows,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|(name, values)| (name.clone(), values.select(Axis(0), indices)))
            .collect();

        Ok(Self {
            columns,
            nrows: indices.len(),
        })
    }

    /// Stack the requested covariates into an n × k matrix (no intercept)
    pub fn covariate_matrix(&self, covariates: &[Covariate]) -> Result<Matrix> {
        let mut x = Matrix::zeros((self.nrows, covariates.len()));

        for (j, &covariate) in covariates.iter().enumerate() {
            let values = self.covariate(covariate)?;
            x.column_mut(j).assign(values);
        }

        Ok(x)
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}
