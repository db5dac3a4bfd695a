//! Builder pattern for constructing Panels

use indexmap::IndexMap;

use super::*;

/// Builder for creating Panels
pub struct PanelBuilder {
    columns: IndexMap<String, FloatArray>,
    nrows: Option<usize>,
}

impl PanelBuilder {
    /// Create a new PanelBuilder
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
            nrows: None,
        }
    }

    /// Add a column to the Panel
    pub fn with_column<S: Into<String>>(
        mut self,
        name: S,
        values: impl Into<FloatArray>,
    ) -> Result<Self> {
        let name = name.into();
        let values = values.into();

        if self.columns.contains_key(&name) {
            return Err(DataError::DuplicateColumn(name));
        }

        // Check dimension consistency
        match self.nrows {
            Some(n) if values.len() != n => {
                return Err(DataError::DimensionMismatch {
                    expected: format!("{} rows", n),
                    actual: format!("{} rows", values.len()),
                });
            }
            None => {
                self.nrows = Some(values.len());
            }
            _ => {}
        }

        self.columns.insert(name, values);
        Ok(self)
    }

    /// Add a covariate column under its panel column name
    pub fn with_covariate(self, covariate: Covariate, values: impl Into<FloatArray>) -> Result<Self> {
        self.with_column(covariate.column(), values)
    }

    /// Build the Panel
    pub fn build(self) -> Result<Panel> {
        Ok(Panel {
            columns: self.columns,
            nrows: self.nrows.unwrap_or(0),
        })
    }
}

impl Default for PanelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
