//! Column projections executed by the store.

use serde::{Deserialize, Serialize};

/// One projected column, optionally renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedColumn {
    /// Column name on the entity set.
    pub source: String,
    /// Name of the column in the projected row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ProjectedColumn {
    /// The column name as it appears in the projected row.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.source)
    }
}

/// The shape of rows returned by a query.
///
/// `Projection::all()` is the identity projection (every entity column);
/// otherwise only the listed columns are selected, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    columns: Option<Vec<ProjectedColumn>>,
}

impl Projection {
    /// The identity projection.
    pub fn all() -> Self {
        Self { columns: None }
    }

    /// Select the given columns under their own names.
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(
                columns
                    .into_iter()
                    .map(|source| ProjectedColumn {
                        source: source.into(),
                        alias: None,
                    })
                    .collect(),
            ),
        }
    }

    /// Add a column under its own name.
    pub fn column(self, source: impl Into<String>) -> Self {
        self.push(ProjectedColumn {
            source: source.into(),
            alias: None,
        })
    }

    /// Add a column renamed to `alias`.
    pub fn column_as(self, source: impl Into<String>, alias: impl Into<String>) -> Self {
        self.push(ProjectedColumn {
            source: source.into(),
            alias: Some(alias.into()),
        })
    }

    fn push(mut self, column: ProjectedColumn) -> Self {
        self.columns.get_or_insert_with(Vec::new).push(column);
        self
    }

    /// Whether this is the identity projection.
    pub fn is_identity(&self) -> bool {
        self.columns.is_none()
    }

    /// The selected columns, or `None` for the identity projection.
    pub fn selected(&self) -> Option<&[ProjectedColumn]> {
        self.columns.as_deref()
    }

    /// Whether `name` is a column of the projected row.
    ///
    /// Always true for the identity projection, whose shape is the entity's.
    pub fn exposes(&self, name: &str) -> bool {
        match &self.columns {
            None => true,
            Some(columns) => columns.iter().any(|c| c.output_name() == name),
        }
    }
}
