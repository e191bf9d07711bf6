//! Common types shared by every pipeline stage.

use crate::error::ShapeError;
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Shape tag of a [`StateVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// A single point in 3D state space
    Point,
    /// A `rows x cols` table, flattened row-major
    Table { rows: usize, cols: usize },
}

impl StateKind {
    /// Number of scalar components carried by this shape.
    pub fn dimension(&self) -> usize {
        match self {
            Self::Point => 3,
            Self::Table { rows, cols } => rows * cols,
        }
    }
}

/// Payload moved through the store and published frame by frame.
///
/// Every shape that can travel through the pipeline is a variant here, so
/// flattening and rebuilding are exhaustive matches rather than runtime
/// shape inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateVector {
    /// Point of a 3D dynamical system (e.g. Lorenz `x, y, z`)
    Point { coords: Vector3<f64> },

    /// Matrix payload such as an (N, 2) coordinate table
    Table { values: DMatrix<f64> },
}

impl StateVector {
    /// Creates a 3D point.
    pub fn point(x: f64, y: f64, z: f64) -> Self {
        Self::Point {
            coords: Vector3::new(x, y, z),
        }
    }

    /// Creates a table from row-major data.
    pub fn table(rows: usize, cols: usize, row_major: &[f64]) -> Result<Self, ShapeError> {
        if rows * cols != row_major.len() {
            return Err(ShapeError {
                expected: rows * cols,
                actual: row_major.len(),
            });
        }
        Ok(Self::Table {
            values: DMatrix::from_row_slice(rows, cols, row_major),
        })
    }

    /// Shape tag.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Point { .. } => StateKind::Point,
            Self::Table { values } => StateKind::Table {
                rows: values.nrows(),
                cols: values.ncols(),
            },
        }
    }

    /// Number of scalar components.
    pub fn dimension(&self) -> usize {
        self.kind().dimension()
    }

    /// Flattens into a component vector (row-major for tables).
    pub fn components(&self) -> DVector<f64> {
        match self {
            Self::Point { coords } => DVector::from_column_slice(coords.as_slice()),
            // Transposed column-major storage is the row-major order of the original
            Self::Table { values } => DVector::from_column_slice(values.transpose().as_slice()),
        }
    }

    /// Rebuilds a value of the same shape from a component vector.
    pub fn with_components(&self, components: &DVector<f64>) -> Result<Self, ShapeError> {
        let expected = self.dimension();
        if components.len() != expected {
            return Err(ShapeError {
                expected,
                actual: components.len(),
            });
        }

        Ok(match self {
            Self::Point { .. } => Self::point(components[0], components[1], components[2]),
            Self::Table { values } => Self::Table {
                values: DMatrix::from_row_slice(values.nrows(), values.ncols(), components.as_slice()),
            },
        })
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Point { coords } => coords.iter().all(|v| v.is_finite()),
            Self::Table { values } => values.iter().all(|v| v.is_finite()),
        }
    }
}

impl std::fmt::Display for StateVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.components().iter().map(|v| format!("{:.5}", v)).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Opaque reference to a value held in a [`StateStore`](crate::StateStore).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    id: Uuid,
    label: String,
}

impl Handle {
    /// Creates a fresh handle. Ids are random, so two puts never alias.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }

    /// Returns the store key.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Human-readable label given at `put` time.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short id keeps log lines readable
        write!(f, "{} ({})", self.label, &self.id.to_string()[..8])
    }
}

/// Message carried on a WorkQueue between two stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Where the payload lives
    pub handle: Handle,

    /// Producer frame index, for log correlation only
    pub sequence_tag: u64,
}

impl WorkItem {
    pub fn new(handle: Handle, sequence_tag: u64) -> Self {
        Self { handle, sequence_tag }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_components() {
        let p = StateVector::point(1.0, 2.0, 3.0);
        assert_eq!(p.kind(), StateKind::Point);
        assert_eq!(p.dimension(), 3);
        assert_eq!(p.components().as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_table_is_row_major() {
        let t = StateVector::table(2, 2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.kind(), StateKind::Table { rows: 2, cols: 2 });
        assert_eq!(t.components().as_slice(), &[1.0, 2.0, 3.0, 4.0]);

        let rebuilt = t.with_components(&DVector::from_vec(vec![5.0, 6.0, 7.0, 8.0])).unwrap();
        match rebuilt {
            StateVector::Table { values } => {
                assert_eq!(values[(0, 1)], 6.0);
                assert_eq!(values[(1, 0)], 7.0);
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_table_rejects_bad_length() {
        let err = StateVector::table(2, 3, &[1.0; 5]).unwrap_err();
        assert_eq!(err, ShapeError { expected: 6, actual: 5 });
    }

    #[test]
    fn test_with_components_checks_dimension() {
        let p = StateVector::point(0.0, 0.0, 0.0);
        assert!(p.with_components(&DVector::from_vec(vec![1.0, 2.0])).is_err());
    }

    #[test]
    fn test_is_finite() {
        assert!(StateVector::point(1.0, 2.0, 3.0).is_finite());
        assert!(!StateVector::point(f64::NAN, 2.0, 3.0).is_finite());
        assert!(!StateVector::table(1, 2, &[1.0, f64::INFINITY]).unwrap().is_finite());
    }

    #[test]
    fn test_handles_never_alias() {
        let a = Handle::new("same label");
        let b = Handle::new("same label");
        assert_ne!(a, b);
        assert_eq!(a.label(), "same label");
    }
}
