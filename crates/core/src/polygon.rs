use crate::error::{FilterError, Result};

/// A closed 2D polygon used as a crop boundary.
///
/// The ring is implicitly closed: the last vertex connects back to the
/// first, so an explicitly repeated first vertex is harmless.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<[f64; 2]>,
}

impl Polygon {
    /// Build a polygon, rejecting rings with fewer than 3 vertices.
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(FilterError::invalid(
                "boundary",
                format!("polygon needs at least 3 vertices, got {}", vertices.len()),
            ));
        }
        if vertices.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FilterError::invalid(
                "boundary",
                "polygon vertices must be finite",
            ));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Ray-casting point-in-polygon test.
    ///
    /// A horizontal ray is cast from `(x, y)` towards +x and the inside flag
    /// flips at every edge it crosses. An edge counts when exactly one of its
    /// endpoints lies strictly above `y` and its intersection with the ray is
    /// to the right of `x`. Points on the boundary fall on whichever side this
    /// tie-break puts them.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let mut inside = false;
        let mut j = self.vertices.len() - 1;

        for i in 0..self.vertices.len() {
            let [xi, yi] = self.vertices[i];
            let [xj, yj] = self.vertices[j];

            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }

        inside
    }
}
