#![forbid(unsafe_code)]

pub mod cloud;
pub mod error;
pub mod point;
pub mod polygon;

pub use cloud::{Colors, Normals, PointCloud};
pub use error::{ensure_positive, FilterError, Result};
pub use point::Vertex;
pub use polygon::Polygon;
