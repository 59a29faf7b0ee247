use fpcfilter_core::{FilterError, Polygon, Result};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Load a crop boundary from a GeoJSON file.
///
/// Accepts a FeatureCollection, a single Feature or a bare Geometry. The
/// first `Polygon` found (the first member of a `MultiPolygon` counts, and
/// geometry collections are searched in order) provides the boundary: its
/// outer ring, with x and y taken from each position. Holes are ignored.
pub fn read_boundary(path: impl AsRef<Path>) -> Result<Polygon> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| FilterError::read(path, e))?;
    let geojson: GeoJson = content
        .parse()
        .map_err(|e| FilterError::format(path, format!("invalid GeoJSON: {e}")))?;

    let geometries: Vec<Geometry> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().filter_map(|f| f.geometry).collect(),
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::Geometry(g) => vec![g],
    };
    debug!(path = %path.display(), geometries = geometries.len(), "parsed boundary file");

    let ring = geometries
        .iter()
        .find_map(|g| outer_ring(&g.value))
        .ok_or_else(|| FilterError::invalid("boundary", format!("no polygon found in {}", path.display())))?;

    let mut vertices = Vec::with_capacity(ring.len());
    for position in ring {
        match position.as_slice() {
            [x, y, ..] => vertices.push([*x, *y]),
            _ => {
                return Err(FilterError::format(
                    path,
                    "polygon position has fewer than two coordinates",
                ))
            }
        }
    }

    // GeoJSON rings repeat the first position at the end.
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices.pop();
    }

    let polygon = Polygon::new(vertices)?;
    info!(path = %path.display(), vertices = polygon.len(), "loaded crop boundary");
    Ok(polygon)
}

fn outer_ring(value: &Value) -> Option<&Vec<Vec<f64>>> {
    match value {
        Value::Polygon(rings) => rings.first(),
        Value::MultiPolygon(polygons) => polygons.first().and_then(|rings| rings.first()),
        Value::GeometryCollection(geometries) => geometries.iter().find_map(|g| outer_ring(&g.value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::read_boundary;
    use fpcfilter_core::FilterError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn geojson_file(text: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(text.as_bytes()).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    #[test]
    fn reads_first_polygon_of_feature_collection() {
        let tmp = geojson_file(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {}, "geometry":
                        {"type": "Point", "coordinates": [5.0, 5.0]}},
                    {"type": "Feature", "properties": {"name": "site"}, "geometry":
                        {"type": "Polygon", "coordinates": [
                            [[0.0, 0.0, 12.0], [10.0, 0.0, 12.0], [10.0, 10.0, 12.0], [0.0, 10.0, 12.0], [0.0, 0.0, 12.0]],
                            [[2.0, 2.0], [3.0, 2.0], [3.0, 3.0], [2.0, 2.0]]
                        ]}}
                ]
            }"#,
        );
        let polygon = read_boundary(tmp.path()).unwrap();
        assert_eq!(
            polygon.vertices(),
            &[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]
        );
        assert!(polygon.contains(5.0, 5.0));
        // Holes are not part of the boundary.
        assert!(polygon.contains(2.5, 2.5));
        assert!(!polygon.contains(11.0, 5.0));
    }

    #[test]
    fn reads_bare_geometry_and_multipolygon() {
        let tmp = geojson_file(
            r#"{"type": "MultiPolygon", "coordinates": [
                [[[0, 0], [4, 0], [0, 4], [0, 0]]],
                [[[10, 10], [14, 10], [10, 14], [10, 10]]]
            ]}"#,
        );
        let polygon = read_boundary(tmp.path()).unwrap();
        assert_eq!(polygon.len(), 3);
        assert!(polygon.contains(1.0, 1.0));
        assert!(!polygon.contains(11.0, 11.0));
    }

    #[test]
    fn no_polygon_is_invalid_parameter() {
        let tmp = geojson_file(r#"{"type": "Feature", "properties": null, "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}"#);
        assert!(matches!(
            read_boundary(tmp.path()),
            Err(FilterError::InvalidParameter { name: "boundary", .. })
        ));
    }

    #[test]
    fn malformed_json_is_format_error() {
        let tmp = geojson_file("{ this is not json");
        assert!(matches!(read_boundary(tmp.path()), Err(FilterError::Format { .. })));
    }

    #[test]
    fn degenerate_ring_is_rejected() {
        let tmp = geojson_file(r#"{"type": "Polygon", "coordinates": [[[0, 0], [1, 1], [0, 0]]]}"#);
        assert!(read_boundary(tmp.path()).is_err());
    }
}
