//! Matrix and unit helpers
//!
//! Two serializations coexist in the archive:
//!
//! - the 3MF wire transform on `<item>` / `<component>` elements:
//!   twelve space-separated floats holding the top three rows of a 4x4
//!   matrix in column-major order, bottom row implicit `[0 0 0 1]`;
//! - the sidecar `matrix` metadata value: sixteen space-separated
//!   floats, the full 4x4 matrix in row-major order.
//!
//! Malformed strings decode to the identity matrix, matching how
//! existing slicers treat them.

use nalgebra::{Matrix4, Point3};

/// A 4x4 homogeneous transform
pub type Transform3d = Matrix4<f64>;

/// Component count of the 3MF wire transform serialization
pub const WIRE_TRANSFORM_SIZE: usize = 12;

/// Component count of the sidecar matrix serialization
pub const SIDECAR_MATRIX_SIZE: usize = 16;

/// Decode a 3MF wire transform attribute
///
/// Empty or malformed input (wrong component count) yields identity.
/// Individual components that fail to parse decode as 0.
pub fn transform_from_attribute(value: &str) -> Transform3d {
    let mut ret = Transform3d::identity();
    if value.is_empty() {
        return ret;
    }

    let elements: Vec<&str> = value.split_whitespace().collect();
    if elements.len() != WIRE_TRANSFORM_SIZE {
        return ret;
    }

    // stored as 4 columns of 3 rows each
    let mut i = 0;
    for c in 0..4 {
        for r in 0..3 {
            ret[(r, c)] = elements[i].parse::<f64>().unwrap_or(0.0);
            i += 1;
        }
    }
    ret
}

/// Encode a transform as the 3MF wire serialization
pub fn transform_to_attribute(transform: &Transform3d) -> String {
    let mut out = String::new();
    for c in 0..4 {
        for r in 0..3 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&transform[(r, c)].to_string());
        }
    }
    out
}

/// Decode a sidecar `matrix` metadata value (16 floats, row-major)
///
/// Malformed input yields identity.
pub fn matrix_from_metadata(value: &str) -> Transform3d {
    let mut ret = Transform3d::identity();
    let elements: Vec<&str> = value.split_whitespace().collect();
    if elements.len() != SIDECAR_MATRIX_SIZE {
        return ret;
    }

    let mut i = 0;
    for r in 0..4 {
        for c in 0..4 {
            ret[(r, c)] = elements[i].parse::<f64>().unwrap_or(0.0);
            i += 1;
        }
    }
    ret
}

/// Encode a matrix as the sidecar serialization (16 floats, row-major)
pub fn matrix_to_metadata(matrix: &Transform3d) -> String {
    let mut out = String::new();
    for r in 0..4 {
        for c in 0..4 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&matrix[(r, c)].to_string());
        }
    }
    out
}

/// Scale factor applied to every vertex coordinate for a `unit` value
///
/// Unknown strings fall back to millimeters (factor 1).
pub fn unit_factor(unit: &str) -> f32 {
    match unit {
        "micron" => 0.001,
        "centimeter" => 10.0,
        "inch" => 25.4,
        "foot" => 304.8,
        "meter" => 1000.0,
        _ => 1.0,
    }
}

/// True when any axis of the linear part has zero scale
///
/// Such a transform collapses geometry onto a plane or line and is
/// rejected when applied to an instance.
pub fn has_zero_scale(transform: &Transform3d) -> bool {
    for c in 0..3 {
        let norm = (transform[(0, c)] * transform[(0, c)]
            + transform[(1, c)] * transform[(1, c)]
            + transform[(2, c)] * transform[(2, c)])
            .sqrt();
        if norm == 0.0 {
            return true;
        }
    }
    false
}

/// Apply a homogeneous transform to a single-precision point
pub fn transform_point_f32(transform: &Transform3d, point: &Point3<f32>) -> Point3<f32> {
    let p = transform.transform_point(&Point3::new(
        f64::from(point.x),
        f64::from(point.y),
        f64::from(point.z),
    ));
    Point3::new(p.x as f32, p.y as f32, p.z as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_transform_is_identity() {
        assert_eq!(transform_from_attribute(""), Transform3d::identity());
    }

    #[test]
    fn test_wrong_count_is_identity() {
        assert_eq!(
            transform_from_attribute("1 2 3 4 5"),
            Transform3d::identity()
        );
    }

    #[test]
    fn test_identity_attribute_round_trip() {
        let identity = Transform3d::identity();
        let attr = transform_to_attribute(&identity);
        assert_eq!(attr, "1 0 0 0 1 0 0 0 1 0 0 0");
        assert_eq!(transform_from_attribute(&attr), identity);
    }

    #[test]
    fn test_translation_column_major() {
        // translation lives in the last three components
        let t = transform_from_attribute("1 0 0 0 1 0 0 0 1 10 20 30");
        assert_eq!(t[(0, 3)], 10.0);
        assert_eq!(t[(1, 3)], 20.0);
        assert_eq!(t[(2, 3)], 30.0);
        assert_eq!(t[(3, 3)], 1.0);
    }

    #[test]
    fn test_attribute_round_trip_exact() {
        let mut t = Transform3d::identity();
        t[(0, 0)] = 0.123456789012345;
        t[(1, 2)] = -7.5e-8;
        t[(2, 3)] = 42.25;
        let decoded = transform_from_attribute(&transform_to_attribute(&t));
        assert_eq!(decoded, t);
    }

    #[test]
    fn test_matrix_metadata_round_trip() {
        let mut m = Transform3d::identity();
        m[(0, 3)] = 1.5;
        m[(1, 1)] = 2.0;
        m[(2, 0)] = -0.25;
        let encoded = matrix_to_metadata(&m);
        assert_eq!(encoded.split_whitespace().count(), SIDECAR_MATRIX_SIZE);
        assert_eq!(matrix_from_metadata(&encoded), m);
    }

    #[test]
    fn test_matrix_metadata_malformed() {
        assert_eq!(matrix_from_metadata("1 2 3"), Transform3d::identity());
    }

    #[test]
    fn test_unit_factors() {
        assert_eq!(unit_factor("micron"), 0.001);
        assert_eq!(unit_factor("millimeter"), 1.0);
        assert_eq!(unit_factor("centimeter"), 10.0);
        assert_eq!(unit_factor("inch"), 25.4);
        assert_eq!(unit_factor("foot"), 304.8);
        assert_eq!(unit_factor("meter"), 1000.0);
        assert_eq!(unit_factor("parsec"), 1.0);
    }

    #[test]
    fn test_zero_scale_detection() {
        let mut t = Transform3d::identity();
        assert!(!has_zero_scale(&t));
        t[(0, 0)] = 0.0;
        assert!(has_zero_scale(&t));
    }
}
