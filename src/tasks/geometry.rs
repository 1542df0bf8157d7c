//! Draft geometry validation.
//!
//! A task's geometry must be a GeoJSON `Feature` whose inner geometry is a
//! single `Polygon`. The input is normalized before storage: any `id` key in
//! the feature's property bag is stripped so it cannot collide with the
//! task's own id.

use serde_json::Value;

use crate::error::ApiError;

/// Validate and normalize a draft geometry, returning the serialized form
/// that gets stored.
pub fn validate(raw: &str) -> Result<String, ApiError> {
    let mut feature: Value = serde_json::from_str(raw)
        .map_err(|err| ApiError::Validation(format!("invalid GeoJSON ({err}): {raw}")))?;

    let is_feature = feature.get("type").and_then(Value::as_str) == Some("Feature");
    let is_polygon = feature
        .get("geometry")
        .filter(|g| !g.is_null())
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
        == Some("Polygon");
    if !is_feature || !is_polygon {
        return Err(ApiError::Validation(format!(
            "task geometry is null, not a feature or doesn't contain a polygon: {raw}"
        )));
    }

    if let Some(properties) = feature.get_mut("properties").and_then(Value::as_object_mut) {
        properties.remove("id");
    }

    Ok(feature.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn polygon_feature(properties: Value) -> String {
        json!({
            "type": "Feature",
            "properties": properties,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]],
            },
        })
        .to_string()
    }

    #[test]
    fn test_accepts_polygon_feature() {
        let normalized = validate(&polygon_feature(json!({}))).unwrap();
        let value: Value = serde_json::from_str(&normalized).unwrap();
        assert_eq!(value["geometry"]["type"], "Polygon");
    }

    #[test]
    fn test_strips_id_property() {
        let raw = polygon_feature(json!({"id": "sneaky", "label": "keep me"}));
        let normalized = validate(&raw).unwrap();
        let value: Value = serde_json::from_str(&normalized).unwrap();
        assert!(value["properties"].get("id").is_none());
        assert_eq!(value["properties"]["label"], "keep me");
    }

    #[test]
    fn test_rejects_unparseable_input() {
        let err = validate("{not json").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(err.to_string().contains("{not json"));
    }

    #[test]
    fn test_rejects_non_feature() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [],
        })
        .to_string();
        assert!(matches!(validate(&raw), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_rejects_null_geometry() {
        let raw = json!({"type": "Feature", "properties": {}, "geometry": null}).to_string();
        assert!(matches!(validate(&raw), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_rejects_non_polygon_geometry() {
        let raw = json!({
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
        })
        .to_string();
        let err = validate(&raw).unwrap_err();
        assert!(err.to_string().contains("Point"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_never_panics_on_arbitrary_input(input in ".*") {
                let _ = validate(&input);
            }

            #[test]
            fn test_strips_any_id_value(id_value in "[a-zA-Z0-9]{0,16}") {
                let raw = polygon_feature(json!({ "id": id_value }));
                let normalized = validate(&raw).unwrap();
                let value: Value = serde_json::from_str(&normalized).unwrap();
                prop_assert!(value["properties"].get("id").is_none());
            }
        }
    }
}
