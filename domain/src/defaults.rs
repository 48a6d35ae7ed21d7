//! Built-in schemas seeded at startup for the stock resources.

use crate::SchemaDocument;
use serde_json::{Value, json};

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

fn id_property() -> Value {
    json!({"type": "integer", "minimum": 1})
}

fn name_property() -> Value {
    json!({"type": "string", "minLength": 1})
}

// devices and consumption share a shape
fn located_item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "id": id_property(),
            "name": name_property(),
            "type": {"type": "string", "minLength": 1},
            "location_id": {"type": "integer", "minimum": 1},
            "user_id": {"type": ["integer", "null"], "minimum": 1}
        },
        "required": ["name", "type", "location_id"],
        "additionalProperties": false
    })
}

/// Returns `(resource name, schema)` pairs for every built-in resource.
pub fn default_schemas() -> Vec<(&'static str, SchemaDocument)> {
    let raw = [
        (
            "users",
            json!({
                "type": "object",
                "properties": {
                    "id": id_property(),
                    "name": name_property(),
                    "email": {
                        "type": "string",
                        "format": "email",
                        "pattern": EMAIL_PATTERN
                    }
                },
                "required": ["name", "email"],
                "additionalProperties": false
            }),
        ),
        (
            "locations",
            json!({
                "type": "object",
                "properties": {
                    "id": id_property(),
                    "name": name_property(),
                    "address": {"type": "string", "minLength": 1}
                },
                "required": ["name", "address"],
                "additionalProperties": false
            }),
        ),
        ("devices", located_item_schema()),
        ("consumption", located_item_schema()),
    ];

    raw.into_iter()
        .filter_map(|(name, value)| SchemaDocument::parse(value).ok().map(|s| (name, s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_defaults_parse() {
        let names: Vec<_> = default_schemas().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["users", "locations", "devices", "consumption"]);
    }

    #[test]
    fn device_schema_accepts_null_user() {
        let (_, devices) = default_schemas()
            .into_iter()
            .find(|(n, _)| *n == "devices")
            .unwrap();
        let ok = json!({"name": "Meter", "type": "power", "location_id": 1, "user_id": null});
        assert!(devices.validate(&ok).is_ok());

        let bad = json!({"name": "Meter", "type": "power", "location_id": 0, "colour": "red"});
        let violations = devices.validate(&bad).unwrap_err();
        assert_eq!(violations.len(), 2);
    }
}
