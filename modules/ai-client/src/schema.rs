use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types that can be requested as structured model output.
///
/// Automatically implemented for any type that implements
/// `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a tool-input JSON schema for this type.
    ///
    /// Provider constraints:
    /// 1. `additionalProperties: false` on every object schema
    /// 2. ALL properties listed in `required`, even nullable ones
    /// 3. Fully inlined schemas (no `$ref` references)
    fn tool_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        let definitions = value.get("definitions").cloned();
        normalize(&mut value, definitions.as_ref());

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// One pass over the schema tree: inline `$ref`s, collapse single-element
/// `allOf` wrappers, close object schemas, and require every property.
fn normalize(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(defs) = definitions {
                    let type_name = ref_path.trim_start_matches("#/definitions/");
                    if let Some(def) = defs.get(type_name) {
                        *value = def.clone();
                        normalize(value, definitions);
                        return;
                    }
                }
            }

            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    normalize(value, definitions);
                    return;
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }

            for (_, v) in map.iter_mut() {
                normalize(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                normalize(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Verdict {
        score: u8,
        rationale: Option<String>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct BatchResponse {
        verdicts: Vec<Verdict>,
    }

    #[test]
    fn objects_are_closed_and_fully_required() {
        let schema = BatchResponse::tool_schema();
        let obj = schema.as_object().unwrap();

        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));
        assert_eq!(
            obj.get("additionalProperties"),
            Some(&serde_json::Value::Bool(false))
        );

        let required: Vec<&str> = obj
            .get("required")
            .and_then(|r| r.as_array())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"verdicts"));
    }

    #[test]
    fn nested_refs_are_inlined() {
        let schema = BatchResponse::tool_schema();
        let items = &schema["properties"]["verdicts"]["items"];
        let item_obj = items.as_object().unwrap();

        assert!(!item_obj.contains_key("$ref"));
        let required: Vec<&str> = item_obj
            .get("required")
            .and_then(|r| r.as_array())
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"score"));
        assert!(required.contains(&"rationale"));
    }
}
