use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Types that can be requested as strict structured output.
///
/// Blanket-implemented for anything deriving `JsonSchema + Deserialize`. The
/// strict JSON-schema mode imposes rules the schemars output does not follow:
/// every object must carry `additionalProperties: false`, every property must
/// appear in `required` (nullable ones included), and `$ref`s must be inlined.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    fn openai_schema() -> serde_json::Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();

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

fn normalize(value: &mut serde_json::Value, definitions: Option<&serde_json::Value>) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.and_then(|d| d.get(name)) {
                        *value = def.clone();
                        normalize(value, definitions);
                        return;
                    }
                }
            }

            // schemars wraps single-parent refs in allOf.
            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    if let Some(inner) = all_of.into_iter().next() {
                        *value = inner;
                        normalize(value, definitions);
                        return;
                    }
                }
            }

            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(keys));
                }
            }

            for (_, child) in map.iter_mut() {
                normalize(child, definitions);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
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
    struct Scores {
        civic: f64,
        risk: Option<bool>,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Verdict {
        scores: Scores,
        label: String,
    }

    #[test]
    fn objects_closed_and_fully_required() {
        let schema = Scores::openai_schema();
        let obj = schema.as_object().unwrap();

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
        assert!(required.contains(&"civic"));
        assert!(required.contains(&"risk"));
    }

    #[test]
    fn nested_types_inlined() {
        let schema = Verdict::openai_schema();
        let obj = schema.as_object().unwrap();

        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));

        let scores = obj
            .get("properties")
            .and_then(|p| p.get("scores"))
            .and_then(|s| s.as_object())
            .unwrap();
        assert!(!scores.contains_key("$ref"));
        assert_eq!(
            scores.get("additionalProperties"),
            Some(&serde_json::Value::Bool(false))
        );
    }
}
