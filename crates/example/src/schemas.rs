//! Wire types and the schema provider for the widget resource.

use opchain_spec::{OpError, SchemaProvider, SchemaRef};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Widget {
    /// Store-assigned identifier.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Units in stock.
    pub quantity: u32,
}

/// Request body of `create`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NewWidget {
    /// Display name. Must not be blank.
    pub name: String,
    /// Units in stock.
    #[serde(default)]
    pub quantity: u32,
}

/// Request body of `update`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WidgetPatch {
    /// New display name.
    pub name: Option<String>,
    /// New stock level.
    pub quantity: Option<u32>,
}

/// Validates widget requests with serde and describes them with schemars.
///
/// Requests of operations without a typed body pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetSchemas;

impl WidgetSchemas {
    /// Returns the JSON schema behind `reference`, if it is typed.
    #[must_use]
    pub fn json_schema(reference: &SchemaRef) -> Option<Value> {
        let schema = match reference.as_str() {
            r if r.ends_with(".create.request") => schema_for!(NewWidget),
            r if r.ends_with(".update.request") => schema_for!(WidgetPatch),
            r if r.ends_with(".response") => schema_for!(Widget),
            _ => return None,
        };
        serde_json::to_value(schema).ok()
    }
}

fn normalize<T: DeserializeOwned + Serialize>(schema: &SchemaRef, raw: &Value) -> Result<Value, OpError> {
    let typed: T = serde_json::from_value(raw.clone())
        .map_err(|err| OpError::validation(format!("{schema}: {err}")))?;
    serde_json::to_value(typed).map_err(|err| OpError::validation(format!("{schema}: {err}")))
}

impl SchemaProvider for WidgetSchemas {
    fn validate(&self, schema: &SchemaRef, raw: &Value) -> Result<Value, OpError> {
        let reference = schema.as_str();
        if reference.ends_with(".create.request") {
            let normalized = normalize::<NewWidget>(schema, raw)?;
            let blank = normalized
                .get("name")
                .and_then(Value::as_str)
                .is_none_or(|name| name.trim().is_empty());
            if blank {
                return Err(OpError::validation(format!("{schema}: name must not be blank")));
            }
            Ok(normalized)
        } else if reference.ends_with(".update.request") {
            normalize::<WidgetPatch>(schema, raw)
        } else {
            Ok(raw.clone())
        }
    }

    fn serialize(&self, _schema: &SchemaRef, result: &Value) -> Result<Value, OpError> {
        Ok(result.clone())
    }
}
