/// Input Schema Derivation for Tool Arguments
///
/// Tool arguments are plain records deriving `serde::Deserialize` and
/// `schemars::JsonSchema`. The generated JSON Schema is flattened into the
/// shape MCP clients expect for `inputSchema`: an object with one
/// `{type, description}` entry per field and an explicit `required` list.
///
/// Nested records and arrays are opaque: only their category (`object` or
/// `array`) is recorded.

use schemars::JsonSchema;
use schemars::r#gen::SchemaSettings;
use schemars::schema::{InstanceType, Schema, SchemaObject, SingleOrVec};
use serde::de::DeserializeOwned;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::core::error::RegistrationError;

/// Arguments record of a tool handler.
///
/// `REQUIRED` lists the serialized names of the fields a caller must supply.
/// It is the only source of the schema's `required` list: an `Option` field is
/// not optional and a plain field is not required unless it is named here.
///
/// ```rust
/// use mcp_grafana::core::schema::{derive_input_schema, ToolArgs};
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema, Default)]
/// #[serde(default, rename_all = "camelCase")]
/// struct QueryParams {
///     /// The UID of the datasource to query
///     datasource_uid: String,
///     /// Maximum number of rows
///     limit: Option<u32>,
/// }
///
/// impl ToolArgs for QueryParams {
///     const REQUIRED: &'static [&'static str] = &["datasourceUid"];
/// }
///
/// let schema = derive_input_schema::<QueryParams>().unwrap();
/// assert_eq!(schema.required(), ["datasourceUid"]);
/// ```
pub trait ToolArgs: JsonSchema + DeserializeOwned + Send + 'static {
    const REQUIRED: &'static [&'static str];
}

/// Primitive category of a single argument field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    fn from_instance(instance: InstanceType) -> Option<Self> {
        match instance {
            InstanceType::String => Some(Self::String),
            InstanceType::Integer => Some(Self::Integer),
            InstanceType::Number => Some(Self::Number),
            InstanceType::Boolean => Some(Self::Boolean),
            InstanceType::Array => Some(Self::Array),
            InstanceType::Object => Some(Self::Object),
            InstanceType::Null => None,
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(_) => Some(Self::String),
            Value::Number(n) if n.is_f64() => Some(Self::Number),
            Value::Number(_) => Some(Self::Integer),
            Value::Bool(_) => Some(Self::Boolean),
            Value::Array(_) => Some(Self::Array),
            Value::Object(_) => Some(Self::Object),
            Value::Null => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// One entry of `inputSchema.properties`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PropertySchema {
    /// `None` when the field accepts any JSON value.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyType>,
    pub description: String,
}

/// Flattened object schema describing a tool's arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSchema {
    properties: Vec<(String, PropertySchema)>,
    required: Vec<String>,
}

impl InputSchema {
    /// Properties in field declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertySchema)> {
        self.properties.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, schema)| schema)
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct Properties<'a>(&'a [(String, PropertySchema)]);

        impl Serialize for Properties<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for (name, schema) in self.0 {
                    map.serialize_entry(name, schema)?;
                }
                map.end()
            }
        }

        let entries = if self.required.is_empty() { 2 } else { 3 };
        let mut map = serializer.serialize_map(Some(entries))?;
        map.serialize_entry("type", "object")?;
        map.serialize_entry("properties", &Properties(&self.properties))?;
        if !self.required.is_empty() {
            map.serialize_entry("required", &self.required)?;
        }
        map.end()
    }
}

/// Derive the input schema for `P`.
///
/// Fails when `P` does not serialize as a JSON object or when
/// `P::REQUIRED` names a field `P` does not have.
pub fn derive_input_schema<P: ToolArgs>() -> Result<InputSchema, RegistrationError> {
    let generator = SchemaSettings::draft07()
        .with(|settings| {
            settings.inline_subschemas = true;
            settings.option_nullable = false;
            settings.option_add_null_type = false;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<P>();
    flatten(&root.schema, P::REQUIRED)
}

fn flatten(schema: &SchemaObject, required: &[&str]) -> Result<InputSchema, RegistrationError> {
    match category(schema) {
        Some(PropertyType::Object) => {}
        other => {
            return Err(RegistrationError::ParamsNotObject {
                found: other.map_or("untyped value", PropertyType::as_str).to_string(),
            });
        }
    }

    let properties: Vec<(String, PropertySchema)> = schema
        .object
        .as_ref()
        .map(|object| {
            object
                .properties
                .iter()
                .map(|(name, field)| (name.clone(), property(field)))
                .collect()
        })
        .unwrap_or_default();

    for field in required {
        if !properties.iter().any(|(name, _)| name == field) {
            return Err(RegistrationError::UnknownRequiredField {
                field: (*field).to_string(),
            });
        }
    }

    Ok(InputSchema {
        properties,
        required: required.iter().map(|field| (*field).to_string()).collect(),
    })
}

fn property(schema: &Schema) -> PropertySchema {
    match schema {
        Schema::Object(object) => PropertySchema {
            kind: category(object),
            description: object
                .metadata
                .as_ref()
                .and_then(|metadata| metadata.description.clone())
                .unwrap_or_default(),
        },
        Schema::Bool(_) => PropertySchema {
            kind: None,
            description: String::new(),
        },
    }
}

fn category(schema: &SchemaObject) -> Option<PropertyType> {
    match &schema.instance_type {
        Some(SingleOrVec::Single(instance)) => PropertyType::from_instance(**instance),
        Some(SingleOrVec::Vec(instances)) => instances
            .iter()
            .find_map(|instance| PropertyType::from_instance(*instance)),
        None => schema
            .enum_values
            .as_ref()
            .and_then(|values| values.first())
            .and_then(PropertyType::from_value),
    }
}
