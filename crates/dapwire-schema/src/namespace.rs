//! Coerced values and field namespaces.

use serde_json::Value;

use crate::decl::ComplexId;
use crate::error::Result;
use crate::param::Handler;

/// A coerced payload value.
///
/// Produced by [`Handler::coerce`](crate::param::Handler::coerce); mirrors
/// JSON structurally except that objects matched against a complex type
/// become a [`Namespace`]. Map entries keep their original key order.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    Array(Vec<ArgValue>),
    Map(Vec<(String, ArgValue)>),
    Namespace(Namespace),
}

impl ArgValue {
    /// Structural conversion from raw JSON. Integers that fit `i64` become
    /// [`ArgValue::Int`], all other numbers become [`ArgValue::Num`].
    pub fn from_raw(raw: &Value) -> ArgValue {
        match raw {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ArgValue::Int(i),
                None => ArgValue::Num(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => ArgValue::Str(s.clone()),
            Value::Array(items) => ArgValue::Array(items.iter().map(ArgValue::from_raw).collect()),
            Value::Object(object) => ArgValue::Map(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), ArgValue::from_raw(v)))
                    .collect(),
            ),
        }
    }

    /// Serialize back to raw JSON.
    ///
    /// Round-trips with [`ArgValue::from_raw`]: the output compares equal to
    /// the input the value was coerced from.
    pub fn as_value(&self) -> Result<Value> {
        Ok(match self {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Int(i) => Value::from(*i),
            ArgValue::Num(n) => Value::from(*n),
            ArgValue::Str(s) => Value::from(s.as_str()),
            ArgValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(ArgValue::as_value)
                    .collect::<Result<Vec<_>>>()?,
            ),
            ArgValue::Map(pairs) => {
                let mut object = serde_json::Map::new();
                for (key, value) in pairs {
                    object.insert(key.clone(), value.as_value()?);
                }
                Value::Object(object)
            }
            ArgValue::Namespace(ns) => ns.as_data()?,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NamespaceSlot {
    pub(crate) name: String,
    pub(crate) handler: Handler,
    pub(crate) value: ArgValue,
}

/// A coerced complex value: named fields plus the per-field handlers that
/// validated them.
///
/// The handlers are captured at coercion time, so [`Namespace::validate`]
/// and [`Namespace::as_data`] never walk the schema again. Absent optional
/// fields with a declared default appear filled in; absent optional fields
/// without one are simply not present.
#[derive(Debug, Clone)]
pub struct Namespace {
    type_name: String,
    id: ComplexId,
    slots: Vec<NamespaceSlot>,
}

impl Namespace {
    pub(crate) fn new(type_name: String, id: ComplexId, slots: Vec<NamespaceSlot>) -> Namespace {
        Namespace {
            type_name,
            id,
            slots,
        }
    }

    /// Name of the complex type this namespace was coerced against.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> ComplexId {
        self.id
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| &slot.value)
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Re-run every field's validator against its value.
    pub fn validate(&self) -> Result<()> {
        for slot in &self.slots {
            slot.handler.validate(&slot.value)?;
        }
        Ok(())
    }

    /// Serialize back to a raw JSON object, fields in declaration order.
    pub fn as_data(&self) -> Result<Value> {
        let mut object = serde_json::Map::new();
        for slot in &self.slots {
            object.insert(slot.name.clone(), slot.handler.as_data(&slot.value)?);
        }
        Ok(Value::Object(object))
    }
}

/// Namespaces compare by serialized data, so two namespaces built from
/// equivalent raw objects are equal regardless of internal handler state.
impl PartialEq for Namespace {
    fn eq(&self, other: &Self) -> bool {
        match (self.as_data(), other.as_data()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}
