//! The parameter engine: match raw JSON against a declaration, then
//! coerce, validate and serialize it.
//!
//! [`Parameter::match_type`] is the only operation that walks the schema.
//! A successful match returns a [`Handler`] that caches every sub-decision
//! made along the way (which union member matched, one handler per array
//! item, a per-field plan for complex types), so the later phases follow
//! the cached plan instead of re-deciding. Calling a later phase with a
//! value whose shape does not fit the cached plan yields
//! [`SchemaError::CoerceFirst`].

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::decl::{ComplexId, Datatype, Scalar, Simple, TypeTable};
use crate::error::{Result, SchemaError};
use crate::namespace::{ArgValue, Namespace, NamespaceSlot};

/// A datatype bound to the [`TypeTable`] its complex handles point into.
#[derive(Debug, Clone)]
pub struct Parameter {
    datatype: Datatype,
    table: Arc<TypeTable>,
    strict: bool,
}

impl Parameter {
    /// Strict parameter: simple kinds match their exact JSON type only.
    pub fn new(datatype: Datatype, table: Arc<TypeTable>) -> Parameter {
        Parameter {
            datatype: datatype.normalize(),
            table,
            strict: true,
        }
    }

    /// Lenient parameter: an integer-valued float matches `Int`.
    pub fn lenient(datatype: Datatype, table: Arc<TypeTable>) -> Parameter {
        Parameter {
            strict: false,
            ..Parameter::new(datatype, table)
        }
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn table(&self) -> &Arc<TypeTable> {
        &self.table
    }

    /// Test whether `raw` matches the declaration. On success the returned
    /// handler carries every cached sub-decision.
    pub fn match_type(&self, raw: &Value) -> Option<Handler> {
        self.match_datatype(&self.datatype, raw)
    }

    /// Match `raw` and wrap the result for staged coerce/validate calls.
    ///
    /// On mismatch the error pinpoints the cause: a missing required field,
    /// the first offending field value, a partially specified composite
    /// field, or fields the declaration does not know.
    pub fn bind(&self, raw: &Value) -> Result<Bound> {
        match self.match_type(raw) {
            Some(handler) => Ok(Bound::new(handler, raw.clone())),
            None => {
                let err = self.explain_mismatch(&self.datatype, raw);
                trace!(%err, "bind failed");
                Err(err)
            }
        }
    }

    fn match_datatype(&self, datatype: &Datatype, raw: &Value) -> Option<Handler> {
        let shape = match datatype {
            Datatype::Any => Shape::Value,
            Datatype::Null => {
                if !raw.is_null() {
                    return None;
                }
                Shape::Value
            }
            Datatype::Simple(kind) => {
                if !self.matches_simple(*kind, raw) {
                    return None;
                }
                Shape::Value
            }
            Datatype::Enum(kind, choices) => {
                if !self.matches_simple(*kind, raw) {
                    return None;
                }
                let scalar = Scalar::from_value(raw)?;
                if !choices.contains(&scalar) {
                    return None;
                }
                Shape::Value
            }
            // First member to match wins; its handler records the choice.
            Datatype::Union(union) => {
                return union
                    .members
                    .iter()
                    .find_map(|member| self.match_datatype(member, raw));
            }
            Datatype::Array(item) => {
                let items = raw.as_array()?;
                let mut handlers = Vec::with_capacity(items.len());
                for value in items {
                    handlers.push(self.match_datatype(item, value)?);
                }
                Shape::Array(handlers)
            }
            Datatype::Map(key, value) => {
                let object = raw.as_object()?;
                let mut entries = Vec::with_capacity(object.len());
                for (k, v) in object {
                    self.match_datatype(key, &Value::from(k.as_str()))?;
                    entries.push((k.clone(), self.match_datatype(value, v)?));
                }
                Shape::Map(entries)
            }
            Datatype::Complex(id) => return self.match_complex(*id, raw),
            // Unresolved self-references and un-normalized shorthand never
            // match; `Parameter::new` normalizes, and interning resolves.
            Datatype::SelfRef
            | Datatype::Choice(_)
            | Datatype::Seq(_)
            | Datatype::Pair(..) => return None,
        };
        Some(Handler {
            datatype: datatype.clone(),
            shape,
        })
    }

    fn match_complex(&self, id: ComplexId, raw: &Value) -> Option<Handler> {
        let complex = self.table.get(id)?;
        let object = raw.as_object()?;

        if object.keys().any(|k| complex.fields.get(k).is_none()) {
            return None;
        }

        let mut slots = Vec::with_capacity(complex.fields.len());
        for field in complex.fields.iter() {
            let plan = match object.get(&field.name) {
                Some(value) => FieldPlan::Present(self.match_datatype(&field.datatype, value)?),
                None if !field.optional => return None,
                None => match &field.default {
                    Some(default) => FieldPlan::Default(default.clone()),
                    None => FieldPlan::Skip,
                },
            };
            slots.push(SlotPlan {
                name: field.name.clone(),
                plan,
            });
        }

        Some(Handler {
            datatype: Datatype::Complex(id),
            shape: Shape::Namespace {
                id,
                type_name: complex.name.clone(),
                slots,
            },
        })
    }

    fn matches_simple(&self, kind: Simple, raw: &Value) -> bool {
        match kind {
            Simple::Bool => raw.is_boolean(),
            Simple::Str => raw.is_string(),
            Simple::Num => raw.is_number(),
            Simple::Int => {
                if raw.is_i64() || raw.is_u64() {
                    return true;
                }
                if self.strict {
                    return false;
                }
                matches!(raw.as_f64(), Some(f) if f.is_finite() && f.fract() == 0.0)
            }
        }
    }

    fn explain_mismatch(&self, datatype: &Datatype, raw: &Value) -> SchemaError {
        if let Datatype::Complex(id) = datatype {
            if let (Some(complex), Some(object)) = (self.table.get(*id), raw.as_object()) {
                let unexpected: Vec<String> = object
                    .keys()
                    .filter(|k| complex.fields.get(k).is_none())
                    .cloned()
                    .collect();
                if !unexpected.is_empty() {
                    return SchemaError::UnexpectedFields { fields: unexpected };
                }

                for field in complex.fields.iter() {
                    match object.get(&field.name) {
                        None if !field.optional => {
                            return SchemaError::MissingField {
                                field: field.name.clone(),
                            };
                        }
                        Some(value) if self.match_datatype(&field.datatype, value).is_none() => {
                            if let Some(missing) = self.missing_subfields(&field.datatype, value) {
                                return SchemaError::Incomplete {
                                    field: field.name.clone(),
                                    missing,
                                };
                            }
                            return SchemaError::TypeMismatch {
                                field: Some(field.name.clone()),
                                value: value.clone(),
                            };
                        }
                        _ => {}
                    }
                }
            }
        }
        SchemaError::TypeMismatch {
            field: None,
            value: raw.clone(),
        }
    }

    /// For a composite field whose value is an object, the required
    /// sub-fields it lacks. `Some` means the value is partially specified
    /// rather than outright mismatched.
    fn missing_subfields(&self, datatype: &Datatype, value: &Value) -> Option<Vec<String>> {
        let Datatype::Complex(id) = datatype else {
            return None;
        };
        let complex = self.table.get(*id)?;
        let object = value.as_object()?;
        let missing: Vec<String> = complex
            .fields
            .iter()
            .filter(|f| !f.optional && !object.contains_key(&f.name))
            .map(|f| f.name.clone())
            .collect();
        (!missing.is_empty()).then_some(missing)
    }
}

/// The cached result of a successful match.
#[derive(Debug, Clone)]
pub struct Handler {
    datatype: Datatype,
    shape: Shape,
}

#[derive(Debug, Clone)]
enum Shape {
    /// Any, null, simple or enum value; coercion is structural.
    Value,
    /// One cached handler per array item.
    Array(Vec<Handler>),
    /// One cached handler per map entry, in key order.
    Map(Vec<(String, Handler)>),
    /// Per-field plan for a complex type.
    Namespace {
        id: ComplexId,
        type_name: String,
        slots: Vec<SlotPlan>,
    },
}

#[derive(Debug, Clone)]
struct SlotPlan {
    name: String,
    plan: FieldPlan,
}

#[derive(Debug, Clone)]
enum FieldPlan {
    Present(Handler),
    Default(Scalar),
    Skip,
}

impl Handler {
    fn trivial() -> Handler {
        Handler {
            datatype: Datatype::Any,
            shape: Shape::Value,
        }
    }

    /// The datatype that matched. For a union this is the winning member.
    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    /// Convert a raw value into its coerced form, following the cached plan.
    pub fn coerce(&self, raw: &Value) -> Result<ArgValue> {
        match &self.shape {
            Shape::Value => Ok(ArgValue::from_raw(raw)),
            Shape::Array(handlers) => {
                let items = raw.as_array().ok_or(SchemaError::CoerceFirst)?;
                if items.len() != handlers.len() {
                    return Err(SchemaError::CoerceFirst);
                }
                let coerced = items
                    .iter()
                    .zip(handlers)
                    .map(|(value, handler)| handler.coerce(value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ArgValue::Array(coerced))
            }
            Shape::Map(entries) => {
                let object = raw.as_object().ok_or(SchemaError::CoerceFirst)?;
                if object.len() != entries.len() {
                    return Err(SchemaError::CoerceFirst);
                }
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, handler) in entries {
                    let value = object.get(key).ok_or(SchemaError::CoerceFirst)?;
                    pairs.push((key.clone(), handler.coerce(value)?));
                }
                Ok(ArgValue::Map(pairs))
            }
            Shape::Namespace {
                id,
                type_name,
                slots,
            } => {
                let object = raw.as_object().ok_or(SchemaError::CoerceFirst)?;
                let mut out = Vec::with_capacity(slots.len());
                for slot in slots {
                    match &slot.plan {
                        FieldPlan::Present(handler) => {
                            let value = object.get(&slot.name).ok_or(SchemaError::CoerceFirst)?;
                            out.push(NamespaceSlot {
                                name: slot.name.clone(),
                                value: handler.coerce(value)?,
                                handler: handler.clone(),
                            });
                        }
                        FieldPlan::Default(default) => out.push(NamespaceSlot {
                            name: slot.name.clone(),
                            value: ArgValue::from_raw(&default.to_value()),
                            handler: Handler::trivial(),
                        }),
                        FieldPlan::Skip => {}
                    }
                }
                Ok(ArgValue::Namespace(Namespace::new(
                    type_name.clone(),
                    *id,
                    out,
                )))
            }
        }
    }

    /// Check semantic constraints of an already-coerced value: simple kind,
    /// enum membership, null singleton equality.
    pub fn validate(&self, value: &ArgValue) -> Result<()> {
        match (&self.shape, value) {
            (Shape::Value, v) => self.validate_value(v),
            (Shape::Array(handlers), ArgValue::Array(items))
                if items.len() == handlers.len() =>
            {
                for (handler, item) in handlers.iter().zip(items) {
                    handler.validate(item)?;
                }
                Ok(())
            }
            (Shape::Map(entries), ArgValue::Map(pairs)) if pairs.len() == entries.len() => {
                for ((key, handler), (k, v)) in entries.iter().zip(pairs) {
                    if key != k {
                        return Err(SchemaError::CoerceFirst);
                    }
                    handler.validate(v)?;
                }
                Ok(())
            }
            (Shape::Namespace { id, .. }, ArgValue::Namespace(ns)) if ns.id() == *id => {
                ns.validate()
            }
            _ => Err(SchemaError::CoerceFirst),
        }
    }

    /// Serialize a coerced value back to raw JSON.
    pub fn as_data(&self, value: &ArgValue) -> Result<Value> {
        match (&self.shape, value) {
            (Shape::Value, v) => v.as_value(),
            (Shape::Array(handlers), ArgValue::Array(items))
                if items.len() == handlers.len() =>
            {
                let out = handlers
                    .iter()
                    .zip(items)
                    .map(|(handler, item)| handler.as_data(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(out))
            }
            (Shape::Map(entries), ArgValue::Map(pairs)) if pairs.len() == entries.len() => {
                let mut object = serde_json::Map::new();
                for ((key, handler), (k, v)) in entries.iter().zip(pairs) {
                    if key != k {
                        return Err(SchemaError::CoerceFirst);
                    }
                    object.insert(k.clone(), handler.as_data(v)?);
                }
                Ok(Value::Object(object))
            }
            (Shape::Namespace { id, .. }, ArgValue::Namespace(ns)) if ns.id() == *id => {
                ns.as_data()
            }
            _ => Err(SchemaError::CoerceFirst),
        }
    }

    fn validate_value(&self, value: &ArgValue) -> Result<()> {
        match &self.datatype {
            Datatype::Any => Ok(()),
            Datatype::Null => match value {
                ArgValue::Null => Ok(()),
                other => Err(SchemaError::Validation(format!(
                    "expected null, got {other:?}"
                ))),
            },
            Datatype::Simple(kind) => validate_kind(*kind, value),
            Datatype::Enum(kind, choices) => {
                validate_kind(*kind, value)?;
                let scalar = match value {
                    ArgValue::Null => Scalar::Null,
                    ArgValue::Bool(b) => Scalar::Bool(*b),
                    ArgValue::Int(i) => Scalar::Int(*i),
                    ArgValue::Str(s) => Scalar::Str(s.clone()),
                    other => {
                        return Err(SchemaError::Validation(format!(
                            "{other:?} is not enumerable"
                        )))
                    }
                };
                if choices.contains(&scalar) {
                    Ok(())
                } else {
                    Err(SchemaError::Validation(format!(
                        "{scalar:?} is not an allowed choice"
                    )))
                }
            }
            _ => Ok(()),
        }
    }
}

fn validate_kind(kind: Simple, value: &ArgValue) -> Result<()> {
    let ok = match kind {
        Simple::Bool => matches!(value, ArgValue::Bool(_)),
        Simple::Str => matches!(value, ArgValue::Str(_)),
        Simple::Num => matches!(value, ArgValue::Int(_) | ArgValue::Num(_)),
        Simple::Int => match value {
            ArgValue::Int(_) => true,
            ArgValue::Num(f) => f.is_finite() && f.fract() == 0.0,
            _ => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(SchemaError::Validation(format!(
            "expected {kind:?}, got {value:?}"
        )))
    }
}

/// A raw value bound to its matched handler, with staged results cached.
///
/// `coerce`, `validate` and `as_data` each run at most once; repeated calls
/// return the cached outcome.
#[derive(Debug)]
pub struct Bound {
    handler: Handler,
    raw: Value,
    coerced: Option<ArgValue>,
    validated: bool,
}

impl Bound {
    fn new(handler: Handler, raw: Value) -> Bound {
        Bound {
            handler,
            raw,
            coerced: None,
            validated: false,
        }
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn coerce(&mut self) -> Result<&ArgValue> {
        if self.coerced.is_none() {
            self.coerced = Some(self.handler.coerce(&self.raw)?);
        }
        match &self.coerced {
            Some(value) => Ok(value),
            None => Err(SchemaError::CoerceFirst),
        }
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.validated {
            return Ok(());
        }
        self.coerce()?;
        match &self.coerced {
            Some(value) => {
                self.handler.validate(value)?;
                self.validated = true;
                Ok(())
            }
            None => Err(SchemaError::CoerceFirst),
        }
    }

    pub fn as_data(&mut self) -> Result<Value> {
        self.coerce()?;
        match &self.coerced {
            Some(value) => self.handler.as_data(value),
            None => Err(SchemaError::CoerceFirst),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::decl::{EnumChoices, Field, Fields};

    fn param(datatype: Datatype) -> Parameter {
        Parameter::new(datatype, Arc::new(TypeTable::new()))
    }

    fn source_table() -> (Arc<TypeTable>, ComplexId) {
        let mut table = TypeTable::new();
        let id = table.declare(
            "Source",
            Fields::new(vec![
                Field::new("path", Datatype::Simple(Simple::Str)),
                Field::optional("sourceReference", Datatype::Simple(Simple::Int)),
                Field::with_default("origin", Datatype::Simple(Simple::Str), "local"),
            ]),
        );
        (Arc::new(table), id)
    }

    #[test]
    fn any_matches_everything() {
        let p = param(Datatype::Any);
        for raw in [json!(null), json!(3), json!("x"), json!([1]), json!({"a": 1})] {
            assert!(p.match_type(&raw).is_some());
        }
    }

    #[test]
    fn simple_kinds_match_strictly() {
        let p = param(Datatype::Simple(Simple::Int));
        assert!(p.match_type(&json!(7)).is_some());
        assert!(p.match_type(&json!(7.0)).is_none());
        assert!(p.match_type(&json!("7")).is_none());

        let p = param(Datatype::Simple(Simple::Num));
        assert!(p.match_type(&json!(7)).is_some());
        assert!(p.match_type(&json!(7.5)).is_some());
    }

    #[test]
    fn lenient_int_accepts_integer_valued_floats() {
        let p = Parameter::lenient(Datatype::Simple(Simple::Int), Arc::new(TypeTable::new()));
        assert!(p.match_type(&json!(7.0)).is_some());
        assert!(p.match_type(&json!(7.5)).is_none());
    }

    #[test]
    fn enum_checks_membership_at_match() {
        let p = param(Datatype::choices(Simple::Str, ["step", "breakpoint", "pause"]));
        assert!(p.match_type(&json!("pause")).is_some());
        assert!(p.match_type(&json!("detonate")).is_none());
        assert!(p.match_type(&json!(3)).is_none());
    }

    #[test]
    fn enum_predicate_choices() {
        let p = param(Datatype::Enum(
            Simple::Int,
            EnumChoices::Predicate(|s| matches!(s, Scalar::Int(n) if *n > 0)),
        ));
        assert!(p.match_type(&json!(12)).is_some());
        assert!(p.match_type(&json!(-1)).is_none());
    }

    #[test]
    fn union_first_match_wins() {
        let p = param(Datatype::union(vec![
            Datatype::Simple(Simple::Num),
            Datatype::Simple(Simple::Int),
        ]));
        let handler = p.match_type(&json!(5)).unwrap();
        assert_eq!(handler.datatype(), &Datatype::Simple(Simple::Num));
    }

    #[test]
    fn union_falls_through_to_later_member() {
        let p = param(Datatype::union(vec![
            Datatype::Simple(Simple::Str),
            Datatype::array(Datatype::Simple(Simple::Int)),
        ]));
        let handler = p.match_type(&json!([1, 2])).unwrap();
        assert_eq!(
            handler.datatype(),
            &Datatype::array(Datatype::Simple(Simple::Int))
        );
    }

    #[test]
    fn array_matches_every_item_or_nothing() {
        let p = param(Datatype::array(Datatype::Simple(Simple::Int)));
        assert!(p.match_type(&json!([1, 2, 3])).is_some());
        assert!(p.match_type(&json!([])).is_some());
        assert!(p.match_type(&json!([1, "x"])).is_none());
        assert!(p.match_type(&json!(1)).is_none());
    }

    #[test]
    fn map_matches_keys_and_values() {
        let p = param(Datatype::map(
            Datatype::Simple(Simple::Str),
            Datatype::Simple(Simple::Int),
        ));
        assert!(p.match_type(&json!({"a": 1, "b": 2})).is_some());
        assert!(p.match_type(&json!({"a": "x"})).is_none());
    }

    #[test]
    fn complex_requires_required_fields() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        assert!(p.match_type(&json!({"path": "/tmp/a.rs"})).is_some());
        assert!(p.match_type(&json!({"sourceReference": 4})).is_none());
    }

    #[test]
    fn complex_rejects_unknown_fields() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);
        assert!(p.match_type(&json!({"path": "x", "color": "red"})).is_none());
    }

    #[test]
    fn coerce_fills_declared_defaults() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let handler = p.match_type(&json!({"path": "x"})).unwrap();
        let value = handler.coerce(&json!({"path": "x"})).unwrap();
        let ArgValue::Namespace(ns) = value else {
            panic!("expected namespace");
        };
        assert_eq!(ns.get("origin"), Some(&ArgValue::Str("local".into())));
        assert_eq!(ns.get("sourceReference"), None);
    }

    #[test]
    fn coerce_preserves_map_key_order() {
        let p = param(Datatype::map(Datatype::Simple(Simple::Str), Datatype::Any));
        let raw = json!({"zeta": 1, "alpha": 2});

        let handler = p.match_type(&raw).unwrap();
        let ArgValue::Map(pairs) = handler.coerce(&raw).unwrap() else {
            panic!("expected map");
        };
        let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn as_data_round_trips() {
        let (table, id) = source_table();
        let p = Parameter::new(
            Datatype::array(Datatype::union(vec![
                Datatype::Complex(id),
                Datatype::Simple(Simple::Int),
            ])),
            table,
        );
        let raw = json!([{"path": "a", "sourceReference": 1}, 42]);

        let handler = p.match_type(&raw).unwrap();
        let coerced = handler.coerce(&raw).unwrap();
        let data = handler.as_data(&coerced).unwrap();

        // The default gets filled in; everything given round-trips.
        assert_eq!(data[0]["path"], "a");
        assert_eq!(data[0]["sourceReference"], 1);
        assert_eq!(data[0]["origin"], "local");
        assert_eq!(data[1], 42);
    }

    #[test]
    fn validate_rejects_shape_from_other_match() {
        let p = param(Datatype::array(Datatype::Simple(Simple::Int)));
        let handler = p.match_type(&json!([1, 2])).unwrap();

        let err = handler
            .validate(&ArgValue::Array(vec![ArgValue::Int(1)]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::CoerceFirst));
    }

    #[test]
    fn coerce_with_wrong_raw_is_an_error() {
        let p = param(Datatype::array(Datatype::Simple(Simple::Int)));
        let handler = p.match_type(&json!([1, 2])).unwrap();
        let err = handler.coerce(&json!("nope")).unwrap_err();
        assert!(matches!(err, SchemaError::CoerceFirst));
    }

    #[test]
    fn bind_reports_missing_field() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let err = p.bind(&json!({"sourceReference": 3})).unwrap_err();
        assert!(matches!(err, SchemaError::MissingField { field } if field == "path"));
    }

    #[test]
    fn bind_reports_offending_field_value() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let err = p.bind(&json!({"path": 17})).unwrap_err();
        match err {
            SchemaError::TypeMismatch { field, value } => {
                assert_eq!(field.as_deref(), Some("path"));
                assert_eq!(value, json!(17));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bind_reports_unexpected_fields() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let err = p.bind(&json!({"path": "x", "extra": 1})).unwrap_err();
        assert!(matches!(err, SchemaError::UnexpectedFields { fields } if fields == ["extra"]));
    }

    #[test]
    fn bind_distinguishes_incomplete_composite_field() {
        let mut table = TypeTable::new();
        let inner = table.declare(
            "Position",
            Fields::new(vec![
                Field::new("line", Datatype::Simple(Simple::Int)),
                Field::new("column", Datatype::Simple(Simple::Int)),
            ]),
        );
        let outer = table.declare(
            "Breakpoint",
            Fields::new(vec![Field::new("position", Datatype::Complex(inner))]),
        );
        let p = Parameter::new(Datatype::Complex(outer), Arc::new(table));

        let err = p.bind(&json!({"position": {"line": 3}})).unwrap_err();
        match err {
            SchemaError::Incomplete { field, missing } => {
                assert_eq!(field, "position");
                assert_eq!(missing, ["column"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bound_caches_staged_results() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let mut bound = p.bind(&json!({"path": "x"})).unwrap();
        bound.validate().unwrap();
        bound.validate().unwrap();
        let data = bound.as_data().unwrap();
        assert_eq!(data["origin"], "local");
    }

    #[test]
    fn self_referencing_type_matches_nested_values() {
        let mut table = TypeTable::new();
        let id = table.declare(
            "TreeNode",
            Fields::new(vec![
                Field::new("value", Datatype::Simple(Simple::Int)),
                Field::optional("children", Datatype::array(Datatype::SelfRef)),
            ]),
        );
        let p = Parameter::new(Datatype::Complex(id), Arc::new(table));

        let raw = json!({
            "value": 1,
            "children": [
                {"value": 2},
                {"value": 3, "children": [{"value": 4}]}
            ]
        });
        let handler = p.match_type(&raw).unwrap();
        let coerced = handler.coerce(&raw).unwrap();
        assert_eq!(handler.as_data(&coerced).unwrap(), raw);

        assert!(p.match_type(&json!({"value": 1, "children": [{"value": "x"}]})).is_none());
    }

    #[test]
    fn namespace_equality_follows_serialized_data() {
        let (table, id) = source_table();
        let p = Parameter::new(Datatype::Complex(id), table);

        let a = json!({"path": "x", "sourceReference": 1});
        let b = json!({"sourceReference": 1, "path": "x"});

        let ha = p.match_type(&a).unwrap();
        let hb = p.match_type(&b).unwrap();
        let va = ha.coerce(&a).unwrap();
        let vb = hb.coerce(&b).unwrap();
        assert_eq!(va, vb);
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn raw_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                "[a-z]{0,8}".prop_map(Value::from),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                    prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(|m| {
                        Value::Object(m.into_iter().collect())
                    }),
                ]
            })
        }

        proptest! {
            #[test]
            fn any_coerce_round_trips(raw in raw_value()) {
                let p = param(Datatype::Any);
                let handler = p.match_type(&raw).unwrap();
                let coerced = handler.coerce(&raw).unwrap();
                handler.validate(&coerced).unwrap();
                prop_assert_eq!(handler.as_data(&coerced).unwrap(), raw);
            }

            #[test]
            fn int_array_round_trips(items in prop::collection::vec(any::<i64>(), 0..16)) {
                let p = param(Datatype::array(Datatype::Simple(Simple::Int)));
                let raw = Value::from(items);
                let handler = p.match_type(&raw).unwrap();
                let coerced = handler.coerce(&raw).unwrap();
                prop_assert_eq!(handler.as_data(&coerced).unwrap(), raw);
            }
        }
    }
}
