//! Datatype declarations.
//!
//! A [`Datatype`] is a plain value describing the shape of a JSON payload.
//! Declarations may be written in shorthand (a bare choice-set, a
//! single-item sequence, a key/value pair) and are rewritten into canonical
//! form by [`Datatype::normalize`]. Normalization is idempotent, so already
//! canonical declarations pass through unchanged.
//!
//! Named field-sets live in a [`TypeTable`]. Interning a field-set there
//! resolves any [`Datatype::SelfRef`] inside it to the new entry's own
//! [`ComplexId`], which is how recursive types (a tree node whose children
//! are tree nodes) stay finite and hashable.

use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Scalar constants usable as enum choices and field defaults.
///
/// Deliberately excludes floats so the type stays `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Scalar {
    /// The raw JSON value this scalar corresponds to.
    pub fn to_value(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(n) => Value::from(*n),
            Scalar::Str(s) => Value::from(s.as_str()),
        }
    }

    /// Convert a raw JSON value, if it is scalar-representable.
    pub fn from_value(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Scalar::Int),
            Value::String(s) => Some(Scalar::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Str(s.to_owned())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// The simple (non-composite) JSON kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Simple {
    Bool,
    Int,
    Num,
    Str,
}

/// The membership test of an enumeration: either an explicit choice list
/// or a predicate over scalars.
#[derive(Clone)]
pub enum EnumChoices {
    Values(Vec<Scalar>),
    Predicate(fn(&Scalar) -> bool),
}

impl EnumChoices {
    pub fn contains(&self, scalar: &Scalar) -> bool {
        match self {
            EnumChoices::Values(values) => values.contains(scalar),
            EnumChoices::Predicate(pred) => pred(scalar),
        }
    }
}

impl PartialEq for EnumChoices {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EnumChoices::Values(a), EnumChoices::Values(b)) => a == b,
            // Predicates compare by address only. Two behaviorally
            // identical predicates written separately count as different
            // enumerations; cloned declarations stay equal.
            (EnumChoices::Predicate(a), EnumChoices::Predicate(b)) => {
                std::ptr::fn_addr_eq(*a, *b)
            }
            _ => false,
        }
    }
}

impl Eq for EnumChoices {}

impl Hash for EnumChoices {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            EnumChoices::Values(values) => {
                0u8.hash(state);
                values.hash(state);
            }
            EnumChoices::Predicate(pred) => {
                1u8.hash(state);
                (*pred as usize).hash(state);
            }
        }
    }
}

impl std::fmt::Debug for EnumChoices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnumChoices::Values(values) => f.debug_tuple("Values").field(values).finish(),
            EnumChoices::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// An ordered or unordered union of alternative datatypes.
///
/// Matching always tries members in declaration order and the first match
/// wins. Orderedness only affects equality: two unions with the same
/// members in different order compare equal when both are unordered, or
/// when every member is simple (order cannot change match results then).
#[derive(Debug, Clone, Eq)]
pub struct UnionType {
    pub members: Vec<Datatype>,
    pub ordered: bool,
}

impl UnionType {
    fn all_simple(&self) -> bool {
        self.members.iter().all(Datatype::is_simple)
    }

    fn same_members_any_order(&self, other: &UnionType) -> bool {
        if self.members.len() != other.members.len() {
            return false;
        }
        let mut unmatched: Vec<&Datatype> = other.members.iter().collect();
        for member in &self.members {
            match unmatched.iter().position(|m| *m == member) {
                Some(i) => {
                    unmatched.swap_remove(i);
                }
                None => return false,
            }
        }
        true
    }
}

impl PartialEq for UnionType {
    fn eq(&self, other: &Self) -> bool {
        if self.members == other.members {
            return true;
        }
        let order_free = (!self.ordered && !other.ordered)
            || (self.all_simple() && other.all_simple());
        order_free && self.same_members_any_order(other)
    }
}

impl Hash for UnionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-insensitive: equal unions may list members in different order.
        self.members.len().hash(state);
        let mut combined = 0u64;
        for member in &self.members {
            let mut h = std::hash::DefaultHasher::new();
            member.hash(&mut h);
            combined ^= h.finish();
        }
        combined.hash(state);
    }
}

/// Handle into a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComplexId(pub(crate) usize);

/// The shape of a JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Matches anything.
    Any,
    /// Matches only JSON `null`.
    Null,
    Simple(Simple),
    /// A simple kind restricted to a set of choices.
    Enum(Simple, EnumChoices),
    Union(UnionType),
    /// A homogeneous JSON array.
    Array(Box<Datatype>),
    /// A homogeneous JSON object with declared key and value datatypes.
    Map(Box<Datatype>, Box<Datatype>),
    /// A named field-set interned in a [`TypeTable`].
    Complex(ComplexId),
    /// Placeholder for the enclosing complex type, resolved at interning.
    SelfRef,

    // Shorthand forms, rewritten by `normalize`.
    /// A bare choice-set: shorthand for an unordered union.
    Choice(Vec<Datatype>),
    /// A single-item sequence: shorthand for an array of that item.
    Seq(Box<Datatype>),
    /// A key/value pair: shorthand for a map.
    Pair(Box<Datatype>, Box<Datatype>),
}

impl Datatype {
    /// Convenience: an ordered union. First match wins and order matters
    /// for equality.
    pub fn union<I: IntoIterator<Item = Datatype>>(members: I) -> Datatype {
        Datatype::Union(UnionType {
            members: members.into_iter().collect(),
            ordered: true,
        })
    }

    /// Convenience: an unordered union (a choice-set).
    pub fn alternatives<I: IntoIterator<Item = Datatype>>(members: I) -> Datatype {
        Datatype::Union(UnionType {
            members: members.into_iter().collect(),
            ordered: false,
        })
    }

    /// Convenience: an array of `item`.
    pub fn array(item: Datatype) -> Datatype {
        Datatype::Array(Box::new(item))
    }

    /// Convenience: a map from `key` to `value`.
    pub fn map(key: Datatype, value: Datatype) -> Datatype {
        Datatype::Map(Box::new(key), Box::new(value))
    }

    /// Convenience: a map with string keys, the common case.
    pub fn map_of(value: Datatype) -> Datatype {
        Datatype::map(Datatype::Simple(Simple::Str), value)
    }

    /// Convenience: an enumeration over explicit scalar choices.
    pub fn choices<I, S>(kind: Simple, values: I) -> Datatype
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        Datatype::Enum(
            kind,
            EnumChoices::Values(values.into_iter().map(Into::into).collect()),
        )
    }

    /// True for datatypes whose match decision needs no sub-handlers.
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            Datatype::Any | Datatype::Null | Datatype::Simple(_) | Datatype::Enum(..)
        )
    }

    /// Rewrite shorthand forms into canonical ones, recursively.
    ///
    /// Idempotent: normalizing a canonical datatype returns an equal value.
    pub fn normalize(&self) -> Datatype {
        self.normalized().unwrap_or_else(|| self.clone())
    }

    /// Returns `Some` only if normalization changed something, so callers
    /// holding a canonical declaration can keep the original.
    fn normalized(&self) -> Option<Datatype> {
        match self {
            Datatype::Any
            | Datatype::Null
            | Datatype::Simple(_)
            | Datatype::Enum(..)
            | Datatype::Complex(_)
            | Datatype::SelfRef => None,

            Datatype::Union(union) => {
                let members = normalized_vec(&union.members)?;
                Some(Datatype::Union(UnionType {
                    members,
                    ordered: union.ordered,
                }))
            }
            Datatype::Array(item) => item
                .normalized()
                .map(|item| Datatype::Array(Box::new(item))),
            Datatype::Map(key, value) => {
                let (nk, nv) = (key.normalized(), value.normalized());
                if nk.is_none() && nv.is_none() {
                    return None;
                }
                Some(Datatype::Map(
                    Box::new(nk.unwrap_or_else(|| (**key).clone())),
                    Box::new(nv.unwrap_or_else(|| (**value).clone())),
                ))
            }

            Datatype::Choice(members) => Some(Datatype::Union(UnionType {
                members: members.iter().map(Datatype::normalize).collect(),
                ordered: false,
            })),
            Datatype::Seq(item) => Some(Datatype::Array(Box::new(item.normalize()))),
            Datatype::Pair(key, value) => Some(Datatype::Map(
                Box::new(key.normalize()),
                Box::new(value.normalize()),
            )),
        }
    }

    /// Replace [`Datatype::SelfRef`] with a handle to `id`, recursively.
    fn resolve_self(&self, id: ComplexId) -> Datatype {
        match self {
            Datatype::SelfRef => Datatype::Complex(id),
            Datatype::Union(union) => Datatype::Union(UnionType {
                members: union.members.iter().map(|m| m.resolve_self(id)).collect(),
                ordered: union.ordered,
            }),
            Datatype::Array(item) => Datatype::Array(Box::new(item.resolve_self(id))),
            Datatype::Map(key, value) => Datatype::Map(
                Box::new(key.resolve_self(id)),
                Box::new(value.resolve_self(id)),
            ),
            Datatype::Choice(members) => {
                Datatype::Choice(members.iter().map(|m| m.resolve_self(id)).collect())
            }
            Datatype::Seq(item) => Datatype::Seq(Box::new(item.resolve_self(id))),
            Datatype::Pair(key, value) => Datatype::Pair(
                Box::new(key.resolve_self(id)),
                Box::new(value.resolve_self(id)),
            ),
            other => other.clone(),
        }
    }
}

fn normalized_vec(members: &[Datatype]) -> Option<Vec<Datatype>> {
    let mut changed = false;
    let normalized: Vec<Datatype> = members
        .iter()
        .map(|m| match m.normalized() {
            Some(n) => {
                changed = true;
                n
            }
            None => m.clone(),
        })
        .collect();
    changed.then_some(normalized)
}

/// One declared field of a complex type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub datatype: Datatype,
    pub optional: bool,
    pub default: Option<Scalar>,
}

impl Field {
    /// A required field.
    pub fn new(name: &str, datatype: Datatype) -> Field {
        Field {
            name: name.to_owned(),
            datatype,
            optional: false,
            default: None,
        }
    }

    /// An optional field without a default.
    pub fn optional(name: &str, datatype: Datatype) -> Field {
        Field {
            optional: true,
            ..Field::new(name, datatype)
        }
    }

    /// An optional field filled with `default` when absent.
    pub fn with_default(name: &str, datatype: Datatype, default: impl Into<Scalar>) -> Field {
        Field {
            optional: true,
            default: Some(default.into()),
            ..Field::new(name, datatype)
        }
    }
}

/// Items of a positional field declaration list.
#[derive(Debug, Clone)]
pub enum FieldDecl {
    Field(Field),
    /// Every field after this marker is optional.
    StartOptional,
}

impl From<Field> for FieldDecl {
    fn from(field: Field) -> Self {
        FieldDecl::Field(field)
    }
}

/// An ordered set of named fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    pub fn new<I: IntoIterator<Item = Field>>(fields: I) -> Fields {
        Fields {
            fields: fields.into_iter().collect(),
        }
    }

    /// Build from a positional list where [`FieldDecl::StartOptional`]
    /// switches the remaining fields to optional.
    ///
    /// Fails on duplicate field names or a repeated marker.
    pub fn declare<I: IntoIterator<Item = FieldDecl>>(decls: I) -> Result<Fields> {
        let mut fields = Vec::new();
        let mut optional = false;
        for decl in decls {
            match decl {
                FieldDecl::StartOptional => {
                    if optional {
                        return Err(SchemaError::Declaration(
                            "start-optional marker used twice".into(),
                        ));
                    }
                    optional = true;
                }
                FieldDecl::Field(mut field) => {
                    if fields.iter().any(|f: &Field| f.name == field.name) {
                        return Err(SchemaError::Declaration(format!(
                            "duplicate field {:?}",
                            field.name
                        )));
                    }
                    field.optional = field.optional || optional;
                    fields.push(field);
                }
            }
        }
        Ok(Fields { fields })
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn transform(&self, f: impl Fn(&Datatype) -> Datatype) -> Fields {
        Fields {
            fields: self
                .fields
                .iter()
                .map(|field| Field {
                    datatype: f(&field.datatype),
                    ..field.clone()
                })
                .collect(),
        }
    }
}

/// A named complex type: its name plus its field-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexType {
    pub name: String,
    pub fields: Fields,
}

/// Arena of interned complex types.
///
/// Entries are append-only, so a [`ComplexId`] handed out once stays valid
/// for the table's lifetime.
#[derive(Debug, Default)]
pub struct TypeTable {
    types: Vec<ComplexType>,
}

impl TypeTable {
    pub fn new() -> TypeTable {
        TypeTable::default()
    }

    /// Intern a named field-set. Field datatypes are normalized and any
    /// [`Datatype::SelfRef`] resolves to the new entry itself.
    pub fn declare(&mut self, name: &str, fields: Fields) -> ComplexId {
        let id = ComplexId(self.types.len());
        let fields = fields.transform(|dt| dt.normalize().resolve_self(id));
        self.types.push(ComplexType {
            name: name.to_owned(),
            fields,
        });
        id
    }

    pub fn get(&self, id: ComplexId) -> Option<&ComplexType> {
        self.types.get(id.0)
    }

    pub fn lookup(&self, name: &str) -> Option<ComplexId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(ComplexId)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_choice_shorthand() {
        let decl = Datatype::Choice(vec![
            Datatype::Simple(Simple::Int),
            Datatype::Simple(Simple::Str),
        ]);
        let canonical = decl.normalize();

        match canonical {
            Datatype::Union(union) => {
                assert!(!union.ordered);
                assert_eq!(union.members.len(), 2);
            }
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn normalize_seq_and_pair_shorthand() {
        let seq = Datatype::Seq(Box::new(Datatype::Simple(Simple::Int))).normalize();
        assert_eq!(seq, Datatype::array(Datatype::Simple(Simple::Int)));

        let pair = Datatype::Pair(
            Box::new(Datatype::Simple(Simple::Str)),
            Box::new(Datatype::Any),
        )
        .normalize();
        assert_eq!(pair, Datatype::map(Datatype::Simple(Simple::Str), Datatype::Any));
    }

    #[test]
    fn normalize_recurses_into_nested_shorthand() {
        let decl = Datatype::array(Datatype::Choice(vec![Datatype::Null, Datatype::Any]));
        let canonical = decl.normalize();
        assert_eq!(
            canonical,
            Datatype::array(Datatype::alternatives(vec![Datatype::Null, Datatype::Any]))
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let decl = Datatype::Choice(vec![
            Datatype::Seq(Box::new(Datatype::Simple(Simple::Num))),
            Datatype::Pair(Box::new(Datatype::Simple(Simple::Str)), Box::new(Datatype::Any)),
        ]);
        let once = decl.normalize();
        let twice = once.normalize();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_keeps_canonical_value_equal() {
        let canonical = Datatype::union(vec![
            Datatype::Simple(Simple::Int),
            Datatype::array(Datatype::Simple(Simple::Str)),
        ]);
        assert_eq!(canonical.normalize(), canonical);
    }

    #[test]
    fn unordered_unions_compare_order_free() {
        let a = Datatype::alternatives(vec![
            Datatype::Simple(Simple::Int),
            Datatype::array(Datatype::Any),
        ]);
        let b = Datatype::alternatives(vec![
            Datatype::array(Datatype::Any),
            Datatype::Simple(Simple::Int),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn ordered_unions_with_composite_members_are_order_sensitive() {
        let a = Datatype::union(vec![
            Datatype::array(Datatype::Any),
            Datatype::Simple(Simple::Int),
        ]);
        let b = Datatype::union(vec![
            Datatype::Simple(Simple::Int),
            Datatype::array(Datatype::Any),
        ]);
        assert_ne!(a, b);
    }

    #[test]
    fn ordered_all_simple_unions_compare_order_free() {
        let a = Datatype::union(vec![
            Datatype::Simple(Simple::Int),
            Datatype::Simple(Simple::Str),
        ]);
        let b = Datatype::union(vec![
            Datatype::Simple(Simple::Str),
            Datatype::Simple(Simple::Int),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn equal_unions_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = Datatype::alternatives(vec![
            Datatype::Simple(Simple::Int),
            Datatype::Simple(Simple::Str),
        ]);
        let b = Datatype::alternatives(vec![
            Datatype::Simple(Simple::Str),
            Datatype::Simple(Simple::Int),
        ]);

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn predicate_choices_compare_by_identity() {
        fn positive(scalar: &Scalar) -> bool {
            matches!(scalar, Scalar::Int(n) if *n > 0)
        }
        fn negative(scalar: &Scalar) -> bool {
            matches!(scalar, Scalar::Int(n) if *n < 0)
        }

        let choices = EnumChoices::Predicate(positive);
        assert_eq!(choices, choices.clone());
        assert_ne!(choices, EnumChoices::Predicate(negative));
        assert_ne!(choices, EnumChoices::Values(vec![Scalar::Int(1)]));
    }

    #[test]
    fn declare_start_optional_switches_remaining_fields() {
        let fields = Fields::declare(vec![
            Field::new("id", Datatype::Simple(Simple::Int)).into(),
            FieldDecl::StartOptional,
            Field::new("label", Datatype::Simple(Simple::Str)).into(),
            Field::new("verified", Datatype::Simple(Simple::Bool)).into(),
        ])
        .unwrap();

        assert!(!fields.get("id").unwrap().optional);
        assert!(fields.get("label").unwrap().optional);
        assert!(fields.get("verified").unwrap().optional);
    }

    #[test]
    fn declare_rejects_second_marker() {
        let err = Fields::declare(vec![
            FieldDecl::StartOptional,
            Field::new("x", Datatype::Any).into(),
            FieldDecl::StartOptional,
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::Declaration(_)));
    }

    #[test]
    fn declare_rejects_duplicate_names() {
        let err = Fields::declare(vec![
            Field::new("x", Datatype::Any).into(),
            Field::new("x", Datatype::Null).into(),
        ])
        .unwrap_err();
        assert!(matches!(err, SchemaError::Declaration(_)));
    }

    #[test]
    fn self_ref_resolves_to_own_id() {
        let mut table = TypeTable::new();
        let fields = Fields::new(vec![
            Field::new("value", Datatype::Simple(Simple::Int)),
            Field::optional("children", Datatype::array(Datatype::SelfRef)),
        ]);
        let id = table.declare("TreeNode", fields);

        let declared = table.get(id).unwrap();
        let children = declared.fields.get("children").unwrap();
        assert_eq!(children.datatype, Datatype::array(Datatype::Complex(id)));
    }

    #[test]
    fn lookup_by_name() {
        let mut table = TypeTable::new();
        let id = table.declare("Source", Fields::default());
        assert_eq!(table.lookup("Source"), Some(id));
        assert_eq!(table.lookup("Missing"), None);
    }

    #[test]
    fn scalar_value_roundtrip() {
        for scalar in [
            Scalar::Null,
            Scalar::Bool(true),
            Scalar::Int(-3),
            Scalar::Str("go".into()),
        ] {
            assert_eq!(Scalar::from_value(&scalar.to_value()), Some(scalar));
        }
    }
}
