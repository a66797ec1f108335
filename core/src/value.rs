//! Dynamic values.

use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::types::{MemberKind, Type, TypeKind};

// ============================================================================
// Value
// ============================================================================

/// A runtime value. Objects and arrays are shared and immutable.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Object(Arc<Object>),
    Array(Arc<ArrayValue>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The runtime type of the value, `None` for null.
    pub fn type_of(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(Type::bool()),
            Value::Int(_) => Some(Type::int()),
            Value::Float(_) => Some(Type::float()),
            Value::Str(_) => Some(Type::string()),
            Value::Object(object) => Some(object.ty.clone()),
            Value::Array(array) => Some(array.ty.clone()),
        }
    }

    pub fn type_name(&self) -> String {
        self.type_of()
            .map_or_else(|| "null".to_string(), |ty| ty.to_string())
    }

    /// Build an array of `element` values; every item must fit the element type.
    pub fn array(element: &Type, items: Vec<Value>) -> Result<Value, EvalError> {
        if let Some(bad) = items.iter().find(|item| !element.accepts(item)) {
            return Err(EvalError::type_mismatch(format!(
                "{} cannot be stored in a {element}[]",
                bad.type_name()
            )));
        }
        Ok(Value::Array(Arc::new(ArrayValue {
            ty: Type::array(element),
            items,
        })))
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "\"{}\"", escape_string(s)),
            Value::Object(object) => write!(f, "{object}"),
            Value::Array(array) => {
                write!(f, "[")?;
                for (i, item) in array.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::new();
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            c => result.push(c),
        }
    }
    result
}

// ============================================================================
// Objects
// ============================================================================

/// An instance of a class or struct.
#[derive(Debug, PartialEq)]
pub struct Object {
    ty: Type,
    fields: Box<[Value]>,
}

impl Object {
    pub(crate) fn from_parts(ty: Type, fields: Vec<Value>) -> Self {
        Object {
            ty,
            fields: fields.into_boxed_slice(),
        }
    }

    /// Start building an instance of `ty`.
    pub fn build(ty: &Type) -> ObjectBuilder {
        ObjectBuilder {
            ty: ty.clone(),
            assignments: Vec::new(),
        }
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn field(&self, slot: usize) -> Option<&Value> {
        self.fields.get(slot)
    }

    /// Field value by name (properties are not evaluated).
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.ty.member(name)?.kind() {
            MemberKind::Field { slot } => self.field(*slot),
            _ => None,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {{", self.ty)?;
        let mut first = true;
        for member in self.ty.members() {
            if let MemberKind::Field { slot } = member.kind() {
                let value = self.fields.get(*slot).unwrap_or(&Value::Null);
                write!(f, "{} {member} = {value}", if first { "" } else { "," })?;
                first = false;
            }
        }
        write!(f, " }}")
    }
}

/// Collects field assignments; [`ObjectBuilder::finish`] validates them.
/// Unassigned fields take their type's default value.
pub struct ObjectBuilder {
    ty: Type,
    assignments: Vec<(String, Value)>,
}

impl ObjectBuilder {
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.assignments.push((name.to_string(), value.into()));
        self
    }

    pub fn finish(self) -> Result<Value, EvalError> {
        if !matches!(self.ty.kind(), TypeKind::Class | TypeKind::Struct) {
            return Err(EvalError::type_mismatch(format!(
                "`{}` cannot be instantiated",
                self.ty
            )));
        }
        let mut fields: Vec<Value> = self
            .ty
            .members()
            .iter()
            .filter(|m| matches!(m.kind(), MemberKind::Field { .. }))
            .map(|m| m.ty().default_value())
            .collect();
        for (name, value) in self.assignments {
            let member = self
                .ty
                .member(&name)
                .ok_or_else(|| EvalError::missing_member(&self.ty, &name))?;
            let MemberKind::Field { slot } = member.kind() else {
                return Err(EvalError::type_mismatch(format!(
                    "`{}.{name}` is not a field",
                    self.ty
                )));
            };
            if !member.ty().accepts(&value) {
                return Err(EvalError::type_mismatch(format!(
                    "{} cannot be assigned to `{}.{name}` of type {}",
                    value.type_name(),
                    self.ty,
                    member.ty()
                )));
            }
            fields[*slot] = value;
        }
        Ok(Value::Object(Arc::new(Object::from_parts(self.ty, fields))))
    }
}

// ============================================================================
// Arrays
// ============================================================================

#[derive(Debug, PartialEq)]
pub struct ArrayValue {
    ty: Type,
    items: Vec<Value>,
}

impl ArrayValue {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: i64) -> Result<&Value, EvalError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.items.get(i))
            .ok_or_else(|| EvalError::index_out_of_range(index, self.items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn person() -> Type {
        let person = Type::class("Person");
        person
            .define()
            .field("Name", &Type::string())
            .field("Age", &Type::int())
            .field("Parent", &person)
            .finish()
            .unwrap()
    }

    #[test]
    fn test_builder_sets_fields_and_defaults_the_rest() {
        let person = person();
        let value = Object::build(&person).with("Name", "Ann").finish().unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.get("Name"), Some(&Value::from("Ann")));
        assert_eq!(object.get("Age"), Some(&Value::Int(0)));
        assert_eq!(object.get("Parent"), Some(&Value::Null));
    }

    #[test]
    fn test_builder_rejects_unknown_field() {
        let err = Object::build(&person()).with("Nmae", "Ann").finish().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingMember);
    }

    #[test]
    fn test_builder_rejects_wrong_type() {
        let err = Object::build(&person()).with("Age", "old").finish().unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_builder_rejects_null_for_value_type() {
        let err = Object::build(&person())
            .with("Age", Value::Null)
            .finish()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Null.type_of(), None);
        assert_eq!(Value::Int(1).type_of(), Some(Type::int()));
        assert_eq!(Value::from("x").type_name(), "string");
    }

    #[test]
    fn test_array_checks_element_types() {
        let ok = Value::array(&Type::int(), vec![Value::Int(1), Value::Int(2)]).unwrap();
        assert_eq!(ok.to_string(), "[1, 2]");
        assert!(Value::array(&Type::int(), vec![Value::from("x")]).is_err());
    }

    #[test]
    fn test_array_get_out_of_range() {
        let Value::Array(array) = Value::array(&Type::int(), vec![Value::Int(1)]).unwrap() else {
            unreachable!()
        };
        assert_eq!(array.get(0).unwrap(), &Value::Int(1));
        assert_eq!(array.get(1).unwrap_err().kind, ErrorKind::IndexOutOfRange);
        assert_eq!(array.get(-1).unwrap_err().kind, ErrorKind::IndexOutOfRange);
    }

    #[test]
    fn test_display_object() {
        let person = person();
        let value = Object::build(&person)
            .with("Name", "Ann")
            .with("Age", 41)
            .finish()
            .unwrap();
        assert_eq!(
            value.to_string(),
            "Person { Name = \"Ann\", Age = 41, Parent = null }"
        );
    }
}
