//! Type descriptors and members.
//!
//! A [`Type`] is a shared handle to process-lifetime type metadata. Members
//! are declared after the type exists, so a type may refer to itself
//! (`Person.Parent: Person`). Descriptors are never freed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::EvalError;
use crate::interner::Name;
use crate::value::{Object, Value};

/// Counter for allocating type ids
static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(1);

/// Nested struct defaults deeper than this are left null.
const MAX_DEFAULT_DEPTH: usize = 32;

// ============================================================================
// Identity tokens
// ============================================================================

/// Unique token of a declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn next() -> Self {
        TypeId(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identity of a member: its declaring type and declaration slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId {
    declaring: TypeId,
    slot: u32,
}

impl MemberId {
    pub fn declaring(&self) -> TypeId {
        self.declaring
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Computed instance property.
pub type Getter = Arc<dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync>;

/// Static member read.
pub type StaticGetter = Arc<dyn Fn() -> Result<Value, EvalError> + Send + Sync>;

/// Instance method body: `(target, args)`.
pub type MethodFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// User-defined `==` operator.
pub type EqualityFn = Arc<dyn Fn(&Value, &Value) -> Result<bool, EvalError> + Send + Sync>;

// ============================================================================
// Types
// ============================================================================

#[derive(Clone)]
pub enum TypeKind {
    /// Universal base reference type
    Object,
    Bool,
    Int,
    Float,
    /// Strings are reference types
    Str,
    /// User reference type
    Class,
    /// User value type
    Struct,
    /// Value type that may be empty
    Nullable(Type),
    /// Reference type holding elements of one type
    Array(Type),
}

#[derive(Default)]
struct TypeBody {
    members: Vec<Member>,
    methods: Vec<Method>,
    equality: Option<EqualityFn>,
    field_count: usize,
}

struct TypeData {
    id: TypeId,
    name: Name,
    kind: TypeKind,
    body: OnceCell<TypeBody>,
}

/// Shared handle to a type descriptor. Equality is identity.
#[derive(Clone)]
pub struct Type(Arc<TypeData>);

struct Builtins {
    object: Type,
    boolean: Type,
    int: Type,
    float: Type,
    string: Type,
}

static BUILTINS: Lazy<Builtins> = Lazy::new(|| {
    let int = Type::create("int", TypeKind::Int, Some(TypeBody::default()));
    let string_id = TypeId::next();
    let length = TypeBody::with_length(string_id, &int, |value| match value {
        Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
        other => Err(EvalError::type_mismatch(format!(
            "expected a string, got {other}"
        ))),
    });
    Builtins {
        object: Type::create("object", TypeKind::Object, Some(TypeBody::default())),
        boolean: Type::create("bool", TypeKind::Bool, Some(TypeBody::default())),
        float: Type::create("double", TypeKind::Float, Some(TypeBody::default())),
        string: Type::create_with_id(string_id, "string", TypeKind::Str, Some(length)),
        int,
    }
});

/// Nullable and array types, interned per inner type
static NULLABLE_TYPES: Lazy<RwLock<FxHashMap<TypeId, Type>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));
static ARRAY_TYPES: Lazy<RwLock<FxHashMap<TypeId, Type>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

impl Type {
    fn create(name: &str, kind: TypeKind, body: Option<TypeBody>) -> Self {
        Self::create_with_id(TypeId::next(), name, kind, body)
    }

    fn create_with_id(id: TypeId, name: &str, kind: TypeKind, body: Option<TypeBody>) -> Self {
        let cell = OnceCell::new();
        if let Some(body) = body {
            // Freshly created cell, cannot be set yet
            let _ = cell.set(body);
        }
        Type(Arc::new(TypeData {
            id,
            name: Name::new(name),
            kind,
            body: cell,
        }))
    }

    /// Declare a new reference type. Members are added with [`Type::define`].
    pub fn class(name: &str) -> Self {
        Self::create(name, TypeKind::Class, None)
    }

    /// Declare a new value type. Members are added with [`Type::define`].
    pub fn struct_type(name: &str) -> Self {
        Self::create(name, TypeKind::Struct, None)
    }

    pub fn object() -> Self {
        BUILTINS.object.clone()
    }

    pub fn bool() -> Self {
        BUILTINS.boolean.clone()
    }

    pub fn int() -> Self {
        BUILTINS.int.clone()
    }

    pub fn float() -> Self {
        BUILTINS.float.clone()
    }

    pub fn string() -> Self {
        BUILTINS.string.clone()
    }

    /// The nullable form of a value type (`T?`), exposing `HasValue` and `Value`.
    pub fn nullable(inner: &Type) -> Result<Type, EvalError> {
        if !inner.is_value_type() || inner.is_nullable() {
            return Err(EvalError::invalid_definition(format!(
                "`{inner}` is not a non-nullable value type"
            )));
        }
        if let Some(existing) = NULLABLE_TYPES.read().get(&inner.id()) {
            return Ok(existing.clone());
        }
        let mut types = NULLABLE_TYPES.write();
        let ty = types.entry(inner.id()).or_insert_with(|| {
            let id = TypeId::next();
            let has_value = Member::new(
                MemberId { declaring: id, slot: 0 },
                "HasValue",
                &Type::bool(),
                MemberKind::NullableHasValue,
            );
            let value = Member::new(
                MemberId { declaring: id, slot: 1 },
                "Value",
                inner,
                MemberKind::NullableValue,
            );
            let body = TypeBody {
                members: vec![has_value, value],
                ..TypeBody::default()
            };
            Type::create_with_id(
                id,
                &format!("{inner}?"),
                TypeKind::Nullable(inner.clone()),
                Some(body),
            )
        });
        Ok(ty.clone())
    }

    /// The array type with elements of `element` (`T[]`), exposing `Length`.
    pub fn array(element: &Type) -> Type {
        if let Some(existing) = ARRAY_TYPES.read().get(&element.id()) {
            return existing.clone();
        }
        let mut types = ARRAY_TYPES.write();
        types
            .entry(element.id())
            .or_insert_with(|| {
                let id = TypeId::next();
                let body = TypeBody::with_length(id, &Type::int(), |value| match value {
                    Value::Array(array) => Ok(Value::Int(array.len() as i64)),
                    other => Err(EvalError::type_mismatch(format!(
                        "expected an array, got {other}"
                    ))),
                });
                Type::create_with_id(
                    id,
                    &format!("{element}[]"),
                    TypeKind::Array(element.clone()),
                    Some(body),
                )
            })
            .clone()
    }

    /// Start declaring the members of a class or struct.
    pub fn define(&self) -> TypeDefinition {
        TypeDefinition {
            ty: self.clone(),
            body: TypeBody::default(),
            error: None,
        }
    }

    pub fn id(&self) -> TypeId {
        self.0.id
    }

    pub fn name(&self) -> Name {
        self.0.name
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self.0.kind,
            TypeKind::Bool | TypeKind::Int | TypeKind::Float | TypeKind::Struct | TypeKind::Nullable(_)
        )
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.0.kind, TypeKind::Nullable(_))
    }

    /// Reference types and nullable value types can hold null.
    pub fn can_be_null(&self) -> bool {
        !self.is_value_type() || self.is_nullable()
    }

    pub fn element_type(&self) -> Option<&Type> {
        match &self.0.kind {
            TypeKind::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.0.body.get().is_some()
    }

    pub fn members(&self) -> &[Member] {
        match self.0.body.get() {
            Some(body) => &body.members,
            None => &[],
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members().iter().find(|m| m.name().is(name))
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.0
            .body
            .get()
            .and_then(|body| body.methods.iter().find(|m| m.name().is(name)))
    }

    pub fn equality(&self) -> Option<&EqualityFn> {
        self.0.body.get().and_then(|body| body.equality.as_ref())
    }

    pub(crate) fn field_count(&self) -> usize {
        self.0.body.get().map_or(0, |body| body.field_count)
    }

    /// Whether a value of this type may be stored where `self` is expected.
    pub fn accepts(&self, value: &Value) -> bool {
        match value.type_of() {
            None => self.can_be_null(),
            Some(actual) => match &self.0.kind {
                TypeKind::Object => true,
                TypeKind::Nullable(inner) => inner.accepts(value),
                _ => actual == *self,
            },
        }
    }

    /// Zero for primitives, a default instance for structs, null otherwise.
    pub fn default_value(&self) -> Value {
        self.default_value_at(0)
    }

    fn default_value_at(&self, depth: usize) -> Value {
        match &self.0.kind {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Int => Value::Int(0),
            TypeKind::Float => Value::Float(0.0),
            TypeKind::Struct if depth < MAX_DEFAULT_DEPTH => {
                let fields = self
                    .members()
                    .iter()
                    .filter(|m| matches!(m.kind(), MemberKind::Field { .. }))
                    .map(|m| m.ty().default_value_at(depth + 1))
                    .collect();
                Value::Object(Arc::new(Object::from_parts(self.clone(), fields)))
            }
            _ => Value::Null,
        }
    }
}

impl TypeBody {
    fn with_length<F>(owner: TypeId, int: &Type, getter: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let length = Member::new(
            MemberId {
                declaring: owner,
                slot: 0,
            },
            "Length",
            int,
            MemberKind::Property(Arc::new(getter)),
        );
        TypeBody {
            members: vec![length],
            ..TypeBody::default()
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Type {}

impl std::hash::Hash for Type {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}#{})", self.0.name, self.0.id.0)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

// ============================================================================
// Type definition builder
// ============================================================================

/// Collects the members of a class or struct; [`TypeDefinition::finish`]
/// publishes them. A type can only be defined once.
pub struct TypeDefinition {
    ty: Type,
    body: TypeBody,
    error: Option<EvalError>,
}

impl TypeDefinition {
    fn next_id(&self) -> MemberId {
        MemberId {
            declaring: self.ty.id(),
            slot: (self.body.members.len() + self.body.methods.len()) as u32,
        }
    }

    fn push(mut self, name: &str, ty: &Type, kind: MemberKind) -> Self {
        if self.error.is_none() && self.body.members.iter().any(|m| m.name().is(name)) {
            self.error = Some(EvalError::invalid_definition(format!(
                "`{}` declares `{name}` twice",
                self.ty
            )));
        }
        let member = Member::new(self.next_id(), name, ty, kind);
        self.body.members.push(member);
        self
    }

    /// Instance field stored in the object.
    pub fn field(mut self, name: &str, ty: &Type) -> Self {
        let slot = self.body.field_count;
        self.body.field_count += 1;
        self.push(name, ty, MemberKind::Field { slot })
    }

    /// Computed instance property.
    pub fn property<F>(self, name: &str, ty: &Type, getter: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.push(name, ty, MemberKind::Property(Arc::new(getter)))
    }

    /// Static member; reads ignore any instance.
    pub fn static_member<F>(self, name: &str, ty: &Type, getter: F) -> Self
    where
        F: Fn() -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        self.push(name, ty, MemberKind::Static(Arc::new(getter)))
    }

    pub fn method<F>(mut self, name: &str, returns: &Type, body: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        let method = Method(Arc::new(MethodData {
            id: self.next_id(),
            name: Name::new(name),
            returns: returns.clone(),
            body: Arc::new(body),
        }));
        self.body.methods.push(method);
        self
    }

    /// User-defined `==` operator, used only by the interpreter.
    pub fn equality<F>(mut self, op: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<bool, EvalError> + Send + Sync + 'static,
    {
        self.body.equality = Some(Arc::new(op));
        self
    }

    pub fn finish(self) -> Result<Type, EvalError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if !matches!(self.ty.kind(), TypeKind::Class | TypeKind::Struct) {
            return Err(EvalError::invalid_definition(format!(
                "`{}` is not a user-defined type",
                self.ty
            )));
        }
        let ty = self.ty;
        ty.0.body.set(self.body).map_err(|_| {
            EvalError::invalid_definition(format!("`{ty}` is already defined"))
        })?;
        Ok(ty)
    }
}

// ============================================================================
// Members
// ============================================================================

#[derive(Clone)]
pub enum MemberKind {
    Field { slot: usize },
    Property(Getter),
    Static(StaticGetter),
    /// `Nullable<T>.Value`
    NullableValue,
    /// `Nullable<T>.HasValue`
    NullableHasValue,
}

struct MemberData {
    id: MemberId,
    name: Name,
    ty: Type,
    kind: MemberKind,
}

/// A field or property of a type.
#[derive(Clone)]
pub struct Member(Arc<MemberData>);

impl Member {
    fn new(id: MemberId, name: &str, ty: &Type, kind: MemberKind) -> Self {
        Member(Arc::new(MemberData {
            id,
            name: Name::new(name),
            ty: ty.clone(),
            kind,
        }))
    }

    pub fn id(&self) -> MemberId {
        self.0.id
    }

    pub fn declaring(&self) -> TypeId {
        self.0.id.declaring
    }

    pub fn name(&self) -> Name {
        self.0.name
    }

    /// The type of the value the member yields.
    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    pub fn kind(&self) -> &MemberKind {
        &self.0.kind
    }

    pub fn is_static(&self) -> bool {
        matches!(self.0.kind, MemberKind::Static(_))
    }

    pub fn is_nullable_value(&self) -> bool {
        matches!(self.0.kind, MemberKind::NullableValue)
    }

    /// Read the member off `instance` (ignored for static members).
    pub fn read(&self, instance: &Value) -> Result<Value, EvalError> {
        match &self.0.kind {
            MemberKind::Static(getter) => getter(),
            MemberKind::NullableHasValue => Ok(Value::Bool(!instance.is_null())),
            MemberKind::NullableValue if instance.is_null() => Err(EvalError::empty_nullable(
                "nullable object must have a value",
            )),
            MemberKind::NullableValue => Ok(instance.clone()),
            _ if instance.is_null() => Err(EvalError::null_reference(format!(
                "cannot read `{}` of null",
                self.0.name
            ))),
            _ if instance.type_of().map(|t| t.id()) != Some(self.declaring()) => {
                Err(EvalError::type_mismatch(format!(
                    "`{}` is not declared on {}",
                    self.0.name,
                    instance.type_name()
                )))
            }
            MemberKind::Field { slot } => match instance {
                Value::Object(object) => object.field(*slot).cloned().ok_or_else(|| {
                    EvalError::type_mismatch(format!("field slot {slot} missing on {object}"))
                }),
                other => Err(EvalError::type_mismatch(format!(
                    "fields can only be read off objects, got {other}"
                ))),
            },
            MemberKind::Property(getter) => getter(instance),
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Member {}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.0.name)
            .field("id", &self.0.id)
            .field("ty", &self.0.ty)
            .finish()
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

// ============================================================================
// Methods
// ============================================================================

struct MethodData {
    id: MemberId,
    name: Name,
    returns: Type,
    body: MethodFn,
}

/// An instance method. Never part of a cacheable chain.
#[derive(Clone)]
pub struct Method(Arc<MethodData>);

impl Method {
    pub fn id(&self) -> MemberId {
        self.0.id
    }

    pub fn name(&self) -> Name {
        self.0.name
    }

    pub fn returns(&self) -> &Type {
        &self.0.returns
    }

    pub fn invoke(&self, target: &Value, args: &[Value]) -> Result<Value, EvalError> {
        if target.is_null() {
            return Err(EvalError::null_reference(format!(
                "cannot call `{}` on null",
                self.0.name
            )));
        }
        (self.0.body)(target, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.0.name)
            .field("id", &self.0.id)
            .finish()
    }
}
