//! Expression trees over the host model.
//!
//! An [`Expr`] is an immutable tree; a [`Lambda`] binds one [`Parameter`]
//! (the model) to a body. Builders resolve member and method names against
//! the static type of the receiver.

use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::interner::Name;
use crate::types::{Member, Method, Type, TypeKind};
use crate::value::{Object, Value};

// ============================================================================
// Parameters
// ============================================================================

struct ParameterData {
    name: Name,
    ty: Type,
}

/// A lambda parameter. Identity matters: two parameters with the same name
/// and type are still different parameters.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterData>);

impl Parameter {
    pub fn new(name: &str, ty: &Type) -> Self {
        Parameter(Arc::new(ParameterData {
            name: Name::new(name),
            ty: ty.clone(),
        }))
    }

    pub fn name(&self) -> Name {
        self.0.name
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// Same parameter (not merely same name and type)
    pub fn is(&self, other: &Parameter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parameter({}: {})", self.0.name, self.0.ty)
    }
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Equal,
    NotEqual,
    Add,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Add => "+",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Parameter(Parameter),
    Constant {
        value: Value,
        ty: Type,
    },
    /// Field or property read; `target` is `None` for static members
    Member {
        target: Option<Box<Expr>>,
        member: Member,
    },
    /// Array element
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        target: Box<Expr>,
        method: Method,
        args: Vec<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    pub fn param(parameter: &Parameter) -> Expr {
        Expr::Parameter(parameter.clone())
    }

    /// A constant typed by its runtime value (`object` for null).
    pub fn constant(value: impl Into<Value>) -> Expr {
        let value = value.into();
        let ty = value.type_of().unwrap_or_else(Type::object);
        Expr::Constant { value, ty }
    }

    pub fn typed_constant(value: impl Into<Value>, ty: &Type) -> Result<Expr, EvalError> {
        let value = value.into();
        if !ty.accepts(&value) {
            return Err(EvalError::type_mismatch(format!(
                "{} is not a {ty}",
                value.type_name()
            )));
        }
        Ok(Expr::Constant {
            value,
            ty: ty.clone(),
        })
    }

    /// A captured local variable: a field read off a constant closure object,
    /// the way a compiler lowers `m => local`.
    pub fn captured(name: &str, ty: &Type, value: impl Into<Value>) -> Result<Expr, EvalError> {
        let closure_type = Type::class("<>c__DisplayClass")
            .define()
            .field(name, ty)
            .finish()?;
        let closure = Object::build(&closure_type).with(name, value).finish()?;
        Expr::constant(closure).member(name)
    }

    pub fn static_member(ty: &Type, name: &str) -> Result<Expr, EvalError> {
        let member = ty
            .member(name)
            .ok_or_else(|| EvalError::missing_member(ty, name))?;
        if !member.is_static() {
            return Err(EvalError::unsupported(format!(
                "`{ty}.{name}` is an instance member"
            )));
        }
        Ok(Expr::Member {
            target: None,
            member: member.clone(),
        })
    }

    /// Instance member read on this expression.
    pub fn member(self, name: &str) -> Result<Expr, EvalError> {
        let ty = self.ty();
        let member = ty
            .member(name)
            .ok_or_else(|| EvalError::missing_member(&ty, name).with_expression(&self))?;
        if member.is_static() {
            return Err(EvalError::unsupported(format!(
                "static member `{ty}.{name}` accessed through an instance"
            ))
            .with_expression(&self));
        }
        Ok(Expr::Member {
            target: Some(Box::new(self)),
            member: member.clone(),
        })
    }

    /// Array element read on this expression.
    pub fn index(self, index: Expr) -> Result<Expr, EvalError> {
        if self.ty().element_type().is_none() {
            return Err(EvalError::unsupported(format!(
                "`{}` cannot be indexed",
                self.ty()
            ))
            .with_expression(&self));
        }
        if index.ty() != Type::int() {
            return Err(EvalError::type_mismatch(format!(
                "array index must be an int, got {}",
                index.ty()
            ))
            .with_expression(&index));
        }
        Ok(Expr::Index {
            target: Box::new(self),
            index: Box::new(index),
        })
    }

    pub fn call(self, name: &str, args: Vec<Expr>) -> Result<Expr, EvalError> {
        let ty = self.ty();
        let method = ty
            .method(name)
            .ok_or_else(|| EvalError::missing_member(&ty, name).with_expression(&self))?;
        Ok(Expr::Call {
            target: Box::new(self),
            method: method.clone(),
            args,
        })
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Static type of the expression.
    pub fn ty(&self) -> Type {
        match self {
            Expr::Parameter(p) => p.ty().clone(),
            Expr::Constant { ty, .. } => ty.clone(),
            Expr::Member { member, .. } => member.ty().clone(),
            Expr::Index { target, .. } => match target.ty().kind() {
                TypeKind::Array(element) => element.clone(),
                _ => Type::object(),
            },
            Expr::Call { method, .. } => method.returns().clone(),
            Expr::Binary { op, left, .. } => match op {
                BinaryOp::Equal | BinaryOp::NotEqual => Type::bool(),
                BinaryOp::Add => left.ty(),
            },
        }
    }

    /// Whether any node of the tree is a parameter reference.
    pub fn has_parameters(&self) -> bool {
        let mut found = false;
        self.for_each_parameter(&mut |_| found = true);
        found
    }

    /// Visit every parameter node in the tree.
    fn for_each_parameter<'e>(&'e self, f: &mut impl FnMut(&'e Parameter)) {
        match self {
            Expr::Parameter(p) => f(p),
            Expr::Constant { .. } => {}
            Expr::Member { target, .. } => {
                if let Some(target) = target {
                    target.for_each_parameter(f);
                }
            }
            Expr::Index { target, index } => {
                target.for_each_parameter(f);
                index.for_each_parameter(f);
            }
            Expr::Call { target, args, .. } => {
                target.for_each_parameter(f);
                for arg in args {
                    arg.for_each_parameter(f);
                }
            }
            Expr::Binary { left, right, .. } => {
                left.for_each_parameter(f);
                right.for_each_parameter(f);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(p) => write!(f, "{}", p.name()),
            Expr::Constant { value, .. } => match value {
                Value::Object(object) => write!(f, "value({})", object.ty()),
                other => write!(f, "{other}"),
            },
            Expr::Member {
                target: None,
                member,
            } => write!(f, "{member}"),
            Expr::Member {
                target: Some(target),
                member,
            } => write!(f, "{target}.{member}"),
            Expr::Index { target, index } => write!(f, "{target}[{index}]"),
            Expr::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{target}.{}(", method.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Binary { op, left, right } => write!(f, "({left} {op} {right})"),
        }
    }
}

// ============================================================================
// Lambda
// ============================================================================

/// `parameter => body`, the shape `Func<TModel, TResult>` expressions take.
#[derive(Debug, Clone)]
pub struct Lambda {
    parameter: Parameter,
    body: Expr,
}

impl Lambda {
    /// Fails if the body refers to a parameter other than `parameter`.
    pub fn new(parameter: Parameter, body: Expr) -> Result<Lambda, EvalError> {
        let mut foreign = None;
        body.for_each_parameter(&mut |p| {
            if foreign.is_none() && !p.is(&parameter) {
                foreign = Some(p.name());
            }
        });
        if let Some(name) = foreign {
            return Err(EvalError::unsupported(format!(
                "parameter `{name}` is not bound by this lambda"
            ))
            .with_expression(&body));
        }
        Ok(Lambda { parameter, body })
    }

    /// Build `name => body(name)` over a fresh parameter of type `ty`.
    ///
    /// ```ignore
    /// let year = Lambda::build("m", &model, |m| m.member("Date")?.member("Year"))?;
    /// ```
    pub fn build<F>(name: &str, ty: &Type, body: F) -> Result<Lambda, EvalError>
    where
        F: FnOnce(Expr) -> Result<Expr, EvalError>,
    {
        let parameter = Parameter::new(name, ty);
        let body = body(Expr::param(&parameter))?;
        Lambda::new(parameter, body)
    }

    pub fn parameter(&self) -> &Parameter {
        &self.parameter
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn result_type(&self) -> Type {
        self.body.ty()
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.parameter.name(), self.body)
    }
}
