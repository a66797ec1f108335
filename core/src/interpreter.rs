//! Tree-walking evaluator for arbitrary lambdas.
//!
//! This is the slow path callers fall back to when an expression is not a
//! cacheable member chain. It does not propagate nulls: reading a member off
//! null is an error, exactly as running the lambda would be.

use crate::error::EvalError;
use crate::expr::{BinaryOp, Expr, Lambda, Parameter};
use crate::types::Type;
use crate::value::Value;

// ============================================================================
// Evaluator
// ============================================================================

pub fn eval(lambda: &Lambda, model: &Value) -> Result<Value, EvalError> {
    let parameter = lambda.parameter();
    if !parameter.ty().accepts(model) {
        return Err(EvalError::type_mismatch(format!(
            "lambda expects {}, got {}",
            parameter.ty(),
            model.type_name()
        ))
        .with_expression(lambda));
    }
    eval_expr(lambda.body(), parameter, model)
}

/// Evaluate an expression outside any lambda, such as an index built from
/// captured variables. A parameter reference is an `Unsupported` error.
pub fn eval_detached(expr: &Expr) -> Result<Value, EvalError> {
    let unbound = Parameter::new("<detached>", &Type::object());
    eval_expr(expr, &unbound, &Value::Null).map_err(|e| match e.expression {
        Some(_) => e,
        None => e.with_expression(expr),
    })
}

fn eval_expr(expr: &Expr, parameter: &Parameter, model: &Value) -> Result<Value, EvalError> {
    match expr {
        Expr::Parameter(p) if p.is(parameter) => Ok(model.clone()),
        Expr::Parameter(p) => Err(EvalError::unsupported(format!(
            "parameter `{}` is not bound",
            p.name()
        ))),

        Expr::Constant { value, .. } => Ok(value.clone()),

        Expr::Member {
            target: None,
            member,
        } => member.read(&Value::Null),
        Expr::Member {
            target: Some(target),
            member,
        } => {
            let instance = eval_expr(target, parameter, model)?;
            member.read(&instance)
        }

        Expr::Index { target, index } => {
            let array = eval_expr(target, parameter, model)?;
            let index = eval_expr(index, parameter, model)?;
            match (array, index) {
                (Value::Null, _) => {
                    Err(EvalError::null_reference("cannot index null").with_expression(target))
                }
                (Value::Array(array), Value::Int(i)) => array.get(i).cloned(),
                (array, index) => Err(EvalError::type_mismatch(format!(
                    "cannot index {} with {}",
                    array.type_name(),
                    index.type_name()
                ))),
            }
        }

        Expr::Call {
            target,
            method,
            args,
        } => {
            let target = eval_expr(target, parameter, model)?;
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, parameter, model))
                .collect::<Result<Vec<_>, _>>()?;
            method.invoke(&target, &args)
        }

        Expr::Binary { op, left, right } => {
            let lhs = eval_expr(left, parameter, model)?;
            let rhs = eval_expr(right, parameter, model)?;
            match op {
                BinaryOp::Equal => equals(left, &lhs, &rhs).map(Value::Bool),
                BinaryOp::NotEqual => equals(left, &lhs, &rhs).map(|eq| Value::Bool(!eq)),
                BinaryOp::Add => add(lhs, rhs),
            }
        }
    }
}

/// `==` dispatches on the static type of the left operand, so a user
/// operator runs even when one side is null.
fn equals(left: &Expr, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    match left.ty().equality() {
        Some(op) => op(lhs, rhs),
        None => Ok(lhs == rhs),
    }
}

fn add(lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a
            .checked_add(b)
            .map(Value::Int)
            .ok_or_else(|| EvalError::type_mismatch("integer overflow")),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::from(format!("{a}{b}"))),
        (lhs, rhs) => Err(EvalError::type_mismatch(format!(
            "cannot add {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::value::Object;

    struct Fixture {
        person: Type,
        ann: Value,
    }

    fn fixture() -> Fixture {
        let person = Type::class("Person");
        person
            .define()
            .field("Name", &Type::string())
            .field("Age", &Type::int())
            .field("Parent", &person)
            .field("Friends", &Type::array(&person))
            .method("Greet", &Type::string(), |me, args| {
                let name = me.as_object().and_then(|o| o.get("Name")).cloned();
                match (name, args.first()) {
                    (Some(Value::Str(name)), Some(Value::Str(other))) => {
                        Ok(Value::from(format!("{name} greets {other}")))
                    }
                    _ => Err(EvalError::user("bad greeting")),
                }
            })
            .equality(|a, b| match (a, b) {
                (Value::Null, _) | (_, Value::Null) => {
                    Err(EvalError::user("comparison with null"))
                }
                (a, b) => Ok(a == b),
            })
            .finish()
            .unwrap();
        let bob = Object::build(&person)
            .with("Name", "Bob")
            .with("Age", 70)
            .finish()
            .unwrap();
        let friends = Value::array(&person, vec![bob.clone()]).unwrap();
        let ann = Object::build(&person)
            .with("Name", "Ann")
            .with("Age", 41)
            .with("Parent", bob)
            .with("Friends", friends)
            .finish()
            .unwrap();
        Fixture { person, ann }
    }

    #[test]
    fn test_member_chain() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| p.member("Parent")?.member("Name")).unwrap();
        assert_eq!(eval(&lambda, &fx.ann).unwrap(), Value::from("Bob"));
    }

    #[test]
    fn test_member_of_null_is_an_error() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            p.member("Parent")?.member("Parent")?.member("Name")
        })
        .unwrap();
        let err = eval(&lambda, &fx.ann).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NullReference);
    }

    #[test]
    fn test_index() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            p.member("Friends")?.index(Expr::constant(0))?.member("Age")
        })
        .unwrap();
        assert_eq!(eval(&lambda, &fx.ann).unwrap(), Value::Int(70));
    }

    #[test]
    fn test_index_out_of_range() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            p.member("Friends")?.index(Expr::constant(5))
        })
        .unwrap();
        assert_eq!(
            eval(&lambda, &fx.ann).unwrap_err().kind,
            ErrorKind::IndexOutOfRange
        );
    }

    #[test]
    fn test_call() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            p.call("Greet", vec![Expr::constant("Cy")])
        })
        .unwrap();
        assert_eq!(eval(&lambda, &fx.ann).unwrap(), Value::from("Ann greets Cy"));
    }

    #[test]
    fn test_user_equality_operator_runs() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            Ok(Expr::binary(
                BinaryOp::Equal,
                p.member("Parent")?.member("Parent")?,
                Expr::typed_constant(Value::Null, &fx.person)?,
            ))
        })
        .unwrap();
        let err = eval(&lambda, &fx.ann).unwrap_err();
        assert_eq!(err.kind, ErrorKind::User);
    }

    #[test]
    fn test_add() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| {
            Ok(Expr::binary(BinaryOp::Add, p.member("Age")?, Expr::constant(1)))
        })
        .unwrap();
        assert_eq!(eval(&lambda, &fx.ann).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_root_type_is_checked() {
        let fx = fixture();
        let lambda = Lambda::build("p", &fx.person, |p| p.member("Age")).unwrap();
        let err = eval(&lambda, &Value::Int(3)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_detached_evaluation() {
        let index = Expr::binary(
            BinaryOp::Add,
            Expr::captured("i", &Type::int(), 4).unwrap(),
            Expr::constant(1),
        );
        assert_eq!(eval_detached(&index).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_detached_evaluation_rejects_parameters() {
        let fx = fixture();
        let parameter = Parameter::new("p", &fx.person);
        let age = Expr::param(&parameter).member("Age").unwrap();
        let err = eval_detached(&age).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unsupported);
        assert_eq!(err.expression.as_deref(), Some("p.Age"));
    }
}
