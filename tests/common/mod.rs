#![allow(dead_code)]

use modelpath_core::{EvalError, Expr, Lambda, Object, ObjectBuilder, Type, Value};
use once_cell::sync::Lazy;

// ============================================================================
// View models shared by the integration tests
// ============================================================================

pub struct Models {
    /// struct DateTime { Year: int, Ticks: int }
    pub date: Type,
    /// DateTime?
    pub nullable_date: Type,
    /// class TestModel2 { Name: string, Age: int, Date: DateTime }
    pub model2: Type,
    /// class Odd { Label: string } whose `==` always fails
    pub odd: Type,
    /// class TestModel, see `MODELS`
    pub model: Type,
    /// class Statics { static Greeting: string }
    pub statics: Type,
}

static MODELS: Lazy<Models> = Lazy::new(|| {
    let date = Type::struct_type("DateTime")
        .define()
        .field("Year", &Type::int())
        .field("Ticks", &Type::int())
        .finish()
        .unwrap();
    let nullable_date = Type::nullable(&date).unwrap();
    let model2 = Type::class("TestModel2")
        .define()
        .field("Name", &Type::string())
        .field("Age", &Type::int())
        .field("Date", &date)
        .finish()
        .unwrap();
    let odd = Type::class("Odd")
        .define()
        .field("Label", &Type::string())
        .equality(|_, _| Err(EvalError::user("Odd cannot be compared")))
        .finish()
        .unwrap();
    let model = Type::class("TestModel");
    model
        .define()
        .field("Name", &Type::string())
        .field("Age", &Type::int())
        .field("Date", &date)
        .field("NullableDate", &nullable_date)
        .field("TestModel2", &model2)
        .field("DifferentModels", &Type::array(&model2))
        .field("Parent", &model)
        .field("Odd", &odd)
        .property("Broken", &Type::string(), |_| {
            Err(EvalError::user("Broken getter failed"))
        })
        .property("Unknown", &Type::int(), |_| Ok(Value::Null))
        .method("Describe", &Type::string(), |_, _| Ok(Value::from("a test model")))
        .finish()
        .unwrap();
    let statics = Type::class("Statics")
        .define()
        .static_member("Greeting", &Type::string(), || Ok(Value::from("hello")))
        .finish()
        .unwrap();
    Models {
        date,
        nullable_date,
        model2,
        odd,
        model,
        statics,
    }
});

pub fn models() -> &'static Models {
    &MODELS
}

/// `m => body(m)` over `TestModel`.
pub fn lambda<F>(body: F) -> Lambda
where
    F: FnOnce(Expr) -> Result<Expr, EvalError>,
{
    Lambda::build("m", &models().model, body).unwrap()
}

pub fn date(year: i64, ticks: i64) -> Value {
    Object::build(&models().date)
        .with("Year", year)
        .with("Ticks", ticks)
        .finish()
        .unwrap()
}

pub fn model2(name: &str, age: i64) -> Value {
    Object::build(&models().model2)
        .with("Name", name)
        .with("Age", age)
        .with("Date", date(2000 + age, age * 1000))
        .finish()
        .unwrap()
}

pub fn odd(label: &str) -> Value {
    Object::build(&models().odd)
        .with("Label", label)
        .finish()
        .unwrap()
}

/// A `TestModel` with every reference and nullable member left null.
pub fn empty_model() -> Value {
    Object::build(&models().model).finish().unwrap()
}

pub fn model() -> ObjectBuilder {
    Object::build(&models().model)
}
