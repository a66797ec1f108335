mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use modelpath::{CompiledAccessor, ExpressionCompiler, ExpressionTextCache};
use modelpath_core::{Lambda, Value};

#[test]
fn test_types_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ExpressionCompiler>();
    assert_send_sync::<ExpressionTextCache>();
    assert_send_sync::<CompiledAccessor>();
    assert_send_sync::<Lambda>();
    assert_send_sync::<Value>();
}

#[test]
fn test_racing_compiles_publish_one_accessor() {
    let compiler = Arc::new(ExpressionCompiler::new());

    let mut handles = vec![];

    // Each thread builds its own expression tree for the same chain
    for _ in 0..8 {
        let compiler = Arc::clone(&compiler);
        let handle = thread::spawn(move || {
            let lambda = lambda(|m| m.member("TestModel2")?.member("Date")?.member("Year"));
            compiler.process(&lambda).unwrap()
        });
        handles.push(handle);
    }

    let accessors: Vec<CompiledAccessor> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    for accessor in &accessors[1..] {
        assert!(accessor.ptr_eq(&accessors[0]));
    }
    assert_eq!(compiler.len(), 1);
    let stats = compiler.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 7);
}

#[test]
fn test_accessor_can_be_invoked_across_threads() {
    let accessor = modelpath::process(&lambda(|m| m.member("TestModel2")?.member("Age"))).unwrap();

    let mut handles = vec![];

    for age in 0..6i64 {
        let accessor = accessor.clone();
        let handle = thread::spawn(move || {
            let model = if age % 2 == 0 {
                model().with("TestModel2", model2("T", age)).finish().unwrap()
            } else {
                empty_model()
            };
            (age, accessor.invoke(&model).unwrap())
        });
        handles.push(handle);
    }

    for handle in handles {
        let (age, result) = handle.join().unwrap();
        if age % 2 == 0 {
            assert_eq!(result, Some(Value::Int(age)));
        } else {
            assert_eq!(result, None);
        }
    }
}

#[test]
fn test_text_cache_shared_across_threads() {
    let cache = Arc::new(ExpressionTextCache::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let lambda = lambda(|m| m.member("Parent")?.member("TestModel2")?.member("Name"));
                cache.text(&lambda).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(&*handle.join().unwrap(), "Parent.TestModel2.Name");
    }
    assert_eq!(cache.len(), 1);
}
