//! End-to-end scenarios driven purely through the public `Runtime` embedding
//! surface, one coroutine standing in for a REPL session.

use ftl::{Limits, Runtime, Value};

fn fresh() -> (Runtime, ftl::CoroutineId) {
    let mut rt = Runtime::new(Limits::default());
    let co = rt.spawn_coroutine();
    (rt, co)
}

#[test]
fn arithmetic_over_two_assignments() {
    let (mut rt, co) = fresh();
    let v = rt.eval_line(co, "set a 3; set b 4; a+b").unwrap();
    assert_eq!(v, Value::Int(7));
}

#[test]
fn closure_bind_and_force_invoke() {
    let (mut rt, co) = fresh();
    let v = rt.eval_line(co, "set inc [x]:{x+1}; inc 41!").unwrap();
    assert_eq!(v, Value::Int(42));
}

#[test]
fn id_dir_field_access_and_len() {
    let (mut rt, co) = fresh();
    let v = rt.eval_line(co, "set d [k=1, l=2]; d.k + d.l").unwrap();
    assert_eq!(v, Value::Int(3));
    let v = rt.eval_line(co, "len d!").unwrap();
    assert_eq!(v, Value::Int(2));
}

#[test]
fn vector_indexing_and_ordered_iteration() {
    let (mut rt, co) = fresh();
    let v = rt.eval_line(co, "set v <10,20,30>; v.1").unwrap();
    assert_eq!(v, Value::Int(20));

    let acc = rt.eval_line(co, r#"set acc ""; forall v [k,item]:{ acc = acc+(k+":"+item+",") }; acc"#).unwrap();
    assert_eq!(rt.print_value(acc), "0:10,1:20,2:30,");
}

#[test]
fn catch_invokes_handler_with_thrown_value() {
    let (mut rt, co) = fresh();
    let v = rt.eval_line(co, r#"catch {throw "bad"} [x]:{"caught:"+x}!"#).unwrap();
    assert_eq!(rt.print_value(v), "caught:bad");
}

#[test]
fn root_reachable_value_survives_collect_across_lines() {
    let (mut rt, co) = fresh();
    rt.eval_line(co, r#"set s "hello""#).unwrap();
    rt.eval_line(co, "collect").unwrap();
    let v = rt.eval_line(co, "s").unwrap();
    assert_eq!(rt.print_value(v), "hello");
}

#[test]
fn uncaught_throw_reports_as_an_error() {
    let (mut rt, co) = fresh();
    let err = rt.eval_line(co, r#"throw "boom""#).unwrap_err();
    assert!(err.to_string().contains("boom"));
}
