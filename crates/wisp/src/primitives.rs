//! The built-in prelude (spec.md §4.8): arithmetic, comparison, list
//! operations, and the `append` helper quasiquote desugaring relies on.
//! Installed into every fresh [`Context`] by [`install_prelude`].

use std::cmp::Ordering::{Equal, Greater, Less};

use crate::context::Context;
use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::location::CodeRange;
use crate::signature::{ParamSpec, ParamType, Signature};
use crate::value::{self, Value};

fn as_number(v: Value) -> f64 {
    match v {
        Value::Number(n) => n,
        _ => unreachable!("Signature::bind already checked this slot is a number"),
    }
}

fn add(_ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    Ok(Value::Number(args.iter().copied().map(as_number).sum()))
}

fn mul(_ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    Ok(Value::Number(args.iter().copied().map(as_number).product()))
}

fn sub(_ctx: &mut Context, args: &[Value], loc: CodeRange) -> Result<Value, RuntimeError> {
    match args {
        [x] => Ok(Value::Number(-as_number(*x))),
        [x, y] => Ok(Value::Number(as_number(*x) - as_number(*y))),
        _ => Err(RuntimeError::arity_mismatch("-", "1 to 2", args.len(), loc)),
    }
}

/// Division by zero yields the IEEE-754 result (±inf or NaN) with no trap,
/// per spec.md §4.8.
fn div(_ctx: &mut Context, args: &[Value], loc: CodeRange) -> Result<Value, RuntimeError> {
    match args {
        [x] => Ok(Value::Number(1.0 / as_number(*x))),
        [x, y] => Ok(Value::Number(as_number(*x) / as_number(*y))),
        _ => Err(RuntimeError::arity_mismatch("/", "1 to 2", args.len(), loc)),
    }
}

fn cmp_primitive(ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    let [a, b] = args else { unreachable!("Signature fixes `cmp` at two arguments") };
    let ordering = value::cmp(*a, *b, &ctx.interns, &ctx.heap);
    Ok(Value::Number(f64::from(ordering as i8)))
}

fn comparison(accept: fn(std::cmp::Ordering) -> bool) -> impl Fn(&mut Context, &[Value], CodeRange) -> Result<Value, RuntimeError> {
    move |ctx, args, _loc| {
        let [a, b] = args else { unreachable!("every comparison primitive is fixed at two arguments") };
        Ok(Value::Bool(accept(value::cmp(*a, *b, &ctx.interns, &ctx.heap))))
    }
}

fn not_primitive(_ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    let [v] = args else { unreachable!("Signature fixes `not` at one argument") };
    Ok(Value::Bool(!v.is_truthy()))
}

fn list_primitive(ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    Ok(Value::List(ctx.heap.alloc_list(args.to_vec())))
}

fn cons_primitive(ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    let [head, tail] = args else { unreachable!("Signature fixes `cons` at two arguments") };
    let Value::List(tail_id) = tail else { unreachable!("Signature types the second slot as a list") };
    let mut items = Vec::with_capacity(ctx.heap.get_list(*tail_id).len() + 1);
    items.push(*head);
    items.extend_from_slice(ctx.heap.get_list(*tail_id));
    Ok(Value::List(ctx.heap.alloc_list(items)))
}

/// Not named in spec.md §4.8's primitive list, but required by its own
/// §4.4 quasiquote desugaring rule ("`unquote-splicing` ... become
/// `list*`/`append` constructions"); added here rather than left
/// unimplemented.
fn append_primitive(ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    let [front, back] = args else { unreachable!("Signature fixes `append` at two arguments") };
    let (Value::List(front_id), Value::List(back_id)) = (front, back) else {
        unreachable!("Signature types both slots as lists")
    };
    let mut items = ctx.heap.get_list(*front_id).to_vec();
    items.extend_from_slice(ctx.heap.get_list(*back_id));
    Ok(Value::List(ctx.heap.alloc_list(items)))
}

fn head_primitive(ctx: &mut Context, args: &[Value], loc: CodeRange) -> Result<Value, RuntimeError> {
    let [list] = args else { unreachable!("Signature fixes `head` at one argument") };
    let Value::List(id) = list else { unreachable!("Signature types the slot as a list") };
    ctx.heap
        .get_list(*id)
        .first()
        .copied()
        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::UserError, "head of an empty list", loc))
}

fn tail_primitive(ctx: &mut Context, args: &[Value], loc: CodeRange) -> Result<Value, RuntimeError> {
    let [list] = args else { unreachable!("Signature fixes `tail` at one argument") };
    let Value::List(id) = list else { unreachable!("Signature types the slot as a list") };
    let items = ctx.heap.get_list(*id);
    if items.is_empty() {
        return Err(RuntimeError::new(RuntimeErrorKind::UserError, "tail of an empty list", loc));
    }
    Ok(Value::List(ctx.heap.alloc_list(items[1..].to_vec())))
}

fn length_primitive(ctx: &mut Context, args: &[Value], _loc: CodeRange) -> Result<Value, RuntimeError> {
    let [list] = args else { unreachable!("Signature fixes `length` at one argument") };
    let Value::List(id) = list else { unreachable!("Signature types the slot as a list") };
    #[allow(clippy::cast_precision_loss)]
    Ok(Value::Number(ctx.heap.get_list(*id).len() as f64))
}

fn cmp_sig(name: &'static str) -> Signature {
    Signature::new(name, vec![ParamSpec::required(ParamType::Any), ParamSpec::required(ParamType::Any)])
}

/// Installs every built-in into `ctx`'s module registry. Called once from
/// [`Context::new`](crate::context::Context::new).
pub fn install_prelude(ctx: &mut Context) {
    ctx.register_native("+", Signature::new_variadic("+", vec![], ParamType::Number), add);
    ctx.register_native("*", Signature::new_variadic("*", vec![], ParamType::Number), mul);
    ctx.register_native(
        "-",
        Signature::new_variadic("-", vec![ParamSpec::required(ParamType::Number)], ParamType::Number),
        sub,
    );
    ctx.register_native(
        "/",
        Signature::new_variadic("/", vec![ParamSpec::required(ParamType::Number)], ParamType::Number),
        div,
    );
    ctx.register_native("cmp", cmp_sig("cmp"), cmp_primitive);
    ctx.register_native("<", cmp_sig("<"), comparison(|o| o == Less));
    ctx.register_native("<=", cmp_sig("<="), comparison(|o| o != Greater));
    ctx.register_native("=", cmp_sig("="), comparison(|o| o == Equal));
    ctx.register_native(">=", cmp_sig(">="), comparison(|o| o != Less));
    ctx.register_native(">", cmp_sig(">"), comparison(|o| o == Greater));
    ctx.register_native("!=", cmp_sig("!="), comparison(|o| o != Equal));
    ctx.register_native("not", Signature::new("not", vec![ParamSpec::required(ParamType::Any)]), not_primitive);
    ctx.register_native("list", Signature::new_variadic("list", vec![], ParamType::Any), list_primitive);
    ctx.register_native("cons", Signature::new("cons", vec![ParamSpec::required(ParamType::Any), ParamSpec::required(ParamType::List)]), cons_primitive);
    ctx.register_native("append", Signature::new("append", vec![ParamSpec::required(ParamType::List), ParamSpec::required(ParamType::List)]), append_primitive);
    ctx.register_native("head", Signature::new("head", vec![ParamSpec::required(ParamType::List)]), head_primitive);
    ctx.register_native("tail", Signature::new("tail", vec![ParamSpec::required(ParamType::List)]), tail_primitive);
    ctx.register_native("length", Signature::new("length", vec![ParamSpec::required(ParamType::List)]), length_primitive);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addition_is_nary_with_identity_zero() {
        let mut ctx = Context::new();
        let result = add(&mut ctx, &[], CodeRange::UNKNOWN).expect("zero args");
        assert_eq!(result, Value::Number(0.0));
        let result = add(&mut ctx, &[Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)], CodeRange::UNKNOWN).expect("three args");
        assert_eq!(result, Value::Number(6.0));
    }

    #[test]
    fn division_by_zero_produces_infinity_not_an_error() {
        let mut ctx = Context::new();
        let result = div(&mut ctx, &[Value::Number(1.0), Value::Number(0.0)], CodeRange::UNKNOWN).expect("no trap");
        assert_eq!(result, Value::Number(f64::INFINITY));
    }

    #[test]
    fn head_of_empty_list_is_a_user_error() {
        let mut ctx = Context::new();
        let empty = Value::List(ctx.heap.alloc_list(vec![]));
        let err = head_primitive(&mut ctx, &[empty], CodeRange::UNKNOWN).expect_err("empty list");
        assert_eq!(err.kind, RuntimeErrorKind::UserError);
    }

    #[test]
    fn cmp_of_extension_list_is_negative() {
        let mut ctx = Context::new();
        let short = Value::List(ctx.heap.alloc_list(vec![Value::Number(1.0), Value::Number(2.0)]));
        let long = Value::List(ctx.heap.alloc_list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]));
        let result = cmp_primitive(&mut ctx, &[short, long], CodeRange::UNKNOWN).expect("comparable");
        assert_eq!(result, Value::Number(-1.0));
    }
}
