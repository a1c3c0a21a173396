//! The stack-based bytecode interpreter (spec.md §5): three flat growable
//! stacks — operand, call, environment — shared across every frame, no
//! per-frame heap allocation beyond what `CLS`/a list primitive needs
//! anyway.
//!
//! `IMP` and `LDS` dispatch identically: [`crate::namespace::Namespace`]
//! resolves every module symbol by name at the moment of use (late-bound,
//! see DESIGN.md), so there is nothing left for a separate link step to do
//! ahead of time. A nested function is "linked" the first time one of its
//! `IMP`s actually executes, for free.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::bytecode::op::{Instruction, Opcode};
use crate::context::Context;
use crate::error::{RuntimeError, RuntimeErrorKind, TraceFrame, WispError};
use crate::function::{Callee, FunctionBlock};
use crate::heap::Heap;
use crate::intern::StringId;
use crate::location::CodeRange;
use crate::tracer::{HookAction, NoHook, VmHook, VmView};
use crate::value::Value;

/// Capacities reserved for the VM's three stacks (spec.md §3's "VM memory",
/// split into operand/call/environment sub-arrays — three growable `Vec`s
/// here rather than one contiguous block with manual offsets). Doubles as
/// the thresholds a `StackOverflow` is raised against.
#[derive(Debug, Clone, Copy)]
pub struct VmConfig {
    pub operand_cap: usize,
    pub call_cap: usize,
    pub env_cap: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self { operand_cap: 4096, call_cap: 1024, env_cap: 16384 }
    }
}

/// Outcome of a completed [`Vm::exec`] (spec.md §6: `exec_script(...) ->
/// status in {OK, ERROR, ABORTED}`). `Vm::exec` itself returns a `Result`
/// (idiomatic Rust, and it carries the actual [`WispError`] on failure);
/// `Status::of` recovers the spec's tri-state summary from that `Result`
/// for callers that want the coarser classification, e.g. to distinguish a
/// hook-requested abort from every other failure without matching on
/// `RuntimeErrorKind` themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
    Aborted,
}

impl Status {
    #[must_use]
    pub fn of(result: &Result<Value, WispError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) if err.runtime_kind == Some(RuntimeErrorKind::Aborted) => Status::Aborted,
            Err(_) => Status::Error,
        }
    }
}

struct Frame {
    function: Rc<FunctionBlock>,
    pc: usize,
    env_base: usize,
    operand_base: usize,
}

enum Flow {
    Continue,
    Returned(Value),
}

/// A single-owner bytecode interpreter (spec.md §5: not `Send`/`Sync`; one
/// `Context` can drive any number of `Vm`s, never concurrently). Generic
/// over the hook so a build that never installs one (`Vm<NoHook>`, the
/// default via [`Vm::new`]) monomorphizes the dispatch loop down to exactly
/// what a hookless VM would have written by hand.
pub struct Vm<H: VmHook = NoHook> {
    operand: Vec<Value>,
    call: Vec<Frame>,
    env: Vec<Value>,
    config: VmConfig,
    hook: H,
}

impl Vm<NoHook> {
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        Self { operand: vec![], call: vec![], env: vec![], config, hook: NoHook }
    }
}

impl<H: VmHook> Vm<H> {
    #[must_use]
    pub fn with_hook(config: VmConfig, hook: H) -> Self {
        Self { operand: vec![], call: vec![], env: vec![], config, hook }
    }

    pub fn set_hook(&mut self, hook: H) {
        self.hook = hook;
    }

    #[must_use]
    pub fn operand_depth(&self) -> usize {
        self.operand.len()
    }

    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.call.len()
    }

    /// Runs `script` (as returned by [`Context::load_script`]) to
    /// completion on fresh stacks.
    pub fn exec(&mut self, ctx: &mut Context, script: &Rc<FunctionBlock>) -> Result<Value, WispError> {
        self.operand.clear();
        self.call.clear();
        self.env.clear();
        if let Err(err) = self.push_new_frame(Rc::clone(script), vec![], &[], CodeRange::UNKNOWN) {
            return Err(self.fail(ctx, err));
        }
        match self.run(ctx) {
            Ok(value) => Ok(value),
            Err(err) => Err(self.fail(ctx, err)),
        }
    }

    fn fail(&self, ctx: &mut Context, err: RuntimeError) -> WispError {
        let traceback = self.capture_traceback(ctx);
        let wisp_err = WispError::from_runtime(err, traceback);
        ctx.last_error = Some(wisp_err.clone());
        wisp_err
    }

    fn capture_traceback(&self, ctx: &Context) -> Vec<TraceFrame> {
        self.call
            .iter()
            .rev()
            .map(|frame| TraceFrame {
                filename: ctx.interns.get(frame.function.source_name).to_owned(),
                location: frame.function.locations.get(frame.pc).copied().unwrap_or(CodeRange::UNKNOWN),
                function_name: ctx.interns.get(frame.function.debug_name).to_owned(),
                is_native: false,
            })
            .collect()
    }

    fn run(&mut self, ctx: &mut Context) -> Result<Value, RuntimeError> {
        loop {
            let frame_idx = self.call.len() - 1;
            let function = Rc::clone(&self.call[frame_idx].function);
            let pc = self.call[frame_idx].pc;
            let instr = Instruction::unpack(function.instructions[pc]);
            let loc = function.locations[pc];
            self.call[frame_idx].pc = pc + 1;

            let view = VmView {
                ip: pc,
                opcode: instr.op,
                operand_depth: self.operand.len(),
                call_depth: self.call.len(),
                function_name: ctx.interns.get(function.debug_name),
            };
            if self.hook.step(&view) == HookAction::Abort {
                return Err(RuntimeError::new(RuntimeErrorKind::Aborted, "execution aborted by hook", loc));
            }

            match self.dispatch(ctx, &function, instr, loc)? {
                Flow::Returned(value) => return Ok(value),
                Flow::Continue => {}
            }
        }
    }

    fn dispatch(&mut self, ctx: &mut Context, function: &Rc<FunctionBlock>, instr: Instruction, loc: CodeRange) -> Result<Flow, RuntimeError> {
        let frame_idx = self.call.len() - 1;
        match instr.op {
            Opcode::Nop => Ok(Flow::Continue),
            Opcode::Pop => {
                let n = instr.operand as usize;
                let new_len = self.operand.len() - n;
                self.operand.truncate(new_len);
                Ok(Flow::Continue)
            }
            Opcode::Ldc => {
                let value = function.constants[instr.operand as usize];
                self.push_operand(value, loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Ldl => {
                let env_base = self.call[frame_idx].env_base;
                let value = self.env[env_base + instr.operand as usize];
                if let Value::Placeholder(name_id) = value {
                    let name = ctx.interns.get(StringId::from_u32(name_id)).to_owned();
                    return Err(RuntimeError::unbound_symbol(&name, loc));
                }
                self.push_operand(value, loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Lds | Opcode::Imp => {
                let name = function.imports[instr.operand as usize];
                let value = ctx.namespace.get(name).ok_or_else(|| RuntimeError::unbound_symbol(ctx.interns.get(name), loc))?;
                self.push_operand(value, loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Ldi => {
                self.push_operand(Value::Number(f64::from(instr.operand)), loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Ldb => {
                self.push_operand(Value::Bool(instr.operand != 0), loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Nil => {
                self.push_operand(Value::Nil, loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Set => {
                let value = self.operand.pop().expect("SET always follows a value-producing expression");
                let env_base = self.call[frame_idx].env_base;
                self.env[env_base + instr.operand as usize] = value;
                Ok(Flow::Continue)
            }
            Opcode::Jmp => {
                self.jump(frame_idx, instr.operand);
                Ok(Flow::Continue)
            }
            Opcode::Jof => {
                let cond = self.operand.pop().expect("JOF always follows a condition");
                if !cond.is_truthy() {
                    self.jump(frame_idx, instr.operand);
                }
                Ok(Flow::Continue)
            }
            Opcode::Call => self.perform_call(ctx, instr.operand as usize, loc, false),
            Opcode::Tail => self.perform_call(ctx, instr.operand as usize, loc, true),
            Opcode::Ret => {
                let result = self.operand.pop().expect("RET always follows a value-producing expression");
                self.finish_frame(result)
            }
            Opcode::Cls => {
                let child = Rc::clone(&function.nested[instr.operand as usize]);
                let n = child.capture_slots.len();
                let base = self.operand.len() - n;
                let captured: SmallVec<[Value; 4]> = self.operand[base..].iter().copied().collect();
                self.operand.truncate(base);
                let closure = crate::function::Closure::new_bytecode(child, captured);
                let heap_id = ctx.heap.alloc_closure(closure);
                self.push_operand(Value::Function(heap_id), loc)?;
                Ok(Flow::Continue)
            }
            Opcode::Def => {
                let name = function.imports[instr.operand as usize];
                let value = self.operand.pop().expect("DEF always follows a value-producing expression");
                ctx.namespace.define(name, value);
                Ok(Flow::Continue)
            }
            Opcode::Plhr => unreachable!("PLHR is compile-time only; the compiler never emits it into committed bytecode"),
        }
    }

    fn jump(&mut self, frame_idx: usize, delta: i32) {
        let cur = self.call[frame_idx].pc as i64;
        self.call[frame_idx].pc = (cur + i64::from(delta)) as usize;
    }

    fn push_operand(&mut self, value: Value, loc: CodeRange) -> Result<(), RuntimeError> {
        if self.operand.len() >= self.config.operand_cap {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow, "operand stack overflow", loc));
        }
        self.operand.push(value);
        Ok(())
    }

    /// Pops a frame and restores its caller's stacks, returning `Flow::Returned`
    /// if that was the outermost frame. Shared by `RET` and by a tail call
    /// whose callee turned out to be native (a native has no frame of its
    /// own, so it "returns" by finishing whatever bytecode frame tail-called
    /// it).
    fn finish_frame(&mut self, result: Value) -> Result<Flow, RuntimeError> {
        let frame = self.call.pop().expect("a frame is always open while executing");
        self.env.truncate(frame.env_base);
        self.operand.truncate(frame.operand_base);
        if self.call.is_empty() {
            return Ok(Flow::Returned(result));
        }
        self.push_operand(result, CodeRange::UNKNOWN)?;
        Ok(Flow::Continue)
    }

    fn perform_call(&mut self, ctx: &mut Context, argc: usize, loc: CodeRange, is_tail: bool) -> Result<Flow, RuntimeError> {
        let args_start = self.operand.len() - argc;
        let args: Vec<Value> = self.operand[args_start..].to_vec();
        let callee_idx = args_start - 1;
        let callee = self.operand[callee_idx];
        self.operand.truncate(callee_idx);

        let Value::Function(heap_id) = callee else {
            return Err(RuntimeError::new(RuntimeErrorKind::BadType, format!("cannot call a {}", callee.type_name()), loc));
        };
        let closure = ctx.heap.get_closure(heap_id).clone();
        if !closure.arity.accepts(argc) {
            return Err(RuntimeError::arity_mismatch("<closure>", &closure.arity.describe(), argc, loc));
        }

        match &closure.callee {
            Callee::Native(id) => {
                let result = ctx.call_native(*id, &args, loc)?;
                if is_tail {
                    self.finish_frame(result)
                } else {
                    self.push_operand(result, loc)?;
                    Ok(Flow::Continue)
                }
            }
            Callee::Bytecode(function) => {
                let bound_args = bind_call_args(closure.arity, args, &mut ctx.heap);
                if is_tail {
                    self.replace_current_frame(Rc::clone(function), bound_args, &closure.captured, loc)?;
                } else {
                    self.push_new_frame(Rc::clone(function), bound_args, &closure.captured, loc)?;
                }
                Ok(Flow::Continue)
            }
        }
    }

    fn push_new_frame(&mut self, function: Rc<FunctionBlock>, args: Vec<Value>, captured: &[Value], loc: CodeRange) -> Result<(), RuntimeError> {
        if self.call.len() >= self.config.call_cap {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow, "call stack overflow", loc));
        }
        let env_base = self.env.len();
        if env_base + function.env_size as usize > self.config.env_cap {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow, "environment stack overflow", loc));
        }
        let operand_base = self.operand.len();
        self.env.extend(build_env(&function, &args, captured));
        self.call.push(Frame { function, pc: 0, env_base, operand_base });
        Ok(())
    }

    /// Reuses the current frame in place instead of pushing a new one — the
    /// call stack never grows, satisfying spec.md §8 property 5's tail-call
    /// non-growth guarantee.
    fn replace_current_frame(&mut self, function: Rc<FunctionBlock>, args: Vec<Value>, captured: &[Value], loc: CodeRange) -> Result<(), RuntimeError> {
        let frame_idx = self.call.len() - 1;
        let env_base = self.call[frame_idx].env_base;
        let operand_base = self.call[frame_idx].operand_base;
        if env_base + function.env_size as usize > self.config.env_cap {
            return Err(RuntimeError::new(RuntimeErrorKind::StackOverflow, "environment stack overflow", loc));
        }
        self.env.truncate(env_base);
        self.env.extend(build_env(&function, &args, captured));
        self.operand.truncate(operand_base);
        self.call[frame_idx] = Frame { function, pc: 0, env_base, operand_base };
        Ok(())
    }
}

/// Fixed arity passes arguments through untouched; variadic arity collects
/// every argument into one heap list bound to the sole declared parameter.
fn bind_call_args(arity: crate::function::Arity, args: Vec<Value>, heap: &mut Heap) -> Vec<Value> {
    match arity {
        crate::function::Arity::Fixed(_) => args,
        crate::function::Arity::Variadic { .. } => vec![Value::List(heap.alloc_list(args))],
    }
}

/// Builds a fresh frame's environment array: every `letrec`-declared slot
/// pre-filled with `Value::Placeholder`, then parameters, then captures,
/// with every remaining slot left at `Value::Nil` (a `let` always
/// overwrites its slot immediately after allocating it, so no window exists
/// where one could be observed uninitialized).
fn build_env(function: &FunctionBlock, args: &[Value], captured: &[Value]) -> Vec<Value> {
    let mut slots = vec![Value::Nil; function.env_size as usize];
    for &(slot, name) in &function.letrec_slots {
        slots[slot as usize] = Value::Placeholder(name.as_u32());
    }
    let argc = args.len().min(slots.len());
    slots[..argc].copy_from_slice(&args[..argc]);
    for (i, &slot) in function.capture_slots.iter().enumerate() {
        slots[slot as usize] = captured[i];
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    fn run(source: &str) -> Value {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", source).expect("compiles");
        let mut vm = Vm::new(VmConfig::default());
        vm.exec(&mut ctx, &script).expect("runs")
    }

    #[test]
    fn arithmetic_and_calls_evaluate() {
        assert_eq!(run("(+ 1 2 3)"), Value::Number(6.0));
        assert_eq!(run("(* (+ 1 1) (- 5 2))"), Value::Number(6.0));
    }

    #[test]
    fn if_selects_the_right_branch() {
        assert_eq!(run("(if (< 1 2) 10 20)"), Value::Number(10.0));
        assert_eq!(run("(if #f 10 20)"), Value::Number(20.0));
    }

    #[test]
    fn let_and_lambda_closures_capture_correctly() {
        assert_eq!(run("(let ((x 10)) ((lambda (y) (+ x y)) 5))"), Value::Number(15.0));
    }

    #[test]
    fn define_supports_recursive_functions() {
        // Unlike `letrec`, a module-level `define` resolves through the
        // namespace at call time (late-bound, see `namespace.rs`), so a
        // lambda can reference its own name before the binding that
        // contains it has itself finished evaluating.
        let result = run("(do (define fact (lambda (n) (if (= n 0) 1 (* n (fact (- n 1)))))) (fact 5))");
        assert_eq!(result, Value::Number(120.0));
    }

    #[test]
    fn define_binds_into_the_module_registry_for_later_forms() {
        assert_eq!(run("(do (define square (lambda (x) (* x x))) (square 7))"), Value::Number(49.0));
    }

    #[test]
    fn redefining_a_module_binding_is_visible_to_old_closures() {
        let result = run(
            "(do
               (define x 1)
               (define get (lambda () x))
               (define x 2)
               (get))",
        );
        assert_eq!(result, Value::Number(2.0));
    }

    #[test]
    fn deep_tail_recursion_does_not_grow_the_call_stack() {
        let mut ctx = Context::new();
        let script = ctx
            .load_script(
                "<test>",
                "(do
                   (define loop (lambda (n acc) (if (= n 0) acc (loop (- n 1) (+ acc 1)))))
                   (loop 100000 0))",
            )
            .expect("compiles");
        let hook = crate::tracer::CountingHook::default();
        let mut vm = Vm::with_hook(VmConfig::default(), hook);
        let result = vm.exec(&mut ctx, &script).expect("runs without overflowing the call stack");
        assert_eq!(result, Value::Number(100_000.0));
    }

    #[test]
    fn calling_a_non_function_is_a_bad_type_error() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(1 2 3)").expect("compiles");
        let mut vm = Vm::new(VmConfig::default());
        let err = vm.exec(&mut ctx, &script).expect_err("1 is not callable");
        assert_eq!(err.runtime_kind, Some(RuntimeErrorKind::BadType));
    }

    #[test]
    fn mistyped_argument_reports_a_one_based_index() {
        // spec.md §8: `(+ 1 "a")` -> BAD_ARGUMENT, argument index 2, expected "number", got "string".
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(+ 1 \"a\")").expect("compiles");
        let mut vm = Vm::new(VmConfig::default());
        let err = vm.exec(&mut ctx, &script).expect_err("a string is not a number");
        assert_eq!(err.runtime_kind, Some(RuntimeErrorKind::BadArgument));
        assert!(err.message.contains('2'), "message should cite 1-based index 2: {}", err.message);
        assert!(err.message.contains("number"));
        assert!(err.message.contains("string"));
    }

    #[test]
    fn unbound_symbol_reference_is_reported_at_run_time() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "never-defined").expect("compiles");
        let mut vm = Vm::new(VmConfig::default());
        let err = vm.exec(&mut ctx, &script).expect_err("never defined");
        assert_eq!(err.runtime_kind, Some(RuntimeErrorKind::UnboundSymbol));
    }

    #[test]
    fn direct_letrec_violation_is_already_rejected_at_compile_time() {
        let mut ctx = Context::new();
        let err = ctx.load_script("<test>", "(letrec ((x x)) x)").expect_err("caught statically");
        assert!(err.runtime_kind.is_none(), "this is a compile-time error, not a runtime one");
    }

    #[test]
    fn status_of_classifies_ok_error_and_aborted() {
        struct AlwaysAbort;
        impl VmHook for AlwaysAbort {
            fn step(&mut self, _view: &VmView<'_>) -> HookAction {
                HookAction::Abort
            }
        }

        let mut ctx = Context::new();
        let ok_script = ctx.load_script("<test>", "(+ 1 2)").expect("compiles");
        let ok_result = Vm::new(VmConfig::default()).exec(&mut ctx, &ok_script);
        assert_eq!(Status::of(&ok_result), Status::Ok);

        let err_script = ctx.load_script("<test>", "never-defined").expect("compiles");
        let err_result = Vm::new(VmConfig::default()).exec(&mut ctx, &err_script);
        assert_eq!(Status::of(&err_result), Status::Error);

        let abort_script = ctx.load_script("<test>", "(+ 1 2)").expect("compiles");
        let abort_result = Vm::with_hook(VmConfig::default(), AlwaysAbort).exec(&mut ctx, &abort_script);
        assert_eq!(Status::of(&abort_result), Status::Aborted);
    }

    #[test]
    fn quasiquote_splices_a_list_into_place() {
        let mut ctx = Context::new();
        let script = ctx.load_script("<test>", "(let ((xs (list 1 2))) `(0 ,@xs 3))").expect("compiles");
        let mut vm = Vm::new(VmConfig::default());
        let result = vm.exec(&mut ctx, &script).expect("runs");
        let rendered = crate::value::display_value(result, &ctx.interns, &ctx.heap);
        assert_eq!(rendered, "(0 1 2 3)");
    }
}
