//! AST -> bytecode compilation: scope/capture resolution (`scope.rs`),
//! constant/import deduplication, and tail-position analysis.
//!
//! Two mirrored recursive walks do the actual code generation:
//! [`Compiler::compile_nontail`] always leaves exactly one value on the
//! operand stack and never emits `TAIL`; [`Compiler::compile_tail`] is used
//! only for a function body's final expression (and everything in tail
//! position relative to it — an `if`'s branches, a `do`/`let`/`letrec`'s
//! last form) and ends every path either in `TAIL` (reusing the caller's
//! frame) or an explicit `RET`.

mod scope;

use std::rc::Rc;

use scope::{FunctionScope, Resolved};

use crate::ast::{Ast, Binding, LambdaParams, QuasiPart, QuotedValue};
use crate::bytecode::builder::{CodeBuilder, Label};
use crate::bytecode::op::{OPERAND_MAX, OPERAND_MIN, Opcode};
use crate::error::CompileError;
use crate::function::{Arity, FunctionBlock};
use crate::heap::Heap;
use crate::intern::{Interns, StringId};
use crate::location::CodeRange;
use crate::value::Value;

/// Compiles a whole program (the forms produced by
/// [`crate::ast::AstBuilder::build_top_level`]) into one top-level function,
/// implicitly wrapping the forms in a `do` body the way a module is itself
/// one big sequence (spec.md §4.9).
pub fn compile_program(
    interns: &mut Interns,
    heap: &mut Heap,
    source_name: StringId,
    forms: &[Ast],
) -> Result<Rc<FunctionBlock>, CompileError> {
    let module_marker = interns.intern("<module>");
    let mut compiler = Compiler { interns, heap, scopes: vec![], funcs: vec![], pending_source_name: module_marker };
    let debug_name = compiler.interns.intern("<module>");
    let (block, _captures) = compiler.compile_function(&LambdaParams::Fixed(vec![]), forms, CodeRange::UNKNOWN, source_name, debug_name)?;
    Ok(block)
}

/// One in-progress [`FunctionBlock`]: its own builder plus the append-only
/// tables `compile_program`'s doc on [`FunctionBlock`] promises are frozen
/// once the function finishes.
struct FuncBuilder {
    builder: CodeBuilder,
    constants: Vec<Value>,
    const_keys: Vec<ConstKey>,
    imports: Vec<StringId>,
    nested: Vec<Rc<FunctionBlock>>,
    letrec_slots: Vec<(u16, StringId)>,
}

impl FuncBuilder {
    fn new() -> Self {
        Self { builder: CodeBuilder::new(), constants: vec![], const_keys: vec![], imports: vec![], nested: vec![], letrec_slots: vec![] }
    }
}

/// Structural dedup key for a compile-time constant, built without touching
/// the heap so two occurrences of the same quoted literal always collapse
/// to one constant slot regardless of list-allocation order.
#[derive(Clone, PartialEq)]
enum ConstKey {
    Nil,
    Bool(bool),
    Number(u64),
    Str(StringId),
    Symbol(StringId),
    List(Vec<ConstKey>),
}

fn const_key(qv: &QuotedValue) -> ConstKey {
    match qv {
        QuotedValue::Nil => ConstKey::Nil,
        QuotedValue::Bool(b) => ConstKey::Bool(*b),
        QuotedValue::Number(n) => ConstKey::Number(n.to_bits()),
        QuotedValue::Str(id) => ConstKey::Str(*id),
        QuotedValue::Symbol(id) => ConstKey::Symbol(*id),
        QuotedValue::List(items) => ConstKey::List(items.iter().map(const_key).collect()),
    }
}

struct Compiler<'a> {
    interns: &'a mut Interns,
    heap: &'a mut Heap,
    scopes: Vec<FunctionScope>,
    funcs: Vec<FuncBuilder>,
    /// The source name of whichever function is currently being compiled;
    /// every nested `lambda` inherits it from its enclosing function.
    pending_source_name: StringId,
}

impl Compiler<'_> {
    fn current_func_mut(&mut self) -> &mut FuncBuilder {
        self.funcs.last_mut().expect("at least one function is always open while compiling")
    }

    fn current_scope_idx(&self) -> usize {
        self.scopes.len() - 1
    }

    fn emit(&mut self, op: Opcode, operand: i32, loc: CodeRange) -> usize {
        self.current_func_mut().builder.emit(op, operand, loc)
    }

    fn new_label(&mut self) -> Label {
        self.current_func_mut().builder.new_label()
    }

    fn bind_label(&mut self, label: Label) {
        self.current_func_mut().builder.bind_label(label);
    }

    fn emit_jump(&mut self, op: Opcode, label: Label, loc: CodeRange) -> usize {
        self.current_func_mut().builder.emit_jump(op, label, loc)
    }

    fn import_index(&mut self, name: StringId) -> usize {
        let imports = &mut self.current_func_mut().imports;
        if let Some(i) = imports.iter().position(|&n| n == name) {
            return i;
        }
        imports.push(name);
        imports.len() - 1
    }

    fn materialize(&mut self, qv: &QuotedValue) -> Value {
        match qv {
            QuotedValue::Nil => Value::Nil,
            QuotedValue::Bool(b) => Value::Bool(*b),
            QuotedValue::Number(n) => Value::Number(*n),
            QuotedValue::Str(id) => Value::Str(*id),
            QuotedValue::Symbol(id) => Value::Symbol(*id),
            QuotedValue::List(items) => {
                let values: Vec<Value> = items.iter().map(|i| self.materialize(i)).collect();
                Value::List(self.heap.alloc_list(values))
            }
        }
    }

    fn add_constant(&mut self, qv: &QuotedValue) -> usize {
        let key = const_key(qv);
        let func = self.current_func_mut();
        if let Some(i) = func.const_keys.iter().position(|k| *k == key) {
            return i;
        }
        let value = self.materialize(qv);
        let func = self.current_func_mut();
        func.constants.push(value);
        func.const_keys.push(key);
        func.constants.len() - 1
    }

    fn emit_constant(&mut self, qv: QuotedValue, loc: CodeRange) {
        let k = self.add_constant(&qv);
        self.emit(Opcode::Ldc, i32::try_from(k).expect("a function's own constants fit in an operand"), loc);
    }

    fn symbol_ast(&mut self, name: &str, loc: CodeRange) -> Ast {
        Ast::SymbolRef(self.interns.intern(name), loc)
    }

    /// Rewrites one quasiquote template into an ordinary `Ast`, desugaring
    /// `unquote`/`unquote-splicing` into `cons`/`append` applications
    /// (spec.md §4.4), so the existing expression compiler handles the
    /// result with no new opcodes.
    fn quasi_to_ast(&mut self, part: &QuasiPart, loc: CodeRange) -> Ast {
        match part {
            QuasiPart::Literal(qv) => Ast::QuoteLit(qv.clone(), loc),
            QuasiPart::Unquote(inner) | QuasiPart::UnquoteSplicing(inner) => (**inner).clone(),
            QuasiPart::List(parts) => self.quasi_list_to_ast(parts, loc),
        }
    }

    fn quasi_list_to_ast(&mut self, parts: &[QuasiPart], loc: CodeRange) -> Ast {
        let mut acc = Ast::QuoteLit(QuotedValue::List(vec![]), loc);
        for part in parts.iter().rev() {
            acc = match part {
                QuasiPart::UnquoteSplicing(inner) => {
                    let callee = self.symbol_ast("append", loc);
                    Ast::Apply { callee: Box::new(callee), args: vec![(**inner).clone(), acc], loc }
                }
                other => {
                    let elem = self.quasi_to_ast(other, loc);
                    let callee = self.symbol_ast("cons", loc);
                    Ast::Apply { callee: Box::new(callee), args: vec![elem, acc], loc }
                }
            };
        }
        acc
    }

    fn compile_symbol_ref(&mut self, id: StringId, loc: CodeRange) {
        match scope::resolve(&mut self.scopes, self.current_scope_idx(), id) {
            Resolved::Slot(slot) => {
                self.emit(Opcode::Ldl, i32::from(slot), loc);
            }
            Resolved::Import => {
                let k = self.import_index(id);
                self.emit(Opcode::Imp, i32::try_from(k).expect("a function's own imports fit in an operand"), loc);
            }
        }
    }

    fn compile_number(&mut self, n: f64, loc: CodeRange) {
        if let Some(imm) = ldi_operand(n) {
            self.emit(Opcode::Ldi, imm, loc);
        } else {
            self.emit_constant(QuotedValue::Number(n), loc);
        }
    }

    /// Compiles `lambda`'s nested body into its own [`FunctionBlock`], then
    /// emits the parent-side `LDL`s (in the child's capture order) and the
    /// `CLS` that pairs them with it.
    fn compile_lambda(&mut self, params: &LambdaParams, body: &[Ast], loc: CodeRange) -> Result<(), CompileError> {
        let debug_name = self.interns.intern("<lambda>");
        let source_name = self.pending_source_name;
        let (child, captures) = self.compile_function(params, body, loc, source_name, debug_name)?;
        let parent_idx = self.current_scope_idx();
        for &(name, _) in &captures {
            let resolved = scope::resolve(&mut self.scopes, parent_idx, name);
            let Resolved::Slot(slot) = resolved else {
                unreachable!("a captured name always resolves to a slot in some enclosing scope")
            };
            self.emit(Opcode::Ldl, i32::from(slot), loc);
        }
        let k = self.current_func_mut().nested.len();
        self.current_func_mut().nested.push(child);
        self.emit(Opcode::Cls, i32::try_from(k).expect("a function's own nested table fits in an operand"), loc);
        Ok(())
    }

    /// Compiles a fresh function body (top-level module or a `lambda`),
    /// returning the finished block together with the captures it still
    /// needs from its own parent scope (empty for the top-level module).
    fn compile_function(
        &mut self,
        params: &LambdaParams,
        body: &[Ast],
        loc: CodeRange,
        source_name: StringId,
        debug_name: StringId,
    ) -> Result<(Rc<FunctionBlock>, Vec<(StringId, u16)>), CompileError> {
        let param_names: Vec<StringId> = match params {
            LambdaParams::Fixed(names) => names.clone(),
            LambdaParams::Variadic(name) => vec![*name],
        };
        let saved_source_name = self.pending_source_name;
        self.pending_source_name = source_name;
        self.scopes.push(FunctionScope::new(&param_names));
        self.funcs.push(FuncBuilder::new());

        self.compile_tail_sequence(body)?;

        let scope = self.scopes.pop().expect("just pushed");
        let func = self.funcs.pop().expect("just pushed");
        self.pending_source_name = saved_source_name;

        let (instructions, locations) = func.builder.finish();
        let captures = scope.captures().to_vec();
        let capture_slots = captures.iter().map(|&(_, slot)| slot).collect();
        let arity = match params {
            LambdaParams::Fixed(names) => Arity::Fixed(u8::try_from(names.len()).expect("parameter lists are small")),
            LambdaParams::Variadic(_) => Arity::Variadic { min: 0 },
        };
        let block = FunctionBlock {
            instructions,
            locations,
            imports: func.imports,
            constants: func.constants,
            nested: func.nested,
            capture_slots,
            letrec_slots: func.letrec_slots,
            arity,
            env_size: scope.env_size(),
            source_name,
            debug_name,
        };
        let _ = loc;
        Ok((Rc::new(block), captures))
    }

    fn compile_let_bindings(&mut self, bindings: &[Binding], loc: CodeRange) -> Result<(), CompileError> {
        for b in bindings {
            self.compile_nontail(&b.value)?;
            let slot = self.scopes.last_mut().expect("scope always open").add_local(b.name);
            self.emit(Opcode::Set, i32::from(slot), loc);
        }
        Ok(())
    }

    fn compile_letrec_bindings(&mut self, bindings: &[Binding], loc: CodeRange) -> Result<(), CompileError> {
        let names: Vec<StringId> = bindings.iter().map(|b| b.name).collect();
        let mut slots = Vec::with_capacity(bindings.len());
        for &name in &names {
            let slot = self.scopes.last_mut().expect("scope always open").add_local(name);
            slots.push(slot);
            self.current_func_mut().letrec_slots.push((slot, name));
        }
        for (b, &slot) in bindings.iter().zip(&slots) {
            if let Some((name, ref_loc)) = find_letrec_violation(&b.value, &names) {
                return Err(CompileError::UndefinedInLetrec { name: self.interns.get(name).to_owned(), loc: ref_loc });
            }
            self.compile_nontail(&b.value)?;
            self.emit(Opcode::Set, i32::from(slot), loc);
        }
        Ok(())
    }

    /// Compiles `ast`, leaving exactly one value on the operand stack. Never
    /// emits `TAIL`/`RET` — the caller decides what to do with the value.
    fn compile_nontail(&mut self, ast: &Ast) -> Result<(), CompileError> {
        match ast {
            Ast::NilLit(loc) => {
                self.emit(Opcode::Nil, 0, *loc);
            }
            Ast::BoolLit(b, loc) => {
                self.emit(Opcode::Ldb, i32::from(*b), *loc);
            }
            Ast::NumberLit(n, loc) => self.compile_number(*n, *loc),
            Ast::StringLit(id, loc) => self.emit_constant(QuotedValue::Str(*id), *loc),
            Ast::SymbolRef(id, loc) => self.compile_symbol_ref(*id, *loc),
            Ast::QuoteLit(qv, loc) => self.emit_constant(qv.clone(), *loc),
            Ast::Quasiquote(part, loc) => {
                let built = self.quasi_to_ast(part, *loc);
                self.compile_nontail(&built)?;
            }
            Ast::If { cond, then, else_, loc } => {
                self.compile_nontail(cond)?;
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.emit_jump(Opcode::Jof, else_label, *loc);
                self.compile_nontail(then)?;
                self.emit_jump(Opcode::Jmp, end_label, *loc);
                self.bind_label(else_label);
                self.compile_nontail(else_)?;
                self.bind_label(end_label);
            }
            Ast::Let { bindings, body, loc } => {
                self.scopes.last_mut().expect("scope always open").push_block();
                self.compile_let_bindings(bindings, *loc)?;
                self.compile_nontail_sequence(body)?;
                self.scopes.last_mut().expect("scope always open").pop_block();
            }
            Ast::Letrec { bindings, body, loc } => {
                self.scopes.last_mut().expect("scope always open").push_block();
                self.compile_letrec_bindings(bindings, *loc)?;
                self.compile_nontail_sequence(body)?;
                self.scopes.last_mut().expect("scope always open").pop_block();
            }
            Ast::Do { body, .. } => self.compile_nontail_sequence(body)?,
            Ast::Lambda { params, body, loc } => self.compile_lambda(params, body, *loc)?,
            Ast::Define { name, value, loc } => {
                self.compile_nontail(value)?;
                let k = self.import_index(*name);
                self.emit(Opcode::Def, i32::try_from(k).expect("a function's own imports fit in an operand"), *loc);
                self.emit(Opcode::Nil, 0, *loc);
            }
            Ast::Apply { callee, args, loc } => {
                self.compile_nontail(callee)?;
                for arg in args {
                    self.compile_nontail(arg)?;
                }
                self.emit(Opcode::Call, i32::try_from(args.len()).expect("call arities are small"), *loc);
            }
        }
        Ok(())
    }

    /// Compiles a statement sequence in non-tail position: every form but
    /// the last is dropped with `POP 1`, the last form's value survives.
    fn compile_nontail_sequence(&mut self, body: &[Ast]) -> Result<(), CompileError> {
        let Some((last, rest)) = body.split_last() else {
            self.emit(Opcode::Nil, 0, CodeRange::UNKNOWN);
            return Ok(());
        };
        for form in rest {
            self.compile_nontail(form)?;
            self.emit(Opcode::Pop, 1, form.loc());
        }
        self.compile_nontail(last)
    }

    /// Compiles `ast` as the final expression of a function body (or
    /// anything in tail position relative to one): a call compiles to
    /// `TAIL` and nothing further is emitted for it; every other leaf
    /// compiles normally and is followed by `RET`.
    fn compile_tail(&mut self, ast: &Ast) -> Result<(), CompileError> {
        match ast {
            Ast::Apply { callee, args, loc } => {
                self.compile_nontail(callee)?;
                for arg in args {
                    self.compile_nontail(arg)?;
                }
                self.emit(Opcode::Tail, i32::try_from(args.len()).expect("call arities are small"), *loc);
            }
            Ast::If { cond, then, else_, loc } => {
                self.compile_nontail(cond)?;
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.emit_jump(Opcode::Jof, else_label, *loc);
                self.compile_tail(then)?;
                self.emit_jump(Opcode::Jmp, end_label, *loc);
                self.bind_label(else_label);
                self.compile_tail(else_)?;
                self.bind_label(end_label);
            }
            Ast::Let { bindings, body, loc } => {
                self.scopes.last_mut().expect("scope always open").push_block();
                self.compile_let_bindings(bindings, *loc)?;
                self.compile_tail_sequence(body)?;
                self.scopes.last_mut().expect("scope always open").pop_block();
            }
            Ast::Letrec { bindings, body, loc } => {
                self.scopes.last_mut().expect("scope always open").push_block();
                self.compile_letrec_bindings(bindings, *loc)?;
                self.compile_tail_sequence(body)?;
                self.scopes.last_mut().expect("scope always open").pop_block();
            }
            Ast::Do { body, .. } => self.compile_tail_sequence(body)?,
            other => {
                self.compile_nontail(other)?;
                self.emit(Opcode::Ret, 0, other.loc());
            }
        }
        Ok(())
    }

    /// Compiles a statement sequence where the last form is in tail
    /// position; everything before it is a dropped non-tail statement.
    fn compile_tail_sequence(&mut self, body: &[Ast]) -> Result<(), CompileError> {
        let Some((last, rest)) = body.split_last() else {
            self.emit(Opcode::Nil, 0, CodeRange::UNKNOWN);
            self.emit(Opcode::Ret, 0, CodeRange::UNKNOWN);
            return Ok(());
        };
        for form in rest {
            self.compile_nontail(form)?;
            self.emit(Opcode::Pop, 1, form.loc());
        }
        self.compile_tail(last)
    }
}

fn ldi_operand(n: f64) -> Option<i32> {
    if n.fract() != 0.0 || !n.is_finite() {
        return None;
    }
    if n < f64::from(OPERAND_MIN) || n > f64::from(OPERAND_MAX) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(n as i32)
}

/// Best-effort compile-time detection of the common `letrec` footgun: a
/// binding's initializer directly (not deferred behind a `lambda`)
/// references a sibling binding — including itself — before any binding in
/// the group has actually run. Mutual recursion through `lambda` bodies is
/// unaffected since those defer evaluation to call time, by which point
/// every slot has been set.
fn find_letrec_violation(ast: &Ast, names: &[StringId]) -> Option<(StringId, CodeRange)> {
    match ast {
        Ast::SymbolRef(id, loc) if names.contains(id) => Some((*id, *loc)),
        Ast::Lambda { .. } => None,
        Ast::If { cond, then, else_, .. } => {
            find_letrec_violation(cond, names).or_else(|| find_letrec_violation(then, names)).or_else(|| find_letrec_violation(else_, names))
        }
        Ast::Apply { callee, args, .. } => {
            find_letrec_violation(callee, names).or_else(|| args.iter().find_map(|a| find_letrec_violation(a, names)))
        }
        Ast::Let { bindings, body, .. } | Ast::Letrec { bindings, body, .. } => bindings
            .iter()
            .find_map(|b| find_letrec_violation(&b.value, names))
            .or_else(|| body.iter().find_map(|f| find_letrec_violation(f, names))),
        Ast::Do { body, .. } => body.iter().find_map(|f| find_letrec_violation(f, names)),
        Ast::Define { value, .. } => find_letrec_violation(value, names),
        Ast::Quasiquote(..) | Ast::NilLit(_) | Ast::BoolLit(..) | Ast::NumberLit(..) | Ast::StringLit(..) | Ast::QuoteLit(..) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use crate::bytecode::op::Instruction;
    use crate::parser::Parser;
    // Multi-line `Vec<Opcode>` mismatches are unreadable as a single-line
    // diff; shadow `assert_eq!` for this module's exact-opcode-sequence
    // assertions.
    use pretty_assertions::assert_eq;

    fn compile(source: &str) -> (Rc<FunctionBlock>, Interns) {
        let mut interns = Interns::new();
        let mut heap = Heap::new();
        let mut parser = Parser::new(source);
        let program = parser.parse_program().expect("valid program");
        let mut builder = AstBuilder::new();
        let mut forms = Vec::new();
        for node in &program {
            forms.push(builder.build_top_level(&mut interns, node).expect("valid ast"));
        }
        let source_name = interns.intern("<test>");
        let block = compile_program(&mut interns, &mut heap, source_name, &forms).expect("compiles");
        (block, interns)
    }

    fn ops(block: &Rc<FunctionBlock>) -> Vec<Opcode> {
        block.instructions.iter().map(|&w| Instruction::unpack(w).op).collect()
    }

    #[test]
    fn literal_number_compiles_to_ldi_then_ret() {
        let (block, _) = compile("42");
        assert_eq!(ops(&block), vec![Opcode::Ldi, Opcode::Ret]);
    }

    #[test]
    fn application_in_tail_position_compiles_to_tail() {
        let (block, _) = compile("(+ 1 2)");
        assert_eq!(ops(&block), vec![Opcode::Imp, Opcode::Ldi, Opcode::Ldi, Opcode::Tail]);
    }

    #[test]
    fn application_as_an_argument_compiles_to_call() {
        let (block, _) = compile("(not (not #t))");
        // outer application is in tail position (TAIL); the inner one, as
        // an argument, must be CALL.
        assert_eq!(ops(&block), vec![Opcode::Imp, Opcode::Imp, Opcode::Ldb, Opcode::Call, Opcode::Tail]);
    }

    #[test]
    fn if_compiles_both_branches_in_tail_position() {
        let (block, _) = compile("(if #t 1 2)");
        assert_eq!(ops(&block), vec![Opcode::Ldb, Opcode::Jof, Opcode::Ldi, Opcode::Ret, Opcode::Jmp, Opcode::Ldi, Opcode::Ret]);
    }

    #[test]
    fn let_binds_into_a_fresh_slot_before_the_body() {
        let (block, _) = compile("(let ((x 1)) x)");
        assert_eq!(ops(&block), vec![Opcode::Ldi, Opcode::Set, Opcode::Ldl, Opcode::Ret]);
        assert_eq!(block.env_size, 1);
    }

    #[test]
    fn lambda_with_no_free_variables_has_no_captures() {
        let (block, _) = compile("(lambda (x) x)");
        assert_eq!(block.nested.len(), 1);
        assert_eq!(block.nested[0].capture_slots.len(), 0);
        // building + emitting the closure, then returning it in tail position.
        assert_eq!(ops(&block), vec![Opcode::Cls, Opcode::Ret]);
    }

    #[test]
    fn lambda_capturing_an_enclosing_let_binding_emits_a_parent_ldl_before_cls() {
        let (block, _) = compile("(let ((x 1)) (lambda () x))");
        assert_eq!(ops(&block), vec![Opcode::Ldi, Opcode::Set, Opcode::Ldl, Opcode::Cls, Opcode::Ret]);
        assert_eq!(block.nested[0].capture_slots.len(), 1);
    }

    #[test]
    fn quote_of_a_list_is_a_single_deduplicated_constant() {
        let (block, _) = compile("(let ((a '(1 2))) (let ((b '(1 2))) a))");
        assert_eq!(block.constants.len(), 1, "both quoted lists are structurally identical");
    }

    #[test]
    fn letrec_allows_self_reference_inside_a_lambda_body() {
        let (_block, _) = compile("(letrec ((f (lambda (n) (if (= n 0) 1 (* n (f (- n 1))))))) (f 5))");
    }

    #[test]
    fn letrec_rejects_a_direct_self_reference() {
        let mut interns = Interns::new();
        let mut heap = Heap::new();
        let mut parser = Parser::new("(letrec ((x x)) x)");
        let program = parser.parse_program().expect("valid program");
        let mut builder = AstBuilder::new();
        let mut forms = Vec::new();
        for node in &program {
            forms.push(builder.build_top_level(&mut interns, node).expect("valid ast"));
        }
        let source_name = interns.intern("<test>");
        let err = compile_program(&mut interns, &mut heap, source_name, &forms).expect_err("direct self-reference is caught statically");
        assert!(matches!(err, CompileError::UndefinedInLetrec { .. }));
    }

    #[test]
    fn quasiquote_with_unquote_splicing_desugars_to_append() {
        let (block, _) = compile("(let ((xs (list 1 2))) `(0 ,@xs 3))");
        assert!(ops(&block).contains(&Opcode::Call) || ops(&block).contains(&Opcode::Tail));
    }

    #[test]
    fn define_evaluates_to_nil_for_sequencing() {
        let (block, _) = compile("(do (define x 1) x)");
        assert_eq!(ops(&block), vec![Opcode::Ldi, Opcode::Def, Opcode::Nil, Opcode::Pop, Opcode::Imp, Opcode::Ret]);
    }
}
