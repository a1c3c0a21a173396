use super::{Ast, Binding, LambdaParams, QuasiPart, QuotedValue};
use crate::error::CompileError;
use crate::intern::Interns;
use crate::parser::{Sexpr, SexprNode};
use crate::resource::{LimitedTracker, ResourceTracker};

/// Host-stack recursion is bounded at this many nested s-expression levels
/// by default; see [`AstBuilder::with_max_depth`] to change it.
const DEFAULT_MAX_DEPTH: usize = 2000;

/// Converts parsed s-expressions into [`Ast`] nodes, recognizing special
/// forms by symbol name in head position and rejecting malformed ones.
///
/// Bounds its own recursion with a [`LimitedTracker`] (see `resource.rs`):
/// a deeply nested `let`/`lambda`/quasiquote template recurses once per
/// s-expression level here, and without a bound a sufficiently adversarial
/// input would overflow the host stack instead of returning a `CompileError`.
pub struct AstBuilder {
    depth: LimitedTracker,
}

impl Default for AstBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AstBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    #[must_use]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { depth: LimitedTracker::new(max_depth) }
    }

    /// Builds a top-level form; `define` is legal here.
    pub fn build_top_level(&mut self, interns: &mut Interns, node: &SexprNode) -> Result<Ast, CompileError> {
        self.build(interns, node, true)
    }

    fn build(&mut self, interns: &mut Interns, node: &SexprNode, allow_define: bool) -> Result<Ast, CompileError> {
        self.depth.enter().map_err(|e| too_deeply_nested(e, node.loc))?;
        let result = self.build_form(interns, node, allow_define);
        self.depth.exit();
        result
    }

    fn build_form(&mut self, interns: &mut Interns, node: &SexprNode, allow_define: bool) -> Result<Ast, CompileError> {
        match &node.kind {
            Sexpr::Number(n) => Ok(Ast::NumberLit(*n, node.loc)),
            Sexpr::Str(s) => Ok(Ast::StringLit(interns.intern(s), node.loc)),
            Sexpr::Symbol(s) => Ok(self.build_symbol(interns, s, node.loc)),
            Sexpr::List(items) => self.build_list(interns, items, node.loc, allow_define),
        }
    }

    fn build_symbol(&self, interns: &mut Interns, s: &str, loc: crate::location::CodeRange) -> Ast {
        match s {
            "nil" => Ast::NilLit(loc),
            "true" => Ast::BoolLit(true, loc),
            "false" => Ast::BoolLit(false, loc),
            _ => Ast::SymbolRef(interns.intern(s), loc),
        }
    }

    fn build_list(
        &mut self,
        interns: &mut Interns,
        items: &[SexprNode],
        loc: crate::location::CodeRange,
        allow_define: bool,
    ) -> Result<Ast, CompileError> {
        let Some(head) = items.first() else {
            // An empty list, `()`, self-evaluates to the empty list literal.
            return Ok(Ast::QuoteLit(QuotedValue::List(vec![]), loc));
        };
        if let Some(form) = head.as_symbol() {
            match form {
                "if" => return self.build_if(interns, items, loc),
                "let" => return self.build_let(interns, items, loc, false),
                "letrec" => return self.build_let(interns, items, loc, true),
                "do" => return self.build_do(interns, items, loc, allow_define),
                "lambda" => return self.build_lambda(interns, items, loc),
                "quote" => return self.build_quote(interns, items, loc),
                "quasiquote" => return self.build_quasiquote(interns, items, loc),
                "define" => return self.build_define(interns, items, loc, allow_define),
                _ => {}
            }
        }
        self.build_apply(interns, head, &items[1..], loc)
    }

    fn build_apply(
        &mut self,
        interns: &mut Interns,
        head: &SexprNode,
        rest: &[SexprNode],
        loc: crate::location::CodeRange,
    ) -> Result<Ast, CompileError> {
        let callee = Box::new(self.build(interns, head, false)?);
        let mut args = Vec::with_capacity(rest.len());
        for arg in rest {
            args.push(self.build(interns, arg, false)?);
        }
        Ok(Ast::Apply { callee, args, loc })
    }

    fn build_if(&mut self, interns: &mut Interns, items: &[SexprNode], loc: crate::location::CodeRange) -> Result<Ast, CompileError> {
        let operands = &items[1..];
        if operands.len() != 2 && operands.len() != 3 {
            return Err(CompileError::BadSpecialForm {
                form: "if".to_owned(),
                reason: format!("expected 2 or 3 operands, got {}", operands.len()),
                loc,
            });
        }
        let cond = Box::new(self.build(interns, &operands[0], false)?);
        let then = Box::new(self.build(interns, &operands[1], false)?);
        let else_ = if let Some(e) = operands.get(2) {
            Box::new(self.build(interns, e, false)?)
        } else {
            Box::new(Ast::NilLit(loc))
        };
        Ok(Ast::If { cond, then, else_, loc })
    }

    fn build_bindings(
        &mut self,
        interns: &mut Interns,
        form: &str,
        bindings_node: &SexprNode,
        loc: crate::location::CodeRange,
    ) -> Result<Vec<Binding>, CompileError> {
        let pairs = bindings_node.as_list().ok_or_else(|| CompileError::BadSpecialForm {
            form: form.to_owned(),
            reason: "first operand must be a list of bindings".to_owned(),
            loc,
        })?;
        let mut out = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let entry = pair.as_list().filter(|e| e.len() == 2).ok_or_else(|| CompileError::BadSpecialForm {
                form: form.to_owned(),
                reason: "each binding must be a `(name expr)` pair".to_owned(),
                loc: pair.loc,
            })?;
            let name = entry[0].as_symbol().ok_or_else(|| CompileError::BadSpecialForm {
                form: form.to_owned(),
                reason: "binding name must be a symbol".to_owned(),
                loc: entry[0].loc,
            })?;
            let name = interns.intern(name);
            let value = self.build(interns, &entry[1], false)?;
            out.push(Binding { name, value });
        }
        Ok(out)
    }

    fn build_let(
        &mut self,
        interns: &mut Interns,
        items: &[SexprNode],
        loc: crate::location::CodeRange,
        recursive: bool,
    ) -> Result<Ast, CompileError> {
        let form = if recursive { "letrec" } else { "let" };
        let operands = &items[1..];
        let Some(bindings_node) = operands.first() else {
            return Err(CompileError::BadSpecialForm { form: form.to_owned(), reason: "missing bindings list".to_owned(), loc });
        };
        let bindings = self.build_bindings(interns, form, bindings_node, loc)?;
        let body_forms = &operands[1..];
        if body_forms.is_empty() {
            return Err(CompileError::BadSpecialForm { form: form.to_owned(), reason: "body must have at least one form".to_owned(), loc });
        }
        let mut body = Vec::with_capacity(body_forms.len());
        for form_node in body_forms {
            body.push(self.build(interns, form_node, false)?);
        }
        Ok(if recursive { Ast::Letrec { bindings, body, loc } } else { Ast::Let { bindings, body, loc } })
    }

    fn build_do(
        &mut self,
        interns: &mut Interns,
        items: &[SexprNode],
        loc: crate::location::CodeRange,
        allow_define: bool,
    ) -> Result<Ast, CompileError> {
        let body_forms = &items[1..];
        let mut body = Vec::with_capacity(body_forms.len());
        for form_node in body_forms {
            body.push(self.build(interns, form_node, allow_define)?);
        }
        Ok(Ast::Do { body, loc })
    }

    fn build_lambda(&mut self, interns: &mut Interns, items: &[SexprNode], loc: crate::location::CodeRange) -> Result<Ast, CompileError> {
        let operands = &items[1..];
        let Some(params_node) = operands.first() else {
            return Err(CompileError::BadSpecialForm { form: "lambda".to_owned(), reason: "missing parameter list".to_owned(), loc });
        };
        let params = if let Some(name) = params_node.as_symbol() {
            LambdaParams::Variadic(interns.intern(name))
        } else if let Some(list) = params_node.as_list() {
            let mut names = Vec::with_capacity(list.len());
            for p in list {
                let name = p.as_symbol().ok_or_else(|| CompileError::BadSpecialForm {
                    form: "lambda".to_owned(),
                    reason: "each parameter must be a symbol".to_owned(),
                    loc: p.loc,
                })?;
                names.push(interns.intern(name));
            }
            LambdaParams::Fixed(names)
        } else {
            return Err(CompileError::BadSpecialForm {
                form: "lambda".to_owned(),
                reason: "parameter list must be a symbol or a list of symbols".to_owned(),
                loc: params_node.loc,
            });
        };
        let body_forms = &operands[1..];
        if body_forms.is_empty() {
            return Err(CompileError::BadSpecialForm { form: "lambda".to_owned(), reason: "body must have at least one form".to_owned(), loc });
        }
        let mut body = Vec::with_capacity(body_forms.len());
        for form_node in body_forms {
            body.push(self.build(interns, form_node, false)?);
        }
        Ok(Ast::Lambda { params, body, loc })
    }

    fn build_define(
        &mut self,
        interns: &mut Interns,
        items: &[SexprNode],
        loc: crate::location::CodeRange,
        allow_define: bool,
    ) -> Result<Ast, CompileError> {
        if !allow_define {
            return Err(CompileError::BadSpecialForm {
                form: "define".to_owned(),
                reason: "only legal at top level or in a module's `do` body".to_owned(),
                loc,
            });
        }
        let operands = &items[1..];
        if operands.len() != 2 {
            return Err(CompileError::BadSpecialForm {
                form: "define".to_owned(),
                reason: format!("expected a name and one value expression, got {} operands", operands.len()),
                loc,
            });
        }
        let name = operands[0].as_symbol().ok_or_else(|| CompileError::BadSpecialForm {
            form: "define".to_owned(),
            reason: "first operand must be a symbol".to_owned(),
            loc: operands[0].loc,
        })?;
        let name = interns.intern(name);
        let value = Box::new(self.build(interns, &operands[1], false)?);
        Ok(Ast::Define { name, value, loc })
    }

    fn build_quote(&mut self, interns: &mut Interns, items: &[SexprNode], loc: crate::location::CodeRange) -> Result<Ast, CompileError> {
        let operands = &items[1..];
        if operands.len() != 1 {
            return Err(CompileError::BadSpecialForm {
                form: "quote".to_owned(),
                reason: format!("expected exactly 1 operand, got {}", operands.len()),
                loc,
            });
        }
        let value = self.quote_to_value(interns, &operands[0])?;
        Ok(Ast::QuoteLit(value, loc))
    }

    fn build_quasiquote(
        &mut self,
        interns: &mut Interns,
        items: &[SexprNode],
        loc: crate::location::CodeRange,
    ) -> Result<Ast, CompileError> {
        let operands = &items[1..];
        if operands.len() != 1 {
            return Err(CompileError::BadSpecialForm {
                form: "quasiquote".to_owned(),
                reason: format!("expected exactly 1 operand, got {}", operands.len()),
                loc,
            });
        }
        let part = self.build_quasi_part(interns, &operands[0])?;
        Ok(Ast::Quasiquote(part, loc))
    }

    fn build_quasi_part(&mut self, interns: &mut Interns, node: &SexprNode) -> Result<QuasiPart, CompileError> {
        self.depth.enter().map_err(|e| too_deeply_nested(e, node.loc))?;
        let result = self.build_quasi_part_form(interns, node);
        self.depth.exit();
        result
    }

    fn build_quasi_part_form(&mut self, interns: &mut Interns, node: &SexprNode) -> Result<QuasiPart, CompileError> {
        if let Some(items) = node.as_list() {
            if let Some(form) = items.first().and_then(SexprNode::as_symbol) {
                match form {
                    "unquote" if items.len() == 2 => {
                        return Ok(QuasiPart::Unquote(Box::new(self.build(interns, &items[1], false)?)));
                    }
                    "unquote-splicing" if items.len() == 2 => {
                        return Ok(QuasiPart::UnquoteSplicing(Box::new(self.build(interns, &items[1], false)?)));
                    }
                    _ => {}
                }
            }
            let mut parts = Vec::with_capacity(items.len());
            let mut all_literal = true;
            for item in items {
                let part = self.build_quasi_part(interns, item)?;
                if !matches!(part, QuasiPart::Literal(_)) {
                    all_literal = false;
                }
                parts.push(part);
            }
            if all_literal {
                let literals = parts
                    .into_iter()
                    .map(|p| match p {
                        QuasiPart::Literal(v) => v,
                        _ => unreachable!("checked all_literal above"),
                    })
                    .collect();
                return Ok(QuasiPart::Literal(QuotedValue::List(literals)));
            }
            return Ok(QuasiPart::List(parts));
        }
        let value = self.quote_to_value(interns, node)?;
        Ok(QuasiPart::Literal(value))
    }

    /// Recursively converts a raw s-expression into a quoted data value,
    /// bounded by the same tracker as [`Self::build`] since a quoted literal
    /// can nest as deeply as any other form.
    fn quote_to_value(&mut self, interns: &mut Interns, node: &SexprNode) -> Result<QuotedValue, CompileError> {
        self.depth.enter().map_err(|e| too_deeply_nested(e, node.loc))?;
        let result = match &node.kind {
            Sexpr::Number(n) => QuotedValue::Number(*n),
            Sexpr::Str(s) => QuotedValue::Str(interns.intern(s)),
            Sexpr::Symbol(s) => match s.as_str() {
                "nil" => QuotedValue::Nil,
                "true" => QuotedValue::Bool(true),
                "false" => QuotedValue::Bool(false),
                _ => QuotedValue::Symbol(interns.intern(s)),
            },
            Sexpr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.quote_to_value(interns, item)?);
                }
                QuotedValue::List(out)
            }
        };
        self.depth.exit();
        Ok(result)
    }
}

fn too_deeply_nested(err: crate::resource::ResourceError, loc: crate::location::CodeRange) -> CompileError {
    CompileError::BadSpecialForm {
        form: "<nesting>".to_owned(),
        reason: format!("expression nesting depth {} exceeds the limit of {}", err.depth, err.limit),
        loc,
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn build(src: &str) -> (Ast, Interns) {
        let mut parser = Parser::new(src);
        let node = parser.parse_sexpr().expect("parse ok");
        let mut interns = Interns::new();
        let mut builder = AstBuilder::new();
        (builder.build_top_level(&mut interns, &node).expect("build ok"), interns)
    }

    #[test]
    fn if_with_two_operands_defaults_else_to_nil() {
        let (ast, _) = build("(if true 1)");
        match ast {
            Ast::If { else_, .. } => assert!(matches!(*else_, Ast::NilLit(_))),
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn if_with_wrong_arity_is_rejected() {
        let mut parser = Parser::new("(if a)");
        let node = parser.parse_sexpr().expect("parse ok");
        let mut interns = Interns::new();
        let mut builder = AstBuilder::new();
        let err = builder.build_top_level(&mut interns, &node).unwrap_err();
        assert!(matches!(err, CompileError::BadSpecialForm { .. }));
    }

    #[test]
    fn define_outside_top_level_is_rejected() {
        let mut parser = Parser::new("(lambda () (define x 1))");
        let node = parser.parse_sexpr().expect("parse ok");
        let mut interns = Interns::new();
        let mut builder = AstBuilder::new();
        let err = builder.build_top_level(&mut interns, &node).unwrap_err();
        assert!(matches!(err, CompileError::BadSpecialForm { form, .. } if form == "define"));
    }

    #[test]
    fn define_inside_top_level_do_is_allowed() {
        let (ast, _) = build("(do (define x 1) x)");
        assert!(matches!(ast, Ast::Do { .. }));
    }

    #[test]
    fn lambda_variadic_params_bind_a_single_symbol() {
        let (ast, _) = build("(lambda args args)");
        match ast {
            Ast::Lambda { params: LambdaParams::Variadic(_), .. } => {}
            other => panic!("expected variadic lambda, got {other:?}"),
        }
    }

    #[test]
    fn quote_builds_a_nested_literal_tree() {
        let (ast, _) = build("(quote (1 2 (3)))");
        match ast {
            Ast::QuoteLit(QuotedValue::List(items), _) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[2], QuotedValue::List(_)));
            }
            other => panic!("expected QuoteLit, got {other:?}"),
        }
    }

    #[test]
    fn quasiquote_splits_literal_and_unquoted_parts() {
        let (ast, _) = build("`(1 ,(+ 1 1) 3)");
        match ast {
            Ast::Quasiquote(QuasiPart::List(parts), _) => {
                assert!(matches!(parts[0], QuasiPart::Literal(_)));
                assert!(matches!(parts[1], QuasiPart::Unquote(_)));
                assert!(matches!(parts[2], QuasiPart::Literal(_)));
            }
            other => panic!("expected Quasiquote with mixed parts, got {other:?}"),
        }
    }

    #[test]
    fn bareword_literals_resolve_to_nil_and_booleans() {
        let (ast, _) = build("nil");
        assert!(matches!(ast, Ast::NilLit(_)));
        let (ast, _) = build("true");
        assert!(matches!(ast, Ast::BoolLit(true, _)));
    }

    #[test]
    fn pathological_nesting_is_rejected_instead_of_overflowing_the_stack() {
        let mut src = String::new();
        for _ in 0..64 {
            src.push_str("(if true ");
        }
        src.push_str("1");
        for _ in 0..64 {
            src.push(')');
        }
        let mut parser = Parser::new(&src);
        let node = parser.parse_sexpr().expect("parse ok");
        let mut interns = Interns::new();
        let mut builder = AstBuilder::with_max_depth(16);
        let err = builder.build_top_level(&mut interns, &node).unwrap_err();
        assert!(matches!(err, CompileError::BadSpecialForm { form, .. } if form == "<nesting>"));
    }
}
