//! Sandboxed evaluation of model-authored extraction functions
//!
//! The extraction API returns JavaScript of the shape
//! `function(document) { ... }`. Instead of handing that string to a host
//! engine, the body is parsed with swc and executed by a closed interpreter
//! over a whitelisted subset: DOM reads against the parsed snapshot, string
//! and number operations, and straight-line control flow. The interpreter has
//! no access to ambient globals, the filesystem or the network, and supports
//! no looping constructs, so execution is bounded by construction.
//!
//! Anything outside the subset is reported as [`JsError::Unsupported`], which
//! the caller classifies as "cannot validate" rather than as a failure.

use std::collections::HashMap;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use swc_common::{sync::Lrc, FileName, SourceMap};
use swc_ecma_ast as ast;
use swc_ecma_ast::EsVersion;
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

use crate::html::Document;

/// Why evaluation stopped without a usable result
#[derive(Debug)]
pub(crate) enum JsError {
    /// The body is not parseable JavaScript
    Syntax,
    /// A runtime failure or an explicit `throw`
    Throw(String),
    /// Valid JavaScript the interpreter cannot faithfully emulate
    Unsupported(String),
}

/// Final result of a successful run
#[derive(Debug, PartialEq)]
pub(crate) enum Completion {
    /// The function returned `null`/`undefined` (or fell off the end)
    Nullish,
    /// Any other return, stringified the way `String(result)` would
    Value(String),
}

/// Execute a function body against the parsed document.
///
/// The document is bound both to `document` and to the declared parameter
/// name, so `function(doc) { return doc... }` works as written.
pub(crate) fn run_function(doc: &Document, param: &str, body: &str) -> Result<Completion, JsError> {
    let script = parse_body(body)?;

    let mut interp = Interp {
        doc: doc.tree(),
        env: HashMap::new(),
    };
    interp.env.insert("document".to_string(), Value::Doc);
    if !param.is_empty() && param != "document" {
        interp.env.insert(param.to_string(), Value::Doc);
    }

    match interp.eval_stmts(&script.body)? {
        Flow::Return(Value::Null) | Flow::Return(Value::Undefined) | Flow::Normal => {
            Ok(Completion::Nullish)
        }
        Flow::Return(value) => Ok(Completion::Value(display(&value))),
    }
}

fn parse_body(body: &str) -> Result<ast::Script, JsError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(Lrc::new(FileName::Anon), body.to_string());
    // The source is a function body, so top-level `return` must parse
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax {
            allow_return_outside_function: true,
            ..Default::default()
        }),
        EsVersion::latest(),
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let script = parser.parse_script().map_err(|_| JsError::Syntax)?;
    if !parser.take_errors().is_empty() {
        return Err(JsError::Syntax);
    }
    Ok(script)
}

/// Runtime value. Element references borrow the parsed document.
#[derive(Debug, Clone)]
enum Value<'a> {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// The document passed into the function
    Doc,
    Node(ElementRef<'a>),
    List(Vec<Value<'a>>),
    Re(JsRegex),
}

#[derive(Debug, Clone)]
struct JsRegex {
    re: Regex,
    global: bool,
    source: String,
    flags: String,
}

enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

fn unsupported<T>(what: impl Into<String>) -> Result<T, JsError> {
    Err(JsError::Unsupported(what.into()))
}

struct Interp<'a> {
    doc: &'a Html,
    env: HashMap<String, Value<'a>>,
}

impl<'a> Interp<'a> {
    fn eval_stmts(&mut self, stmts: &[ast::Stmt]) -> Result<Flow<'a>, JsError> {
        for stmt in stmts {
            if let Flow::Return(value) = self.eval_stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_stmt(&mut self, stmt: &ast::Stmt) -> Result<Flow<'a>, JsError> {
        match stmt {
            ast::Stmt::Decl(ast::Decl::Var(decl)) => {
                for declarator in &decl.decls {
                    let name = match &declarator.name {
                        ast::Pat::Ident(binding) => binding.id.sym.to_string(),
                        _ => return unsupported("destructuring declaration"),
                    };
                    let value = match &declarator.init {
                        Some(init) => self.eval_expr(init)?,
                        None => Value::Undefined,
                    };
                    self.env.insert(name, value);
                }
                Ok(Flow::Normal)
            }
            ast::Stmt::Expr(expr) => {
                self.eval_expr(&expr.expr)?;
                Ok(Flow::Normal)
            }
            ast::Stmt::Return(ret) => {
                let value = match &ret.arg {
                    Some(arg) => self.eval_expr(arg)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            ast::Stmt::If(branch) => {
                if truthy(&self.eval_expr(&branch.test)?) {
                    self.eval_stmt(&branch.cons)
                } else if let Some(alt) = &branch.alt {
                    self.eval_stmt(alt)
                } else {
                    Ok(Flow::Normal)
                }
            }
            ast::Stmt::Block(block) => self.eval_stmts(&block.stmts),
            ast::Stmt::Throw(throw) => {
                let value = self.eval_expr(&throw.arg)?;
                Err(JsError::Throw(display(&value)))
            }
            ast::Stmt::Empty(_) => Ok(Flow::Normal),
            _ => unsupported("statement kind"),
        }
    }

    fn eval_expr(&mut self, expr: &ast::Expr) -> Result<Value<'a>, JsError> {
        match expr {
            ast::Expr::Lit(lit) => self.eval_lit(lit),
            ast::Expr::Ident(ident) => {
                let name = ident.sym.as_ref();
                match name {
                    "undefined" => Ok(Value::Undefined),
                    "NaN" => Ok(Value::Num(f64::NAN)),
                    _ => match self.env.get(name) {
                        Some(value) => Ok(value.clone()),
                        None => Err(JsError::Throw(format!("{name} is not defined"))),
                    },
                }
            }
            ast::Expr::Paren(paren) => self.eval_expr(&paren.expr),
            ast::Expr::Tpl(tpl) => self.eval_template(tpl),
            ast::Expr::Array(arr) => {
                let mut items = Vec::with_capacity(arr.elems.len());
                for elem in &arr.elems {
                    match elem {
                        Some(e) if e.spread.is_none() => items.push(self.eval_expr(&e.expr)?),
                        Some(_) => return unsupported("spread element"),
                        None => items.push(Value::Undefined),
                    }
                }
                Ok(Value::List(items))
            }
            ast::Expr::Unary(unary) => self.eval_unary(unary),
            ast::Expr::Bin(bin) => self.eval_bin(bin),
            ast::Expr::Cond(cond) => {
                if truthy(&self.eval_expr(&cond.test)?) {
                    self.eval_expr(&cond.cons)
                } else {
                    self.eval_expr(&cond.alt)
                }
            }
            ast::Expr::Assign(assign) => self.eval_assign(assign),
            ast::Expr::Member(member) => {
                let obj = self.eval_expr(&member.obj)?;
                self.get_member(&obj, &member.prop)
            }
            ast::Expr::Call(call) => self.eval_call(call),
            ast::Expr::New(new) => self.eval_new(new),
            ast::Expr::Seq(seq) => {
                let mut last = Value::Undefined;
                for e in &seq.exprs {
                    last = self.eval_expr(e)?;
                }
                Ok(last)
            }
            ast::Expr::OptChain(chain) => self.eval_opt_chain(chain),
            _ => unsupported("expression kind"),
        }
    }

    fn eval_lit(&mut self, lit: &ast::Lit) -> Result<Value<'a>, JsError> {
        match lit {
            ast::Lit::Str(s) => Ok(Value::Str(s.value.to_atom_lossy().to_string())),
            ast::Lit::Num(n) => Ok(Value::Num(n.value)),
            ast::Lit::Bool(b) => Ok(Value::Bool(b.value)),
            ast::Lit::Null(_) => Ok(Value::Null),
            ast::Lit::Regex(regex) => {
                compile_js_regex(regex.exp.as_ref(), regex.flags.as_ref()).map(Value::Re)
            }
            _ => unsupported("literal kind"),
        }
    }

    fn eval_template(&mut self, tpl: &ast::Tpl) -> Result<Value<'a>, JsError> {
        let mut out = String::new();
        for (i, quasi) in tpl.quasis.iter().enumerate() {
            match &quasi.cooked {
                Some(cooked) => out.push_str(&cooked.to_atom_lossy()),
                None => out.push_str(quasi.raw.as_ref()),
            }
            if let Some(expr) = tpl.exprs.get(i) {
                out.push_str(&display(&self.eval_expr(expr)?));
            }
        }
        Ok(Value::Str(out))
    }

    fn eval_unary(&mut self, unary: &ast::UnaryExpr) -> Result<Value<'a>, JsError> {
        let arg = self.eval_expr(&unary.arg)?;
        match unary.op {
            ast::UnaryOp::Bang => Ok(Value::Bool(!truthy(&arg))),
            ast::UnaryOp::Minus => Ok(Value::Num(-to_number(&arg))),
            ast::UnaryOp::Plus => Ok(Value::Num(to_number(&arg))),
            ast::UnaryOp::Void => Ok(Value::Undefined),
            ast::UnaryOp::TypeOf => Ok(Value::Str(type_of(&arg).to_string())),
            _ => unsupported("unary operator"),
        }
    }

    fn eval_bin(&mut self, bin: &ast::BinExpr) -> Result<Value<'a>, JsError> {
        // Short-circuit operators decide before touching the right side
        match bin.op {
            ast::BinaryOp::LogicalAnd => {
                let left = self.eval_expr(&bin.left)?;
                return if truthy(&left) {
                    self.eval_expr(&bin.right)
                } else {
                    Ok(left)
                };
            }
            ast::BinaryOp::LogicalOr => {
                let left = self.eval_expr(&bin.left)?;
                return if truthy(&left) {
                    Ok(left)
                } else {
                    self.eval_expr(&bin.right)
                };
            }
            ast::BinaryOp::NullishCoalescing => {
                let left = self.eval_expr(&bin.left)?;
                return if matches!(left, Value::Null | Value::Undefined) {
                    self.eval_expr(&bin.right)
                } else {
                    Ok(left)
                };
            }
            _ => {}
        }

        let left = self.eval_expr(&bin.left)?;
        let right = self.eval_expr(&bin.right)?;
        match bin.op {
            ast::BinaryOp::Add => {
                if is_stringish(&left) || is_stringish(&right) {
                    Ok(Value::Str(format!("{}{}", display(&left), display(&right))))
                } else {
                    Ok(Value::Num(to_number(&left) + to_number(&right)))
                }
            }
            ast::BinaryOp::Sub => Ok(Value::Num(to_number(&left) - to_number(&right))),
            ast::BinaryOp::Mul => Ok(Value::Num(to_number(&left) * to_number(&right))),
            ast::BinaryOp::Div => Ok(Value::Num(to_number(&left) / to_number(&right))),
            ast::BinaryOp::Mod => Ok(Value::Num(to_number(&left) % to_number(&right))),
            ast::BinaryOp::EqEqEq => Ok(Value::Bool(strict_eq(&left, &right))),
            ast::BinaryOp::NotEqEq => Ok(Value::Bool(!strict_eq(&left, &right))),
            ast::BinaryOp::EqEq => Ok(Value::Bool(loose_eq(&left, &right))),
            ast::BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(&left, &right))),
            ast::BinaryOp::Lt | ast::BinaryOp::LtEq | ast::BinaryOp::Gt | ast::BinaryOp::GtEq => {
                Ok(Value::Bool(compare(bin.op, &left, &right)))
            }
            _ => unsupported("binary operator"),
        }
    }

    fn eval_assign(&mut self, assign: &ast::AssignExpr) -> Result<Value<'a>, JsError> {
        let name = match &assign.left {
            ast::AssignTarget::Simple(ast::SimpleAssignTarget::Ident(binding)) => {
                binding.id.sym.to_string()
            }
            _ => return unsupported("assignment target"),
        };
        let right = self.eval_expr(&assign.right)?;
        let value = match assign.op {
            ast::AssignOp::Assign => right,
            ast::AssignOp::AddAssign => {
                let current = self.env.get(&name).cloned().unwrap_or(Value::Undefined);
                if is_stringish(&current) || is_stringish(&right) {
                    Value::Str(format!("{}{}", display(&current), display(&right)))
                } else {
                    Value::Num(to_number(&current) + to_number(&right))
                }
            }
            _ => return unsupported("compound assignment"),
        };
        self.env.insert(name, value.clone());
        Ok(value)
    }

    fn eval_new(&mut self, new: &ast::NewExpr) -> Result<Value<'a>, JsError> {
        let callee = match &*new.callee {
            ast::Expr::Ident(ident) => ident.sym.as_ref().to_string(),
            _ => return unsupported("constructor"),
        };
        if callee != "RegExp" {
            return unsupported(format!("new {callee}"));
        }
        let args = match &new.args {
            Some(args) => self.eval_args(args)?,
            None => Vec::new(),
        };
        let source = args.first().map(display).unwrap_or_default();
        let flags = args.get(1).map(display).unwrap_or_default();
        compile_js_regex(&source, &flags).map(Value::Re)
    }

    fn eval_opt_chain(&mut self, chain: &ast::OptChainExpr) -> Result<Value<'a>, JsError> {
        match &*chain.base {
            ast::OptChainBase::Member(member) => {
                let obj = self.eval_expr(&member.obj)?;
                if matches!(obj, Value::Null | Value::Undefined) {
                    return Ok(Value::Undefined);
                }
                self.get_member(&obj, &member.prop)
            }
            ast::OptChainBase::Call(call) => {
                let (obj_expr, prop) = match &*call.callee {
                    ast::Expr::Member(member) => (&member.obj, &member.prop),
                    ast::Expr::OptChain(inner) => match &*inner.base {
                        ast::OptChainBase::Member(member) => (&member.obj, &member.prop),
                        ast::OptChainBase::Call(_) => return unsupported("chained call"),
                    },
                    _ => return unsupported("optional call target"),
                };
                let obj = self.eval_expr(obj_expr)?;
                if matches!(obj, Value::Null | Value::Undefined) {
                    return Ok(Value::Undefined);
                }
                let name = self.prop_to_name(prop)?;
                let args = self.eval_args(&call.args)?;
                self.call_method(&obj, &name, args)
            }
        }
    }

    fn eval_call(&mut self, call: &ast::CallExpr) -> Result<Value<'a>, JsError> {
        let callee = match &call.callee {
            ast::Callee::Expr(expr) => expr,
            _ => return unsupported("call kind"),
        };
        match &**callee {
            ast::Expr::Member(member) => {
                let obj = self.eval_expr(&member.obj)?;
                let name = self.prop_to_name(&member.prop)?;
                let args = self.eval_args(&call.args)?;
                self.call_method(&obj, &name, args)
            }
            ast::Expr::Ident(ident) => {
                let args = self.eval_args(&call.args)?;
                self.call_global(ident.sym.as_ref(), args)
            }
            ast::Expr::Paren(paren) => {
                if let ast::Expr::Member(member) = &*paren.expr {
                    let obj = self.eval_expr(&member.obj)?;
                    let name = self.prop_to_name(&member.prop)?;
                    let args = self.eval_args(&call.args)?;
                    self.call_method(&obj, &name, args)
                } else {
                    unsupported("call target")
                }
            }
            _ => unsupported("call target"),
        }
    }

    fn eval_args(&mut self, args: &[ast::ExprOrSpread]) -> Result<Vec<Value<'a>>, JsError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if arg.spread.is_some() {
                return unsupported("spread argument");
            }
            out.push(self.eval_expr(&arg.expr)?);
        }
        Ok(out)
    }

    fn prop_to_name(&mut self, prop: &ast::MemberProp) -> Result<String, JsError> {
        match prop {
            ast::MemberProp::Ident(ident) => Ok(ident.sym.to_string()),
            ast::MemberProp::Computed(computed) => {
                let value = self.eval_expr(&computed.expr)?;
                Ok(display(&value))
            }
            ast::MemberProp::PrivateName(_) => unsupported("private member"),
        }
    }

    fn get_member(&mut self, obj: &Value<'a>, prop: &ast::MemberProp) -> Result<Value<'a>, JsError> {
        // Numeric computed access is indexing, everything else a named property
        if let ast::MemberProp::Computed(computed) = prop {
            let key = self.eval_expr(&computed.expr)?;
            if let Value::Num(index) = key {
                return self.index(obj, index);
            }
            return self.get_prop(obj, &display(&key));
        }
        let name = self.prop_to_name(prop)?;
        self.get_prop(obj, &name)
    }

    fn index(&self, obj: &Value<'a>, index: f64) -> Result<Value<'a>, JsError> {
        if index < 0.0 || index.fract() != 0.0 {
            return Ok(Value::Undefined);
        }
        let index = index as usize;
        match obj {
            Value::List(items) => Ok(items.get(index).cloned().unwrap_or(Value::Undefined)),
            Value::Str(s) => Ok(s
                .chars()
                .nth(index)
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or(Value::Undefined)),
            Value::Null | Value::Undefined => Err(JsError::Throw(format!(
                "Cannot read properties of {} (reading '{index}')",
                display(obj)
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn get_prop(&self, obj: &Value<'a>, name: &str) -> Result<Value<'a>, JsError> {
        match obj {
            Value::Doc => match name {
                "documentElement" => Ok(Value::Node(self.doc.root_element())),
                "body" => Ok(self
                    .select_first("body")?
                    .map(Value::Node)
                    .unwrap_or(Value::Null)),
                _ => unsupported(format!("document.{name}")),
            },
            Value::Node(el) => match name {
                "textContent" | "innerText" => Ok(Value::Str(el.text().collect())),
                "innerHTML" => Ok(Value::Str(el.inner_html())),
                "outerHTML" => Ok(Value::Str(el.html())),
                "tagName" => Ok(Value::Str(el.value().name().to_uppercase())),
                "id" => Ok(Value::Str(el.value().attr("id").unwrap_or("").to_string())),
                "className" => Ok(Value::Str(el.value().attr("class").unwrap_or("").to_string())),
                "src" | "href" | "alt" | "title" | "value" | "name" | "content" => {
                    Ok(Value::Str(el.value().attr(name).unwrap_or("").to_string()))
                }
                "children" => Ok(Value::List(
                    el.children()
                        .filter_map(ElementRef::wrap)
                        .map(Value::Node)
                        .collect(),
                )),
                "firstElementChild" => Ok(el
                    .children()
                    .filter_map(ElementRef::wrap)
                    .next()
                    .map(Value::Node)
                    .unwrap_or(Value::Null)),
                "parentElement" => Ok(el
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(Value::Node)
                    .unwrap_or(Value::Null)),
                _ => unsupported(format!("element.{name}")),
            },
            Value::Str(s) => match name {
                "length" => Ok(Value::Num(s.chars().count() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::List(items) => match name {
                "length" => Ok(Value::Num(items.len() as f64)),
                _ => Ok(Value::Undefined),
            },
            Value::Null | Value::Undefined => Err(JsError::Throw(format!(
                "Cannot read properties of {} (reading '{name}')",
                display(obj)
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn select_first(&self, selector: &str) -> Result<Option<ElementRef<'a>>, JsError> {
        let parsed = match Selector::parse(selector) {
            Ok(parsed) => parsed,
            Err(_) => return unsupported(format!("selector `{selector}`")),
        };
        Ok(self.doc.select(&parsed).next())
    }

    fn call_method(
        &mut self,
        obj: &Value<'a>,
        name: &str,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, JsError> {
        match obj {
            Value::Doc => self.dom_method(None, name, args),
            Value::Node(el) => self.dom_method(Some(*el), name, args),
            Value::Str(s) => string_method(s, name, args),
            Value::List(items) => list_method(items, name, args),
            Value::Num(n) => match name {
                "toFixed" => {
                    let digits = args.first().map(to_number).unwrap_or(0.0).max(0.0) as usize;
                    Ok(Value::Str(format!("{n:.digits$}")))
                }
                "toString" => Ok(Value::Str(format_number(*n))),
                _ => unsupported(format!("number method {name}")),
            },
            Value::Re(regex) => match name {
                "test" => {
                    let input = args.first().map(display).unwrap_or_default();
                    Ok(Value::Bool(regex.re.is_match(&input)))
                }
                _ => unsupported(format!("regex method {name}")),
            },
            Value::Null | Value::Undefined => Err(JsError::Throw(format!(
                "Cannot read properties of {} (reading '{name}')",
                display(obj)
            ))),
            _ => unsupported(format!("method {name}")),
        }
    }

    fn dom_method(
        &self,
        scope: Option<ElementRef<'a>>,
        name: &str,
        args: Vec<Value<'a>>,
    ) -> Result<Value<'a>, JsError> {
        match name {
            "querySelector" => {
                let selector = args.first().map(display).unwrap_or_default();
                let parsed = match Selector::parse(&selector) {
                    Ok(parsed) => parsed,
                    Err(_) => return unsupported(format!("selector `{selector}`")),
                };
                let found = match scope {
                    Some(el) => el.select(&parsed).next(),
                    None => self.doc.select(&parsed).next(),
                };
                Ok(found.map(Value::Node).unwrap_or(Value::Null))
            }
            "querySelectorAll" => {
                let selector = args.first().map(display).unwrap_or_default();
                let parsed = match Selector::parse(&selector) {
                    Ok(parsed) => parsed,
                    Err(_) => return unsupported(format!("selector `{selector}`")),
                };
                let found: Vec<Value<'a>> = match scope {
                    Some(el) => el.select(&parsed).map(Value::Node).collect(),
                    None => self.doc.select(&parsed).map(Value::Node).collect(),
                };
                Ok(Value::List(found))
            }
            "getElementById" if scope.is_none() => {
                let id = args.first().map(display).unwrap_or_default();
                if id.contains('"') || id.contains('\\') {
                    return unsupported("getElementById argument");
                }
                let parsed = match Selector::parse(&format!("[id=\"{id}\"]")) {
                    Ok(parsed) => parsed,
                    Err(_) => return unsupported("getElementById argument"),
                };
                Ok(self
                    .doc
                    .select(&parsed)
                    .next()
                    .map(Value::Node)
                    .unwrap_or(Value::Null))
            }
            "getAttribute" => match scope {
                Some(el) => {
                    let attr = args.first().map(display).unwrap_or_default();
                    Ok(el
                        .value()
                        .attr(&attr)
                        .map(|v| Value::Str(v.to_string()))
                        .unwrap_or(Value::Null))
                }
                None => unsupported("document.getAttribute"),
            },
            "hasAttribute" => match scope {
                Some(el) => {
                    let attr = args.first().map(display).unwrap_or_default();
                    Ok(Value::Bool(el.value().attr(&attr).is_some()))
                }
                None => unsupported("document.hasAttribute"),
            },
            _ => unsupported(format!("DOM method {name}")),
        }
    }

    fn call_global(&mut self, name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, JsError> {
        let first = args.into_iter().next();
        match name {
            "String" => Ok(Value::Str(first.map(|v| display(&v)).unwrap_or_default())),
            "Number" => Ok(Value::Num(first.map(|v| to_number(&v)).unwrap_or(0.0))),
            "Boolean" => Ok(Value::Bool(first.map(|v| truthy(&v)).unwrap_or(false))),
            "isNaN" => Ok(Value::Bool(
                first.map(|v| to_number(&v)).unwrap_or(f64::NAN).is_nan(),
            )),
            "parseFloat" => {
                let text = first.map(|v| display(&v)).unwrap_or_default();
                Ok(Value::Num(parse_leading_float(&text)))
            }
            "parseInt" => {
                let text = first.map(|v| display(&v)).unwrap_or_default();
                Ok(Value::Num(parse_leading_int(&text)))
            }
            _ => unsupported(format!("global {name}")),
        }
    }
}

/// Longest string the sandbox will build, matching the engine limit JS code
/// can observe as a thrown `RangeError`
const MAX_STRING_LEN: usize = 1 << 30;

fn string_method<'a>(s: &str, name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, JsError> {
    let arg_str = |i: usize| args.get(i).map(display).unwrap_or_default();
    match name {
        "trim" => Ok(Value::Str(s.trim().to_string())),
        "trimStart" => Ok(Value::Str(s.trim_start().to_string())),
        "trimEnd" => Ok(Value::Str(s.trim_end().to_string())),
        "toLowerCase" => Ok(Value::Str(s.to_lowercase())),
        "toUpperCase" => Ok(Value::Str(s.to_uppercase())),
        "includes" => Ok(Value::Bool(s.contains(&arg_str(0)))),
        "startsWith" => Ok(Value::Bool(s.starts_with(&arg_str(0)))),
        "endsWith" => Ok(Value::Bool(s.ends_with(&arg_str(0)))),
        "indexOf" => Ok(Value::Num(match s.find(&arg_str(0)) {
            Some(byte_idx) => s[..byte_idx].chars().count() as f64,
            None => -1.0,
        })),
        "charAt" => {
            let index = args.first().map(to_number).unwrap_or(0.0);
            // ToInteger: NaN becomes 0, fractions truncate toward zero
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            let ch = if index >= 0.0 {
                s.chars().nth(index as usize)
            } else {
                None
            };
            Ok(Value::Str(ch.map(String::from).unwrap_or_default()))
        }
        "slice" => {
            let len = s.chars().count() as i64;
            let start = resolve_slice_index(args.first().map(to_number), 0, len);
            let end = resolve_slice_index(args.get(1).map(to_number), len, len);
            if start >= end {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(
                s.chars()
                    .skip(start as usize)
                    .take((end - start) as usize)
                    .collect(),
            ))
        }
        "substring" => {
            let len = s.chars().count() as i64;
            let mut start = (args.first().map(to_number).unwrap_or(0.0).max(0.0) as i64).min(len);
            let mut end = match args.get(1) {
                Some(v) => (to_number(v).max(0.0) as i64).min(len),
                None => len,
            };
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            Ok(Value::Str(
                s.chars()
                    .skip(start as usize)
                    .take((end - start) as usize)
                    .collect(),
            ))
        }
        "split" => match args.first() {
            None => Ok(Value::List(vec![Value::Str(s.to_string())])),
            Some(Value::Re(regex)) => Ok(Value::List(
                regex
                    .re
                    .split(s)
                    .map(|part| Value::Str(part.to_string()))
                    .collect(),
            )),
            Some(sep) => {
                let sep = display(sep);
                if sep.is_empty() {
                    Ok(Value::List(
                        s.chars().map(|c| Value::Str(c.to_string())).collect(),
                    ))
                } else {
                    Ok(Value::List(
                        s.split(&sep).map(|part| Value::Str(part.to_string())).collect(),
                    ))
                }
            }
        },
        "replace" => {
            let replacement = match args.get(1) {
                Some(Value::Str(r)) => r.clone(),
                Some(Value::Num(_)) | Some(Value::Bool(_)) => arg_str(1),
                Some(_) => return unsupported("replace callback"),
                None => "undefined".to_string(),
            };
            match args.first() {
                Some(Value::Re(regex)) => {
                    let out = if regex.global {
                        regex.re.replace_all(s, replacement.as_str())
                    } else {
                        regex.re.replace(s, replacement.as_str())
                    };
                    Ok(Value::Str(out.into_owned()))
                }
                Some(pattern) => Ok(Value::Str(s.replacen(&display(pattern), &replacement, 1))),
                None => Ok(Value::Str(s.to_string())),
            }
        }
        "replaceAll" => {
            let replacement = match args.get(1) {
                Some(Value::Str(r)) => r.clone(),
                Some(Value::Num(_)) | Some(Value::Bool(_)) => arg_str(1),
                Some(_) => return unsupported("replace callback"),
                None => "undefined".to_string(),
            };
            match args.first() {
                Some(Value::Re(regex)) => {
                    if !regex.global {
                        return Err(JsError::Throw(
                            "replaceAll must be called with a global RegExp".to_string(),
                        ));
                    }
                    Ok(Value::Str(
                        regex.re.replace_all(s, replacement.as_str()).into_owned(),
                    ))
                }
                Some(pattern) => Ok(Value::Str(s.replace(&display(pattern), &replacement))),
                None => Ok(Value::Str(s.to_string())),
            }
        }
        "match" => {
            let regex = match args.first() {
                Some(Value::Re(regex)) => regex.clone(),
                Some(other) => compile_js_regex(&display(other), "")?,
                None => return Ok(Value::Null),
            };
            if regex.global {
                let matches: Vec<Value<'a>> = regex
                    .re
                    .find_iter(s)
                    .map(|m| Value::Str(m.as_str().to_string()))
                    .collect();
                if matches.is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(Value::List(matches))
                }
            } else {
                match regex.re.captures(s) {
                    Some(caps) => Ok(Value::List(
                        (0..caps.len())
                            .map(|i| {
                                caps.get(i)
                                    .map(|m| Value::Str(m.as_str().to_string()))
                                    .unwrap_or(Value::Undefined)
                            })
                            .collect(),
                    )),
                    None => Ok(Value::Null),
                }
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for arg in &args {
                out.push_str(&display(arg));
            }
            Ok(Value::Str(out))
        }
        "repeat" => {
            let count = args.first().map(to_number).unwrap_or(0.0);
            if count < 0.0 || !count.is_finite() {
                return Err(JsError::Throw("Invalid count value".to_string()));
            }
            let count = count as usize;
            // Engines refuse strings past about 2^30 code units; without the
            // cap a large count would allocate gigabytes inside the sandbox
            if s.len().saturating_mul(count) > MAX_STRING_LEN {
                return Err(JsError::Throw("Invalid string length".to_string()));
            }
            Ok(Value::Str(s.repeat(count)))
        }
        _ => unsupported(format!("string method {name}")),
    }
}

fn list_method<'a>(items: &[Value<'a>], name: &str, args: Vec<Value<'a>>) -> Result<Value<'a>, JsError> {
    match name {
        "item" => {
            let index = args.first().map(to_number).unwrap_or(0.0);
            if index < 0.0 || index.fract() != 0.0 {
                return Ok(Value::Null);
            }
            Ok(items.get(index as usize).cloned().unwrap_or(Value::Null))
        }
        "join" => {
            let sep = match args.first() {
                Some(v) => display(v),
                None => ",".to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Null | Value::Undefined => String::new(),
                    other => display(other),
                })
                .collect();
            Ok(Value::Str(parts.join(&sep)))
        }
        "includes" => {
            let needle = args.into_iter().next().unwrap_or(Value::Undefined);
            Ok(Value::Bool(items.iter().any(|item| strict_eq(item, &needle))))
        }
        "indexOf" => {
            let needle = args.into_iter().next().unwrap_or(Value::Undefined);
            Ok(Value::Num(
                items
                    .iter()
                    .position(|item| strict_eq(item, &needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            ))
        }
        // Callback-taking methods would need closures the sandbox does not model
        _ => unsupported(format!("array method {name}")),
    }
}

fn compile_js_regex(source: &str, flags: &str) -> Result<JsRegex, JsError> {
    let mut inline = String::new();
    let mut global = false;
    for flag in flags.chars() {
        match flag {
            'g' => global = true,
            'i' | 'm' | 's' => inline.push(flag),
            // sticky/unicode flags have no equivalent worth modelling
            _ => {}
        }
    }
    let pattern = if inline.is_empty() {
        source.to_string()
    } else {
        format!("(?{inline}){source}")
    };
    match Regex::new(&pattern) {
        Ok(re) => Ok(JsRegex {
            re,
            global,
            source: source.to_string(),
            flags: flags.to_string(),
        }),
        Err(_) => Err(JsError::Throw(format!(
            "Invalid regular expression: /{source}/"
        ))),
    }
}

fn resolve_slice_index(value: Option<f64>, default: i64, len: i64) -> i64 {
    match value {
        None => default,
        Some(v) if v.is_nan() => 0,
        Some(v) if v < 0.0 => (len + v as i64).max(0),
        Some(v) => (v as i64).min(len),
    }
}

fn parse_leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    trimmed[..end].parse().unwrap_or(f64::NAN)
}

fn parse_leading_int(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    trimmed[..end].parse::<i64>().map(|n| n as f64).unwrap_or(f64::NAN)
}

fn truthy(value: &Value<'_>) -> bool {
    match value {
        Value::Undefined | Value::Null => false,
        Value::Bool(b) => *b,
        Value::Num(n) => *n != 0.0 && !n.is_nan(),
        Value::Str(s) => !s.is_empty(),
        _ => true,
    }
}

fn is_stringish(value: &Value<'_>) -> bool {
    matches!(
        value,
        Value::Str(_) | Value::Node(_) | Value::List(_) | Value::Doc | Value::Re(_)
    )
}

fn type_of(value: &Value<'_>) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Bool(_) => "boolean",
        Value::Num(_) => "number",
        Value::Str(_) => "string",
        _ => "object",
    }
}

fn strict_eq(a: &Value<'_>, b: &Value<'_>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Num(x), Value::Num(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Node(x), Value::Node(y)) => x.id() == y.id(),
        _ => false,
    }
}

fn loose_eq(a: &Value<'_>, b: &Value<'_>) -> bool {
    if strict_eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
        (Value::Num(_) | Value::Str(_) | Value::Bool(_), Value::Num(_) | Value::Str(_) | Value::Bool(_)) => {
            to_number(a) == to_number(b)
        }
        _ => false,
    }
}

fn compare(op: ast::BinaryOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    if let (Value::Str(l), Value::Str(r)) = (left, right) {
        return match op {
            ast::BinaryOp::Lt => l < r,
            ast::BinaryOp::LtEq => l <= r,
            ast::BinaryOp::Gt => l > r,
            ast::BinaryOp::GtEq => l >= r,
            _ => false,
        };
    }
    let l = to_number(left);
    let r = to_number(right);
    if l.is_nan() || r.is_nan() {
        return false;
    }
    match op {
        ast::BinaryOp::Lt => l < r,
        ast::BinaryOp::LtEq => l <= r,
        ast::BinaryOp::Gt => l > r,
        ast::BinaryOp::GtEq => l >= r,
        _ => false,
    }
}

fn to_number(value: &Value<'_>) -> f64 {
    match value {
        Value::Num(n) => *n,
        Value::Bool(true) => 1.0,
        Value::Bool(false) | Value::Null => 0.0,
        Value::Undefined => f64::NAN,
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        _ => f64::NAN,
    }
}

/// Stringify the way `String(value)` would
fn display(value: &Value<'_>) -> String {
    match value {
        Value::Undefined => "undefined".to_string(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Num(n) => format_number(*n),
        Value::Str(s) => s.clone(),
        Value::Doc => "[object Document]".to_string(),
        Value::Node(_) => "[object Element]".to_string(),
        Value::List(items) => items
            .iter()
            .map(|item| match item {
                Value::Null | Value::Undefined => String::new(),
                other => display(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Re(regex) => format!("/{}/{}", regex.source, regex.flags),
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(html: &str, body: &str) -> Result<Completion, JsError> {
        let doc = Document::parse(html);
        run_function(&doc, "document", body)
    }

    #[test]
    fn number_formatting_matches_js() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn returns_trimmed_dom_text() {
        let result = run(
            "<h1>  Title  </h1>",
            "return document.querySelector('h1').textContent.trim();",
        );
        assert_eq!(result.unwrap(), Completion::Value("Title".to_string()));
    }

    #[test]
    fn missing_element_member_access_throws() {
        let result = run("<p>x</p>", "return document.querySelector('h1').textContent;");
        assert!(matches!(result, Err(JsError::Throw(_))));
    }

    #[test]
    fn optional_chaining_short_circuits() {
        let result = run(
            "<p>x</p>",
            "return document.querySelector('h1')?.textContent;",
        );
        assert_eq!(result.unwrap(), Completion::Nullish);
    }

    #[test]
    fn conditionals_and_arithmetic() {
        let body = r#"
            const el = document.querySelector('.price');
            if (!el) { return null; }
            const n = parseFloat(el.textContent.replace('$', ''));
            return n > 10 ? n * 2 : n;
        "#;
        let result = run("<span class='price'>$19.99</span>", body);
        assert_eq!(result.unwrap(), Completion::Value("39.98".to_string()));
    }

    #[test]
    fn regex_literals_and_match() {
        let body = r#"
            const text = document.querySelector('div').textContent;
            const m = text.match(/(\d+)/);
            return m ? m[1] : null;
        "#;
        let result = run("<div>Price: 42</div>", body);
        assert_eq!(result.unwrap(), Completion::Value("42".to_string()));
    }

    #[test]
    fn template_literals() {
        let body = r#"
            const title = document.querySelector('h1').textContent;
            return `title=${title}`;
        "#;
        let result = run("<h1>Hi</h1>", body);
        assert_eq!(result.unwrap(), Completion::Value("title=Hi".to_string()));
    }

    #[test]
    fn query_selector_all_with_join() {
        let body = r#"
            const names = document.querySelectorAll('.name');
            return names.length;
        "#;
        let result = run("<i class='name'>a</i><i class='name'>b</i>", body);
        assert_eq!(result.unwrap(), Completion::Value("2".to_string()));
    }

    #[test]
    fn loops_are_unsupported_not_failures() {
        let result = run("<p>x</p>", "for (let i = 0; i < 3; i++) {} return 1;");
        assert!(matches!(result, Err(JsError::Unsupported(_))));
    }

    #[test]
    fn callbacks_are_unsupported() {
        let result = run(
            "<i class='n'>a</i>",
            "return document.querySelectorAll('.n').map(function(e) { return e; });",
        );
        assert!(matches!(result, Err(JsError::Unsupported(_))));
    }

    #[test]
    fn thrown_values_surface_as_throw() {
        let result = run("<p>x</p>", "throw 'nope';");
        assert!(matches!(result, Err(JsError::Throw(m)) if m == "nope"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        let result = run("<p>x</p>", "return {{{");
        assert!(matches!(result, Err(JsError::Syntax)));
    }

    #[test]
    fn getattribute_and_nullish_default() {
        let body = r#"
            const link = document.querySelector('a');
            return link.getAttribute('data-x') ?? link.getAttribute('href');
        "#;
        let result = run("<a href='/p/1'>x</a>", body);
        assert_eq!(result.unwrap(), Completion::Value("/p/1".to_string()));
    }

    #[test]
    fn falling_off_the_end_is_nullish() {
        let result = run("<p>x</p>", "const a = 1;");
        assert_eq!(result.unwrap(), Completion::Nullish);
    }

    #[test]
    fn bare_top_level_return_parses() {
        // Function bodies arrive without their enclosing function
        let result = run("<p>x</p>", "return 'ab';");
        assert_eq!(result.unwrap(), Completion::Value("ab".to_string()));

        let result = run("<p>x</p>", "return null;");
        assert_eq!(result.unwrap(), Completion::Nullish);
    }

    #[test]
    fn repeat_is_capped_like_an_engine() {
        let result = run("<p>x</p>", "return 'ab'.repeat(1000);");
        assert!(matches!(result.unwrap(), Completion::Value(s) if s.len() == 2000));

        let result = run("<p>x</p>", "return 'ab'.repeat(2e9);");
        assert!(matches!(result, Err(JsError::Throw(m)) if m == "Invalid string length"));

        let result = run("<p>x</p>", "return 'ab'.repeat(-1);");
        assert!(matches!(result, Err(JsError::Throw(_))));
    }

    #[test]
    fn char_at_truncates_fractional_indices() {
        let result = run("<p>x</p>", "return 'abc'.charAt(1.5);");
        assert_eq!(result.unwrap(), Completion::Value("b".to_string()));

        let result = run("<p>x</p>", "return 'abc'.charAt(-1);");
        assert_eq!(result.unwrap(), Completion::Value(String::new()));
    }
}
