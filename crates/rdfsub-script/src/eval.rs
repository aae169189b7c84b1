//! Tree-walking evaluator.

use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::{Duration, Instant},
};

use rdfsub_core::term::Term;

use crate::{
  access::{AccessScope, Feature},
  error::{EvalError, Result},
  library::{Function, Library, in_namespace},
  parse::Expr,
  value::Value,
};

const MAX_CALL_DEPTH: usize = 64;
/// Bound on nested evaluation across all active calls; keeps the native
/// stack of the evaluating thread well clear of overflow.
const MAX_EVAL_DEPTH: usize = 256;
const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Cooperative cancellation flag, checked before every evaluation step.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
  pub fn new() -> Self { Self::default() }

  pub fn trigger(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn is_triggered(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

/// Call `name` from `library` with `args`.
///
/// The namespace of `name` becomes the caller's own: calls that leave it need
/// [`Feature::LinkedFunction`].
pub fn call(
  library: &Library,
  scope: &AccessScope,
  interrupt: &Interrupt,
  name: &str,
  args: Vec<Value>,
) -> Result<Value> {
  let mut machine = Machine {
    library,
    scope,
    interrupt,
    namespace: name,
    local: HashMap::new(),
    depth: 0,
    nesting: 0,
  };
  machine.call_function(name, args)
}

type Env = Vec<(String, Value)>;

struct Machine<'a> {
  library:   &'a Library,
  scope:     &'a AccessScope,
  interrupt: &'a Interrupt,
  namespace: &'a str,
  /// Functions defined at run time by this invocation.
  local:     HashMap<String, Arc<Function>>,
  depth:     usize,
  /// Expressions currently being evaluated, counted across calls.
  nesting:   usize,
}

impl Machine<'_> {
  fn require(&self, feature: Feature) -> Result<()> {
    if self.scope.permits(feature) {
      Ok(())
    } else {
      Err(EvalError::SecurityViolation { feature })
    }
  }

  fn check_interrupt(&self) -> Result<()> {
    if self.interrupt.is_triggered() { Err(EvalError::Interrupted) } else { Ok(()) }
  }

  fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
    if !in_namespace(name, self.namespace) {
      self.require(Feature::LinkedFunction)?;
    }
    let function = self
      .local
      .get(name)
      .cloned()
      .or_else(|| self.library.get(name))
      .ok_or_else(|| EvalError::UnknownFunction(name.to_owned()))?;
    if function.params.len() != args.len() {
      return Err(EvalError::Arity {
        function: name.to_owned(),
        expected: function.params.len(),
        found:    args.len(),
      });
    }
    if self.depth >= MAX_CALL_DEPTH {
      return Err(EvalError::DepthExceeded(MAX_CALL_DEPTH));
    }

    self.depth += 1;
    let mut env: Env = function.params.iter().cloned().zip(args).collect();
    let result = self.eval_body(&function.body, &mut env);
    self.depth -= 1;
    result
  }

  fn eval_body(&mut self, body: &[Expr], env: &mut Env) -> Result<Value> {
    let mut last = Value::Unit;
    for expr in body {
      last = self.eval(expr, env)?;
    }
    Ok(last)
  }

  fn eval(&mut self, expr: &Expr, env: &mut Env) -> Result<Value> {
    self.check_interrupt()?;
    if self.nesting >= MAX_EVAL_DEPTH {
      return Err(EvalError::DepthExceeded(MAX_EVAL_DEPTH));
    }
    self.nesting += 1;
    let result = self.step(expr, env);
    self.nesting -= 1;
    result
  }

  fn step(&mut self, expr: &Expr, env: &mut Env) -> Result<Value> {
    match expr {
      Expr::Bool(b) => Ok(Value::Bool(*b)),
      Expr::Int(n) => Ok(Value::Int(*n)),
      Expr::Str(s) => Ok(Value::Str(s.clone())),
      Expr::Iri(iri) => Ok(Value::Term(Term::iri(iri))),
      Expr::Symbol(name) => env
        .iter()
        .rev()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| EvalError::Unbound(name.clone())),
      Expr::List(items) => match items.split_first() {
        None => Ok(Value::List(Vec::new())),
        Some((Expr::Symbol(op), args)) => self.form(op, args, env),
        Some((Expr::Iri(name), args)) => {
          let args = self.eval_all(args, env)?;
          self.call_function(name, args)
        }
        Some((head, _)) => Err(EvalError::Type(format!("cannot call {head:?}"))),
      },
    }
  }

  fn eval_all(&mut self, exprs: &[Expr], env: &mut Env) -> Result<Vec<Value>> {
    exprs.iter().map(|e| self.eval(e, env)).collect()
  }

  fn eval_bool(&mut self, expr: &Expr, env: &mut Env) -> Result<bool> {
    let value = self.eval(expr, env)?;
    value
      .as_bool()
      .ok_or_else(|| EvalError::Type(format!("expected boolean, got {}", value.type_name())))
  }

  fn eval_int(&mut self, expr: &Expr, env: &mut Env) -> Result<i64> {
    match self.eval(expr, env)? {
      Value::Int(n) => Ok(n),
      other => Err(EvalError::Type(format!("expected integer, got {}", other.type_name()))),
    }
  }

  fn eval_list(&mut self, expr: &Expr, env: &mut Env) -> Result<Vec<Value>> {
    match self.eval(expr, env)? {
      Value::List(items) => Ok(items),
      other => Err(EvalError::Type(format!("expected list, got {}", other.type_name()))),
    }
  }

  // ─── Special forms and primitives ────────────────────────────────────────

  fn form(&mut self, op: &str, args: &[Expr], env: &mut Env) -> Result<Value> {
    let arity = |expected: usize| {
      if args.len() == expected {
        Ok(())
      } else {
        Err(EvalError::Arity { function: op.to_owned(), expected, found: args.len() })
      }
    };

    match op {
      "function" => {
        self.require(Feature::FunctionDefinition)?;
        let function = Function::from_form(args)?;
        self.local.insert(function.name.clone(), Arc::new(function));
        Ok(Value::Unit)
      }
      "call" => {
        let Some((target, rest)) = args.split_first() else {
          return Err(EvalError::Arity { function: op.to_owned(), expected: 1, found: 0 });
        };
        let name = match self.eval(target, env)? {
          Value::Term(Term::Iri(iri)) => iri,
          other => return Err(EvalError::Type(format!("cannot call a {}", other.type_name()))),
        };
        let rest = self.eval_all(rest, env)?;
        self.call_function(&name, rest)
      }
      "update" => {
        self.require(Feature::Update)?;
        Err(EvalError::Unsupported("update: no graph store is attached to this context"))
      }
      "read" => {
        self.require(Feature::ReadWrite)?;
        Err(EvalError::Unsupported("read: no resolver is attached to this context"))
      }
      "if" => {
        arity(3)?;
        if self.eval_bool(&args[0], env)? {
          self.eval(&args[1], env)
        } else {
          self.eval(&args[2], env)
        }
      }
      "let" => {
        let Some((Expr::List(bindings), body)) = args.split_first() else {
          return Err(EvalError::Type("let expects a binding list".into()));
        };
        let mark = env.len();
        for binding in bindings {
          let Expr::List(pair) = binding else {
            return Err(EvalError::Type("let binding must be (name expr)".into()));
          };
          let [Expr::Symbol(name), value] = pair.as_slice() else {
            return Err(EvalError::Type("let binding must be (name expr)".into()));
          };
          let value = self.eval(value, env)?;
          env.push((name.clone(), value));
        }
        let result = self.eval_body(body, env);
        env.truncate(mark);
        result
      }
      "and" => {
        for a in args {
          if !self.eval_bool(a, env)? {
            return Ok(Value::Bool(false));
          }
        }
        Ok(Value::Bool(true))
      }
      "or" => {
        for a in args {
          if self.eval_bool(a, env)? {
            return Ok(Value::Bool(true));
          }
        }
        Ok(Value::Bool(false))
      }
      "not" => {
        arity(1)?;
        Ok(Value::Bool(!self.eval_bool(&args[0], env)?))
      }
      "=" => {
        arity(2)?;
        let a = self.eval(&args[0], env)?;
        let b = self.eval(&args[1], env)?;
        Ok(Value::Bool(a.loosely_equals(&b)))
      }
      "<" | ">" => {
        arity(2)?;
        let a = self.eval_int(&args[0], env)?;
        let b = self.eval_int(&args[1], env)?;
        Ok(Value::Bool(if op == "<" { a < b } else { a > b }))
      }
      "+" => {
        let mut sum: i64 = 0;
        for a in args {
          let n = self.eval_int(a, env)?;
          sum = sum.checked_add(n).ok_or_else(|| EvalError::Type("integer overflow".into()))?;
        }
        Ok(Value::Int(sum))
      }
      "-" => {
        arity(2)?;
        let a = self.eval_int(&args[0], env)?;
        let b = self.eval_int(&args[1], env)?;
        a.checked_sub(b)
          .map(Value::Int)
          .ok_or_else(|| EvalError::Type("integer overflow".into()))
      }
      "list" => Ok(Value::List(self.eval_all(args, env)?)),
      "size" => {
        arity(1)?;
        Ok(Value::Int(self.eval_list(&args[0], env)?.len() as i64))
      }
      "empty" => {
        arity(1)?;
        Ok(Value::Bool(self.eval_list(&args[0], env)?.is_empty()))
      }
      "first" => {
        arity(1)?;
        self
          .eval_list(&args[0], env)?
          .into_iter()
          .next()
          .ok_or_else(|| EvalError::Type("first of an empty list".into()))
      }
      "rest" => {
        arity(1)?;
        Ok(Value::List(self.eval_list(&args[0], env)?.into_iter().skip(1).collect()))
      }
      "subject" | "predicate" | "object" => {
        arity(1)?;
        let Value::Fact(t) = self.eval(&args[0], env)? else {
          return Err(EvalError::Type(format!("{op} expects a fact")));
        };
        Ok(Value::Term(match op {
          "subject" => t.subject,
          "predicate" => t.predicate,
          _ => t.object,
        }))
      }
      "match" => {
        arity(4)?;
        let facts = self.eval_list(&args[0], env)?;
        let mut pattern = Vec::with_capacity(3);
        for a in &args[1..] {
          pattern.push(match a.as_symbol() {
            Some("_") => None,
            _ => Some(self.eval(a, env)?),
          });
        }
        let hit = facts.iter().any(|f| {
          let Value::Fact(t) = f else { return false };
          [&t.subject, &t.predicate, &t.object].iter().zip(&pattern).all(|(term, want)| {
            want
              .as_ref()
              .is_none_or(|w| w.loosely_equals(&Value::Term((*term).clone())))
          })
        });
        Ok(Value::Bool(hit))
      }
      "while" => {
        let Some((cond, body)) = args.split_first() else {
          return Err(EvalError::Arity { function: op.to_owned(), expected: 1, found: 0 });
        };
        while self.eval_bool(cond, env)? {
          self.eval_body(body, env)?;
        }
        Ok(Value::Unit)
      }
      "sleep" => {
        arity(1)?;
        let millis = self.eval_int(&args[0], env)?.max(0) as u64;
        let until = Instant::now() + Duration::from_millis(millis);
        loop {
          self.check_interrupt()?;
          let now = Instant::now();
          if now >= until {
            return Ok(Value::Unit);
          }
          thread::sleep(SLEEP_SLICE.min(until - now));
        }
      }
      other => Err(EvalError::UnknownFunction(other.to_owned())),
    }
  }
}
