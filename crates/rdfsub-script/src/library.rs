//! Compiled function definitions, keyed by IRI.

use std::{collections::HashMap, sync::Arc};

use crate::{
  access::Feature,
  error::{EvalError, Result},
  parse::{Expr, parse},
};

/// Arity of a trigger's entry function: deleted facts, inserted facts.
pub const ENTRY_ARITY: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  pub name:   String,
  pub params: Vec<String>,
  pub(crate) body: Vec<Expr>,
}

impl Function {
  /// Build a function from the tail of a `(function <name> (params) body...)`
  /// form.
  pub(crate) fn from_form(items: &[Expr]) -> Result<Self> {
    let malformed = |message: &str| EvalError::Parse { line: 0, message: message.into() };
    let [Expr::Iri(name), Expr::List(params), body @ ..] = items else {
      return Err(malformed("expected (function <iri> (params...) body...)"));
    };
    let params = params
      .iter()
      .map(|p| p.as_symbol().map(str::to_owned))
      .collect::<Option<Vec<_>>>()
      .ok_or_else(|| malformed("function parameters must be symbols"))?;
    if body.is_empty() {
      return Err(malformed("function body is empty"));
    }
    Ok(Self { name: name.clone(), params, body: body.to_vec() })
  }
}

/// Whether `name` lies in the namespace owned by `owner`: the owner itself,
/// or any IRI extending it with `#` or `/`.
pub fn in_namespace(name: &str, owner: &str) -> bool {
  match name.strip_prefix(owner) {
    Some(rest) => rest.is_empty() || rest.starts_with('#') || rest.starts_with('/'),
    None => false,
  }
}

/// The set of loaded functions.
///
/// Cloning is cheap: function bodies are shared.
#[derive(Debug, Clone, Default)]
pub struct Library {
  functions: HashMap<String, Arc<Function>>,
}

impl Library {
  /// Parse a trigger source owned by `owner`.
  ///
  /// Every top-level form must define a function inside `owner`'s namespace,
  /// and the source must define the entry function `owner` itself with two
  /// parameters.
  pub fn compile(source: &str, owner: &str) -> Result<Vec<Function>> {
    let mut functions = Vec::new();
    for form in parse(source)? {
      let Expr::List(items) = &form else {
        return Err(EvalError::Parse { line: 0, message: "top-level forms must be lists".into() });
      };
      if items.first().and_then(Expr::as_symbol) != Some("function") {
        return Err(EvalError::Parse {
          line:    0,
          message: "only function definitions may appear at top level".into(),
        });
      }
      let function = Function::from_form(&items[1..])?;
      if !in_namespace(&function.name, owner) {
        return Err(EvalError::SecurityViolation { feature: Feature::LinkedFunction });
      }
      functions.push(function);
    }

    let entry = functions
      .iter()
      .rfind(|f| f.name == owner)
      .ok_or_else(|| EvalError::UnknownFunction(owner.to_owned()))?;
    if entry.params.len() != ENTRY_ARITY {
      return Err(EvalError::Arity {
        function: owner.to_owned(),
        expected: ENTRY_ARITY,
        found:    entry.params.len(),
      });
    }
    Ok(functions)
  }

  /// A library holding exactly `functions`.
  pub fn from_functions(functions: Vec<Function>) -> Self {
    let mut library = Self::default();
    library.install(functions);
    library
  }

  /// Add or replace definitions.
  pub fn install(&mut self, functions: Vec<Function>) {
    for f in functions {
      self.functions.insert(f.name.clone(), Arc::new(f));
    }
  }

  pub fn get(&self, name: &str) -> Option<Arc<Function>> { self.functions.get(name).cloned() }

  pub fn contains(&self, name: &str) -> bool { self.functions.contains_key(name) }

  pub fn len(&self) -> usize { self.functions.len() }

  pub fn is_empty(&self) -> bool { self.functions.is_empty() }
}
