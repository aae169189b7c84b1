//! Access levels and the scoped lowering of them.

use std::sync::{
  Arc,
  atomic::{AtomicU8, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum AccessLevel {
  Public    = 0,
  Private   = 1,
  SuperUser = 2,
}

impl AccessLevel {
  fn from_u8(raw: u8) -> Self {
    match raw {
      0 => Self::Public,
      1 => Self::Private,
      _ => Self::SuperUser,
    }
  }
}

/// Primitives that are refused below [`Feature::required_level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
  /// Calling a function outside the caller's namespace, or defining one.
  LinkedFunction,
  /// `function` evaluated at run time rather than at load time.
  FunctionDefinition,
  /// `update`: writing to the graph store.
  Update,
  /// `read`: dereferencing an external resource.
  ReadWrite,
}

impl Feature {
  pub fn required_level(self) -> AccessLevel { AccessLevel::Private }
}

/// The capability level of one evaluation context.
///
/// Each sandbox owns its own scope, so lowering one never affects another
/// invocation running concurrently.
#[derive(Debug)]
pub struct AccessScope {
  level: AtomicU8,
}

impl AccessScope {
  pub fn new(level: AccessLevel) -> Self { Self { level: AtomicU8::new(level as u8) } }

  pub fn level(&self) -> AccessLevel { AccessLevel::from_u8(self.level.load(Ordering::SeqCst)) }

  pub fn permits(&self, feature: Feature) -> bool { self.level() >= feature.required_level() }

  /// Lower the level to at most `level` until the returned guard is dropped.
  pub fn lower(self: &Arc<Self>, level: AccessLevel) -> AccessGuard {
    let previous = self.level();
    self.level.store(previous.min(level) as u8, Ordering::SeqCst);
    AccessGuard { scope: Arc::clone(self), previous }
  }
}

/// Restores the level an [`AccessScope`] had before [`AccessScope::lower`].
#[must_use = "the level is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct AccessGuard {
  scope:    Arc<AccessScope>,
  previous: AccessLevel,
}

impl Drop for AccessGuard {
  fn drop(&mut self) { self.scope.level.store(self.previous as u8, Ordering::SeqCst); }
}
