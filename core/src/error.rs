//! Structured runtime errors.
//!
//! Every failure surfaces as a [`StructiveError`] carrying a stable code, a
//! human message and optional context/hint/docs metadata. The core never
//! swallows errors: synchronous raises bubble as `Result::Err`, update and
//! render failures propagate from the update entry point after the queue is
//! drained.

use std::fmt;

use crate::app_ctx::AppCtx;

pub type Result<T> = std::result::Result<T, StructiveError>;

/// Stable error codes, grouped by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
  /// Path/name/accessor synthesis failed.
  State202,
  /// Unsupported key kind on a state bridge.
  State203,
  /// Unrecognised symbol key on a state bridge.
  State204,
  /// No parent/child path translation found.
  State302,
  /// Duplicate 1:1 parent/child path mapping.
  State303,
  /// A list index was missing or already collected when required.
  List201,
  /// Directive contract violation.
  Bind201,
  /// Directive operation unimplemented for this node kind.
  Bind301,
  /// The renderer walked a pattern the path tree has not seen.
  Path101,
  /// Updater not initialised.
  Upd001,
  /// Readonly state context missing.
  Upd002,
  /// List diff context missing.
  Upd003,
  /// Engine missing on the updater.
  Upd004,
  /// Parent info unexpectedly null during reorder.
  Upd005,
  /// List index unexpectedly null during reorder.
  Upd006,
  /// Stylesheet registry miss.
  Css001,
  /// Layout fetch failed.
  Tmp101,
  /// Unknown filter name.
  Flt202,
  /// Bad filter arguments.
  Flt301,
}

impl ErrorCode {
  pub fn as_str(self) -> &'static str {
    match self {
      ErrorCode::State202 => "STATE-202",
      ErrorCode::State203 => "STATE-203",
      ErrorCode::State204 => "STATE-204",
      ErrorCode::State302 => "STATE-302",
      ErrorCode::State303 => "STATE-303",
      ErrorCode::List201 => "LIST-201",
      ErrorCode::Bind201 => "BIND-201",
      ErrorCode::Bind301 => "BIND-301",
      ErrorCode::Path101 => "PATH-101",
      ErrorCode::Upd001 => "UPD-001",
      ErrorCode::Upd002 => "UPD-002",
      ErrorCode::Upd003 => "UPD-003",
      ErrorCode::Upd004 => "UPD-004",
      ErrorCode::Upd005 => "UPD-005",
      ErrorCode::Upd006 => "UPD-006",
      ErrorCode::Css001 => "CSS-001",
      ErrorCode::Tmp101 => "TMP-101",
      ErrorCode::Flt202 => "FLT-202",
      ErrorCode::Flt301 => "FLT-301",
    }
  }
}

impl fmt::Display for ErrorCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
  #[default]
  Error,
  Warning,
}

#[derive(Debug, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct StructiveError {
  pub code: ErrorCode,
  pub message: String,
  pub context: Vec<(String, String)>,
  pub hint: Option<String>,
  pub docs_url: Option<String>,
  pub severity: Severity,
  pub cause: Option<Box<dyn std::error::Error + 'static>>,
}

impl StructiveError {
  pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
    StructiveError {
      code,
      message: message.into(),
      context: Vec::new(),
      hint: None,
      docs_url: None,
      severity: Severity::Error,
      cause: None,
    }
  }

  pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.context.push((key.into(), value.into()));
    self
  }

  pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
    self.hint = Some(hint.into());
    self
  }

  pub fn with_docs_url(mut self, url: impl Into<String>) -> Self {
    self.docs_url = Some(url.into());
    self
  }

  pub fn with_cause(mut self, cause: impl std::error::Error + 'static) -> Self {
    self.cause = Some(Box::new(cause));
    self
  }
}

/// Build a [`StructiveError`] and, when the global `debug` flag is set, log
/// its full payload.
pub fn raise_error(code: ErrorCode, message: impl Into<String>) -> StructiveError {
  let err = StructiveError::new(code, message);
  if AppCtx::debug() {
    log::error!(
      "[{}] {} context={:?} hint={:?} docs={:?} cause={:?}",
      err.code,
      err.message,
      err.context,
      err.hint,
      err.docs_url,
      err.cause
    );
  }
  err
}
