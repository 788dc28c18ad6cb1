//! Output filters for binding values.
//!
//! A clause like `attr.title:user.name|uc|pad(8)` pipes the resolved value
//! through each filter left to right before the binding assigns it. The
//! built-in set follows loose scripting semantics: values coerce to number
//! or string as each filter needs.

use std::{cell::RefCell, collections::HashMap as StdHashMap, rc::Rc};

use serde_json::{Number, Value};

use crate::error::{raise_error, ErrorCode, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
  pub name: String,
  pub args: Vec<String>,
}

pub type FilterFn = Rc<dyn Fn(&Value, &[String]) -> Result<Value>>;

#[derive(Clone)]
pub struct CompiledFilter {
  func: FilterFn,
  args: Vec<String>,
}

impl std::fmt::Debug for CompiledFilter {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CompiledFilter").field("args", &self.args).finish()
  }
}

thread_local! {
  static REGISTRY: RefCell<StdHashMap<String, FilterFn>> = RefCell::new(builtin_filters());
}

/// Register (or replace) a filter under `name`.
pub fn register_filter(name: &str, f: impl Fn(&Value, &[String]) -> Result<Value> + 'static) {
  REGISTRY.with(|r| r.borrow_mut().insert(name.to_string(), Rc::new(f)));
}

/// Resolve every spec against the registry. Unknown names raise FLT-202.
pub fn compile_filters(specs: &[FilterSpec]) -> Result<Vec<CompiledFilter>> {
  specs
    .iter()
    .map(|spec| {
      REGISTRY.with(|r| {
        r.borrow()
          .get(&spec.name)
          .cloned()
          .map(|func| CompiledFilter { func, args: spec.args.clone() })
          .ok_or_else(|| {
            raise_error(ErrorCode::Flt202, format!("unknown filter: {}", spec.name))
          })
      })
    })
    .collect()
}

pub fn apply_filters(value: Value, filters: &[CompiledFilter]) -> Result<Value> {
  let mut value = value;
  for filter in filters {
    value = (filter.func)(&value, &filter.args)?;
  }
  Ok(value)
}

/// Loose truthiness: null, false, 0, "" are falsy; everything else truthy.
pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(_) | Value::Object(_) => true,
  }
}

/// Loose number coercion; `None` plays the role of NaN.
pub fn to_number(value: &Value) -> Option<f64> {
  match value {
    Value::Null => Some(0.0),
    Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
    Value::Number(n) => n.as_f64(),
    Value::String(s) => {
      let s = s.trim();
      if s.is_empty() { Some(0.0) } else { s.parse().ok() }
    }
    Value::Array(_) | Value::Object(_) => None,
  }
}

/// The string a binding writes for `value`; null and NaN become "".
pub fn to_display_string(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => format_number(n),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn format_number(n: &Number) -> String {
  if let Some(i) = n.as_i64() {
    return i.to_string();
  }
  if let Some(u) = n.as_u64() {
    return u.to_string();
  }
  match n.as_f64() {
    Some(f) if f == f.trunc() && f.abs() < 1e15 => format!("{}", f as i64),
    Some(f) => f.to_string(),
    None => String::new(),
  }
}

fn number_value(f: f64) -> Value { Number::from_f64(f).map_or(Value::Null, Value::Number) }

fn arg_number(args: &[String], at: usize) -> Result<f64> {
  args
    .get(at)
    .and_then(|a| a.parse().ok())
    .ok_or_else(|| raise_error(ErrorCode::Flt301, format!("filter needs a numeric argument #{at}")))
}

fn arg_value(args: &[String], at: usize) -> Value {
  let Some(raw) = args.get(at) else { return Value::Null };
  if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
    return parsed;
  }
  Value::String(raw.clone())
}

fn loose_eq(value: &Value, arg: &Value) -> bool {
  match (to_number(value), to_number(arg)) {
    (Some(a), Some(b)) => a == b,
    _ => to_display_string(value) == to_display_string(arg),
  }
}

fn cmp(value: &Value, args: &[String], test: impl Fn(f64, f64) -> bool) -> Result<Value> {
  let rhs = arg_number(args, 0)?;
  Ok(Value::Bool(to_number(value).is_some_and(|lhs| test(lhs, rhs))))
}

fn arith(value: &Value, args: &[String], op: impl Fn(f64, f64) -> f64) -> Result<Value> {
  let rhs = arg_number(args, 0)?;
  Ok(to_number(value).map_or(Value::Null, |lhs| number_value(op(lhs, rhs))))
}

fn builtin_filters() -> StdHashMap<String, FilterFn> {
  let mut map: StdHashMap<String, FilterFn> = StdHashMap::new();
  let mut add = |name: &str, f: FilterFn| {
    map.insert(name.to_string(), f);
  };

  add("not", Rc::new(|v, _| Ok(Value::Bool(!is_truthy(v)))));
  add("truthy", Rc::new(|v, _| Ok(Value::Bool(is_truthy(v)))));
  add("falsy", Rc::new(|v, _| Ok(Value::Bool(!is_truthy(v)))));
  add("boolean", Rc::new(|v, _| Ok(Value::Bool(is_truthy(v)))));
  add("eq", Rc::new(|v, a| Ok(Value::Bool(loose_eq(v, &arg_value(a, 0))))));
  add("ne", Rc::new(|v, a| Ok(Value::Bool(!loose_eq(v, &arg_value(a, 0))))));
  add("lt", Rc::new(|v, a| cmp(v, a, |x, y| x < y)));
  add("le", Rc::new(|v, a| cmp(v, a, |x, y| x <= y)));
  add("gt", Rc::new(|v, a| cmp(v, a, |x, y| x > y)));
  add("ge", Rc::new(|v, a| cmp(v, a, |x, y| x >= y)));
  add("inc", Rc::new(|v, a| arith(v, a, |x, y| x + y)));
  add("dec", Rc::new(|v, a| arith(v, a, |x, y| x - y)));
  add("mul", Rc::new(|v, a| arith(v, a, |x, y| x * y)));
  add("div", Rc::new(|v, a| arith(v, a, |x, y| x / y)));
  add(
    "fix",
    Rc::new(|v, a| {
      let digits = arg_number(a, 0)? as usize;
      Ok(
        to_number(v)
          .map_or(Value::Null, |f| Value::String(format!("{f:.digits$}"))),
      )
    }),
  );
  add("number", Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, number_value))));
  add("float", Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, number_value))));
  add(
    "int",
    Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, |f| number_value(f.trunc())))),
  );
  add(
    "round",
    Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, |f| number_value(f.round())))),
  );
  add(
    "floor",
    Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, |f| number_value(f.floor())))),
  );
  add(
    "ceil",
    Rc::new(|v, _| Ok(to_number(v).map_or(Value::Null, |f| number_value(f.ceil())))),
  );
  add("string", Rc::new(|v, _| Ok(Value::String(to_display_string(v)))));
  add("uc", Rc::new(|v, _| Ok(Value::String(to_display_string(v).to_uppercase()))));
  add("lc", Rc::new(|v, _| Ok(Value::String(to_display_string(v).to_lowercase()))));
  add(
    "cap",
    Rc::new(|v, _| {
      let s = to_display_string(v);
      let mut chars = s.chars();
      let capped = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => s,
      };
      Ok(Value::String(capped))
    }),
  );
  add("trim", Rc::new(|v, _| Ok(Value::String(to_display_string(v).trim().to_string()))));
  add(
    "slice",
    Rc::new(|v, a| {
      let s = to_display_string(v);
      let chars: Vec<char> = s.chars().collect();
      let start = (arg_number(a, 0)? as usize).min(chars.len());
      let end = match a.get(1) {
        Some(_) => (arg_number(a, 1)? as usize).clamp(start, chars.len()),
        None => chars.len(),
      };
      Ok(Value::String(chars[start..end].iter().collect()))
    }),
  );
  add(
    "pad",
    Rc::new(|v, a| {
      let len = arg_number(a, 0)? as usize;
      let fill = a.get(1).and_then(|s| s.chars().next()).unwrap_or('0');
      let s = to_display_string(v);
      let missing = len.saturating_sub(s.chars().count());
      Ok(Value::String(fill.to_string().repeat(missing) + &s))
    }),
  );
  add(
    "defaults",
    Rc::new(|v, a| {
      if is_truthy(v) { Ok(v.clone()) } else { Ok(arg_value(a, 0)) }
    }),
  );

  map
}
