//! Interpretation of compiled accessor steps over a value tree.

use serde_json::Value;

use crate::{
  error::{raise_error, ErrorCode, Result},
  path::Step,
};

/// Walk `steps` down from `root` and clone the value found.
///
/// Missing members resolve to `Null` the way missing properties read as
/// undefined; only a wildcard step without a frame entry is an error.
pub fn value_by_steps(root: &Value, steps: &[Step], frame: &[usize]) -> Result<Value> {
  let mut current = root;
  for step in steps {
    match step {
      Step::Literal(name) => match current.get(name.as_str()) {
        Some(v) => current = v,
        None => return Ok(Value::Null),
      },
      Step::Wildcard(ordinal) => {
        let index = frame_index(frame, *ordinal)?;
        match current.get(index) {
          Some(v) => current = v,
          None => return Ok(Value::Null),
        }
      }
    }
  }
  Ok(current.clone())
}

/// Walk `steps` down from `root` and write `value` at the final step.
///
/// Navigation is strict: every intermediate step must already exist. The
/// final step may introduce a new object member; writing one past the end of
/// an array appends.
pub fn set_by_steps(root: &mut Value, steps: &[Step], frame: &[usize], value: Value) -> Result<()> {
  let Some((last, walk)) = steps.split_last() else {
    *root = value;
    return Ok(());
  };

  let mut current = root;
  for step in walk {
    current = match step {
      Step::Literal(name) => current.get_mut(name.as_str()).ok_or_else(|| missing(name))?,
      Step::Wildcard(ordinal) => {
        let index = frame_index(frame, *ordinal)?;
        current.get_mut(index).ok_or_else(|| missing(&index.to_string()))?
      }
    };
  }

  match last {
    Step::Literal(name) => match current {
      Value::Object(map) => {
        map.insert(name.clone(), value);
        Ok(())
      }
      _ => Err(missing(name)),
    },
    Step::Wildcard(ordinal) => {
      let index = frame_index(frame, *ordinal)?;
      match current {
        Value::Array(items) => {
          if index < items.len() {
            items[index] = value;
          } else if index == items.len() {
            items.push(value);
          } else {
            return Err(
              raise_error(ErrorCode::State202, format!("array write out of bounds: {index}"))
                .with_context("len", items.len().to_string()),
            );
          }
          Ok(())
        }
        _ => Err(missing(&index.to_string())),
      }
    }
  }
}

fn frame_index(frame: &[usize], ordinal: usize) -> Result<usize> {
  frame.get(ordinal - 1).copied().ok_or_else(|| {
    raise_error(ErrorCode::List201, format!("no list index bound for ${ordinal}"))
  })
}

fn missing(segment: &str) -> crate::error::StructiveError {
  raise_error(ErrorCode::State202, format!("cannot write through missing segment: {segment}"))
}
