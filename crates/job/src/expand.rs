//! Expansion of parameter declarations into concrete assignments.
//!
//! Each declaration contributes an ordered list of candidate values; the
//! full enumeration is the cartesian product over declarations, emitted in
//! declaration-order lexicographic order (rightmost parameter varies
//! fastest). A declaration that yields no values empties the product.

use tracing::warn;

use sweepbench_core::SweepError;

use crate::spec::{ParamSpec, ParamType, StepMode};
use crate::task::ParamValue;

/// Expand parameter declarations into the ordered list of assignments,
/// one per task. An empty declaration list yields a single empty
/// assignment (one task with no parameters).
pub fn expand(params: &[ParamSpec]) -> Result<Vec<Vec<ParamValue>>, SweepError> {
    let mut assignments: Vec<Vec<ParamValue>> = vec![Vec::new()];

    for param in params {
        let values = param_values(param)?;

        let mut next = Vec::with_capacity(assignments.len() * values.len());
        for prefix in &assignments {
            for value in &values {
                let mut row = Vec::with_capacity(prefix.len() + 1);
                row.extend_from_slice(prefix);
                row.push(value.clone());
                next.push(row);
            }
        }
        assignments = next;
    }

    Ok(assignments)
}

/// All candidate values for one declaration, in order.
fn param_values(param: &ParamSpec) -> Result<Vec<ParamValue>, SweepError> {
    let values = match param.ty {
        ParamType::String => string_values(param),
        ParamType::Integer => integer_values(param)?,
    };

    if values.is_empty() {
        warn!(param = %param.name, "parameter yields no assignments");
    }

    Ok(values)
}

fn string_values(param: &ParamSpec) -> Vec<ParamValue> {
    if !param.only.is_empty() {
        param
            .only
            .iter()
            .map(|v| ParamValue::new(&param.name, param.ty, v))
            .collect()
    } else if let Some(default) = &param.default {
        vec![ParamValue::new(&param.name, param.ty, default)]
    } else {
        Vec::new()
    }
}

fn integer_values(param: &ParamSpec) -> Result<Vec<ParamValue>, SweepError> {
    if !param.only.is_empty() {
        return Ok(param
            .only
            .iter()
            .map(|v| ParamValue::new(&param.name, param.ty, v))
            .collect());
    }

    if let Some(min) = param.min {
        let max = param.max.ok_or_else(|| SweepError::MissingBound {
            name: param.name.clone(),
        })?;
        if max < min {
            return Err(SweepError::InvalidRange {
                name: param.name.clone(),
                min,
                max,
            });
        }

        let step = param.step.unwrap_or(1);
        let mut values = Vec::new();

        match param.step_mode {
            StepMode::Increment => {
                if step < 1 {
                    return Err(SweepError::InvalidStep {
                        name: param.name.clone(),
                        step,
                    });
                }
                let mut v = min;
                while v <= max {
                    values.push(ParamValue::new(&param.name, param.ty, &v.to_string()));
                    v = match v.checked_add(step) {
                        Some(n) => n,
                        None => break,
                    };
                }
            }
            StepMode::Power => {
                // A factor below two (or a non-positive start) never
                // advances the progression.
                if step < 2 || min < 1 {
                    return Err(SweepError::InvalidStep {
                        name: param.name.clone(),
                        step,
                    });
                }
                let mut v = min;
                while v <= max {
                    values.push(ParamValue::new(&param.name, param.ty, &v.to_string()));
                    v = match v.checked_mul(step) {
                        Some(n) => n,
                        None => break,
                    };
                }
            }
        }

        return Ok(values);
    }

    if let Some(default) = &param.default {
        return Ok(vec![ParamValue::new(&param.name, param.ty, default)]);
    }

    Ok(Vec::new())
}
