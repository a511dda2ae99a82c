//! Correctness of a single answer. Used by both the interactive report and the
//! authoritative recomputation, so there is exactly one definition of "correct".

use serde_json::Value;

use crate::db::types::QuestionType;

/// Absolute tolerance for numerical answers.
pub const NUMERICAL_TOLERANCE: f64 = 0.01;

/// `true` when `selected` is a real answer: not absent, not JSON null, not `""`.
pub fn has_answer(selected: Option<&Value>) -> bool {
    match selected {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

/// Judges `selected` against the first element of `correct_answer`.
///
/// Never panics: missing answers, malformed keys, unknown question types and values that
/// cannot be coerced all judge as incorrect.
pub fn is_correct(question_type: &str, selected: Option<&Value>, correct_answer: &Value) -> bool {
    let Some(selected) = selected.filter(|value| has_answer(Some(*value))) else {
        return false;
    };
    let Some(canonical) = correct_answer.as_array().and_then(|values| values.first()) else {
        return false;
    };

    match QuestionType::parse(question_type) {
        Some(QuestionType::SingleChoice) => {
            match (coerce_to_string(selected), coerce_to_string(canonical)) {
                (Some(selected), Some(canonical)) => selected == canonical,
                _ => false,
            }
        }
        Some(QuestionType::Numerical) => match (parse_number(selected), parse_number(canonical)) {
            (Some(selected), Some(canonical)) => (selected - canonical).abs() < NUMERICAL_TOLERANCE,
            _ => false,
        },
        None => false,
    }
}

/// String form used for choice comparison. Integral numbers render without a fractional
/// part so `3` and `3.0` both compare equal to `"3"`. Arrays and objects have no string form.
fn coerce_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Some(int.to_string());
            }
            if let Some(uint) = number.as_u64() {
                return Some(uint.to_string());
            }
            let float = number.as_f64()?;
            if float.is_finite() && float.fract() == 0.0 && float.abs() < 1e15 {
                Some(format!("{}", float as i64))
            } else {
                Some(float.to_string())
            }
        }
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}
