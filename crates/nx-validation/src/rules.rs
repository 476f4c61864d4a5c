//! Validation rules for populated values

use chrono::DateTime;
use nx_ir::{DataType, Scalar, Value};
use nx_schema::{Dimensions, NxType};
use regex::Regex;
use std::sync::LazyLock;

/// Valid instance names: letters, digits, `_` and inner `.`
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]([A-Za-z0-9_.]*[A-Za-z0-9_])?$").expect("valid regex")
});

/// Rule result
#[derive(Debug, Clone)]
pub struct RuleResult {
    pub is_valid: bool,
    pub message: Option<String>,
}

impl RuleResult {
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
        }
    }
}

fn is_timestamp(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

fn element_matches(scalar: &Scalar, data_type: NxType) -> bool {
    match data_type {
        NxType::Char => matches!(scalar, Scalar::Str(_)),
        NxType::Float | NxType::Number | NxType::Complex => scalar.is_numeric(),
        NxType::Int => matches!(scalar, Scalar::Int(_)),
        NxType::UInt => match scalar {
            Scalar::Int(i) => *i >= 0,
            Scalar::UInt(_) => true,
            _ => false,
        },
        NxType::PosInt => match scalar {
            Scalar::Int(i) => *i > 0,
            Scalar::UInt(u) => *u > 0,
            _ => false,
        },
        NxType::Boolean => matches!(scalar, Scalar::Bool(_)),
        NxType::Binary => matches!(scalar, Scalar::Int(_) | Scalar::UInt(_) | Scalar::Str(_)),
        NxType::DateTime | NxType::Iso8601 => match scalar {
            Scalar::Str(s) => is_timestamp(s),
            _ => false,
        },
        NxType::CharOrNumber => matches!(scalar, Scalar::Str(_)) || scalar.is_numeric(),
    }
}

/// Validate every element of a value against the declared type
///
/// Integers widen to `NX_FLOAT`; `NX_POSINT` must be strictly positive;
/// `NX_DATE_TIME` and `ISO8601` need a timezone-aware ISO 8601 string.
#[must_use]
pub fn validate_data_type(value: &Value, data_type: NxType) -> RuleResult {
    match value
        .elements()
        .iter()
        .find(|element| !element_matches(element, data_type))
    {
        None => RuleResult::valid(),
        Some(element) => {
            let hint = match data_type {
                NxType::DateTime | NxType::Iso8601 => " (expected ISO 8601 with timezone)",
                NxType::PosInt => " (expected a positive integer)",
                _ => "",
            };
            RuleResult::invalid(format!(
                "value '{element}' of type {} does not match {data_type}{hint}",
                element.dtype()
            ))
        }
    }
}

/// Validate membership in the allowed values
///
/// Numeric values match an allowed item with the same numeric value, so
/// `8.0` satisfies an item written as `8`.
#[must_use]
#[allow(clippy::float_cmp)] // Enumeration items name exact values.
pub fn validate_enumeration(value: &Value, allowed: &[String]) -> RuleResult {
    if allowed.is_empty() {
        return RuleResult::valid();
    }
    match value.as_scalar() {
        Some(scalar) => {
            let text = scalar.to_string();
            let number = scalar.as_f64();
            let matches = |item: &String| {
                *item == text
                    || number.is_some_and(|x| item.trim().parse::<f64>().is_ok_and(|a| a == x))
            };
            if allowed.iter().any(matches) {
                RuleResult::valid()
            } else {
                RuleResult::invalid(format!(
                    "'{text}' is not one of [{}]",
                    allowed.join(", ")
                ))
            }
        }
        None => RuleResult::invalid("arrays cannot satisfy an enumeration"),
    }
}

/// Validate the array rank against declared dimensions
///
/// A scalar satisfies rank 1 with a single element, matching the common
/// practice of writing one-point scans as scalars.
#[must_use]
pub fn validate_rank(value: &Value, dimensions: &Dimensions) -> RuleResult {
    let rank = value.shape().len();
    let ok = rank == dimensions.rank || (rank == 0 && dimensions.rank <= 1);
    if ok {
        RuleResult::valid()
    } else {
        RuleResult::invalid(format!(
            "rank {rank} does not match declared rank {}",
            dimensions.rank
        ))
    }
}

/// Validate an instance name written to the output
#[must_use]
pub fn validate_instance_name(name: &str) -> RuleResult {
    if NAME_PATTERN.is_match(name) {
        RuleResult::valid()
    } else {
        RuleResult::invalid(format!("'{name}' is not a valid instance name"))
    }
}

/// Element type a value is stored with for the declared type
#[must_use]
pub fn storage_type(data_type: Option<NxType>, value: &Value) -> DataType {
    match data_type {
        Some(NxType::Float) => DataType::Float64,
        Some(NxType::Int) => DataType::Int64,
        Some(NxType::UInt | NxType::PosInt) => DataType::UInt64,
        Some(NxType::Boolean) => DataType::Bool,
        Some(NxType::Char | NxType::DateTime | NxType::Iso8601) => DataType::Utf8,
        Some(
            NxType::Number | NxType::Complex | NxType::Binary | NxType::CharOrNumber,
        )
        | None => value.dtype(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nx_ir::ArrayData;

    #[test]
    fn test_numeric_rules() {
        assert!(validate_data_type(&Value::int(3), NxType::Float).is_valid);
        assert!(validate_data_type(&Value::float(3.5), NxType::Number).is_valid);
        assert!(!validate_data_type(&Value::float(3.5), NxType::Int).is_valid);
        assert!(validate_data_type(&Value::int(0), NxType::UInt).is_valid);
        assert!(!validate_data_type(&Value::int(-1), NxType::UInt).is_valid);
        assert!(!validate_data_type(&Value::int(0), NxType::PosInt).is_valid);
        assert!(validate_data_type(&Value::int(1), NxType::PosInt).is_valid);
        assert!(!validate_data_type(&Value::string("8.0"), NxType::Float).is_valid);
        assert!(!validate_data_type(&Value::bool(true), NxType::Number).is_valid);
    }

    #[test]
    fn test_string_rules() {
        assert!(validate_data_type(&Value::string("x"), NxType::Char).is_valid);
        assert!(!validate_data_type(&Value::float(1.0), NxType::Char).is_valid);
        assert!(validate_data_type(&Value::string("x"), NxType::CharOrNumber).is_valid);
        assert!(validate_data_type(&Value::int(1), NxType::CharOrNumber).is_valid);
    }

    #[test]
    fn test_timestamps_need_timezone() {
        let aware = Value::string("2024-03-01T10:15:00+01:00");
        let utc = Value::string("2024-03-01T10:15:00Z");
        let naive = Value::string("2024-03-01T10:15:00");
        assert!(validate_data_type(&aware, NxType::DateTime).is_valid);
        assert!(validate_data_type(&utc, NxType::Iso8601).is_valid);
        let result = validate_data_type(&naive, NxType::DateTime);
        assert!(!result.is_valid);
        assert!(result.message.unwrap().contains("timezone"));
    }

    #[test]
    fn test_array_elements_are_all_checked() {
        let value = Value::vector(ArrayData::Int(vec![1, 2, -3]));
        assert!(validate_data_type(&value, NxType::Int).is_valid);
        assert!(!validate_data_type(&value, NxType::UInt).is_valid);
    }

    #[test]
    fn test_enumeration_and_rank() {
        let allowed = vec!["linear".to_string(), "circular".to_string()];
        assert!(validate_enumeration(&Value::string("linear"), &allowed).is_valid);
        assert!(!validate_enumeration(&Value::string("elliptic"), &allowed).is_valid);
        assert!(validate_enumeration(&Value::string("any"), &[]).is_valid);
    }

    #[test]
    fn test_numeric_enumeration_compares_values() {
        let allowed = vec!["8".to_string(), "2.5".to_string()];
        assert!(validate_enumeration(&Value::float(8.0), &allowed).is_valid);
        assert!(validate_enumeration(&Value::int(8), &allowed).is_valid);
        assert!(validate_enumeration(&Value::float(2.5), &allowed).is_valid);
        assert!(!validate_enumeration(&Value::float(8.5), &allowed).is_valid);
        assert!(!validate_enumeration(&Value::string("8.0"), &allowed).is_valid);

        let dims = Dimensions {
            rank: 2,
            values: vec!["nx".into(), "ny".into()],
        };
        let matrix = Value::array(ArrayData::Float(vec![0.0; 6]), vec![2, 3]).unwrap();
        assert!(validate_rank(&matrix, &dims).is_valid);
        assert!(!validate_rank(&Value::vector(ArrayData::Float(vec![1.0])), &dims).is_valid);
    }

    #[test]
    fn test_instance_names_and_storage() {
        assert!(validate_instance_name("entry_1").is_valid);
        assert!(!validate_instance_name("bad name").is_valid);
        assert!(!validate_instance_name(".hidden").is_valid);
        assert_eq!(storage_type(Some(NxType::Float), &Value::int(1)), DataType::Float64);
        assert_eq!(storage_type(Some(NxType::Number), &Value::int(1)), DataType::Int64);
        assert_eq!(storage_type(None, &Value::string("x")), DataType::Utf8);
    }
}
