//! Configuration options
//!
//! The option set is closed: an unknown option name or an invalid option
//! value is a fatal configuration error raised before any translation
//! proceeds. The `words`/`rules`/`types` options carry the rule-table pieces
//! and are kept as raw JSON for the rule compiler.

use crate::utils::error::{MathError, MathResult};
use serde_json::Value;

/// Number field the input is interpreted over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    Integer,
    Real,
    Complex,
}

/// Engine options. Defaults mirror the historical engine defaults.
#[derive(Debug, Clone)]
pub struct Options {
    pub field: Field,
    pub decimal_places: u8,
    pub allow_decimal: bool,
    pub allow_interval: bool,
    pub dont_expand_powers: bool,
    pub dont_factor_denominators: bool,
    pub dont_factor_terms: bool,
    pub dont_convert_decimal_to_fraction: bool,
    pub dont_simplify_imaginary: bool,
    pub ignore_order: bool,
    pub inverse_result: bool,
    pub require_thousands_separator: bool,
    pub ignore_text: bool,
    pub ignore_trailing_zeros: bool,
    pub allow_thousands_separator: bool,
    pub compare_sides: bool,
    pub ignore_coefficient_one: bool,
    pub strict: bool,
    /// Decimal separator characters; `None` means the conventional `.`
    pub set_decimal_separator: Option<Vec<char>>,
    /// Thousands separator characters; `None` means the conventional `,`
    /// (only honored when `allow_thousands_separator` is set)
    pub set_thousands_separator: Option<Vec<char>>,
    /// Raw rule-table pieces, consumed by the rule compiler
    pub words: Option<Value>,
    pub rules: Option<Value>,
    pub types: Option<Value>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            field: Field::Integer,
            decimal_places: 10,
            allow_decimal: false,
            allow_interval: false,
            dont_expand_powers: false,
            dont_factor_denominators: false,
            dont_factor_terms: false,
            dont_convert_decimal_to_fraction: false,
            dont_simplify_imaginary: false,
            ignore_order: false,
            inverse_result: false,
            require_thousands_separator: false,
            ignore_text: false,
            ignore_trailing_zeros: false,
            allow_thousands_separator: false,
            compare_sides: false,
            ignore_coefficient_one: false,
            strict: false,
            set_decimal_separator: None,
            set_thousands_separator: None,
            words: None,
            rules: None,
            types: None,
        }
    }
}

impl Options {
    /// Build options from a JSON object, validating every entry against the
    /// closed option set.
    pub fn from_json(spec: &Value) -> MathResult<Options> {
        let mut options = Options::default();
        let map = match spec {
            Value::Null => return Ok(options),
            Value::Object(map) => map,
            other => {
                return Err(MathError::invalid_option_value(
                    "options",
                    &other.to_string(),
                ))
            }
        };
        for (name, value) in map {
            options.apply(name, value)?;
        }
        options.check_separator_conflict()?;
        Ok(options)
    }

    fn apply(&mut self, name: &str, value: &Value) -> MathResult<()> {
        match name {
            "field" => {
                self.field = match value.as_str() {
                    None if value.is_null() => Field::Integer,
                    Some("integer") => Field::Integer,
                    Some("real") => Field::Real,
                    Some("complex") => Field::Complex,
                    _ => return Err(MathError::invalid_option_value(name, &value.to_string())),
                };
            }
            "decimalPlaces" => match value.as_u64() {
                Some(v) if v <= 20 => self.decimal_places = v as u8,
                _ if value.is_null() => {}
                _ => return Err(MathError::invalid_option_value(name, &value.to_string())),
            },
            "allowDecimal"
            | "allowInterval"
            | "dontExpandPowers"
            | "dontFactorDenominators"
            | "dontFactorTerms"
            | "dontConvertDecimalToFraction"
            | "dontSimplifyImaginary"
            | "ignoreOrder"
            | "inverseResult"
            | "requireThousandsSeparator"
            | "ignoreText"
            | "ignoreTrailingZeros"
            | "allowThousandsSeparator"
            | "compareSides"
            | "ignoreCoefficientOne"
            | "strict" => {
                let v = match value {
                    Value::Null => false,
                    Value::Bool(b) => *b,
                    _ => return Err(MathError::invalid_option_value(name, &value.to_string())),
                };
                match name {
                    "allowDecimal" => self.allow_decimal = v,
                    "allowInterval" => self.allow_interval = v,
                    "dontExpandPowers" => self.dont_expand_powers = v,
                    "dontFactorDenominators" => self.dont_factor_denominators = v,
                    "dontFactorTerms" => self.dont_factor_terms = v,
                    "dontConvertDecimalToFraction" => self.dont_convert_decimal_to_fraction = v,
                    "dontSimplifyImaginary" => self.dont_simplify_imaginary = v,
                    "ignoreOrder" => self.ignore_order = v,
                    "inverseResult" => self.inverse_result = v,
                    "requireThousandsSeparator" => self.require_thousands_separator = v,
                    "ignoreText" => self.ignore_text = v,
                    "ignoreTrailingZeros" => self.ignore_trailing_zeros = v,
                    "allowThousandsSeparator" => self.allow_thousands_separator = v,
                    "compareSides" => self.compare_sides = v,
                    "ignoreCoefficientOne" => self.ignore_coefficient_one = v,
                    "strict" => self.strict = v,
                    _ => unreachable!(),
                }
            }
            "setThousandsSeparator" => {
                self.set_thousands_separator = parse_separator_set(name, value)?;
            }
            "setDecimalSeparator" => {
                self.set_decimal_separator = parse_separator_set(name, value)?;
            }
            "words" => self.words = non_null_object(name, value)?,
            "rules" => self.rules = non_null_object(name, value)?,
            "types" => self.types = non_null_object(name, value)?,
            _ => return Err(MathError::invalid_option(name)),
        }
        Ok(())
    }

    /// Decimal separators in effect. The conventional separator is `.`
    /// unless period is claimed as a thousands separator.
    pub fn decimal_separators(&self) -> Vec<char> {
        match &self.set_decimal_separator {
            Some(seps) => seps.clone(),
            None => vec!['.'],
        }
    }

    pub fn thousands_separators(&self) -> Option<Vec<char>> {
        if self.set_thousands_separator.is_some() {
            self.set_thousands_separator.clone()
        } else if self.allow_thousands_separator {
            Some(vec![','])
        } else {
            None
        }
    }

    /// A character configured as both a decimal and a thousands separator is
    /// a fatal configuration error.
    pub fn check_separator_conflict(&self) -> MathResult<()> {
        let thousands = match self.thousands_separators() {
            Some(t) => t,
            None => return Ok(()),
        };
        for dec in self.decimal_separators() {
            if thousands.contains(&dec) {
                return Err(MathError::separator_conflict(dec));
            }
        }
        Ok(())
    }
}

fn parse_separator_set(name: &str, value: &Value) -> MathResult<Option<Vec<char>>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.chars().count() == 1 => Ok(Some(s.chars().collect())),
        Value::Array(items) if !items.is_empty() => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str().and_then(|s| {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                }) {
                    Some(c) => out.push(c),
                    None => {
                        return Err(MathError::invalid_option_value(name, &value.to_string()))
                    }
                }
            }
            Ok(Some(out))
        }
        _ => Err(MathError::invalid_option_value(name, &value.to_string())),
    }
}

fn non_null_object(name: &str, value: &Value) -> MathResult<Option<Value>> {
    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(value.clone())),
        _ => Err(MathError::invalid_option_value(name, &value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::{E_INVALID_OPTION_NAME, E_SEPARATOR_CONFLICT};
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let o = Options::default();
        assert_eq!(o.field, Field::Integer);
        assert_eq!(o.decimal_places, 10);
        assert!(!o.strict);
        assert_eq!(o.decimal_separators(), vec!['.']);
        assert!(o.thousands_separators().is_none());
    }

    #[test]
    fn test_unknown_option_is_fatal() {
        let err = Options::from_json(&json!({"noSuchOption": true})).unwrap_err();
        assert_eq!(err.code(), E_INVALID_OPTION_NAME);
    }

    #[test]
    fn test_separator_conflict() {
        let err = Options::from_json(&json!({
            "setDecimalSeparator": ",",
            "setThousandsSeparator": [","]
        }))
        .unwrap_err();
        assert_eq!(err.code(), E_SEPARATOR_CONFLICT);
    }

    #[test]
    fn test_decimal_places_range() {
        assert!(Options::from_json(&json!({"decimalPlaces": 20})).is_ok());
        assert!(Options::from_json(&json!({"decimalPlaces": 21})).is_err());
    }

    #[test]
    fn test_separator_lists() {
        let o = Options::from_json(&json!({
            "setThousandsSeparator": [",", "."],
            "setDecimalSeparator": ";"
        }))
        .unwrap();
        assert_eq!(o.thousands_separators(), Some(vec![',', '.']));
        assert_eq!(o.decimal_separators(), vec![';']);
    }
}
