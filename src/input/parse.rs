//! Value grammars used by `do`, `repeat`, `press`, `hold` and `release`.
//!
//! These run on evaluated expression values (`serde_json::Value`), both at compile
//! time for static operands and at evaluation time for dynamic ones.

use std::time::Duration;

use serde_json::Value;

use super::{Flag, Input, InputSpec, KeyCode, lexicon, vk};
use crate::error::ValueError;

/// Parse `value` as one or more inputs.
///
/// Accepts an integer digit (0-9), a lexicon name (optionally suffixed with
/// ` down`/` up`), or a sequence of those, flattened in order. Inputs whose flag is
/// still unset receive `default` (which may itself be `Flag::Unset`).
pub fn parse_input(value: &Value, default: Flag) -> Result<InputSpec, ValueError> {
    let mut spec = InputSpec::default();
    collect_inputs(value, default, &mut spec)?;
    Ok(spec)
}

fn collect_inputs(value: &Value, default: Flag, out: &mut InputSpec) -> Result<(), ValueError> {
    match value {
        Value::Number(n) => {
            let digit = n
                .as_i64()
                .filter(|d| (0..=9).contains(d))
                .ok_or_else(|| ValueError::Digit {
                    value: value.to_string(),
                })?;
            out.push(Input::new(vk::DIGIT_0 + digit as KeyCode, Flag::Unset).with_default(default));
            Ok(())
        }
        Value::String(name) => {
            let input = lexicon::lookup(name).ok_or_else(|| ValueError::Input {
                value: value.to_string(),
            })?;
            out.push(input.with_default(default));
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                collect_inputs(item, default, out)?;
            }
            Ok(())
        }
        other => Err(ValueError::Input {
            value: other.to_string(),
        }),
    }
}

/// A positive tick rate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frequency {
    hertz: f64,
    period: Duration,
}

impl Frequency {
    pub fn hertz(&self) -> f64 {
        self.hertz
    }

    /// Time between two ticks.
    pub fn period(&self) -> Duration {
        self.period
    }
}

/// Parse a frequency literal such as `"10hz"`, `" 2.5 Hz"`.
///
/// The number must be positive and its period representable and non-zero.
pub fn parse_frequency(value: &Value) -> Result<Frequency, ValueError> {
    let invalid = || ValueError::Frequency {
        value: value.to_string(),
    };
    let text = value.as_str().ok_or_else(invalid)?.trim().to_ascii_lowercase();
    let number = text.strip_suffix("hz").ok_or_else(invalid)?.trim();
    let hertz: f64 = number.parse().map_err(|_| invalid())?;
    if !hertz.is_finite() || hertz <= 0.0 {
        return Err(invalid());
    }
    let period = Duration::try_from_secs_f64(1.0 / hertz).map_err(|_| invalid())?;
    if period.is_zero() {
        return Err(invalid());
    }
    Ok(Frequency { hertz, period })
}

/// Parse a duration literal such as `"100ms"`, `"2s"`, `"1m 30s"`. Must be positive.
pub fn parse_duration(value: &Value) -> Result<Duration, ValueError> {
    let text = value.as_str().ok_or_else(|| ValueError::Duration {
        value: value.to_string(),
        reason: "expected a string".to_string(),
    })?;
    let duration = humantime::parse_duration(text.trim()).map_err(|e| ValueError::Duration {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if duration.is_zero() {
        return Err(ValueError::NonPositiveDuration {
            value: value.to_string(),
        });
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_input_forms() {
        let spec = parse_input(&json!(3), Flag::Unset).unwrap();
        assert_eq!(spec.inputs(), &[Input::new(0x33, Flag::Unset)]);

        let spec = parse_input(&json!("A"), Flag::KeyDown).unwrap();
        assert_eq!(spec.inputs(), &[Input::new(0x41, Flag::KeyDown)]);

        let spec = parse_input(&json!(["ctrl", ["c up", 1]]), Flag::Unset).unwrap();
        assert_eq!(
            spec.inputs(),
            &[
                Input::new(vk::CTRL, Flag::Unset),
                Input::new(0x43, Flag::KeyUp),
                Input::new(0x31, Flag::Unset),
            ]
        );
    }

    #[test]
    fn test_parse_input_default_does_not_override_suffix() {
        let spec = parse_input(&json!(["a up", "b"]), Flag::KeyDown).unwrap();
        assert_eq!(
            spec.inputs(),
            &[Input::new(0x41, Flag::KeyUp), Input::new(0x42, Flag::KeyDown)]
        );
    }

    #[test]
    fn test_parse_input_rejects() {
        assert!(matches!(
            parse_input(&json!("banana"), Flag::Unset),
            Err(ValueError::Input { .. })
        ));
        assert!(matches!(
            parse_input(&json!(12), Flag::Unset),
            Err(ValueError::Digit { .. })
        ));
        assert!(parse_input(&json!(true), Flag::Unset).is_err());
        assert!(parse_input(&json!(["a", {"x": 1}]), Flag::Unset).is_err());
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!(parse_frequency(&json!("10hz")).unwrap().hertz(), 10.0);
        assert_eq!(parse_frequency(&json!(" 2.5 HZ ")).unwrap().hertz(), 2.5);
        assert_eq!(
            parse_frequency(&json!("4Hz")).unwrap().period(),
            Duration::from_millis(250)
        );
        assert!(parse_frequency(&json!("banana")).is_err());
        assert!(parse_frequency(&json!("10")).is_err());
        assert!(parse_frequency(&json!("0hz")).is_err());
        assert!(parse_frequency(&json!("-1hz")).is_err());
        assert!(parse_frequency(&json!(10)).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration(&json!("100ms")).unwrap(),
            Duration::from_millis(100)
        );
        assert_eq!(
            parse_duration(&json!("1m 30s")).unwrap(),
            Duration::from_secs(90)
        );
        assert!(matches!(
            parse_duration(&json!("0s")),
            Err(ValueError::NonPositiveDuration { .. })
        ));
        assert!(parse_duration(&json!("soon")).is_err());
        assert!(parse_duration(&json!(5)).is_err());
    }
}
