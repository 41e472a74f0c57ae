use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{InvalidValueError, InvalidValueKind};

use super::{ScalarCoerce, ValidatorInfo, coerce_elements, coerce_with_array_mode};

/// CSS named colors accepted by [`ColorValidator`].
pub const NAMED_COLORS: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue", "darkcyan",
    "darkgoldenrod", "darkgray", "darkgrey", "darkgreen", "darkkhaki", "darkmagenta",
    "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon", "darkseagreen",
    "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise", "darkviolet", "deeppink",
    "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick", "floralwhite", "forestgreen",
    "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod", "gray", "grey", "green",
    "greenyellow", "honeydew", "hotpink", "indianred", "indigo", "ivory", "khaki", "lavender",
    "lavenderblush", "lawngreen", "lemonchiffon", "lightblue", "lightcoral", "lightcyan",
    "lightgoldenrodyellow", "lightgray", "lightgrey", "lightgreen", "lightpink", "lightsalmon",
    "lightseagreen", "lightskyblue", "lightslategray", "lightslategrey", "lightsteelblue",
    "lightyellow", "lime", "limegreen", "linen", "magenta", "maroon", "mediumaquamarine",
    "mediumblue", "mediumorchid", "mediumpurple", "mediumseagreen", "mediumslateblue",
    "mediumspringgreen", "mediumturquoise", "mediumvioletred", "midnightblue", "mintcream",
    "mistyrose", "moccasin", "navajowhite", "navy", "oldlace", "olive", "olivedrab", "orange",
    "orangered", "orchid", "palegoldenrod", "palegreen", "paleturquoise", "palevioletred",
    "papayawhip", "peachpuff", "peru", "pink", "plum", "powderblue", "purple", "red", "rosybrown",
    "royalblue", "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell", "sienna", "silver",
    "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan",
    "teal", "thistle", "tomato", "turquoise", "violet", "wheat", "white", "whitesmoke", "yellow",
    "yellowgreen",
];

pub const NAMED_COLORSCALES: &[&str] = &[
    "Greys", "YlGnBu", "Greens", "YlOrRd", "Bluered", "RdBu", "Reds", "Blues", "Picnic", "Rainbow",
    "Portland", "Jet", "Hot", "Blackbody", "Earth", "Electric", "Viridis",
];

fn hex_re() -> &'static Regex {
    static HEX: OnceLock<Regex> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"^#([a-f0-9]{6}|[a-f0-9]{3})$").expect("hex color pattern is valid"))
}

fn functional_re() -> &'static Regex {
    static FUNCTIONAL: OnceLock<Regex> = OnceLock::new();
    FUNCTIONAL.get_or_init(|| {
        Regex::new(r"^(rgb|hsl|hsv)a?\([\d.]{1,4}%?(,[\d.]{1,4}%?){2,3}\)$")
            .expect("functional color pattern is valid")
    })
}

/// True for hex, `rgb/hsl/hsv(a)(...)` and named CSS colors.
///
/// Spaces are ignored and matching is case-insensitive.
#[must_use]
pub fn is_valid_color(text: &str) -> bool {
    let normalized: String = text
        .chars()
        .filter(|c| *c != ' ')
        .flat_map(char::to_lowercase)
        .collect();
    hex_re().is_match(&normalized)
        || functional_re().is_match(&normalized)
        || NAMED_COLORS.contains(&normalized.as_str())
}

/// Rendered color grammar attached to color rejections.
#[must_use]
pub fn valid_color_description() -> &'static str {
    static DESCRIPTION: OnceLock<String> = OnceLock::new();
    DESCRIPTION.get_or_init(|| {
        let mut lines = Vec::new();
        let mut line = String::new();
        for name in NAMED_COLORS {
            if line.len() + name.len() > 68 {
                lines.push(std::mem::take(&mut line));
            }
            line.push_str(name);
            line.push_str(", ");
        }
        lines.push(line.trim_end_matches([',', ' ']).to_owned());
        format!(
            "    Colors may be specified as:\n      \
             - Hex strings (e.g. '#ff0000')\n      \
             - rgb/rgba strings (e.g. 'rgb(255, 0, 0)')\n      \
             - hsl/hsla strings (e.g. 'hsl(0, 100%, 50%)')\n      \
             - hsv/hsva strings (e.g. 'hsv(0, 100%, 100%)')\n      \
             - Named CSS colors:\n            {}",
            lines.join("\n            ")
        )
    })
}

/// Color property; array-ok sequences may also be numeric color-scale indices.
///
/// A sequence mixing numbers and color strings is returned as strings only.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorValidator {
    pub(crate) info: ValidatorInfo,
}

impl ColorValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self { info }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        coerce_with_array_mode(self, value)
    }
}

impl ScalarCoerce for ColorValidator {
    fn info(&self) -> &ValidatorInfo {
        &self.info
    }

    fn coerce_scalar(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let Some(text) = value.as_str() else {
            return Err(self
                .info
                .error(InvalidValueKind::TypeMismatch, value)
                .with_detail("expected a color string")
                .with_valid_description(valid_color_description()));
        };
        if is_valid_color(text) {
            Ok(value.clone())
        } else {
            Err(self
                .info
                .error(InvalidValueKind::InvalidFormat, value)
                .with_valid_description(valid_color_description()))
        }
    }

    fn coerce_element(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let numeric_text = value.as_str().is_some_and(|text| text.trim().parse::<f64>().is_ok());
        if value.is_number() || numeric_text {
            Ok(value.clone())
        } else {
            self.coerce_scalar(value)
        }
    }

    fn coerce_sequence(&self, items: &[Value]) -> Result<Value, InvalidValueError> {
        if items.iter().all(Value::is_number) {
            let series = items
                .iter()
                .map(|item| item.as_f64().map_or_else(|| item.clone(), Value::from))
                .collect();
            return Ok(Value::Array(series));
        }
        let coerced = coerce_elements(self, items)?;
        let Value::Array(elements) = coerced else {
            return Ok(coerced);
        };
        let strings = elements
            .into_iter()
            .map(|element| match element {
                Value::Number(number) => Value::String(number.to_string()),
                other => other,
            })
            .collect();
        Ok(Value::Array(strings))
    }
}

/// Named palette or list of `[position, color]` stops.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorscaleValidator {
    pub(crate) info: ValidatorInfo,
}

impl ColorscaleValidator {
    #[must_use]
    pub fn new(name: impl Into<String>, parent_name: impl Into<String>) -> Self {
        Self::from_info(ValidatorInfo::new(name, parent_name))
    }

    pub(crate) fn from_info(info: ValidatorInfo) -> Self {
        Self { info }
    }

    fn description() -> String {
        format!(
            "    Colorscales may be specified as:\n      \
             - A list of 2-element lists where the first element is the normalized color level value\n        \
             (starting at 0 and ending at 1), and the second item is a valid color string.\n        \
             (e.g. [[0.5, 'red'], [1.0, 'blue']])\n      \
             - One of the following named colorscales:\n            [{}]",
            NAMED_COLORSCALES.join(", ")
        )
    }

    fn is_valid_stop(stop: &Value) -> bool {
        match stop.as_array().map(Vec::as_slice) {
            Some([position, color]) => {
                position.as_f64().is_some_and(|p| (0.0..=1.0).contains(&p))
                    && color.as_str().is_some_and(is_valid_color)
            }
            _ => false,
        }
    }

    pub fn validate_coerce(&self, value: &Value) -> Result<Value, InvalidValueError> {
        let valid = match value {
            Value::Null => return self.info.null_to_default(),
            Value::String(name) => NAMED_COLORSCALES.contains(&name.as_str()),
            Value::Array(stops) => !stops.is_empty() && stops.iter().all(Self::is_valid_stop),
            _ => false,
        };
        if valid {
            Ok(value.clone())
        } else {
            let mut err = self
                .info
                .error(InvalidValueKind::InvalidFormat, value)
                .with_valid_description(Self::description());
            if let Value::Array(stops) = value {
                err = err.with_invalid_elements(
                    stops
                        .iter()
                        .filter(|stop| !Self::is_valid_stop(stop))
                        .take(super::INVALID_ELEMENT_REPORT_LIMIT)
                        .cloned()
                        .collect(),
                );
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ColorValidator, ColorscaleValidator, is_valid_color};

    #[test]
    fn functional_notation_ignores_spaces_and_case() {
        assert!(is_valid_color("RGBA(10, 234, 200, 50%)"));
        assert!(is_valid_color("hsl(0, 100%, 50%)"));
        assert!(!is_valid_color("rgb(1,2)"));
    }

    #[test]
    fn numeric_series_pass_in_array_mode() {
        let validator = ColorValidator::new("color", "marker").array_ok();
        assert_eq!(
            validator.validate_coerce(&json!([1, 2.5, 3])).unwrap(),
            json!([1.0, 2.5, 3.0])
        );
    }

    #[test]
    fn mixed_sequences_become_strings() {
        let validator = ColorValidator::new("color", "marker").array_ok();
        let coerced = validator.validate_coerce(&json!(["red", 2, "#00f", 0.5])).unwrap();
        assert_eq!(coerced, json!(["red", "2", "#00f", "0.5"]));
        assert_eq!(validator.validate_coerce(&coerced).unwrap(), coerced);
        assert!(validator.validate_coerce(&json!(["red", 2, "nope"])).is_err());
    }

    #[test]
    fn colorscale_stops_are_checked() {
        let validator = ColorscaleValidator::new("colorscale", "marker");
        assert!(validator.validate_coerce(&json!("Viridis")).is_ok());
        assert!(validator.validate_coerce(&json!([[0, "red"], [1, "blue"]])).is_ok());
        let err = validator
            .validate_coerce(&json!([[0, "red"], [1.5, "blue"]]))
            .unwrap_err();
        assert_eq!(err.invalid_elements, vec![json!([1.5, "blue"])]);
    }
}
