use std::collections::BTreeMap;
use std::fmt;

use log::{debug, warn};

use crate::error::{ProbeError, Result};

/// Temperature tokens are reduced modulo this value before formatting.
const TEMPERATURE_MODULUS: f64 = 1000.0;
/// Characters kept from an ORP token.
const ORP_WIDTH: usize = 3;
/// Characters kept from any other token.
const DEFAULT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Label {
    Temperature,
    Ph,
    PhMv,
    Orp,
    Conductivity,
    Turbidity,
    DissolvedOxygen,
    Tds,
    Salinity,
    SigmaT,
    Depth,
    DoSaturation,
}

impl Label {
    /// Label of token `i + 1` of a response.
    pub const TOKEN_ORDER: [Label; 12] = [
        Label::Temperature,
        Label::Ph,
        Label::PhMv,
        Label::Orp,
        Label::Conductivity,
        Label::Turbidity,
        Label::DissolvedOxygen,
        Label::Tds,
        Label::Salinity,
        Label::SigmaT,
        Label::Depth,
        Label::DoSaturation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Temperature => "Temperature",
            Label::Ph => "pH",
            Label::PhMv => "pHmv",
            Label::Orp => "ORP",
            Label::Conductivity => "mS/cm",
            Label::Turbidity => "NTU",
            Label::DissolvedOxygen => "mg/L DO",
            Label::Tds => "g/L TDS",
            Label::Salinity => "ppt",
            Label::SigmaT => "O' T",
            Label::Depth => "m",
            Label::DoSaturation => "%DO",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::TOKEN_ORDER
            .into_iter()
            .find(|label| label.as_str() == name)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized display strings keyed by label, in token order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedValues(BTreeMap<Label, String>);

impl NormalizedValues {
    pub fn get(&self, label: Label) -> Option<&str> {
        self.0.get(&label).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, &str)> {
        self.0.iter().map(|(label, value)| (*label, value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Label, String)> for NormalizedValues {
    fn from_iter<I: IntoIterator<Item = (Label, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for NormalizedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, value) in self.iter() {
            writeln!(f, "{label}: {value}")?;
        }
        Ok(())
    }
}

fn prefix(token: &str, width: usize) -> String {
    token.chars().take(width).collect()
}

/// Normalize a single token for `label`.
pub fn normalize_token(label: Label, token: &str) -> Result<String> {
    match label {
        Label::Temperature => {
            let value: f64 = token
                .parse()
                .map_err(|_| ProbeError::field("Temperature", token))?;
            let wrapped = value.rem_euclid(TEMPERATURE_MODULUS);
            // -0.0 would print as "-0.00"; NaN falls through unchanged.
            let wrapped = if wrapped == 0.0 { 0.0 } else { wrapped };
            Ok(format!("{wrapped:.2}"))
        }
        Label::Orp => Ok(prefix(token, ORP_WIDTH)),
        _ => Ok(prefix(token, DEFAULT_WIDTH)),
    }
}

/// Build the label -> value mapping for one raw response.
///
/// Independent of the fixed-width [`crate::response`] decoder: token 0 is the
/// header, tokens 1..=12 map positionally onto [`Label::TOKEN_ORDER`]. Tokens that fail to normalize are logged and skipped. Labels beyond the
/// end of a short response are simply absent from the result.
pub fn normalize(raw: &str) -> NormalizedValues {
    Label::TOKEN_ORDER
        .into_iter()
        .zip(raw.split_whitespace().skip(1))
        .filter_map(|(label, token)| match normalize_token(label, token) {
            Ok(value) => {
                debug!("{label}: {value}");
                Some((label, value))
            }
            Err(e) => {
                warn!("error parsing parameter {label}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_modulo() {
        assert_eq!(normalize_token(Label::Temperature, "1250.00").unwrap(), "250.00");
        assert_eq!(normalize_token(Label::Temperature, "25.3").unwrap(), "25.30");
        assert_eq!(normalize_token(Label::Temperature, "1000").unwrap(), "0.00");
        assert_eq!(normalize_token(Label::Temperature, "2000").unwrap(), "0.00");
    }

    #[test]
    fn test_temperature_negative_zero_prints_unsigned() {
        for token in ["-0", "-0.00", "-1000"] {
            assert_eq!(normalize_token(Label::Temperature, token).unwrap(), "0.00", "{token}");
        }
    }

    #[test]
    fn test_temperature_nan_survives_zero_fix() {
        assert_eq!(normalize_token(Label::Temperature, "nan").unwrap(), "NaN");
    }

    #[test]
    fn test_temperature_negative_wraps_like_floored_modulo() {
        assert_eq!(normalize_token(Label::Temperature, "-5").unwrap(), "995.00");
    }

    #[test]
    fn test_temperature_not_a_number() {
        let err = normalize_token(Label::Temperature, "abc").unwrap_err();
        assert!(matches!(err, ProbeError::FieldDecode { field: "Temperature", .. }));
    }

    #[test]
    fn test_orp_truncation() {
        assert_eq!(normalize_token(Label::Orp, "12345").unwrap(), "123");
        assert_eq!(normalize_token(Label::Orp, "12").unwrap(), "12");
    }

    #[test]
    fn test_generic_truncation() {
        assert_eq!(normalize_token(Label::Ph, "12345").unwrap(), "1234");
        assert_eq!(normalize_token(Label::DoSaturation, "98.765").unwrap(), "98.7");
        assert_eq!(normalize_token(Label::Depth, "1").unwrap(), "1");
    }

    #[test]
    fn test_normalize_full_response() {
        let raw = "#RD01 1250.00 7.021 -60.5 31234 0.145 12.34 8.765 0.093 0.07 0.00 1.23 99.87\r\n";
        let values = normalize(raw);
        assert_eq!(values.len(), 12);
        assert_eq!(values.get(Label::Temperature), Some("250.00"));
        assert_eq!(values.get(Label::Ph), Some("7.02"));
        assert_eq!(values.get(Label::PhMv), Some("-60."));
        assert_eq!(values.get(Label::Orp), Some("312"));
        assert_eq!(values.get(Label::Conductivity), Some("0.14"));
        assert_eq!(values.get(Label::SigmaT), Some("0.00"));
        assert_eq!(values.get(Label::Depth), Some("1.23"));
        assert_eq!(values.get(Label::DoSaturation), Some("99.8"));
    }

    #[test]
    fn test_normalize_ignores_extra_tokens() {
        let raw = "H 1 2 3 4 5 6 7 8 9 10 11 12 13 14";
        let values = normalize(raw);
        assert_eq!(values.len(), 12);
        assert_eq!(values.get(Label::DoSaturation), Some("12"));
    }

    #[test]
    fn test_short_response_leaves_labels_absent() {
        let values = normalize("#RD 20.5 7.0");
        assert_eq!(values.len(), 2);
        assert_eq!(values.get(Label::Temperature), Some("20.50"));
        assert_eq!(values.get(Label::Ph), Some("7.0"));
        assert_eq!(values.get(Label::Orp), None);
    }

    #[test]
    fn test_bad_token_does_not_abort_others() {
        let values = normalize("#RD xx 7.0 -12 250");
        assert_eq!(values.get(Label::Temperature), None);
        assert_eq!(values.get(Label::Ph), Some("7.0"));
        assert_eq!(values.get(Label::PhMv), Some("-12"));
        assert_eq!(values.get(Label::Orp), Some("250"));
    }

    #[test]
    fn test_header_only() {
        assert!(normalize("#RD").is_empty());
        assert!(normalize("   ").is_empty());
    }

    #[test]
    fn test_label_names() {
        for label in Label::TOKEN_ORDER {
            assert_eq!(Label::from_name(label.as_str()), Some(label));
        }
        assert_eq!(Label::from_name("Conductivity"), None);
    }

    #[test]
    fn test_display_lines() {
        let values = normalize("#RD 20.5 7.0");
        assert_eq!(values.to_string(), "Temperature: 20.50\npH: 7.0\n");
    }
}
