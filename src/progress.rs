use serde::Deserialize;

/// One progress report pushed by the server.
///
/// Only `progreso` and `eta` are read; any other field in the payload is
/// ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressUpdate {
    #[serde(rename = "progreso")]
    pub progress: f64,
    pub eta: String,
}

impl ProgressUpdate {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// Anything at or past 100 ends the subscription, including values out
    /// of the documented 0..=100 range.
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }

    pub fn percent_label(&self) -> String {
        percent_label(self.progress)
    }
}

/// Render a progress value followed by `%`, spelled the way a browser
/// prints a number: `57.0` is `"57%"`, `1e21` is `"1e+21%"`.
pub fn percent_label(progress: f64) -> String {
    format!("{}%", number_text(progress))
}

/// Shortest round-trip digits, positional between 1e-6 and 1e21 and
/// exponent form (with an explicit `+` on positive exponents) outside it.
fn number_text(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&v.abs()) {
        return format!("{v}");
    }
    let sci = format!("{v:e}");
    match sci.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => sci,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        let upd = ProgressUpdate::parse(r#"{"progreso": 57, "eta": "2m 10s"}"#).unwrap();
        assert_eq!(upd.progress, 57.0);
        assert_eq!(upd.eta, "2m 10s");
        assert!(!upd.is_complete());
    }

    #[test]
    fn ignores_extra_fields() {
        let upd = ProgressUpdate::parse(r#"{"progreso": 3, "eta": "", "archivo": "a.xlsx"}"#).unwrap();
        assert_eq!(upd.progress, 3.0);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for bad in [
            "",
            "not json",
            "[1, 2]",
            r#"{"eta": "1m"}"#,
            r#"{"progreso": 10}"#,
            r#"{"progreso": "10", "eta": "1m"}"#,
        ] {
            assert!(ProgressUpdate::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn completion_is_inclusive_and_tolerates_overshoot() {
        let at = ProgressUpdate { progress: 100.0, eta: "done".into() };
        let over = ProgressUpdate { progress: 150.0, eta: String::new() };
        let under = ProgressUpdate { progress: 99.9, eta: String::new() };
        assert!(at.is_complete());
        assert!(over.is_complete());
        assert!(!under.is_complete());
    }

    #[test]
    fn labels_match_number_rendering() {
        assert_eq!(percent_label(0.0), "0%");
        assert_eq!(percent_label(57.0), "57%");
        assert_eq!(percent_label(42.5), "42.5%");
        assert_eq!(percent_label(150.0), "150%");
        assert_eq!(percent_label(-3.0), "-3%");
        assert_eq!(percent_label(-0.0), "0%");
    }

    #[test]
    fn labels_switch_to_exponent_form_at_extremes() {
        assert_eq!(percent_label(1e20), "100000000000000000000%");
        assert_eq!(percent_label(1.2345678901234568e20), "123456789012345680000%");
        assert_eq!(percent_label(1e21), "1e+21%");
        assert_eq!(percent_label(-2.5e30), "-2.5e+30%");
        assert_eq!(percent_label(0.000001), "0.000001%");
        assert_eq!(percent_label(1.5e-7), "1.5e-7%");
        assert_eq!(percent_label(f64::INFINITY), "Infinity%");
    }
}
