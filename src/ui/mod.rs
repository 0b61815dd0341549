pub mod modern;
pub mod page;
pub mod pipe;
pub mod styles;

/// Fraction of the bar to fill for a width such as `"42%"`, clamped to
/// `0.0..=1.0`. Unparseable widths draw an empty bar.
pub fn width_ratio(width: Option<&str>) -> f64 {
    let Some(w) = width else { return 0.0 };
    match w.trim().trim_end_matches('%').trim().parse::<f64>() {
        Ok(v) if v.is_finite() => (v / 100.0).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::width_ratio;

    #[test]
    fn ratio_from_percent_width() {
        assert_eq!(width_ratio(None), 0.0);
        assert_eq!(width_ratio(Some("0%")), 0.0);
        assert!((width_ratio(Some("57%")) - 0.57).abs() < 1e-9);
        assert!((width_ratio(Some("42.5%")) - 0.425).abs() < 1e-9);
        assert_eq!(width_ratio(Some("150%")), 1.0);
        assert_eq!(width_ratio(Some("-3%")), 0.0);
        assert_eq!(width_ratio(Some("wide")), 0.0);
    }
}
