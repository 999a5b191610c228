use chrono::NaiveDate;

/// Fixed decimals with comma thousands separators: `28456.32` → `28,456.32`.
/// Ties round away from zero, so `0.125` becomes `0.13`.
pub fn grouped(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    let fixed = format!("{:.*}", decimals, (value.abs() * scale).round() / scale);
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    if value < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// `$28,456.32`
pub fn usd(value: f64) -> String {
    format!("${}", grouped(value, 2))
}

/// Price level as written in reports: `$170`, `$170.5`.
pub fn level(value: f64) -> String {
    format!("${value}")
}

/// Magnitude only; direction is shown separately. `-1.78` → `1.78%`.
pub fn change_pct(change: f64) -> String {
    format!("{:.2}%", change.abs())
}

/// Fraction in `[0, 1]` to a whole percent, rounding half up.
pub fn whole_percent(fraction: f64) -> i64 {
    (fraction * 100.0).round() as i64
}

/// `M/D/YYYY`
pub fn short_date(date: NaiveDate) -> String {
    date.format("%-m/%-d/%Y").to_string()
}

pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_inserts_separators() {
        assert_eq!(grouped(28456.32, 2), "28,456.32");
        assert_eq!(grouped(4587.64, 2), "4,587.64");
        assert_eq!(grouped(178.72, 2), "178.72");
        assert_eq!(grouped(1234567.0, 2), "1,234,567.00");
        assert_eq!(grouped(-1642.18, 2), "-1,642.18");
        assert_eq!(grouped(-0.001, 2), "0.00");
        assert_eq!(grouped(999.999, 2), "1,000.00");
    }

    #[test]
    fn grouped_rounds_ties_away_from_zero() {
        assert_eq!(grouped(0.125, 2), "0.13");
        assert_eq!(grouped(-0.125, 2), "-0.13");
        assert_eq!(usd(2.5), "$2.50");
        assert_eq!(grouped(0.5, 0), "1");
    }

    #[test]
    fn usd_and_levels() {
        assert_eq!(usd(28456.32), "$28,456.32");
        assert_eq!(usd(131.69), "$131.69");
        assert_eq!(level(170.0), "$170");
        assert_eq!(level(170.5), "$170.5");
    }

    #[test]
    fn change_is_absolute_two_decimals() {
        assert_eq!(change_pct(-1.78), "1.78%");
        assert_eq!(change_pct(3.2), "3.20%");
    }

    #[test]
    fn percent_rounds_to_nearest() {
        assert_eq!(whole_percent(0.82), 82);
        assert_eq!(whole_percent(0.785), 79);
        assert_eq!(whole_percent(0.654), 65);
    }

    #[test]
    fn short_date_drops_leading_zeros() {
        let d = NaiveDate::from_ymd_opt(2023, 10, 8).unwrap();
        assert_eq!(short_date(d), "10/8/2023");
    }

    #[test]
    fn capitalize_first_letter() {
        assert_eq!(capitalize("positive"), "Positive");
        assert_eq!(capitalize(""), "");
    }
}
