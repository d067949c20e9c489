const NOT_AVAILABLE: &str = "N/A";

/// Format a USD amount: grouped thousands for amounts of at least one dollar,
/// up to eight significant decimals for sub-dollar prices.
pub fn fmt_money(value: Option<f64>, decimals: usize) -> String {
    let Some(v) = value.filter(|v| v.is_finite()) else {
        return NOT_AVAILABLE.to_string();
    };

    let sign = if v < 0.0 { "-" } else { "" };

    if v.abs() >= 1.0 {
        let formatted = format!("{:.*}", decimals, v.abs());
        return format!("{}${}", sign, group_thousands(&formatted));
    }

    let small = format!("{:.8}", v.abs());
    let trimmed = small.trim_end_matches('0').trim_end_matches('.');
    // Rounded away entirely: no sign on zero
    let sign = if trimmed == "0" { "" } else { sign };
    format!("{}${}", sign, trimmed)
}

/// Signed percentage with two decimals (`+2.50%`, `-0.10%`)
pub fn fmt_pct(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:+.2}%", v),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Insert `,` between groups of three digits of the integer part
pub fn group_thousands(number: &str) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (number, None),
    };

    let digits = int_part.len();
    let mut grouped = String::with_capacity(digits + digits / 3 + 4);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    grouped
}

/// Minimal escaping for text embedded in HTML-formatted messages
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
