/// Format a float as a German euro amount: 1.234,56 €
pub fn euro(val: f64) -> String {
    let negative = val < 0.0 && (val * 100.0).round() != 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part} €")
    } else {
        format!("{grouped},{dec_part} €")
    }
}
