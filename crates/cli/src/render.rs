//! Plain-text and JSON rendering helpers.

use serde_json::Value;

/// Print an aligned text table: headers, a rule, then rows.
pub(crate) fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let pad = widths[i].saturating_sub(cell.chars().count());
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        println!("{}", padded.join("  ").trim_end());
    };

    line(headers.iter().map(|h| h.to_string()).collect());
    line(widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        line(row.clone());
    }
}

pub(crate) fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("serialization error: {e}"))
    );
}

/// Render a key/value detail view.
pub(crate) fn print_kv(rows: &[(&str, String)]) {
    let width = rows
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0);
    for (key, value) in rows {
        println!("{key:<width$}  {value}");
    }
}

/// Format an opaque amount value as money ("-$57.48", "$185.40").
///
/// The service returns amounts as either a string or a number; anything
/// unparseable is passed through untouched.
pub(crate) fn money_string(amount: Option<&Value>) -> String {
    let raw = match amount {
        None | Some(Value::Null) => return String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => return other.to_string(),
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let negative = trimmed.starts_with('-');
    let numeric = trimmed.trim_start_matches('-');
    match numeric.parse::<f64>() {
        Ok(n) => {
            let formatted = format!("{:.2}", n.abs());
            if negative {
                format!("-${formatted}")
            } else {
                format!("${formatted}")
            }
        }
        Err(_) => raw,
    }
}

/// Shorten a long opaque id for table output, keeping enough of both ends
/// to recognize it; JSON output always carries the full id.
pub(crate) fn shorten_id(id: &str) -> String {
    let id = id.trim();
    const MAX: usize = 18;
    const PREFIX: usize = 8;
    const SUFFIX: usize = 6;
    if id.chars().count() <= MAX || !id.is_ascii() {
        return id.to_string();
    }
    format!("{}..{}", &id[..PREFIX], &id[id.len() - SUFFIX..])
}

/// Compact one-line rendering of a JSON value for table cells.
pub(crate) fn value_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_string_formats_strings_and_numbers() {
        assert_eq!(money_string(Some(&json!("-57.48"))), "-$57.48");
        assert_eq!(money_string(Some(&json!(185.4))), "$185.40");
        assert_eq!(money_string(Some(&json!("0"))), "$0.00");
        assert_eq!(money_string(None), "");
        assert_eq!(money_string(Some(&Value::Null)), "");
    }

    #[test]
    fn shorten_id_keeps_short_ids_intact() {
        assert_eq!(shorten_id("t1"), "t1");
        let long = "0123456789abcdefghijklmnop";
        let short = shorten_id(long);
        assert!(short.len() < long.len());
        assert!(short.starts_with("01234567"));
        assert!(short.ends_with("klmnop"));
    }

    #[test]
    fn value_string_flattens_arrays() {
        assert_eq!(value_string(&json!(["a", "b"])), "a,b");
        assert_eq!(value_string(&json!(true)), "true");
        assert_eq!(value_string(&Value::Null), "null");
    }
}
