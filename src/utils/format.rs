/// Render a range value through a display template.
///
/// Supported tokens:
/// - `{value}` -> the value in its plain form (`3.0`, `-0.5`)
/// - `{value:SPEC}` -> the value formatted with a small subset of the usual
///   format-spec grammar: `[+][.precision][f|d]`, e.g. `{value:+.1f}`, `{value:d}`
/// - `{unit}` -> the `unit` argument
/// - `{{` / `}}` -> literal braces
///
/// Notes:
/// - Unknown tokens are left intact to aid debugging.
/// - Returns `None` when a `{value:...}` spec cannot be interpreted, so the
///   caller can fall back to the plain rendering.
pub fn render_template(template: &str, value: f64, unit: &str) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 8);
    let mut idx = 0;
    let bytes = template.as_bytes();

    while idx < bytes.len() {
        match bytes[idx] {
            b'{' if bytes.get(idx + 1) == Some(&b'{') => {
                out.push('{');
                idx += 2;
            }
            b'}' if bytes.get(idx + 1) == Some(&b'}') => {
                out.push('}');
                idx += 2;
            }
            b'{' => {
                let Some(end) = find_byte(bytes, b'}', idx + 1) else {
                    // No matching end, push rest and stop
                    out.push_str(&template[idx..]);
                    break;
                };
                let token = &template[idx + 1..end];
                match token.split_once(':') {
                    None if token == "value" => out.push_str(&format_plain(value)),
                    None if token == "unit" => out.push_str(unit),
                    Some(("value", spec)) => out.push_str(&format_with_spec(value, spec)?),
                    _ => out.push_str(&template[idx..=end]),
                }
                idx = end + 1;
            }
            _ => {
                // Copy up to the next brace in one go (keeps multi-byte chars intact)
                let next = bytes[idx..]
                    .iter()
                    .position(|b| *b == b'{' || *b == b'}')
                    .map_or(bytes.len(), |p| idx + p.max(1));
                out.push_str(&template[idx..next]);
                idx = next;
            }
        }
    }

    Some(out)
}

/// Plain rendering of a number: integral values keep one decimal (`3.0`),
/// everything else uses the shortest round-trip form.
pub fn format_plain(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

fn format_with_spec(value: f64, spec: &str) -> Option<String> {
    let (plus, rest) = match spec.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, spec),
    };

    let (precision, ty) = match rest.strip_prefix('.') {
        Some(tail) => {
            let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
            if digits == 0 {
                return None;
            }
            let precision: usize = tail[..digits].parse().ok()?;
            (Some(precision), &tail[digits..])
        }
        None => (None, rest),
    };

    let rendered = match (ty, precision) {
        ("d", None) => {
            let n = value.round() as i64;
            if plus { format!("{n:+}") } else { n.to_string() }
        }
        ("f" | "", Some(p)) => {
            if plus {
                format!("{:+.*}", p, value)
            } else {
                format!("{:.*}", p, value)
            }
        }
        ("f", None) => {
            if plus {
                format!("{value:+.6}")
            } else {
                format!("{value:.6}")
            }
        }
        ("", None) => {
            let plain = format_plain(value);
            if plus && value >= 0.0 { format!("+{plain}") } else { plain }
        }
        _ => return None,
    };
    Some(rendered)
}

fn find_byte(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack[from..]
        .iter()
        .position(|b| *b == needle)
        .map(|p| from + p)
}
