//! Number formatting and parsing with JavaScript semantics.
//!
//! Rust's own `f64` formatting and `FromStr` are close to what scripts
//! expect but differ at the edges: exponent spelling, the `Infinity`
//! keyword, hex literals, and the lenient prefix parsing of `parseInt` and
//! `parseFloat`. Everything here follows the script-visible rules.

/// Format a number the way `String(n)` does.
pub fn format(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // Scripts expect an explicit sign on positive exponents.
        let mut s = format!("{n:e}");
        if let Some(pos) = s.find('e') {
            if s.as_bytes().get(pos + 1) != Some(&b'-') {
                s.insert(pos + 1, '+');
            }
        }
        s
    } else if n.trunc() == n {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

/// Parse a whole string the way `Number(s)` does.
///
/// Empty or all-whitespace input is zero; anything that is not exactly a
/// numeric literal (with optional surrounding whitespace) is NaN.
pub fn parse(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return parse_hex(hex);
    }
    let unsigned = t.strip_prefix(['+', '-']).unwrap_or(t);
    if unsigned == "Infinity" {
        return if t.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    // Rust accepts spellings like "inf" and "NaN" that scripts reject, so
    // validate the shape before handing off.
    if !is_decimal_literal(unsigned) {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// `parseInt(s, radix)` body. Radix 0 selects auto-detection (hex for a
/// `0x` prefix, decimal otherwise); the caller has already rejected radix
/// values outside 2..=36.
pub fn parse_int(s: &str, radix: u32) -> f64 {
    let t = s.trim_start();
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let mut digits = t;
    let mut radix = radix;
    if radix == 0 || radix == 16 {
        if let Some(rest) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            digits = rest;
            radix = 16;
        } else if radix == 0 {
            radix = 10;
        }
    }
    let mut value = 0.0f64;
    let mut any = false;
    for c in digits.chars() {
        match c.to_digit(radix) {
            Some(d) => {
                value = value * radix as f64 + d as f64;
                any = true;
            }
            None => break,
        }
    }
    if !any {
        return f64::NAN;
    }
    if negative { -value } else { value }
}

/// `parseFloat(s)` body: parse the longest decimal-literal prefix.
pub fn parse_float(s: &str) -> f64 {
    let t = s.trim_start();
    let b = t.as_bytes();
    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    if t[i..].starts_with("Infinity") {
        return if b[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let mut saw_digits = false;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
        saw_digits = true;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
            saw_digits = true;
        }
    }
    if !saw_digits {
        return f64::NAN;
    }
    // Take an exponent only if it is complete.
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_digits = j;
        while j < b.len() && b[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_digits {
            i = j;
        }
    }
    t[..i].parse::<f64>().unwrap_or(f64::NAN)
}

/// ToInt32: truncate and wrap into the signed 32-bit range.
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32: truncate and wrap into the unsigned 32-bit range.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    let m = n.trunc().rem_euclid(4294967296.0);
    m as u32
}

fn parse_hex(digits: &str) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value = 0.0f64;
    for c in digits.chars() {
        match c.to_digit(16) {
            Some(d) => value = value * 16.0 + d as f64,
            None => return f64::NAN,
        }
    }
    value
}

fn is_decimal_literal(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    let mut saw_digits = false;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
        saw_digits = true;
    }
    if i < b.len() && b[i] == b'.' {
        i += 1;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
            saw_digits = true;
        }
    }
    if !saw_digits {
        return false;
    }
    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        i += 1;
        if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
            i += 1;
        }
        let exp_digits = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_digits {
            return false;
        }
    }
    i == b.len()
}
