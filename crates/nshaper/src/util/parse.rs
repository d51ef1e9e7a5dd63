//! Argument parsing utilities.

/// Error type for parsing.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    #[error("number out of range: {0}")]
    OutOfRange(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("unknown unit: {0}")]
    UnknownUnit(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse a u32 from string.
pub fn get_u32(s: &str) -> Result<u32> {
    parse_int(s)
}

/// Parse a u64 from string.
pub fn get_u64(s: &str) -> Result<u64> {
    parse_int(s)
}

/// Generic integer parsing with hex support.
fn parse_int<T: std::str::FromStr + TryFrom<u64>>(s: &str) -> Result<T>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
    <T as TryFrom<u64>>::Error: std::fmt::Display,
{
    let s = s.trim();

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        let val =
            u64::from_str_radix(hex, 16).map_err(|e| ParseError::InvalidNumber(e.to_string()))?;
        return T::try_from(val).map_err(|e| ParseError::OutOfRange(e.to_string()));
    }

    s.parse()
        .map_err(|e| ParseError::InvalidNumber(format!("{}", e)))
}

/// Parse a rate in bits per second.
/// Supports suffixes: bit, kbit, mbit, gbit, tbit, bps, kbps, mbps, gbps, tbps
pub fn get_rate(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();
    let (num_str, unit) = split_number_unit(&s);
    let num = parse_float(num_str)?;

    let multiplier: u64 = match unit {
        "" | "bit" | "bps" => 1,
        "kbit" | "kbps" | "k" => 1000,
        "mbit" | "mbps" | "m" => 1_000_000,
        "gbit" | "gbps" | "g" => 1_000_000_000,
        "tbit" | "tbps" | "t" => 1_000_000_000_000,
        "kibit" | "kibps" => 1024,
        "mibit" | "mibps" => 1024 * 1024,
        "gibit" | "gibps" => 1024 * 1024 * 1024,
        _ => return Err(ParseError::UnknownUnit(unit.to_string())),
    };

    Ok((num * multiplier as f64) as u64)
}

/// Parse a packet rate in packets per second.
/// Supports suffixes: pps, kpps, mpps, gpps
pub fn get_pkt_rate(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();
    let (num_str, unit) = split_number_unit(&s);
    let num = parse_float(num_str)?;

    let multiplier: u64 = match unit {
        "" | "pps" => 1,
        "kpps" | "k" => 1000,
        "mpps" | "m" => 1_000_000,
        "gpps" | "g" => 1_000_000_000,
        _ => return Err(ParseError::UnknownUnit(unit.to_string())),
    };

    Ok((num * multiplier as f64) as u64)
}

/// Parse a size (bytes).
/// Supports suffixes: b, k, kb, m, mb, g, gb
pub fn get_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();
    let (num_str, unit) = split_number_unit(&s);
    let num = parse_float(num_str)?;

    let multiplier: u64 = match unit {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return Err(ParseError::UnknownUnit(unit.to_string())),
    };

    Ok((num * multiplier as f64) as u64)
}

fn parse_float(s: &str) -> Result<f64> {
    let num: f64 = s
        .parse()
        .map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
    if num < 0.0 {
        return Err(ParseError::OutOfRange(format!("{} is negative", s)));
    }
    Ok(num)
}

/// Split a string into number and unit parts.
fn split_number_unit(s: &str) -> (&str, &str) {
    let idx = s
        .find(|c: char| !c.is_ascii_digit() && c != '.' && c != '-')
        .unwrap_or(s.len());
    (&s[..idx], &s[idx..])
}
