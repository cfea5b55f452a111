//! Provides parsing helpers for settings in the system configuration.

/// Parses a number of entries from a given string.
///
/// This string can have the following suffixes:
/// * **k** or **K**: multiplies the given value by 1000
/// * **m** or **M**: multiplies the given value by 1.000.000
///
/// Returns an **Err** if either a non-integer value is given, if an unknown suffix was provided
/// or if the resulting number doesn't fit into an **usize**.
///
/// # Examples
///
/// ```
/// assert_eq!(lruvault::fmt::parse_count("100").unwrap(), 100);
/// assert_eq!(lruvault::fmt::parse_count("8k").unwrap(), 8_000);
/// assert_eq!(lruvault::fmt::parse_count(" 4 M ").unwrap(), 4_000_000);
///
/// // An invalid suffix results in an error...
/// assert_eq!(lruvault::fmt::parse_count("3 g").is_err(), true);
///
/// // Decimal numbers result in an error...
/// assert_eq!(lruvault::fmt::parse_count("1.2k").is_err(), true);
///
/// // Negative numbers result in an error...
/// assert_eq!(lruvault::fmt::parse_count("-1").is_err(), true);
/// ```
pub fn parse_count(str: impl AsRef<str>) -> anyhow::Result<usize> {
    lazy_static::lazy_static! {
        static ref NUMBER_AND_SUFFIX: regex::Regex =
            regex::Regex::new(r"^ *(\d+) *([kKmM]?) *$").unwrap();
    }

    let captures = NUMBER_AND_SUFFIX.captures(str.as_ref()).ok_or_else(|| {
        anyhow::anyhow!(
            "Cannot parse '{}' into a count. \
             Expected a positive number and optionally 'k' or 'm' as suffix.",
            str.as_ref()
        )
    })?;

    let number = captures[1]
        .parse::<usize>()
        .map_err(|error| anyhow::anyhow!("Cannot parse '{}': {}", str.as_ref(), error))?;
    let factor = match &captures[2] {
        "k" | "K" => 1_000,
        "m" | "M" => 1_000_000,
        _ => 1,
    };

    number
        .checked_mul(factor)
        .ok_or_else(|| anyhow::anyhow!("The count '{}' is too large.", str.as_ref()))
}

#[cfg(test)]
mod tests {
    use crate::fmt::parse_count;

    #[test]
    fn overflows_are_detected() {
        assert_eq!(parse_count("99999999999999999999999").is_err(), true);
        assert_eq!(parse_count(format!("{}m", usize::MAX)).is_err(), true);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(parse_count("").is_err(), true);
        assert_eq!(parse_count("k").is_err(), true);
    }
}
