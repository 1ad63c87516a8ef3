use std::time::Duration;

use crate::constants::timeouts::{DAY, HOUR, MINUTE, MONTH, WEEK, YEAR};
use crate::error::Error;

/// Parse a user-supplied mute duration.
///
/// Returns `Ok(None)` for an indefinite mute (`""`, `none`, `forever`,
/// `no limit`). Accepts `90m`, `2h`, `3 days`, `1 week later`, `6mo`, `1y`;
/// a bare number counts minutes.
pub fn parse_duration(input: &str) -> Result<Option<Duration>, Error> {
    let text = input.trim().to_ascii_lowercase();
    let text = text.strip_suffix("later").unwrap_or(&text).trim();

    if matches!(text, "" | "none" | "forever" | "no limit" | "nolimit" | "indefinite") {
        return Ok(None);
    }

    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (amount, unit) = text.split_at(split);

    if amount.is_empty() {
        return Err(Error::invalid(format!("duration '{}' has no amount", input.trim())));
    }
    let amount: u32 = amount
        .parse()
        .map_err(|_| Error::invalid(format!("duration amount '{}' is too large", amount)))?;
    if amount == 0 {
        return Err(Error::invalid("duration must be greater than zero"));
    }

    let unit = match unit.trim() {
        "" | "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "week" | "weeks" => WEEK,
        "mo" | "month" | "months" => MONTH,
        "y" | "yr" | "year" | "years" => YEAR,
        other => {
            return Err(Error::invalid(format!("unknown duration unit '{}'", other)));
        }
    };

    unit.checked_mul(amount)
        .map(Some)
        .ok_or_else(|| Error::invalid(format!("duration '{}' is too large", input.trim())))
}
