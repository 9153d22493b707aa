//! Single cron field parsing.

pub(super) const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
pub(super) const WEEKDAYS: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Allowed range and symbolic names of one field.
pub(super) struct Bounds {
    pub name: &'static str,
    pub min: u32,
    pub max: u32,
    /// Names mapped to `min + index`.
    pub names: &'static [&'static str],
}

pub(super) const MINUTE: Bounds = Bounds { name: "minute", min: 0, max: 59, names: &[] };
pub(super) const HOUR: Bounds = Bounds { name: "hour", min: 0, max: 23, names: &[] };
pub(super) const DAY: Bounds = Bounds { name: "day-of-month", min: 1, max: 31, names: &[] };
pub(super) const MONTH: Bounds = Bounds { name: "month", min: 1, max: 12, names: MONTHS };
// 7 is accepted as Sunday and folded onto 0 by the caller.
pub(super) const WEEKDAY: Bounds = Bounds { name: "day-of-week", min: 0, max: 7, names: WEEKDAYS };

/// Parses one field (`*`, `?`, `a`, `a-b`, `*/n`, `a-b/n`, `a/n`, comma lists) into a bitset.
pub(super) fn parse(field: &str, bounds: &Bounds) -> Result<u64, String> {
    let mut bits = 0u64;
    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty item in {} field {field:?}", bounds.name));
        }
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step {step:?} in {} field", bounds.name))?;
                if step == 0 {
                    return Err(format!("zero step in {} field", bounds.name));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" || range == "?" {
            (bounds.min, bounds.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (value(a, bounds)?, value(b, bounds)?)
        } else {
            let v = value(range, bounds)?;
            if step.is_some() { (v, bounds.max) } else { (v, v) }
        };
        if lo > hi {
            return Err(format!("descending range {range:?} in {} field", bounds.name));
        }

        let step = step.unwrap_or(1) as usize;
        for v in (lo..=hi).step_by(step) {
            bits |= 1 << v;
        }
    }
    Ok(bits)
}

fn value(s: &str, bounds: &Bounds) -> Result<u32, String> {
    let v = match s.parse::<u32>() {
        Ok(v) => v,
        Err(_) => bounds
            .names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(s))
            .map(|i| bounds.min + i as u32)
            .ok_or_else(|| format!("unknown {} value {s:?}", bounds.name))?,
    };
    if v < bounds.min || v > bounds.max {
        return Err(format!(
            "{} value {v} out of range {}-{}",
            bounds.name, bounds.min, bounds.max
        ));
    }
    Ok(v)
}
