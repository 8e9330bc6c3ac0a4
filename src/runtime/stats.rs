//! Parsers for the cgroup v2 files the runtime reads to report usage.
//!
//! Only the fields that feed [`super::RawStats`] are extracted:
//!
//! - `cpu.stat`: `usage_usec`, the cumulative CPU time of the cgroup.
//! - `memory.stat`: `inactive_file`, subtracted from the usage to get the working set.
//! - `memory.current`: the total memory charged to the cgroup.
//!
//! Unknown keys are ignored. Known keys must appear at most once and carry an
//! unsigned integer value.

use std::io::BufRead;

use super::StatParseError;

/// Values read from `cpu.stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CpuStat {
    /// Total CPU time (user + system) in microseconds.
    pub usage_usec: u64,
}

impl CpuStat {
    pub fn from_reader<R: BufRead>(buf: &mut R) -> Result<Self, StatParseError> {
        let mut usage_usec = None;
        for_each_field(buf, |key, value, line| match key {
            "usage_usec" => set_field(&mut usage_usec, key, value, line),
            _ => Ok(()),
        })?;

        Ok(Self {
            usage_usec: usage_usec.ok_or(StatParseError::MissingField("usage_usec"))?,
        })
    }
}

/// Values read from `memory.stat`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryStat {
    /// Page cache that has not been accessed recently and can be reclaimed.
    pub inactive_file: u64,
}

impl MemoryStat {
    pub fn from_reader<R: BufRead>(buf: &mut R) -> Result<Self, StatParseError> {
        let mut inactive_file = None;
        for_each_field(buf, |key, value, line| match key {
            "inactive_file" => set_field(&mut inactive_file, key, value, line),
            _ => Ok(()),
        })?;

        Ok(Self {
            inactive_file: inactive_file.unwrap_or_default(),
        })
    }
}

/// The value of `memory.current`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryCurrent {
    pub usage_bytes: u64,
}

impl MemoryCurrent {
    pub fn from_reader<R: BufRead>(buf: &mut R) -> Result<Self, StatParseError> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let value = line.trim();
        let usage_bytes = value
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidValue {
                value: value.to_owned(),
                line: 1,
                source,
            })?;

        Ok(Self { usage_bytes })
    }
}

/// Calls `f` with every whitespace-separated key-value pair and its 1-based line number.
///
/// Lines with fewer than two fields are skipped.
fn for_each_field<R, F>(buf: &mut R, mut f: F) -> Result<(), StatParseError>
where
    R: BufRead,
    F: FnMut(&str, &str, usize) -> Result<(), StatParseError>,
{
    let mut line = String::new();
    let mut lineno = 0;
    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
            f(key, value, lineno)?;
        }
        line.clear();
    }

    Ok(())
}

fn set_field(
    slot: &mut Option<u64>,
    key: &str,
    value: &str,
    line: usize,
) -> Result<(), StatParseError> {
    if slot.is_some() {
        return Err(StatParseError::DuplicateField {
            field: key.to_owned(),
            line,
        });
    }
    let parsed = value
        .parse::<u64>()
        .map_err(|source| StatParseError::InvalidKeyValue {
            key: key.to_owned(),
            value: value.to_owned(),
            line,
            source,
        })?;
    *slot = Some(parsed);

    Ok(())
}
