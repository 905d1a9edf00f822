/*!
Reduction of a stored blob (newline separated raw records) into an [AggregatedRecord].

Parsing here is best effort: an integer field that does not parse is logged and left at zero, an
AS path token that does not parse is logged and left out of the path.
*/
use crate::error::DistillError;
use crate::models::{AggregatedRecord, SeenAsPath};
use crate::psv::{
    FIELD_DELIMITER, FROM_ASN_INDEX, FROM_IP_INDEX, MIN_FIELDS, PATH_INDEX, PREFIX_INDEX,
    TIME_INDEX,
};
use itertools::Itertools;
use log::warn;
use std::fmt::Display;
use std::str::FromStr;

/// Field lists of every usable record in `blob`.
fn record_fields<'a>(blob: &'a str) -> impl Iterator<Item = Vec<&'a str>> + 'a {
    blob.split('\n')
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let values: Vec<&str> = line.split(FIELD_DELIMITER).collect();
            if values.len() < MIN_FIELDS {
                warn!("ignoring stored record with {} fields: {:?}", values.len(), line);
                return None;
            }
            Some(values)
        })
}

fn parse_or_default<T>(value: &str, field: &str) -> T
where
    T: FromStr + Default,
    T::Err: Display,
{
    value.parse().unwrap_or_else(|e| {
        warn!("failed to convert {} {:?}; {}", field, value, e);
        T::default()
    })
}

/// Parse the AS numbers of a path, dropping any braces left over from AS-SET notation.
pub fn parse_as_path(path: &str) -> Vec<u32> {
    path.split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| token.trim_matches(|c: char| c == '{' || c == '}'))
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<u32>() {
            Ok(asn) => Some(asn),
            Err(e) => {
                warn!("failed to convert AS {:?}; {}", token, e);
                None
            }
        })
        .collect()
}

/// Every record in `blob` as a path observation, in stored order.
pub fn system_paths(blob: &str) -> Vec<SeenAsPath> {
    record_fields(blob)
        .map(|values| SeenAsPath {
            modification_time: parse_or_default(values[TIME_INDEX], "modification time"),
            from_ip: values[FROM_IP_INDEX].to_string(),
            from_asn: parse_or_default(values[FROM_ASN_INDEX], "peer ASN"),
            prefix: values[PREFIX_INDEX].to_string(),
            as_path: parse_as_path(values[PATH_INDEX]),
        })
        .collect()
}

/// Distinct prefixes in `blob`, in the order they first appear.
pub fn unique_prefixes(blob: &str) -> Vec<String> {
    record_fields(blob)
        .map(|values| values[PREFIX_INDEX])
        .unique()
        .map(str::to_string)
        .collect()
}

/// Build the summary of the AS `key` from its stored blob.
///
/// Fails with [DistillError::InvalidAsn] when `key` is not an AS number.
pub fn aggregate_record(key: &str, blob: &str) -> Result<AggregatedRecord, DistillError> {
    let autonomous_system = key
        .parse::<u32>()
        .map_err(|_| DistillError::InvalidAsn(key.to_string()))?;

    Ok(AggregatedRecord {
        autonomous_system,
        autonomous_system_paths: system_paths(blob),
        prefixes: unique_prefixes(blob),
    })
}
