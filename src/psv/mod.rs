/*!
Reading of pipe-separated route-table records, as written by `bgpdump -m`.

```text
TABLE_DUMP2|1474983369|B|212.25.27.44|8758|0.0.0.0/0|8758 6830|IGP|212.25.27.44|0|0 |8758:110 8758:300|NAG| |
0           1          2 3            4    5         6         7   8            9 10 11                12  13
```

Only the modification time, peer IP, peer ASN, prefix and AS path are used. Every record is
grouped under the right-most AS of its (AS-SET expanded) path, the AS being reported on.
*/
mod iter;

pub use iter::DumpRecordIter;

use crate::error::DistillError;
use itertools::Itertools;
use std::borrow::Cow;
use std::str::FromStr;

pub const FIELD_DELIMITER: char = '|';

pub const TIME_INDEX: usize = 1;
pub const FROM_IP_INDEX: usize = 3;
pub const FROM_ASN_INDEX: usize = 4;
pub const PREFIX_INDEX: usize = 5;
pub const PATH_INDEX: usize = 6;

/// Records with fewer fields than this do not carry an AS path.
pub const MIN_FIELDS: usize = PATH_INDEX + 1;

/// Flatten AS-SETs in an AS path: `1234 5678 {357,2124}` becomes `1234 5678 357 2124`.
///
/// Braces are removed and every comma becomes a single space. Paths without a `{` are returned
/// unchanged.
pub fn expand_as_path(path: &str) -> Cow<'_, str> {
    if !path.contains('{') {
        return Cow::Borrowed(path);
    }
    Cow::Owned(
        path.chars()
            .filter(|c| *c != '{' && *c != '}')
            .map(|c| if c == ',' { ' ' } else { c })
            .collect(),
    )
}

/// Grouping key of an expanded AS path: its last token. Empty paths have an empty key.
pub fn derive_key(expanded_path: &str) -> &str {
    expanded_path.split_whitespace().last().unwrap_or("")
}

/// One parsed input line, kept as raw string fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    fields: Vec<String>,
}

impl DumpRecord {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn as_path(&self) -> &str {
        &self.fields[PATH_INDEX]
    }

    /// Replace the AS path field with its expanded form, see [expand_as_path].
    pub fn expand_as_path(&mut self) {
        if let Cow::Owned(expanded) = expand_as_path(&self.fields[PATH_INDEX]) {
            self.fields[PATH_INDEX] = expanded;
        }
    }

    /// The AS this record reports on, or `None` if the path is empty.
    ///
    /// Call [DumpRecord::expand_as_path] first so AS-SETs are taken into account.
    pub fn grouping_key(&self) -> Option<&str> {
        match derive_key(self.as_path()) {
            "" => None,
            key => Some(key),
        }
    }

    /// The record's fields joined back together with [FIELD_DELIMITER].
    pub fn to_line(&self) -> String {
        self.fields.iter().join(&FIELD_DELIMITER.to_string())
    }
}

impl FromStr for DumpRecord {
    type Err = DistillError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<String> = line.split(FIELD_DELIMITER).map(str::to_string).collect();
        if fields.len() < MIN_FIELDS {
            return Err(DistillError::MalformedRecord(format!(
                "expected at least {} fields, found {}: {:?}",
                MIN_FIELDS,
                fields.len(),
                line
            )));
        }
        Ok(DumpRecord { fields })
    }
}
