/*!
bgp-distill groups route-table dump records by the autonomous system (AS) they report on and
writes one JSON summary per AS: every AS path it was seen over and the distinct prefixes it
announced.

# Input

The input is the pipe-separated output of `bgpdump -m`, one route per line:

```text
TABLE_DUMP2|1474983369|B|212.25.27.44|8758|0.0.0.0/0|8758 6830|IGP|212.25.27.44|0|0||NAG||
```

Each record is grouped under the right-most AS of its path (`6830` above), after any AS-SET
(`{357,2124}`) has been flattened into plain path members. Raw MRT dumps can be converted first
with [bgpdump::bgpdump_to_psv].

# Pipeline

Records are appended to a scratch [store::KeyValueStore] keyed by AS. Appends are issued
asynchronously, with at most [distill::DEFAULT_BATCH_SIZE] in flight at once, and the first
failed append aborts the run. After ingestion every key is read back, reduced to an
[models::AggregatedRecord] and written to the output JSON array.

```no_run
use bgp_distill::{distill_file, DistillConfig};
use std::path::Path;

let summary = distill_file(
    Path::new("rib.20160927.csv"),
    Path::new("rib.20160927.json"),
    &DistillConfig::default(),
)
.unwrap();
println!("{} records, {} ASes", summary.records, summary.autonomous_systems);
```

# Output

```json
[
  {
    "AutonomousSystem": 6830,
    "AutonomousSystemPaths": [
      {
        "ModificationTime": 1474983369,
        "FromIP": "212.25.27.44",
        "FromASN": 8758,
        "Prefix": "0.0.0.0/0",
        "AutonomousSystemPath": [8758, 6830]
      }
    ],
    "Prefixes": ["0.0.0.0/0"]
  }
]
```
*/

pub mod bgpdump;
pub mod distill;
pub mod error;
pub mod io;
pub mod models;
pub mod psv;
pub mod store;
pub mod utils;

pub use distill::{distill_file, DistillConfig, DistillSummary};
pub use error::{DistillError, StoreError};
pub use models::{AggregatedRecord, SeenAsPath};
pub use psv::{derive_key, expand_as_path, DumpRecord};
pub use store::KeyValueStore;
