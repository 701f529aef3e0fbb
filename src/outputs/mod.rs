//! Files written after a run.
//!
//! - [`json`]: one JSON record per successful run, grouped by date and edition
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── morning.json
//!     ├── afternoon.json
//!     └── evening.json
//! ```

pub mod json;
