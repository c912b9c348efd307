/// Data layer: core types, loading, caching and range selection.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read table → observations → parse dates, coerce numbers
///   └──────────┘
///        │            ▲
///        ▼            │ memoized per source
///   ┌──────────┐  ┌──────────┐
///   │ Dataset   │  │  cache    │
///   └──────────┘  └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  year extraction, year-range selection
///   └──────────┘
/// ```

pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
pub mod parse;
