/// Data layer: catalog types, loading, name matching, AMR sample selection.
///
/// Architecture:
/// ```text
///  asteca_output.dat    literature.{csv,json,parquet}    crossmatch.csv
///         │                        │                          │
///         ▼                        ▼                          ▼
///   ┌──────────┐             ┌──────────┐               ┌──────────┐
///   │  loader   │            │  loader   │              │  loader   │
///   └──────────┘             └──────────┘               └──────────┘
///         │                        │                          │
///         └──────────┬─────────────┘                          │
///                    ▼                                        │
///             ┌────────────┐                                  │
///             │  matching   │  cluster name → literature row  │
///             └────────────┘                                  │
///                    │                                        │
///                    ▼                                        ▼
///             params::build_params  ◄─────────────────────────┘
///                    │
///                    ▼
///             ┌──────────┐
///             │  filter   │  clusters entering the AMR
///             └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod matching;
pub mod model;
