//! Feature pipeline
//!
//! Point-in-time resolution, fixture join, temporal split, mirroring and
//! diff/ratio derivation.

pub mod diff_ratio;
pub mod joiner;
pub mod mirror;
pub mod resolver;
pub mod split;

pub use diff_ratio::{DiffRatioTransformer, FeatureRow, FeatureTable};
pub use joiner::{DroppedFixture, JoinDiagnostics, JoinedRow, JoinedTable, MatchJoiner, Side};
pub use mirror::mirror;
pub use resolver::{BlendPolicy, Lookup, MissingHistory, PointInTimeResolver, ResolvedStats};
pub use split::{TemporalSplit, TemporalSplitter, ValidationWindow};
