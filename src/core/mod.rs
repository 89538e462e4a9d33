//! The HTM algorithms and the data they share.

pub mod anomaly;
pub mod column;
pub mod connections;
pub mod parameters;
pub mod persistence;
pub mod proximal;
pub mod random;
pub mod spatial_pooler;
pub mod temporal_memory;
pub mod topology;

pub use anomaly::{
    compute_raw_anomaly_score, Anomaly, LikelihoodEstimator, MovingAverage, SmoothedAnomaly,
};
pub use column::Column;
pub use connections::{
    Connections, DistalSegment, DistalSynapse, SegmentActivity, SegmentIdx, SynapseIdx,
};
pub use parameters::Parameters;
pub use proximal::{ProximalPool, ProximalSynapse};
pub use random::Random;
pub use spatial_pooler::SpatialPooler;
pub use temporal_memory::{ComputeCycle, ExcitedColumn, ExcitedColumns, TemporalMemory};
pub use topology::{NeighborhoodIter, Topology};
