//! Generation pipeline
//!
//! Stages, leaf first:
//! - `cluster`: per-participant clustering and fingerprinting
//! - `diff`: clusters changed since the last committed generation
//! - `wepcc`: argument records and the persuasiveness schema
//! - `cross_match`: counterclaims against other participants' claims
//! - `coverage`: folding match strengths into shadow coverage
//! - `aggregate`: per-participant scores and ranking
//!
//! `controller` drives them on a single worker task, broadcasting
//! `events` through a `sink` and honouring `cancel` tokens between stages.

pub mod aggregate;
pub mod cancel;
pub mod cluster;
pub mod controller;
pub mod coverage;
pub mod cross_match;
pub mod diff;
pub mod events;
pub mod sink;
pub mod wepcc;


pub use aggregate::{
    aggregate, check_sufficiency, ClusterContribution, ContributionKind, InsufficientData,
    ParticipantScore, Scoreboard, ScoringOutcome,
};
pub use cancel::GenerationToken;
pub use cluster::{fingerprint, Cluster, ClusterEngine, Clustering};
pub use controller::{
    ControllerError, GenerationController, GenerationHandle, IncomingMessage, PipelineError,
};
pub use coverage::{fold, shadow_coverage, CoverageMap};
pub use cross_match::{cross_match, ModulatorEntry, ModulatorMap};
pub use diff::diff;
pub use events::GenerationEvent;
pub use sink::{CollectingSink, EventSink, NullSink, Observer, SessionBroadcaster};
pub use wepcc::{collect_records, Persuasiveness, RecordCache, RecordSet, WepccRecord};
