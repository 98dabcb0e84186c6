mod date_inference;
mod derive;
mod error;
mod ingest;
mod obhistory_table;
mod observation;
mod reconcile;
mod source;

pub use date_inference::*;
pub use derive::*;
pub use error::*;
pub use ingest::*;
pub use obhistory_table::*;
pub use observation::*;
pub use reconcile::{find_gaps, merge_observations, HourGap};
pub use source::*;

#[cfg(test)]
pub(crate) use reconcile::fixtures::raw as raw_observation;
