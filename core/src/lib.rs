/*!
# crystalball Core

Core library for crystalball, a capacity preview tool for HTCondor pools.

Given the shape of a batch of jobs, it answers how many of them the pool can
run at once and roughly how long the batch would take on an idle pool:

- Unit parsing for memory, disk and duration strings
- Slot records and the configurations derived from them
- A per-node catalog of distinct slot configurations
- Fit evaluation and multiplicity expansion for a job request
- Ranking, aggregation and batch completion estimates
- Slot sources for live queries and saved status listings
*/

pub mod catalog;
pub mod error;
pub mod estimate;
pub mod fit;
pub mod preview;
pub mod request;
pub mod slot;
pub mod source;
pub mod units;

pub use error::{CrystalBallError, Result};

pub use catalog::Catalog;
pub use fit::FitResult;
pub use preview::{preview, Outlook, PreviewResult};
pub use request::JobRequest;
pub use slot::{SlotConfiguration, SlotRecord, SlotType};
pub use source::SlotSource;
