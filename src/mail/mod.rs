pub mod accounts;
pub mod address;
pub mod cache;
pub mod identity;
pub mod pipeline;
pub mod rank;
pub mod scan;
pub mod store;
pub mod threading;
pub mod types;

pub use accounts::{ThreadFeatures, detect_accounts};
pub use identity::{IdentityConfig, IdentityInference, MyAddress, Outcome, infer_my_addresses};
pub use pipeline::Analysis;
pub use rank::{DomainRank, DomainRanks, NoRanks};
pub use scan::scan_archive;
pub use store::{IngestReport, MessageStore};
pub use threading::{ThreadRoots, group, resolve};
pub use types::{Account, MessageRecord, Thread};
