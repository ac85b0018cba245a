//! femtoscope-io: event input and results output.
//!
//! Events enter as JSON lines, one event per line; accumulated results
//! leave as a single JSON document. The accumulation core in
//! femtoscope-algorithms does not depend on any of this.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{Error, Result};
pub use reader::{read_events, EventFileReader};
pub use writer::{write_results, CellExport, ChannelExport, ResultsDocument, SideExport};
