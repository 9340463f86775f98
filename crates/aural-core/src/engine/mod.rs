//! Real-time mixing core
//!
//! - Snapshot exchange: triple-buffered handoff of per-tick world state
//! - Buffer ring: per-source render slots stamped with the processing ID
//! - Render scheduler: lookahead submission and grace-bounded cancellation
//! - Mixer: rooms, ambients and the listener graph into one clipped period
//! - AudioRenderer: the device callback glue driving all of the above
//! - AudioEngine: the owned, simulation-side instance

mod drops;
mod engine;
mod exchange;
mod gc;
mod mixer;
mod renderer;
mod ring;
mod scheduler;
mod snapshot;
mod source;

pub use drops::*;
pub use engine::*;
pub use exchange::*;
pub use gc::*;
pub use mixer::*;
pub use renderer::*;
pub use ring::{BufferRing, BufferSlot, CancelToken, RenderOutcome, SlotBuffers, SlotState, NEVER_COMPLETED};
pub use scheduler::{Dispatch, RenderPool, RenderScheduler};
pub use snapshot::*;
pub use source::*;
