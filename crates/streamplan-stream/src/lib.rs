//! # Streamplan Stream
//!
//! Streams wrap external procedures that sample, test or compute values,
//! together with the facts they require and certify.
//!
//! - [`Stream`] and [`StreamInfo`] - declarations
//! - [`Procedure`] - the external callable, built from closures with
//!   [`from_gen_fn`], [`from_list_fn`], [`from_fn`], [`from_test`] and [`from_function`]
//! - [`StreamSession`] - memoized instances, results and optimistic objects

pub mod instance;
pub mod procedure;
pub mod result;
pub mod session;
pub mod statistics;
pub mod stream;

pub use instance::StreamInstance;
pub use procedure::{
    from_fallible_gen_fn, from_fn, from_function, from_gen_fn, from_list_fn, from_test,
    from_wild_gen_fn, universe_test, OutputGenerator, Procedure, ProcedureError, ProcedureResult,
    StreamOutput,
};
pub use result::StreamResult;
pub use session::StreamSession;
pub use statistics::{StreamCounts, StreamStatistics};
pub use stream::{PrecomputedOutputs, Stream, StreamBuilder, StreamInfo, StreamKind};
