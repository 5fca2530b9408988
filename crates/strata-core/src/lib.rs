//! The core interface of the migration engine.
//!
//! * [`dialect`] is the closed set of supported database engines, each with
//!   its capability flags, tracking-table templates and statement splitting.
//! * [`executor`] is the seam to a database client: something that can run
//!   SQL text on one connection and open such connections.
//! * [`tracking`] reads and writes the version tracking table through a
//!   dialect's templates.
//! * [`source`] discovers version folders and the script units inside them.
//! * [`token`] is `${NAME}` substitution.
//! * [`report`] is the serializable outcome of a run.
pub mod bulk;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod report;
pub mod source;
pub mod token;
pub mod tracking;
pub mod version;
