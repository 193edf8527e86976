//! The reference HTTP South listener: accepts POSTed readings from
//! south-side collectors and hands them to an ingress buffer.

pub mod ingress;
pub mod server;

pub use ingress::{EnqueueOutcome, IncomingReading, IngressSink};
pub use server::{HttpSouthConfig, HttpSouthListener};
