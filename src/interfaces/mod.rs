//! Outer adapters: CSV command input, seat map output and the batch runner
//! that maps one onto the other through the booking service.

pub mod batch;
pub mod csv;
