//! Concrete [`ValueTransferPort`](crate::ValueTransferPort) implementations.

pub mod internal;
