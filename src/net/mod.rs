//! Plain-TCP transport. TLS and multi-runtime support are out of scope;
//! this module is intentionally a thin wrapper rather than a
//! multi-runtime, TLS-capable indirection layer (see `DESIGN.md`).

pub(crate) mod socket;

pub use socket::Socket;
