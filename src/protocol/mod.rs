//! Line-level protocol parsing and the authentication/redirect handshakes
//! built on top of it (`spec.md` §4.2–§4.7).

pub(crate) mod auth;
pub(crate) mod escape;
pub(crate) mod header;
pub(crate) mod line;
pub(crate) mod redirect;
pub(crate) mod soheader;
pub(crate) mod tuple;

pub use header::{HeaderLine, HeaderName};
pub use line::LineType;
pub use soheader::{SoHeader, SoHeaderKind};
pub use tuple::TupleRow;
