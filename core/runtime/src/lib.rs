//! Deterministic sandbox substrate (spec.md §4.6).
//!
//! Nine invariants bound everything that runs inside a sandboxed region:
//!
//! 1. No wall-clock reads (`SystemTime::now`, `Instant::now`).
//! 2. No randomness.
//! 3. No locale- or timezone-dependent formatting.
//! 4. No direct filesystem or network I/O.
//! 5. No process environment access.
//! 6. No iteration order that depends on memory addresses or hashing seeds.
//! 7. The only suspension points are `GuestApi::query` and `::query_fast`.
//! 8. At most one sandboxed call is in flight per `Sandbox` at a time.
//! 9. A sandboxed call either runs to completion or returns an error; it
//!    never leaves partially-applied side effects visible outside the
//!    enclosing SQL transaction.
//!
//! Invariants 1-6 are enforced structurally: [`GuestApi`] is the only
//! capability surface reachable from inside the sandbox, and it simply does
//! not expose a clock, an RNG, or I/O primitives. Invariants 7-9 are
//! enforced by [`Sandbox`] itself and by the processor built on top of it.

mod guest;
mod sandbox;

pub use guest::{GuestApi, LegacyQuery, QueryError, QueryOutcome, QueryParam, QueryRow, QueryValue};
pub use sandbox::Sandbox;
