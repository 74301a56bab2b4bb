//! # Retejo
//!
//! `retejo` is the HTTP API behind a multi-site content administration UI.
//! It answers three questions for an authenticated session:
//!
//! 1. **Which sites can I see?** — listings exclude the reserved system
//!    site, gate archived sites behind a flag, and are filtered/sorted by
//!    name (see [`sites`]).
//! 2. **Which site am I on?** — the per-session selection sticks while it
//!    remains valid and falls back to the first accessible site otherwise
//!    (see [`session`]).
//! 3. **Can I prove a password reset?** — a signed one-shot claim is
//!    validated and consumed against the user's pending reset (see
//!    [`token`] and [`users`]).
//!
//! Sites, grants, users, and sessions live in `PostgreSQL`; the DDL is in
//! `sql/schema.sql`. Site/grant administration and session issuance are
//! owned by other services; this one only reads them and mutates the
//! per-session selection and the user's password on a successful reset.

pub mod api;
pub mod cli;
pub mod i18n;
pub mod session;
pub mod sites;
pub mod token;
pub mod users;
