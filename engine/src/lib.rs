//! Core state machines and orchestration for Gatehouse.
//!
//! This crate contains the auth orchestration engine without any transport
//! or platform dependencies, providing:
//!
//! - **State machine engine**: [`StateMachine`] owns one state cell per
//!   machine instance, drains a FIFO event queue on a single worker task,
//!   and schedules resolved actions for asynchronous execution
//! - **Resolvers**: pure `(state, event) -> (state, actions)` functions for
//!   every machine; the only place where "what happens next" is decided
//! - **Actions**: asynchronous units of work that read the
//!   [`AuthEnvironment`], perform effects, and report back exclusively by
//!   emitting new events
//! - **Credential store machine**: a second machine instance serializing
//!   every secret-store read/write behind [`CredentialStoreHandle`]
//! - **Facade**: [`AuthEngine`] with a command-ingestion boundary
//!   ([`AuthCommand`]) that rejects operations illegal in the current state
//!
//! # Architecture
//!
//! External callers enqueue events (directly or through [`AuthCommand`]);
//! the dispatcher feeds the top-level resolver, which delegates to nested
//! resolvers for whichever sub-state is active and re-wraps the result.
//! Each resolved action runs as an independent task and closes the loop by
//! enqueueing the events that describe its outcome. State mutation is
//! strictly single-threaded per machine: one event is fully resolved before
//! the next is accepted, no matter how many producers are enqueueing.
//!
//! Cancellation is cooperative: in-flight actions are wrapped in
//! [`futures_util::future::Abortable`] and aborted on reset; an aborted
//! action emits nothing, and a stray completion event arriving after its
//! machine moved on resolves to a no-op rather than an error.

mod actions;
mod credential_store;
mod engine;
mod environment;
mod machine;
mod resolvers;
mod srp;


pub use credential_store::{CredentialStoreHandle, StoreEnvironment};
pub use engine::{AuthCommand, AuthEngine};
pub use environment::{AuthEnvironment, Clock, SystemClock};
pub use machine::{ActionRunner, EventSender, MachineHandle, Resolution, Resolver, StateMachine};
pub use srp::{PasswordClaim, PasswordClaimRequest, SrpSuite, claim_timestamp};
