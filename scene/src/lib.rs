//! Participant-side core of the realtime scene relay.
//!
//! This crate turns local edits on a vector scene into room operations and
//! applies operations from peers without feeding them back out. It is
//! synchronous and knows nothing about sockets: a host passes inbound
//! [`frames::Frame`]s to a [`session::SyncSession`] and sends whatever frames
//! the session queues.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`doc`] | Scene objects, geometry, bounds, and the scene snapshot format |
//! | [`props`] | Flat wire properties and sparse property updates |
//! | [`registry`] | Stable object id assignment |
//! | [`codec`] | Operations to and from wire frames |
//! | [`echo`] | Echo guard window, origin filter, clocks |
//! | [`surface`] | Drawing-surface interface and the in-memory surface |
//! | [`apply`] | Applies remote operations under suppressed change events |
//! | [`selection`] | Remote selection overlay |
//! | [`transform`] | Group transforms flattened to per-object updates |
//! | [`history`] | Snapshot history, undo and clear |
//! | [`session`] | The participant runtime tying it all together |
//! | [`consts`] | Shared constants (echo window, history limit, defaults) |

pub mod apply;
pub mod codec;
pub mod consts;
pub mod doc;
pub mod echo;
pub mod history;
pub mod props;
pub mod registry;
pub mod selection;
pub mod session;
pub mod surface;
pub mod transform;
