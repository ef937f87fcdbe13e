//! Skeleton selection and synchronization for neuron reconstruction tools.
//!
//! Several independent widgets (a selection table, a 3D viewer, a
//! connectivity view) each hold their own notion of "which skeletons are
//! selected, with what visibility and color". This crate keeps them
//! consistent: widgets implement the [`SkeletonSource`] protocol and link
//! to each other, and updates propagate through the link graph with a
//! visited-set guard so cyclic graphs terminate after touching each widget
//! once.
//!
//! - [`SkeletonModel`]: the per-widget snapshot of one skeleton's display
//!   state. Cloned at every hand-off; widgets never alias models.
//! - [`SkeletonSource`]: the capability trait plus the link/propagation
//!   machinery ([`SourceLink`], [`SourceChain`]).
//! - [`SelectionStore`]: ordered model storage with merge, filter and sort
//!   semantics and a change signal for the view layer.
//! - [`SelectionTable`]: the canonical concrete source, backed by a
//!   [`ServerClient`](arbor_sync_net::ServerClient) for neuron name and
//!   review status lookups.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use arbor_sync::{Color, SelectionStore, SkeletonModel};
//!
//! let store = SelectionStore::new();
//! let model = SkeletonModel::new(10, "DA1-left", Color::new(1.0, 0.0, 0.0));
//! store.append(&HashMap::from([(10, model)]));
//!
//! store.set_filter("DA1");
//! assert_eq!(store.display_len(), 1);
//! ```

mod model;
mod palette;
mod source;
mod store;
mod table;

pub use model::{Color, Hsl, SkeletonId, SkeletonModel};
pub use palette::Palette;
pub use source::{SkeletonSource, SourceChain, SourceId, SourceLink};
pub use store::SelectionStore;
pub use table::{SelectionTable, SynapseSide};
