//! Core systems for Arbor Sync.
//!
//! This crate provides the foundational components shared by the skeleton
//! selection widgets:
//!
//! - **Signal/Slot System**: Type-safe change notification, invoked
//!   synchronously (the synchronization protocol is single-threaded and
//!   cooperative; there is no event loop here)
//! - **Instance Registry**: Per-type bookkeeping of live widget instances
//!   with monotonically increasing widget numbers
//!
//! # Signal/Slot Example
//!
//! ```
//! use arbor_sync_core::Signal;
//!
//! let selection_changed = Signal::<usize>::new();
//!
//! let conn_id = selection_changed.connect(|count| {
//!     println!("{count} skeletons selected");
//! });
//!
//! selection_changed.emit(3);
//! selection_changed.disconnect(conn_id);
//! ```
//!
//! # Registry Example
//!
//! ```
//! use std::sync::Arc;
//! use arbor_sync_core::InstanceRegistry;
//!
//! struct MyWidget;
//!
//! let registry = InstanceRegistry::new();
//! let widget = Arc::new(MyWidget);
//! let id = registry.register(&widget);
//!
//! assert!(registry.first_instance_of::<MyWidget>().is_some());
//! registry.unregister(id);
//! ```

mod registry;
pub mod signal;

pub use registry::{InstanceRegistry, WidgetId};
pub use signal::{ConnectionGuard, ConnectionId, Signal};
