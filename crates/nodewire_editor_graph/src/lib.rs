// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed dataflow graph for the Nodewire editor.
//!
//! Users place nodes whose fields can be wired together so values flow
//! from one field to the next, subject to type and topology rules.
//!
//! ## Architecture
//!
//! - [`ValueType`] is the closed set of field kinds and their coercions
//! - [`Field`] is a typed slot that owns its outgoing dataflow connections
//! - [`NodeType`] is a named schema; [`EditorNode`] is a placed instance
//! - [`GlobalSection`] is a freestanding bag of fields
//! - [`GraphEditor`] owns all of the above and implements the whole-graph
//!   rules: connection gestures, cycle prevention, propagation, consistency
//!   repair and snapshots
//! - [`GraphSession`] binds an editor to a [`GraphStore`] and an [`AuthSignal`]

pub mod connection;
pub mod editor;
pub mod expression;
pub mod field;
pub mod gesture;
pub mod global;
pub mod node;
pub mod node_type;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod value;

pub use connection::{
    ConnectionId, ConnectionOutcome, EditorConnection, FieldConnection, NodeConnection, RejectReason,
};
pub use editor::{EditorError, FieldOwner, GraphEditor, GraphInfo};
pub use expression::{DisabledEngine, ExpressionEngine, ExpressionError, JsExpressionEngine};
pub use field::{Field, FieldId, FieldSchema, RefreshTimer};
pub use gesture::{ConnectionGesture, GestureSource, Sourcing};
pub use global::GlobalSection;
pub use node::{EditorNode, NodeId, Position};
pub use node_type::{NodeType, NodeTypeRegistry};
pub use session::{GraphSession, SessionError};
pub use settings::EditorSettings;
pub use snapshot::GraphSnapshot;
pub use store::{AuthSignal, GraphStore, StaticAuth, StoreError, StoredGraph};
pub use value::{ValidationError, ValueType};
