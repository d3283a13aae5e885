// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session: an editor plus the store and auth boundaries.
//!
//! The session owns everything that must not end up in a snapshot: the
//! signed-in user and the cached listing of remote graphs. Loading a graph
//! replaces the editor's whole state in one step.

use crate::editor::GraphEditor;
use crate::snapshot::GraphSnapshot;
use crate::store::{AuthSignal, GraphStore, StoreError, StoredGraph};
use crate::value::ValidationError;
use uuid::Uuid;

/// Editor bound to a graph store
#[derive(Debug)]
pub struct GraphSession<S, A> {
    editor: GraphEditor,
    store: S,
    auth: A,
    remote_graphs: Vec<StoredGraph>,
}

impl<S: GraphStore, A: AuthSignal> GraphSession<S, A> {
    /// Create a session around an editor
    pub fn new(editor: GraphEditor, store: S, auth: A) -> Self {
        Self {
            editor,
            store,
            auth,
            remote_graphs: Vec::new(),
        }
    }

    /// The editor
    pub fn editor(&self) -> &GraphEditor {
        &self.editor
    }

    /// The editor, for local edits
    pub fn editor_mut(&mut self) -> &mut GraphEditor {
        &mut self.editor
    }

    /// The store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether a user is signed in
    pub fn is_authenticated(&self) -> bool {
        self.auth.current_user().is_some()
    }

    /// Graphs seen at the last listing
    pub fn remote_graphs(&self) -> &[StoredGraph] {
        &self.remote_graphs
    }

    fn ensure_authenticated(&self) -> Result<String, SessionError> {
        self.auth.current_user().ok_or(SessionError::NotAuthenticated)
    }

    /// Fetch the current user's graphs from the store
    pub fn refresh_listing(&mut self) -> Result<&[StoredGraph], SessionError> {
        let user = self.ensure_authenticated()?;
        self.remote_graphs = self.store.list_own_graphs()?;
        tracing::debug!(%user, count = self.remote_graphs.len(), "Listed graphs");
        Ok(&self.remote_graphs)
    }

    /// Save the current graph, assigning it an ID on first save
    pub fn save(&mut self) -> Result<String, SessionError> {
        let user = self.ensure_authenticated()?;
        let id = match &self.editor.info().id {
            Some(id) => id.clone(),
            None => {
                let id = Uuid::new_v4().to_string();
                self.editor.set_graph_id(Some(id.clone()));
                id
            }
        };

        let snapshot = self.editor.snapshot();
        self.store.save(&snapshot)?;

        let entry = StoredGraph {
            id: id.clone(),
            graph_json: snapshot.to_json()?,
        };
        match self.remote_graphs.iter_mut().find(|g| g.id == id) {
            Some(existing) => *existing = entry,
            None => self.remote_graphs.push(entry),
        }

        tracing::info!(%user, graph = %id, "Saved graph");
        Ok(id)
    }

    /// Replace the editor's graph with a stored one
    pub fn load(&mut self, id: &str) -> Result<(), SessionError> {
        let user = self.ensure_authenticated()?;
        if !self.remote_graphs.iter().any(|g| g.id == id) {
            self.refresh_listing()?;
        }
        let stored = self
            .remote_graphs
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| SessionError::GraphNotListed(id.to_string()))?;

        let mut snapshot = GraphSnapshot::from_json(&stored.graph_json)?;
        snapshot.graph_info.id = Some(id.to_string());
        self.editor.restore(snapshot)?;

        tracing::info!(%user, graph = %id, "Loaded graph");
        Ok(())
    }

    /// Delete a stored graph. The open graph stays open but is detached from
    /// the deleted ID, so the next save creates a new entry.
    pub fn delete(&mut self, id: &str) -> Result<(), SessionError> {
        let user = self.ensure_authenticated()?;
        self.store.delete(id)?;
        self.remote_graphs.retain(|g| g.id != id);
        if self.editor.info().id.as_deref() == Some(id) {
            self.editor.set_graph_id(None);
        }
        tracing::info!(%user, graph = %id, "Deleted graph");
        Ok(())
    }

    /// Start a fresh, unsaved graph
    pub fn new_graph(&mut self, name: impl Into<String>) {
        self.editor.clear(name);
    }
}

/// Error from a session operation
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No user is signed in
    #[error("Not signed in")]
    NotAuthenticated,

    /// The store does not list the requested graph
    #[error("Graph not found: {0}")]
    GraphNotListed(String),

    /// The store reported a failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Stored JSON could not be read or written
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Stored graph failed validation
    #[error("Invalid graph: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSchema;
    use crate::node::Position;
    use crate::node_type::NodeType;
    use crate::store::StaticAuth;
    use crate::value::ValueType;
    use indexmap::IndexMap;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct MemoryStore {
        graphs: IndexMap<String, String>,
        fail_saves: bool,
    }

    impl GraphStore for MemoryStore {
        fn list_own_graphs(&self) -> Result<Vec<StoredGraph>, StoreError> {
            Ok(self
                .graphs
                .iter()
                .map(|(id, json)| StoredGraph {
                    id: id.clone(),
                    graph_json: json.clone(),
                })
                .collect())
        }

        fn save(&mut self, snapshot: &GraphSnapshot) -> Result<(), StoreError> {
            if self.fail_saves {
                return Err(StoreError::new("quota exceeded"));
            }
            let id = snapshot
                .graph_info
                .id
                .clone()
                .ok_or_else(|| StoreError::new("graph has no id"))?;
            let json = snapshot.to_json().map_err(|e| StoreError::new(e.to_string()))?;
            self.graphs.insert(id, json);
            Ok(())
        }

        fn delete(&mut self, id: &str) -> Result<(), StoreError> {
            self.graphs
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| StoreError::new(format!("no graph {id}")))
        }
    }

    fn session(auth: StaticAuth) -> GraphSession<MemoryStore, StaticAuth> {
        let mut editor = GraphEditor::default();
        editor.add_node_type(
            NodeType::new("Narrator").with_field(FieldSchema::new("Message", ValueType::String)),
        );
        GraphSession::new(editor, MemoryStore::default(), auth)
    }

    #[test]
    fn test_signed_out_skips_store() {
        let mut session = session(StaticAuth::signed_out());
        assert!(!session.is_authenticated());
        assert!(matches!(session.save(), Err(SessionError::NotAuthenticated)));
        assert!(matches!(session.refresh_listing(), Err(SessionError::NotAuthenticated)));
        assert!(session.store().graphs.is_empty());
    }

    #[test]
    fn test_save_load_cycle() {
        let mut session = session(StaticAuth::signed_in("ada"));
        let node = session
            .editor_mut()
            .add_node("Narrator", Position::new(4.0, 2.0))
            .unwrap();
        let field = session.editor().node(node).unwrap().fields()[0].id;
        session
            .editor_mut()
            .set_field_value(field, json!("Once upon a time"))
            .unwrap();

        let id = session.save().unwrap();
        assert_eq!(session.editor().info().id.as_deref(), Some(id.as_str()));
        assert_eq!(session.save().unwrap(), id);
        assert_eq!(session.store().graphs.len(), 1);

        session.new_graph("Scratch");
        assert_eq!(session.editor().node_count(), 0);

        session.load(&id).unwrap();
        assert_eq!(
            session.editor().field(field).unwrap().value(),
            &json!("Once upon a time")
        );
        assert_eq!(session.editor().node(node).unwrap().position, Position::new(4.0, 2.0));
    }

    #[test]
    fn test_load_unknown_graph() {
        let mut session = session(StaticAuth::signed_in("ada"));
        assert!(matches!(
            session.load("nope"),
            Err(SessionError::GraphNotListed(_))
        ));
    }

    #[test]
    fn test_delete_detaches_open_graph() {
        let mut session = session(StaticAuth::signed_in("ada"));
        let id = session.save().unwrap();
        session.delete(&id).unwrap();
        assert!(session.remote_graphs().is_empty());
        assert!(session.editor().info().id.is_none());
        assert!(matches!(session.delete(&id), Err(SessionError::Store(_))));
    }

    #[test]
    fn test_store_failure_is_reported() {
        let mut session = session(StaticAuth::signed_in("ada"));
        session.store.fail_saves = true;
        match session.save() {
            Err(SessionError::Store(e)) => assert_eq!(e.to_string(), "quota exceeded"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
