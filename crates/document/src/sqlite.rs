use std::collections::BTreeSet;

use rusqlite::{Connection, OptionalExtension};

use cardsync_core::{Bounds, FontName, ImageHash, ListStyle, NodeId, NodeKind};

use crate::error::DocumentError;
use crate::traits::{DocumentHost, NodeRecord};

const DEFAULT_PAGE_NAME: &str = "Page 1";

const NODE_COLUMNS: &str = "node_id, parent_id, kind, name, visible, x, y, width, height";

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], DocumentError> {
    v.try_into()
        .map_err(|_| DocumentError::Serialization(format!("invalid {label} length")))
}

fn to_node_id(v: Vec<u8>) -> Result<NodeId, DocumentError> {
    Ok(NodeId::from_bytes(to_array::<16>(v, "node_id")?))
}

fn font_label(font: &FontName) -> String {
    format!("{} {}", font.family, font.style)
}

struct RawNode {
    node_id: Vec<u8>,
    parent_id: Option<Vec<u8>>,
    kind: String,
    name: String,
    visible: bool,
    bounds: Bounds,
}

fn read_raw_node(row: &rusqlite::Row) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        node_id: row.get(0)?,
        parent_id: row.get(1)?,
        kind: row.get(2)?,
        name: row.get(3)?,
        visible: row.get(4)?,
        bounds: Bounds::new(row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?),
    })
}

impl RawNode {
    fn into_record(self) -> Result<NodeRecord, DocumentError> {
        Ok(NodeRecord {
            node_id: to_node_id(self.node_id)?,
            kind: NodeKind::parse(&self.kind)?,
            name: self.name,
            parent: self.parent_id.map(to_node_id).transpose()?,
            visible: self.visible,
            bounds: self.bounds,
        })
    }
}

fn read_node(conn: &Connection, node_id: NodeId) -> Result<Option<NodeRecord>, DocumentError> {
    let raw = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = ?1"),
            rusqlite::params![node_id.as_bytes().as_slice()],
            read_raw_node,
        )
        .optional()?;
    raw.map(RawNode::into_record).transpose()
}

fn read_children(conn: &Connection, parent: Option<NodeId>) -> Result<Vec<NodeId>, DocumentError> {
    let parent_blob = parent.map(|p| p.as_bytes().to_vec());
    let mut stmt =
        conn.prepare("SELECT node_id FROM nodes WHERE parent_id IS ?1 ORDER BY child_index")?;
    let rows: Vec<Vec<u8>> = stmt
        .query_map(rusqlite::params![parent_blob], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(to_node_id).collect()
}

fn next_child_index(conn: &Connection, parent: Option<NodeId>) -> Result<i64, DocumentError> {
    let parent_blob = parent.map(|p| p.as_bytes().to_vec());
    let index = conn.query_row(
        "SELECT COALESCE(MAX(child_index), -1) + 1 FROM nodes WHERE parent_id IS ?1",
        rusqlite::params![parent_blob],
        |row| row.get(0),
    )?;
    Ok(index)
}

fn insert_node(
    conn: &Connection,
    parent: Option<NodeId>,
    kind: NodeKind,
    name: &str,
    bounds: Bounds,
) -> Result<NodeId, DocumentError> {
    let node_id = NodeId::new();
    let index = next_child_index(conn, parent)?;
    conn.execute(
        "INSERT INTO nodes (node_id, parent_id, child_index, kind, name, x, y, width, height) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            node_id.as_bytes().as_slice(),
            parent.map(|p| p.as_bytes().to_vec()),
            index,
            kind.as_str(),
            name,
            bounds.x,
            bounds.y,
            bounds.width,
            bounds.height,
        ],
    )?;
    Ok(node_id)
}

/// Copies `source` and its descendants under `parent` at `index`.
/// `instance_of` turns the copied root into an instance of that component;
/// tags on such a root are not carried over.
fn copy_subtree(
    conn: &Connection,
    source: NodeId,
    parent: Option<NodeId>,
    index: i64,
    instance_of: Option<NodeId>,
) -> Result<NodeId, DocumentError> {
    let node_id = NodeId::new();
    let copied = conn.execute(
        "INSERT INTO nodes (node_id, parent_id, child_index, kind, name, visible, x, y, width, height, text, list_style, fonts, main_component, image_fill)
         SELECT ?1, ?2, ?3, kind, name, visible, x, y, width, height, text, list_style, fonts, main_component, image_fill FROM nodes WHERE node_id = ?4",
        rusqlite::params![
            node_id.as_bytes().as_slice(),
            parent.map(|p| p.as_bytes().to_vec()),
            index,
            source.as_bytes().as_slice(),
        ],
    )?;
    if copied == 0 {
        return Err(DocumentError::NodeNotFound(source.to_string()));
    }

    match instance_of {
        Some(component) => {
            conn.execute(
                "UPDATE nodes SET kind = ?1, main_component = ?2 WHERE node_id = ?3",
                rusqlite::params![
                    NodeKind::Instance.as_str(),
                    component.as_bytes().as_slice(),
                    node_id.as_bytes().as_slice(),
                ],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO tags (node_id, key, value) SELECT ?1, key, value FROM tags WHERE node_id = ?2",
                rusqlite::params![node_id.as_bytes().as_slice(), source.as_bytes().as_slice()],
            )?;
        }
    }

    for (i, child) in read_children(conn, Some(source))?.into_iter().enumerate() {
        copy_subtree(conn, child, Some(node_id), i as i64, None)?;
    }
    Ok(node_id)
}

fn collect_subtree(conn: &Connection, root: NodeId, out: &mut Vec<NodeId>) -> Result<(), DocumentError> {
    out.push(root);
    for child in read_children(conn, Some(root))? {
        collect_subtree(conn, child, out)?;
    }
    Ok(())
}

/// A headless document tree backed by SQLite. Serves both as a persistent
/// document for tooling and as the in-memory host used by tests.
pub struct SqliteDocument {
    conn: Connection,
    current_page: NodeId,
    loaded_fonts: BTreeSet<FontName>,
    selection: Vec<NodeId>,
    viewport: Vec<NodeId>,
}

impl SqliteDocument {
    pub fn open(path: &str) -> Result<Self, DocumentError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DocumentError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DocumentError> {
        let current_page = match read_children(&conn, None)?.into_iter().next() {
            Some(page) => page,
            None => insert_node(&conn, None, NodeKind::Page, DEFAULT_PAGE_NAME, Bounds::default())?,
        };
        Ok(Self {
            conn,
            current_page,
            loaded_fonts: BTreeSet::new(),
            selection: Vec::new(),
            viewport: Vec::new(),
        })
    }

    fn require_node(&self, node_id: NodeId) -> Result<NodeRecord, DocumentError> {
        read_node(&self.conn, node_id)?.ok_or_else(|| DocumentError::NodeNotFound(node_id.to_string()))
    }

    fn require_parent(&self, parent: NodeId) -> Result<(), DocumentError> {
        let record = self.require_node(parent)?;
        if !record.kind.has_children() {
            return Err(DocumentError::InvalidOperation(format!(
                "{} node {parent} cannot have children",
                record.kind.as_str()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Builders
    // ========================================================================

    pub fn current_page(&self) -> NodeId {
        self.current_page
    }

    pub fn pages(&self) -> Result<Vec<NodeId>, DocumentError> {
        read_children(&self.conn, None)
    }

    pub fn create_page(&mut self, name: &str) -> Result<NodeId, DocumentError> {
        insert_node(&self.conn, None, NodeKind::Page, name, Bounds::default())
    }

    pub fn set_current_page(&mut self, page: NodeId) -> Result<(), DocumentError> {
        let record = self.require_node(page)?;
        if record.kind != NodeKind::Page {
            return Err(DocumentError::InvalidOperation(format!("{page} is not a page")));
        }
        self.current_page = page;
        self.selection.clear();
        Ok(())
    }

    pub fn create_node(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: &str,
        bounds: Bounds,
    ) -> Result<NodeId, DocumentError> {
        if kind == NodeKind::Page {
            return Err(DocumentError::InvalidOperation("pages are created with create_page".into()));
        }
        self.require_parent(parent)?;
        insert_node(&self.conn, Some(parent), kind, name, bounds)
    }

    pub fn create_frame(&mut self, parent: NodeId, name: &str, bounds: Bounds) -> Result<NodeId, DocumentError> {
        self.create_node(parent, NodeKind::Frame, name, bounds)
    }

    pub fn create_component(
        &mut self,
        parent: NodeId,
        name: &str,
        bounds: Bounds,
    ) -> Result<NodeId, DocumentError> {
        self.create_node(parent, NodeKind::Component, name, bounds)
    }

    pub fn create_component_set(
        &mut self,
        parent: NodeId,
        name: &str,
        bounds: Bounds,
    ) -> Result<NodeId, DocumentError> {
        self.create_node(parent, NodeKind::ComponentSet, name, bounds)
    }

    pub fn create_rectangle(
        &mut self,
        parent: NodeId,
        name: &str,
        bounds: Bounds,
    ) -> Result<NodeId, DocumentError> {
        self.create_node(parent, NodeKind::Rectangle, name, bounds)
    }

    pub fn create_text(
        &mut self,
        parent: NodeId,
        name: &str,
        text: &str,
        font: &FontName,
        bounds: Bounds,
    ) -> Result<NodeId, DocumentError> {
        let node_id = self.create_node(parent, NodeKind::Text, name, bounds)?;
        let fonts = rmp_serde::to_vec(&vec![font.clone()])
            .map_err(|e| DocumentError::Serialization(e.to_string()))?;
        self.conn.execute(
            "UPDATE nodes SET text = ?1, fonts = ?2 WHERE node_id = ?3",
            rusqlite::params![text, fonts, node_id.as_bytes().as_slice()],
        )?;
        Ok(node_id)
    }

    /// Makes a font available to `load_font`.
    pub fn register_font(&mut self, font: &FontName) -> Result<(), DocumentError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO fonts (family, style) VALUES (?1, ?2)",
            rusqlite::params![font.family, font.style],
        )?;
        Ok(())
    }

    pub fn select(&mut self, node_ids: &[NodeId]) -> Result<(), DocumentError> {
        for node_id in node_ids {
            self.require_node(*node_id)?;
        }
        self.selection = node_ids.to_vec();
        Ok(())
    }

    /// Turns an instance into a plain frame, the way a user detaching it would.
    pub fn detach_instance(&mut self, node_id: NodeId) -> Result<(), DocumentError> {
        let record = self.require_node(node_id)?;
        if record.kind != NodeKind::Instance {
            return Err(DocumentError::InvalidOperation(format!("{node_id} is not an instance")));
        }
        self.conn.execute(
            "UPDATE nodes SET kind = ?1, main_component = NULL WHERE node_id = ?2",
            rusqlite::params![NodeKind::Frame.as_str(), node_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    pub fn resize(&mut self, node_id: NodeId, width: f64, height: f64) -> Result<(), DocumentError> {
        self.require_node(node_id)?;
        self.conn.execute(
            "UPDATE nodes SET width = ?1, height = ?2 WHERE node_id = ?3",
            rusqlite::params![width, height, node_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    /// Deletes a node with all of its descendants and their tags.
    pub fn remove_node(&mut self, node_id: NodeId) -> Result<(), DocumentError> {
        self.require_node(node_id)?;
        let mut doomed = Vec::new();
        collect_subtree(&self.conn, node_id, &mut doomed)?;
        let tx = self.conn.transaction()?;
        for id in &doomed {
            tx.execute(
                "DELETE FROM tags WHERE node_id = ?1",
                rusqlite::params![id.as_bytes().as_slice()],
            )?;
            tx.execute(
                "DELETE FROM nodes WHERE node_id = ?1",
                rusqlite::params![id.as_bytes().as_slice()],
            )?;
        }
        tx.commit()?;
        self.selection.retain(|id| !doomed.contains(id));
        Ok(())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn list_style(&self, node_id: NodeId) -> Result<ListStyle, DocumentError> {
        let style: Option<String> = self
            .conn
            .query_row(
                "SELECT list_style FROM nodes WHERE node_id = ?1",
                rusqlite::params![node_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        match style {
            Some(s) => Ok(ListStyle::parse(&s)?),
            None => Err(DocumentError::NodeNotFound(node_id.to_string())),
        }
    }

    pub fn image_fill(&self, node_id: NodeId) -> Result<Option<ImageHash>, DocumentError> {
        let fill: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT image_fill FROM nodes WHERE node_id = ?1",
                rusqlite::params![node_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        match fill {
            Some(Some(bytes)) => Ok(Some(ImageHash::from_bytes(to_array::<32>(bytes, "image_fill")?))),
            Some(None) => Ok(None),
            None => Err(DocumentError::NodeNotFound(node_id.to_string())),
        }
    }

    pub fn image_bytes(&self, image: ImageHash) -> Result<Option<Vec<u8>>, DocumentError> {
        let bytes = self
            .conn
            .query_row(
                "SELECT bytes FROM images WHERE hash = ?1",
                rusqlite::params![image.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes)
    }

    pub fn image_count(&self) -> Result<u64, DocumentError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Nodes the last `scroll_into_view` framed.
    pub fn viewport(&self) -> &[NodeId] {
        &self.viewport
    }

    pub fn is_font_loaded(&self, font: &FontName) -> bool {
        self.loaded_fonts.contains(font)
    }
}

impl DocumentHost for SqliteDocument {
    fn root_children(&self) -> Result<Vec<NodeId>, DocumentError> {
        read_children(&self.conn, Some(self.current_page))
    }

    fn node(&self, node_id: NodeId) -> Result<Option<NodeRecord>, DocumentError> {
        read_node(&self.conn, node_id)
    }

    fn children(&self, node_id: NodeId) -> Result<Vec<NodeId>, DocumentError> {
        read_children(&self.conn, Some(node_id))
    }

    fn get_tag(&self, node_id: NodeId, key: &str) -> Result<Option<String>, DocumentError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM tags WHERE node_id = ?1 AND key = ?2",
                rusqlite::params![node_id.as_bytes().as_slice(), key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_tag(&mut self, node_id: NodeId, key: &str, value: &str) -> Result<(), DocumentError> {
        self.require_node(node_id)?;
        if value.is_empty() {
            self.conn.execute(
                "DELETE FROM tags WHERE node_id = ?1 AND key = ?2",
                rusqlite::params![node_id.as_bytes().as_slice(), key],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO tags (node_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(node_id, key) DO UPDATE SET value = excluded.value",
                rusqlite::params![node_id.as_bytes().as_slice(), key, value],
            )?;
        }
        Ok(())
    }

    fn set_visible(&mut self, node_id: NodeId, visible: bool) -> Result<(), DocumentError> {
        let updated = self.conn.execute(
            "UPDATE nodes SET visible = ?1 WHERE node_id = ?2",
            rusqlite::params![visible, node_id.as_bytes().as_slice()],
        )?;
        if updated == 0 {
            return Err(DocumentError::NodeNotFound(node_id.to_string()));
        }
        Ok(())
    }

    fn text(&self, node_id: NodeId) -> Result<Option<String>, DocumentError> {
        let text: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT text FROM nodes WHERE node_id = ?1",
                rusqlite::params![node_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        match text {
            Some(text) => Ok(text),
            None => Err(DocumentError::NodeNotFound(node_id.to_string())),
        }
    }

    fn text_fonts(&self, node_id: NodeId) -> Result<Vec<FontName>, DocumentError> {
        let fonts: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT fonts FROM nodes WHERE node_id = ?1",
                rusqlite::params![node_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        match fonts {
            Some(Some(bytes)) => rmp_serde::from_slice(&bytes)
                .map_err(|e| DocumentError::Serialization(e.to_string())),
            Some(None) => Ok(Vec::new()),
            None => Err(DocumentError::NodeNotFound(node_id.to_string())),
        }
    }

    fn load_font(&mut self, font: &FontName) -> Result<(), DocumentError> {
        if self.loaded_fonts.contains(font) {
            return Ok(());
        }
        let available: bool = self.conn.query_row(
            "SELECT EXISTS (SELECT 1 FROM fonts WHERE family = ?1 AND style = ?2)",
            rusqlite::params![font.family, font.style],
            |row| row.get(0),
        )?;
        if !available {
            return Err(DocumentError::FontUnavailable(font_label(font)));
        }
        self.loaded_fonts.insert(font.clone());
        Ok(())
    }

    fn set_text(
        &mut self,
        node_id: NodeId,
        text: &str,
        list_style: ListStyle,
    ) -> Result<(), DocumentError> {
        let record = self.require_node(node_id)?;
        if !record.kind.is_text() {
            return Err(DocumentError::InvalidOperation(format!(
                "cannot write text to {} node {node_id}",
                record.kind.as_str()
            )));
        }
        for font in self.text_fonts(node_id)? {
            if !self.loaded_fonts.contains(&font) {
                return Err(DocumentError::FontNotLoaded {
                    node_id: node_id.to_string(),
                    font: font_label(&font),
                });
            }
        }
        self.conn.execute(
            "UPDATE nodes SET text = ?1, list_style = ?2 WHERE node_id = ?3",
            rusqlite::params![text, list_style.as_str(), node_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    fn main_component(&self, node_id: NodeId) -> Result<Option<NodeId>, DocumentError> {
        let component: Option<Option<Vec<u8>>> = self
            .conn
            .query_row(
                "SELECT main_component FROM nodes WHERE node_id = ?1",
                rusqlite::params![node_id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(component) = component else {
            return Err(DocumentError::NodeNotFound(node_id.to_string()));
        };
        match component.map(to_node_id).transpose()? {
            Some(id) if read_node(&self.conn, id)?.is_some() => Ok(Some(id)),
            _ => Ok(None),
        }
    }

    fn clone_node(&mut self, node_id: NodeId) -> Result<NodeId, DocumentError> {
        let record = self.require_node(node_id)?;
        if record.kind == NodeKind::Page {
            return Err(DocumentError::InvalidOperation("pages cannot be cloned".into()));
        }
        let index: i64 = self.conn.query_row(
            "SELECT child_index FROM nodes WHERE node_id = ?1",
            rusqlite::params![node_id.as_bytes().as_slice()],
            |row| row.get(0),
        )?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE nodes SET child_index = child_index + 1 WHERE parent_id IS ?1 AND child_index > ?2",
            rusqlite::params![record.parent.map(|p| p.as_bytes().to_vec()), index],
        )?;
        let copy = copy_subtree(&tx, node_id, record.parent, index + 1, None)?;
        tx.commit()?;
        Ok(copy)
    }

    fn create_instance(&mut self, component_id: NodeId) -> Result<NodeId, DocumentError> {
        let record = self.require_node(component_id)?;
        if record.kind != NodeKind::Component {
            return Err(DocumentError::InvalidOperation(format!(
                "cannot instantiate {} node {component_id}",
                record.kind.as_str()
            )));
        }
        let tx = self.conn.transaction()?;
        let index = next_child_index(&tx, Some(self.current_page))?;
        let instance = copy_subtree(&tx, component_id, Some(self.current_page), index, Some(component_id))?;
        tx.commit()?;
        Ok(instance)
    }

    fn append_to_root(&mut self, node_id: NodeId) -> Result<(), DocumentError> {
        let record = self.require_node(node_id)?;
        if record.kind == NodeKind::Page {
            return Err(DocumentError::InvalidOperation("pages cannot be reparented".into()));
        }
        let index = next_child_index(&self.conn, Some(self.current_page))?;
        self.conn.execute(
            "UPDATE nodes SET parent_id = ?1, child_index = ?2 WHERE node_id = ?3",
            rusqlite::params![
                self.current_page.as_bytes().as_slice(),
                index,
                node_id.as_bytes().as_slice(),
            ],
        )?;
        Ok(())
    }

    fn set_position(&mut self, node_id: NodeId, x: f64, y: f64) -> Result<(), DocumentError> {
        let record = self.require_node(node_id)?;
        if !record.kind.has_bounds() {
            return Err(DocumentError::InvalidOperation(format!("{node_id} has no position")));
        }
        self.conn.execute(
            "UPDATE nodes SET x = ?1, y = ?2 WHERE node_id = ?3",
            rusqlite::params![x, y, node_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    fn create_image(&mut self, bytes: &[u8]) -> Result<ImageHash, DocumentError> {
        if bytes.is_empty() {
            return Err(DocumentError::InvalidOperation("image data is empty".into()));
        }
        let hash = ImageHash::digest(bytes);
        self.conn.execute(
            "INSERT OR IGNORE INTO images (hash, bytes) VALUES (?1, ?2)",
            rusqlite::params![hash.as_bytes().as_slice(), bytes],
        )?;
        Ok(hash)
    }

    fn set_image_fill(&mut self, node_id: NodeId, image: ImageHash) -> Result<(), DocumentError> {
        let record = self.require_node(node_id)?;
        if !record.kind.has_bounds() {
            return Err(DocumentError::InvalidOperation(format!("{node_id} cannot take a fill")));
        }
        self.conn.execute(
            "UPDATE nodes SET image_fill = ?1 WHERE node_id = ?2",
            rusqlite::params![image.as_bytes().as_slice(), node_id.as_bytes().as_slice()],
        )?;
        Ok(())
    }

    fn selection(&self) -> Result<Vec<NodeId>, DocumentError> {
        Ok(self.selection.clone())
    }

    fn scroll_into_view(&mut self, node_ids: &[NodeId]) -> Result<(), DocumentError> {
        self.viewport = node_ids.to_vec();
        Ok(())
    }
}
