use rusqlite::{params, Connection, OptionalExtension};

use super::{Edge, GraphStore, NodeScores, UNKNOWN};
use crate::puzzle::prelude::Grid;
use crate::utils::prelude::*;

/// Default tablebase filename for a given board side and spawn probability.
pub fn default_filename(n: usize, p4: f64) -> String {
    format!("2048_tb_{n}-{p4}.sqlite")
}

/// `rusqlite`-backed store. Schema, PRAGMAs, and queue semantics are the on-disk wire
/// format: any two builds of the same `(N, p4)` must agree on it bit-for-bit.
pub struct SqliteStore {
    conn: Connection,
    n: usize,
}

impl SqliteStore {
    /// Opens (creating if absent) a tablebase file at `path` for a board of side `n`.
    pub fn open(path: &str, n: usize) -> Result<SqliteStore> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite tablebase at {path}"))?;
        SqliteStore::from_connection(conn, n)
    }

    /// An in-memory sqlite store, useful for tests that want store-equivalence checks
    /// without touching the filesystem.
    pub fn open_in_memory(n: usize) -> Result<SqliteStore> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite tablebase")?;
        SqliteStore::from_connection(conn, n)
    }

    fn from_connection(conn: Connection, n: usize) -> Result<SqliteStore> {
        conn.execute_batch(
            "PRAGMA synchronous = OFF;
             PRAGMA journal_mode = MEMORY;
             PRAGMA cache_size = -20000;",
        )
        .context("applying sqlite pragmas")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS node (
                grid_state BLOB PRIMARY KEY,
                inter_score REAL NOT NULL,
                noninter_score REAL NOT NULL
             );
             CREATE TABLE IF NOT EXISTS edge (
                start_state BLOB NOT NULL,
                end_state BLOB NOT NULL,
                weight REAL NOT NULL,
                PRIMARY KEY(start_state, end_state)
             );
             CREATE INDEX IF NOT EXISTS edge_end_state_idx ON edge(end_state);
             CREATE TABLE IF NOT EXISTS edge_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node BLOB NOT NULL,
                node_depth INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS score_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                node BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS config (
                prop_name TEXT PRIMARY KEY,
                prop_value TEXT
             );",
        )
        .context("creating sqlite tablebase schema")?;

        Ok(SqliteStore { conn, n })
    }

    fn grid(&self, bytes: Vec<u8>) -> Result<Grid> {
        Grid::from_bytes(self.n, &bytes)
    }

    pub fn config_flag(&self, name: &str) -> Result<bool> {
        let value: Option<String> = self
            .conn
            .query_row("SELECT prop_value FROM config WHERE prop_name = ?1", params![name], |row| row.get(0))
            .optional()
            .with_context(|| format!("reading config flag {name}"))?;
        Ok(value.as_deref() == Some("true"))
    }

    pub fn set_config_flag(&self, name: &str, value: bool) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO config(prop_name, prop_value) VALUES (?1, ?2)
                 ON CONFLICT(prop_name) DO UPDATE SET prop_value = excluded.prop_value",
                params![name, if value { "true" } else { "false" }],
            )
            .with_context(|| format!("writing config flag {name}"))?;
        Ok(())
    }
}

impl GraphStore for SqliteStore {
    fn get_or_insert_node(&mut self, grid: &Grid) -> Result<NodeScores> {
        if let Some(scores) = self.node_scores(grid)? {
            return Ok(scores);
        }
        self.conn
            .execute(
                "INSERT INTO node(grid_state, inter_score, noninter_score) VALUES (?1, ?2, ?2)",
                params![grid.as_bytes(), UNKNOWN],
            )
            .context("inserting node")?;
        Ok(NodeScores::unknown())
    }

    fn node_scores(&self, grid: &Grid) -> Result<Option<NodeScores>> {
        self.conn
            .query_row(
                "SELECT noninter_score, inter_score FROM node WHERE grid_state = ?1",
                params![grid.as_bytes()],
                |row| Ok(NodeScores { s_final: row.get(0)?, s_inter: row.get(1)? }),
            )
            .optional()
            .context("reading node scores")
    }

    fn set_node_scores(&mut self, grid: &Grid, scores: NodeScores) -> Result<()> {
        self.conn
            .execute(
                "UPDATE node SET noninter_score = ?2, inter_score = ?3 WHERE grid_state = ?1",
                params![grid.as_bytes(), scores.s_final, scores.s_inter],
            )
            .context("writing node scores")?;
        Ok(())
    }

    fn add_edge(&mut self, from: &Grid, edge: Edge) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO edge(start_state, end_state, weight) VALUES (?1, ?2, ?3)",
                params![from.as_bytes(), edge.to.as_bytes(), edge.weight],
            )
            .context("inserting edge")?;
        Ok(())
    }

    fn edges_from(&self, grid: &Grid) -> Result<Vec<Edge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT end_state, weight FROM edge WHERE start_state = ?1")
            .context("preparing edges_from query")?;
        let rows = stmt
            .query_map(params![grid.as_bytes()], |row| {
                let bytes: Vec<u8> = row.get(0)?;
                let weight: f32 = row.get(1)?;
                Ok((bytes, weight))
            })
            .context("running edges_from query")?;
        let mut edges = Vec::new();
        for row in rows {
            let (bytes, weight) = row.context("reading edge row")?;
            edges.push(Edge { to: self.grid(bytes)?, weight });
        }
        Ok(edges)
    }

    fn parents_of(&self, grid: &Grid) -> Result<Vec<Grid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT start_state FROM edge WHERE end_state = ?1")
            .context("preparing parents_of query")?;
        let rows = stmt
            .query_map(params![grid.as_bytes()], |row| row.get::<_, Vec<u8>>(0))
            .context("running parents_of query")?;
        let mut parents = Vec::new();
        for row in rows {
            parents.push(self.grid(row.context("reading parent row")?)?);
        }
        Ok(parents)
    }

    fn push_edge_queue(&mut self, grid: &Grid, depth: u32) -> Result<()> {
        self.conn
            .execute("INSERT INTO edge_queue(node, node_depth) VALUES (?1, ?2)", params![grid.as_bytes(), depth])
            .context("pushing edge queue")?;
        Ok(())
    }

    fn pop_edge_queue(&mut self) -> Result<Option<(Grid, u32)>> {
        let row: Option<(i64, Vec<u8>, u32)> = self
            .conn
            .query_row(
                "SELECT id, node, node_depth FROM edge_queue WHERE id = (SELECT MIN(id) FROM edge_queue)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .context("popping edge queue")?;
        match row {
            None => Ok(None),
            Some((id, bytes, depth)) => {
                self.conn.execute("DELETE FROM edge_queue WHERE id = ?1", params![id]).context("deleting edge queue row")?;
                Ok(Some((self.grid(bytes)?, depth)))
            }
        }
    }

    fn push_score_queue(&mut self, grid: &Grid) -> Result<()> {
        self.conn
            .execute("INSERT INTO score_queue(node) VALUES (?1)", params![grid.as_bytes()])
            .context("pushing score queue")?;
        Ok(())
    }

    fn pop_score_queue(&mut self) -> Result<Option<Grid>> {
        let row: Option<(i64, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT id, node FROM score_queue WHERE id = (SELECT MIN(id) FROM score_queue)",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("popping score queue")?;
        match row {
            None => Ok(None),
            Some((id, bytes)) => {
                self.conn.execute("DELETE FROM score_queue WHERE id = ?1", params![id]).context("deleting score queue row")?;
                Ok(Some(self.grid(bytes)?))
            }
        }
    }

    fn edge_queue_is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM edge_queue", [], |row| row.get(0))
            .context("counting edge queue")?;
        Ok(count == 0)
    }

    fn score_queue_is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM score_queue", [], |row| row.get(0))
            .context("counting score queue")?;
        Ok(count == 0)
    }

    fn all_nodes(&self) -> Result<Vec<Grid>> {
        let mut stmt = self.conn.prepare("SELECT grid_state FROM node ORDER BY rowid ASC").context("preparing all_nodes query")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0)).context("running all_nodes query")?;
        let mut grids = Vec::new();
        for row in rows {
            grids.push(self.grid(row.context("reading node row")?)?);
        }
        Ok(grids)
    }

    fn node_count(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM node", [], |row| row.get(0)).context("counting nodes")?;
        Ok(count as u64)
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN").context("opening sqlite batch transaction")
    }

    fn commit_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT").context("committing sqlite batch transaction")
    }

    fn get_flag(&self, name: &str) -> Result<bool> {
        self.config_flag(name)
    }

    fn set_flag(&mut self, name: &str, value: bool) -> Result<()> {
        self.set_config_flag(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_insert_is_idempotent() {
        let mut store = SqliteStore::open_in_memory(2).unwrap();
        let grid = Grid::new(2);
        let first = store.get_or_insert_node(&grid).unwrap();
        assert_eq!(first, NodeScores::unknown());
        store.set_node_scores(&grid, NodeScores { s_final: 1.0, s_inter: 0.5 }).unwrap();
        let second = store.get_or_insert_node(&grid).unwrap();
        assert_eq!(second, NodeScores { s_final: 1.0, s_inter: 0.5 });
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn edges_and_reverse_index_agree() {
        let mut store = SqliteStore::open_in_memory(2).unwrap();
        let a = Grid::new(2);
        let mut b = Grid::new(2);
        b.write_tile(0, 0, 1);

        store.add_edge(&a, Edge::spawn(b.clone(), 1.0)).unwrap();
        let edges = store.edges_from(&a).unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_spawn());
        assert_eq!(store.parents_of(&b).unwrap(), vec![a.clone()]);
    }

    #[test]
    fn queues_are_fifo() {
        let mut store = SqliteStore::open_in_memory(2).unwrap();
        let mut g1 = Grid::new(2);
        g1.write_tile(0, 0, 1);
        let mut g2 = Grid::new(2);
        g2.write_tile(0, 0, 2);

        store.push_edge_queue(&g1, 0).unwrap();
        store.push_edge_queue(&g2, 1).unwrap();
        assert_eq!(store.pop_edge_queue().unwrap(), Some((g1, 0)));
        assert_eq!(store.pop_edge_queue().unwrap(), Some((g2, 1)));
        assert_eq!(store.pop_edge_queue().unwrap(), None);
    }

    #[test]
    fn config_flags_round_trip() {
        let store = SqliteStore::open_in_memory(2).unwrap();
        assert!(!store.config_flag("edge_queue_init").unwrap());
        store.set_config_flag("edge_queue_init", true).unwrap();
        assert!(store.config_flag("edge_queue_init").unwrap());
    }

    #[test]
    fn default_filename_includes_size_and_p4() {
        assert_eq!(default_filename(4, 0.1), "2048_tb_4-0.1.sqlite");
    }
}
