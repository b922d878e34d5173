//! Human-readable tree listing.

use std::io::Write;

use crate::common::{BlockId, Result};
use crate::index::node::Node;
use crate::index::node_store::NodeStore;

use super::BPlusTree;

impl<S: NodeStore> BPlusTree<S> {
    /// Write the header, each index level and the sequence set to `out`.
    ///
    /// ```text
    /// header: root=2 first_leaf=1 last_leaf=3 records=4 height=1 degree=2
    /// level 0: 2[2 4]
    /// leaves:
    ///   1 (prev -1, next 3): 1 2
    ///   3 (prev 1, next -1): 3 4
    /// ```
    pub fn dump<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let meta = self.meta;
        writeln!(
            out,
            "header: root={} first_leaf={} last_leaf={} records={} height={} degree={}",
            signed(meta.root),
            signed(meta.first_leaf),
            signed(meta.last_leaf),
            meta.record_count,
            meta.height,
            meta.degree
        )?;
        if meta.is_empty() {
            writeln!(out, "(empty)")?;
            return Ok(());
        }

        let mut level = vec![meta.root];
        for depth in 0..meta.height {
            write!(out, "level {}:", depth)?;
            let mut below = Vec::new();
            for id in level {
                let node = self.store.read_node(id)?;
                self.check_depth(id, &node, depth)?;
                if let Node::Internal(node) = node {
                    let keys: Vec<String> = node
                        .entries
                        .iter()
                        .map(|e| e.largest_key.to_string())
                        .collect();
                    write!(out, " {}[{}]", id.0, keys.join(" "))?;
                    below.extend(node.entries.iter().map(|e| e.child));
                }
            }
            writeln!(out)?;
            level = below;
        }

        writeln!(out, "leaves:")?;
        for (id, leaf) in self.leaves()? {
            let keys: Vec<String> = leaf.records.iter().map(|r| r.zip().to_string()).collect();
            writeln!(
                out,
                "  {} (prev {}, next {}): {}",
                id.0,
                signed(leaf.prev),
                signed(leaf.next),
                keys.join(" ")
            )?;
        }
        Ok(())
    }
}

/// Block address as the on-disk signed value (`-1` for none).
fn signed(id: BlockId) -> i64 {
    if id.is_valid() {
        i64::from(id.0)
    } else {
        -1
    }
}
