use std::fmt::Write as _;

use crate::block::{Block, BlockId};
use crate::variable::Variable;

/// Arena holding every block of one parse. Parent and child links are
/// [`BlockId`]s into this arena.
#[derive(Debug, Clone)]
pub struct BlockTree {
    blocks: Vec<Block>,
    root: BlockId,
}

impl BlockTree {
    /// A tree holding only the `Main` root for `source`.
    pub(crate) fn new(source: &str) -> Self {
        let root = BlockId(0);
        BlockTree {
            blocks: vec![Block::root(root, source)],
            root,
        }
    }

    /// Add a provisional block covering `span` (braces included).
    pub(crate) fn push_provisional(&mut self, source: &str, span: std::ops::Range<usize>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block::provisional(id, source, span));
        id
    }

    pub(crate) fn attach(&mut self, parent: BlockId, child: BlockId) {
        self.blocks[child.0].parent = Some(parent);
        self.blocks[parent.0].children.push(child);
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn root_block(&self) -> &Block {
        &self.blocks[self.root.0]
    }

    pub fn get(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Every block in arena order (root first, then discovery order).
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn parent(&self, id: BlockId) -> Option<BlockId> {
        self.get(id).parent
    }

    pub fn children(&self, id: BlockId) -> impl Iterator<Item = &Block> {
        self.get(id).children.iter().map(|c| self.get(*c))
    }

    /// Parent, grandparent, … up to the root.
    pub fn ancestors(&self, id: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        std::iter::successors(self.parent(id), |id| self.parent(*id))
    }

    pub fn depth(&self, id: BlockId) -> usize {
        self.ancestors(id).count()
    }

    /// Blocks in pre-order (source order), starting at the root.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        let mut stack = vec![self.root];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let block = self.get(id);
            stack.extend(block.children.iter().rev());
            Some(block)
        })
    }

    /// Resolve `name` as seen from block `from`: its own scope first, then
    /// each enclosing block out to the root.
    pub fn lookup(&self, from: BlockId, name: &str) -> Option<(BlockId, &Variable)> {
        std::iter::once(from)
            .chain(self.ancestors(from))
            .find_map(|id| self.get(id).scope.get(name).map(|var| (id, var)))
    }

    pub fn lookup_mut(&mut self, from: BlockId, name: &str) -> Option<&mut Variable> {
        let (owner, _) = self.lookup(from, name)?;
        self.get_mut(owner).scope.get_mut(name)
    }

    /// Innermost block whose body contains `offset`.
    pub fn block_at(&self, offset: usize) -> BlockId {
        let mut current = self.root;
        'descend: loop {
            for child in self.children(current) {
                if child.body.start <= offset && offset < child.body.end {
                    current = child.id;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Indented rendering of the tree: one line per block, followed by
    /// its variables and calls.
    pub fn outline(&self, source: &str) -> String {
        let mut out = String::new();
        for block in self.iter() {
            let indent = "  ".repeat(self.depth(block.id));
            let _ = write!(out, "{}{}", indent, block.kind);
            if block.flagged {
                let _ = write!(out, " [unclassified: {}]", block.header(source).trim());
            }
            out.push('\n');
            for var in block.scope.iter() {
                let _ = writeln!(out, "{}  {}", indent, var);
            }
            for call in &block.calls {
                let _ = writeln!(out, "{}  call {}", indent, call);
            }
        }
        out
    }
}
