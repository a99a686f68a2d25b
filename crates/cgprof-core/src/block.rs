use std::fmt;

/// Dense identifier of a registered block, assigned in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub usize);

/// The implicit block standing for "outside of any measured call".
pub const ROOT_BLOCK_ID: BlockId = BlockId(0);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }

    pub fn is_root(self) -> bool {
        self == ROOT_BLOCK_ID
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// A source location used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Loc {
    pub source: String,
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(source: impl Into<String>, line: u32, col: u32) -> Self {
        Loc {
            source: source.into(),
            line,
            col,
        }
    }

    /// Location for blocks whose origin is not known, such as names read
    /// from external sampling data.
    pub fn unknown() -> Self {
        Loc::new("???", 0, 0)
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.col)
    }
}

/// A named, located unit of instrumented code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub name: String,
    pub loc: Loc,
}

/// Append-only registry of blocks.
///
/// Block 0 is the root and is created with the registry. Ids are contiguous
/// and never reused.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<Block>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        BlockRegistry {
            blocks: vec![Block {
                name: "<root>".to_string(),
                loc: Loc::default(),
            }],
        }
    }

    /// Register a block and return its id.
    pub fn register(&mut self, name: impl Into<String>, loc: Loc) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block {
            name: name.into(),
            loc,
        });
        id
    }

    /// Register a contiguous range of blocks, returning the id of the first.
    ///
    /// If `blocks` is empty the returned id is the one the next registration
    /// would receive.
    pub fn register_all<I, S>(&mut self, blocks: I) -> BlockId
    where
        I: IntoIterator<Item = (S, Loc)>,
        S: Into<String>,
    {
        let first = BlockId(self.blocks.len());
        for (name, loc) in blocks {
            self.register(name, loc);
        }
        first
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    /// Find a block by exact, case-sensitive name. Linear in the number of
    /// blocks; the first match wins.
    pub fn find(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .map(BlockId)
    }

    /// Display name of a block, or `?` for an id this registry never issued.
    pub fn name(&self, id: BlockId) -> &str {
        self.get(id).map_or("?", |b| b.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: the root block is present from construction.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Id of the most recently registered block.
    pub fn last_id(&self) -> BlockId {
        BlockId(self.blocks.len() - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter().enumerate().map(|(i, b)| (BlockId(i), b))
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
