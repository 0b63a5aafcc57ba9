//! The program graph of one compilation unit

use std::fmt;

use kestrel_types::ValueType;
use rustc_hash::FxHashMap;

use crate::error::{CompileError, CompileResult};
use crate::node::{BlockLabel, CallTarget, Node, NodeId, NodeKey, Value};

/// How control leaves a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump
    Goto(BlockLabel),
    /// Conditional branch
    If {
        /// Boolean branch condition
        condition: Value,
        /// Target when the condition holds
        then_block: BlockLabel,
        /// Target otherwise
        else_block: BlockLabel,
    },
    /// Return, with a value unless the unit returns void
    Return(Option<Value>),
    /// Control never reaches the end of this block
    Unreachable,
    /// Call that never returns
    CallNoReturn {
        /// What is called
        target: CallTarget,
        /// Call arguments
        args: Vec<Value>,
    },
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {}", target),
            Terminator::If {
                condition,
                then_block,
                else_block,
            } => write!(f, "if {} then {} else {}", condition, then_block, else_block),
            Terminator::Return(Some(value)) => write!(f, "return {}", value),
            Terminator::Return(None) => f.write_str("return"),
            Terminator::Unreachable => f.write_str("unreachable"),
            Terminator::CallNoReturn { target, args } => {
                write!(f, "call.noreturn {}", target)?;
                write_args(f, args)
            }
        }
    }
}

/// A basic block: scheduled nodes plus a terminator once finished
#[derive(Debug, Clone)]
pub struct Block {
    label: BlockLabel,
    schedule: Vec<NodeId>,
    terminator: Option<Terminator>,
}

impl Block {
    /// Label of this block in its graph
    pub fn label(&self) -> BlockLabel {
        self.label
    }

    /// Nodes in emission order
    pub fn schedule(&self) -> &[NodeId] {
        &self.schedule
    }

    /// How control leaves this block; `None` while it is still open
    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }

    /// Whether a terminator has been set
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

/// Node arena with structural sharing of pure nodes
///
/// Sharing is scoped to a block: an equal pure node requested from another
/// block is published again there, so every block only uses values
/// scheduled on its own path.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    shared: FxHashMap<(BlockLabel, NodeKey), NodeId>,
    blocks: Vec<Block>,
}

impl Graph {
    /// Create a graph with no blocks
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph holding one empty entry block
    pub fn with_entry_block() -> (Self, BlockLabel) {
        let mut graph = Graph::new();
        let entry = BlockLabel(0);
        graph.blocks.push(Block {
            label: entry,
            schedule: Vec::new(),
            terminator: None,
        });
        (graph, entry)
    }

    /// Publish a node into `block`
    ///
    /// A pure node equal to an earlier one in the same block (same kind,
    /// dependencies and type) is not added again; the earlier node is
    /// returned instead.
    pub fn add_node(&mut self, block: BlockLabel, node: Node) -> CompileResult<NodeId> {
        let key = node.kind().is_pure().then(|| (block, node.key()));
        if let Some(existing) = key.as_ref().and_then(|k| self.shared.get(k)) {
            return Ok(*existing);
        }
        let id = NodeId(index_u32(self.nodes.len(), "nodes")?);
        self.block_mut(block)?.schedule.push(id);
        if let Some(key) = key {
            self.shared.insert(key, id);
        }
        self.nodes.push(node);
        Ok(id)
    }

    /// Create an empty block
    pub fn new_block(&mut self) -> CompileResult<BlockLabel> {
        let label = BlockLabel(index_u32(self.blocks.len(), "blocks")?);
        self.blocks.push(Block {
            label,
            schedule: Vec::new(),
            terminator: None,
        });
        Ok(label)
    }

    /// Finish `block` with a terminator
    pub fn terminate(&mut self, block: BlockLabel, terminator: Terminator) -> CompileResult<()> {
        self.block_mut(block)?.terminator = Some(terminator);
        Ok(())
    }

    /// Node with the given id
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    /// All published nodes, in allocation order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of published nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Block with the given label
    pub fn block(&self, label: BlockLabel) -> Option<&Block> {
        self.blocks.get(label.0 as usize)
    }

    /// All blocks, in creation order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn block_mut(&mut self, label: BlockLabel) -> CompileResult<&mut Block> {
        self.blocks
            .get_mut(label.0 as usize)
            .ok_or_else(|| CompileError::UnknownBlock {
                block: label.to_string(),
            })
    }

    /// Type of a value; `None` for a node that is not in this graph
    pub fn value_type(&self, value: &Value) -> Option<ValueType> {
        match value {
            Value::Node(id) => self.node(*id).map(|n| n.ty().clone()),
            Value::Literal(lit) => Some(lit.ty()),
        }
    }

    /// The node behind a value
    pub fn node_of(&self, value: &Value) -> Option<&Node> {
        value.as_node().and_then(|id| self.node(id))
    }
}

fn index_u32(len: usize, what: &'static str) -> CompileResult<u32> {
    u32::try_from(len).map_err(|_| CompileError::GraphLimit { what })
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    f.write_str("(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_str(")")
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{}:", block.label)?;
            for id in &block.schedule {
                let Some(node) = self.node(*id) else {
                    continue;
                };
                write!(f, "  {} = {}", id, node.kind())?;
                write_args(f, node.dependencies())?;
                writeln!(f, " : {}", node.ty())?;
            }
            match &block.terminator {
                Some(term) => writeln!(f, "  {}", term)?,
                None => writeln!(f, "  <open>")?,
            }
        }
        Ok(())
    }
}
