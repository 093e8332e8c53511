//! `IrContext`: arena storage for every IR entity.
//!
//! Operations, values, blocks and regions live in `PrimaryMap`s owned by the
//! context and are addressed by the `Copy` refs from [`crate::refs`]. Operand
//! and result lists use `EntityList + ListPool`. Use-chains are kept in sync
//! by every mutation method that touches operands.

use std::collections::BTreeMap;

use cranelift_entity::{EntityList, ListPool, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use crate::location::Location;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::*;

// ============================================================================
// Use-chain
// ============================================================================

/// A single use of a value: which operation uses it, at which operand index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Use {
    pub user: OpRef,
    pub operand_index: u32,
}

// ============================================================================
// Entity data
// ============================================================================

pub struct OperationData {
    pub location: Location,
    pub dialect: Symbol,
    pub name: Symbol,
    pub operands: EntityList<ValueRef>,
    pub results: EntityList<TypeRef>,
    pub attributes: BTreeMap<Symbol, Attribute>,
    pub regions: SmallVec<[RegionRef; 2]>,
    pub parent_block: Option<BlockRef>,
}

pub struct ValueData {
    pub def: ValueDef,
    pub ty: TypeRef,
}

pub struct BlockData {
    pub location: Location,
    /// Argument types; values are allocated by `create_block`.
    pub args: Vec<TypeRef>,
    pub ops: SmallVec<[OpRef; 4]>,
    pub parent_region: Option<RegionRef>,
}

impl BlockData {
    pub fn new(location: Location, args: impl IntoIterator<Item = TypeRef>) -> Self {
        Self {
            location,
            args: args.into_iter().collect(),
            ops: SmallVec::new(),
            parent_region: None,
        }
    }
}

pub struct RegionData {
    pub location: Location,
    pub blocks: SmallVec<[BlockRef; 4]>,
    pub parent_op: Option<OpRef>,
}

// ============================================================================
// IrContext
// ============================================================================

/// Arena-based mutable IR context.
pub struct IrContext {
    ops: PrimaryMap<OpRef, OperationData>,
    values: PrimaryMap<ValueRef, ValueData>,
    blocks: PrimaryMap<BlockRef, BlockData>,
    regions: PrimaryMap<RegionRef, RegionData>,

    /// For each value, the operations using it.
    uses: SecondaryMap<ValueRef, SmallVec<[Use; 2]>>,

    pub types: TypeInterner,
    pub paths: PathInterner,

    value_pool: ListPool<ValueRef>,
    type_pool: ListPool<TypeRef>,

    result_values: SecondaryMap<OpRef, EntityList<ValueRef>>,
    block_arg_values: SecondaryMap<BlockRef, EntityList<ValueRef>>,
}

impl IrContext {
    pub fn new() -> Self {
        Self {
            ops: PrimaryMap::new(),
            values: PrimaryMap::new(),
            blocks: PrimaryMap::new(),
            regions: PrimaryMap::new(),
            uses: SecondaryMap::new(),
            types: TypeInterner::new(),
            paths: PathInterner::new(),
            value_pool: ListPool::new(),
            type_pool: ListPool::new(),
            result_values: SecondaryMap::new(),
            block_arg_values: SecondaryMap::new(),
        }
    }

    // ========================================================================
    // Operation
    // ========================================================================

    /// Create a new operation and allocate its result values.
    ///
    /// Operands are registered in the use-chain and owned regions are
    /// back-linked. The operation starts detached; attach it with `push_op`
    /// or `insert_op_before`.
    ///
    /// # Panics
    ///
    /// Panics if `data.parent_block` is `Some`, or if a region in
    /// `data.regions` already belongs to another operation.
    pub fn create_op(&mut self, data: OperationData) -> OpRef {
        assert!(
            data.parent_block.is_none(),
            "create_op: operation must not have parent_block set; \
             use push_op to attach to a block after creation",
        );

        let operands: SmallVec<[ValueRef; 8]> = data.operands.as_slice(&self.value_pool).into();
        let result_types: SmallVec<[TypeRef; 4]> = data.results.as_slice(&self.type_pool).into();
        let regions = data.regions.clone();

        let op = self.ops.push(data);

        for &r in &regions {
            if let Some(existing) = self.regions[r].parent_op {
                panic!(
                    "create_op: region {r} already belongs to operation {existing}; \
                     cannot reassign to {op}",
                );
            }
            self.regions[r].parent_op = Some(op);
        }

        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].push(Use {
                user: op,
                operand_index: idx as u32,
            });
        }

        let mut result_list = EntityList::new();
        for (idx, &ty) in result_types.iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::OpResult(op, idx as u32),
                ty,
            });
            result_list.push(v, &mut self.value_pool);
        }
        self.result_values[op] = result_list;

        op
    }

    pub fn op(&self, op: OpRef) -> &OperationData {
        &self.ops[op]
    }

    /// Mutable access to operation data.
    ///
    /// Editing `operands` through this desyncs the use-chain; use
    /// `set_operand` or the RAUW helpers instead.
    pub fn op_mut(&mut self, op: OpRef) -> &mut OperationData {
        &mut self.ops[op]
    }

    pub fn op_operands(&self, op: OpRef) -> &[ValueRef] {
        self.ops[op].operands.as_slice(&self.value_pool)
    }

    pub fn op_result_types(&self, op: OpRef) -> &[TypeRef] {
        self.ops[op].results.as_slice(&self.type_pool)
    }

    pub fn op_result(&self, op: OpRef, index: u32) -> ValueRef {
        self.result_values[op].as_slice(&self.value_pool)[index as usize]
    }

    pub fn op_results(&self, op: OpRef) -> &[ValueRef] {
        self.result_values[op].as_slice(&self.value_pool)
    }

    /// Check whether `op` is `dialect.name`.
    pub fn op_is(&self, op: OpRef, dialect: Symbol, name: Symbol) -> bool {
        let data = &self.ops[op];
        data.dialect == dialect && data.name == name
    }

    pub fn attr(&self, op: OpRef, key: Symbol) -> Option<&Attribute> {
        self.ops[op].attributes.get(&key)
    }

    /// Set (or overwrite) an attribute on an operation.
    pub fn set_attr(&mut self, op: OpRef, key: impl Into<Symbol>, value: Attribute) {
        self.ops[op].attributes.insert(key.into(), value);
    }

    pub fn remove_attr(&mut self, op: OpRef, key: Symbol) -> Option<Attribute> {
        self.ops[op].attributes.remove(&key)
    }

    /// Replace operand `index` of `op`, keeping the use-chain in sync.
    pub fn set_operand(&mut self, op: OpRef, index: u32, new: ValueRef) {
        let slice = self.ops[op].operands.as_mut_slice(&mut self.value_pool);
        let old = std::mem::replace(&mut slice[index as usize], new);
        if old == new {
            return;
        }
        self.uses[old].retain(|u| !(u.user == op && u.operand_index == index));
        self.uses[new].push(Use {
            user: op,
            operand_index: index,
        });
    }

    /// Drop an operation's operand uses.
    ///
    /// Does NOT detach it from its block; use `remove_op_from_block` first.
    ///
    /// # Panics
    ///
    /// Panics if the operation is still attached to a block or if any of its
    /// results still has uses.
    pub fn remove_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            panic!(
                "remove_op: operation {op} is still attached to block {block}; \
                 call remove_op_from_block first",
            );
        }

        for &val in self.result_values[op].as_slice(&self.value_pool) {
            assert!(
                self.uses[val].is_empty(),
                "remove_op: result value {val} of {op} still has {} use(s); \
                 replace all uses before removing the operation",
                self.uses[val].len()
            );
        }

        self.drop_operand_uses(op);
    }

    /// Detach an operation from its block and destroy it together with
    /// everything nested in its regions.
    ///
    /// # Panics
    ///
    /// Panics if a result of `op` or of a nested operation is still used
    /// outside the erased subtree.
    pub fn erase_op(&mut self, op: OpRef) {
        if let Some(block) = self.ops[op].parent_block {
            self.remove_op_from_block(block, op);
        }

        let mut nested = Vec::new();
        self.collect_nested_ops(op, &mut nested);
        for &inner in &nested {
            self.drop_operand_uses(inner);
        }
        for &inner in &nested {
            for &val in self.result_values[inner].as_slice(&self.value_pool) {
                assert!(
                    self.uses[val].is_empty(),
                    "erase_op: nested result {val} of {inner} is still used outside {op}",
                );
            }
        }
        for &inner in &nested {
            self.ops[inner].parent_block = None;
        }
        let regions = self.ops[op].regions.clone();
        for region in regions {
            let blocks = self.regions[region].blocks.clone();
            for block in blocks {
                self.blocks[block].ops.clear();
            }
        }

        self.remove_op(op);
    }

    fn collect_nested_ops(&self, op: OpRef, out: &mut Vec<OpRef>) {
        for &region in &self.ops[op].regions {
            for &block in &self.regions[region].blocks {
                for &inner in &self.blocks[block].ops {
                    out.push(inner);
                    self.collect_nested_ops(inner, out);
                }
            }
        }
    }

    fn drop_operand_uses(&mut self, op: OpRef) {
        let operands = self.ops[op].operands.as_slice(&self.value_pool);
        for (idx, &val) in operands.iter().enumerate() {
            self.uses[val].retain(|u| !(u.user == op && u.operand_index == idx as u32));
        }
    }

    // ========================================================================
    // Value
    // ========================================================================

    pub fn value(&self, v: ValueRef) -> &ValueData {
        &self.values[v]
    }

    pub fn value_ty(&self, v: ValueRef) -> TypeRef {
        self.values[v].ty
    }

    pub fn value_def(&self, v: ValueRef) -> ValueDef {
        self.values[v].def
    }

    /// The block in which a value becomes available: the defining op's
    /// block for results, the owning block for arguments.
    pub fn value_block(&self, v: ValueRef) -> Option<BlockRef> {
        match self.values[v].def {
            ValueDef::OpResult(op, _) => self.ops[op].parent_block,
            ValueDef::BlockArg(block, _) => Some(block),
        }
    }

    // ========================================================================
    // Block
    // ========================================================================

    /// Create a new block and allocate its argument values.
    pub fn create_block(&mut self, data: BlockData) -> BlockRef {
        let arg_types = data.args.clone();
        let block = self.blocks.push(data);

        let mut arg_list = EntityList::new();
        for (idx, ty) in arg_types.into_iter().enumerate() {
            let v = self.values.push(ValueData {
                def: ValueDef::BlockArg(block, idx as u32),
                ty,
            });
            arg_list.push(v, &mut self.value_pool);
        }
        self.block_arg_values[block] = arg_list;

        block
    }

    pub fn block(&self, b: BlockRef) -> &BlockData {
        &self.blocks[b]
    }

    pub fn block_mut(&mut self, b: BlockRef) -> &mut BlockData {
        &mut self.blocks[b]
    }

    pub fn block_arg(&self, b: BlockRef, index: u32) -> ValueRef {
        self.block_arg_values[b].as_slice(&self.value_pool)[index as usize]
    }

    pub fn block_args(&self, b: BlockRef) -> &[ValueRef] {
        self.block_arg_values[b].as_slice(&self.value_pool)
    }

    /// Last operation of a block, if any.
    pub fn block_terminator(&self, b: BlockRef) -> Option<OpRef> {
        self.blocks[b].ops.last().copied()
    }

    /// Append an operation to the end of a block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block.
    pub fn push_op(&mut self, block: BlockRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!(
                "push_op: operation {op} already belongs to block {existing}; \
                 remove it from the old block first",
            );
        }
        self.ops[op].parent_block = Some(block);
        self.blocks[block].ops.push(op);
    }

    /// Insert an operation before `before` in the given block.
    ///
    /// # Panics
    ///
    /// Panics if the operation already belongs to a block, or if `before`
    /// is not in the block.
    pub fn insert_op_before(&mut self, block: BlockRef, before: OpRef, op: OpRef) {
        if let Some(existing) = self.ops[op].parent_block {
            panic!(
                "insert_op_before: operation {op} already belongs to block {existing}; \
                 remove it from the old block first",
            );
        }
        let ops = &mut self.blocks[block].ops;
        let Some(pos) = ops.iter().position(|&o| o == before) else {
            panic!("insert_op_before: {before} not found in {block}");
        };
        ops.insert(pos, op);
        self.ops[op].parent_block = Some(block);
    }

    /// Remove an operation from a block without destroying it.
    pub fn remove_op_from_block(&mut self, block: BlockRef, op: OpRef) {
        self.blocks[block].ops.retain(|o| *o != op);
        if self.ops[op].parent_block == Some(block) {
            self.ops[op].parent_block = None;
        }
    }

    /// Move every operation of `from` to the end of `to`, keeping their order.
    pub fn move_ops(&mut self, from: BlockRef, to: BlockRef) {
        let moved = std::mem::take(&mut self.blocks[from].ops);
        for &op in &moved {
            self.ops[op].parent_block = Some(to);
        }
        self.blocks[to].ops.extend(moved);
    }

    // ========================================================================
    // Region
    // ========================================================================

    /// Create a new region.
    ///
    /// # Panics
    ///
    /// Panics if a block in `data.blocks` already belongs to another region.
    pub fn create_region(&mut self, data: RegionData) -> RegionRef {
        let blocks = data.blocks.clone();
        let region = self.regions.push(data);
        for b in blocks {
            if let Some(existing) = self.blocks[b].parent_region {
                panic!(
                    "create_region: block {b} already belongs to region {existing}; \
                     cannot reassign to {region}",
                );
            }
            self.blocks[b].parent_region = Some(region);
        }
        region
    }

    pub fn region(&self, r: RegionRef) -> &RegionData {
        &self.regions[r]
    }

    pub fn region_mut(&mut self, r: RegionRef) -> &mut RegionData {
        &mut self.regions[r]
    }

    /// The region directly containing `op`, if it is attached.
    pub fn op_parent_region(&self, op: OpRef) -> Option<RegionRef> {
        let block = self.ops[op].parent_block?;
        self.blocks[block].parent_region
    }

    /// Whether `op` is nested (at any depth) inside `region`.
    pub fn is_ancestor_region(&self, region: RegionRef, op: OpRef) -> bool {
        let mut current = self.op_parent_region(op);
        while let Some(r) = current {
            if r == region {
                return true;
            }
            current = self.regions[r].parent_op.and_then(|p| self.op_parent_region(p));
        }
        false
    }

    // ========================================================================
    // Use-chain
    // ========================================================================

    pub fn uses(&self, v: ValueRef) -> &[Use] {
        &self.uses[v]
    }

    pub fn has_uses(&self, v: ValueRef) -> bool {
        !self.uses[v].is_empty()
    }

    // ========================================================================
    // RAUW
    // ========================================================================

    /// Replace all uses of `old` with `new` in all operations.
    pub fn replace_all_uses(&mut self, old: ValueRef, new: ValueRef) {
        if old == new {
            return;
        }
        let old_uses = std::mem::take(&mut self.uses[old]);
        for u in old_uses {
            let slice = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(u);
        }
    }

    /// Replace the uses of `old` whose user is nested inside `region`.
    ///
    /// Uses outside the region keep pointing at `old`.
    pub fn replace_all_uses_in_region(&mut self, old: ValueRef, new: ValueRef, region: RegionRef) {
        if old == new {
            return;
        }
        let (inside, outside): (SmallVec<[Use; 2]>, SmallVec<[Use; 2]>) =
            std::mem::take(&mut self.uses[old])
                .into_iter()
                .partition(|u| self.is_ancestor_region(region, u.user));
        self.uses[old] = outside;
        for u in inside {
            let slice = self.ops[u.user].operands.as_mut_slice(&mut self.value_pool);
            debug_assert_eq!(slice[u.operand_index as usize], old);
            slice[u.operand_index as usize] = new;
            self.uses[new].push(u);
        }
    }

    /// Redirect every use of `old`'s results to the results of `new`,
    /// position by position.
    ///
    /// # Panics
    ///
    /// Panics if the two operations have different result counts.
    pub fn replace_op_uses(&mut self, old: OpRef, new: OpRef) {
        let old_results: SmallVec<[ValueRef; 4]> = self.op_results(old).into();
        let new_results: SmallVec<[ValueRef; 4]> = self.op_results(new).into();
        assert_eq!(
            old_results.len(),
            new_results.len(),
            "replace_op_uses: {old} has {} result(s) but {new} has {}",
            old_results.len(),
            new_results.len(),
        );
        for (o, n) in old_results.into_iter().zip(new_results) {
            self.replace_all_uses(o, n);
        }
    }
}

impl Default for IrContext {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// OperationDataBuilder
// ============================================================================

/// Builder for `OperationData` with pool-backed lists.
///
/// Collects operands and result types into `Vec`s, then packs them into
/// `EntityList`s on `build()`.
pub struct OperationDataBuilder {
    location: Location,
    dialect: Symbol,
    name: Symbol,
    operands: Vec<ValueRef>,
    results: Vec<TypeRef>,
    attributes: BTreeMap<Symbol, Attribute>,
    regions: SmallVec<[RegionRef; 2]>,
}

impl OperationDataBuilder {
    pub fn new(location: Location, dialect: Symbol, name: Symbol) -> Self {
        Self {
            location,
            dialect,
            name,
            operands: Vec::new(),
            results: Vec::new(),
            attributes: BTreeMap::new(),
            regions: SmallVec::new(),
        }
    }

    pub fn operand(mut self, v: ValueRef) -> Self {
        self.operands.push(v);
        self
    }

    pub fn operands(mut self, vs: impl IntoIterator<Item = ValueRef>) -> Self {
        self.operands.extend(vs);
        self
    }

    pub fn result(mut self, ty: TypeRef) -> Self {
        self.results.push(ty);
        self
    }

    pub fn results(mut self, tys: impl IntoIterator<Item = TypeRef>) -> Self {
        self.results.extend(tys);
        self
    }

    pub fn attr(mut self, key: impl Into<Symbol>, val: Attribute) -> Self {
        self.attributes.insert(key.into(), val);
        self
    }

    pub fn attrs(mut self, attrs: impl IntoIterator<Item = (Symbol, Attribute)>) -> Self {
        self.attributes.extend(attrs);
        self
    }

    pub fn region(mut self, r: RegionRef) -> Self {
        self.regions.push(r);
        self
    }

    pub fn build(self, ctx: &mut IrContext) -> OperationData {
        let mut operands = EntityList::new();
        operands.extend(self.operands, &mut ctx.value_pool);
        let mut results = EntityList::new();
        results.extend(self.results, &mut ctx.type_pool);
        OperationData {
            location: self.location,
            dialect: self.dialect,
            name: self.name,
            operands,
            results,
            attributes: self.attributes,
            regions: self.regions,
            parent_block: None,
        }
    }
}
