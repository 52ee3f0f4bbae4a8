use crate::errors::{GenError, GenResult, Stage};
use crate::unit::{ClassItem, ItemBody, ItemId, ItemKind, Signature, TemplateRef, Ty, TyArg, Unit};
use pxd_ir::Expression;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DependencyKind {
    /// The target must be fully declared first; forward declarations do not help.
    Strict,
    /// A forward declaration of the target is enough.
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub from: ItemId,
    pub to: ItemId,
    pub kind: DependencyKind,
    pub context: String, // Where in `from` the reference occurs
}

/// How a type is used at the point it is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Usage {
    /* Contained by value: layout depends on the target */
    Value,
    /* Behind a pointer, reference or in a signature */
    Indirect,
}

#[derive(Debug)]
pub struct DependencyGraph {
    pub nodes: BTreeSet<ItemId>,
    /* (from, to) -> strongest kind among the edges between the pair */
    adjacency: BTreeMap<ItemId, BTreeMap<ItemId, DependencyKind>>,
}

/// Emission plan for the retained items of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPlan {
    /// Aggregates that get a bare forward declaration ahead of everything else.
    pub forward: Vec<ItemId>,
    /// Every retained item, in emission order.
    pub order: Vec<ItemId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            nodes: BTreeSet::new(),
            adjacency: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, id: ItemId) {
        self.nodes.insert(id);
        self.adjacency.entry(id).or_default();
    }

    pub fn add_dependency(&mut self, dep: Dependency) {
        if dep.from == dep.to && dep.kind == DependencyKind::Weak {
            return;
        }
        trace!(
            "edge {:?} -> {:?} ({:?}, {})",
            dep.from, dep.to, dep.kind, dep.context
        );
        self.add_node(dep.from);
        self.add_node(dep.to);

        let kind = self
            .adjacency
            .entry(dep.from)
            .or_default()
            .entry(dep.to)
            .or_insert(dep.kind);
        *kind = (*kind).min(dep.kind);
    }

    /// Build the graph over `retained`; references to other items are ignored.
    pub fn build(unit: &Unit, retained: &[ItemId]) -> Self {
        let mut graph = Self::new();
        let keep: HashSet<ItemId> = retained.iter().copied().collect();
        for &id in retained {
            graph.add_node(id);
            for dep in item_dependencies(unit, id) {
                if keep.contains(&dep.to) {
                    graph.add_dependency(dep);
                }
            }
        }
        graph
    }

    fn kind_between(&self, from: ItemId, to: ItemId) -> Option<DependencyKind> {
        self.adjacency.get(&from)?.get(&to).copied()
    }

    /// Edges still in force once `forward` aggregates are forward declared.
    fn active_edges(&self, forward: &BTreeSet<ItemId>) -> Vec<(ItemId, ItemId, DependencyKind)> {
        let mut active = Vec::new();
        for (&from, targets) in &self.adjacency {
            for (&to, &kind) in targets {
                if kind == DependencyKind::Weak && forward.contains(&to) {
                    continue;
                }
                active.push((from, to, kind));
            }
        }
        active
    }

    /// Kahn's algorithm, always taking the ready node with the smallest key.
    ///
    /// Returns the nodes that could not be placed when the graph has a cycle.
    pub fn topological_sort<K: Ord + Copy>(
        &self,
        forward: &BTreeSet<ItemId>,
        key: impl Fn(ItemId) -> K,
    ) -> Result<Vec<ItemId>, BTreeSet<ItemId>> {
        let mut in_degree: HashMap<ItemId, usize> = self.nodes.iter().map(|&n| (n, 0)).collect();
        let mut dependents: HashMap<ItemId, Vec<ItemId>> = HashMap::new();

        /* A -> B means A depends on B, so B is emitted first and enables A */
        for (from, to, _) in self.active_edges(forward) {
            *in_degree.entry(from).or_insert(0) += 1;
            dependents.entry(to).or_default().push(from);
        }

        let mut ready: BTreeSet<(K, ItemId)> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&node, _)| (key(node), node))
            .collect();
        let mut result = Vec::new();

        while let Some(entry) = ready.pop_first() {
            let node = entry.1;
            result.push(node);
            for &dependent in dependents.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert((key(dependent), dependent));
                    }
                }
            }
        }

        if result.len() == self.nodes.len() {
            Ok(result)
        } else {
            let placed: HashSet<ItemId> = result.into_iter().collect();
            Err(self
                .nodes
                .iter()
                .copied()
                .filter(|n| !placed.contains(n))
                .collect())
        }
    }

    /// Find one cycle among `stalled` nodes, as a closed path (`[a, b, a]`).
    pub fn find_cycle(
        &self,
        stalled: &BTreeSet<ItemId>,
        forward: &BTreeSet<ItemId>,
        position: impl Fn(ItemId) -> (usize, usize),
    ) -> Option<Vec<ItemId>> {
        let mut successors: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for (from, to, _) in self.active_edges(forward) {
            if stalled.contains(&from) && stalled.contains(&to) {
                successors.entry(from).or_default().push(to);
            }
        }
        for targets in successors.values_mut() {
            targets.sort_by_key(|&id| position(id));
        }

        let mut starts: Vec<ItemId> = stalled.iter().copied().collect();
        starts.sort_by_key(|&id| position(id));

        let mut visited = HashSet::new();
        for start in starts {
            if visited.contains(&start) {
                continue;
            }
            let mut on_stack = HashSet::new();
            let mut path = Vec::new();
            if let Some(cycle) =
                Self::dfs_cycle(start, &successors, &mut visited, &mut on_stack, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle(
        node: ItemId,
        successors: &HashMap<ItemId, Vec<ItemId>>,
        visited: &mut HashSet<ItemId>,
        on_stack: &mut HashSet<ItemId>,
        path: &mut Vec<ItemId>,
    ) -> Option<Vec<ItemId>> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for &next in successors.get(&node).into_iter().flatten() {
            if on_stack.contains(&next) {
                let start = path.iter().position(|&n| n == next)?;
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            if !visited.contains(&next) {
                if let Some(cycle) = Self::dfs_cycle(next, successors, visited, on_stack, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        on_stack.remove(&node);
        None
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute forward declarations and emission order for `retained` items.
pub fn plan(unit: &Unit, retained: &[ItemId]) -> GenResult<OrderPlan> {
    let graph = DependencyGraph::build(unit, retained);
    let position = |id: ItemId| unit.item(id).position;
    let mut forward: BTreeSet<ItemId> = BTreeSet::new();

    loop {
        let phase_key = |id: ItemId| (phase(unit, &graph, &forward, id), position(id));
        let stalled = match graph.topological_sort(&forward, phase_key) {
            Ok(order) => {
                let mut forward: Vec<ItemId> = forward.into_iter().collect();
                forward.sort_by_key(|&id| position(id));
                debug!(
                    "ordered {} items with {} forward declarations",
                    order.len(),
                    forward.len()
                );
                return Ok(OrderPlan { forward, order });
            }
            Err(stalled) => stalled,
        };

        let Some(cycle) = graph.find_cycle(&stalled, &forward, position) else {
            /* A stall always contains a cycle; report the stalled set if the search disagrees */
            return Err(GenError::StructuralCycle {
                stage: Stage::Ordering,
                path: stalled.iter().map(|&id| display_name(unit, id)).collect(),
            });
        };

        let breakable = cycle
            .windows(2)
            .filter(|pair| graph.kind_between(pair[0], pair[1]) == Some(DependencyKind::Weak))
            .map(|pair| pair[1])
            .max_by_key(|&id| position(id));

        match breakable {
            Some(target) => {
                debug!(
                    "forward declaring {} to break cycle {}",
                    display_name(unit, target),
                    cycle_text(unit, &cycle)
                );
                forward.insert(target);
            }
            None => {
                return Err(GenError::StructuralCycle {
                    stage: Stage::Ordering,
                    path: cycle.iter().map(|&id| display_name(unit, id)).collect(),
                });
            }
        }
    }
}

/* 0: constants, 1: aliases that lean on a forward declaration, 2: everything else */
fn phase(unit: &Unit, graph: &DependencyGraph, forward: &BTreeSet<ItemId>, id: ItemId) -> u8 {
    match unit.item(id).kind {
        ItemKind::Constant => 0,
        ItemKind::Typedef | ItemKind::FnAlias
            if forward.iter().any(|&f| graph.kind_between(id, f) == Some(DependencyKind::Weak)) =>
        {
            1
        }
        _ => 2,
    }
}

fn display_name(unit: &Unit, id: ItemId) -> String {
    let item = unit.item(id);
    match item.qualified_name() {
        Some(name) => name,
        None => item.describe(),
    }
}

fn cycle_text(unit: &Unit, cycle: &[ItemId]) -> String {
    cycle
        .iter()
        .map(|&id| display_name(unit, id))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Every item `id` references, with the strength of each reference.
pub fn item_dependencies(unit: &Unit, id: ItemId) -> Vec<Dependency> {
    let mut collector = Collector {
        unit,
        from: id,
        deps: Vec::new(),
    };
    let item = unit.item(id);

    match &item.body {
        ItemBody::Aggregate { fields } => {
            for field in fields.iter().flatten() {
                collector.ty(&field.ty, Usage::Value, &field.name);
            }
        }
        ItemBody::Enum { values } => {
            for value in values {
                if let Some(expr) = &value.value {
                    collector.expression(expr, &value.name);
                }
            }
        }
        ItemBody::Typedef { target } => match target {
            /* Naming an aggregate needs only its declaration */
            Ty::Item { id: target_id, .. } if unit.item(*target_id).kind.is_aggregate() => {
                collector.push(*target_id, DependencyKind::Weak, "typedef target");
            }
            Ty::FunctionPointer(signature) => collector.signature(signature, "typedef target"),
            _ => collector.ty(target, Usage::Value, "typedef target"),
        },
        ItemBody::FnAlias { signature } | ItemBody::Function { signature } => {
            collector.signature(signature, "signature")
        }
        ItemBody::Variable { ty } => collector.ty(ty, Usage::Indirect, "variable"),
        ItemBody::Constant { ty, value } => {
            if let Some(ty) = ty {
                collector.ty(ty, Usage::Indirect, "constant type");
            }
            if let Some(value) = value {
                collector.expression(value, "constant value");
            }
        }
        ItemBody::Class(class) => {
            for base in &class.bases {
                collector.ty(base, Usage::Value, "base class");
            }
            for member in class.members.iter().flatten() {
                match member {
                    ClassItem::Field(field) => collector.ty(&field.ty, Usage::Value, &field.name),
                    ClassItem::Method(method) => collector.signature(&method.signature, &method.name),
                    ClassItem::Constructor(params) => {
                        for param in params {
                            collector.ty(&param.ty, Usage::Indirect, "constructor");
                        }
                    }
                }
            }
        }
    }

    collector.deps
}

struct Collector<'a> {
    unit: &'a Unit,
    from: ItemId,
    deps: Vec<Dependency>,
}

impl Collector<'_> {
    fn push(&mut self, to: ItemId, kind: DependencyKind, context: &str) {
        self.deps.push(Dependency {
            from: self.from,
            to,
            kind,
            context: context.to_string(),
        });
    }

    fn signature(&mut self, signature: &Signature, context: &str) {
        self.ty(&signature.return_type, Usage::Indirect, context);
        for param in &signature.params {
            self.ty(&param.ty, Usage::Indirect, context);
        }
    }

    fn item_use(&mut self, to: ItemId, usage: Usage, context: &str) {
        let kind = self.unit.item(to).kind;
        match kind {
            ItemKind::Struct | ItemKind::Union | ItemKind::Class => {
                let strength = match usage {
                    Usage::Value => DependencyKind::Strict,
                    Usage::Indirect => DependencyKind::Weak,
                };
                self.push(to, strength, context);
            }
            ItemKind::Typedef => {
                self.push(to, DependencyKind::Strict, context);
                if usage == Usage::Value {
                    let mut seen = HashSet::new();
                    self.through_typedef(to, context, &mut seen);
                }
            }
            ItemKind::Enum | ItemKind::FnAlias => self.push(to, DependencyKind::Strict, context),
            ItemKind::Function | ItemKind::Variable | ItemKind::Constant => {}
        }
    }

    /// A typedef used by value needs whatever it names by value to be complete.
    fn through_typedef(&mut self, typedef: ItemId, context: &str, seen: &mut HashSet<ItemId>) {
        if !seen.insert(typedef) {
            return;
        }
        let ItemBody::Typedef { target } = &self.unit.item(typedef).body else {
            return;
        };
        let mut target = target;
        while let Ty::Array { element, .. } = target {
            target = element;
        }
        if let Ty::Item { id, .. } = target {
            match self.unit.item(*id).kind {
                k if k.is_aggregate() => self.push(*id, DependencyKind::Strict, context),
                ItemKind::Typedef => self.through_typedef(*id, context, seen),
                _ => {}
            }
        }
    }

    fn ty(&mut self, ty: &Ty, usage: Usage, context: &str) {
        match ty {
            Ty::Named { .. } => {}
            Ty::Item { id, .. } => self.item_use(*id, usage, context),
            Ty::Pointer { pointee, .. } => self.ty(pointee, Usage::Indirect, context),
            Ty::Reference { referent } => self.ty(referent, Usage::Indirect, context),
            Ty::Array { element, size } => {
                self.ty(element, usage, context);
                if let Some(size) = size {
                    self.expression(size, context);
                }
            }
            Ty::FunctionPointer(signature) => self.signature(signature, context),
            Ty::Template {
                template,
                args,
                specialization,
                ..
            } => {
                match (specialization, template) {
                    (Some(id), _) | (None, TemplateRef::Item(id)) => {
                        self.item_use(*id, usage, context)
                    }
                    (None, TemplateRef::Named { .. }) => {}
                }
                for arg in args {
                    if let TyArg::Type(arg_ty) = arg {
                        self.ty(arg_ty, Usage::Indirect, context);
                    }
                }
            }
        }
    }

    /// Array sizes and enum initializers need the constants they name.
    fn expression(&mut self, expr: &Expression, context: &str) {
        match expr {
            Expression::Identifier(name) => {
                let target = self
                    .unit
                    .enum_owning(name)
                    .or_else(|| self.unit.constant_named(name));
                if let Some(to) = target {
                    if to != self.from {
                        self.push(to, DependencyKind::Strict, context);
                    }
                }
            }
            Expression::BinaryOp(binary) => {
                self.expression(&binary.left, context);
                self.expression(&binary.right, context);
            }
            Expression::UnaryOp(unary) => self.expression(&unary.operand, context),
            Expression::IntegerLiteral(_)
            | Expression::FloatLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::CharLiteral(_)
            | Expression::Opaque(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "dependency_tests.rs"]
mod dependency_tests;
