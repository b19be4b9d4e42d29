/**
 * RENDER - projection d'une topologie brute vers le graphe affiché
 *
 * RÔLE :
 * Fonction pure (Report, sélecteur, MapFunc, PseudoFunc) -> nœuds rendus.
 * Regroupe les nœuds bruts, synthétise les pseudo-nœuds pour les extrémités
 * inconnues et agrège les statistiques d'arêtes sur chaque nœud source.
 *
 * FONCTIONNEMENT :
 * 1. Chaque nœud de la topologie passe par la MapFunc ; les nœuds visibles
 *    sont insérés sous leur id projeté (le dernier écrit ses libellés)
 * 2. Chaque entrée d'adjacence est décodée ; une clé malformée arrête le
 *    rendu immédiatement avec `InvariantViolation`
 * 3. Source et destination sont résolues via la table id brut -> id projeté,
 *    sinon via la PseudoFunc (mémoïsée par id brut)
 * 4. L'arête est ajoutée à la source avec sa provenance et ses métadonnées
 */
use crate::mapping::{MapFunc, PseudoFunc, TopologySelector};
use crate::renderable::{merge_renderable_nodes, AggregateMetadata, RenderableNode, RenderableNodes};
use std::collections::HashMap;
use symbion_report::ids::{make_host_node_id, parse_adjacency_id};
use symbion_report::intern::HOST_NODE_ID;
use symbion_report::{EdgeMetadata, InvariantViolation, Node, NodeSet, Report, Topology};
use tracing::debug;

/// Anything that turns a report into a display graph.
pub trait Renderer {
    fn render(&self, report: &Report) -> Result<RenderableNodes, InvariantViolation>;

    /// Metadata of the rendered edge `src → dst`, both being rendered ids.
    fn edge_metadata(&self, report: &Report, src: &str, dst: &str) -> Result<EdgeMetadata, InvariantViolation>;
}

/// Raw id → rendered id, filled by the node pass and by pseudo synthesis.
/// `None` records a raw id the pseudo function chose to hide.
struct Resolver<'a> {
    mapped: HashMap<&'a str, Option<String>>,
    pseudo: Option<PseudoFunc>,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, raw_id: &'a str, nodes: &mut RenderableNodes) -> Option<String> {
        if let Some(known) = self.mapped.get(raw_id) {
            return known.clone();
        }
        let pseudo = self.pseudo?;
        let resolved = pseudo(raw_id).map(|mapped| {
            nodes.entry(mapped.id.clone()).or_insert_with(|| RenderableNode::new_pseudo(&mapped));
            mapped.id
        });
        self.mapped.insert(raw_id, resolved.clone());
        resolved
    }
}

pub fn render(
    report: &Report,
    selector: TopologySelector,
    mapper: MapFunc,
    pseudo: Option<PseudoFunc>,
) -> Result<RenderableNodes, InvariantViolation> {
    render_topology(selector(report), mapper, pseudo)
}

pub fn render_topology(
    topology: &Topology,
    mapper: MapFunc,
    pseudo: Option<PseudoFunc>,
) -> Result<RenderableNodes, InvariantViolation> {
    let entries = topology.adjacency_entries();
    let mut nodes = RenderableNodes::new();
    let mut resolver = Resolver { mapped: HashMap::new(), pseudo };
    let mut children: HashMap<String, Vec<Node>> = HashMap::new();

    for (raw_id, node) in topology.nodes() {
        let Some(mapped) = mapper(raw_id, node) else { continue };
        let rendered = nodes.entry(mapped.id.clone()).or_insert_with(|| RenderableNode::new(&mapped));
        rendered.relabel(&mapped);
        rendered.origins = rendered.origins.add(raw_id);
        children.entry(mapped.id.clone()).or_default().push(node.clone());
        resolver.mapped.insert(raw_id, Some(mapped.id));
    }
    for (id, group) in children {
        if let Some(rendered) = nodes.get_mut(&id) {
            rendered.children = NodeSet::from_nodes(group);
        }
    }

    for (adjacency_id, dsts) in &entries {
        let adjacency = parse_adjacency_id(adjacency_id)?;
        let src_raw = adjacency.node_id;
        let Some(src_id) = resolver.resolve(src_raw, &mut nodes) else { continue };

        let origin_host = match adjacency.host {
            Some(host) if !host.is_empty() => Some(make_host_node_id(host)),
            _ => topology
                .node(src_raw)
                .and_then(|n| n.latest().lookup(HOST_NODE_ID))
                .cloned(),
        };

        for dst_raw in dsts.iter() {
            let Some(dst_id) = resolver.resolve(dst_raw, &mut nodes) else { continue };
            let Some(src) = nodes.get_mut(&src_id) else { continue };
            src.adjacency = src.adjacency.add(&dst_id);
            if let Some(host) = &origin_host {
                src.origins = src.origins.add(host);
            }
            src.origins = src.origins.add(src_raw);
            if let Some(md) = topology.edge_metadata(src_raw, dst_raw) {
                src.metadata.merge(&AggregateMetadata::from(&md));
            }
        }
    }

    debug!(nodes = nodes.len(), "[render] topologie rendue");
    Ok(nodes)
}

/// Renders one topology with a fixed selector, map and pseudo function.
#[derive(Clone, Copy)]
pub struct LeafMap {
    pub selector: TopologySelector,
    pub mapper: MapFunc,
    pub pseudo: Option<PseudoFunc>,
}

impl LeafMap {
    pub fn new(selector: TopologySelector, mapper: MapFunc, pseudo: Option<PseudoFunc>) -> Self {
        Self { selector, mapper, pseudo }
    }

    /// Same resolution as the render: the map function, then the pseudo
    /// function for absent or hidden nodes.
    fn rendered_id(&self, topology: &Topology, raw_id: &str) -> Option<String> {
        topology
            .node(raw_id)
            .and_then(|node| (self.mapper)(raw_id, node))
            .or_else(|| self.pseudo.and_then(|pseudo| pseudo(raw_id)))
            .map(|m| m.id)
    }
}

impl Renderer for LeafMap {
    fn render(&self, report: &Report) -> Result<RenderableNodes, InvariantViolation> {
        render(report, self.selector, self.mapper, self.pseudo)
    }

    /// Flattens every raw edge whose ends map onto `src` and `dst`.
    fn edge_metadata(&self, report: &Report, src: &str, dst: &str) -> Result<EdgeMetadata, InvariantViolation> {
        let topology = (self.selector)(report);
        let mut out = EdgeMetadata::default();
        for (adjacency_id, dsts) in &topology.adjacency_entries() {
            let src_raw = parse_adjacency_id(adjacency_id)?.node_id;
            if self.rendered_id(topology, src_raw).as_deref() != Some(src) {
                continue;
            }
            for dst_raw in dsts.iter() {
                if self.rendered_id(topology, dst_raw).as_deref() != Some(dst) {
                    continue;
                }
                if let Some(md) = topology.edge_metadata(src_raw, dst_raw) {
                    out = out.flatten(&md);
                }
            }
        }
        Ok(out)
    }
}

/// Several renderers combined: nodes with the same rendered id are merged.
pub struct Reduce(pub Vec<Box<dyn Renderer + Send + Sync>>);

impl Reduce {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with<R: Renderer + Send + Sync + 'static>(mut self, renderer: R) -> Self {
        self.0.push(Box::new(renderer));
        self
    }
}

impl Default for Reduce {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for Reduce {
    fn render(&self, report: &Report) -> Result<RenderableNodes, InvariantViolation> {
        let mut out = RenderableNodes::new();
        for renderer in &self.0 {
            out = merge_renderable_nodes(out, renderer.render(report)?);
        }
        Ok(out)
    }

    fn edge_metadata(&self, report: &Report, src: &str, dst: &str) -> Result<EdgeMetadata, InvariantViolation> {
        let mut out = EdgeMetadata::default();
        for renderer in &self.0 {
            out = out.flatten(&renderer.edge_metadata(report, src, dst)?);
        }
        Ok(out)
    }
}

/// Metadata of one rendered edge, without pseudo nodes.
pub fn render_edge_metadata(
    report: &Report,
    selector: TopologySelector,
    mapper: MapFunc,
    src: &str,
    dst: &str,
) -> Result<EdgeMetadata, InvariantViolation> {
    LeafMap::new(selector, mapper, None).edge_metadata(report, src, dst)
}
