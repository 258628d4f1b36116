//! Mesh splitting by a scalar element attribute.

use crate::element::Element;
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::node::Node;
use std::collections::BTreeMap;

/// One side of a threshold split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    /// Elements whose value is below the threshold.
    Lower,
    /// Elements whose value is at or above the threshold.
    Upper,
}

impl Part {
    fn index(self) -> usize {
        match self {
            Part::Lower => 0,
            Part::Upper => 1,
        }
    }
}

/// Splits a mesh by comparing an order-0 element attribute to a threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdFilter {
    pub attribute: String,
    pub threshold: f64,
}

/// Result of a [`ThresholdFilter`].
///
/// Output node ids follow their first use by an output element. Every node
/// and element attribute of the input is carried over, sharing values.
#[derive(Debug, Clone)]
pub struct ThresholdSplit {
    meshes: [Mesh; 2],
    node_maps: [BTreeMap<usize, usize>; 2],
    element_maps: [BTreeMap<usize, usize>; 2],
    reversed_node_maps: [Vec<usize>; 2],
    reversed_element_maps: [Vec<usize>; 2],
}

#[derive(Default)]
struct PartBuilder {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    node_map: BTreeMap<usize, usize>,
    element_map: BTreeMap<usize, usize>,
    reversed_nodes: Vec<usize>,
    reversed_elements: Vec<usize>,
}

impl PartBuilder {
    fn push(&mut self, input: &Mesh, index: usize, element: &Element) -> Result<()> {
        let mut nodes = Vec::with_capacity(element.n_nodes());
        for &n in element.nodes() {
            let local = match self.node_map.get(&n) {
                Some(&local) => local,
                None => {
                    let source = &input.nodes()[n];
                    let local = self.nodes.len();
                    let mut node = Node::new(local, source.coordinates());
                    *node.attributes_mut() = source.attributes().clone();
                    self.nodes.push(node);
                    self.node_map.insert(n, local);
                    self.reversed_nodes.push(n);
                    local
                }
            };
            nodes.push(local);
        }

        let mut copy = Element::new(element.element_type(), nodes)?;
        *copy.attributes_mut() = element.attributes().clone();
        self.element_map.insert(index, self.elements.len());
        self.reversed_elements.push(index);
        self.elements.push(copy);
        Ok(())
    }
}

/// Output mesh sharing the input's registries and quadrature rules.
fn part_mesh(input: &Mesh, nodes: Vec<Node>, elements: Vec<Element>) -> Result<Mesh> {
    Ok(Mesh::new(nodes, elements)?
        .with_registries(
            input.node_attribute_table().clone(),
            input.element_attribute_table().clone(),
        )
        .with_integration_rules(input.integration_rules().clone()))
}

impl ThresholdFilter {
    pub fn new(attribute: impl Into<String>, threshold: f64) -> Self {
        Self {
            attribute: attribute.into(),
            threshold,
        }
    }

    /// Split `input` into lower and upper meshes.
    pub fn apply(&self, input: &Mesh) -> Result<ThresholdSplit> {
        let id = input.element_attribute_id(&self.attribute, 0).ok_or_else(|| {
            Error::Attribute(format!(
                "element attribute \"{}\" (order 0) is not registered",
                self.attribute
            ))
        })?;

        let mut parts = [PartBuilder::default(), PartBuilder::default()];
        for (index, element) in input.elements().iter().enumerate() {
            let value = element.attribute_value(id)[(0, 0)];
            let part = if value < self.threshold {
                Part::Lower
            } else {
                Part::Upper
            };
            parts[part.index()].push(input, index, element)?;
        }

        let [lower, upper] = parts;
        let split = ThresholdSplit {
            meshes: [
                part_mesh(input, lower.nodes, lower.elements)?,
                part_mesh(input, upper.nodes, upper.elements)?,
            ],
            node_maps: [lower.node_map, upper.node_map],
            element_maps: [lower.element_map, upper.element_map],
            reversed_node_maps: [lower.reversed_nodes, upper.reversed_nodes],
            reversed_element_maps: [lower.reversed_elements, upper.reversed_elements],
        };
        log::debug!(
            "Threshold {} on \"{}\": {} lower, {} upper elements",
            self.threshold,
            self.attribute,
            split.lower().n_elements(),
            split.upper().n_elements()
        );
        Ok(split)
    }
}

impl ThresholdSplit {
    pub fn mesh(&self, part: Part) -> &Mesh {
        &self.meshes[part.index()]
    }

    pub fn lower(&self) -> &Mesh {
        self.mesh(Part::Lower)
    }

    pub fn upper(&self) -> &Mesh {
        self.mesh(Part::Upper)
    }

    /// Take both meshes, lower first.
    pub fn into_meshes(self) -> (Mesh, Mesh) {
        let [lower, upper] = self.meshes;
        (lower, upper)
    }

    /// Input node index → output node index.
    pub fn node_map(&self, part: Part) -> &BTreeMap<usize, usize> {
        &self.node_maps[part.index()]
    }

    /// Input element index → output element index.
    pub fn element_map(&self, part: Part) -> &BTreeMap<usize, usize> {
        &self.element_maps[part.index()]
    }

    /// Output node index → input node index.
    pub fn reversed_node_map(&self, part: Part) -> &[usize] {
        &self.reversed_node_maps[part.index()]
    }

    /// Output element index → input element index.
    pub fn reversed_element_map(&self, part: Part) -> &[usize] {
        &self.reversed_element_maps[part.index()]
    }
}
