//! Mesh data structure.
//!
//! The mesh owns its nodes and elements, one attribute registry per item
//! kind and the quadrature rule used by each element family. Node → element
//! adjacency is built once, at construction, as index lists.
//!
//! # Attribute values
//!
//! Values are passed as a single matrix and may describe either one value
//! per item or one value shared by every item:
//!
//! - a column of `components · items` entries, each item's block read
//!   row-major into the order's shape;
//! - a column of `components` entries, broadcast;
//! - a stack of `items` matrices with the order's shape;
//! - one matrix with the order's shape, broadcast.

use crate::attribute::{AttributeId, AttributeRegistry, COORDINATES};
use crate::element::{Element, ElementType, IntegrationRule, IntegrationRules, NodalField};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::types::{attribute_shape, components, power, AttributeValue, Point3};
use nalgebra::DVector;
use rayon::prelude::*;
use std::sync::Arc;

/// Finite element mesh.
#[derive(Debug, Clone)]
pub struct Mesh {
    nodes: Vec<Node>,
    elements: Vec<Element>,
    node_registry: AttributeRegistry,
    element_registry: AttributeRegistry,
    rules: IntegrationRules,
}

/// Split `values` into one shared value per item.
fn split_values(
    values: &AttributeValue,
    order: usize,
    items: usize,
) -> Result<Vec<Arc<AttributeValue>>> {
    let (rows, cols) = attribute_shape(order);
    let n = components(order);

    if values.ncols() == 1 && values.nrows() == n * items {
        let column = values.as_slice();
        return Ok((0..items)
            .map(|k| {
                Arc::new(AttributeValue::from_row_slice(
                    rows,
                    cols,
                    &column[k * n..(k + 1) * n],
                ))
            })
            .collect());
    }
    if values.ncols() == 1 && values.nrows() == n {
        let shared = Arc::new(AttributeValue::from_row_slice(rows, cols, values.as_slice()));
        return Ok(vec![shared; items]);
    }
    if values.ncols() == cols && values.nrows() == rows * items {
        return Ok((0..items)
            .map(|k| Arc::new(values.rows(k * rows, rows).into_owned()))
            .collect());
    }
    if values.ncols() == cols && values.nrows() == rows {
        let shared = Arc::new(values.clone());
        return Ok(vec![shared; items]);
    }

    Err(Error::Attribute(format!(
        "{}x{} values cannot describe {} items of order {} ({}x{} each)",
        values.nrows(),
        values.ncols(),
        items,
        order,
        rows,
        cols
    )))
}

fn check_shapes(values: &[Arc<AttributeValue>], order: usize, items: usize) -> Result<()> {
    if values.len() != items {
        return Err(Error::Attribute(format!(
            "expected {} values, got {}",
            items,
            values.len()
        )));
    }
    let shape = attribute_shape(order);
    if let Some(bad) = values.iter().find(|v| v.shape() != shape) {
        return Err(Error::Attribute(format!(
            "value is {}x{}, order {} needs {}x{}",
            bad.nrows(),
            bad.ncols(),
            order,
            shape.0,
            shape.1
        )));
    }
    Ok(())
}

/// Stack per-item values into one (items·rows × cols) matrix.
fn stack<'a>(
    items: impl Iterator<Item = Option<&'a AttributeValue>>,
    count: usize,
    order: usize,
) -> AttributeValue {
    let (rows, cols) = attribute_shape(order);
    let mut out = AttributeValue::zeros(count * rows, cols);
    for (k, value) in items.enumerate() {
        if let Some(value) = value.filter(|v| v.shape() == (rows, cols)) {
            out.rows_mut(k * rows, rows).copy_from(value);
        }
    }
    out
}

impl Mesh {
    /// Build a mesh from nodes and elements.
    ///
    /// Node ids must equal their position in `nodes` and elements may only
    /// reference existing nodes. Each node's incident element list is
    /// rebuilt from the connectivity.
    pub fn new(mut nodes: Vec<Node>, elements: Vec<Element>) -> Result<Self> {
        for (index, node) in nodes.iter().enumerate() {
            if node.id() != index {
                return Err(Error::Mesh(format!(
                    "Node at position {} has id {}",
                    index,
                    node.id()
                )));
            }
        }

        for node in nodes.iter_mut() {
            node.clear_elements();
        }
        let n_nodes = nodes.len();
        for (e, element) in elements.iter().enumerate() {
            for &node_idx in element.nodes() {
                let node = nodes.get_mut(node_idx).ok_or_else(|| {
                    Error::Mesh(format!(
                        "Node index {} out of bounds (mesh has {} nodes)",
                        node_idx, n_nodes
                    ))
                })?;
                node.link_element(e);
            }
        }

        let mut node_registry = AttributeRegistry::new();
        node_registry.register(COORDINATES, 1);

        Ok(Self {
            nodes,
            elements,
            node_registry,
            element_registry: AttributeRegistry::new(),
            rules: IntegrationRules::default(),
        })
    }

    /// Replace the quadrature rules.
    pub fn with_integration_rules(mut self, rules: IntegrationRules) -> Self {
        self.rules = rules;
        self
    }

    /// Adopt registries whose ids match the values already stored on the
    /// nodes and elements.
    pub(crate) fn with_registries(
        mut self,
        node_registry: AttributeRegistry,
        element_registry: AttributeRegistry,
    ) -> Self {
        self.node_registry = node_registry;
        self.element_registry = element_registry;
        self
    }

    /// Number of nodes in the mesh.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh.
    pub fn n_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn element(&self, idx: usize) -> Option<&Element> {
        self.elements.get(idx)
    }

    pub fn integration_rules(&self) -> &IntegrationRules {
        &self.rules
    }

    /// Quadrature rule of one element family.
    pub fn rule(&self, element_type: ElementType) -> &IntegrationRule {
        self.rules.get(element_type)
    }

    /// Replace the rule of one element family.
    pub fn set_integration_rule(&mut self, element_type: ElementType, rule: IntegrationRule) -> Result<()> {
        self.rules.set(element_type, rule)
    }

    pub fn register_node_attribute(&mut self, name: &str, order: usize) -> AttributeId {
        self.node_registry.register(name, order)
    }

    pub fn register_element_attribute(&mut self, name: &str, order: usize) -> AttributeId {
        self.element_registry.register(name, order)
    }

    /// Id of a node attribute registered under `name` with `order`.
    pub fn node_attribute_id(&self, name: &str, order: usize) -> Option<AttributeId> {
        self.node_registry.id(name, order)
    }

    /// Id of an element attribute registered under `name` with `order`.
    pub fn element_attribute_id(&self, name: &str, order: usize) -> Option<AttributeId> {
        self.element_registry.id(name, order)
    }

    pub fn node_attribute_table(&self) -> &AttributeRegistry {
        &self.node_registry
    }

    pub fn element_attribute_table(&self) -> &AttributeRegistry {
        &self.element_registry
    }

    /// Node attribute id, warning when it is missing.
    pub(crate) fn node_attribute_id_or_warn(&self, name: &str, order: usize) -> Option<AttributeId> {
        let id = self.node_attribute_id(name, order);
        if id.is_none() {
            log::warn!("Node attribute \"{}\" (order {}) is not registered, using zeros", name, order);
        }
        id
    }

    /// Element attribute id, warning when it is missing.
    pub(crate) fn element_attribute_id_or_warn(&self, name: &str, order: usize) -> Option<AttributeId> {
        let id = self.element_attribute_id(name, order);
        if id.is_none() {
            log::warn!("Element attribute \"{}\" (order {}) is not registered, using zeros", name, order);
        }
        id
    }

    /// Register `name` and assign a value to every node.
    pub fn set_node_attribute_from_values(
        &mut self,
        name: &str,
        order: usize,
        values: &AttributeValue,
    ) -> Result<AttributeId> {
        let split = split_values(values, order, self.nodes.len())?;
        let id = self.node_registry.register(name, order);
        for (node, value) in self.nodes.iter_mut().zip(split) {
            node.attributes_mut().set_shared(id, value);
        }
        Ok(id)
    }

    /// Register `name` and assign a value to every element.
    pub fn set_element_attribute_from_values(
        &mut self,
        name: &str,
        order: usize,
        values: &AttributeValue,
    ) -> Result<AttributeId> {
        let split = split_values(values, order, self.elements.len())?;
        let id = self.element_registry.register(name, order);
        for (element, value) in self.elements.iter_mut().zip(split) {
            element.attributes_mut().set_shared(id, value);
        }
        Ok(id)
    }

    /// Add `values` to an existing node attribute.
    ///
    /// Does nothing when `name` is not registered with `order`. Nodes with no
    /// value yet receive the increment itself.
    pub fn add_node_attribute_from_values(
        &mut self,
        name: &str,
        order: usize,
        values: &AttributeValue,
    ) -> Result<()> {
        let Some(id) = self.node_attribute_id(name, order) else {
            log::debug!("Skipping increment of unregistered node attribute \"{}\"", name);
            return Ok(());
        };
        let split = split_values(values, order, self.nodes.len())?;
        for (node, increment) in self.nodes.iter_mut().zip(split) {
            let sum = match node.attributes().get(id) {
                Some(current) if current.shape() == increment.shape() => current + increment.as_ref(),
                _ => increment.as_ref().clone(),
            };
            node.attributes_mut().set(id, sum);
        }
        Ok(())
    }

    /// Register `name` and assign one (possibly shared) value per node.
    pub fn set_node_attributes(
        &mut self,
        name: &str,
        order: usize,
        values: Vec<Arc<AttributeValue>>,
    ) -> Result<AttributeId> {
        check_shapes(&values, order, self.nodes.len())?;
        let id = self.node_registry.register(name, order);
        for (node, value) in self.nodes.iter_mut().zip(values) {
            node.attributes_mut().set_shared(id, value);
        }
        Ok(id)
    }

    /// Register `name` and assign one (possibly shared) value per element.
    pub fn set_element_attributes(
        &mut self,
        name: &str,
        order: usize,
        values: Vec<Arc<AttributeValue>>,
    ) -> Result<AttributeId> {
        check_shapes(&values, order, self.elements.len())?;
        let id = self.element_registry.register(name, order);
        for (element, value) in self.elements.iter_mut().zip(values) {
            element.attributes_mut().set_shared(id, value);
        }
        Ok(id)
    }

    /// All node values of an attribute, stacked (n_nodes·rows × cols).
    ///
    /// Unregistered attributes and missing values read as zeros.
    pub fn node_attribute_values(&self, name: &str, order: usize) -> AttributeValue {
        let id = self.node_attribute_id_or_warn(name, order);
        stack(
            self.nodes
                .iter()
                .map(|n| id.and_then(|id| n.attributes().get(id))),
            self.nodes.len(),
            order,
        )
    }

    /// All element values of an attribute, stacked (n_elements·rows × cols).
    pub fn element_attribute_values(&self, name: &str, order: usize) -> AttributeValue {
        let id = self.element_attribute_id_or_warn(name, order);
        stack(
            self.elements
                .iter()
                .map(|e| id.and_then(|id| e.attributes().get(id))),
            self.elements.len(),
            order,
        )
    }

    /// Average over incident elements of a per-node evaluator.
    fn average_over_elements<F>(&self, size: usize, eval: F) -> Result<DVector<f64>>
    where
        F: Fn(&Element, usize) -> Result<DVector<f64>> + Sync,
    {
        let per_node: Vec<DVector<f64>> = (0..self.nodes.len())
            .into_par_iter()
            .map(|n| {
                let incident = self.nodes[n].incident_elements();
                let mut sum = DVector::zeros(size);
                for &e in incident {
                    sum += eval(&self.elements[e], n)?;
                }
                if !incident.is_empty() {
                    sum /= incident.len() as f64;
                }
                Ok(sum)
            })
            .collect::<Result<_>>()?;

        let mut out = DVector::zeros(size * per_node.len());
        for (n, value) in per_node.iter().enumerate() {
            out.rows_mut(n * size, size).copy_from(value);
        }
        Ok(out)
    }

    /// Nodal gradient of an order-`order` node attribute.
    ///
    /// B·q is evaluated at the node in every incident element and averaged.
    /// The result is stored as the order-(order+1) node attribute `output`.
    pub fn compute_node_bq(&mut self, order: usize, input: &str, output: &str) -> Result<AttributeId> {
        let field = NodalField::Attribute(self.node_attribute_id_or_warn(input, order));
        let values = self.average_over_elements(power(order + 1), |element, n| {
            element.node_bq(&self.nodes, n, order, field)
        })?;
        let values = AttributeValue::from_column_slice(values.len(), 1, values.as_slice());
        self.set_node_attribute_from_values(output, order + 1, &values)
    }

    /// Nodal flux C·B·q of an order-`order` node attribute, averaged like
    /// [`Mesh::compute_node_bq`]. C is the element attribute `constitutive`
    /// of order 2(order+1).
    pub fn compute_node_cbq(
        &mut self,
        order: usize,
        constitutive: &str,
        input: &str,
        output: &str,
    ) -> Result<AttributeId> {
        let c = self.element_attribute_id_or_warn(constitutive, 2 * (order + 1));
        let field = NodalField::Attribute(self.node_attribute_id_or_warn(input, order));
        let values = self.average_over_elements(power(order + 1), |element, n| {
            element.node_cbq(&self.nodes, n, order, c, field)
        })?;
        let values = AttributeValue::from_column_slice(values.len(), 1, values.as_slice());
        self.set_node_attribute_from_values(output, order + 1, &values)
    }

    /// Move every node by the order-1 node attribute `displacement`.
    pub fn displace_nodes(&mut self, displacement: &str) -> Result<()> {
        let Some(id) = self.node_attribute_id_or_warn(displacement, 1) else {
            return Ok(());
        };
        for node in self.nodes.iter_mut() {
            let Some(u) = node.attributes().get(id) else {
                continue;
            };
            if u.len() != 3 {
                return Err(Error::Attribute(format!(
                    "displacement of node {} has {} entries",
                    node.id(),
                    u.len()
                )));
            }
            let moved = node.coordinates() + Point3::new(u[0], u[1], u[2]);
            node.set_coordinates(moved);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::COORDINATES_ID;
    use crate::element::RuleKind;
    use approx::assert_relative_eq;

    /// Two Tet4 sharing the face (1, 2, 3).
    fn two_tets() -> Mesh {
        let nodes = vec![
            Node::new(0, Point3::new(0.0, 0.0, 0.0)),
            Node::new(1, Point3::new(1.0, 0.0, 0.0)),
            Node::new(2, Point3::new(0.0, 1.0, 0.0)),
            Node::new(3, Point3::new(0.0, 0.0, 1.0)),
            Node::new(4, Point3::new(1.0, 1.0, 1.0)),
        ];
        let elements = vec![
            Element::new(ElementType::Tet4, vec![0, 1, 2, 3]).unwrap(),
            Element::new(ElementType::Tet4, vec![1, 2, 3, 4]).unwrap(),
        ];
        Mesh::new(nodes, elements).unwrap()
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = two_tets();
        assert_eq!(mesh.n_nodes(), 5);
        assert_eq!(mesh.n_elements(), 2);
        assert_eq!(mesh.node(1).unwrap().incident_elements(), &[0, 1]);
        assert_eq!(mesh.node(4).unwrap().incident_elements(), &[1]);
        assert_eq!(mesh.node_attribute_id(COORDINATES, 1), Some(COORDINATES_ID));
        assert!(mesh.element_attribute_table().is_empty());
    }

    #[test]
    fn test_invalid_node_index() {
        let nodes = vec![Node::new(0, Point3::zeros())];
        let elements = vec![Element::new(ElementType::Tet4, vec![0, 1, 2, 3]).unwrap()];
        assert!(matches!(Mesh::new(nodes, elements), Err(Error::Mesh(_))));
    }

    #[test]
    fn test_node_ids_must_match_positions() {
        let nodes = vec![Node::new(0, Point3::zeros()), Node::new(5, Point3::zeros())];
        assert!(Mesh::new(nodes, Vec::new()).is_err());
    }

    #[test]
    fn test_set_integration_rule() {
        let mut mesh = two_tets();
        mesh.set_integration_rule(ElementType::Tet4, IntegrationRule::keast(11).unwrap())
            .unwrap();
        assert_eq!(mesh.rule(ElementType::Tet4).kind(), RuleKind::Keast { points: 11 });
        assert!(mesh
            .set_integration_rule(ElementType::Tet4, IntegrationRule::product_gauss(3, 2).unwrap())
            .is_err());
    }

    #[test]
    fn test_node_attribute_round_trip() {
        let mut mesh = two_tets();
        let values = AttributeValue::from_fn(15, 1, |i, _| i as f64 * 0.5);
        let id = mesh.set_node_attribute_from_values("Velocity", 1, &values).unwrap();
        assert_eq!(id, 2);
        let back = mesh.node_attribute_values("Velocity", 1);
        assert_eq!(back.shape(), (15, 1));
        assert_relative_eq!(back, values);
    }

    #[test]
    fn test_order_two_values_are_row_major() {
        let mut mesh = two_tets();
        let values = AttributeValue::from_fn(9, 1, |i, _| i as f64);
        mesh.set_node_attribute_from_values("Gradient", 2, &values).unwrap();
        let id = mesh.node_attribute_id("Gradient", 2).unwrap();
        let value = mesh.node(3).unwrap().attribute_value(id);
        assert_eq!(value.shape(), (3, 3));
        assert_relative_eq!(value[(0, 1)], 1.0);
        assert_relative_eq!(value[(1, 0)], 3.0);
    }

    #[test]
    fn test_broadcast_shares_one_value() {
        let mut mesh = two_tets();
        let tensor = AttributeValue::identity(9, 9);
        let id = mesh
            .set_element_attribute_from_values("Stiffness Tensor", 4, &tensor)
            .unwrap();
        let a = mesh.element(0).unwrap().attributes().shared(id).unwrap();
        let b = mesh.element(1).unwrap().attributes().shared(id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let stacked = mesh.element_attribute_values("Stiffness Tensor", 4);
        assert_eq!(stacked.shape(), (18, 9));
        assert_relative_eq!(stacked[(9, 0)], 1.0);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let mut mesh = two_tets();
        let bad = AttributeValue::zeros(7, 1);
        assert!(matches!(
            mesh.set_node_attribute_from_values("Bad", 1, &bad),
            Err(Error::Attribute(_))
        ));
        assert_eq!(mesh.node_attribute_id("Bad", 1), None);
    }

    #[test]
    fn test_unregistered_values_are_zero() {
        let mesh = two_tets();
        let values = mesh.node_attribute_values("Missing", 2);
        assert_eq!(values.shape(), (15, 3));
        assert_relative_eq!(values.norm(), 0.0);
    }

    #[test]
    fn test_reregistration_changes_lookup_order() {
        let mut mesh = two_tets();
        let scalar = AttributeValue::from_element(1, 1, 2.0);
        let id = mesh.set_node_attribute_from_values("Density", 0, &scalar).unwrap();
        assert_eq!(mesh.register_node_attribute("Density", 1), id);
        assert_eq!(mesh.node_attribute_id("Density", 0), None);
        assert_relative_eq!(mesh.node_attribute_values("Density", 0).norm(), 0.0);
    }

    #[test]
    fn test_add_node_attribute_accumulates() {
        let mut mesh = two_tets();
        let ones = AttributeValue::from_element(1, 1, 1.0);
        // Unregistered: no effect
        mesh.add_node_attribute_from_values("Heat", 0, &ones).unwrap();
        assert_eq!(mesh.node_attribute_id("Heat", 0), None);

        mesh.set_node_attribute_from_values("Heat", 0, &ones).unwrap();
        let ramp = AttributeValue::from_fn(5, 1, |i, _| i as f64);
        mesh.add_node_attribute_from_values("Heat", 0, &ramp).unwrap();
        let values = mesh.node_attribute_values("Heat", 0);
        assert_relative_eq!(values[(4, 0)], 5.0);
        assert_relative_eq!(values[(0, 0)], 1.0);
    }

    #[test]
    fn test_set_node_attributes_checks_shapes() {
        let mut mesh = two_tets();
        let shared = Arc::new(AttributeValue::from_element(3, 1, 1.0));
        let id = mesh
            .set_node_attributes("Force", 1, vec![shared.clone(); 5])
            .unwrap();
        assert!(Arc::ptr_eq(&mesh.node(0).unwrap().attributes().shared(id).unwrap(), &shared));
        assert!(mesh.set_node_attributes("Force", 1, vec![shared; 4]).is_err());
        let wrong = Arc::new(AttributeValue::zeros(3, 3));
        assert!(mesh.set_element_attributes("Rate", 0, vec![wrong; 2]).is_err());
    }

    #[test]
    fn test_compute_node_bq_of_linear_field() {
        let mut mesh = two_tets();
        // u = x + 2y - z is reproduced exactly, so every average equals the gradient
        let values = AttributeValue::from_iterator(
            5,
            1,
            mesh.nodes().iter().map(|n| {
                let c = n.coordinates();
                c[0] + 2.0 * c[1] - c[2]
            }),
        );
        mesh.set_node_attribute_from_values("Temperature", 0, &values).unwrap();
        mesh.compute_node_bq(0, "Temperature", "Temperature Gradient").unwrap();

        let gradient = mesh.node_attribute_values("Temperature Gradient", 1);
        assert_eq!(gradient.shape(), (15, 1));
        for n in 0..5 {
            assert_relative_eq!(gradient[(3 * n, 0)], 1.0, epsilon = 1e-12);
            assert_relative_eq!(gradient[(3 * n + 1, 0)], 2.0, epsilon = 1e-12);
            assert_relative_eq!(gradient[(3 * n + 2, 0)], -1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_compute_node_cbq_scales_gradient() {
        let mut mesh = two_tets();
        let coords = mesh.node_attribute_values(COORDINATES, 1);
        mesh.set_node_attribute_from_values("Displacements", 1, &coords).unwrap();
        let c = AttributeValue::identity(9, 9) * 2.0;
        mesh.set_element_attribute_from_values("Stiffness Tensor", 4, &c).unwrap();
        mesh.compute_node_cbq(1, "Stiffness Tensor", "Displacements", "Stress")
            .unwrap();

        // u = x gives ∇u = I, so C·∇u = 2I
        let id = mesh.node_attribute_id("Stress", 2).unwrap();
        let stress = mesh.node(2).unwrap().attribute_value(id);
        assert_relative_eq!(stress, AttributeValue::identity(3, 3) * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_displace_nodes() {
        let mut mesh = two_tets();
        let shift = AttributeValue::from_column_slice(3, 1, &[0.5, 0.0, -1.0]);
        mesh.set_node_attribute_from_values("Displacements", 1, &shift).unwrap();
        mesh.displace_nodes("Displacements").unwrap();
        assert_eq!(mesh.node(4).unwrap().coordinates(), Point3::new(1.5, 1.0, 0.0));
        // Coordinates stay in sync with the attribute
        let coords = mesh.node_attribute_values(COORDINATES, 1);
        assert_relative_eq!(coords[(0, 0)], 0.5);
    }
}
