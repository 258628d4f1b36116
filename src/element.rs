//! Elements and their integral kernels.
//!
//! An [`Element`] is a family tag, an ordered list of node indices and an
//! attribute store. Each family implements [`ElementShape`] with fixed-size
//! shape functions; the runtime tag selects the monomorphized kernel and the
//! result is returned as a dynamically sized matrix.
//!
//! # Submodules
//!
//! - [`gauss`] - Gauss-Legendre and Keast quadrature rules
//! - [`tet4`] - 4-node tetrahedron
//! - [`hex8`] - 8-node hexahedron

use crate::attribute::{AttributeId, AttributeStore};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::types::{attribute_shape, dofs_per_node, global_dof, AttributeValue, Point3};
use nalgebra::{DMatrix, DVector, Matrix3, RowSVector, SMatrix};
use serde::{Deserialize, Serialize};

pub mod gauss;
pub mod hex8;
mod kernel;
pub mod tet4;

pub use gauss::{gauss_1d, GaussPoint, IntegrationRule, IntegrationRules, RuleKind};
pub use hex8::Hex8;
pub use tet4::Tet4;

use kernel::Geometry;

/// Fixed-size shape functions of one element family.
pub trait ElementShape<const N: usize>: Send + Sync {
    /// Natural coordinates of each node.
    const NODE_COORDINATES: [[f64; 3]; N];

    /// Shape function values at a natural point.
    fn shape_values(point: &Point3) -> RowSVector<f64, N>;

    /// Shape function derivatives with respect to (ξ, η, ζ), one row per axis.
    fn natural_derivatives(point: &Point3) -> SMatrix<f64, 3, N>;
}

/// Supported element families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 4-node tetrahedron (linear).
    Tet4,
    /// 8-node hexahedron (trilinear).
    Hex8,
}

impl ElementType {
    /// Number of nodes for this element type.
    pub fn n_nodes(self) -> usize {
        match self {
            ElementType::Tet4 => 4,
            ElementType::Hex8 => 8,
        }
    }

    /// Number of boundary faces.
    pub fn n_boundaries(self) -> usize {
        match self {
            ElementType::Tet4 => 4,
            ElementType::Hex8 => 6,
        }
    }

    /// Dimension of the reference element.
    pub fn natural_dimension(self) -> usize {
        3
    }

    /// Natural coordinates of the nodes, in node order.
    pub fn natural_coordinates(self) -> Vec<Point3> {
        fn points(table: &[[f64; 3]]) -> Vec<Point3> {
            table.iter().map(|c| Point3::new(c[0], c[1], c[2])).collect()
        }
        match self {
            ElementType::Tet4 => points(&Tet4::NODE_COORDINATES),
            ElementType::Hex8 => points(&Hex8::NODE_COORDINATES),
        }
    }

    /// Quadrature rule used when none is configured.
    pub fn default_rule(self) -> IntegrationRule {
        IntegrationRules::default().get(self).clone()
    }
}

/// Source of the nodal values q gathered for an element.
#[derive(Debug, Clone, Copy)]
pub enum NodalField<'a> {
    /// A node attribute; `None` (unregistered) reads as zero.
    Attribute(Option<AttributeId>),
    /// A global DOF vector.
    Values(&'a DVector<f64>),
}

fn dynamic<const R: usize, const C: usize>(m: &SMatrix<f64, R, C>) -> DMatrix<f64> {
    DMatrix::from_column_slice(R, C, m.as_slice())
}

macro_rules! with_geometry {
    ($element:expr, $nodes:expr, |$g:ident| $body:expr) => {
        match $element.element_type {
            ElementType::Tet4 => {
                let $g = Geometry::<Tet4, 4>::gather(&$element.nodes, $nodes)?;
                $body
            }
            ElementType::Hex8 => {
                let $g = Geometry::<Hex8, 8>::gather(&$element.nodes, $nodes)?;
                $body
            }
        }
    };
}

/// A mesh element.
///
/// Geometric kernels take the owning mesh's node slice; `nodes()` holds
/// indices into it.
#[derive(Debug, Clone)]
pub struct Element {
    element_type: ElementType,
    nodes: Vec<usize>,
    attributes: AttributeStore,
}

impl Element {
    /// Create an element, validating the node count.
    pub fn new(element_type: ElementType, nodes: Vec<usize>) -> Result<Self> {
        if nodes.len() != element_type.n_nodes() {
            return Err(Error::Element(format!(
                "Element type {:?} requires {} nodes, got {}",
                element_type,
                element_type.n_nodes(),
                nodes.len()
            )));
        }
        Ok(Self {
            element_type,
            nodes,
            attributes: AttributeStore::new(),
        })
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Node indices in element order.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Attribute value, or a 1×1 zero when absent.
    pub fn attribute_value(&self, id: AttributeId) -> AttributeValue {
        self.attributes.value(id)
    }

    /// Position of mesh node `node` in this element's node list.
    pub fn local_index(&self, node: usize) -> Option<usize> {
        self.nodes.iter().position(|&n| n == node)
    }

    /// Global DOF indices for an order-`order` field, node-major.
    pub fn dof_indices(&self, order: usize) -> Vec<usize> {
        let dpn = dofs_per_node(order);
        self.nodes
            .iter()
            .flat_map(|&n| (0..dpn).map(move |local| global_dof(n, local, order)))
            .collect()
    }

    /// Shape function values at a natural point, 1×N.
    pub fn shape_values(&self, point: &Point3) -> DMatrix<f64> {
        match self.element_type {
            ElementType::Tet4 => dynamic(&Tet4::shape_values(point)),
            ElementType::Hex8 => dynamic(&Hex8::shape_values(point)),
        }
    }

    /// Natural derivatives at a natural point, 3×N.
    pub fn natural_derivatives(&self, point: &Point3) -> DMatrix<f64> {
        match self.element_type {
            ElementType::Tet4 => dynamic(&Tet4::natural_derivatives(point)),
            ElementType::Hex8 => dynamic(&Hex8::natural_derivatives(point)),
        }
    }

    /// Jacobian ∂x/∂ξ at a natural point.
    pub fn jacobian(&self, nodes: &[Node], point: &Point3) -> Result<Matrix3<f64>> {
        with_geometry!(self, nodes, |g| Ok(g.at(point).jacobian))
    }

    /// Cartesian derivatives at a natural point, 3×N.
    pub fn cartesian_derivatives(&self, nodes: &[Node], point: &Point3) -> Result<DMatrix<f64>> {
        with_geometry!(self, nodes, |g| Ok(dynamic(&g.at(point).cartesian()?)))
    }

    /// Gradient operator at a natural point, 3^(order+1) × N·3^order.
    pub fn b_matrix(&self, nodes: &[Node], point: &Point3, order: usize) -> Result<DMatrix<f64>> {
        with_geometry!(self, nodes, |g| Ok(kernel::b_matrix(
            &g.at(point).cartesian()?,
            order
        )))
    }

    /// Interpolation operator at a natural point, 3^order × N·3^order.
    pub fn n_matrix(&self, point: &Point3, order: usize) -> DMatrix<f64> {
        match self.element_type {
            ElementType::Tet4 => kernel::n_matrix(&Tet4::shape_values(point), order),
            ElementType::Hex8 => kernel::n_matrix(&Hex8::shape_values(point), order),
        }
    }

    /// Stacked nodal values of an order-`order` field.
    ///
    /// Attribute values are flattened row-major per node. Nodes without a
    /// value contribute zeros; a value of the wrong size is an error.
    pub fn q_vector(&self, nodes: &[Node], order: usize, field: NodalField<'_>) -> Result<DVector<f64>> {
        let dpn = dofs_per_node(order);
        let mut q = DVector::zeros(self.nodes.len() * dpn);
        match field {
            NodalField::Attribute(None) => {}
            NodalField::Attribute(Some(id)) => {
                for (j, &index) in self.nodes.iter().enumerate() {
                    let node = nodes.get(index).ok_or_else(|| {
                        Error::Element(format!("node index {} out of bounds", index))
                    })?;
                    let Some(value) = node.attributes().get(id) else {
                        continue;
                    };
                    if value.len() != dpn {
                        return Err(Error::Attribute(format!(
                            "node {} attribute {} has {}x{} entries, order {} needs {}",
                            index,
                            id,
                            value.nrows(),
                            value.ncols(),
                            order,
                            dpn
                        )));
                    }
                    for r in 0..value.nrows() {
                        for c in 0..value.ncols() {
                            q[j * dpn + r * value.ncols() + c] = value[(r, c)];
                        }
                    }
                }
            }
            NodalField::Values(u) => {
                for (j, &index) in self.nodes.iter().enumerate() {
                    for local in 0..dpn {
                        let dof = global_dof(index, local, order);
                        q[j * dpn + local] = *u.get(dof).ok_or_else(|| {
                            Error::Element(format!(
                                "DOF {} out of bounds ({} values)",
                                dof,
                                u.len()
                            ))
                        })?;
                    }
                }
            }
        }
        Ok(q)
    }

    /// Coefficient attribute with the expected shape; zeros when missing.
    fn coefficient(&self, id: Option<AttributeId>, order: usize) -> Result<DMatrix<f64>> {
        let (rows, cols) = attribute_shape(order);
        match id.and_then(|id| self.attributes.get(id)) {
            None => Ok(DMatrix::zeros(rows, cols)),
            Some(value) if value.shape() == (rows, cols) => Ok(value.clone()),
            Some(value) => Err(Error::Attribute(format!(
                "element coefficient is {}x{}, order {} needs {}x{}",
                value.nrows(),
                value.ncols(),
                order,
                rows,
                cols
            ))),
        }
    }

    /// ∫ BᵗB.
    pub fn btb(&self, nodes: &[Node], rule: &IntegrationRule, order: usize) -> Result<DMatrix<f64>> {
        with_geometry!(self, nodes, |g| g.btb(rule, order))
    }

    /// ∫ BᵗCB with C the order-2(order+1) element attribute `constitutive`.
    pub fn btcb(
        &self,
        nodes: &[Node],
        rule: &IntegrationRule,
        order: usize,
        constitutive: Option<AttributeId>,
    ) -> Result<DMatrix<f64>> {
        let c = self.coefficient(constitutive, 2 * (order + 1))?;
        with_geometry!(self, nodes, |g| g.btcb(rule, order, &c))
    }

    /// ∫ NᵗCN with C the order-2·order element attribute `coefficient`.
    pub fn ntcn(
        &self,
        nodes: &[Node],
        rule: &IntegrationRule,
        order: usize,
        coefficient: Option<AttributeId>,
    ) -> Result<DMatrix<f64>> {
        let c = self.coefficient(coefficient, 2 * order)?;
        with_geometry!(self, nodes, |g| g.ntcn(rule, order, &c))
    }

    /// ∫ NᵗN.
    pub fn ntn(&self, nodes: &[Node], rule: &IntegrationRule, order: usize) -> Result<DMatrix<f64>> {
        with_geometry!(self, nodes, |g| g.ntn(rule, order))
    }

    /// ∫ NᵗN q.
    pub fn ntnq(
        &self,
        nodes: &[Node],
        rule: &IntegrationRule,
        order: usize,
        field: NodalField<'_>,
    ) -> Result<DVector<f64>> {
        let q = self.q_vector(nodes, order, field)?;
        with_geometry!(self, nodes, |g| g.ntnq(rule, order, &q))
    }

    /// ∫ Nᵗ C (N q)(N q) for a scalar field and scalar coefficient.
    pub fn ntcnqnq(
        &self,
        nodes: &[Node],
        rule: &IntegrationRule,
        order: usize,
        coefficient: Option<AttributeId>,
        field: NodalField<'_>,
    ) -> Result<DVector<f64>> {
        let c = self.coefficient(coefficient, 2 * order)?;
        let q = self.q_vector(nodes, order, field)?;
        with_geometry!(self, nodes, |g| g.ntcnqnq(rule, order, &c, &q))
    }

    fn require_local(&self, node: usize) -> Result<usize> {
        self.local_index(node).ok_or_else(|| {
            Error::Element(format!("node {} is not part of this element", node))
        })
    }

    /// B·q evaluated at mesh node `node`, 3^(order+1) entries.
    pub fn node_bq(
        &self,
        nodes: &[Node],
        node: usize,
        order: usize,
        field: NodalField<'_>,
    ) -> Result<DVector<f64>> {
        let local = self.require_local(node)?;
        let q = self.q_vector(nodes, order, field)?;
        with_geometry!(self, nodes, |g| g.node_bq(local, order, &q))
    }

    /// C·B·q evaluated at mesh node `node`, 3^(order+1) entries.
    pub fn node_cbq(
        &self,
        nodes: &[Node],
        node: usize,
        order: usize,
        constitutive: Option<AttributeId>,
        field: NodalField<'_>,
    ) -> Result<DVector<f64>> {
        let local = self.require_local(node)?;
        let c = self.coefficient(constitutive, 2 * (order + 1))?;
        let q = self.q_vector(nodes, order, field)?;
        with_geometry!(self, nodes, |g| g.node_cbq(local, order, &c, &q))
    }

    /// Element volume by quadrature.
    pub fn volume(&self, nodes: &[Node], rule: &IntegrationRule) -> Result<f64> {
        with_geometry!(self, nodes, |g| g.volume(rule))
    }

    /// Mean of the nodal coordinates.
    pub fn barycenter(&self, nodes: &[Node]) -> Result<Point3> {
        with_geometry!(self, nodes, |g| Ok(g.barycenter()))
    }
}
