//! Fixed-size kernel evaluation shared by every element family.
//!
//! Geometry (nodal coordinates, Jacobians, shape function derivatives) is
//! kept in `SMatrix` types sized by the family's node count `N`. Operators
//! whose size depends on the field order (B, N, local kernels) are built as
//! `DMatrix` at the boundary.

use crate::element::gauss::IntegrationRule;
use crate::element::ElementShape;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::types::{dofs_per_node, power, Point3, DIMENSION};
use nalgebra::{DMatrix, DVector, Matrix3, RowSVector, SMatrix};
use std::marker::PhantomData;

/// Nodal coordinates of one element, one row per node.
pub(crate) struct Geometry<S, const N: usize> {
    coords: SMatrix<f64, N, 3>,
    shape: PhantomData<S>,
}

/// Shape data evaluated at one natural point.
pub(crate) struct PointData<const N: usize> {
    pub values: RowSVector<f64, N>,
    pub natural: SMatrix<f64, 3, N>,
    pub jacobian: Matrix3<f64>,
}

impl<const N: usize> PointData<N> {
    /// |det J|, the integration measure.
    pub fn measure(&self) -> f64 {
        self.jacobian.determinant().abs()
    }

    /// Cartesian derivatives J⁻¹ · dN/dξ.
    pub fn cartesian(&self) -> Result<SMatrix<f64, 3, N>> {
        let inverse = self.jacobian.try_inverse().ok_or_else(|| {
            Error::Element("degenerate element: Jacobian is singular".into())
        })?;
        Ok(inverse * self.natural)
    }
}

impl<S: ElementShape<N>, const N: usize> Geometry<S, N> {
    /// Gather nodal coordinates from the mesh nodes.
    pub fn gather(element_nodes: &[usize], nodes: &[Node]) -> Result<Self> {
        if element_nodes.len() != N {
            return Err(Error::Element(format!(
                "expected {} nodes, got {}",
                N,
                element_nodes.len()
            )));
        }
        let mut coords = SMatrix::<f64, N, 3>::zeros();
        for (row, &index) in element_nodes.iter().enumerate() {
            let node = nodes.get(index).ok_or_else(|| {
                Error::Element(format!(
                    "node index {} out of bounds ({} nodes)",
                    index,
                    nodes.len()
                ))
            })?;
            let c = node.coordinates();
            for d in 0..DIMENSION {
                coords[(row, d)] = c[d];
            }
        }
        Ok(Self {
            coords,
            shape: PhantomData,
        })
    }

    /// Shape data at a natural point.
    pub fn at(&self, point: &Point3) -> PointData<N> {
        let natural = S::natural_derivatives(point);
        PointData {
            values: S::shape_values(point),
            jacobian: natural * self.coords,
            natural,
        }
    }

    /// Shape data at the natural coordinates of local node `local`.
    pub fn at_node(&self, local: usize) -> PointData<N> {
        let c = S::NODE_COORDINATES[local];
        self.at(&Point3::new(c[0], c[1], c[2]))
    }

    /// Σ w·|det J|·f(point) over the rule.
    pub fn integrate<F>(&self, rule: &IntegrationRule, rows: usize, cols: usize, mut f: F) -> Result<DMatrix<f64>>
    where
        F: FnMut(&PointData<N>) -> Result<DMatrix<f64>>,
    {
        let mut sum = DMatrix::zeros(rows, cols);
        for gp in rule.points() {
            let data = self.at(&gp.point());
            let value = f(&data)?;
            sum += value * (gp.weight * data.measure());
        }
        Ok(sum)
    }
}

/// Gradient operator of an order-`order` field.
///
/// Size is 3^(order+1) × N·3^order. Row i holds the derivative with respect
/// to axis `i % 3` of component `i / 3`.
pub(crate) fn b_matrix<const N: usize>(cartesian: &SMatrix<f64, 3, N>, order: usize) -> DMatrix<f64> {
    let rows = power(order + 1);
    let dpn = dofs_per_node(order);
    let mut b = DMatrix::zeros(rows, N * dpn);
    for i in 0..rows {
        for j in 0..N {
            b[(i, j * dpn + i / DIMENSION)] = cartesian[(i % DIMENSION, j)];
        }
    }
    b
}

/// Interpolation operator of an order-`order` field, 3^order × N·3^order.
pub(crate) fn n_matrix<const N: usize>(values: &RowSVector<f64, N>, order: usize) -> DMatrix<f64> {
    let dpn = dofs_per_node(order);
    let mut n = DMatrix::zeros(dpn, N * dpn);
    for i in 0..dpn {
        for j in 0..N {
            n[(i, i + j * dpn)] = values[j];
        }
    }
    n
}

fn check_square(what: &str, c: &DMatrix<f64>, size: usize) -> Result<()> {
    if c.shape() != (size, size) {
        return Err(Error::Element(format!(
            "{}: coefficient must be {}x{}, got {}x{}",
            what,
            size,
            size,
            c.nrows(),
            c.ncols()
        )));
    }
    Ok(())
}

fn check_len(what: &str, q: &DVector<f64>, len: usize) -> Result<()> {
    if q.len() != len {
        return Err(Error::Element(format!(
            "{}: nodal vector must have {} entries, got {}",
            what,
            len,
            q.len()
        )));
    }
    Ok(())
}

fn column(v: DVector<f64>) -> DMatrix<f64> {
    let len = v.len();
    DMatrix::from_column_slice(len, 1, v.as_slice())
}

impl<S: ElementShape<N>, const N: usize> Geometry<S, N> {
    pub fn btb(&self, rule: &IntegrationRule, order: usize) -> Result<DMatrix<f64>> {
        let size = N * dofs_per_node(order);
        self.integrate(rule, size, size, |p| {
            let b = b_matrix(&p.cartesian()?, order);
            Ok(b.transpose() * b)
        })
    }

    pub fn btcb(&self, rule: &IntegrationRule, order: usize, c: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let size = N * dofs_per_node(order);
        check_square("BtCB", c, power(order + 1))?;
        self.integrate(rule, size, size, |p| {
            let b = b_matrix(&p.cartesian()?, order);
            Ok(b.transpose() * c * b)
        })
    }

    pub fn ntcn(&self, rule: &IntegrationRule, order: usize, c: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        let size = N * dofs_per_node(order);
        check_square("NtCN", c, dofs_per_node(order))?;
        self.integrate(rule, size, size, |p| {
            let n = n_matrix(&p.values, order);
            Ok(n.transpose() * c * n)
        })
    }

    pub fn ntn(&self, rule: &IntegrationRule, order: usize) -> Result<DMatrix<f64>> {
        let size = N * dofs_per_node(order);
        self.integrate(rule, size, size, |p| {
            let n = n_matrix(&p.values, order);
            Ok(n.transpose() * n)
        })
    }

    pub fn ntnq(&self, rule: &IntegrationRule, order: usize, q: &DVector<f64>) -> Result<DVector<f64>> {
        let size = N * dofs_per_node(order);
        check_len("NtNQ", q, size)?;
        let f = self.integrate(rule, size, 1, |p| {
            let n = n_matrix(&p.values, order);
            Ok(column(n.transpose() * (&n * q)))
        })?;
        Ok(f.column(0).into_owned())
    }

    /// ∫ Nᵗ C (N q)(N q) for a scalar field and scalar coefficient.
    pub fn ntcnqnq(&self, rule: &IntegrationRule, order: usize, c: &DMatrix<f64>, q: &DVector<f64>) -> Result<DVector<f64>> {
        if order != 0 {
            return Err(Error::Element(format!(
                "NtCNQNQ is defined for scalar fields, got order {}",
                order
            )));
        }
        check_square("NtCNQNQ", c, 1)?;
        check_len("NtCNQNQ", q, N)?;
        let coefficient = c[(0, 0)];
        let f = self.integrate(rule, N, 1, |p| {
            let nq: f64 = (0..N).map(|j| p.values[j] * q[j]).sum();
            let scale = coefficient * nq * nq;
            Ok(DMatrix::from_fn(N, 1, |j, _| p.values[j] * scale))
        })?;
        Ok(f.column(0).into_owned())
    }

    /// B·q at the natural coordinates of local node `local`.
    pub fn node_bq(&self, local: usize, order: usize, q: &DVector<f64>) -> Result<DVector<f64>> {
        check_len("BQ", q, N * dofs_per_node(order))?;
        let b = b_matrix(&self.at_node(local).cartesian()?, order);
        Ok(b * q)
    }

    /// C·B·q at the natural coordinates of local node `local`.
    pub fn node_cbq(&self, local: usize, order: usize, c: &DMatrix<f64>, q: &DVector<f64>) -> Result<DVector<f64>> {
        check_square("CBQ", c, power(order + 1))?;
        check_len("CBQ", q, N * dofs_per_node(order))?;
        let b = b_matrix(&self.at_node(local).cartesian()?, order);
        Ok(c * (b * q))
    }

    /// ∫ 1 over the element.
    pub fn volume(&self, rule: &IntegrationRule) -> Result<f64> {
        let v = self.integrate(rule, 1, 1, |_| Ok(DMatrix::from_element(1, 1, 1.0)))?;
        Ok(v[(0, 0)])
    }

    /// Mean of the nodal coordinates.
    pub fn barycenter(&self) -> Point3 {
        let mean = self.coords.row_mean();
        Point3::new(mean[0], mean[1], mean[2])
    }
}
