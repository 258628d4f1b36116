//! Parallel finite element assembly.
//!
//! Element kernels are evaluated with Rayon; their contributions are then
//! accumulated serially in element order, so the assembled operators do not
//! depend on thread scheduling.
//!
//! Essential boundary conditions are eliminated in two steps that must run
//! in this order:
//!
//! 1. [`apply_ebc_to_vector`] reads the *original* matrix to move the known
//!    contribution of every non-zero prescribed DOF to the right-hand side;
//! 2. [`apply_ebc_to_matrix`] replaces prescribed rows and columns by the
//!    identity.

use crate::attribute::AttributeId;
use crate::boundary::BoundaryConditions;
use crate::element::{Element, NodalField};
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::sparse::{CsrMatrix, TripletMatrix};
use crate::types::dofs_per_node;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// Element matrix kernel to assemble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKernel {
    /// ∫ BᵗB.
    BtB,
    /// ∫ BᵗCB with an element constitutive attribute.
    BtCB(Option<AttributeId>),
    /// ∫ NᵗCN with an element coefficient attribute.
    NtCN(Option<AttributeId>),
    /// ∫ NᵗN.
    NtN,
}

/// Element vector kernel to assemble.
#[derive(Debug, Clone, Copy)]
pub enum VectorKernel<'a> {
    /// ∫ NᵗN q.
    NtNQ(NodalField<'a>),
    /// ∫ Nᵗ C (N q)(N q).
    NtCNQNQ(Option<AttributeId>, NodalField<'a>),
}

/// Total number of DOFs of an order-`order` field on `mesh`.
pub fn n_dofs(mesh: &Mesh, order: usize) -> usize {
    mesh.n_nodes() * dofs_per_node(order)
}

fn element_matrix(mesh: &Mesh, element: &Element, order: usize, kernel: MatrixKernel) -> Result<DMatrix<f64>> {
    let nodes = mesh.nodes();
    let rule = mesh.rule(element.element_type());
    match kernel {
        MatrixKernel::BtB => element.btb(nodes, rule, order),
        MatrixKernel::BtCB(c) => element.btcb(nodes, rule, order, c),
        MatrixKernel::NtCN(c) => element.ntcn(nodes, rule, order, c),
        MatrixKernel::NtN => element.ntn(nodes, rule, order),
    }
}

fn element_vector(mesh: &Mesh, element: &Element, order: usize, kernel: VectorKernel<'_>) -> Result<DVector<f64>> {
    let nodes = mesh.nodes();
    let rule = mesh.rule(element.element_type());
    match kernel {
        VectorKernel::NtNQ(q) => element.ntnq(nodes, rule, order, q),
        VectorKernel::NtCNQNQ(c, q) => element.ntcnqnq(nodes, rule, order, c, q),
    }
}

/// Assemble a global sparse matrix from one element kernel.
pub fn assemble_matrix(mesh: &Mesh, order: usize, kernel: MatrixKernel) -> Result<CsrMatrix> {
    let n = n_dofs(mesh, order);

    let contributions: Vec<(Vec<usize>, DMatrix<f64>)> = mesh
        .elements()
        .par_iter()
        .map(|element| {
            let ke = element_matrix(mesh, element, order, kernel)?;
            Ok((element.dof_indices(order), ke))
        })
        .collect::<Result<_>>()?;

    let nnz_estimate = contributions.iter().map(|(dofs, _)| dofs.len() * dofs.len()).sum();
    let mut coefficients = TripletMatrix::with_capacity(n, n, nnz_estimate);
    for (dofs, ke) in &contributions {
        coefficients.add_element_matrix(dofs, ke);
    }

    let matrix = coefficients.into_csr()?;
    log::debug!(
        "Assembled {:?}: {} DOFs, {} non-zeros",
        kernel,
        n,
        matrix.nnz()
    );
    Ok(matrix)
}

/// Assemble a global vector from one element kernel.
pub fn assemble_vector(mesh: &Mesh, order: usize, kernel: VectorKernel<'_>) -> Result<DVector<f64>> {
    let contributions: Vec<(Vec<usize>, DVector<f64>)> = mesh
        .elements()
        .par_iter()
        .map(|element| {
            let fe = element_vector(mesh, element, order, kernel)?;
            Ok((element.dof_indices(order), fe))
        })
        .collect::<Result<_>>()?;

    let mut f = DVector::zeros(n_dofs(mesh, order));
    for (dofs, fe) in &contributions {
        for (i, &dof) in dofs.iter().enumerate() {
            f[dof] += fe[i];
        }
    }
    Ok(f)
}

fn check_dof(dof: usize, n: usize) -> Result<()> {
    if dof >= n {
        return Err(Error::Assembly(format!(
            "DOF {} out of bounds ({} DOFs)",
            dof, n
        )));
    }
    Ok(())
}

/// Load vector of natural boundary conditions.
pub fn nbc_vector(mesh: &Mesh, nbc: &BoundaryConditions) -> Result<DVector<f64>> {
    let n = n_dofs(mesh, nbc.order());
    let mut f = DVector::zeros(n);
    for (&dof, &value) in nbc.values() {
        check_dof(dof, n)?;
        f[dof] += value;
    }
    Ok(f)
}

/// Impose prescribed values on `f`.
///
/// Prescribed entries are overwritten; every free row receives
/// `-K(row, dof) · value` for each non-zero prescribed DOF. `original` must
/// be the matrix before [`apply_ebc_to_matrix`].
pub fn apply_ebc_to_vector(original: &CsrMatrix, f: &mut DVector<f64>, ebc: &BoundaryConditions) -> Result<()> {
    let n = f.len();
    if original.nrows() != n || original.ncols() != n {
        return Err(Error::Assembly(format!(
            "matrix is {}x{}, vector has {} entries",
            original.nrows(),
            original.ncols(),
            n
        )));
    }

    for (&dof, &value) in ebc.values() {
        check_dof(dof, n)?;
        f[dof] = value;
    }

    if ebc.non_zero_dofs().next().is_none() {
        return Ok(());
    }
    for (row, col, &k) in original.triplet_iter() {
        if ebc.contains(row) {
            continue;
        }
        if let Some(value) = ebc.get(col).filter(|&v| v != 0.0) {
            f[row] -= k * value;
        }
    }
    Ok(())
}

/// Replace prescribed rows and columns of `k` by the identity.
pub fn apply_ebc_to_matrix(k: &CsrMatrix, ebc: &BoundaryConditions) -> Result<CsrMatrix> {
    let n = k.nrows();
    let mut coefficients = TripletMatrix::with_capacity(n, k.ncols(), k.nnz());
    for (row, col, &value) in k.triplet_iter() {
        if !ebc.contains(row) && !ebc.contains(col) {
            coefficients.add(row, col, value);
        }
    }
    for dof in ebc.dofs() {
        check_dof(dof, n)?;
        coefficients.add(dof, dof, 1.0);
    }
    coefficients.into_csr()
}

/// Eliminate essential conditions from the system K·q = f.
///
/// Returns the modified matrix; `f` is updated in place.
pub fn apply_ebc(k: &CsrMatrix, f: &mut DVector<f64>, ebc: &BoundaryConditions) -> Result<CsrMatrix> {
    apply_ebc_to_vector(k, f, ebc)?;
    apply_ebc_to_matrix(k, ebc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementType};
    use crate::material::IsotropicMaterial;
    use crate::node::Node;
    use crate::types::Point3;
    use approx::assert_relative_eq;

    fn two_tet_mesh() -> Mesh {
        let nodes = vec![
            Node::new(0, Point3::new(0.0, 0.0, 0.0)),
            Node::new(1, Point3::new(1.0, 0.0, 0.0)),
            Node::new(2, Point3::new(0.5, 1.0, 0.0)),
            Node::new(3, Point3::new(0.5, 0.5, 1.0)),
            Node::new(4, Point3::new(0.5, 0.5, -1.0)),
        ];
        let elements = vec![
            Element::new(ElementType::Tet4, vec![0, 1, 2, 3]).unwrap(),
            Element::new(ElementType::Tet4, vec![0, 1, 2, 4]).unwrap(),
        ];
        let mut mesh = Mesh::new(nodes, elements).unwrap();
        let c = IsotropicMaterial::steel().constitutive_tensor();
        mesh.set_element_attribute_from_values("Stiffness Tensor", 4, &c)
            .unwrap();
        mesh
    }

    fn stiffness(mesh: &Mesh) -> CsrMatrix {
        let id = mesh.element_attribute_id("Stiffness Tensor", 4);
        assemble_matrix(mesh, 1, MatrixKernel::BtCB(id)).unwrap()
    }

    #[test]
    fn test_assembly_empty_mesh() {
        let mesh = Mesh::new(Vec::new(), Vec::new()).unwrap();
        let k = assemble_matrix(&mesh, 1, MatrixKernel::BtB).unwrap();
        assert_eq!(k.nrows(), 0);
        let f = assemble_vector(&mesh, 0, VectorKernel::NtNQ(NodalField::Attribute(None))).unwrap();
        assert!(f.is_empty());
    }

    #[test]
    fn test_multi_element_assembly_is_symmetric() {
        let mesh = two_tet_mesh();
        let dense = DMatrix::from(&stiffness(&mesh));
        assert_eq!(dense.shape(), (15, 15));

        for i in 0..15 {
            for j in 0..15 {
                let max_abs = dense[(i, j)].abs().max(dense[(j, i)].abs()).max(1.0);
                assert!(
                    (dense[(i, j)] - dense[(j, i)]).abs() / max_abs < 1e-10,
                    "Stiffness not symmetric at ({}, {})",
                    i,
                    j
                );
            }
        }

        // Shared nodes accumulate both elements
        let ke = mesh
            .element(0)
            .unwrap()
            .btcb(
                mesh.nodes(),
                mesh.rule(ElementType::Tet4),
                1,
                mesh.element_attribute_id("Stiffness Tensor", 4),
            )
            .unwrap();
        assert!(dense[(0, 0)] > ke[(0, 0)]);
        assert_relative_eq!(dense[(9, 9)], ke[(9, 9)], max_relative = 1e-12);
    }

    #[test]
    fn test_mass_matrix_sums_to_volume() {
        let mesh = two_tet_mesh();
        let m = DMatrix::from(&assemble_matrix(&mesh, 0, MatrixKernel::NtN).unwrap());
        let volume: f64 = mesh
            .elements()
            .iter()
            .map(|e| e.volume(mesh.nodes(), mesh.rule(e.element_type())).unwrap())
            .sum();
        assert_relative_eq!(m.sum(), volume, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_assembly_matches_matrix_product() {
        let mesh = two_tet_mesh();
        let m = DMatrix::from(&assemble_matrix(&mesh, 0, MatrixKernel::NtN).unwrap());
        let u = DVector::from_fn(5, |i, _| 1.0 + i as f64);
        let f = assemble_vector(&mesh, 0, VectorKernel::NtNQ(NodalField::Values(&u))).unwrap();
        assert_relative_eq!(f, &m * &u, epsilon = 1e-12);
    }

    #[test]
    fn test_nbc_vector() {
        let mesh = two_tet_mesh();
        let mut nbc = BoundaryConditions::new(1);
        nbc.set_dof_value(3, 2, -5.0).unwrap();
        let f = nbc_vector(&mesh, &nbc).unwrap();
        assert_eq!(f.len(), 15);
        assert_relative_eq!(f[11], -5.0);

        nbc.set_dof_value(9, 0, 1.0).unwrap();
        assert!(nbc_vector(&mesh, &nbc).is_err());
    }

    #[test]
    fn test_ebc_rows_become_identity() {
        let mesh = two_tet_mesh();
        let k = stiffness(&mesh);
        let mut ebc = BoundaryConditions::new(1);
        ebc.set_dof_value(0, 0, 0.0).unwrap();
        ebc.set_dof_value(0, 1, 0.0).unwrap();
        ebc.set_dof_value(1, 2, 0.01).unwrap();

        let mut f = DVector::from_element(15, 1.0);
        let modified = apply_ebc(&k, &mut f, &ebc).unwrap();
        let dense = DMatrix::from(&modified);

        for dof in ebc.dofs() {
            for j in 0..15 {
                let expected = if j == dof { 1.0 } else { 0.0 };
                assert_eq!(dense[(dof, j)], expected);
                assert_eq!(dense[(j, dof)], expected);
            }
            assert_eq!(f[dof], ebc.get(dof).unwrap());
        }
    }

    #[test]
    fn test_ebc_condensation_preserves_solution() {
        // Solving the reduced system reproduces K·q = f on the free rows
        let mesh = two_tet_mesh();
        let k = stiffness(&mesh);
        let original = DMatrix::from(&k);

        let mut ebc = BoundaryConditions::new(1);
        for node in [0, 1, 2] {
            for local in 0..3 {
                ebc.set_dof_value(node, local, 0.0).unwrap();
            }
        }
        ebc.set_dof_value(3, 2, 1e-3).unwrap();

        let mut f = DVector::zeros(15);
        let modified = DMatrix::from(&apply_ebc(&k, &mut f, &ebc).unwrap());
        let q = modified.lu().solve(&f).unwrap();

        assert_relative_eq!(q[11], 1e-3, epsilon = 1e-15);
        let residual = &original * &q;
        for row in 0..15 {
            if !ebc.contains(row) {
                assert!(
                    residual[row].abs() < 1e-6 * original[(row, row)].abs(),
                    "Free row {} not in equilibrium: {}",
                    row,
                    residual[row]
                );
            }
        }
    }
}
