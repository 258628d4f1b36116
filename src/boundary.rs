//! Boundary conditions.
//!
//! A sparse map from global DOF to prescribed value, used both for
//! essential conditions (eliminated from the system) and natural conditions
//! (added to the load vector). DOFs are numbered `node · 3^order + local`.

use crate::error::{Error, Result};
use crate::types::{dofs_per_node, global_dof};
use std::collections::BTreeMap;

/// Prescribed DOF values for a field of a given order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundaryConditions {
    order: usize,
    values: BTreeMap<usize, f64>,
}

impl BoundaryConditions {
    /// Empty set of conditions for an order-`order` field.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            values: BTreeMap::new(),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    fn dof(&self, node: usize, local: usize) -> Result<usize> {
        let dpn = dofs_per_node(self.order);
        if local >= dpn {
            return Err(Error::Assembly(format!(
                "local DOF {} out of range for {} DOFs per node",
                local, dpn
            )));
        }
        Ok(global_dof(node, local, self.order))
    }

    /// Prescribe `value` on DOF `local` of `node`, replacing any previous value.
    pub fn set_dof_value(&mut self, node: usize, local: usize, value: f64) -> Result<()> {
        let dof = self.dof(node, local)?;
        self.values.insert(dof, value);
        Ok(())
    }

    /// Add `value` to DOF `local` of `node`.
    pub fn add_dof_value(&mut self, node: usize, local: usize, value: f64) -> Result<()> {
        let dof = self.dof(node, local)?;
        *self.values.entry(dof).or_insert(0.0) += value;
        Ok(())
    }

    /// Prescribe `value` on a global DOF.
    pub fn set_global_dof_value(&mut self, dof: usize, value: f64) {
        self.values.insert(dof, value);
    }

    /// Prescribed value of a global DOF.
    pub fn get(&self, dof: usize) -> Option<f64> {
        self.values.get(&dof).copied()
    }

    pub fn contains(&self, dof: usize) -> bool {
        self.values.contains_key(&dof)
    }

    /// Prescribed DOFs, ascending.
    pub fn dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.keys().copied()
    }

    /// All (DOF, value) pairs, ascending by DOF.
    pub fn values(&self) -> &BTreeMap<usize, f64> {
        &self.values
    }

    /// DOFs with a non-zero value, ascending.
    pub fn non_zero_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.non_zero_values().map(|(dof, _)| dof)
    }

    /// (DOF, value) pairs with a non-zero value, ascending by DOF.
    pub fn non_zero_values(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .filter(|&(_, &v)| v != 0.0)
            .map(|(&dof, &v)| (dof, v))
    }

    /// DOFs prescribed to zero, ascending.
    pub fn zero_dofs(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .filter(|&(_, &v)| v == 0.0)
            .map(|(&dof, _)| dof)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrites_add_accumulates() {
        let mut bc = BoundaryConditions::new(1);
        bc.set_dof_value(2, 1, 0.5).unwrap();
        bc.set_dof_value(2, 1, 0.25).unwrap();
        assert_eq!(bc.get(7), Some(0.25));

        bc.add_dof_value(0, 2, 1.0).unwrap();
        bc.add_dof_value(0, 2, 2.0).unwrap();
        assert_eq!(bc.get(2), Some(3.0));
        assert_eq!(bc.len(), 2);
    }

    #[test]
    fn test_zero_and_non_zero_subsets_are_ordered() {
        let mut bc = BoundaryConditions::new(1);
        bc.set_global_dof_value(9, 0.0);
        bc.set_global_dof_value(4, 1.5);
        bc.set_global_dof_value(1, 0.0);
        bc.set_global_dof_value(6, -2.0);

        assert_eq!(bc.dofs().collect::<Vec<_>>(), vec![1, 4, 6, 9]);
        assert_eq!(bc.zero_dofs().collect::<Vec<_>>(), vec![1, 9]);
        assert_eq!(bc.non_zero_dofs().collect::<Vec<_>>(), vec![4, 6]);
        assert_eq!(
            bc.non_zero_values().collect::<Vec<_>>(),
            vec![(4, 1.5), (6, -2.0)]
        );
    }

    #[test]
    fn test_scalar_field_numbering() {
        let mut bc = BoundaryConditions::new(0);
        bc.set_dof_value(5, 0, 1.0).unwrap();
        assert!(bc.contains(5));
        assert!(bc.set_dof_value(5, 1, 1.0).is_err());
    }
}
