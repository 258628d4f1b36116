//! Unstructured grid interchange.
//!
//! [`UnstructuredGrid`] is a flat, serde-friendly view of a [`Mesh`] laid out
//! like a VTK unstructured grid: points, typed cells and named data arrays.
//! Tensor attributes are flattened row-major with `3^order` components per
//! point or cell.

use crate::attribute::COORDINATES;
use crate::element::{Element, ElementType};
use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::node::Node;
use crate::types::{attribute_shape, components, order_from_components, AttributeValue, Point3};
use serde::{Deserialize, Serialize};

/// VTK cell type, serialized as its numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CellKind {
    /// VTK_TETRA
    Tetra,
    /// VTK_HEXAHEDRON
    Hexahedron,
    /// Any other VTK code.
    Other(u8),
}

impl CellKind {
    const TETRA: u8 = 10;
    const HEXAHEDRON: u8 = 12;

    pub fn code(self) -> u8 {
        match self {
            CellKind::Tetra => Self::TETRA,
            CellKind::Hexahedron => Self::HEXAHEDRON,
            CellKind::Other(code) => code,
        }
    }

    pub fn element_type(self) -> Option<ElementType> {
        match self {
            CellKind::Tetra => Some(ElementType::Tet4),
            CellKind::Hexahedron => Some(ElementType::Hex8),
            CellKind::Other(_) => None,
        }
    }
}

impl From<u8> for CellKind {
    fn from(code: u8) -> Self {
        match code {
            CellKind::TETRA => CellKind::Tetra,
            CellKind::HEXAHEDRON => CellKind::Hexahedron,
            other => CellKind::Other(other),
        }
    }
}

impl From<CellKind> for u8 {
    fn from(kind: CellKind) -> Self {
        kind.code()
    }
}

impl From<ElementType> for CellKind {
    fn from(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Tet4 => CellKind::Tetra,
            ElementType::Hex8 => CellKind::Hexahedron,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub kind: CellKind,
    pub connectivity: Vec<usize>,
}

/// Named array with `components` values per item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    pub name: String,
    pub components: usize,
    pub values: Vec<f64>,
}

impl DataArray {
    /// Number of items described, if the values divide evenly.
    pub fn items(&self) -> Option<usize> {
        if self.components == 0 || self.values.len() % self.components != 0 {
            return None;
        }
        Some(self.values.len() / self.components)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnstructuredGrid {
    pub points: Vec<[f64; 3]>,
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub point_data: Vec<DataArray>,
    #[serde(default)]
    pub cell_data: Vec<DataArray>,
}

/// Row-major flattening of a stack of `items` values of the given order.
fn flatten(stacked: &AttributeValue, items: usize, order: usize) -> Vec<f64> {
    let (rows, cols) = attribute_shape(order);
    let mut values = Vec::with_capacity(items * rows * cols);
    for k in 0..items {
        for r in 0..rows {
            for c in 0..cols {
                values.push(stacked[(k * rows + r, c)]);
            }
        }
    }
    values
}

/// Order of `array` if it can be stored on `items` items.
fn array_order(array: &DataArray, items: usize, kind: &str) -> Result<Option<usize>> {
    let Some(order) = order_from_components(array.components) else {
        log::warn!(
            "Skipping {} array \"{}\": {} components is not a power of 3",
            kind,
            array.name,
            array.components
        );
        return Ok(None);
    };
    if array.items() != Some(items) {
        return Err(Error::Attribute(format!(
            "{} array \"{}\" has {} values, expected {} ({} × {})",
            kind,
            array.name,
            array.values.len(),
            items * array.components,
            items,
            array.components
        )));
    }
    Ok(Some(order))
}

impl UnstructuredGrid {
    /// Flatten every registered node and element attribute of `mesh`.
    ///
    /// Coordinates go to `points` only. Items with no value export zeros.
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let points = mesh
            .nodes()
            .iter()
            .map(|node| {
                let p = node.coordinates();
                [p.x, p.y, p.z]
            })
            .collect();

        let cells = mesh
            .elements()
            .iter()
            .map(|element| Cell {
                kind: element.element_type().into(),
                connectivity: element.nodes().to_vec(),
            })
            .collect();

        let point_data = mesh
            .node_attribute_table()
            .entries()
            .filter(|(name, _)| *name != COORDINATES)
            .map(|(name, entry)| DataArray {
                name: name.to_string(),
                components: components(entry.order),
                values: flatten(
                    &mesh.node_attribute_values(name, entry.order),
                    mesh.n_nodes(),
                    entry.order,
                ),
            })
            .collect();

        let cell_data = mesh
            .element_attribute_table()
            .entries()
            .map(|(name, entry)| DataArray {
                name: name.to_string(),
                components: components(entry.order),
                values: flatten(
                    &mesh.element_attribute_values(name, entry.order),
                    mesh.n_elements(),
                    entry.order,
                ),
            })
            .collect();

        Self {
            points,
            cells,
            point_data,
            cell_data,
        }
    }

    /// Build a mesh, registering every data array whose component count is a
    /// power of 3.
    pub fn to_mesh(&self) -> Result<Mesh> {
        let nodes = self
            .points
            .iter()
            .enumerate()
            .map(|(id, p)| Node::new(id, Point3::new(p[0], p[1], p[2])))
            .collect();

        let elements = self
            .cells
            .iter()
            .map(|cell| {
                let element_type = cell.kind.element_type().ok_or_else(|| {
                    Error::UnsupportedElement(format!("VTK cell type {}", cell.kind.code()))
                })?;
                Element::new(element_type, cell.connectivity.clone())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut mesh = Mesh::new(nodes, elements)?;

        for array in &self.point_data {
            if array.name == COORDINATES {
                log::debug!("Ignoring \"{}\" point array, points define coordinates", COORDINATES);
                continue;
            }
            if let Some(order) = array_order(array, mesh.n_nodes(), "point")? {
                let values = AttributeValue::from_column_slice(array.values.len(), 1, &array.values);
                mesh.set_node_attribute_from_values(&array.name, order, &values)?;
            }
        }
        for array in &self.cell_data {
            if let Some(order) = array_order(array, mesh.n_elements(), "cell")? {
                let values = AttributeValue::from_column_slice(array.values.len(), 1, &array.values);
                mesh.set_element_attribute_from_values(&array.name, order, &values)?;
            }
        }

        log::debug!(
            "Imported {} points, {} cells, {} point and {} cell arrays",
            self.points.len(),
            self.cells.len(),
            self.point_data.len(),
            self.cell_data.len()
        );
        Ok(mesh)
    }
}

impl From<&Mesh> for UnstructuredGrid {
    fn from(mesh: &Mesh) -> Self {
        Self::from_mesh(mesh)
    }
}
