//! Structured mesh generators.
//!
//! Nodes are numbered x fastest, then y, then z, at `spacing · index −
//! origin`. Each cell is a Hex8 with the usual bottom-then-top
//! counter-clockwise ordering, or five Tet4 cut from it.

use crate::element::{Element, ElementType};
use crate::error::Result;
use crate::mesh::Mesh;
use crate::node::Node;
use crate::types::Point3;
use serde::{Deserialize, Serialize};

/// Local corner sets of the five tetrahedra filling a hexahedral cell.
const TET_SPLIT: [[usize; 4]; 5] = [
    [0, 2, 5, 1],
    [2, 7, 5, 6],
    [0, 7, 2, 3],
    [0, 5, 2, 7],
    [0, 5, 7, 4],
];

fn block(
    points: [usize; 3],
    spacing: [f64; 3],
    origin: [f64; 3],
    element_type: ElementType,
) -> Result<Mesh> {
    let [nx, ny, nz] = points;
    let origin = Point3::from(origin);

    let mut nodes = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let position = Point3::new(
                    spacing[0] * x as f64,
                    spacing[1] * y as f64,
                    spacing[2] * z as f64,
                );
                nodes.push(Node::new(nodes.len(), position - origin));
            }
        }
    }

    let index = |x: usize, y: usize, z: usize| z * nx * ny + y * nx + x;
    let cells = nx.saturating_sub(1) * ny.saturating_sub(1) * nz.saturating_sub(1);
    let per_cell = match element_type {
        ElementType::Hex8 => 1,
        ElementType::Tet4 => TET_SPLIT.len(),
    };

    let mut elements = Vec::with_capacity(cells * per_cell);
    for z in 0..nz.saturating_sub(1) {
        for y in 0..ny.saturating_sub(1) {
            for x in 0..nx.saturating_sub(1) {
                let corners = [
                    index(x, y, z),
                    index(x + 1, y, z),
                    index(x + 1, y + 1, z),
                    index(x, y + 1, z),
                    index(x, y, z + 1),
                    index(x + 1, y, z + 1),
                    index(x + 1, y + 1, z + 1),
                    index(x, y + 1, z + 1),
                ];
                match element_type {
                    ElementType::Hex8 => {
                        elements.push(Element::new(ElementType::Hex8, corners.to_vec())?);
                    }
                    ElementType::Tet4 => {
                        for local in &TET_SPLIT {
                            let tet = local.iter().map(|&c| corners[c]).collect();
                            elements.push(Element::new(ElementType::Tet4, tet)?);
                        }
                    }
                }
            }
        }
    }

    log::debug!(
        "Generated {} nodes and {} {:?} elements",
        nodes.len(),
        elements.len(),
        element_type
    );
    Mesh::new(nodes, elements)
}

/// Regular grid of `dimensions` nodes per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSource {
    /// Nodes along x, y and z.
    pub dimensions: [usize; 3],
    pub spacing: [f64; 3],
    /// Subtracted from every node position.
    pub origin: [f64; 3],
    pub element_type: ElementType,
}

impl Default for GridSource {
    fn default() -> Self {
        Self {
            dimensions: [10, 151, 10],
            spacing: [1.0; 3],
            origin: [0.0; 3],
            element_type: ElementType::Hex8,
        }
    }
}

impl GridSource {
    pub fn generate(&self) -> Result<Mesh> {
        block(self.dimensions, self.spacing, self.origin, self.element_type)
    }
}

/// Hexahedral beam of `dimensions` cells per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSource {
    /// Cells along x, y and z.
    pub dimensions: [usize; 3],
    pub spacing: [f64; 3],
    /// Subtracted from every node position.
    pub origin: [f64; 3],
}

impl Default for BeamSource {
    fn default() -> Self {
        Self {
            dimensions: [10, 151, 10],
            spacing: [1.0; 3],
            origin: [0.0; 3],
        }
    }
}

impl BeamSource {
    pub fn generate(&self) -> Result<Mesh> {
        let points = self.dimensions.map(|cells| cells + 1);
        block(points, self.spacing, self.origin, ElementType::Hex8)
    }
}
