//! Mesh nodes.

use crate::attribute::{AttributeId, AttributeStore, COORDINATES_ID};
use crate::types::{AttributeValue, Point3};

/// A mesh node: id, attributes and the elements incident to it.
///
/// Coordinates live in the attribute store under [`COORDINATES_ID`]. The
/// incident element list holds element indices and is filled by the mesh.
#[derive(Debug, Clone)]
pub struct Node {
    id: usize,
    attributes: AttributeStore,
    elements: Vec<usize>,
}

impl Node {
    /// Create a node with the given id and cartesian coordinates.
    pub fn new(id: usize, coordinates: Point3) -> Self {
        let mut attributes = AttributeStore::new();
        attributes.set(
            COORDINATES_ID,
            AttributeValue::from_column_slice(3, 1, coordinates.as_slice()),
        );
        Self {
            id,
            attributes,
            elements: Vec::new(),
        }
    }

    /// Node id (index in the owning mesh).
    pub fn id(&self) -> usize {
        self.id
    }

    /// Cartesian coordinates.
    pub fn coordinates(&self) -> Point3 {
        match self.attributes.get(COORDINATES_ID) {
            Some(value) if value.len() == 3 => Point3::new(value[0], value[1], value[2]),
            _ => Point3::zeros(),
        }
    }

    /// Move the node.
    pub fn set_coordinates(&mut self, coordinates: Point3) {
        self.attributes.set(
            COORDINATES_ID,
            AttributeValue::from_column_slice(3, 1, coordinates.as_slice()),
        );
    }

    /// Attribute value, or a 1×1 zero when absent.
    pub fn attribute_value(&self, id: AttributeId) -> AttributeValue {
        self.attributes.value(id)
    }

    /// Attribute store.
    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    /// Mutable attribute store.
    pub fn attributes_mut(&mut self) -> &mut AttributeStore {
        &mut self.attributes
    }

    /// Indices of the elements incident to this node.
    pub fn incident_elements(&self) -> &[usize] {
        &self.elements
    }

    pub(crate) fn link_element(&mut self, element: usize) {
        if !self.elements.contains(&element) {
            self.elements.push(element);
        }
    }

    pub(crate) fn clear_elements(&mut self) {
        self.elements.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_are_an_attribute() {
        let node = Node::new(4, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(node.id(), 4);
        assert_eq!(node.coordinates(), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(node.attribute_value(COORDINATES_ID).shape(), (3, 1));
    }

    #[test]
    fn test_link_element_deduplicates() {
        let mut node = Node::new(0, Point3::zeros());
        node.link_element(2);
        node.link_element(5);
        node.link_element(2);
        assert_eq!(node.incident_elements(), &[2, 5]);
    }

    #[test]
    fn test_set_coordinates() {
        let mut node = Node::new(0, Point3::zeros());
        node.set_coordinates(Point3::new(0.5, -1.0, 2.0));
        assert_eq!(node.coordinates(), Point3::new(0.5, -1.0, 2.0));
    }
}
