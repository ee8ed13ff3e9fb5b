// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding Volume Hierarchy (BVH) over facet bounding boxes.
//! Used to find candidate facet pairs before the exact contact test.

use super::{BoundingBox, Mesh};

#[derive(Debug, Clone)]
pub struct BVHNode {
    pub bbox: BoundingBox,
    pub left: Option<Box<BVHNode>>,
    pub right: Option<Box<BVHNode>>,
    /// Facet indices with their own boxes (leaves only)
    pub items: Vec<(usize, BoundingBox)>,
}

impl BVHNode {
    fn leaf(bbox: BoundingBox, items: Vec<(usize, BoundingBox)>) -> Self {
        Self {
            bbox,
            left: None,
            right: None,
            items,
        }
    }

    fn internal(left: Box<BVHNode>, right: Box<BVHNode>) -> Self {
        Self {
            bbox: left.bbox.union(&right.bbox),
            left: Some(left),
            right: Some(right),
            items: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Bounding Volume Hierarchy for triangle meshes
pub struct BVH {
    root: BVHNode,
    len: usize,
}

impl BVH {
    /// Build from (index, bbox) pairs
    pub fn build(items: Vec<(usize, BoundingBox)>) -> Self {
        let len = items.len();
        if items.is_empty() {
            return Self {
                root: BVHNode::leaf(BoundingBox::empty(), Vec::new()),
                len,
            };
        }
        Self {
            root: Self::build_recursive(items, 0),
            len,
        }
    }

    /// Index every triangle of `mesh`, each box grown by `margin`
    pub fn from_mesh(mesh: &Mesh, margin: f64) -> Self {
        Self::build(
            (0..mesh.triangle_count())
                .map(|t| (t, BoundingBox::from_points(&mesh.triangle_points(t)).expanded(margin)))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn build_recursive(mut items: Vec<(usize, BoundingBox)>, depth: usize) -> BVHNode {
        const MAX_DEPTH: usize = 32;
        const MIN_ITEMS: usize = 4;

        if items.len() <= MIN_ITEMS || depth >= MAX_DEPTH {
            let bbox = items
                .iter()
                .fold(BoundingBox::empty(), |acc, (_, b)| acc.union(b));
            return BVHNode::leaf(bbox, items);
        }

        // Median split along the longest axis of the centroid spread
        let centers = items
            .iter()
            .fold(BoundingBox::empty(), |mut acc, (_, b)| {
                acc.expand_to_include(&b.center());
                acc
            });
        let size = centers.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };

        // Ties broken by index keeps the tree independent of input order
        items.sort_by(|(ia, a), (ib, b)| {
            a.center()[axis]
                .total_cmp(&b.center()[axis])
                .then(ia.cmp(ib))
        });

        let right_items = items.split_off(items.len() / 2);
        let left = Box::new(Self::build_recursive(items, depth + 1));
        let right = Box::new(Self::build_recursive(right_items, depth + 1));
        BVHNode::internal(left, right)
    }

    /// Indices whose boxes intersect `bbox`, in ascending order
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut result = Vec::new();
        Self::query_recursive(&self.root, bbox, &mut result);
        result.sort_unstable();
        result
    }

    fn query_recursive(node: &BVHNode, bbox: &BoundingBox, result: &mut Vec<usize>) {
        if node.bbox.is_empty() || !node.bbox.intersects(bbox) {
            return;
        }
        if node.is_leaf() {
            result.extend(
                node.items
                    .iter()
                    .filter(|(_, item)| item.intersects(bbox))
                    .map(|&(i, _)| i),
            );
            return;
        }
        if let Some(ref left) = node.left {
            Self::query_recursive(left, bbox, result);
        }
        if let Some(ref right) = node.right {
            Self::query_recursive(right, bbox, result);
        }
    }

    #[cfg(test)]
    pub fn root(&self) -> &BVHNode {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_bvh_build() {
        let mesh = Primitive::sphere(10.0).to_mesh().unwrap();
        let bvh = BVH::from_mesh(&mesh, 0.0);
        assert_eq!(bvh.len(), mesh.triangle_count());
        assert!(!bvh.root().is_leaf());
        assert!(bvh.root().bbox.approx_eq(&mesh.bounding_box(), 1e-12));
    }

    #[test]
    fn test_bvh_query_matches_brute_force() {
        let mesh = Primitive::sphere(10.0).to_mesh().unwrap();
        let bvh = BVH::from_mesh(&mesh, 0.0);
        let region = BoundingBox::new(Point3::new(2.0, 2.0, 2.0), Point3::new(12.0, 12.0, 12.0));

        let expected: Vec<usize> = (0..mesh.triangle_count())
            .filter(|&t| BoundingBox::from_points(&mesh.triangle_points(t)).intersects(&region))
            .collect();
        assert_eq!(bvh.query(&region), expected);
        assert!(!expected.is_empty());
    }

    #[test]
    fn test_leaf_query_skips_items_outside_the_box() {
        let unit = |x: f64| BoundingBox::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 1.0, 1.0, 1.0));
        // Few enough items to share one leaf spanning all of them
        let bvh = BVH::build(vec![(0, unit(0.0)), (1, unit(10.0)), (2, unit(20.0))]);
        assert!(bvh.root().is_leaf());

        let region = BoundingBox::new(Point3::new(9.5, 0.5, 0.5), Point3::new(10.5, 0.6, 0.6));
        assert_eq!(bvh.query(&region), vec![1]);
        let gap = BoundingBox::new(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0));
        assert!(bvh.query(&gap).is_empty());
    }

    #[test]
    fn test_empty_bvh() {
        let bvh = BVH::build(Vec::new());
        assert!(bvh.is_empty());
        let region = BoundingBox::new(Point3::origin(), Point3::from(Vector3::repeat(1.0)));
        assert!(bvh.query(&region).is_empty());
    }
}
