//! Element type metadata: node counts, canonical ordering, side tables.
//!
//! The snapshot format tags each element block with a type string
//! (`HEX`, `TETRA10`, `SHELL4`, ...). Everything the reconciliation
//! algorithms need to know about a type lives here as match expressions,
//! so a new variant cannot be added without the compiler pointing at every
//! table that must grow with it.

use crate::error::ReconcileError;

/// Orientation of a boundary sub-entity relative to its defining
/// connectivity order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Sense {
    Forward,
    Reverse,
}

/// Closed set of element types understood by the block builder.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ElementType {
    Tri3,
    Tri6,
    Tri7,
    Quad4,
    Quad8,
    Quad9,
    Shell4,
    Shell8,
    Shell9,
    Tetra4,
    Tetra10,
    Tetra14,
    Hex8,
    Hex20,
    Hex27,
}

/// How a 1-based local side number maps onto mesh entities.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SideSpec {
    /// The element itself stands in for the side (shell faces); no
    /// sub-entity exists.
    Whole(Sense),
    /// A proper sub-entity assembled from the listed corner-node indices.
    Sub {
        dimension: u8,
        corners: &'static [usize],
    },
}

// Side-to-corner tables, 1-based local side number minus one.
const HEX_FACES: [[usize; 4]; 6] = [
    [0, 1, 5, 4],
    [1, 2, 6, 5],
    [2, 3, 7, 6],
    [0, 4, 7, 3],
    [0, 3, 2, 1],
    [4, 5, 6, 7],
];
const TET_FACES: [[usize; 3]; 4] = [[0, 1, 3], [1, 2, 3], [0, 3, 2], [0, 2, 1]];
const QUAD_EDGES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];
const TRI_EDGES: [[usize; 2]; 3] = [[0, 1], [1, 2], [2, 0]];

// Higher-order hexes store the body-center node at position 21 in the
// source convention; canonical ordering keeps corner and mid-edge nodes
// in place, then face centers, then the body center last.
const HEX27_ORDER: [usize; 27] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 23, 24, 25, 26,
    20,
];

impl ElementType {
    /// Parses the element-type tag string attached to a block's connectivity.
    ///
    /// Matching is case-insensitive on the family prefix; a bare family name
    /// (`HEX`, `TRI`, ...) denotes the linear variant.
    pub fn from_tag(tag: &str) -> Result<Self, ReconcileError> {
        let trimmed = tag.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (family, suffix) = trimmed.split_at(split);
        let nodes = if suffix.is_empty() {
            None
        } else {
            Some(
                suffix
                    .parse::<usize>()
                    .map_err(|_| ReconcileError::UnknownElementType(tag.to_string()))?,
            )
        };
        let unknown = || ReconcileError::UnknownElementType(tag.to_string());
        match family.to_ascii_uppercase().as_str() {
            "TRI" | "TRIANGLE" => match nodes {
                None | Some(3) => Ok(Self::Tri3),
                Some(6) => Ok(Self::Tri6),
                Some(7) => Ok(Self::Tri7),
                _ => Err(unknown()),
            },
            "QUAD" => match nodes {
                None | Some(4) => Ok(Self::Quad4),
                Some(8) => Ok(Self::Quad8),
                Some(9) => Ok(Self::Quad9),
                _ => Err(unknown()),
            },
            "SHELL" => match nodes {
                None | Some(4) => Ok(Self::Shell4),
                Some(8) => Ok(Self::Shell8),
                Some(9) => Ok(Self::Shell9),
                _ => Err(unknown()),
            },
            "TETRA" | "TET" => match nodes {
                None | Some(4) => Ok(Self::Tetra4),
                Some(10) => Ok(Self::Tetra10),
                Some(14) => Ok(Self::Tetra14),
                _ => Err(unknown()),
            },
            "HEX" => match nodes {
                None | Some(8) => Ok(Self::Hex8),
                Some(20) => Ok(Self::Hex20),
                Some(27) => Ok(Self::Hex27),
                _ => Err(unknown()),
            },
            _ => Err(unknown()),
        }
    }

    /// Nodes stored per element of this type.
    pub fn nodes_per_element(self) -> usize {
        match self {
            Self::Tri3 => 3,
            Self::Tri6 => 6,
            Self::Tri7 => 7,
            Self::Quad4 | Self::Shell4 | Self::Tetra4 => 4,
            Self::Quad8 | Self::Shell8 => 8,
            Self::Quad9 | Self::Shell9 => 9,
            Self::Tetra10 => 10,
            Self::Tetra14 => 14,
            Self::Hex8 => 8,
            Self::Hex20 => 20,
            Self::Hex27 => 27,
        }
    }

    /// Corner (vertex) count, ignoring mid-edge/face/body nodes.
    pub fn corner_count(self) -> usize {
        match self {
            Self::Tri3 | Self::Tri6 | Self::Tri7 => 3,
            Self::Quad4 | Self::Quad8 | Self::Quad9 => 4,
            Self::Shell4 | Self::Shell8 | Self::Shell9 => 4,
            Self::Tetra4 | Self::Tetra10 | Self::Tetra14 => 4,
            Self::Hex8 | Self::Hex20 | Self::Hex27 => 8,
        }
    }

    /// Topological dimension of elements of this type.
    pub fn dimension(self) -> u8 {
        match self {
            Self::Tri3
            | Self::Tri6
            | Self::Tri7
            | Self::Quad4
            | Self::Quad8
            | Self::Quad9
            | Self::Shell4
            | Self::Shell8
            | Self::Shell9 => 2,
            Self::Tetra4 | Self::Tetra10 | Self::Tetra14 | Self::Hex8 | Self::Hex20 | Self::Hex27 => 3,
        }
    }

    /// Canonical node permutation, or `None` when the source ordering is
    /// already canonical. `canonical[i] = source[perm[i]]`.
    pub fn canonical_permutation(self) -> Option<&'static [usize]> {
        match self {
            Self::Hex27 => Some(&HEX27_ORDER),
            _ => None,
        }
    }

    /// Whether side numbers 1 and 2 denote the whole element (shell
    /// convention, also used by triangles embedded in 3-D).
    fn whole_element_sides(self, spatial_dim: usize) -> bool {
        match self {
            Self::Shell4 | Self::Shell8 | Self::Shell9 => true,
            Self::Tri3 | Self::Tri6 | Self::Tri7 => spatial_dim == 3,
            _ => false,
        }
    }

    /// Resolves a 1-based local side number to its corner-index table.
    ///
    /// Faces for 3-D cells, edges for 2-D cells. For shells (and triangles
    /// in a 3-D mesh) sides 1 and 2 are the element itself with forward and
    /// reverse sense; the remaining side numbers continue with the edges.
    pub fn side(self, side: usize, spatial_dim: usize) -> Result<SideSpec, ReconcileError> {
        let bad_side = || {
            ReconcileError::Format(format!(
                "element type {self:?} has no local side {side} in {spatial_dim}-D"
            ))
        };
        if self.whole_element_sides(spatial_dim) {
            return match side {
                1 => Ok(SideSpec::Whole(Sense::Forward)),
                2 => Ok(SideSpec::Whole(Sense::Reverse)),
                _ => {
                    let edges: &[[usize; 2]] = match self {
                        Self::Tri3 | Self::Tri6 | Self::Tri7 => &TRI_EDGES,
                        _ => &QUAD_EDGES,
                    };
                    edges
                        .get(side.wrapping_sub(3))
                        .map(|corners| SideSpec::Sub {
                            dimension: 1,
                            corners,
                        })
                        .ok_or_else(bad_side)
                }
            };
        }
        match self {
            Self::Hex8 | Self::Hex20 | Self::Hex27 => HEX_FACES
                .get(side.wrapping_sub(1))
                .map(|corners| SideSpec::Sub {
                    dimension: 2,
                    corners,
                })
                .ok_or_else(bad_side),
            Self::Tetra4 | Self::Tetra10 | Self::Tetra14 => TET_FACES
                .get(side.wrapping_sub(1))
                .map(|corners| SideSpec::Sub {
                    dimension: 2,
                    corners,
                })
                .ok_or_else(bad_side),
            Self::Quad4 | Self::Quad8 | Self::Quad9 => QUAD_EDGES
                .get(side.wrapping_sub(1))
                .map(|corners| SideSpec::Sub {
                    dimension: 1,
                    corners,
                })
                .ok_or_else(bad_side),
            Self::Tri3 | Self::Tri6 | Self::Tri7 => TRI_EDGES
                .get(side.wrapping_sub(1))
                .map(|corners| SideSpec::Sub {
                    dimension: 1,
                    corners,
                })
                .ok_or_else(bad_side),
            // whole_element_sides already routed shells above
            Self::Shell4 | Self::Shell8 | Self::Shell9 => Err(bad_side()),
        }
    }

    /// Distribution-factor slots one member of a side group consumes for
    /// this type and side: one slot per side node. Skipped blocks use this
    /// to keep the global factor array aligned without creating entities.
    pub fn dist_factor_slots(self, side: usize, spatial_dim: usize) -> Result<usize, ReconcileError> {
        Ok(match self.side(side, spatial_dim)? {
            SideSpec::Whole(_) => self.corner_count(),
            SideSpec::Sub { corners, .. } => corners.len(),
        })
    }
}
