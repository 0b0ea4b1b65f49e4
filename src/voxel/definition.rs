/// Voxel shape definitions.
/// Each grid cell references one definition; the column renderer matches
/// exhaustively on the variant to pick its draw path.
use glam::DVec3;

/// Cardinal facing of a vertical voxel face in the XZ plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Facing2D {
    PosX = 0,
    NegX = 1,
    PosZ = 2,
    NegZ = 3,
}

pub const FACING_COUNT: usize = 4;

// Outward normals per facing - no branches in hot paths.
const FACING_NORMAL_LUT: [DVec3; FACING_COUNT] = [
    DVec3::new(1.0, 0.0, 0.0),
    DVec3::new(-1.0, 0.0, 0.0),
    DVec3::new(0.0, 0.0, 1.0),
    DVec3::new(0.0, 0.0, -1.0),
];

impl Facing2D {
    pub const ALL: [Facing2D; FACING_COUNT] = [
        Facing2D::PosX,
        Facing2D::NegX,
        Facing2D::PosZ,
        Facing2D::NegZ,
    ];

    #[inline]
    pub const fn normal(self) -> DVec3 {
        FACING_NORMAL_LUT[self as usize]
    }

    #[inline]
    pub const fn opposite(self) -> Facing2D {
        match self {
            Facing2D::PosX => Facing2D::NegX,
            Facing2D::NegX => Facing2D::PosX,
            Facing2D::PosZ => Facing2D::NegZ,
            Facing2D::NegZ => Facing2D::PosZ,
        }
    }
}

/// How a door animates open.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DoorType {
    /// Rotates about a hinge corner.
    Swinging,
    /// Slides horizontally into the wall.
    Sliding,
    /// Raises vertically into the ceiling.
    Raising,
    /// Splits into two halves that slide apart.
    Splitting,
}

/// Chasm floors. Dry chasms span the whole voxel height; wet and lava
/// chasms use a fixed shallower depth.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChasmType {
    Dry,
    Wet,
    Lava,
}

/// Depth of wet and lava chasms in world units.
pub const WET_CHASM_DEPTH: f64 = 0.4;

impl ChasmType {
    /// World-space depth of this chasm given the current voxel height.
    #[inline]
    pub fn depth(self, voxel_height: f64) -> f64 {
        match self {
            ChasmType::Dry => voxel_height,
            ChasmType::Wet | ChasmType::Lava => WET_CHASM_DEPTH,
        }
    }

    /// Lava glows on its own; wet and dry chasms rely on scene light.
    #[inline]
    pub const fn is_emissive(self) -> bool {
        matches!(self, ChasmType::Lava)
    }
}

/// Texture ids for each face group of a voxel. Unused slots stay 0.
#[derive(Copy, Clone, Debug, Default)]
pub struct VoxelTextureIds {
    pub side: usize,
    pub floor: usize,
    pub ceiling: usize,
}

/// Geometry of a single voxel cell.
#[derive(Copy, Clone, Debug)]
pub enum VoxelDefinition {
    /// Empty cell.
    None,
    /// Full opaque cube.
    Wall { textures: VoxelTextureIds },
    /// Textured plane on the cell's bottom face.
    Floor { texture: usize },
    /// Textured plane on the cell's top face.
    Ceiling { texture: usize },
    /// Box raised off the cell floor, with open space above and below.
    /// `y_offset` and `y_size` are fractions of the voxel height;
    /// `v_top`/`v_bottom` clamp the side texture's V range.
    Raised {
        textures: VoxelTextureIds,
        y_offset: f64,
        y_size: f64,
        v_top: f64,
        v_bottom: f64,
    },
    /// Full-height diagonal quad. `right_diagonal` selects which corner
    /// pair the plane connects.
    Diagonal { texture: usize, right_diagonal: bool },
    /// Full cube whose texture has cut-out texels.
    TransparentWall { texture: usize, collider: bool },
    /// Single thin quad on one face of the cell, drawn from both sides.
    Edge {
        texture: usize,
        facing: Facing2D,
        flipped: bool,
    },
    /// Hole in the floor with textured walls and an animated floor.
    Chasm {
        texture: usize,
        chasm_type: ChasmType,
    },
    /// Animated doorway.
    Door { texture: usize, door_type: DoorType },
}

impl VoxelDefinition {
    #[inline]
    pub const fn is_none(&self) -> bool {
        matches!(self, VoxelDefinition::None)
    }

}

impl Default for VoxelDefinition {
    fn default() -> Self {
        VoxelDefinition::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_normals_are_unit_axes() {
        for facing in Facing2D::ALL {
            let n = facing.normal();
            assert_eq!(n.length_squared(), 1.0, "facing normal must be unit");
            assert_eq!(n.y, 0.0, "facing normals are horizontal");
            assert_eq!(
                facing.opposite().normal(),
                -n,
                "opposite facing flips the normal"
            );
        }
    }

    #[test]
    fn chasm_depth_depends_on_type() {
        assert_eq!(ChasmType::Dry.depth(1.5), 1.5);
        assert_eq!(ChasmType::Wet.depth(1.5), WET_CHASM_DEPTH);
        assert_eq!(ChasmType::Lava.depth(1.5), WET_CHASM_DEPTH);
    }
}
