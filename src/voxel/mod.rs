/// Voxel data model: shape definitions, the id-palette grid, and the
/// renderer-owned door/fade animation state.
pub mod definition;
pub mod grid;

pub use definition::{
    ChasmType, DoorType, Facing2D, VoxelDefinition, VoxelTextureIds, FACING_COUNT,
    WET_CHASM_DEPTH,
};
pub use grid::{VoxelAnimState, VoxelGrid};
