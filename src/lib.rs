pub mod camera;
pub mod math;
pub mod perf;
/// 2.5-D voxel raycaster - one DDA walk per screen column, with distant
/// sky, billboard flats and a staged worker pool.
pub mod rendering;
pub mod voxel;
pub mod world;

pub use camera::{Ray, RayCamera, FAR_PLANE, NEAR_PLANE, TALL_PIXEL_RATIO};
pub use perf::{PerfStats, PerfTimer};
pub use rendering::{DistantSky, Entity, RenderThreadsMode, ShadingInfo, SoftwareRenderer};
pub use voxel::{ChasmType, DoorType, VoxelDefinition, VoxelGrid};
pub use world::{build_demo_world, DemoWorld, WorldConfig};
