pub mod flats;
pub mod framebuffer;
pub mod intersect;
pub mod lights;
pub mod raycast;
pub mod renderer;
pub mod shading;
pub mod sky;
pub mod texture;
pub mod threading;

pub use flats::Entity;
pub use framebuffer::{clear_frame, rgb_to_u32, FrameView, OcclusionData};
pub use lights::RenderLight;
pub use renderer::SoftwareRenderer;
pub use shading::ShadingInfo;
pub use sky::{DistantSky, MoonType};
pub use texture::{
    ChasmTexture, FlatTexture, FlatTextureGroup, SkyTexture, VoxelTexture,
};
pub use threading::RenderThreadsMode;
