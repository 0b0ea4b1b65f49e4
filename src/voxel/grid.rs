/// Voxel grid storage.
/// Cells store u16 ids into a shared definition palette, so large maps with
/// few distinct shapes stay compact. Layout is X-major, then Z, then Y,
/// matching the renderer's column access pattern.
use super::VoxelDefinition;
use std::collections::HashMap;

pub struct VoxelGrid {
    width: usize,
    height: usize,
    depth: usize,
    voxels: Vec<u16>,
    definitions: Vec<VoxelDefinition>,
}

impl VoxelGrid {
    /// Create an empty grid. Definition id 0 is always `None`.
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        assert!(
            width > 0 && height > 0 && depth > 0,
            "voxel grid dimensions must be positive ({}x{}x{})",
            width,
            height,
            depth
        );

        Self {
            width,
            height,
            depth,
            voxels: vec![0; width * height * depth],
            definitions: vec![VoxelDefinition::None],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Register a definition and get its id back.
    pub fn add_definition(&mut self, definition: VoxelDefinition) -> u16 {
        let id = self.definitions.len();
        assert!(id <= u16::MAX as usize, "voxel definition palette overflow");
        self.definitions.push(definition);
        id as u16
    }

    #[inline]
    const fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + (z * self.width) + (y * self.width * self.depth)
    }

    #[inline]
    pub fn get_id(&self, x: usize, y: usize, z: usize) -> u16 {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        self.voxels[self.index(x, y, z)]
    }

    pub fn set_id(&mut self, x: usize, y: usize, z: usize, id: u16) {
        debug_assert!(
            (id as usize) < self.definitions.len(),
            "voxel id {} has no registered definition",
            id
        );
        let index = self.index(x, y, z);
        self.voxels[index] = id;
    }

    /// Look up the definition at a cell. Out-of-bounds cells read as `None`,
    /// which lets the ray walk query neighbours without bounds branches at
    /// every call site.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> &VoxelDefinition {
        if x < 0
            || y < 0
            || z < 0
            || x as usize >= self.width
            || y as usize >= self.height
            || z as usize >= self.depth
        {
            return &self.definitions[0];
        }

        let id = self.get_id(x as usize, y as usize, z as usize);
        &self.definitions[id as usize]
    }

    /// Whether the XZ coordinate lands inside the grid footprint.
    #[inline]
    pub fn contains_xz(&self, x: i32, z: i32) -> bool {
        x >= 0 && z >= 0 && (x as usize) < self.width && (z as usize) < self.depth
    }
}

/// Per-voxel animation state owned by the renderer, not the grid.
/// Doors animate between closed (0.0) and fully open (1.0); fading voxels
/// darken from 0.0 (untouched) to 1.0 (gone).
#[derive(Default)]
pub struct VoxelAnimState {
    open_doors: HashMap<(i32, i32, i32), f64>,
    fading_voxels: HashMap<(i32, i32, i32), f64>,
}

impl VoxelAnimState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a door's open percent. Values outside [0, 1] are programmer error.
    pub fn set_door_open_percent(&mut self, x: i32, y: i32, z: i32, percent: f64) {
        debug_assert!(
            (0.0..=1.0).contains(&percent),
            "door open percent {} out of range",
            percent
        );
        if percent == 0.0 {
            self.open_doors.remove(&(x, y, z));
        } else {
            self.open_doors.insert((x, y, z), percent);
        }
    }

    #[inline]
    pub fn door_open_percent(&self, x: i32, y: i32, z: i32) -> f64 {
        self.open_doors.get(&(x, y, z)).copied().unwrap_or(0.0)
    }

    pub fn set_fade_percent(&mut self, x: i32, y: i32, z: i32, percent: f64) {
        debug_assert!(
            (0.0..=1.0).contains(&percent),
            "fade percent {} out of range",
            percent
        );
        if percent == 0.0 {
            self.fading_voxels.remove(&(x, y, z));
        } else {
            self.fading_voxels.insert((x, y, z), percent);
        }
    }

    #[inline]
    pub fn fade_percent(&self, x: i32, y: i32, z: i32) -> f64 {
        self.fading_voxels.get(&(x, y, z)).copied().unwrap_or(0.0)
    }

    /// Fully faded voxels are skipped by the column drawers.
    #[inline]
    pub fn is_fully_faded(&self, x: i32, y: i32, z: i32) -> bool {
        self.fade_percent(x, y, z) >= 1.0
    }

    pub fn clear(&mut self) {
        self.open_doors.clear();
        self.fading_voxels.clear();
    }
}
