/// Point lights visible this frame and the fixed-capacity per-column lists
/// that reference them.
use glam::{DVec2, DVec3};

pub type LightId = u32;

/// A registered point light, before per-frame visibility testing.
#[derive(Copy, Clone, Debug)]
pub struct RenderLight {
    pub position: DVec3,
    pub radius: f64,
}

impl RenderLight {
    pub fn new(position: DVec3, radius: f64) -> Self {
        debug_assert!(radius > 0.0, "light radius must be positive");
        Self { position, radius }
    }
}

/// A light that passed frustum testing for the current frame.
#[derive(Copy, Clone, Debug)]
pub struct VisibleLight {
    pub position: DVec3,
    pub radius: f64,
}

impl VisibleLight {
    pub fn new(position: DVec3, radius: f64) -> Self {
        debug_assert!(radius > 0.0, "light radius must be positive");
        Self { position, radius }
    }
}

pub const MAX_LIGHTS_PER_LIST: usize = 16;

/// Lights relevant to one voxel column or flat. Fixed capacity; adds past
/// the cap are dropped, which is expected in dense clusters.
#[derive(Copy, Clone, Debug)]
pub struct VisibleLightList {
    light_ids: [LightId; MAX_LIGHTS_PER_LIST],
    count: usize,
}

impl VisibleLightList {
    /// The list of a column no light reaches.
    pub const EMPTY: VisibleLightList = VisibleLightList {
        light_ids: [0; MAX_LIGHTS_PER_LIST],
        count: 0,
    };

    pub fn new() -> Self {
        Self::EMPTY
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == MAX_LIGHTS_PER_LIST
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn ids(&self) -> &[LightId] {
        &self.light_ids[..self.count]
    }

    /// Saturating insert.
    #[inline]
    pub fn add(&mut self, id: LightId) {
        if self.count < MAX_LIGHTS_PER_LIST {
            self.light_ids[self.count] = id;
            self.count += 1;
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Order ids nearest-first relative to an XZ point, so the brightest
    /// contributors survive any later truncation. Insertion sort; the list
    /// is tiny.
    pub fn sort_by_nearest(&mut self, point: DVec2, lights: &[VisibleLight]) {
        let dist_sq = |id: LightId| {
            let light = &lights[id as usize];
            let diff = DVec2::new(light.position.x, light.position.z) - point;
            diff.length_squared()
        };

        for i in 1..self.count {
            let id = self.light_ids[i];
            let key = dist_sq(id);
            let mut j = i;
            while j > 0 && dist_sq(self.light_ids[j - 1]) > key {
                self.light_ids[j] = self.light_ids[j - 1];
                j -= 1;
            }
            self.light_ids[j] = id;
        }
    }
}

impl Default for VisibleLightList {
    fn default() -> Self {
        Self::new()
    }
}

/// Scatter the frame's visible lights into one list per voxel column.
/// Each light lands in every column its radius overlaps; each touched
/// list is then ordered nearest-first to its column center so the
/// strongest contributors survive the capacity cap.
pub fn update_visible_light_lists(
    lights: &[VisibleLight],
    grid_width: usize,
    grid_depth: usize,
    lists: &mut Vec<VisibleLightList>,
) {
    lists.clear();
    lists.resize(grid_width * grid_depth, VisibleLightList::EMPTY);

    for (id, light) in lights.iter().enumerate() {
        let min_x = ((light.position.x - light.radius).floor() as i32).max(0);
        let max_x = ((light.position.x + light.radius).floor() as i32).min(grid_width as i32 - 1);
        let min_z = ((light.position.z - light.radius).floor() as i32).max(0);
        let max_z = ((light.position.z + light.radius).floor() as i32).min(grid_depth as i32 - 1);

        for z in min_z..=max_z {
            for x in min_x..=max_x {
                lists[(x as usize) + (z as usize) * grid_width].add(id as LightId);
            }
        }
    }

    for z in 0..grid_depth {
        for x in 0..grid_width {
            let list = &mut lists[x + z * grid_width];
            if list.count() > 1 {
                let column_center = DVec2::new(x as f64 + 0.50, z as f64 + 0.50);
                list.sort_by_nearest(column_center, lights);
            }
        }
    }
}

/// List for one voxel column. Columns outside the grid (rays can start
/// there) and frames with no lights read as unlit.
#[inline]
pub fn column_light_list(
    lists: &[VisibleLightList],
    grid_width: usize,
    voxel_x: i32,
    voxel_z: i32,
) -> &VisibleLightList {
    if voxel_x < 0 || voxel_z < 0 || (voxel_x as usize) >= grid_width {
        return &VisibleLightList::EMPTY;
    }
    lists
        .get((voxel_x as usize) + (voxel_z as usize) * grid_width)
        .unwrap_or(&VisibleLightList::EMPTY)
}

/// Summed light falloff at a world point, capped at `max_contribution` so
/// the shading term cannot blow past full brightness. Linear falloff per
/// light, zero outside the radius.
#[inline]
pub fn get_light_contribution_at_point(
    point: DVec2,
    lights: &[VisibleLight],
    light_list: &VisibleLightList,
    max_contribution: f64,
) -> f64 {
    let mut contribution = 0.0;
    for &id in light_list.ids() {
        let light = &lights[id as usize];
        let light_xz = DVec2::new(light.position.x, light.position.z);
        let dist = (light_xz - point).length();
        let percent = 1.0 - (dist / light.radius);
        if percent > 0.0 {
            contribution += percent;
            if contribution >= max_contribution {
                return max_contribution;
            }
        }
    }
    contribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn add_saturates_at_capacity() {
        let mut list = VisibleLightList::new();
        for id in 0..(MAX_LIGHTS_PER_LIST as u32 + 4) {
            list.add(id);
        }

        assert!(list.is_full());
        assert_eq!(list.count(), MAX_LIGHTS_PER_LIST);
        assert_eq!(
            list.ids().last().copied(),
            Some(MAX_LIGHTS_PER_LIST as u32 - 1),
            "overflow adds must be dropped, not wrapped"
        );
    }

    #[test]
    fn sort_orders_nearest_first() {
        let lights = vec![
            VisibleLight::new(DVec3::new(10.0, 1.0, 0.0), 3.0),
            VisibleLight::new(DVec3::new(1.0, 1.0, 0.0), 3.0),
            VisibleLight::new(DVec3::new(5.0, 1.0, 0.0), 3.0),
        ];

        let mut list = VisibleLightList::new();
        list.add(0);
        list.add(1);
        list.add(2);
        list.sort_by_nearest(DVec2::ZERO, &lights);

        assert_eq!(list.ids(), &[1, 2, 0]);
    }

    #[test]
    fn lights_scatter_only_into_columns_they_reach() {
        let lights = vec![
            VisibleLight::new(DVec3::new(1.5, 1.0, 1.5), 1.0),
            VisibleLight::new(DVec3::new(6.5, 1.0, 6.5), 0.2),
        ];
        let mut lists = Vec::new();
        update_visible_light_lists(&lights, 8, 8, &mut lists);

        assert_eq!(lists.len(), 64);
        assert_eq!(
            column_light_list(&lists, 8, 1, 1).ids(),
            &[0],
            "column under the first light sees it"
        );
        assert_eq!(
            column_light_list(&lists, 8, 6, 6).ids(),
            &[1],
            "the small light only reaches its own column"
        );
        assert!(
            column_light_list(&lists, 8, 4, 4).ids().is_empty(),
            "columns outside every radius stay unlit"
        );
        assert!(
            column_light_list(&lists, 8, -1, 3).ids().is_empty(),
            "out-of-grid columns read as unlit"
        );
    }

    #[test]
    fn column_list_keeps_its_own_light_under_crowding() {
        // A far column's light must not be evicted by a cluster of small
        // lights near the opposite corner.
        let mut lights = vec![VisibleLight::new(DVec3::new(14.5, 1.0, 14.5), 2.0)];
        for _ in 0..(MAX_LIGHTS_PER_LIST + 4) {
            lights.push(VisibleLight::new(DVec3::new(0.5, 1.0, 0.5), 0.2));
        }

        let mut lists = Vec::new();
        update_visible_light_lists(&lights, 16, 16, &mut lists);

        let far_list = column_light_list(&lists, 16, 14, 14);
        assert_eq!(
            far_list.ids(),
            &[0],
            "only the far light overlaps the far column"
        );

        let crowded_list = column_light_list(&lists, 16, 0, 0);
        assert!(
            crowded_list.is_full(),
            "the crowded column saturates at capacity"
        );
    }

    #[test]
    fn contribution_caps_and_falls_off() {
        let lights = vec![
            VisibleLight::new(DVec3::new(0.0, 1.0, 0.0), 2.0),
            VisibleLight::new(DVec3::new(0.0, 1.0, 0.0), 2.0),
        ];
        let mut list = VisibleLightList::new();
        list.add(0);

        // Standing at the light: full falloff value.
        let at_center = get_light_contribution_at_point(DVec2::ZERO, &lights, &list, 1.0);
        assert_relative_eq!(at_center, 1.0);

        // Halfway out: half.
        let halfway = get_light_contribution_at_point(DVec2::new(1.0, 0.0), &lights, &list, 1.0);
        assert_relative_eq!(halfway, 0.5);

        // Outside the radius: nothing.
        let outside = get_light_contribution_at_point(DVec2::new(3.0, 0.0), &lights, &list, 1.0);
        assert_relative_eq!(outside, 0.0);

        // Two coincident lights cap at the maximum.
        list.add(1);
        let capped = get_light_contribution_at_point(DVec2::ZERO, &lights, &list, 0.75);
        assert_relative_eq!(capped, 0.75);
    }
}
