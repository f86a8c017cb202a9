use crate::geometry::{NdcRect, Rotation};

/// How split slots share the output.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SplitDirection {
    /// Every slot covers the whole output.
    #[default]
    None,
    /// Side by side, left to right.
    Horizontal,
    /// Stacked, top to bottom.
    Vertical,
}

/// Aspect-preserving policy for placing a source into its region.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ScaleMode {
    /// Letterbox: shrink the quad, show the whole source.
    #[default]
    Fit,
    /// Fill: keep the quad, inset the texture coordinates.
    Crop,
}

/// Whether a slot takes part in the split.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SlotRegion {
    #[default]
    Split,
    /// Always the whole output; used for overlays drawn over split content.
    FullFrame,
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SlotLayout {
    pub scale: ScaleMode,
    pub rotation: Rotation,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub region: SlotRegion,
}

/// Layout of every input slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub split: SplitDirection,
    pub slots: Vec<SlotLayout>,
}

impl LayoutConfig {
    /// Default layout for `slot_count` slots: no split, fit, no rotation.
    pub fn new(slot_count: usize) -> Self {
        Self {
            split: SplitDirection::None,
            slots: vec![SlotLayout::default(); slot_count],
        }
    }

    pub fn with_split(mut self, split: SplitDirection) -> Self {
        self.split = split;
        self
    }

    /// Applies the same scale mode to every slot.
    pub fn with_scale(mut self, scale: ScaleMode) -> Self {
        for slot in &mut self.slots {
            slot.scale = scale;
        }
        self
    }

    /// Destination region for `slot`, or `None` when the slot does not exist.
    ///
    /// Split slots are numbered in slot order, skipping full-frame slots, and
    /// each gets an equal share of the output.
    pub fn region_for(&self, slot: usize) -> Option<NdcRect> {
        let layout = self.slots.get(slot)?;
        if layout.region == SlotRegion::FullFrame {
            return Some(NdcRect::FULL);
        }

        let count = self.split_slot_count();
        let index = self.slots[..slot]
            .iter()
            .filter(|s| s.region == SlotRegion::Split)
            .count();

        Some(split_region(self.split, index, count))
    }

    fn split_slot_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.region == SlotRegion::Split)
            .count()
    }
}

fn split_region(split: SplitDirection, index: usize, count: usize) -> NdcRect {
    if count <= 1 {
        return NdcRect::FULL;
    }

    let span = 2.0 / count as f32;
    let k = index as f32;

    match split {
        SplitDirection::None => NdcRect::FULL,
        SplitDirection::Horizontal => {
            let left = -1.0 + span * k;
            NdcRect::new(left, -1.0, left + span, 1.0)
        }
        SplitDirection::Vertical => {
            let top = 1.0 - span * k;
            NdcRect::new(-1.0, top - span, 1.0, top)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_split_gives_full_frame() {
        let cfg = LayoutConfig::new(3);
        for slot in 0..3 {
            assert_eq!(cfg.region_for(slot), Some(NdcRect::FULL));
        }
        assert_eq!(cfg.region_for(3), None);
    }

    #[test]
    fn horizontal_split_is_left_to_right() {
        let cfg = LayoutConfig::new(2).with_split(SplitDirection::Horizontal);
        assert_eq!(cfg.region_for(0), Some(NdcRect::new(-1.0, -1.0, 0.0, 1.0)));
        assert_eq!(cfg.region_for(1), Some(NdcRect::new(0.0, -1.0, 1.0, 1.0)));
    }

    #[test]
    fn vertical_split_is_top_to_bottom() {
        let cfg = LayoutConfig::new(2).with_split(SplitDirection::Vertical);
        assert_eq!(cfg.region_for(0), Some(NdcRect::new(-1.0, 0.0, 1.0, 1.0)));
        assert_eq!(cfg.region_for(1), Some(NdcRect::new(-1.0, -1.0, 1.0, 0.0)));
    }

    #[test]
    fn full_frame_slot_is_excluded_from_split() {
        let mut cfg = LayoutConfig::new(3).with_split(SplitDirection::Horizontal);
        cfg.slots[1].region = SlotRegion::FullFrame;

        assert_eq!(cfg.region_for(0), Some(NdcRect::new(-1.0, -1.0, 0.0, 1.0)));
        assert_eq!(cfg.region_for(1), Some(NdcRect::FULL));
        assert_eq!(cfg.region_for(2), Some(NdcRect::new(0.0, -1.0, 1.0, 1.0)));
    }

    #[test]
    fn single_split_slot_takes_everything() {
        let mut cfg = LayoutConfig::new(2).with_split(SplitDirection::Vertical);
        cfg.slots[1].region = SlotRegion::FullFrame;
        assert_eq!(cfg.region_for(0), Some(NdcRect::FULL));
    }
}
