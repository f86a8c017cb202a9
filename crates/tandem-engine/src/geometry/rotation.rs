/// Clockwise rotation of the displayed image, in quarter turns.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    /// Parses a clockwise angle. Only multiples of 90 are accepted; negative
    /// and over-full turns are normalized.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Self::Normal,
            90 => Self::Rotate90,
            180 => Self::Rotate180,
            _ => Self::Rotate270,
        })
    }

    pub fn degrees(self) -> u32 {
        self.quarter_turns() * 90
    }

    pub fn quarter_turns(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Rotate90 => 1,
            Self::Rotate180 => 2,
            Self::Rotate270 => 3,
        }
    }

    /// Next rotation, a further 90 degrees clockwise.
    pub fn clockwise(self) -> Self {
        match self {
            Self::Normal => Self::Rotate90,
            Self::Rotate90 => Self::Rotate180,
            Self::Rotate180 => Self::Rotate270,
            Self::Rotate270 => Self::Normal,
        }
    }

    /// True for 90 and 270, where the source's width runs along the output's height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

// Texture coordinates per rotation, in strip order (BL, BR, TL, TR).
// Row 0 of a texture is the top row, so the unrotated bottom-left vertex samples v = 1.
const TEX_NORMAL: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
const TEX_ROTATE_90: [[f32; 2]; 4] = [[1.0, 1.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]];
const TEX_ROTATE_180: [[f32; 2]; 4] = [[1.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
const TEX_ROTATE_270: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

/// Rotates a texture-coordinate set one quarter turn clockwise.
///
/// `(u, v) -> (v, 1 - u)`. Coordinates on the unit corners map exactly, so
/// four applications reproduce the input bit for bit.
pub fn rotate_quarter_turn(coords: [[f32; 2]; 4]) -> [[f32; 2]; 4] {
    coords.map(|[u, v]| [v, 1.0 - u])
}

/// Full-texture coordinates for a rotation, with optional flips applied after
/// rotating.
pub fn tex_coords_for(rotation: Rotation, flip_horizontal: bool, flip_vertical: bool) -> [[f32; 2]; 4] {
    let base = match rotation {
        Rotation::Normal => TEX_NORMAL,
        Rotation::Rotate90 => TEX_ROTATE_90,
        Rotation::Rotate180 => TEX_ROTATE_180,
        Rotation::Rotate270 => TEX_ROTATE_270,
    };

    base.map(|[u, v]| {
        [
            if flip_horizontal { flip(u) } else { u },
            if flip_vertical { flip(v) } else { v },
        ]
    })
}

/// Pulls every corner coordinate towards the center by `inset_u` / `inset_v`.
///
/// Corners sit at 0 or 1, so 0 becomes `inset` and 1 becomes `1 - inset`. The
/// result stays symmetric about 0.5 whatever rotation or flip produced the corners.
pub fn inset_tex_coords(coords: [[f32; 2]; 4], inset_u: f32, inset_v: f32) -> [[f32; 2]; 4] {
    coords.map(|[u, v]| [toward_center(u, inset_u), toward_center(v, inset_v)])
}

#[inline]
fn flip(x: f32) -> f32 {
    1.0 - x
}

#[inline]
fn toward_center(x: f32, inset: f32) -> f32 {
    if x == 0.0 { inset } else { 1.0 - inset }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Rotation; 4] = [
        Rotation::Normal,
        Rotation::Rotate90,
        Rotation::Rotate180,
        Rotation::Rotate270,
    ];

    // ── tables ────────────────────────────────────────────────────────────

    #[test]
    fn each_table_is_previous_turned_once() {
        for r in ALL {
            assert_eq!(
                rotate_quarter_turn(tex_coords_for(r, false, false)),
                tex_coords_for(r.clockwise(), false, false),
                "{r:?}"
            );
        }
    }

    #[test]
    fn four_quarter_turns_round_trip_exactly() {
        for r in ALL {
            let start = tex_coords_for(r, false, false);
            let mut coords = start;
            for _ in 0..4 {
                coords = rotate_quarter_turn(coords);
            }
            assert_eq!(coords, start);
        }
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        // The displayed top-left corner shows what was the source's bottom-left.
        let coords = tex_coords_for(Rotation::Rotate90, false, false);
        assert_eq!(coords[2], [0.0, 1.0]);
    }

    // ── flips ─────────────────────────────────────────────────────────────

    #[test]
    fn horizontal_flip_mirrors_u() {
        let coords = tex_coords_for(Rotation::Normal, true, false);
        assert_eq!(coords, [[1.0, 1.0], [0.0, 1.0], [1.0, 0.0], [0.0, 0.0]]);
    }

    #[test]
    fn double_flip_equals_half_turn() {
        assert_eq!(
            tex_coords_for(Rotation::Normal, true, true),
            tex_coords_for(Rotation::Rotate180, false, false)
        );
    }

    // ── inset ─────────────────────────────────────────────────────────────

    #[test]
    fn inset_is_symmetric_about_center() {
        let coords = inset_tex_coords(tex_coords_for(Rotation::Rotate270, true, false), 0.25, 0.1);
        for [u, v] in coords {
            assert!(u == 0.25 || u == 0.75);
            assert!((v - 0.1).abs() < 1e-6 || (v - 0.9).abs() < 1e-6);
        }
    }

    // ── degrees ───────────────────────────────────────────────────────────

    #[test]
    fn degrees_normalize() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Rotate270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Rotate90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Rotate180.degrees(), 180);
    }
}
