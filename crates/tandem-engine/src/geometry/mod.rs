//! Quad geometry shared by the offscreen and compose passes.
//!
//! Canonical spaces:
//! - positions are normalized device coordinates, origin center, +Y up
//! - texture coordinates are `[0,1]`, origin top-left, +V down (row 0 is the top row)
//!
//! Every quad is four vertices in triangle-strip order:
//! bottom-left, bottom-right, top-left, top-right.

mod quad;
mod rect;
mod rotation;
mod size;

pub use quad::{Quad, FULL_FRAME_POSITIONS};
pub use rect::NdcRect;
pub use rotation::{inset_tex_coords, rotate_quarter_turn, tex_coords_for, Rotation};
pub use size::Size;
