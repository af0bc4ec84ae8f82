// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The intercepted drawing surface.

[DrawContext] stands in for a 2D canvas context.  It understands exactly the
subset an engine blitting sprites needs: `draw_image` with a source rectangle,
`save`/`restore`, `scale`/`translate` and `global_alpha`.  Every `draw_image` becomes
one textured quad in the tick's geometry buffer; everything else is
[accepted and ignored](unsupported).
*/

mod context;
mod screen;
mod state;
pub mod unsupported;

pub use context::DrawContext;
pub use screen::ScreenTransform;
pub use state::{DrawState, StateStack};
pub use unsupported::Gradient;

use crate::atlas::ReserveError;
use crate::geometry::GeometryError;
use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DrawError {
    #[error(transparent)]
    Reserve(#[from] ReserveError),
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
