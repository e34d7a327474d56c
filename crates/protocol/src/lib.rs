pub mod color;
pub mod commands;
pub mod selection;
pub mod shared_str;
pub mod theme;
pub mod types;

pub use color::{Color, Paint};
pub use commands::{RenderCommand, TextAlign};
pub use selection::AreaSelectionRecord;
pub use shared_str::SharedStr;
pub use theme::ThemeToken;
pub use types::{Point, Rect, Size, SurfaceSize};
