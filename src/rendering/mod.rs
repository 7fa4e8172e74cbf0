pub mod device;
pub mod graphics_state;
pub mod matrix;
pub mod path;
pub mod shapes;

pub use device::{Device, RecordedOp, RecordingDevice};
pub use graphics_state::{Color, FillRule, GraphicsState, Paint};
pub use matrix::Matrix;
pub use path::{ClipPath, Path};
pub use shapes::{ImageShape, PathShape, ShadingShape, Shape, Shapes, TextRun};
