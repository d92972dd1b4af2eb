pub mod renderer;

pub use renderer::{
    FrameRenderer, KeyboardRenderer, KeyboardScene, RenderGeometry, RenderView, RendererError,
};
