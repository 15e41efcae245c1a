pub mod render_model;
pub mod renderer;
pub mod texture;
