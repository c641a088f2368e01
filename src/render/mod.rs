// Renderers for the labelled block list
pub mod html;

pub use html::render_html;
