pub mod label_font;
pub mod redaction_renderer;
