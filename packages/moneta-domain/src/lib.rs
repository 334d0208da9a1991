pub mod embed_text;
pub mod time_range;
