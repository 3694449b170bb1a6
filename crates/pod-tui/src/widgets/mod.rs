pub mod chrome;
pub mod selection;
pub mod status_bar;
pub mod text_input;
