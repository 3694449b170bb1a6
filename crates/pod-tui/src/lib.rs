pub mod action;
pub mod engine;
pub mod fetcher;
pub mod mpv;
pub mod navigation;
pub mod orchestrator;
pub mod session;
pub mod theme;
pub mod widgets;
