pub mod assets;
pub mod camera;
pub mod clip;
pub mod core;
pub mod loading;
pub mod scene;
pub mod systems;
