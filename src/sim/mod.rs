pub mod aero;
pub mod atmosphere;
pub mod engine;
pub mod environment;
pub mod events;
pub mod launcher;
pub mod parachute;
pub mod rocket;
pub mod solver;
pub mod wind;
