pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod flash;
pub mod forms;
pub mod html;
pub mod schema;
pub mod state;
pub mod stock;
pub mod users;
pub mod views;
