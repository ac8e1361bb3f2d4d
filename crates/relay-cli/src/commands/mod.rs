pub mod ask;
pub mod config;
pub mod doctor;
pub mod serve;
pub mod start;
pub mod ui;
