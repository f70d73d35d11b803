pub mod ai;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod dedup;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod paths;
pub mod routes;
pub mod services;
pub mod srs;
pub mod state;

#[cfg(test)]
pub mod testing;
