use std::error::Error;

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod highlight;
pub mod limiter;
pub mod model;
pub mod routes;

pub fn unpack_error(err: &(dyn Error)) -> String {
    let mut parts = Vec::new();
    parts.push(err.to_string());
    let mut current = err.source();
    while let Some(source) = current {
        parts.push(source.to_string());
        current = source.source();
    }
    parts.join(": ")
}
