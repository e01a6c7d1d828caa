//! ServiceMesh - Infrastructure Management API
//!
//! A single HTTP API in front of Uptime Kuma, Prometheus, Grafana and
//! Proxmox, with its own user and token store.

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod stats;
pub mod upstream;
pub mod web;
