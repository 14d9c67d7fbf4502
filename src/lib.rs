pub mod agents;
pub mod cli;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fanout;
pub mod inbound;
pub mod pipeline;
pub mod provider;
pub mod publish;
pub mod runner;
pub mod server;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod trail;
pub mod verticals;
