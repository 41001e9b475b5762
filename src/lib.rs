pub mod checkpoint;
pub mod cli;
pub mod event;
pub mod generator;
pub mod ipc;
pub mod pipeline;
pub mod region;
