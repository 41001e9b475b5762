pub mod relay;
pub mod tcp;
