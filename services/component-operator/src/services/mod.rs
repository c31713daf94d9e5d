pub mod build_inspector;
pub mod build_pipeline;
pub mod build_trigger;
pub mod cluster;
pub mod controller;
pub mod generators;
pub mod kubernetes_service;
pub mod reconciler;
pub mod route_resolver;

#[cfg(test)]
pub mod testing;
