pub mod conditions;
pub mod configs;
pub mod crds;
pub mod determiners;
pub mod differ;
pub mod error;
pub mod formatters;
pub mod labels;
pub mod models;
pub mod ownership;
pub mod resources;
