mod component;
mod openshift;

pub use component::*;
pub use openshift::*;
